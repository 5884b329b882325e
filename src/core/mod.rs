pub mod compiler;
pub mod history;
pub mod loader;
pub mod sanitize;
