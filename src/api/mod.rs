pub mod builder;
pub mod error;
pub mod files;
pub mod history;
pub mod query;
