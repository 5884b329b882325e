pub mod context;
pub mod file;
pub mod query;
pub mod result;
pub mod table;
