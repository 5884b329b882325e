pub mod engine;
pub mod storage;
pub mod utils;
