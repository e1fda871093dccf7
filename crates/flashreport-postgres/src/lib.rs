pub mod sql;
pub mod storage;

pub use storage::{PostgresOptions, PostgresStorage};
