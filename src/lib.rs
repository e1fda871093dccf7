//! Flash Report data layer: repositories, consistency services and backend
//! selection over the storage crates.

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod repositories;
pub mod sequence;
pub mod services;

pub use backend::open_backend;
pub use error::RepositoryError;
pub use repositories::Repositories;
