pub mod repo;
pub mod schema;

pub use anyhow::Error;
