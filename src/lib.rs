pub mod cli;
pub mod config;
pub mod embed;
pub mod error;
pub mod ingest;
mod metrics;
pub mod query;
mod server;
pub mod store;

pub use config::Opts;
pub use error::{Error, Result};
