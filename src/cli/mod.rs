mod ingest;
mod query;
mod server;
mod status;

pub use ingest::*;
pub use query::*;
pub use server::*;
pub use status::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
