use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{EmbedOptions, Opts};
use crate::embed::{Embed, Embedder};
use crate::store::{SqliteStore, VectorStore};

#[derive(Parser, Debug, Clone)]
pub struct StatusCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
}

impl SubCommandExtend for StatusCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let embedder = Embedder::from_options(&self.embed)?;
        let store =
            SqliteStore::open(opts.data_dir.database(), embedder.dim(), embedder.model_id())
                .await?;

        store.ping().await?;
        println!("数据库: {}", opts.data_dir.database().display());
        println!("嵌入模型: {}", store.model());
        println!("索引维度: {}", store.dim());
        println!("记录数量: {}", store.count().await?);
        Ok(())
    }
}
