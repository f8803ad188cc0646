use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use crate::cli::SubCommandExtend;
use crate::config::{EmbedOptions, Opts};
use crate::embed::{Embed, Embedder};
use crate::server;
use crate::store::SqliteStore;

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let embedder = Embedder::from_options(&self.embed)?;
        let store =
            SqliteStore::open(opts.data_dir.database(), embedder.dim(), embedder.model_id())
                .await?;
        info!("嵌入模型: {}，索引维度: {}", embedder.model_id(), embedder.dim());

        // 创建应用状态
        let state = server::AppState::new(store, embedder);

        // 创建应用
        let app = server::create_app(state);

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
