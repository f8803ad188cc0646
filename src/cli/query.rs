use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::cli::SubCommandExtend;
use crate::config::{EmbedOptions, Opts};
use crate::embed::{Embed, Embedder};
use crate::query::{ImageUpload, QueryEngine, QueryOutcome};
use crate::store::SqliteStore;

#[derive(Parser, Debug, Clone)]
pub struct QueryCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    /// 被查询的鞋印图片路径
    pub image: PathBuf,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for QueryCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let embedder = Embedder::from_options(&self.embed)?;
        let store =
            SqliteStore::open(opts.data_dir.database(), embedder.dim(), embedder.model_id())
                .await?;

        let data = tokio::fs::read(&self.image).await?;
        let upload = ImageUpload {
            data,
            file_name: self.image.file_name().map(|s| s.to_string_lossy().into_owned()),
            content_type: None,
        };
        let outcome = QueryEngine::new(&store, &embedder).query(&upload).await?;
        print_outcome(&outcome, self)
    }
}

fn print_outcome(outcome: &QueryOutcome, opts: &QueryCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome)?)
        }
        OutputFormat::Table => {
            if outcome.cases.is_empty() {
                println!("没有找到匹配的鞋印记录。");
            }
            for case in &outcome.cases {
                println!("=== {} ===", case.case_label);
                println!("ID: {}", case.id);
                println!("相似度: {:.4}", case.similarity_score);
                for (key, value) in &case.metadata {
                    println!("  - {key}: {value}");
                }
                println!();
            }
            println!("模型: {}", outcome.query_metadata.embedding_model);
            println!("耗时: {:.2}ms", outcome.query_metadata.processing_time_ms);
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
