use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use indicatif::ProgressBar;

use crate::cli::SubCommandExtend;
use crate::config::{EmbedOptions, Opts};
use crate::embed::{Embed, Embedder};
use crate::ingest::{self, IngestOptions};
use crate::store::SqliteStore;

#[derive(Parser, Debug, Clone)]
pub struct IngestCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    /// 存放 zip 归档的目录
    pub zip_directory: PathBuf,
    /// 元数据表文件，支持 .csv / .xlsx / .xls
    pub metadata_file: PathBuf,
    /// 元数据表中的 id 列名
    #[arg(long, value_name = "COLUMN", default_value = "id")]
    pub id_column: String,
    /// 写入前清空现有索引
    #[arg(long)]
    pub drop_existing: bool,
    /// 只做解包、加载与配对并报告，不写入存储
    #[arg(long)]
    pub dry_run: bool,
}

impl SubCommandExtend for IngestCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let embedder = Embedder::from_options(&self.embed)?;
        let store =
            SqliteStore::open(opts.data_dir.database(), embedder.dim(), embedder.model_id())
                .await?;

        let options = IngestOptions {
            zip_directory: self.zip_directory.clone(),
            metadata_file: self.metadata_file.clone(),
            id_column: self.id_column.clone(),
            drop_existing: self.drop_existing,
            dry_run: self.dry_run,
        };

        let pb = ProgressBar::new_spinner().with_message("正在摄取...");
        pb.enable_steady_tick(Duration::from_millis(100));
        let report = ingest::run(&store, &embedder, &options).await?;
        pb.finish_and_clear();

        println!("状态: {}", report.status);
        println!("图片: {}，元数据行: {}", report.images_found, report.metadata_rows);
        println!(
            "匹配: {}，插入: {}，跳过: {}，失败: {}",
            report.matched, report.inserted, report.skipped, report.failed
        );
        if !report.unmatched_images.is_empty() {
            println!("无元数据的图片 ({}): {:?}", report.unmatched_images.len(), report.unmatched_images);
        }
        if !report.unmatched_metadata.is_empty() {
            println!(
                "无图片的元数据 ({}): {:?}",
                report.unmatched_metadata.len(),
                report.unmatched_metadata
            );
        }
        println!("耗时: {:.2}s", report.processing_time_seconds);
        Ok(())
    }
}
