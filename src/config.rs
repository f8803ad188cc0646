use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;

static DATA_DIR: LazyLock<DataDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "solesearch").expect("failed to get project dir");
    DataDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_data_dir() -> &'static str {
    DATA_DIR.path().to_str().unwrap()
}

/// 嵌入后端相关选项
#[derive(Parser, Debug, Clone)]
pub struct EmbedOptions {
    /// 嵌入后端，local 为本地灰度网格嵌入，remote 为托管模型服务
    #[arg(long, value_enum, value_name = "BACKEND", default_value_t = EmbedBackendKind::Local)]
    pub embed_backend: EmbedBackendKind,
    /// 嵌入向量维度（即索引维度），建立索引后不可更改
    #[arg(long, value_name = "D", default_value_t = 512)]
    pub embed_dim: usize,
    /// 托管嵌入服务地址，remote 后端必填
    #[arg(long, value_name = "URL")]
    pub embed_endpoint: Option<String>,
    /// 托管嵌入模型名称
    #[arg(long, value_name = "MODEL", default_value = "arctic-embed-v2")]
    pub embed_model: String,
    /// 托管嵌入请求超时时间，单位秒
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub embed_timeout: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedBackendKind {
    /// 本地灰度网格嵌入（降级方案）
    Local,
    /// 托管嵌入模型服务
    Remote,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "solesearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// solesearch 数据目录
    #[arg(short, long, default_value = default_data_dir())]
    pub data_dir: DataDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 从 zip 归档与元数据表批量摄取鞋印记录
    Ingest(IngestCommand),
    /// 使用一张鞋印图片查询最相似的历史案例
    Query(QueryCommand),
    /// 启动 HTTP 检索服务
    Server(ServerCommand),
    /// 查看索引连接状态与记录数量
    Status(StatusCommand),
}

/// 数据目录，索引数据库等文件都存放于此
#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回索引数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("solesearch.db")
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
