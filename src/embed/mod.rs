use std::future::Future;

mod local;
mod remote;

pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;

use crate::config::{EmbedBackendKind, EmbedOptions};
use crate::error::{Error, Result};

/// 嵌入能力：一张图片到定长向量
///
/// 同一模型版本下对相同输入必须产生相同向量，否则相似度分数不可复现。
/// 后端不可用必须显式报错（`BackendUnavailable`），禁止退化为零向量。
pub trait Embed: Send + Sync {
    /// 模型标识，随索引一起持久化，查询时校验
    fn model_id(&self) -> &str;

    /// 输出向量的维度，必须等于索引维度
    fn dim(&self) -> usize;

    /// 将一张图片编码为定长向量
    fn embed(&self, image: &[u8]) -> impl Future<Output = Result<Vec<f32>>> + Send;
}

/// 进程启动时按配置选定的嵌入后端，会话期间不可切换
pub enum Embedder {
    Local(LocalEmbedder),
    Remote(RemoteEmbedder),
}

impl Embedder {
    pub fn from_options(opts: &EmbedOptions) -> Result<Self> {
        match opts.embed_backend {
            EmbedBackendKind::Local => Ok(Self::Local(LocalEmbedder::new(opts.embed_dim))),
            EmbedBackendKind::Remote => {
                let endpoint = opts.embed_endpoint.clone().ok_or_else(|| {
                    Error::InputValidation("remote 后端需要指定 --embed-endpoint".to_string())
                })?;
                Ok(Self::Remote(RemoteEmbedder::new(
                    endpoint,
                    opts.embed_model.clone(),
                    opts.embed_dim,
                    opts.embed_timeout,
                )?))
            }
        }
    }
}

impl Embed for Embedder {
    fn model_id(&self) -> &str {
        match self {
            Self::Local(e) => e.model_id(),
            Self::Remote(e) => e.model_id(),
        }
    }

    fn dim(&self) -> usize {
        match self {
            Self::Local(e) => e.dim(),
            Self::Remote(e) => e.dim(),
        }
    }

    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
        match self {
            Self::Local(e) => e.embed(image).await,
            Self::Remote(e) => e.embed(image).await,
        }
    }
}
