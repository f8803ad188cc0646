use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 错误分类
///
/// 按「谁该为此负责、能否重试」划分：输入非法归咎于调用方；后端与存储
/// 不可用是暂时的，可以退避重试；维度与模型不匹配是配置错误，重试无益。
#[derive(Debug, Error)]
pub enum Error {
    /// 上传内容或请求参数非法
    #[error("输入非法: {0}")]
    InputValidation(String),

    /// 嵌入后端不可达或返回异常
    #[error("嵌入后端不可用: {0}")]
    BackendUnavailable(String),

    /// 向量维度与索引维度不一致
    #[error("向量维度不匹配: 索引为 {expected} 维，实际为 {actual} 维")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 嵌入模型与建立索引时使用的模型不一致
    #[error("嵌入模型不匹配: 索引使用 {indexed}，当前为 {current}")]
    ModelMismatch { indexed: String, current: String },

    /// 索引存储不可达或操作失败
    #[error("索引存储不可用: {0}")]
    StoreUnavailable(String),

    /// 已有摄取任务在运行
    #[error("已有摄取任务在运行，请稍后重试")]
    IngestBusy,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::InputValidation(format!("图片无法解码: {err}"))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}
