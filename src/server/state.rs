use std::sync::Arc;

use tokio::sync::Mutex;

use crate::embed::Embedder;
use crate::store::VectorStore;

/// 应用状态
pub struct AppState<S> {
    /// 向量索引存储
    pub store: S,
    /// 进程启动时选定的嵌入后端
    pub embedder: Embedder,
    /// 摄取闩：摄取是独占的维护操作，同一索引同时只允许一个摄取任务，
    /// 抢不到闩的请求直接得到 busy 错误而不是排队
    pub ingest_lock: Mutex<()>,
}

impl<S: VectorStore> AppState<S> {
    /// 创建新的应用状态
    pub fn new(store: S, embedder: Embedder) -> Arc<Self> {
        Arc::new(AppState { store, embedder, ingest_lock: Mutex::new(()) })
    }
}
