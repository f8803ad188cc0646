use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum_typed_multipart::TypedMultipart;
use chrono::Utc;
use log::info;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::embed::Embed;
use crate::error::Error;
use crate::ingest::{self, IngestOptions, IngestReport};
use crate::metrics;
use crate::query::{ImageUpload, QueryEngine};
use crate::store::VectorStore;

/// 查询一张鞋印图片，返回最相似的三个历史案例
#[utoipa::path(
    post,
    path = "/api/query",
    request_body(content = QueryForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = QueryResponse),
    )
)]
pub async fn query_handler<S: VectorStore>(
    State(state): State<Arc<AppState<S>>>,
    data: TypedMultipart<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();
    let upload = ImageUpload {
        data: data.image.contents.to_vec(),
        file_name: data.image.metadata.file_name.clone(),
        content_type: data.image.metadata.content_type.clone(),
    };
    info!("正在查询上传鞋印 {:?}", upload.file_name);

    let result = QueryEngine::new(&state.store, &state.embedder).query(&upload).await;
    metrics::observe_query(
        state.embedder.model_id(),
        result.is_ok(),
        start.elapsed().as_secs_f64(),
    );
    let outcome = result.map_err(AppError)?;
    if let Some(best) = outcome.cases.first() {
        metrics::observe_top_score(&outcome.query_metadata.embedding_model, best.similarity_score);
    }
    Ok(Json(outcome.into()))
}

/// 从 zip 归档与元数据表摄取鞋印记录
#[utoipa::path(
    post,
    path = "/api/ingest",
    request_body = IngestRequest,
    responses(
        (status = 200, body = IngestReport),
        (status = 409, description = "已有摄取任务在运行"),
    )
)]
pub async fn ingest_handler<S: VectorStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>> {
    // 摄取互斥，抢不到闩立即返回 busy
    let _guard = state.ingest_lock.try_lock().map_err(|_| AppError(Error::IngestBusy))?;

    let options = IngestOptions {
        zip_directory: PathBuf::from(request.zip_directory),
        metadata_file: PathBuf::from(request.metadata_file),
        id_column: request.id_column,
        drop_existing: request.drop_existing,
        dry_run: request.dry_run,
    };
    info!(
        "开始摄取: {} + {}，drop_existing = {}",
        options.zip_directory.display(),
        options.metadata_file.display(),
        options.drop_existing
    );

    let report = ingest::run(&state.store, &state.embedder, &options).await?;
    metrics::observe_ingest(report.inserted, report.skipped, report.failed);
    Ok(Json(report))
}

/// 索引连接状态与记录数量
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, body = HealthResponse),
    )
)]
pub async fn health_handler<S: VectorStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let connected = state.store.ping().await.is_ok();
    let record_count = if connected { state.store.count().await.unwrap_or(0) } else { 0 };
    Json(HealthResponse {
        status: if connected { "ok" } else { "degraded" }.to_string(),
        database_connected: connected,
        record_count,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// prometheus 指标
pub async fn metrics_handler() -> String {
    metrics::gather_text()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::*;
    use crate::embed::{Embedder, LocalEmbedder};
    use crate::store::MemStore;

    #[tokio::test]
    async fn concurrent_ingest_is_rejected_as_busy() {
        let state = AppState::new(
            MemStore::new(4, LocalEmbedder::MODEL_ID),
            Embedder::Local(LocalEmbedder::new(4)),
        );
        // 占住摄取闩，模拟一个正在运行的摄取任务
        let _guard = state.ingest_lock.lock().await;

        let request = IngestRequest {
            zip_directory: "/tmp/archives".to_string(),
            metadata_file: "/tmp/metadata.csv".to_string(),
            id_column: "id".to_string(),
            drop_existing: false,
            dry_run: false,
        };
        match ingest_handler(State(state.clone()), Json(request)).await {
            Err(err) => {
                assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
            }
            Ok(_) => panic!("ingest should be rejected while the latch is held"),
        }
    }
}
