mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

use crate::store::VectorStore;

#[derive(OpenApi)]
#[openapi(
    paths(api::query_handler, api::ingest_handler, api::health_handler),
    components(schemas(types::QueryForm, types::IngestRequest))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app<S: VectorStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/api/query", post(api::query_handler::<S>))
        .route("/api/ingest", post(api::ingest_handler::<S>))
        .route("/api/health", get(api::health_handler::<S>))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
