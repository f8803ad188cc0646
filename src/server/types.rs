use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::query::{CaseMatch, QueryOutcome};
use crate::store::AttrMap;

/// 查询请求参数
#[derive(TryFromMultipart)]
pub struct QueryRequest {
    pub image: FieldData<Bytes>,
}

/// 查询表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct QueryForm {
    /// 上传的鞋印图片，TIFF / PNG / JPEG
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: String,
}

/// 摄取请求参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestRequest {
    /// 存放 zip 归档的目录
    pub zip_directory: String,
    /// 元数据表文件路径，.csv / .xlsx / .xls
    pub metadata_file: String,
    /// 元数据表中的 id 列名
    #[serde(default = "default_id_column")]
    #[schema(default = "id")]
    pub id_column: String,
    /// 写入前是否清空现有索引
    #[serde(default)]
    pub drop_existing: bool,
    /// 只做配对与报告，不写入存储
    #[serde(default)]
    pub dry_run: bool,
}

fn default_id_column() -> String {
    "id".to_string()
}

/// 单个匹配案例。响应只携带标签、标识、属性与相似度，
/// embedding 与 image_ref 永远不出现在这里。
#[derive(Debug, Serialize, ToSchema)]
pub struct CaseResponse {
    pub case_label: String,
    pub id: String,
    #[schema(value_type = Object)]
    pub metadata: AttrMap,
    pub similarity_score: f64,
}

/// 三个案例槽位，相似度不足三条时多余槽位为 null
#[derive(Debug, Serialize, ToSchema)]
pub struct CasesResponse {
    pub case_a: Option<CaseResponse>,
    pub case_b: Option<CaseResponse>,
    pub case_c: Option<CaseResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueryMetadataResponse {
    /// RFC3339 时间戳
    pub timestamp: String,
    pub embedding_model: String,
    pub results_found: usize,
    pub processing_time_ms: f64,
}

/// 查询响应
#[derive(Debug, Serialize, ToSchema)]
pub struct QueryResponse {
    pub cases: CasesResponse,
    pub query_metadata: QueryMetadataResponse,
}

/// 健康检查响应
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database_connected: bool,
    pub record_count: u64,
    pub timestamp: String,
}

impl From<CaseMatch> for CaseResponse {
    fn from(case: CaseMatch) -> Self {
        Self {
            case_label: case.case_label,
            id: case.id,
            metadata: case.metadata,
            similarity_score: case.similarity_score,
        }
    }
}

impl From<QueryOutcome> for QueryResponse {
    fn from(outcome: QueryOutcome) -> Self {
        let mut cases = outcome.cases.into_iter();
        Self {
            cases: CasesResponse {
                case_a: cases.next().map(Into::into),
                case_b: cases.next().map(Into::into),
                case_c: cases.next().map(Into::into),
            },
            query_metadata: QueryMetadataResponse {
                timestamp: outcome.query_metadata.timestamp,
                embedding_model: outcome.query_metadata.embedding_model,
                results_found: outcome.query_metadata.results_found,
                processing_time_ms: outcome.query_metadata.processing_time_ms,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query::QueryMetadata;

    #[test]
    fn missing_cases_serialize_as_null_slots() {
        let outcome = QueryOutcome {
            cases: vec![CaseMatch {
                case_label: "CASE A".to_string(),
                id: "001_01_L_01".to_string(),
                metadata: AttrMap::new(),
                similarity_score: 0.9542,
            }],
            query_metadata: QueryMetadata {
                timestamp: "2026-01-17T10:30:00Z".to_string(),
                embedding_model: "grid-gray-v1".to_string(),
                results_found: 1,
                processing_time_ms: 12.5,
            },
        };
        let value = serde_json::to_value(QueryResponse::from(outcome)).unwrap();
        assert_eq!(value["cases"]["case_a"]["case_label"], json!("CASE A"));
        assert_eq!(value["cases"]["case_b"], serde_json::Value::Null);
        assert_eq!(value["cases"]["case_c"], serde_json::Value::Null);
        assert_eq!(value["query_metadata"]["results_found"], json!(1));
    }
}
