use std::time::Instant;

use chrono::Utc;
use log::info;
use serde::Serialize;

use crate::embed::Embed;
use crate::error::{Error, Result};
use crate::store::{AttrMap, VectorStore};

/// 查询返回的案例数量上限
pub const TOP_K: usize = 3;

/// 按相似度从高到低分配的案例标签
pub const CASE_LABELS: [&str; TOP_K] = ["CASE A", "CASE B", "CASE C"];

const ACCEPTED_MIME: [&str; 4] = ["image/tiff", "image/png", "image/jpeg", "image/jpg"];
const ACCEPTED_EXTENSIONS: [&str; 5] = [".tiff", ".tif", ".png", ".jpg", ".jpeg"];

/// 待查询的上传图片
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// 单个匹配案例。只暴露标识、属性集合与相似度，
/// 绝不携带 embedding 或 image_ref。
#[derive(Debug, Clone, Serialize)]
pub struct CaseMatch {
    pub case_label: String,
    pub id: String,
    pub metadata: AttrMap,
    pub similarity_score: f64,
}

/// 查询执行的元信息
#[derive(Debug, Clone, Serialize)]
pub struct QueryMetadata {
    /// RFC3339 时间戳
    pub timestamp: String,
    pub embedding_model: String,
    /// 实际返回的案例数量，0 到 3，索引记录不足 3 条时小于 3 是正常情况
    pub results_found: usize,
    pub processing_time_ms: f64,
}

/// 一次查询的完整结果，只在响应期间存在，不落盘
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub cases: Vec<CaseMatch>,
    pub query_metadata: QueryMetadata,
}

/// 查询引擎：校验上传、生成嵌入、取最近的 3 条记录并打上案例标签。
/// 查询路径是只读的，绝不修改存储。
pub struct QueryEngine<'a, S, E> {
    store: &'a S,
    embedder: &'a E,
}

impl<'a, S: VectorStore, E: Embed> QueryEngine<'a, S, E> {
    pub fn new(store: &'a S, embedder: &'a E) -> Self {
        Self { store, embedder }
    }

    pub async fn query(&self, upload: &ImageUpload) -> Result<QueryOutcome> {
        let start = Instant::now();

        validate_upload(upload)?;
        if self.embedder.dim() != self.store.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.store.dim(),
                actual: self.embedder.dim(),
            });
        }
        if self.embedder.model_id() != self.store.model() {
            return Err(Error::ModelMismatch {
                indexed: self.store.model().to_string(),
                current: self.embedder.model_id().to_string(),
            });
        }

        let embedding = self.embedder.embed(&upload.data).await?;
        let neighbors = self.store.nearest(&embedding, TOP_K).await?;

        let cases: Vec<CaseMatch> = neighbors
            .into_iter()
            .zip(CASE_LABELS)
            .map(|((record, score), label)| CaseMatch {
                case_label: label.to_string(),
                id: record.id,
                metadata: record.attributes,
                similarity_score: round_to(score as f64, 4),
            })
            .collect();

        info!("查询完成，返回 {} 个案例", cases.len());
        Ok(QueryOutcome {
            query_metadata: QueryMetadata {
                timestamp: Utc::now().to_rfc3339(),
                embedding_model: self.embedder.model_id().to_string(),
                results_found: cases.len(),
                processing_time_ms: round_to(start.elapsed().as_secs_f64() * 1000.0, 2),
            },
            cases,
        })
    }
}

/// 校验上传图片的声明类型：MIME 或扩展名命中任意一个即可
pub fn validate_upload(upload: &ImageUpload) -> Result<()> {
    if upload.data.is_empty() {
        return Err(Error::InputValidation("图片内容为空".to_string()));
    }
    let mime_ok = upload
        .content_type
        .as_deref()
        .map(|ct| ACCEPTED_MIME.contains(&ct.to_lowercase().as_str()))
        .unwrap_or(false);
    let ext_ok = upload
        .file_name
        .as_deref()
        .map(|name| {
            let name = name.to_lowercase();
            ACCEPTED_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
        })
        .unwrap_or(false);
    if !mime_ok && !ext_ok {
        return Err(Error::InputValidation(format!(
            "不支持的图片类型，允许 TIFF / PNG / JPEG，实际为 {:?}",
            upload.content_type.as_deref().unwrap_or("未知")
        )));
    }
    Ok(())
}

fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}
