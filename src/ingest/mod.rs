use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Instant;

use log::{info, warn};
use serde::Serialize;
use utoipa::ToSchema;

mod archive;
mod metadata;

pub use archive::{ExtractedImage, IMAGE_EXTENSIONS, extract_archive, scan_zip_dir};
pub use metadata::{MetadataTable, load_metadata};

use crate::embed::Embed;
use crate::error::{Error, Result};
use crate::store::{FootprintRecord, VectorStore};

/// 一次摄取任务的输入
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// 存放 zip 归档的目录
    pub zip_directory: PathBuf,
    /// 元数据表文件（.csv / .xlsx / .xls）
    pub metadata_file: PathBuf,
    /// 元数据表中的 id 列名
    pub id_column: String,
    /// 写入前是否清空现有索引
    pub drop_existing: bool,
    /// 只做解包、加载与匹配并报告，不触碰存储
    pub dry_run: bool,
}

/// 摄取结果报告，未匹配的记录只作为诊断信息，不会导致摄取失败
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestReport {
    pub status: String,
    /// 归档中找到的图片数量
    pub images_found: usize,
    /// 元数据表的行数
    pub metadata_rows: usize,
    /// 图片与元数据成功配对的数量
    pub matched: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// 没有对应元数据行的图片标识
    pub unmatched_images: Vec<String>,
    /// 没有对应图片的元数据标识
    pub unmatched_metadata: Vec<String>,
    pub processing_time_seconds: f64,
}

/// 从图片标识推导元数据标识
///
/// 数据集约定图片文件名为 `XXX_YY_L/R_NN`，元数据以 `XXX_YY` 为键，
/// 即取前两个下划线分段；分段不足时退回完整标识。
pub fn metadata_key(image_id: &str) -> String {
    let parts: Vec<&str> = image_id.split('_').collect();
    if parts.len() >= 2 { parts[..2].join("_") } else { image_id.to_string() }
}

/// 执行摄取管线：解包归档、加载元数据、按标识配对、嵌入并批量写入。
///
/// 只有灾难性错误才中止：归档目录不可读、元数据文件不可解析、嵌入后端
/// 不可用。个别图片无法解码只计入 failed 并继续。
pub async fn run<S, E>(store: &S, embedder: &E, opts: &IngestOptions) -> Result<IngestReport>
where
    S: VectorStore,
    E: Embed,
{
    let start = Instant::now();

    // 模型与维度必须和索引一致，否则写入的分数没有意义
    if embedder.dim() != store.dim() {
        return Err(Error::DimensionMismatch { expected: store.dim(), actual: embedder.dim() });
    }
    if embedder.model_id() != store.model() {
        return Err(Error::ModelMismatch {
            indexed: store.model().to_string(),
            current: embedder.model_id().to_string(),
        });
    }

    // 1. 解包所有归档，按图片标识去重
    let mut images: BTreeMap<String, ExtractedImage> = BTreeMap::new();
    for archive_path in scan_zip_dir(&opts.zip_directory)? {
        info!("解包归档 {}", archive_path.display());
        for image in extract_archive(&archive_path)? {
            if images.contains_key(&image.id) {
                warn!("图片标识重复，保留首次出现: {}", image.id);
                continue;
            }
            images.insert(image.id.clone(), image);
        }
    }

    // 2. 加载元数据表
    let table = load_metadata(&opts.metadata_file, &opts.id_column)?;

    let images_found = images.len();
    let metadata_rows = table.len();

    // 3. 按标识配对并生成嵌入
    let mut records = Vec::new();
    let mut unmatched_images = Vec::new();
    let mut used_keys: BTreeSet<String> = BTreeSet::new();
    let mut failed = 0usize;

    for (id, image) in images {
        let key = metadata_key(&id);
        let Some(attributes) = table.get(&key) else {
            unmatched_images.push(id);
            continue;
        };
        used_keys.insert(key);

        match embedder.embed(&image.data).await {
            Ok(embedding) => {
                records.push(FootprintRecord::new(
                    id,
                    image.image_ref,
                    attributes.clone(),
                    embedding,
                ));
            }
            Err(Error::InputValidation(reason)) => {
                warn!("图片 {id} 无法嵌入，跳过: {reason}");
                failed += 1;
            }
            // 后端不可用等错误会波及整批，直接中止
            Err(e) => return Err(e),
        }
        if (records.len() + failed) % 50 == 0 {
            info!("已处理 {} 条记录", records.len() + failed);
        }
    }

    let unmatched_metadata: Vec<String> =
        table.keys().filter(|k| !used_keys.contains(*k)).cloned().collect();
    let matched = records.len() + failed;

    info!(
        "配对完成: 图片 {images_found}，元数据 {metadata_rows}，匹配 {matched}，\
         未匹配图片 {}，未匹配元数据 {}",
        unmatched_images.len(),
        unmatched_metadata.len()
    );

    // 4. 写入存储（dry_run 模式在此止步）
    let (status, bulk) = if opts.dry_run {
        ("dry_run".to_string(), Default::default())
    } else {
        ("completed".to_string(), store.bulk_upsert(records, opts.drop_existing).await?)
    };

    Ok(IngestReport {
        status,
        images_found,
        metadata_rows,
        matched,
        inserted: bulk.inserted,
        skipped: bulk.skipped,
        failed: failed + bulk.failed,
        unmatched_images,
        unmatched_metadata,
        processing_time_seconds: start.elapsed().as_secs_f64(),
    })
}
