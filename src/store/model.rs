use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// 记录的属性集合，列随数据集变化，按属性名有序
pub type AttrMap = serde_json::Map<String, Value>;

/// 鞋印记录，存储的基本单元
///
/// 记录只由摄取管线创建，插入后不再修改，只能通过 drop_existing 整体清空。
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintRecord {
    /// 唯一标识，来自图片文件名（不含扩展名）
    pub id: String,
    /// 图片资产的定位符，格式为 `归档路径:图片标识`，绝不返回给查询方
    pub image_ref: String,
    /// 元数据表中对应行的属性集合
    pub attributes: AttrMap,
    /// 定长嵌入向量，长度等于索引维度
    pub embedding: Vec<f32>,
    /// 插入时间
    pub created_at: DateTime<Utc>,
}

impl FootprintRecord {
    pub fn new(id: String, image_ref: String, attributes: AttrMap, embedding: Vec<f32>) -> Self {
        Self { id, image_ref, attributes, embedding, created_at: Utc::now() }
    }
}

/// 批量写入的统计结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    /// 实际插入的记录数
    pub inserted: usize,
    /// 因 id 重复而跳过的记录数
    pub skipped: usize,
    /// 因维度不符等原因失败的记录数
    pub failed: usize,
}
