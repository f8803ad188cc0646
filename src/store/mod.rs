use std::future::Future;

mod memory;
mod model;
mod sqlite;

pub use memory::MemStore;
pub use model::*;
pub use sqlite::SqliteStore;

use crate::error::{Error, Result};

/// 相似度分数的比较粒度。排序前分数量化到该粒度，量化值相同按 id 升序，
/// 既保证结果确定，也保证比较是全序
pub const SCORE_EPS: f32 = 1e-9;

/// 向量索引存储
///
/// 一个存储实例对应一个固定的索引维度与嵌入模型版本。写入是独占的维护操作，
/// 查询（nearest）是只读的，可以任意并发。
pub trait VectorStore: Send + Sync {
    /// 索引维度
    fn dim(&self) -> usize;

    /// 建立索引时使用的嵌入模型标识
    fn model(&self) -> &str;

    /// 按 id 插入一条记录，id 已存在时若 `overwrite` 则替换，否则跳过。
    /// 返回是否为新插入。
    fn upsert(
        &self,
        record: FootprintRecord,
        overwrite: bool,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// 批量写入。`drop_existing` 为真时先清空整个索引再插入，
    /// 否则逐条按「重复即跳过」语义写入。
    fn bulk_upsert(
        &self,
        records: Vec<FootprintRecord>,
        drop_existing: bool,
    ) -> impl Future<Output = Result<BulkReport>> + Send;

    /// 返回与查询向量余弦相似度最高的 k 条记录及其分数，按相似度降序
    fn nearest(
        &self,
        query: &[f32],
        k: usize,
    ) -> impl Future<Output = Result<Vec<(FootprintRecord, f32)>>> + Send;

    /// 当前记录数量
    fn count(&self) -> impl Future<Output = Result<u64>> + Send;

    /// 检查存储是否可达
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// 清空索引
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;
}

/// 余弦相似度，取值范围 [-1, 1]，越大越相似。零向量与任何向量的相似度为 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// 把相似度分数量化为整数键，`SCORE_EPS` 为一个单位
fn score_key(score: f32) -> i64 {
    (score as f64 / SCORE_EPS as f64).round() as i64
}

/// 对候选记录按与查询向量的余弦相似度排序并截取前 k 条。
/// 分数量化到 SCORE_EPS 粒度后降序比较，量化值相同的记录按 id 升序。
pub(crate) fn rank_nearest(
    records: impl IntoIterator<Item = FootprintRecord>,
    query: &[f32],
    k: usize,
) -> Vec<(FootprintRecord, f32)> {
    let mut scored: Vec<(FootprintRecord, f32)> = records
        .into_iter()
        .map(|r| {
            let score = cosine_similarity(&r.embedding, query);
            (r, score)
        })
        .collect();
    scored.sort_by(|a, b| score_key(b.1).cmp(&score_key(a.1)).then_with(|| a.0.id.cmp(&b.0.id)));
    scored.truncate(k);
    scored
}

/// 校验查询向量的维度
pub(crate) fn check_dim(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> FootprintRecord {
        FootprintRecord::new(id.to_string(), format!("test.zip:{id}"), AttrMap::new(), embedding)
    }

    #[test]
    fn cosine_identical_is_one() {
        let v = vec![0.1, 0.2, 0.3, 0.4];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn rank_returns_top_k_best_first() {
        let records = vec![
            record("far", vec![-1.0, 0.0, 0.0, 0.0]),
            record("close", vec![1.0, 0.1, 0.0, 0.0]),
            record("exact", vec![1.0, 0.0, 0.0, 0.0]),
            record("mid", vec![1.0, 1.0, 0.0, 0.0]),
        ];
        let result = rank_nearest(records, &[1.0, 0.0, 0.0, 0.0], 3);
        let ids: Vec<&str> = result.iter().map(|(r, _)| r.id.as_str()).collect();
        assert_eq!(ids, ["exact", "close", "mid"]);
        assert!((result[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rank_epsilon_chain_keeps_best_first() {
        // 三条记录的分数构成 0 / 8e-10 / 1.6e-9 的链，相邻差都在量化粒度附近，
        // 但首尾差明显，最高分必须排第一
        let records = vec![
            record("a", vec![0.0, 1.0]),
            record("m", vec![8e-10, 1.0]),
            record("z", vec![1.6e-9, 1.0]),
        ];
        let result = rank_nearest(records, &[1.0, 0.0], 3);
        let ids: Vec<&str> = result.iter().map(|(r, _)| r.id.as_str()).collect();
        assert_eq!(ids, ["z", "m", "a"]);
    }

    #[test]
    fn rank_ties_break_by_id_ascending() {
        let records = vec![
            record("b", vec![1.0, 0.0]),
            record("a", vec![1.0, 0.0]),
            record("c", vec![2.0, 0.0]),
        ];
        // 三条记录与查询向量的相似度完全相同（余弦对缩放不敏感）
        let result = rank_nearest(records, &[1.0, 0.0], 3);
        let ids: Vec<&str> = result.iter().map(|(r, _)| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
