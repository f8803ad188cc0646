use std::collections::BTreeMap;

use tokio::sync::RwLock;

use super::{BulkReport, FootprintRecord, VectorStore, check_dim, rank_nearest};
use crate::error::Result;

/// 内存实现的向量索引存储，与 SqliteStore 满足同一契约，主要用于测试
pub struct MemStore {
    records: RwLock<BTreeMap<String, FootprintRecord>>,
    dim: usize,
    model: String,
}

impl MemStore {
    pub fn new(dim: usize, model: &str) -> Self {
        Self { records: RwLock::new(BTreeMap::new()), dim, model: model.to_string() }
    }
}

impl VectorStore for MemStore {
    fn dim(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn upsert(&self, record: FootprintRecord, overwrite: bool) -> Result<bool> {
        check_dim(self.dim, record.embedding.len())?;
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            if overwrite {
                records.insert(record.id.clone(), record);
            }
            return Ok(false);
        }
        records.insert(record.id.clone(), record);
        Ok(true)
    }

    async fn bulk_upsert(
        &self,
        new_records: Vec<FootprintRecord>,
        drop_existing: bool,
    ) -> Result<BulkReport> {
        let mut records = self.records.write().await;
        if drop_existing {
            records.clear();
        }
        let mut report = BulkReport::default();
        for record in new_records {
            if record.embedding.len() != self.dim {
                report.failed += 1;
            } else if records.contains_key(&record.id) {
                report.skipped += 1;
            } else {
                records.insert(record.id.clone(), record);
                report.inserted += 1;
            }
        }
        Ok(report)
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(FootprintRecord, f32)>> {
        check_dim(self.dim, query.len())?;
        let records = self.records.read().await;
        Ok(rank_nearest(records.values().cloned(), query, k))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AttrMap;

    fn record(id: &str, embedding: Vec<f32>) -> FootprintRecord {
        FootprintRecord::new(id.to_string(), format!("test.zip:{id}"), AttrMap::new(), embedding)
    }

    #[tokio::test]
    async fn empty_store_returns_no_results() {
        let store = MemStore::new(4, "grid-gray-v1");
        let result = store.nearest(&[1.0, 0.0, 0.0, 0.0], 3).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn scenario_query_identical_to_r7() {
        // 10 条 4 维记录，查询向量与 R7 完全一致，最佳匹配应为 R7 且相似度约 1.0
        let store = MemStore::new(4, "grid-gray-v1");
        for i in 1..=10 {
            let embedding =
                vec![i as f32, (i % 3) as f32, (i % 5) as f32, 1.0 + (i % 7) as f32 / 10.0];
            store.upsert(record(&format!("R{i}"), embedding), false).await.unwrap();
        }
        let query = vec![7.0, 1.0, 2.0, 1.0];
        let result = store.nearest(&query, 3).await.unwrap();
        assert_eq!(result[0].0.id, "R7");
        assert!((result[0].1 - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn overwrite_replaces_existing() {
        let store = MemStore::new(2, "grid-gray-v1");
        store.upsert(record("a", vec![1.0, 0.0]), false).await.unwrap();
        assert!(!store.upsert(record("a", vec![0.0, 1.0]), true).await.unwrap());
        let result = store.nearest(&[0.0, 1.0], 1).await.unwrap();
        assert!((result[0].1 - 1.0).abs() < 1e-6);
    }
}
