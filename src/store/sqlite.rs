use std::path::Path;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{AttrMap, BulkReport, FootprintRecord, VectorStore, check_dim, rank_nearest};
use crate::error::{Error, Result};

/// 基于 SQLite 的向量索引存储
///
/// WAL 模式下单写多读，嵌入向量以小端 f32 二进制存储。索引维度与嵌入模型
/// 记录在 index_meta 表中，打开时校验，不一致直接报错而不是悄悄兼容。
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    dim: usize,
    model: String,
}

impl SqliteStore {
    /// 打开或创建索引数据库
    pub async fn open(filename: impl AsRef<Path>, dim: usize, model: &str) -> Result<Self> {
        let filename = filename.as_ref();
        if let Some(parent) = filename.parent() {
            std::fs::create_dir_all(parent).map_err(|e| anyhow!("无法创建数据目录: {e}"))?;
        }
        info!("初始化索引数据库: {}", filename.display());

        let options = SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .filename(filename)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS footprint (
                id         TEXT PRIMARY KEY,
                image_ref  TEXT NOT NULL,
                attributes TEXT NOT NULL,
                embedding  BLOB NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let store = Self { pool, dim, model: model.to_string() };
        store.check_meta().await?;
        Ok(store)
    }

    /// 校验索引维度与嵌入模型，首次打开时写入
    async fn check_meta(&self) -> Result<()> {
        match self.meta_get("dim").await? {
            Some(value) => {
                let indexed: usize =
                    value.parse().map_err(|_| anyhow!("index_meta 中的维度无法解析: {value}"))?;
                check_dim(indexed, self.dim)?;
            }
            None => self.meta_set("dim", &self.dim.to_string()).await?,
        }
        match self.meta_get("model").await? {
            Some(indexed) if indexed != self.model => {
                return Err(Error::ModelMismatch { indexed, current: self.model.clone() });
            }
            Some(_) => {}
            None => self.meta_set("model", &self.model).await?,
        }
        Ok(())
    }

    async fn meta_get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM index_meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn meta_set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO index_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn record_from_row(row: &SqliteRow) -> Result<FootprintRecord> {
        let attributes: AttrMap = serde_json::from_str(&row.get::<String, _>("attributes"))
            .map_err(|e| anyhow!("记录属性反序列化失败: {e}"))?;
        let blob: Vec<u8> = row.get("embedding");
        if blob.len() % 4 != 0 {
            return Err(anyhow!("嵌入向量二进制长度非法: {}", blob.len()).into());
        }
        let embedding: Vec<f32> = bytemuck::pod_collect_to_vec(&blob);
        let created_at: String = row.get("created_at");
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| anyhow!("记录时间戳解析失败: {e}"))?
            .with_timezone(&Utc);
        Ok(FootprintRecord {
            id: row.get("id"),
            image_ref: row.get("image_ref"),
            attributes,
            embedding,
            created_at,
        })
    }
}

impl VectorStore for SqliteStore {
    fn dim(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn upsert(&self, record: FootprintRecord, overwrite: bool) -> Result<bool> {
        check_dim(self.dim, record.embedding.len())?;
        let attributes = serde_json::to_string(&record.attributes)
            .map_err(|e| anyhow!("记录属性序列化失败: {e}"))?;
        let embedding: &[u8] = bytemuck::cast_slice(&record.embedding);

        let sql = if overwrite {
            "INSERT OR REPLACE INTO footprint (id, image_ref, attributes, embedding, created_at)
             VALUES (?, ?, ?, ?, ?)"
        } else {
            "INSERT OR IGNORE INTO footprint (id, image_ref, attributes, embedding, created_at)
             VALUES (?, ?, ?, ?, ?)"
        };
        let exists = sqlx::query("SELECT 1 FROM footprint WHERE id = ?")
            .bind(&record.id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        sqlx::query(sql)
            .bind(&record.id)
            .bind(&record.image_ref)
            .bind(&attributes)
            .bind(embedding)
            .bind(record.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(!exists)
    }

    async fn bulk_upsert(
        &self,
        records: Vec<FootprintRecord>,
        drop_existing: bool,
    ) -> Result<BulkReport> {
        let mut tx = self.pool.begin().await?;
        if drop_existing {
            info!("drop_existing: 清空现有索引");
            sqlx::query("DELETE FROM footprint").execute(&mut *tx).await?;
        }

        let mut report = BulkReport::default();
        for record in records {
            if record.embedding.len() != self.dim {
                report.failed += 1;
                continue;
            }
            let attributes = serde_json::to_string(&record.attributes)
                .map_err(|e| anyhow!("记录属性序列化失败: {e}"))?;
            let embedding: &[u8] = bytemuck::cast_slice(&record.embedding);
            let result = sqlx::query(
                "INSERT OR IGNORE INTO footprint (id, image_ref, attributes, embedding, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(&record.image_ref)
            .bind(&attributes)
            .bind(embedding)
            .bind(record.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 1 {
                report.inserted += 1;
            } else {
                report.skipped += 1;
            }
        }
        tx.commit().await?;
        Ok(report)
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(FootprintRecord, f32)>> {
        check_dim(self.dim, query.len())?;
        // 记录规模在数千条以内，直接全量扫描做精确余弦检索
        let rows = sqlx::query(
            "SELECT id, image_ref, attributes, embedding, created_at FROM footprint",
        )
        .fetch_all(&self.pool)
        .await?;
        let records =
            rows.iter().map(Self::record_from_row).collect::<Result<Vec<FootprintRecord>>>()?;
        Ok(rank_nearest(records, query, k))
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM footprint")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count") as u64)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM footprint").execute(&self.pool).await?;
        Ok(())
    }
}
