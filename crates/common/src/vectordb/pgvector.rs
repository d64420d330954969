//! Vector store on top of Postgres with the pgvector extension
//!
//! All collections share the `vector_chunks` table, keyed by chunk id and
//! partitioned by the `collection` column.

use super::{ChunkMetadata, ScoredChunk, VectorRecord, VectorStore};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbBackend, Statement, TransactionTrait};
use tokio::sync::OnceCell;

pub struct PgVectorStore {
    pool: DbPool,
    dimension: usize,
    schema_ready: OnceCell<()>,
}

/// Convert Vec<f32> to pgvector string format "[1,2,...]"
fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

impl PgVectorStore {
    pub fn new(pool: DbPool, dimension: usize) -> Self {
        Self {
            pool,
            dimension,
            schema_ready: OnceCell::new(),
        }
    }

    /// Create the extension, table and index once per process
    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                let conn = self.pool.conn();
                conn.execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
                    .await?;
                conn.execute_unprepared(&format!(
                    r#"
                    CREATE TABLE IF NOT EXISTS vector_chunks (
                        id TEXT PRIMARY KEY,
                        collection TEXT NOT NULL,
                        content TEXT NOT NULL,
                        metadata JSONB NOT NULL,
                        embedding vector({}) NOT NULL
                    )
                    "#,
                    self.dimension
                ))
                .await?;
                conn.execute_unprepared(
                    "CREATE INDEX IF NOT EXISTS vector_chunks_collection_idx ON vector_chunks (collection)",
                )
                .await?;
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn name(&self) -> &str {
        "pgvector"
    }

    async fn create_collection(&self, _collection: &str) -> Result<()> {
        self.ensure_schema().await
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.ensure_schema().await?;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "DELETE FROM vector_chunks WHERE collection = $1",
            vec![collection.into()],
        );
        self.pool.conn().execute(stmt).await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        self.ensure_schema().await?;

        // All or nothing: a dropped transaction rolls back
        let txn = self.pool.conn().begin().await?;
        for record in records {
            if record.embedding.len() != self.dimension {
                return Err(AppError::VectorStore {
                    message: format!(
                        "Embedding has {} dimensions, table expects {}",
                        record.embedding.len(),
                        self.dimension
                    ),
                });
            }

            let metadata = serde_json::to_string(&record.metadata)?;
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO vector_chunks (id, collection, content, metadata, embedding)
                VALUES ($1, $2, $3, $4::jsonb, $5::vector)
                ON CONFLICT (id) DO UPDATE SET
                    collection = EXCLUDED.collection,
                    content = EXCLUDED.content,
                    metadata = EXCLUDED.metadata,
                    embedding = EXCLUDED.embedding
                "#,
                vec![
                    record.id.into(),
                    collection.into(),
                    record.text.into(),
                    metadata.into(),
                    vector_literal(&record.embedding).into(),
                ],
            );
            txn.execute(stmt).await?;
        }
        txn.commit().await?;

        Ok(())
    }

    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.ensure_schema().await?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT
                id,
                content,
                metadata::text,
                (1 - (embedding <=> $1::vector))::float8 as score
            FROM vector_chunks
            WHERE collection = $2
            ORDER BY embedding <=> $1::vector
            LIMIT $3
            "#,
            vec![
                vector_literal(embedding).into(),
                collection.into(),
                (k as i64).into(),
            ],
        );

        let results = self
            .pool
            .conn()
            .query_all(stmt)
            .await?
            .into_iter()
            .filter_map(|row| {
                let metadata: ChunkMetadata =
                    serde_json::from_str(&row.try_get_by_index::<String>(2).ok()?).ok()?;
                Some(ScoredChunk {
                    id: row.try_get_by_index::<String>(0).ok()?,
                    text: row.try_get_by_index::<String>(1).ok()?,
                    metadata,
                    score: row.try_get_by_index::<f64>(3).ok()? as f32,
                })
            })
            .collect();

        Ok(results)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        self.ensure_schema().await?;

        for id in ids {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "DELETE FROM vector_chunks WHERE collection = $1 AND id = $2",
                vec![collection.into(), id.as_str().into()],
            );
            self.pool.conn().execute(stmt).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[1.0, 0.5, -2.0]), "[1,0.5,-2]");
        assert_eq!(vector_literal(&[]), "[]");
    }
}
