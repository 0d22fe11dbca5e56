//! Per-contract vector index.
//!
//! A contract's text is split once into `chunks`; each chunk's embedding is
//! stored in `chunk_vectors` keyed by embedding model. Hydration loads both
//! into a [`VectorIndex`], embedding only the chunks that have no vector for
//! the current model yet, so a contract is embedded once per model instead
//! of on every load.

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::chunk::chunk_contract;
use crate::config::ChunkingConfig;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::error::AssistantError;
use crate::models::{Chunk, Contract, RetrievedChunk};

struct IndexedChunk {
    chunk_id: String,
    chunk_index: i64,
    text: String,
    vector: Vec<f32>,
}

/// In-memory similarity index over one contract's chunks.
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Build from chunks and their vectors (paired by position).
    /// Returns `None` when there is nothing to index.
    pub fn from_chunks(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Option<Self> {
        let entries: Vec<IndexedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk {
                chunk_id: chunk.id,
                chunk_index: chunk.chunk_index,
                text: chunk.text,
                vector,
            })
            .collect();

        if entries.is_empty() {
            None
        } else {
            Some(Self { entries })
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top `k` chunks by cosine similarity, best first; ties keep document order.
    pub fn similarity_search(&self, query_vec: &[f32], k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_vec, &e.vector), e))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.chunk_index.cmp(&b.1.chunk_index))
        });

        scored
            .into_iter()
            .take(k)
            .map(|(score, e)| RetrievedChunk {
                chunk_id: e.chunk_id.clone(),
                chunk_index: e.chunk_index,
                text: e.text.clone(),
                score,
            })
            .collect()
    }
}

/// Load (or build and persist) the index for a contract.
///
/// Returns `Ok(None)` when the contract text produces no chunks.
pub async fn hydrate_index(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    contract: &Contract,
) -> Result<Option<VectorIndex>, AssistantError> {
    let mut chunks = load_chunks(pool, contract.id).await?;

    if chunks.is_empty() {
        let fresh = chunk_contract(contract.id, &contract.content, chunking);
        if fresh.is_empty() {
            return Ok(None);
        }
        insert_chunks(pool, &fresh).await?;
        // Re-read so a concurrent hydration that won the insert is honoured.
        chunks = load_chunks(pool, contract.id).await?;
    }

    let model = embedder.model_name().to_string();
    let dims = embedder.dims();
    let mut stored = load_vectors(pool, contract.id, &model).await?;

    // Stale when the text changed or the configured dimensionality did.
    let missing: Vec<&Chunk> = chunks
        .iter()
        .filter(|c| {
            stored
                .get(&c.id)
                .map(|(hash, vector)| hash != &c.hash || vector.len() != dims)
                .unwrap_or(true)
        })
        .collect();

    if !missing.is_empty() {
        tracing::info!(
            contract_id = contract.id,
            chunks = missing.len(),
            model = %model,
            "embedding contract chunks"
        );
        let texts: Vec<String> = missing.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder
            .embed_documents(&texts)
            .await
            .map_err(AssistantError::provider)?;

        if vectors.len() != missing.len() {
            return Err(AssistantError::provider(anyhow::anyhow!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                missing.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(AssistantError::provider(anyhow::anyhow!(
                "embedder returned a {}-dimensional vector, expected {}",
                bad.len(),
                dims
            )));
        }

        let mut tx = pool.begin().await?;
        for (chunk, vector) in missing.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (chunk_id, contract_id, model, dims, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id, model) DO UPDATE SET
                    dims = excluded.dims,
                    hash = excluded.hash,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&chunk.id)
            .bind(chunk.contract_id)
            .bind(&model)
            .bind(dims as i64)
            .bind(&chunk.hash)
            .bind(vec_to_blob(&vector))
            .execute(&mut *tx)
            .await?;
            stored.insert(chunk.id.clone(), (chunk.hash.clone(), vector));
        }
        tx.commit().await?;
    }

    let mut vectors = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let (_, vector) = stored
            .remove(&chunk.id)
            .ok_or_else(|| anyhow::anyhow!("chunk {} has no stored vector", chunk.id))?;
        vectors.push(vector);
    }

    Ok(VectorIndex::from_chunks(chunks, vectors))
}

/// Drop the contract's chunks and vectors, then hydrate from scratch.
pub async fn rebuild_index(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    contract: &Contract,
) -> Result<Option<VectorIndex>, AssistantError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM chunk_vectors WHERE contract_id = ?")
        .bind(contract.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks WHERE contract_id = ?")
        .bind(contract.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    hydrate_index(pool, embedder, chunking, contract).await
}

pub async fn load_chunks(pool: &SqlitePool, contract_id: i64) -> Result<Vec<Chunk>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, contract_id, chunk_index, text, hash
        FROM chunks
        WHERE contract_id = ?
        ORDER BY chunk_index
        "#,
    )
    .bind(contract_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Chunk {
            id: row.get("id"),
            contract_id: row.get("contract_id"),
            chunk_index: row.get("chunk_index"),
            text: row.get("text"),
            hash: row.get("hash"),
        })
        .collect())
}

async fn insert_chunks(pool: &SqlitePool, chunks: &[Chunk]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for chunk in chunks {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO chunks (id, contract_id, chunk_index, text, hash)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(chunk.contract_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

/// chunk_id → (hash, vector) for one contract and model.
async fn load_vectors(
    pool: &SqlitePool,
    contract_id: i64,
    model: &str,
) -> Result<HashMap<String, (String, Vec<f32>)>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT chunk_id, hash, embedding FROM chunk_vectors WHERE contract_id = ? AND model = ?",
    )
    .bind(contract_id)
    .bind(model)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            (row.get("chunk_id"), (row.get("hash"), blob_to_vec(&blob)))
        })
        .collect())
}
