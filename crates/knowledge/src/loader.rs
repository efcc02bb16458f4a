//! Loader for pre-chunked JSONL input.
//!
//! Each non-blank line is one [`ChunkRecord`]. Records are embedded in
//! batches and written to the index in file order, so chunks of one
//! document keep their relative positions, also across files.

use crate::embeddings::{embed_in_batches, EmbeddingProvider};
use crate::index::SqliteIndex;
use crate::types::{ChunkRecord, DocumentRecord, LoadStats, StoredChunk};
use chrono::Utc;
use sha2::{Digest, Sha256};
use sift_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const JSONL_EXTENSION: &str = "jsonl";

/// Collect the JSONL files named by `path`.
///
/// A file is taken as-is; a directory is walked for `*.jsonl` files in
/// sorted order.
pub fn collect_files(path: &Path) -> AppResult<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        return Err(AppError::Knowledge(format!(
            "Path does not exist: {:?}",
            path
        )));
    }

    let files = WalkDir::new(path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext == JSONL_EXTENSION)
        })
        .map(|e| e.into_path())
        .collect();

    Ok(files)
}

/// Parse JSONL text into chunk records.
///
/// Blank lines are ignored. A malformed line fails the whole file with its
/// line number.
pub fn parse_records(contents: &str, origin: &Path) -> AppResult<Vec<ChunkRecord>> {
    let mut records = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record: ChunkRecord = serde_json::from_str(line).map_err(|e| {
            AppError::Knowledge(format!(
                "Invalid chunk record at {:?} line {}: {}",
                origin,
                line_no + 1,
                e
            ))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Stable document identifier derived from the document source.
pub fn document_id_for(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Embed and store one file's records. Returns (documents, chunks, skipped).
///
/// The file is written in one transaction. Chunks of a document already in
/// the index are placed after its stored chunks.
pub async fn load_file(
    index: &SqliteIndex,
    provider: &dyn EmbeddingProvider,
    path: &Path,
    batch_size: usize,
) -> AppResult<(u32, u32, u32)> {
    tracing::debug!("Loading chunk file: {:?}", path);

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;
    let records = parse_records(&contents, path)?;

    let (records, skipped): (Vec<ChunkRecord>, Vec<ChunkRecord>) = records
        .into_iter()
        .partition(|record| !record.content.trim().is_empty());

    if !skipped.is_empty() {
        tracing::warn!(
            "Skipping {} blank chunk records in {:?}",
            skipped.len(),
            path
        );
    }

    let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
    let embeddings = embed_in_batches(provider, &texts, batch_size).await?;

    let mut positions: HashMap<String, u32> = HashMap::new();
    let mut documents = Vec::new();
    let mut chunks = Vec::with_capacity(records.len());

    for (record, embedding) in records.into_iter().zip(embeddings) {
        let document_id = record
            .document_id
            .clone()
            .unwrap_or_else(|| document_id_for(&record.document_source));

        if !positions.contains_key(&document_id) {
            documents.push(DocumentRecord {
                id: document_id.clone(),
                title: record.document_title.clone(),
                source: record.document_source.clone(),
                metadata: Default::default(),
                created_at: Utc::now(),
            });
        }

        let position = positions.entry(document_id.clone()).or_insert(0);
        chunks.push(StoredChunk {
            id: record
                .chunk_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            document_id,
            position: *position,
            content: record.content,
            embedding,
            metadata: record.metadata,
        });
        *position += 1;
    }

    let counts = (documents.len() as u32, chunks.len() as u32, skipped.len() as u32);
    index.append(documents, chunks).await?;
    Ok(counts)
}

/// Load every JSONL file under `paths`.
pub async fn load_paths(
    index: &SqliteIndex,
    provider: &dyn EmbeddingProvider,
    paths: &[PathBuf],
    batch_size: usize,
) -> AppResult<LoadStats> {
    let mut stats = LoadStats::default();

    for path in paths {
        for file in collect_files(path)? {
            let (documents, chunks, skipped) =
                load_file(index, provider, &file, batch_size).await?;
            stats.files_count += 1;
            stats.documents_count += documents;
            stats.chunks_count += chunks;
            stats.skipped_count += skipped;
        }
    }

    Ok(stats)
}
