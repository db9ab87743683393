//! Knowledge base management.
//!
//! Local-first document store: `.txt`/`.md` files are cleaned, chunked,
//! embedded and kept in a per-base SQLite index under `.sage/knowledge/`.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod parser;
pub mod types;
pub mod vector_index;

pub use types::{
    BaseStats, KnowledgeBaseConfig, KnowledgeChunk, KnowledgeSource, LearnOptions, LearnStats,
};
pub use vector_index::{ScoredDocument, SqliteVectorStore, VectorStore};

use chrono::Utc;
use embeddings::EmbeddingProvider;
use rusqlite::Connection;
use sage_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use walkdir::WalkDir;

/// Learn from files and populate the knowledge base.
pub async fn learn(workspace: &Path, options: LearnOptions) -> AppResult<LearnStats> {
    let start = Instant::now();

    tracing::info!("Starting learn operation for base '{}'", options.base_name);

    let kb_config = config::load_config(workspace, &options.base_name)?;
    let index_path = config::get_index_path(workspace, &options.base_name);
    let conn = index::init_index(&index_path)?;

    if options.reset {
        tracing::info!("Resetting knowledge base");
        index::reset_index(&conn)?;
    }
    let conn = Mutex::new(conn);

    let embedder = embeddings::create_provider(&kb_config)?;
    let mut stats = LearnStats::default();

    for path in collect_files(&options.paths) {
        match process_file(&conn, embedder.as_ref(), &kb_config, &path).await {
            Ok(Some((chunks, bytes))) => {
                stats.sources_count += 1;
                stats.chunks_count += chunks;
                stats.bytes_processed += bytes;
            }
            Ok(None) => stats.skipped_count += 1,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", path, e);
                stats.skipped_count += 1;
            }
        }
    }

    // Pin the embedding settings the index was built with
    config::save_config(workspace, &kb_config)?;

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Learn operation completed: {} sources, {} chunks, {} bytes in {:.2}s",
        stats.sources_count,
        stats.chunks_count,
        stats.bytes_processed,
        stats.duration_secs
    );

    Ok(stats)
}

/// Expand directories into the supported files beneath them, sorted.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file()
                    && parser::ContentType::from_path(entry_path).is_supported()
                {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            tracing::warn!("Path does not exist: {:?}", path);
        }
    }

    files
}

/// Ingest one file. `Ok(None)` when it held no usable text.
async fn process_file(
    conn: &Mutex<Connection>,
    embedder: &dyn EmbeddingProvider,
    kb_config: &KnowledgeBaseConfig,
    path: &Path,
) -> AppResult<Option<(u32, u64)>> {
    tracing::debug!("Processing file: {:?}", path);

    let text = parser::parse_file(path)?;
    if text.is_empty() {
        tracing::debug!("No text left after cleaning {:?}", path);
        return Ok(None);
    }
    let size_bytes = text.len() as u64;

    let candidates = chunker::chunk_text(
        &text,
        kb_config.chunk_size as usize,
        kb_config.chunk_overlap as usize,
    );
    let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;

    let source = KnowledgeSource {
        id: index::source_id(path),
        name: parser::source_name(path),
        path: path.to_path_buf(),
        learned_at: Utc::now(),
        size_bytes,
    };

    let chunks: Vec<KnowledgeChunk> = candidates
        .into_iter()
        .zip(vectors)
        .map(|(candidate, embedding)| KnowledgeChunk {
            id: index::chunk_id(&source.id, candidate.position, &candidate.text),
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            position: candidate.position,
            text: candidate.text,
            embedding: Some(embedding),
        })
        .collect();

    {
        let conn = conn
            .lock()
            .map_err(|_| AppError::Knowledge("Index connection lock poisoned".to_string()))?;
        index::insert_source(&conn, &source)?;
        for chunk in &chunks {
            index::insert_chunk(&conn, chunk)?;
        }
    }

    tracing::debug!(
        "Processed {:?}: {} chunks, {} bytes",
        path,
        chunks.len(),
        size_bytes
    );

    Ok(Some((chunks.len() as u32, size_bytes)))
}

/// Raw similarity search, without any relevance threshold.
pub async fn search(
    workspace: &Path,
    base_name: &str,
    query: &str,
    top_k: usize,
) -> AppResult<Vec<ScoredDocument>> {
    tracing::info!(
        "Searching knowledge base '{}' with query: {}",
        base_name,
        query
    );

    let store = SqliteVectorStore::open(workspace, base_name)?;
    store.similarity_search(query, top_k).await
}

/// Open a base, ingesting `data_dir` first when the index is missing or empty.
pub async fn open_or_build(
    workspace: &Path,
    base_name: &str,
    data_dir: &Path,
) -> AppResult<SqliteVectorStore> {
    let index_path = config::get_index_path(workspace, base_name);
    let has_chunks = index_path.exists() && {
        let conn = index::init_index(&index_path)?;
        index::get_stats(&conn)?.1 > 0
    };

    if has_chunks {
        tracing::info!("Loading existing knowledge base '{}'", base_name);
    } else {
        if !data_dir.is_dir() {
            return Err(AppError::Knowledge(format!(
                "Knowledge base '{}' is empty and data directory {:?} does not exist",
                base_name, data_dir
            )));
        }

        tracing::info!(
            "Knowledge base '{}' is empty, building it from {:?}",
            base_name,
            data_dir
        );
        let stats = learn(
            workspace,
            LearnOptions {
                base_name: base_name.to_string(),
                paths: vec![data_dir.to_path_buf()],
                reset: false,
            },
        )
        .await?;

        if stats.chunks_count == 0 {
            tracing::warn!("No documents found in {:?}", data_dir);
        }
    }

    SqliteVectorStore::open(workspace, base_name)
}

/// Clean (reset) a knowledge base.
pub fn clean(workspace: &Path, base_name: &str) -> AppResult<()> {
    tracing::info!("Cleaning knowledge base '{}'", base_name);

    let index_path = existing_index(workspace, base_name)?;
    let conn = index::init_index(&index_path)?;
    index::reset_index(&conn)?;

    tracing::info!("Knowledge base '{}' cleaned", base_name);
    Ok(())
}

/// Get statistics for a knowledge base.
pub fn stats(workspace: &Path, base_name: &str) -> AppResult<BaseStats> {
    let index_path = existing_index(workspace, base_name)?;
    let conn = index::init_index(&index_path)?;
    let (sources_count, chunks_count) = index::get_stats(&conn)?;
    let last_learn_at = index::last_learned_at(&conn)?;

    let db_size_bytes = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    Ok(BaseStats {
        base_name: base_name.to_string(),
        sources_count,
        chunks_count,
        db_size_bytes,
        last_learn_at,
    })
}

fn existing_index(workspace: &Path, base_name: &str) -> AppResult<PathBuf> {
    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }
    Ok(index_path)
}

#[cfg(test)]
mod tests;
