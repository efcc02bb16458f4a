//! End-to-end loading into an on-disk store.

use crate::backend::SearchBackend;
use crate::embeddings::EmbeddingProvider;
use crate::types::LoadOptions;
use sift_core::EmbeddingSettings;
use tempfile::TempDir;

const FUNDING: &str = r#"{"document_title":"OpenAI News","document_source":"news/openai.md","content":"OpenAI closed a new funding round led by major investors."}
{"document_title":"OpenAI News","document_source":"news/openai.md","content":"The funding values OpenAI far above last year."}
{"document_title":"Cooking","document_source":"food/pasta.md","content":"Boil the pasta in salted water for nine minutes."}
{"document_title":"Cooking","document_source":"food/pasta.md","content":"   "}
"#;

fn write_sources(temp: &TempDir) -> std::path::PathBuf {
    let dir = temp.path().join("sources");
    std::fs::create_dir_all(dir.join("nested")).unwrap();
    std::fs::write(dir.join("nested").join("chunks.jsonl"), FUNDING).unwrap();
    std::fs::write(dir.join("README.txt"), "ignored").unwrap();
    dir
}

#[tokio::test]
async fn test_load_directory_and_stats() {
    let temp = TempDir::new().unwrap();
    let sources = write_sources(&temp);

    let stats = crate::load(
        temp.path(),
        LoadOptions {
            paths: vec![sources],
            reset: false,
        },
        &EmbeddingSettings::default(),
    )
    .await
    .unwrap();

    assert_eq!(stats.files_count, 1);
    assert_eq!(stats.documents_count, 2);
    assert_eq!(stats.chunks_count, 3);
    assert_eq!(stats.skipped_count, 1);

    let store = crate::stats(temp.path()).unwrap();
    assert_eq!(store.documents_count, 2);
    assert_eq!(store.chunks_count, 3);
    assert!(store.db_size_bytes > 0);
}

#[tokio::test]
async fn test_loaded_chunks_are_searchable() {
    let temp = TempDir::new().unwrap();
    let sources = write_sources(&temp);
    let settings = EmbeddingSettings::default();

    crate::load(
        temp.path(),
        LoadOptions {
            paths: vec![sources],
            reset: false,
        },
        &settings,
    )
    .await
    .unwrap();

    let provider = crate::create_provider(&settings).unwrap();
    let query = provider.embed("OpenAI funding").await.unwrap();
    let index = crate::open_index(temp.path()).unwrap();

    let hits = index.semantic(&query, 10, 0.0).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].document_title, "OpenAI News");
}

#[tokio::test]
async fn test_reload_with_reset_replaces_content() {
    let temp = TempDir::new().unwrap();
    let sources = write_sources(&temp);
    let settings = EmbeddingSettings::default();

    for _ in 0..2 {
        crate::load(
            temp.path(),
            LoadOptions {
                paths: vec![sources.clone()],
                reset: true,
            },
            &settings,
        )
        .await
        .unwrap();
    }

    assert_eq!(crate::stats(temp.path()).unwrap().chunks_count, 3);

    crate::clean(temp.path()).unwrap();
    assert_eq!(crate::stats(temp.path()).unwrap().chunks_count, 0);
}

#[test]
fn test_stats_without_store_fails() {
    let temp = TempDir::new().unwrap();
    assert!(crate::stats(temp.path()).is_err());
    assert!(crate::clean(temp.path()).is_err());
}

#[tokio::test]
async fn test_document_split_across_files_keeps_positions() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("sources");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("a.jsonl"),
        r#"{"document_title":"Report","document_source":"report.md","content":"Part one of the report.","chunk_id":"r1"}
{"document_title":"Report","document_source":"report.md","content":"Part two of the report.","chunk_id":"r2"}
"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("b.jsonl"),
        r#"{"document_title":"Report","document_source":"report.md","content":"Part three of the report.","chunk_id":"r3"}
"#,
    )
    .unwrap();

    let stats = crate::load(
        temp.path(),
        LoadOptions {
            paths: vec![dir],
            reset: false,
        },
        &EmbeddingSettings::default(),
    )
    .await
    .unwrap();
    assert_eq!(stats.files_count, 2);

    let index_path = crate::config::get_index_path(temp.path());
    let conn = rusqlite::Connection::open(index_path).unwrap();
    let mut stmt = conn
        .prepare("SELECT id, position FROM chunks ORDER BY id")
        .unwrap();
    let positions: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(
        positions,
        vec![
            ("r1".to_string(), 0),
            ("r2".to_string(), 1),
            ("r3".to_string(), 2)
        ]
    );
    assert_eq!(crate::stats(temp.path()).unwrap().documents_count, 1);
}
