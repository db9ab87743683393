//! Tests for the learn / search / stats / clean lifecycle.

use crate::{clean, learn, open_or_build, search, stats, LearnOptions, VectorStore};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;

    fn write_corpus(dir: &Path) {
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(
            dir.join("solar.txt"),
            "Solar energy is sustainable. Solar panels convert sunlight into electricity!!!",
        )
        .unwrap();
        fs::write(
            dir.join("nested/wind.md"),
            "Wind turbines supply rural areas with clean electricity. Page 2 of 9",
        )
        .unwrap();
        fs::write(dir.join("image.png"), [0u8, 1, 2]).unwrap();
    }

    /// Single-page PDF showing `text` in a standard font.
    fn write_pdf(path: &Path, text: &str) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn options(paths: Vec<std::path::PathBuf>, reset: bool) -> LearnOptions {
        LearnOptions {
            base_name: "default".to_string(),
            paths,
            reset,
        }
    }

    #[tokio::test]
    async fn test_learn_indexes_supported_files() {
        let workspace = TempDir::new().unwrap();
        let data = workspace.path().join("data");
        write_corpus(&data);

        let learned = learn(workspace.path(), options(vec![data], false))
            .await
            .unwrap();

        assert_eq!(learned.sources_count, 2);
        assert_eq!(learned.chunks_count, 2);

        let base = stats(workspace.path(), "default").unwrap();
        assert_eq!(base.sources_count, 2);
        assert_eq!(base.chunks_count, 2);
        assert!(base.last_learn_at.is_some());
        assert!(workspace
            .path()
            .join(".sage/knowledge/default/config.yaml")
            .exists());
    }

    #[tokio::test]
    async fn test_search_returns_cleaned_text_with_source() {
        let workspace = TempDir::new().unwrap();
        let data = workspace.path().join("data");
        write_corpus(&data);
        learn(workspace.path(), options(vec![data], false))
            .await
            .unwrap();

        let docs = search(workspace.path(), "default", "wind turbines rural electricity", 5)
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "wind.md");
        assert!(!docs[0].text.contains("Page 2 of 9"));
        assert!(docs[0].score >= docs[1].score);
    }

    #[tokio::test]
    async fn test_relearning_is_idempotent() {
        let workspace = TempDir::new().unwrap();
        let data = workspace.path().join("data");
        write_corpus(&data);

        learn(workspace.path(), options(vec![data.clone()], false))
            .await
            .unwrap();
        learn(workspace.path(), options(vec![data], false))
            .await
            .unwrap();

        let base = stats(workspace.path(), "default").unwrap();
        assert_eq!(base.sources_count, 2);
        assert_eq!(base.chunks_count, 2);
    }

    #[tokio::test]
    async fn test_open_or_build_ingests_empty_base() {
        let workspace = TempDir::new().unwrap();
        let data = workspace.path().join("data");
        write_corpus(&data);

        let store = open_or_build(workspace.path(), "default", &data)
            .await
            .unwrap();
        assert_eq!(store.chunk_count().unwrap(), 2);

        let docs = store.similarity_search("solar panels", 1).await.unwrap();
        assert_eq!(docs[0].source, "solar.txt");
    }

    #[tokio::test]
    async fn test_open_or_build_without_data_dir_fails() {
        let workspace = TempDir::new().unwrap();
        let missing = workspace.path().join("nope");

        assert!(open_or_build(workspace.path(), "default", &missing)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_clean_empties_base() {
        let workspace = TempDir::new().unwrap();
        let data = workspace.path().join("data");
        write_corpus(&data);
        learn(workspace.path(), options(vec![data], false))
            .await
            .unwrap();

        clean(workspace.path(), "default").unwrap();

        let base = stats(workspace.path(), "default").unwrap();
        assert_eq!(base.chunks_count, 0);
        assert!(clean(workspace.path(), "other").is_err());
    }

    #[tokio::test]
    async fn test_pdf_only_corpus_is_ingested() {
        let workspace = TempDir::new().unwrap();
        let data = workspace.path().join("data");
        fs::create_dir_all(&data).unwrap();
        write_pdf(
            &data.join("report.pdf"),
            "Geothermal plants draw heat from deep underground. Page 1 of 1",
        );

        let store = open_or_build(workspace.path(), "default", &data)
            .await
            .unwrap();
        assert_eq!(store.base_name(), "default");
        assert_eq!(store.chunk_count().unwrap(), 1);

        let docs = store
            .similarity_search("geothermal heat underground", 1)
            .await
            .unwrap();
        assert_eq!(docs[0].source, "report.pdf");
        assert!(docs[0].text.contains("Geothermal plants"));
        assert!(!docs[0].text.contains("Page 1 of 1"));
    }
}
