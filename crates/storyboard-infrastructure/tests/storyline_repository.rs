use storyboard_core::backend::StorylineSink;
use storyboard_core::scene::{SceneRecord, StoryDocument};
use storyboard_infrastructure::JsonStorylineRepository;
use tempfile::TempDir;

fn document(name: &str, descriptions: &[&str]) -> StoryDocument {
    let mut doc = StoryDocument::default();
    doc.stories.insert(
        name.to_string(),
        descriptions
            .iter()
            .map(|d| SceneRecord::new(*d, format!("{}, 3d", d)))
            .collect(),
    );
    doc
}

#[tokio::test]
async fn test_save_merges_into_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    let repository = JsonStorylineRepository::with_path(temp_dir.path().join("storylines.json"));

    repository.save(&document("cats", &["a cat"])).await.unwrap();
    repository.save(&document("dogs", &["a dog"])).await.unwrap();
    repository
        .save(&document("cats", &["a cat", "a sleeping cat"]))
        .await
        .unwrap();

    let stored = repository.load_all().unwrap();
    assert_eq!(stored.stories.len(), 2);
    assert_eq!(stored.stories["cats"].len(), 2);
    assert_eq!(
        stored.stories["dogs"][0].description.as_deref(),
        Some("a dog")
    );
}

#[tokio::test]
async fn test_empty_document_does_not_create_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("storylines.json");
    let repository = JsonStorylineRepository::with_path(&path);

    repository.save(&StoryDocument::default()).await.unwrap();
    assert!(!path.exists());
    assert!(repository.load_all().unwrap().is_empty());
}

#[test]
fn test_file_layout_is_camel_case_map() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("storylines.json");
    let repository = JsonStorylineRepository::with_path(&path);

    repository
        .save_document(&document("cats", &["a cat"]))
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["cats"][0]["imagePrompt"], "a cat, 3d");
}

#[test]
fn test_corrupt_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("storylines.json");
    std::fs::write(&path, "[1, 2").unwrap();

    let repository = JsonStorylineRepository::with_path(&path);
    let err = repository.load_all().unwrap_err();
    assert!(err.is_serialization());
}
