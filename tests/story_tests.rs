/// Story loading and linting integration tests.

use story_player::core::config::PlayerConfig;
use story_player::schema::story::{Severity, StoryDocument, StoryError};
use std::path::Path;

#[test]
fn demo_story_loads_in_document_order() {
    let story = StoryDocument::load(Path::new("stories/lighthouse.json")).unwrap();
    assert_eq!(story.len(), 6);
    assert_eq!(story.first_scene_id(), "scene1");

    let expected = ["scene1", "scene2", "scene2cold", "scene3", "scene3dark", "scene4"];
    assert_eq!(story.scene_ids().collect::<Vec<_>>(), expected);

    let door = story.get("scene1").unwrap();
    assert_eq!(door.setting, "The Lighthouse Door");
    assert!(door.setting_description.is_some());
    assert_eq!(door.choice_list().len(), 2);
    assert_eq!(
        door.choice_list()[1].description.as_deref(),
        Some("The lamp above has been dark for years.")
    );
}

#[test]
fn demo_story_lints_clean() {
    let story = StoryDocument::load(Path::new("stories/lighthouse.json")).unwrap();
    let issues = story.lint(None);
    assert!(issues.is_empty(), "unexpected lint issues: {issues:?}");
}

#[test]
fn broken_links_are_reported() {
    let story = StoryDocument::load(Path::new("tests/fixtures/broken_links.json")).unwrap();
    let issues = story.lint(None);

    let errors: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.scene == "start"));
    assert!(errors.iter().any(|e| e.message.contains("'right_road'")));
    assert!(errors.iter().any(|e| e.message.contains("'lost'")));

    let warned: Vec<&str> = issues
        .iter()
        .filter(|i| i.severity == Severity::Warning)
        .map(|i| i.scene.as_str())
        .collect();
    assert!(warned.contains(&"island"));
    assert!(warned.contains(&"left_road"));
}

#[test]
fn missing_next_fails_to_load() {
    let err = StoryDocument::load(Path::new("tests/fixtures/missing_next.json")).unwrap_err();
    match err {
        StoryError::MalformedChoice { scene, index } => {
            assert_eq!(scene, "scene1");
            assert_eq!(index, 1);
        }
        other => panic!("expected MalformedChoice, got {other:?}"),
    }
}

#[test]
fn missing_file_is_io_error() {
    let err = StoryDocument::load(Path::new("tests/fixtures/does_not_exist.json")).unwrap_err();
    assert!(matches!(err, StoryError::Io(_)));
}

#[test]
fn truncated_json_is_rejected() {
    let err = StoryDocument::from_json(r#"{ "scene1": { "setting": "x", "dialogue": [["A""#)
        .unwrap_err();
    assert!(matches!(err, StoryError::Json(_)));
}

#[test]
fn sample_player_config_loads() {
    let config = PlayerConfig::load_from_ron(Path::new("config/player.ron")).unwrap();
    assert_eq!(config.act, 1);
    assert_eq!(config.reveal.ms_per_char, 25);
    assert_eq!(config.autosave.debounce_ms, 750);
    assert!(config.entry_scene.is_none());
}
