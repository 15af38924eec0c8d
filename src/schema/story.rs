/// Story Document — the immutable scene graph for one playable act,
/// with loading from JSON or RON and content-integrity linting.
use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use super::scene::{Choice, RawChoice, RawScene, Scene};

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("story document has no scenes")]
    EmptyDocument,
    #[error("scene '{0}' is defined more than once")]
    DuplicateScene(String),
    #[error("choice {index} of scene '{scene}' has no next scene")]
    MalformedChoice { scene: String, index: usize },
    #[error("entry scene '{0}' does not exist")]
    UnknownEntry(String),
}

/// The generated scene graph. Scenes keep their document order so the
/// first scene can serve as the default entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryDocument {
    scenes: Vec<(String, Scene)>,
    index: FxHashMap<String, usize>,
}

impl StoryDocument {
    /// Build a document from scenes in order.
    pub fn from_scenes<I>(scenes: I) -> Result<StoryDocument, StoryError>
    where
        I: IntoIterator<Item = (String, Scene)>,
    {
        let scenes: Vec<(String, Scene)> = scenes.into_iter().collect();
        if scenes.is_empty() {
            return Err(StoryError::EmptyDocument);
        }

        let mut index = FxHashMap::default();
        for (position, (id, _)) in scenes.iter().enumerate() {
            if index.insert(id.clone(), position).is_some() {
                return Err(StoryError::DuplicateScene(id.clone()));
            }
        }

        Ok(StoryDocument { scenes, index })
    }

    /// Parse a document from the JSON wire shape.
    pub fn from_json(input: &str) -> Result<StoryDocument, StoryError> {
        let raw: RawStory = serde_json::from_str(input)?;
        Self::from_raw(raw)
    }

    /// Parse a document from RON using the same field names.
    pub fn parse_ron(input: &str) -> Result<StoryDocument, StoryError> {
        let raw: RawStory = ron::from_str(input)?;
        Self::from_raw(raw)
    }

    /// Load a document from disk. Files ending in `.ron` are read as RON,
    /// everything else as JSON.
    pub fn load(path: &Path) -> Result<StoryDocument, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            Self::parse_ron(&contents)
        } else {
            Self::from_json(&contents)
        }
    }

    pub fn to_json(&self) -> Result<String, StoryError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, StoryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn from_raw(raw: RawStory) -> Result<StoryDocument, StoryError> {
        let mut scenes = Vec::with_capacity(raw.0.len());
        for (id, raw_scene) in raw.0 {
            let choices = match raw_scene.choices {
                Some(raw_choices) => Some(
                    raw_choices
                        .into_iter()
                        .enumerate()
                        .map(|(index, raw_choice)| convert_choice(&id, index, raw_choice))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                None => None,
            };
            let scene = Scene {
                setting: raw_scene.setting,
                setting_description: raw_scene.setting_description,
                dialogue: raw_scene.dialogue,
                choices,
            };
            scenes.push((id, scene));
        }
        Self::from_scenes(scenes)
    }

    pub fn get(&self, id: &str) -> Option<&Scene> {
        self.index.get(id).map(|&position| &self.scenes[position].1)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// The first scene in document order.
    pub fn first_scene_id(&self) -> &str {
        &self.scenes[0].0
    }

    /// Scene ids in document order.
    pub fn scene_ids(&self) -> impl Iterator<Item = &str> {
        self.scenes.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scene)> {
        self.scenes.iter().map(|(id, scene)| (id.as_str(), scene))
    }

    /// Resolve the entry scene: the requested one if given, otherwise the
    /// first scene in document order.
    pub fn resolve_entry<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str, StoryError> {
        match requested {
            Some(id) if self.contains(id) => Ok(id),
            Some(id) => Err(StoryError::UnknownEntry(id.to_string())),
            None => Ok(self.first_scene_id()),
        }
    }

    /// Check the graph for content problems.
    ///
    /// Errors are dangling `next`/`failNext` targets and an unknown entry
    /// scene. Warnings cover unreachable scenes, empty choice lists,
    /// fail paths that can never be taken, and scenes with nothing to show.
    pub fn lint(&self, entry: Option<&str>) -> Vec<LintIssue> {
        let mut issues = Vec::new();

        for (id, scene) in self.iter() {
            if matches!(scene.choices.as_deref(), Some([])) {
                issues.push(LintIssue::warning(
                    id,
                    "empty choices list; scene is treated as terminal",
                ));
            }
            if scene.dialogue.is_empty() && scene.is_terminal() {
                issues.push(LintIssue::warning(
                    id,
                    "terminal scene has no dialogue; playback ends on an empty screen",
                ));
            }

            for (index, choice) in scene.choice_list().iter().enumerate() {
                if !self.contains(&choice.next) {
                    issues.push(LintIssue::error(
                        id,
                        format!("choice {index} leads to unknown scene '{}'", choice.next),
                    ));
                }
                if let Some(ref fail_next) = choice.fail_next {
                    if !self.contains(fail_next) {
                        issues.push(LintIssue::error(
                            id,
                            format!("choice {index} fails to unknown scene '{fail_next}'"),
                        ));
                    }
                    if !choice.is_gated() {
                        issues.push(LintIssue::warning(
                            id,
                            format!("choice {index} has failNext but no condition; it is never taken"),
                        ));
                    }
                }
            }
        }

        let entry = match self.resolve_entry(entry) {
            Ok(entry) => entry,
            Err(e) => {
                issues.push(LintIssue::error(entry.unwrap_or_default(), e.to_string()));
                return issues;
            }
        };

        let reachable = self.reachable_from(entry);
        for id in self.scene_ids() {
            if !reachable.contains(id) {
                issues.push(LintIssue::warning(id, "unreachable from the entry scene"));
            }
        }

        issues
    }

    /// Every scene reachable from `start` through `next` or `failNext`.
    pub fn reachable_from<'a>(&'a self, start: &'a str) -> FxHashSet<&'a str> {
        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::new();
        if self.contains(start) {
            seen.insert(start);
            queue.push_back(start);
        }

        while let Some(id) = queue.pop_front() {
            let Some(scene) = self.get(id) else { continue };
            for choice in scene.choice_list() {
                let targets = std::iter::once(choice.next.as_str()).chain(choice.fail_next.as_deref());
                for target in targets {
                    if self.contains(target) && seen.insert(target) {
                        queue.push_back(target);
                    }
                }
            }
        }

        seen
    }
}

fn convert_choice(scene: &str, index: usize, raw: RawChoice) -> Result<Choice, StoryError> {
    let next = raw
        .next
        .filter(|next| !next.is_empty())
        .ok_or_else(|| StoryError::MalformedChoice {
            scene: scene.to_string(),
            index,
        })?;
    Ok(Choice {
        text: raw.text,
        description: raw.description,
        delta: raw.delta.unwrap_or_default(),
        next,
        condition: raw.condition.unwrap_or_default(),
        fail_next: raw.fail_next.filter(|fail| !fail.is_empty()),
    })
}

impl Serialize for StoryDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.scenes.len()))?;
        for (id, scene) in &self.scenes {
            map.serialize_entry(id, scene)?;
        }
        map.end()
    }
}

/// Scene map in document order.
struct RawStory(Vec<(String, RawScene)>);

impl<'de> Deserialize<'de> for RawStory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawStoryVisitor;

        impl<'de> Visitor<'de> for RawStoryVisitor {
            type Value = RawStory;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of scene ids to scenes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RawStory, A::Error> {
                let mut scenes = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, scene)) = access.next_entry::<String, RawScene>()? {
                    scenes.push((id, scene));
                }
                Ok(RawStory(scenes))
            }
        }

        deserializer.deserialize_map(RawStoryVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A content problem found by [`StoryDocument::lint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintIssue {
    pub severity: Severity,
    pub scene: String,
    pub message: String,
}

impl LintIssue {
    fn error(scene: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            scene: scene.to_string(),
            message: message.into(),
        }
    }

    fn warning(scene: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            scene: scene.to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
        };
        write!(f, "{tag}: [{}] {}", self.scene, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SCENES: &str = r#"{
        "scene1": {
            "setting": "Lighthouse",
            "setting_description": "A storm batters the glass.",
            "dialogue": [["Keeper", "You made it."], ["Mira", "Barely."]],
            "choices": [
                { "text": "Trust the keeper", "delta": { "trust": 1 }, "next": "scene2",
                  "condition": { "trust": 2 }, "failNext": "scene1fail" }
            ]
        },
        "scene2": {
            "setting": "Lamp room",
            "dialogue": [["Keeper", "The light must not go out."]],
            "choices": null
        },
        "scene1fail": {
            "setting": "Stairwell",
            "dialogue": [["Keeper", "Stay downstairs."]],
            "choices": null
        }
    }"#;

    #[test]
    fn parse_json_wire_shape() {
        let story = StoryDocument::from_json(TWO_SCENES).unwrap();
        assert_eq!(story.len(), 3);
        assert_eq!(story.first_scene_id(), "scene1");

        let scene1 = story.get("scene1").unwrap();
        assert_eq!(scene1.setting, "Lighthouse");
        assert_eq!(
            scene1.setting_description.as_deref(),
            Some("A storm batters the glass.")
        );
        assert_eq!(scene1.dialogue.len(), 2);
        assert_eq!(scene1.dialogue[1].speaker, "Mira");

        let choice = &scene1.choice_list()[0];
        assert_eq!(choice.next, "scene2");
        assert_eq!(choice.fail_next.as_deref(), Some("scene1fail"));
        assert_eq!(choice.condition["trust"], 2);
        assert_eq!(choice.delta["trust"], 1);

        assert!(story.get("scene2").unwrap().is_terminal());
    }

    #[test]
    fn document_order_is_preserved() {
        let story = StoryDocument::from_json(
            r#"{ "zeta": { "setting": "", "dialogue": [], "choices": null },
                 "alpha": { "setting": "", "dialogue": [], "choices": null } }"#,
        )
        .unwrap();
        assert_eq!(story.first_scene_id(), "zeta");
        assert_eq!(story.scene_ids().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn missing_next_is_malformed() {
        let err = StoryDocument::from_json(
            r#"{ "s1": { "setting": "", "dialogue": [], "choices": [ { "next": "s1" }, { "text": "Run" } ] } }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StoryError::MalformedChoice { ref scene, index: 1 } if scene == "s1"
        ));
    }

    #[test]
    fn empty_document_rejected() {
        assert!(matches!(
            StoryDocument::from_json("{}"),
            Err(StoryError::EmptyDocument)
        ));
    }

    #[test]
    fn duplicate_scene_rejected() {
        let err = StoryDocument::from_json(
            r#"{ "a": { "setting": "", "dialogue": [], "choices": null },
                 "a": { "setting": "", "dialogue": [], "choices": null } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, StoryError::DuplicateScene(ref id) if id == "a"));
    }

    #[test]
    fn resolve_entry_scene() {
        let story = StoryDocument::from_json(TWO_SCENES).unwrap();
        assert_eq!(story.resolve_entry(None).unwrap(), "scene1");
        assert_eq!(story.resolve_entry(Some("scene2")).unwrap(), "scene2");
        assert!(matches!(
            story.resolve_entry(Some("nowhere")),
            Err(StoryError::UnknownEntry(_))
        ));
    }

    #[test]
    fn json_round_trip_keeps_order_and_content() {
        let story = StoryDocument::from_json(TWO_SCENES).unwrap();
        let json = story.to_json().unwrap();
        let reparsed = StoryDocument::from_json(&json).unwrap();
        assert_eq!(story, reparsed);
        assert!(json.contains(r#""choices":null"#));
    }

    #[test]
    fn parse_ron_document() {
        let ron_src = r#"{
            "start": (
                setting: "Dock",
                dialogue: [("Narrator", "Fog rolls in.")],
                choices: Some([(text: Some("Board"), next: Some("ship"))]),
            ),
            "ship": (
                setting: "Deck",
                dialogue: [],
                choices: None,
            ),
        }"#;
        let story = StoryDocument::parse_ron(ron_src).unwrap();
        assert_eq!(story.first_scene_id(), "start");
        assert_eq!(story.get("start").unwrap().choice_list()[0].next, "ship");
    }

    #[test]
    fn lint_clean_document() {
        let story = StoryDocument::from_json(TWO_SCENES).unwrap();
        let issues = story.lint(None);
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn lint_reports_dangling_and_unreachable() {
        let story = StoryDocument::from_json(
            r#"{
                "s1": { "setting": "", "dialogue": [["A", "x"]],
                        "choices": [ { "next": "missing", "failNext": "s1" } ] },
                "orphan": { "setting": "", "dialogue": [["A", "y"]], "choices": [] }
            }"#,
        )
        .unwrap();
        let issues = story.lint(None);

        let errors: Vec<_> = issues.iter().filter(|i| i.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("missing"));

        assert!(issues
            .iter()
            .any(|i| i.scene == "orphan" && i.message.contains("unreachable")));
        assert!(issues
            .iter()
            .any(|i| i.scene == "orphan" && i.message.contains("empty choices")));
        assert!(issues
            .iter()
            .any(|i| i.scene == "s1" && i.message.contains("never taken")));
    }

    #[test]
    fn lint_unknown_entry() {
        let story = StoryDocument::from_json(TWO_SCENES).unwrap();
        let issues = story.lint(Some("prologue"));
        assert!(issues.iter().any(|i| i.is_error() && i.scene == "prologue"));
    }

    #[test]
    fn reachability_follows_fail_paths() {
        let story = StoryDocument::from_json(TWO_SCENES).unwrap();
        let reachable = story.reachable_from("scene1");
        assert_eq!(reachable.len(), 3);
        assert!(reachable.contains("scene1fail"));

        let from_end = story.reachable_from("scene2");
        assert_eq!(from_end.len(), 1);
    }
}
