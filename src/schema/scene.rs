use serde::{Deserialize, Serialize};

use super::player_state::StatMap;

/// One spoken line. Serialized as a `[speaker, text]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct DialogueLine {
    pub speaker: String,
    pub text: String,
}

impl DialogueLine {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

impl From<(String, String)> for DialogueLine {
    fn from((speaker, text): (String, String)) -> Self {
        Self { speaker, text }
    }
}

impl From<DialogueLine> for (String, String) {
    fn from(line: DialogueLine) -> Self {
        (line.speaker, line.text)
    }
}

/// An outgoing edge of a scene.
///
/// A choice is never disabled by its condition: an unmet condition only
/// redirects the transition to `fail_next` when one is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "StatMap::is_empty")]
    pub delta: StatMap,
    pub next: String,
    #[serde(skip_serializing_if = "StatMap::is_empty")]
    pub condition: StatMap,
    #[serde(rename = "failNext", skip_serializing_if = "Option::is_none")]
    pub fail_next: Option<String>,
}

impl Choice {
    /// A bare choice leading to `next`.
    pub fn to(next: impl Into<String>) -> Self {
        Self {
            text: None,
            description: None,
            delta: StatMap::new(),
            next: next.into(),
            condition: StatMap::new(),
            fail_next: None,
        }
    }

    /// Display label, falling back to "Option N" (1-based).
    pub fn label(&self, index: usize) -> String {
        match &self.text {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => format!("Option {}", index + 1),
        }
    }

    pub fn is_gated(&self) -> bool {
        !self.condition.is_empty()
    }
}

/// A node of the story graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scene {
    pub setting: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setting_description: Option<String>,
    pub dialogue: Vec<DialogueLine>,
    /// `None` marks the end of a branch.
    pub choices: Option<Vec<Choice>>,
}

impl Scene {
    /// True when reaching the end of this scene ends the branch.
    /// An empty choice list counts as terminal.
    pub fn is_terminal(&self) -> bool {
        self.choices.as_ref().map_or(true, |choices| choices.is_empty())
    }

    /// Choices offered at the end of the scene, empty when terminal.
    pub fn choice_list(&self) -> &[Choice] {
        self.choices.as_deref().unwrap_or(&[])
    }

    pub fn last_line_index(&self) -> Option<usize> {
        self.dialogue.len().checked_sub(1)
    }
}

// Lenient wire shape. `next` may be missing here; the loader turns that
// into a `MalformedChoice` naming the scene and choice index.

#[derive(Debug, Deserialize)]
pub(crate) struct RawChoice {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub delta: Option<StatMap>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub condition: Option<StatMap>,
    #[serde(default, rename = "failNext")]
    pub fail_next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawScene {
    #[serde(default)]
    pub setting: String,
    #[serde(default)]
    pub setting_description: Option<String>,
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
    #[serde(default)]
    pub choices: Option<Vec<RawChoice>>,
}
