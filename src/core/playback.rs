/// Playback engine — walks the story graph scene by scene and line by
/// line, evaluates choice conditions and applies choice deltas.
use thiserror::Error;
use tracing::{debug, warn};

use crate::schema::player_state::PlayerState;
use crate::schema::scene::{Choice, DialogueLine, Scene};
use crate::schema::story::{StoryDocument, StoryError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("choice {choice} of scene '{from}' leads to unknown scene '{target}'")]
    UnknownScene {
        target: String,
        from: String,
        choice: usize,
    },
    #[error("choice {index} is out of range ({available} available)")]
    ChoiceOutOfRange { index: usize, available: usize },
    #[error("no choice is being offered")]
    NotAwaitingChoice,
    #[error("playback halted in scene '{scene}' after a content error; restart to continue")]
    Halted { scene: String },
}

/// Where the engine is in the story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    /// Showing line `line` of `scene`.
    Displaying { scene: String, line: usize },
    /// The scene's dialogue is exhausted and its choices are showing.
    AwaitingChoice { scene: String },
    /// End of a branch.
    Terminal { scene: String },
    /// A choice in `scene` pointed at a missing scene. Only `restart`
    /// leaves this state.
    Failed { scene: String },
}

impl PlaybackState {
    pub fn scene(&self) -> &str {
        match self {
            Self::Displaying { scene, .. }
            | Self::AwaitingChoice { scene }
            | Self::Terminal { scene }
            | Self::Failed { scene } => scene,
        }
    }
}

/// What a call to [`PlaybackEngine::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the next line of the same scene.
    NextLine,
    /// Reached the end of the dialogue; choices are now showing.
    ChoicesShown,
    /// Reached the end of a terminal scene.
    Ended,
    /// Nothing to advance: choices are showing or the branch has ended.
    Ignored,
}

/// Which edge a selected choice followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Next,
    FailNext,
}

/// Result of a successful [`PlaybackEngine::select_choice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOutcome {
    pub index: usize,
    pub condition_met: bool,
    pub branch: Branch,
    pub target: String,
}

/// Text appended to the final line of a terminal scene.
pub fn end_of_act_suffix(act: u32) -> String {
    format!("\n\n(End of Act {act})")
}

/// The playback state machine for one session.
///
/// The story is never mutated. Player state changes only through choice
/// deltas and survives `restart`.
#[derive(Debug, Clone)]
pub struct PlaybackEngine {
    story: StoryDocument,
    entry: String,
    act: u32,
    state: PlaybackState,
    player: PlayerState,
    log: Vec<DialogueLine>,
    fault: Option<PlaybackError>,
}

impl PlaybackEngine {
    /// Start playback at `entry` (or the first scene in document order).
    pub fn new(
        story: StoryDocument,
        player: PlayerState,
        entry: Option<&str>,
        act: u32,
    ) -> Result<PlaybackEngine, StoryError> {
        let entry = story.resolve_entry(entry)?.to_string();
        let state = entry_state(&story, &entry);
        debug!(entry = %entry, act, scenes = story.len(), "playback started");
        Ok(PlaybackEngine {
            story,
            entry,
            act,
            state,
            player,
            log: Vec::new(),
            fault: None,
        })
    }

    /// Move past the current line.
    pub fn advance(&mut self) -> Result<Advance, PlaybackError> {
        let (scene_id, line) = match &self.state {
            PlaybackState::Displaying { scene, line } => (scene.clone(), *line),
            PlaybackState::AwaitingChoice { .. } | PlaybackState::Terminal { .. } => {
                return Ok(Advance::Ignored);
            }
            PlaybackState::Failed { scene } => {
                return Err(PlaybackError::Halted {
                    scene: scene.clone(),
                });
            }
        };

        // Displaying is only ever entered for scenes that exist and have
        // a line at `line`.
        let Some(scene) = self.story.get(&scene_id) else {
            return Err(self.halt(scene_id.clone(), scene_id, 0));
        };
        if let Some(current) = scene.dialogue.get(line) {
            self.log.push(current.clone());
        }

        let (next_state, result) = if line + 1 < scene.dialogue.len() {
            (
                PlaybackState::Displaying {
                    scene: scene_id,
                    line: line + 1,
                },
                Advance::NextLine,
            )
        } else if scene.is_terminal() {
            (PlaybackState::Terminal { scene: scene_id }, Advance::Ended)
        } else {
            (
                PlaybackState::AwaitingChoice { scene: scene_id },
                Advance::ChoicesShown,
            )
        };

        debug!(state = ?next_state, "advanced");
        self.state = next_state;
        Ok(result)
    }

    /// Take choice `index` of the scene whose choices are showing.
    ///
    /// The delta is applied whether or not the condition holds. An unmet
    /// condition redirects to `failNext` when present and otherwise still
    /// follows `next`. A missing target halts playback before any state
    /// is touched.
    pub fn select_choice(&mut self, index: usize) -> Result<ChoiceOutcome, PlaybackError> {
        let scene_id = match &self.state {
            PlaybackState::AwaitingChoice { scene } => scene.clone(),
            PlaybackState::Failed { scene } => {
                return Err(PlaybackError::Halted {
                    scene: scene.clone(),
                });
            }
            _ => return Err(PlaybackError::NotAwaitingChoice),
        };

        let choices = self.story.get(&scene_id).map(Scene::choice_list).unwrap_or(&[]);
        let Some(choice) = choices.get(index) else {
            return Err(PlaybackError::ChoiceOutOfRange {
                index,
                available: choices.len(),
            });
        };

        let condition_met = self.player.meets(&choice.condition);
        let (branch, target) = match (&choice.fail_next, condition_met) {
            (Some(fail_next), false) => (Branch::FailNext, fail_next.clone()),
            _ => (Branch::Next, choice.next.clone()),
        };

        if !self.story.contains(&target) {
            return Err(self.halt(target, scene_id, index));
        }

        let delta = choice.delta.clone();
        self.player.apply_delta(&delta);
        self.state = entry_state(&self.story, &target);
        debug!(
            from = %scene_id,
            choice = index,
            condition_met,
            target = %target,
            state = ?self.state,
            "choice selected"
        );

        Ok(ChoiceOutcome {
            index,
            condition_met,
            branch,
            target,
        })
    }

    /// Return to the entry scene and clear the log. Player state is kept.
    pub fn restart(&mut self) {
        self.log.clear();
        self.fault = None;
        self.state = entry_state(&self.story, &self.entry);
        debug!(entry = %self.entry, "playback restarted");
    }

    fn halt(&mut self, target: String, from: String, choice: usize) -> PlaybackError {
        let error = PlaybackError::UnknownScene {
            target,
            from: from.clone(),
            choice,
        };
        warn!(%error, "content error, halting playback");
        self.state = PlaybackState::Failed { scene: from };
        self.fault = Some(error.clone());
        error
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn scene_id(&self) -> &str {
        self.state.scene()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.story.get(self.state.scene())
    }

    /// The line on screen. While choices show, or after the branch ends,
    /// this is the scene's last line.
    pub fn current_line(&self) -> Option<&DialogueLine> {
        let scene = self.scene()?;
        match &self.state {
            PlaybackState::Displaying { line, .. } => scene.dialogue.get(*line),
            PlaybackState::AwaitingChoice { .. } | PlaybackState::Terminal { .. } => {
                scene.dialogue.last()
            }
            PlaybackState::Failed { .. } => None,
        }
    }

    /// Displayed text of the current line, with the end-of-act suffix
    /// when it is the last line of a terminal scene.
    pub fn current_text(&self) -> Option<String> {
        let scene = self.scene()?;
        let line = self.current_line()?;
        let on_last_line = match &self.state {
            PlaybackState::Displaying { line, .. } => Some(*line) == scene.last_line_index(),
            _ => true,
        };
        if on_last_line && scene.is_terminal() {
            Some(format!("{}{}", line.text, end_of_act_suffix(self.act)))
        } else {
            Some(line.text.clone())
        }
    }

    pub fn current_speaker(&self) -> Option<&str> {
        self.current_line().map(|line| line.speaker.as_str())
    }

    pub fn showing_choices(&self) -> bool {
        matches!(self.state, PlaybackState::AwaitingChoice { .. })
    }

    /// Choices on offer; empty unless the choice panel is showing.
    pub fn choices(&self) -> &[Choice] {
        if !self.showing_choices() {
            return &[];
        }
        self.scene().map(Scene::choice_list).unwrap_or(&[])
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, PlaybackState::Terminal { .. })
    }

    /// Lines already advanced past this session, oldest first.
    pub fn log(&self) -> &[DialogueLine] {
        &self.log
    }

    pub fn player_state(&self) -> &PlayerState {
        &self.player
    }

    /// The content error that halted playback, if any.
    pub fn fault(&self) -> Option<&PlaybackError> {
        self.fault.as_ref()
    }

    pub fn story(&self) -> &StoryDocument {
        &self.story
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn act(&self) -> u32 {
        self.act
    }
}

/// State for entering `scene_id`. Scenes without dialogue go straight to
/// their choices, or end immediately when terminal.
fn entry_state(story: &StoryDocument, scene_id: &str) -> PlaybackState {
    let scene = scene_id.to_string();
    match story.get(scene_id) {
        Some(s) if !s.dialogue.is_empty() => PlaybackState::Displaying { scene, line: 0 },
        Some(s) if !s.is_terminal() => PlaybackState::AwaitingChoice { scene },
        _ => PlaybackState::Terminal { scene },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::player_state::Ledger;

    fn story() -> StoryDocument {
        StoryDocument::from_json(
            r#"{
                "scene1": {
                    "setting": "Harbor",
                    "dialogue": [["Mira", "The ferry is late."], ["Tomas", "It always is."]],
                    "choices": [
                        { "text": "Wait", "delta": { "patience": 1 }, "next": "scene2" },
                        { "text": "Swim", "next": "scene2", "condition": { "stamina": 3 }, "failNext": "sunk" }
                    ]
                },
                "scene2": {
                    "setting": "Ferry",
                    "dialogue": [["Captain", "All aboard."]],
                    "choices": null
                },
                "sunk": {
                    "setting": "Water",
                    "dialogue": [],
                    "choices": null
                }
            }"#,
        )
        .unwrap()
    }

    fn engine() -> PlaybackEngine {
        PlaybackEngine::new(story(), PlayerState::new(), None, 2).unwrap()
    }

    #[test]
    fn starts_on_first_line_of_entry() {
        let engine = engine();
        assert_eq!(
            engine.state(),
            &PlaybackState::Displaying {
                scene: "scene1".to_string(),
                line: 0
            }
        );
        assert_eq!(engine.current_speaker(), Some("Mira"));
        assert_eq!(engine.current_text().as_deref(), Some("The ferry is late."));
        assert!(engine.log().is_empty());
        assert!(engine.choices().is_empty());
    }

    #[test]
    fn advance_through_dialogue_to_choices() {
        let mut engine = engine();
        assert_eq!(engine.advance().unwrap(), Advance::NextLine);
        assert_eq!(engine.current_speaker(), Some("Tomas"));
        assert_eq!(engine.advance().unwrap(), Advance::ChoicesShown);
        assert!(engine.showing_choices());
        assert_eq!(engine.choices().len(), 2);
        assert_eq!(engine.log().len(), 2);
        // The last line stays on screen behind the choices.
        assert_eq!(engine.current_text().as_deref(), Some("It always is."));
    }

    #[test]
    fn advance_ignored_while_choosing_and_after_end() {
        let mut engine = engine();
        engine.advance().unwrap();
        engine.advance().unwrap();
        assert_eq!(engine.advance().unwrap(), Advance::Ignored);
        assert_eq!(engine.log().len(), 2);

        engine.select_choice(0).unwrap();
        assert_eq!(engine.advance().unwrap(), Advance::Ended);
        assert!(engine.is_finished());
        assert_eq!(engine.advance().unwrap(), Advance::Ignored);
        assert_eq!(engine.log().len(), 3);
    }

    #[test]
    fn terminal_line_carries_suffix_once() {
        let mut engine = engine();
        engine.advance().unwrap();
        engine.advance().unwrap();
        engine.select_choice(0).unwrap();

        let expected = "All aboard.\n\n(End of Act 2)";
        assert_eq!(engine.current_text().as_deref(), Some(expected));
        engine.advance().unwrap();
        assert_eq!(engine.current_text().as_deref(), Some(expected));
        assert_eq!(engine.current_text().unwrap().matches("(End of Act").count(), 1);
        // The log keeps the raw line.
        assert_eq!(engine.log().last().unwrap().text, "All aboard.");
    }

    #[test]
    fn select_choice_requires_choice_panel() {
        let mut engine = engine();
        assert_eq!(
            engine.select_choice(0),
            Err(PlaybackError::NotAwaitingChoice)
        );
    }

    #[test]
    fn select_choice_out_of_range() {
        let mut engine = engine();
        engine.advance().unwrap();
        engine.advance().unwrap();
        assert_eq!(
            engine.select_choice(5),
            Err(PlaybackError::ChoiceOutOfRange {
                index: 5,
                available: 2
            })
        );
        assert!(engine.showing_choices());
    }

    #[test]
    fn failed_condition_takes_fail_path_into_empty_terminal() {
        let mut engine = engine();
        engine.advance().unwrap();
        engine.advance().unwrap();
        let outcome = engine.select_choice(1).unwrap();
        assert!(!outcome.condition_met);
        assert_eq!(outcome.branch, Branch::FailNext);
        assert_eq!(outcome.target, "sunk");

        // No dialogue and no choices: terminal with nothing displayed.
        assert_eq!(
            engine.state(),
            &PlaybackState::Terminal {
                scene: "sunk".to_string()
            }
        );
        assert_eq!(engine.current_text(), None);
        assert_eq!(engine.advance().unwrap(), Advance::Ignored);
    }

    #[test]
    fn met_condition_takes_next() {
        let mut player = PlayerState::new();
        player.set(Ledger::Skill, "stamina", 3);
        let mut engine = PlaybackEngine::new(story(), player, None, 1).unwrap();
        engine.advance().unwrap();
        engine.advance().unwrap();
        let outcome = engine.select_choice(1).unwrap();
        assert!(outcome.condition_met);
        assert_eq!(outcome.branch, Branch::Next);
        assert_eq!(engine.scene_id(), "scene2");
    }

    #[test]
    fn delta_applied_on_selection() {
        let mut engine = engine();
        engine.advance().unwrap();
        engine.advance().unwrap();
        engine.select_choice(0).unwrap();
        assert_eq!(engine.player_state().relationships["patience"], 1);
    }

    #[test]
    fn unknown_target_halts_without_mutation() {
        let story = StoryDocument::from_json(
            r#"{ "a": { "setting": "", "dialogue": [],
                        "choices": [ { "next": "nowhere", "delta": { "gold": 5 } } ] } }"#,
        )
        .unwrap();
        let mut engine = PlaybackEngine::new(story, PlayerState::new(), None, 1).unwrap();
        assert!(engine.showing_choices());

        let err = engine.select_choice(0).unwrap_err();
        assert_eq!(
            err,
            PlaybackError::UnknownScene {
                target: "nowhere".to_string(),
                from: "a".to_string(),
                choice: 0
            }
        );
        assert_eq!(engine.fault(), Some(&err));
        assert_eq!(engine.player_state().value("gold"), 0);
        assert!(matches!(engine.state(), PlaybackState::Failed { .. }));
        assert!(matches!(engine.advance(), Err(PlaybackError::Halted { .. })));
        assert!(matches!(
            engine.select_choice(0),
            Err(PlaybackError::Halted { .. })
        ));

        engine.restart();
        assert!(engine.fault().is_none());
        assert!(engine.showing_choices());
    }

    #[test]
    fn restart_returns_to_entry_and_keeps_player_state() {
        let mut engine = engine();
        engine.advance().unwrap();
        engine.advance().unwrap();
        engine.select_choice(0).unwrap();
        engine.restart();

        assert_eq!(
            engine.state(),
            &PlaybackState::Displaying {
                scene: "scene1".to_string(),
                line: 0
            }
        );
        assert!(engine.log().is_empty());
        assert_eq!(engine.player_state().value("patience"), 1);
    }

    #[test]
    fn explicit_entry_scene() {
        let engine = PlaybackEngine::new(story(), PlayerState::new(), Some("scene2"), 1).unwrap();
        assert_eq!(engine.scene_id(), "scene2");
        assert!(matches!(
            PlaybackEngine::new(story(), PlayerState::new(), Some("missing"), 1),
            Err(StoryError::UnknownEntry(_))
        ));
    }

    #[test]
    fn self_loop_is_allowed() {
        let story = StoryDocument::from_json(
            r#"{ "loop": { "setting": "", "dialogue": [["A", "Again?"]],
                           "choices": [ { "next": "loop", "delta": { "count": 1 } } ] } }"#,
        )
        .unwrap();
        let mut engine = PlaybackEngine::new(story, PlayerState::new(), None, 1).unwrap();
        for _ in 0..3 {
            engine.advance().unwrap();
            engine.select_choice(0).unwrap();
        }
        assert_eq!(engine.player_state().value("count"), 3);
        assert_eq!(engine.log().len(), 3);
        assert_eq!(engine.current_text().as_deref(), Some("Again?"));
    }
}
