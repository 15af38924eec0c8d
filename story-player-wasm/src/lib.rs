//! WASM bindings for story-player — the browser presentation layer drives
//! playback through this API and renders what it reports.

use wasm_bindgen::prelude::*;

use story_player::core::autosave::SaveTicket;
use story_player::core::config::PlayerConfig;
use story_player::core::playback::{Advance, Branch, PlaybackState};
use story_player::core::reveal::{RevealStep, RevealTicket};
use story_player::core::save::SaveData;
use story_player::core::session::{AdvanceOutcome, PlayerSession};
use story_player::schema::player_state::PlayerState;
use story_player::schema::story::StoryDocument;

// ---------------------------------------------------------------------------
// Embedded demo story — compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const LIGHTHOUSE_STORY: &str = include_str!("../../stories/lighthouse.json");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct ChoiceInfo {
    index: usize,
    label: String,
    description: Option<String>,
    gated: bool,
}

#[derive(serde::Serialize)]
struct LogEntry<'a> {
    speaker: &'a str,
    text: &'a str,
}

#[derive(serde::Serialize)]
struct SceneInfo<'a> {
    id: &'a str,
    setting: &'a str,
    setting_description: Option<&'a str>,
}

#[derive(serde::Serialize)]
struct StateInfo<'a> {
    kind: &'static str,
    scene: &'a str,
    line: Option<usize>,
}

#[derive(serde::Serialize)]
struct ChoiceResult {
    target: String,
    condition_met: bool,
    took_fail_path: bool,
}

#[derive(serde::Serialize)]
struct PendingSave {
    ticket: f64,
    data: SaveData,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// JS clocks hand out fractional milliseconds.
fn to_ms(now: f64) -> u64 {
    if now.is_finite() && now > 0.0 {
        now as u64
    } else {
        0
    }
}

fn advance_label(outcome: AdvanceOutcome) -> &'static str {
    match outcome {
        AdvanceOutcome::RevealCompleted => "reveal_completed",
        AdvanceOutcome::Moved(Advance::NextLine) => "next_line",
        AdvanceOutcome::Moved(Advance::ChoicesShown) => "choices",
        AdvanceOutcome::Moved(Advance::Ended) => "ended",
        AdvanceOutcome::Moved(Advance::Ignored) => "ignored",
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

// ---------------------------------------------------------------------------
// StoryPlayer — the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StoryPlayer {
    session: PlayerSession,
}

#[wasm_bindgen]
impl StoryPlayer {
    /// Start a session for a story document in its JSON wire shape.
    ///
    /// `config_json` follows `PlayerConfig`; `save_json` is a payload
    /// previously returned by `take_pending_save` (its `data` field) and
    /// restores the player's stats.
    #[wasm_bindgen(constructor)]
    pub fn new(
        story_json: &str,
        config_json: Option<String>,
        save_json: Option<String>,
        now_ms: f64,
    ) -> Result<StoryPlayer, JsError> {
        let story = StoryDocument::from_json(story_json)
            .map_err(|e| JsError::new(&format!("Story parse error: {e}")))?;

        let config = match config_json {
            Some(json) => PlayerConfig::from_json(&json)
                .map_err(|e| JsError::new(&format!("Config parse error: {e}")))?,
            None => PlayerConfig::default(),
        };

        let player_state = match save_json {
            Some(json) => {
                SaveData::from_json(&json)
                    .map_err(|e| JsError::new(&format!("Save parse error: {e}")))?
                    .player_state
            }
            None => PlayerState::default(),
        };

        let session = PlayerSession::builder()
            .story(story)
            .config(config)
            .player_state(player_state)
            .started_at(to_ms(now_ms))
            .build()
            .map_err(|e| JsError::new(&format!("Session error: {e}")))?;

        Ok(StoryPlayer { session })
    }

    /// A session over the bundled demo story.
    pub fn demo(now_ms: f64) -> Result<StoryPlayer, JsError> {
        StoryPlayer::new(data::LIGHTHOUSE_STORY, None, None, now_ms)
    }

    /// "Next" input. Returns one of `reveal_completed`, `next_line`,
    /// `choices`, `ended` or `ignored`.
    pub fn advance(&mut self, now_ms: f64) -> Result<String, JsError> {
        self.session
            .advance(to_ms(now_ms))
            .map(|outcome| advance_label(outcome).to_string())
            .map_err(|e| JsError::new(&format!("Playback error: {e}")))
    }

    /// Pick a choice. Returns a JSON object with the target scene and
    /// whether the condition held.
    pub fn select_choice(&mut self, index: usize, now_ms: f64) -> Result<String, JsError> {
        let outcome = self
            .session
            .select_choice(index, to_ms(now_ms))
            .map_err(|e| JsError::new(&format!("Playback error: {e}")))?;
        to_json(&ChoiceResult {
            target: outcome.target,
            condition_met: outcome.condition_met,
            took_fail_path: outcome.branch == Branch::FailNext,
        })
    }

    pub fn restart(&mut self, now_ms: f64) {
        self.session.restart(to_ms(now_ms));
    }

    pub fn skip_reveal(&mut self) {
        self.session.skip_reveal();
    }

    /// Ticket for the line being revealed. Pass it back to `reveal_step`
    /// from each timer callback.
    pub fn reveal_ticket(&self) -> f64 {
        self.session.reveal_ticket().id() as f64
    }

    /// Reveal one character. Returns false once the line is complete or
    /// the ticket has been superseded, so the timer loop should stop.
    pub fn reveal_step(&mut self, ticket: f64) -> bool {
        let ticket = RevealTicket::from_id(ticket as u64);
        self.session.reveal_step(ticket) == RevealStep::Revealing
    }

    /// Time-driven alternative to `reveal_step`. Returns true while the
    /// line is still revealing.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.session.tick(to_ms(now_ms)) == RevealStep::Revealing
    }

    pub fn current_text(&self) -> Option<String> {
        self.session.current_text()
    }

    pub fn visible_text(&self) -> String {
        self.session.visible_text().to_string()
    }

    pub fn speaker(&self) -> Option<String> {
        self.session.speaker().map(str::to_string)
    }

    pub fn reveal_progress(&self) -> f32 {
        self.session.reveal_progress()
    }

    pub fn showing_choices(&self) -> bool {
        self.session.showing_choices()
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    /// The content error that halted playback, if any.
    pub fn fault(&self) -> Option<String> {
        self.session.fault().map(|e| e.to_string())
    }

    /// JSON array of the choices on offer.
    pub fn choices_json(&self) -> Result<String, JsError> {
        let choices: Vec<ChoiceInfo> = self
            .session
            .choices()
            .iter()
            .enumerate()
            .map(|(index, choice)| ChoiceInfo {
                index,
                label: choice.label(index),
                description: choice.description.clone(),
                gated: choice.is_gated(),
            })
            .collect();
        to_json(&choices)
    }

    /// JSON array of `{speaker, text}` lines already advanced past.
    pub fn log_json(&self) -> Result<String, JsError> {
        let entries: Vec<LogEntry<'_>> = self
            .session
            .log()
            .iter()
            .map(|line| LogEntry {
                speaker: &line.speaker,
                text: &line.text,
            })
            .collect();
        to_json(&entries)
    }

    pub fn player_state_json(&self) -> Result<String, JsError> {
        to_json(self.session.player_state())
    }

    pub fn scene_json(&self) -> Result<String, JsError> {
        let id = self.session.scene_id();
        let info = self.session.scene().map(|scene| SceneInfo {
            id,
            setting: &scene.setting,
            setting_description: scene.setting_description.as_deref(),
        });
        to_json(&info)
    }

    /// JSON `{kind, scene, line}` for the engine state.
    pub fn state_json(&self) -> Result<String, JsError> {
        let info = match self.session.state() {
            PlaybackState::Displaying { scene, line } => StateInfo {
                kind: "displaying",
                scene,
                line: Some(*line),
            },
            PlaybackState::AwaitingChoice { scene } => StateInfo {
                kind: "awaiting_choice",
                scene,
                line: None,
            },
            PlaybackState::Terminal { scene } => StateInfo {
                kind: "terminal",
                scene,
                line: None,
            },
            PlaybackState::Failed { scene } => StateInfo {
                kind: "failed",
                scene,
                line: None,
            },
        };
        to_json(&info)
    }

    /// Settings the presentation layer reads, including the translation
    /// flags.
    pub fn config_json(&self) -> Result<String, JsError> {
        to_json(self.session.config())
    }

    /// The autosave that is due, as JSON `{ticket, data}`. The host
    /// persists `data` and then calls `save_finished`.
    pub fn take_pending_save(&mut self, now_ms: f64) -> Result<Option<String>, JsError> {
        match self.session.take_due_save(to_ms(now_ms)) {
            Some((ticket, data)) => to_json(&PendingSave {
                ticket: ticket.id() as f64,
                data,
            })
            .map(Some),
            None => Ok(None),
        }
    }

    pub fn save_finished(&mut self, ticket: f64, succeeded: bool, now_ms: f64) -> bool {
        self.session
            .finish_save(SaveTicket::from_id(ticket as u64), succeeded, to_ms(now_ms))
    }
}
