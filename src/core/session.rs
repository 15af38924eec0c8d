/// Player session — the host side of playback.
///
/// Owns the playback engine together with the text reveal and the
/// autosave debouncer, applies the two-phase advance rule and hands
/// save data to the configured store. Built via `PlayerSession::builder()`.
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::autosave::{AutosaveDebouncer, SaveTicket};
use crate::core::config::PlayerConfig;
use crate::core::playback::{
    Advance, ChoiceOutcome, PlaybackEngine, PlaybackError, PlaybackState,
};
use crate::core::reveal::{RevealStep, RevealTicket, TextReveal};
use crate::core::save::{SaveData, SaveError, SaveStore};
use crate::schema::player_state::PlayerState;
use crate::schema::scene::{Choice, DialogueLine, Scene};
use crate::schema::story::{StoryDocument, StoryError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("story error: {0}")]
    Story(#[from] StoryError),
    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),
    #[error("save error: {0}")]
    Save(#[from] SaveError),
    #[error("no story document was provided")]
    MissingStory,
    #[error("no save store is configured")]
    NoSaveStore,
}

/// What a call to [`PlayerSession::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The line was still being revealed; it is now fully shown and the
    /// cursor did not move.
    RevealCompleted,
    /// The engine processed the advance.
    Moved(Advance),
}

/// One playback session.
pub struct PlayerSession {
    engine: PlaybackEngine,
    config: PlayerConfig,
    reveal: TextReveal,
    autosave: AutosaveDebouncer,
    store: Option<Box<dyn SaveStore>>,
}

/// Builder for constructing a `PlayerSession`.
pub struct PlayerSessionBuilder {
    story: Option<StoryDocument>,
    config: PlayerConfig,
    player_state: Option<PlayerState>,
    store: Option<Box<dyn SaveStore>>,
    started_at: u64,
}

impl PlayerSession {
    pub fn builder() -> PlayerSessionBuilder {
        PlayerSessionBuilder {
            story: None,
            config: PlayerConfig::default(),
            player_state: None,
            store: None,
            started_at: 0,
        }
    }

    /// Handle a "next" input.
    ///
    /// While the current line is still revealing, this only completes the
    /// reveal. The following call moves the cursor.
    pub fn advance(&mut self, now_ms: u64) -> Result<AdvanceOutcome, SessionError> {
        if !self.reveal.is_complete() {
            self.reveal.skip();
            return Ok(AdvanceOutcome::RevealCompleted);
        }

        let result = match self.engine.advance() {
            Ok(result) => result,
            Err(e) => {
                self.reveal.clear();
                return Err(e.into());
            }
        };
        if result == Advance::NextLine {
            self.begin_reveal(now_ms);
        }
        Ok(AdvanceOutcome::Moved(result))
    }

    /// Take a choice and schedule an autosave.
    pub fn select_choice(
        &mut self,
        index: usize,
        now_ms: u64,
    ) -> Result<ChoiceOutcome, SessionError> {
        let outcome = match self.engine.select_choice(index) {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, PlaybackError::UnknownScene { .. }) {
                    self.reveal.clear();
                }
                return Err(e.into());
            }
        };

        self.begin_reveal(now_ms);
        if self.config.autosave.enabled {
            self.autosave.notify(now_ms);
            self.flush_due(now_ms);
        }
        Ok(outcome)
    }

    /// Back to the entry scene. Player state and pending saves are kept.
    pub fn restart(&mut self, now_ms: u64) {
        self.engine.restart();
        self.begin_reveal(now_ms);
        info!(entry = %self.engine.entry(), "session restarted");
    }

    /// Show the current line in full without moving the cursor.
    pub fn skip_reveal(&mut self) {
        self.reveal.skip();
    }

    /// Drive the reveal by wall time and write any autosave that is due.
    pub fn tick(&mut self, now_ms: u64) -> RevealStep {
        let step = self.reveal.tick(self.reveal.ticket(), now_ms);
        self.flush_due(now_ms);
        step
    }

    /// Reveal one more character for a host-driven timer loop. A ticket
    /// from an earlier line is cancelled and changes nothing.
    pub fn reveal_step(&mut self, ticket: RevealTicket) -> RevealStep {
        self.reveal.step(ticket)
    }

    /// Write the current state to the store immediately, dropping any
    /// pending debounced save.
    pub fn save_now(&mut self) -> Result<(), SessionError> {
        let snapshot = self.snapshot();
        let store = self.store.as_mut().ok_or(SessionError::NoSaveStore)?;
        store.save(&snapshot)?;
        self.autosave.cancel();
        debug!(scene = %snapshot.scene, "saved");
        Ok(())
    }

    /// For hosts that persist asynchronously: hand out the due save, if
    /// any. Report the result with [`PlayerSession::finish_save`].
    pub fn take_due_save(&mut self, now_ms: u64) -> Option<(SaveTicket, SaveData)> {
        self.autosave
            .poll(now_ms)
            .map(|ticket| (ticket, self.snapshot()))
    }

    /// Report the result of a save handed out by `take_due_save`.
    pub fn finish_save(&mut self, ticket: SaveTicket, succeeded: bool, now_ms: u64) -> bool {
        if succeeded {
            self.autosave.complete(ticket)
        } else {
            warn!(ticket = ticket.id(), "host reported a failed save, retrying");
            self.autosave.fail(ticket, now_ms)
        }
    }

    fn flush_due(&mut self, now_ms: u64) {
        if self.store.is_none() {
            return;
        }
        let Some(ticket) = self.autosave.poll(now_ms) else {
            return;
        };

        let snapshot = self.snapshot();
        let Some(store) = self.store.as_mut() else {
            return;
        };
        match store.save(&snapshot) {
            Ok(()) => {
                debug!(scene = %snapshot.scene, "autosaved");
                self.autosave.complete(ticket);
            }
            Err(e) => {
                warn!(error = %e, "autosave failed, retrying");
                self.autosave.fail(ticket, now_ms);
            }
        }
    }

    fn begin_reveal(&mut self, now_ms: u64) {
        let text = self.engine.current_text().unwrap_or_default();
        self.reveal.begin(&text, now_ms);
    }

    /// Save data describing the session right now.
    pub fn snapshot(&self) -> SaveData {
        SaveData {
            act: self.engine.act(),
            scene: self.engine.scene_id().to_string(),
            player_state: self.engine.player_state().clone(),
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn state(&self) -> &PlaybackState {
        self.engine.state()
    }

    pub fn scene_id(&self) -> &str {
        self.engine.scene_id()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.engine.scene()
    }

    /// Full text of the line on screen, end-of-act marker included.
    pub fn current_text(&self) -> Option<String> {
        self.engine.current_text()
    }

    /// The part of the current line revealed so far.
    pub fn visible_text(&self) -> &str {
        self.reveal.visible_text()
    }

    pub fn speaker(&self) -> Option<&str> {
        self.engine.current_speaker()
    }

    pub fn reveal_progress(&self) -> f32 {
        self.reveal.progress()
    }

    pub fn is_revealing(&self) -> bool {
        !self.reveal.is_complete()
    }

    pub fn reveal_ticket(&self) -> RevealTicket {
        self.reveal.ticket()
    }

    /// Whether the choice panel should show. Choices wait for the last
    /// line to be fully revealed.
    pub fn showing_choices(&self) -> bool {
        self.engine.showing_choices() && self.reveal.is_complete()
    }

    pub fn choices(&self) -> &[Choice] {
        self.engine.choices()
    }

    pub fn log(&self) -> &[DialogueLine] {
        self.engine.log()
    }

    pub fn player_state(&self) -> &PlayerState {
        self.engine.player_state()
    }

    pub fn is_finished(&self) -> bool {
        self.engine.is_finished()
    }

    pub fn fault(&self) -> Option<&PlaybackError> {
        self.engine.fault()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }
}

impl PlayerSessionBuilder {
    pub fn story(mut self, story: StoryDocument) -> Self {
        self.story = Some(story);
        self
    }

    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from this player state instead of the store's save.
    pub fn player_state(mut self, state: PlayerState) -> Self {
        self.player_state = Some(state);
        self
    }

    /// Start from a previous save's player state.
    pub fn restore(mut self, save: SaveData) -> Self {
        self.player_state = Some(save.player_state);
        self
    }

    pub fn save_store<S: SaveStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Host clock at construction, used to start the first reveal.
    pub fn started_at(mut self, now_ms: u64) -> Self {
        self.started_at = now_ms;
        self
    }

    /// Build the session. Without an explicit player state, the store's
    /// latest save is used, falling back to an empty state.
    pub fn build(self) -> Result<PlayerSession, SessionError> {
        let story = self.story.ok_or(SessionError::MissingStory)?;

        let player_state = match (self.player_state, &self.store) {
            (Some(state), _) => state,
            (None, Some(store)) => store
                .load()?
                .map(|save| save.player_state)
                .unwrap_or_default(),
            (None, None) => PlayerState::default(),
        };

        let engine = PlaybackEngine::new(
            story,
            player_state,
            self.config.entry_scene.as_deref(),
            self.config.act,
        )?;
        let reveal = TextReveal::new(self.config.effective_ms_per_char());
        let autosave = AutosaveDebouncer::new(self.config.autosave.debounce_ms);

        let mut session = PlayerSession {
            engine,
            config: self.config,
            reveal,
            autosave,
            store: self.store,
        };
        session.begin_reveal(self.started_at);
        info!(
            entry = %session.engine.entry(),
            act = session.engine.act(),
            "session started"
        );
        Ok(session)
    }
}
