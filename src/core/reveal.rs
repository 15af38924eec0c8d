//! Text reveal — character-by-character display progress for the line
//! on screen.
//!
//! Every `begin` issues a new [`RevealTicket`] and cancels all earlier
//! ones, so a timer loop still running for a previous line can never
//! push characters onto the new one.

/// Identifies one reveal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevealTicket(u64);

impl RevealTicket {
    pub fn id(&self) -> u64 {
        self.0
    }

    pub fn from_id(id: u64) -> Self {
        Self(id)
    }
}

/// Result of driving a reveal forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStep {
    /// More characters remain.
    Revealing,
    /// The whole line is visible.
    Complete,
    /// The ticket belongs to an earlier line; nothing changed.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct TextReveal {
    ms_per_char: u64,
    generation: u64,
    text: String,
    total: usize,
    shown: usize,
    started_at: u64,
}

impl TextReveal {
    /// A reveal that shows one character every `ms_per_char`
    /// milliseconds. Zero reveals instantly.
    pub fn new(ms_per_char: u64) -> Self {
        Self {
            ms_per_char,
            generation: 0,
            text: String::new(),
            total: 0,
            shown: 0,
            started_at: 0,
        }
    }

    /// Start revealing `text`, cancelling any earlier run.
    pub fn begin(&mut self, text: &str, now_ms: u64) -> RevealTicket {
        self.generation += 1;
        self.text = text.to_string();
        self.total = text.chars().count();
        self.shown = if self.ms_per_char == 0 { self.total } else { 0 };
        self.started_at = now_ms;
        RevealTicket(self.generation)
    }

    /// Nothing on screen. Cancels any running reveal.
    pub fn clear(&mut self) {
        self.begin("", 0);
    }

    /// Ticket of the run in progress.
    pub fn ticket(&self) -> RevealTicket {
        RevealTicket(self.generation)
    }

    pub fn is_current(&self, ticket: RevealTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Reveal one more character. Drives per-character timer loops.
    pub fn step(&mut self, ticket: RevealTicket) -> RevealStep {
        if !self.is_current(ticket) {
            return RevealStep::Cancelled;
        }
        self.shown = (self.shown + 1).min(self.total);
        self.status()
    }

    /// Reveal as many characters as the time since `begin` allows.
    pub fn tick(&mut self, ticket: RevealTicket, now_ms: u64) -> RevealStep {
        if !self.is_current(ticket) {
            return RevealStep::Cancelled;
        }
        if self.ms_per_char > 0 {
            let elapsed = now_ms.saturating_sub(self.started_at);
            let due = usize::try_from(elapsed / self.ms_per_char).unwrap_or(usize::MAX);
            self.shown = self.shown.max(due.min(self.total));
        }
        self.status()
    }

    /// Show the whole line at once.
    pub fn skip(&mut self) {
        self.shown = self.total;
    }

    pub fn is_complete(&self) -> bool {
        self.shown >= self.total
    }

    /// Fraction of the line shown, 1.0 for empty lines.
    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.shown as f32 / self.total as f32
        }
    }

    pub fn visible_text(&self) -> &str {
        let end = self
            .text
            .char_indices()
            .nth(self.shown)
            .map_or(self.text.len(), |(offset, _)| offset);
        &self.text[..end]
    }

    pub fn full_text(&self) -> &str {
        &self.text
    }

    pub fn ms_per_char(&self) -> u64 {
        self.ms_per_char
    }

    fn status(&self) -> RevealStep {
        if self.is_complete() {
            RevealStep::Complete
        } else {
            RevealStep::Revealing
        }
    }
}
