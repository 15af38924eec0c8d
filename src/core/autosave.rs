//! Debounced autosave scheduling.
//!
//! Every change pushes the save deadline back by the debounce delay.
//! Once the deadline passes a single save is handed out; further changes
//! while it is in flight re-arm the deadline, so a follow-up save runs
//! after the current one finishes instead of alongside it.

/// Identifies one handed-out save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveTicket(u64);

impl SaveTicket {
    pub fn id(&self) -> u64 {
        self.0
    }

    pub fn from_id(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone)]
pub struct AutosaveDebouncer {
    delay_ms: u64,
    deadline: Option<u64>,
    in_flight: Option<SaveTicket>,
    issued: u64,
}

impl AutosaveDebouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadline: None,
            in_flight: None,
            issued: 0,
        }
    }

    /// Record a change at `now_ms`, cancelling and restarting the timer.
    pub fn notify(&mut self, now_ms: u64) {
        self.deadline = Some(now_ms.saturating_add(self.delay_ms));
    }

    /// Hand out a save if the deadline has passed and none is running.
    pub fn poll(&mut self, now_ms: u64) -> Option<SaveTicket> {
        if self.in_flight.is_some() {
            return None;
        }
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                self.issued += 1;
                let ticket = SaveTicket(self.issued);
                self.in_flight = Some(ticket);
                Some(ticket)
            }
            _ => None,
        }
    }

    /// Mark a save as finished. Returns false for a ticket that is not
    /// the one in flight.
    pub fn complete(&mut self, ticket: SaveTicket) -> bool {
        if self.in_flight != Some(ticket) {
            return false;
        }
        self.in_flight = None;
        true
    }

    /// Mark a save as failed and schedule a retry after the delay,
    /// unless a newer change already set a deadline.
    pub fn fail(&mut self, ticket: SaveTicket, now_ms: u64) -> bool {
        if !self.complete(ticket) {
            return false;
        }
        if self.deadline.is_none() {
            self.notify(now_ms);
        }
        true
    }

    /// Drop the pending deadline without touching an in-flight save.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn in_flight(&self) -> Option<SaveTicket> {
        self.in_flight
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }
}
