/// Player state — the numeric ledgers that choices read and write.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stat key to value mapping used by every ledger, by choice deltas
/// and by choice conditions.
pub type StatMap = BTreeMap<String, i64>;

/// Which ledger a stat key resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ledger {
    Relationship,
    Inventory,
    Skill,
}

impl Ledger {
    /// Probe order used when resolving an untagged stat key.
    pub const PRIORITY: [Ledger; 3] = [Ledger::Relationship, Ledger::Inventory, Ledger::Skill];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Relationship => "relationship",
            Self::Inventory => "inventory",
            Self::Skill => "skill",
        }
    }
}

/// Result of resolving a stat key against the ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatLookup {
    pub ledger: Ledger,
    pub value: i64,
}

/// Relationships, inventory and skills of the player.
///
/// Unknown keys read as 0. Writes to a key that exists in no ledger
/// create it as a relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub relationships: StatMap,
    #[serde(default)]
    pub inventory: StatMap,
    #[serde(default)]
    pub skills: StatMap,
}

impl PlayerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self, ledger: Ledger) -> &StatMap {
        match ledger {
            Ledger::Relationship => &self.relationships,
            Ledger::Inventory => &self.inventory,
            Ledger::Skill => &self.skills,
        }
    }

    fn ledger_mut(&mut self, ledger: Ledger) -> &mut StatMap {
        match ledger {
            Ledger::Relationship => &mut self.relationships,
            Ledger::Inventory => &mut self.inventory,
            Ledger::Skill => &mut self.skills,
        }
    }

    /// Find the first ledger holding `key`, in relationship, inventory,
    /// skill order.
    pub fn lookup(&self, key: &str) -> Option<StatLookup> {
        Ledger::PRIORITY.iter().find_map(|&ledger| {
            self.ledger(ledger)
                .get(key)
                .map(|&value| StatLookup { ledger, value })
        })
    }

    /// Current value of `key`, 0 when no ledger holds it.
    pub fn value(&self, key: &str) -> i64 {
        self.lookup(key).map_or(0, |found| found.value)
    }

    /// Set `key` in a specific ledger, bypassing resolution.
    pub fn set(&mut self, ledger: Ledger, key: &str, value: i64) {
        self.ledger_mut(ledger).insert(key.to_string(), value);
    }

    /// Add `amount` to `key` in the ledger it resolves to.
    /// Returns the lookup after the write.
    pub fn adjust(&mut self, key: &str, amount: i64) -> StatLookup {
        let ledger = self
            .lookup(key)
            .map_or(Ledger::Relationship, |found| found.ledger);
        let slot = self.ledger_mut(ledger).entry(key.to_string()).or_insert(0);
        *slot = slot.saturating_add(amount);
        StatLookup {
            ledger,
            value: *slot,
        }
    }

    /// Apply every entry of a choice delta.
    pub fn apply_delta(&mut self, delta: &StatMap) {
        for (key, amount) in delta {
            self.adjust(key, *amount);
        }
    }

    /// True when every `(key, minimum)` pair holds. An empty condition
    /// is always met.
    pub fn meets(&self, condition: &StatMap) -> bool {
        condition
            .iter()
            .all(|(key, minimum)| self.value(key) >= *minimum)
    }
}
