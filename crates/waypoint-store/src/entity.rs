//! Entities a repository can hold.

use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::Hash;

use chrono::Utc;
use waypoint_core::{Player, PlayerFilter, PlayerId, PlayerPatch};

/// A record type with a unique key, a partial-update type and a filter.
pub trait Entity: Clone + Send + Sync + 'static {
    type Key: Clone + Eq + Ord + Hash + Display + Send + Sync + 'static;
    type Patch: Send + Sync + 'static;
    type Filter: Default + Send + Sync + 'static;

    /// Lowercase noun used in errors and span names.
    const KIND: &'static str;

    fn key(&self) -> Self::Key;

    fn apply_patch(&mut self, patch: Self::Patch);

    fn matches(&self, filter: &Self::Filter) -> bool;

    /// Describe a uniqueness collision with `other`, if any. The key is
    /// checked separately.
    fn conflicts_with(&self, _other: &Self) -> Option<String> {
        None
    }

    /// Order in which listings return records. Records added later must
    /// sort after existing ones, so a paged walk stays restartable.
    fn list_order(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Entity for Player {
    type Key = PlayerId;
    type Patch = PlayerPatch;
    type Filter = PlayerFilter;

    const KIND: &'static str = "player";

    fn key(&self) -> PlayerId {
        self.id
    }

    fn apply_patch(&mut self, patch: PlayerPatch) {
        self.apply(patch, Utc::now());
    }

    fn matches(&self, filter: &PlayerFilter) -> bool {
        filter.matches(self)
    }

    fn conflicts_with(&self, other: &Self) -> Option<String> {
        (self.name == other.name).then(|| format!("player name '{}' is already taken", self.name))
    }

    /// Creation time, then id: the order the SQL listing uses.
    fn list_order(&self, other: &Self) -> Ordering {
        (self.created_at, self.id).cmp(&(other.created_at, other.id))
    }
}
