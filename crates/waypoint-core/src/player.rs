//! # Player
//!
//! The example business entity served by the API. A [`Player`] is always
//! fully formed: identifiers are valid by construction, and the text and
//! numeric fields are checked before a record is built from a [`NewPlayer`]
//! or changed by a [`PlayerPatch`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum length of a player name, in characters.
pub const NAME_MAX_LEN: usize = 64;
/// Lowest permitted player level.
pub const LEVEL_MIN: i32 = 0;
/// Highest permitted player level.
pub const LEVEL_MAX: i32 = 1000;

/// Unique identifier of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Create a new random player identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a player identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A stored player record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Unique key.
    pub id: PlayerId,
    /// Display name, unique across players.
    pub name: String,
    /// Progression level.
    pub level: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last successful update.
    pub updated_at: DateTime<Utc>,
}

impl Player {
    /// Apply a validated patch, stamping `updated_at`.
    pub fn apply(&mut self, patch: PlayerPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(level) = patch.level {
            self.level = level;
        }
        self.updated_at = now;
    }
}

/// Fields supplied when creating a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlayer {
    /// Display name.
    pub name: String,
    /// Starting level.
    #[serde(default)]
    pub level: i32,
}

impl NewPlayer {
    /// Check every field against the player invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_level(self.level)
    }

    /// Turn the request into a full record with a fresh identifier.
    ///
    /// Leading and trailing whitespace is trimmed from the name.
    pub fn into_player(self, now: DateTime<Utc>) -> Player {
        Player {
            id: PlayerId::new(),
            name: self.name.trim().to_string(),
            level: self.level,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPatch {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New level.
    #[serde(default)]
    pub level: Option<i32>,
}

impl PlayerPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.level.is_none()
    }

    /// Check every present field, and reject an empty patch.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }
        if let Some(ref name) = self.name {
            validate_name(name)?;
        }
        if let Some(level) = self.level {
            validate_level(level)?;
        }
        Ok(())
    }

    /// Trim the name, if present.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self
    }
}

/// Selection criteria for listing players.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerFilter {
    /// Case-insensitive substring the name must contain.
    #[serde(default)]
    pub name_contains: Option<String>,
    /// Minimum level, inclusive.
    #[serde(default)]
    pub min_level: Option<i32>,
}

impl PlayerFilter {
    /// Whether a record satisfies every criterion in the filter.
    pub fn matches(&self, player: &Player) -> bool {
        let name_ok = self.name_contains.as_ref().map_or(true, |needle| {
            player.name.to_lowercase().contains(&needle.to_lowercase())
        });
        let level_ok = self.min_level.map_or(true, |min| player.level >= min);
        name_ok && level_ok
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field: "name" });
    }
    let len = trimmed.chars().count();
    if len > NAME_MAX_LEN {
        return Err(ValidationError::TooLong {
            field: "name",
            max: NAME_MAX_LEN,
            actual: len,
        });
    }
    Ok(())
}

fn validate_level(level: i32) -> Result<(), ValidationError> {
    if !(LEVEL_MIN..=LEVEL_MAX).contains(&level) {
        return Err(ValidationError::OutOfRange {
            field: "level",
            min: i64::from(LEVEL_MIN),
            max: i64::from(LEVEL_MAX),
            actual: i64::from(level),
        });
    }
    Ok(())
}
