//! Common data types for ScanBell components.
//!
//! A room is addressed by the owner's account id, optionally followed by a
//! link suffix that the owner regenerates to invalidate previously printed
//! QR codes. Every component goes through [`RoomId`] to build or read that
//! string so the owner can always be recovered from the room.

use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a canonical owner id (hyphenated UUID).
pub const CANONICAL_OWNER_ID_LEN: usize = 36;

/// Separator between the owner id and the link suffix.
pub const LINK_SUFFIX_SEPARATOR: char = '-';

/// Random bytes behind a generated link suffix (hex encoded, 8 chars).
pub const LINK_SUFFIX_BYTES: usize = 4;

/// Errors produced while building or parsing a [`RoomId`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomIdError {
    /// The raw identifier was empty.
    #[error("room id is empty")]
    Empty,

    /// The CSPRNG could not produce a link suffix.
    #[error("failed to generate link suffix")]
    Randomness,
}

/// Room identifier: owning account plus optional regenerated link suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId {
    owner_id: String,
    link_suffix: Option<String>,
}

impl RoomId {
    /// Room addressed by the bare owner id.
    #[must_use]
    pub fn bare(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            link_suffix: None,
        }
    }

    /// Room addressed by owner id and an explicit link suffix.
    #[must_use]
    pub fn with_suffix(owner_id: impl Into<String>, link_suffix: impl Into<String>) -> Self {
        let link_suffix = link_suffix.into();
        Self {
            owner_id: owner_id.into(),
            link_suffix: (!link_suffix.is_empty()).then_some(link_suffix),
        }
    }

    /// New room for `owner_id` with a freshly generated link suffix.
    ///
    /// # Errors
    ///
    /// Returns [`RoomIdError::Randomness`] if the system RNG fails.
    pub fn regenerate(owner_id: impl Into<String>) -> Result<Self, RoomIdError> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; LINK_SUFFIX_BYTES];
        rng.fill(&mut bytes).map_err(|_| RoomIdError::Randomness)?;

        Ok(Self::with_suffix(owner_id, hex::encode(bytes)))
    }

    /// Parse a room id as it appears in call links and relay requests.
    ///
    /// A suffix is only recognised when the raw value is longer than a
    /// canonical owner id and contains the separator; the suffix is whatever
    /// follows the last separator. Anything else is a bare owner id.
    ///
    /// This length rule is deliberate and lives only here. A raw link string
    /// carries no other marker: a canonical owner id contains the separator
    /// itself, so only the extra length tells a suffixed room apart.
    /// Structured callers use [`RoomId::bare`] or [`RoomId::with_suffix`].
    ///
    /// # Errors
    ///
    /// Returns [`RoomIdError::Empty`] for an empty string.
    pub fn parse(raw: &str) -> Result<Self, RoomIdError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RoomIdError::Empty);
        }

        if raw.len() > CANONICAL_OWNER_ID_LEN {
            if let Some((owner, suffix)) = raw.rsplit_once(LINK_SUFFIX_SEPARATOR) {
                if !owner.is_empty() {
                    return Ok(Self::with_suffix(owner, suffix));
                }
            }
        }

        Ok(Self::bare(raw))
    }

    /// The owning account id.
    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// The link suffix, if this room was regenerated.
    #[must_use]
    pub fn link_suffix(&self) -> Option<&str> {
        self.link_suffix.as_deref()
    }

    /// Public call link path for this room.
    #[must_use]
    pub fn call_link(&self) -> String {
        format!("/call/{self}")
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.link_suffix {
            Some(suffix) => write!(f, "{}{}{}", self.owner_id, LINK_SUFFIX_SEPARATOR, suffix),
            None => f.write_str(&self.owner_id),
        }
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(room: RoomId) -> Self {
        room.to_string()
    }
}
