use crate::error::{Result, StorageError};
use crate::shortcode::ShortCode;
use serde::{Deserialize, Serialize};

/// Identifier of the user who submitted a link.
pub type OwnerId = i64;

/// Owner recorded for links saved without an authenticated user.
pub const ANONYMOUS_OWNER: OwnerId = 0;

/// A stored short link.
///
/// Rows are never physically removed; `deleted` only ever moves from
/// `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    pub code: ShortCode,
    pub original_url: String,
    pub owner_id: OwnerId,
    pub deleted: bool,
}

/// A row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub code: ShortCode,
    pub original_url: String,
    pub owner_id: OwnerId,
}

impl NewLink {
    pub fn into_link(self) -> ShortLink {
        ShortLink {
            code: self.code,
            original_url: self.original_url,
            owner_id: self.owner_id,
            deleted: false,
        }
    }
}

/// The projection returned when listing a user's links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLink {
    pub code: ShortCode,
    pub original_url: String,
}

impl From<ShortLink> for UserLink {
    fn from(link: ShortLink) -> Self {
        Self {
            code: link.code,
            original_url: link.original_url,
        }
    }
}

/// What a lookup by short code found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The code maps to a live link.
    Live(String),
    /// The code existed but has been soft-deleted.
    Tombstoned,
    /// The code was never assigned.
    Absent,
}

impl Resolution {
    pub fn is_live(&self) -> bool {
        matches!(self, Resolution::Live(_))
    }

    /// Converts into the error form: `Absent` becomes `NotFound` and
    /// `Tombstoned` becomes `AlreadyDeleted`.
    pub fn into_result(self, code: &ShortCode) -> Result<String> {
        match self {
            Resolution::Live(url) => Ok(url),
            Resolution::Tombstoned => Err(StorageError::AlreadyDeleted(code.clone())),
            Resolution::Absent => Err(StorageError::NotFound(code.clone())),
        }
    }
}

impl From<Option<ShortLink>> for Resolution {
    fn from(link: Option<ShortLink>) -> Self {
        match link {
            Some(link) if link.deleted => Resolution::Tombstoned,
            Some(link) => Resolution::Live(link.original_url),
            None => Resolution::Absent,
        }
    }
}

/// Result of saving a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new row was created under this code.
    Created(ShortCode),
    /// The URL was already stored; this is the code it was stored under.
    Existing(ShortCode),
}

impl SaveOutcome {
    pub fn code(&self) -> &ShortCode {
        match self {
            SaveOutcome::Created(code) | SaveOutcome::Existing(code) => code,
        }
    }

    pub fn into_code(self) -> ShortCode {
        match self {
            SaveOutcome::Created(code) | SaveOutcome::Existing(code) => code,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, SaveOutcome::Existing(_))
    }

    /// Converts into the error form, signalling a duplicate as
    /// [`StorageError::DuplicateUrl`].
    pub fn into_result(self) -> Result<ShortCode> {
        match self {
            SaveOutcome::Created(code) => Ok(code),
            SaveOutcome::Existing(code) => Err(StorageError::DuplicateUrl { code }),
        }
    }
}
