//! The posting state machine: persisted statuses, per-stage eligibility,
//! and the Stage-2 failure policy.

use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Persisted posting status. The wire values are the lowercase strings.
///
/// Pipeline order is `new -> extracted -> vectorized -> structured ->
/// analyzed`; `archived` is terminal and set by external callers; `failed`
/// marks an unrecoverable extraction error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostingStatus {
    New,
    Extracted,
    Vectorized,
    Structured,
    Analyzed,
    Archived,
    Failed,
}

impl PostingStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Extracted => "extracted",
            Self::Vectorized => "vectorized",
            Self::Structured => "structured",
            Self::Analyzed => "analyzed",
            Self::Archived => "archived",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PostingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "extracted" => Ok(Self::Extracted),
            "vectorized" => Ok(Self::Vectorized),
            "structured" => Ok(Self::Structured),
            "analyzed" => Ok(Self::Analyzed),
            "archived" => Ok(Self::Archived),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// A pipeline stage, identified by the statuses it may claim work from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    Vectorization,
    Judgment,
}

impl Stage {
    /// Statuses a posting must be in for this stage to claim it.
    ///
    /// The judgment stage also accepts `vectorized` postings so it can run
    /// structured extraction and judgment in one worker pass; extraction is
    /// skipped for postings that already carry attributes.
    #[must_use]
    pub const fn eligible_statuses(self) -> &'static [PostingStatus] {
        match self {
            Self::Extraction => &[PostingStatus::New],
            Self::Vectorization => &[PostingStatus::Extracted],
            Self::Judgment => &[PostingStatus::Vectorized, PostingStatus::Structured],
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Vectorization => "vectorization",
            Self::Judgment => "judgment",
        }
    }
}

/// What happens to a posting's status when Stage 2 produces a
/// technical-failure analysis.
///
/// Under `Advance` the posting still moves to `analyzed` so failed items do
/// not spin the queue; under `Retry` the status is left unchanged and the
/// posting stays eligible for the next analyze pass. The failed analysis
/// record is persisted either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage2FailurePolicy {
    #[default]
    Advance,
    Retry,
}

impl Stage2FailurePolicy {
    /// Parse a config string. Unrecognized values default to `Advance`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "retry" => Self::Retry,
            _ => Self::Advance,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Retry => "retry",
        }
    }
}
