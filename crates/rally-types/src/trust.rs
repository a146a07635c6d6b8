use crate::id::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const DEFAULT_TRUST_SCORE: u32 = 100;

/// Flags a fraud rule can raise. Stored as a set; re-triggering an
/// already-set flag is a no-op on the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustFlag {
    DuplicateActivity,
    ClickVelocity,
    FingerprintReuse,
    RateLimited,
}

impl fmt::Display for TrustFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrustFlag::DuplicateActivity => "DUPLICATE_ACTIVITY",
            TrustFlag::ClickVelocity => "CLICK_VELOCITY",
            TrustFlag::FingerprintReuse => "FINGERPRINT_REUSE",
            TrustFlag::RateLimited => "RATE_LIMITED",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of a manual review of a flagged user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewResolution {
    /// Flags cleared, score restored to the default.
    Clear,
    /// Fixed additional penalty; flags stay for the audit trail.
    Penalize,
    /// Mark as seen by a reviewer without resolving.
    Escalate,
}

/// Per-user integrity score. Starts at 100, only rule triggers move it down,
/// only an explicit Clear review moves it back up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRecord {
    pub user_id: UserId,
    pub score: u32,
    pub flags: BTreeSet<TrustFlag>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TrustRecord {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            score: DEFAULT_TRUST_SCORE,
            flags: BTreeSet::new(),
            last_reviewed_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }

    /// Apply a penalty, flooring at zero. Never pushes the score up.
    pub fn penalize(&mut self, penalty: u32) {
        self.score = self.score.saturating_sub(penalty);
        self.updated_at = Utc::now();
    }
}
