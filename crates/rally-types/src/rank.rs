use crate::id::{CampaignId, EntryId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tier in the rank ladder. Tiers are static configuration, not rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankLevel {
    pub level: u32,
    pub name: String,
    pub min_score: i64,
    pub badge: String,
    pub color: String,
}

/// Ordered rank tiers with strictly increasing thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankLadder {
    levels: Vec<RankLevel>,
}

impl RankLadder {
    /// Build a ladder, rejecting out-of-order or duplicate thresholds.
    pub fn new(levels: Vec<RankLevel>) -> anyhow::Result<Self> {
        if levels.is_empty() {
            anyhow::bail!("rank ladder must have at least one tier");
        }
        if levels[0].min_score != 0 {
            anyhow::bail!("lowest tier must start at score 0");
        }
        for pair in levels.windows(2) {
            if pair[1].min_score <= pair[0].min_score {
                anyhow::bail!(
                    "rank thresholds must be strictly increasing: {} then {}",
                    pair[0].min_score,
                    pair[1].min_score
                );
            }
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[RankLevel] {
        &self.levels
    }

    /// Highest tier whose threshold the score has crossed.
    pub fn level_for(&self, score: i64) -> &RankLevel {
        self.levels
            .iter()
            .rev()
            .find(|l| l.min_score <= score)
            .unwrap_or(&self.levels[0])
    }

    /// The tier after the one `score` sits in, if any.
    pub fn next_after(&self, score: i64) -> Option<&RankLevel> {
        self.levels.iter().find(|l| l.min_score > score)
    }
}

impl Default for RankLadder {
    fn default() -> Self {
        let tier = |level, name: &str, min_score, badge: &str, color: &str| RankLevel {
            level,
            name: name.to_string(),
            min_score,
            badge: badge.to_string(),
            color: color.to_string(),
        };
        Self {
            levels: vec![
                tier(1, "Recruit", 0, "🎖", "#9ca3af"),
                tier(2, "Private", 50, "🎖", "#84cc16"),
                tier(3, "Corporal", 150, "🎖", "#22c55e"),
                tier(4, "Sergeant", 300, "🎖", "#14b8a6"),
                tier(5, "Lieutenant", 600, "⭐", "#3b82f6"),
                tier(6, "Captain", 1000, "⭐", "#8b5cf6"),
                tier(7, "Major", 1500, "⭐", "#d946ef"),
                tier(8, "Colonel", 2500, "🦅", "#f59e0b"),
                tier(9, "General", 5000, "🦅", "#ef4444"),
            ],
        }
    }
}

/// Tie policy for leaderboard ranking. The source system ranked purely by
/// sort order; the other two make the tie handling explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Dense 1..N ranks in sort order; equal scores get arbitrary relative
    /// order (the source behavior).
    #[default]
    SortOrder,
    /// Equal scores share a rank; the next rank skips (1, 2, 2, 4).
    Competition,
    /// Equal scores break by who reached their score first; ranks stay dense.
    EarliestAchiever,
}

/// Persisted point-in-time ranking row. One per (user, campaign, period);
/// refreshing a period replaces its rows wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub id: EntryId,
    pub user_id: UserId,
    pub campaign_id: Option<CampaignId>,
    pub period: String,
    pub rank: u32,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

impl LeaderboardSnapshot {
    /// Deterministic row id so refreshing an unchanged period reproduces the
    /// same rows instead of minting new ones.
    pub fn row_id(user: &UserId, campaign: Option<&CampaignId>, period: &str) -> EntryId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(user.as_str().as_bytes());
        hasher.update(b":");
        if let Some(campaign) = campaign {
            hasher.update(campaign.as_str().as_bytes());
        }
        hasher.update(b":");
        hasher.update(period.as_bytes());
        EntryId::new(hex::encode(&hasher.finalize().as_bytes()[..12]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_is_valid() {
        let ladder = RankLadder::default();
        RankLadder::new(ladder.levels().to_vec()).unwrap();
    }

    #[test]
    fn test_level_for_picks_highest_crossed() {
        let ladder = RankLadder::default();
        assert_eq!(ladder.level_for(0).name, "Recruit");
        assert_eq!(ladder.level_for(49).name, "Recruit");
        assert_eq!(ladder.level_for(50).name, "Private");
        assert_eq!(ladder.level_for(999_999).name, "General");
    }

    #[test]
    fn test_next_after() {
        let ladder = RankLadder::default();
        assert_eq!(ladder.next_after(35).unwrap().name, "Private");
        assert!(ladder.next_after(999_999).is_none());
    }

    #[test]
    fn test_rejects_non_monotone_ladder() {
        let bad = vec![
            RankLevel {
                level: 1,
                name: "A".into(),
                min_score: 0,
                badge: String::new(),
                color: String::new(),
            },
            RankLevel {
                level: 2,
                name: "B".into(),
                min_score: 0,
                badge: String::new(),
                color: String::new(),
            },
        ];
        assert!(RankLadder::new(bad).is_err());
    }

    #[test]
    fn test_snapshot_row_id_deterministic() {
        let user = UserId::new("u1");
        let campaign = CampaignId::new("c1");
        let a = LeaderboardSnapshot::row_id(&user, Some(&campaign), "2026-W10");
        let b = LeaderboardSnapshot::row_id(&user, Some(&campaign), "2026-W10");
        let c = LeaderboardSnapshot::row_id(&user, Some(&campaign), "2026-W11");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
