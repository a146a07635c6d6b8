use crate::id::{CampaignId, EntryId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of scoring categories. Stored as snake_case strings but never
/// passed around as raw strings inside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointCategory {
    Impact,
    Consistency,
    Leadership,
    Reliability,
}

impl PointCategory {
    pub const ALL: [PointCategory; 4] = [
        PointCategory::Impact,
        PointCategory::Consistency,
        PointCategory::Leadership,
        PointCategory::Reliability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PointCategory::Impact => "impact",
            PointCategory::Consistency => "consistency",
            PointCategory::Leadership => "leadership",
            PointCategory::Reliability => "reliability",
        }
    }
}

impl fmt::Display for PointCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every action the core knows how to score. The category/value mapping is a
/// static table; callers never pick point values directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointAction {
    LinkClick,
    ContentShare,
    ReferralJoined,
    DonationSubmitted,
    DailyStreak,
    StreakMilestone,
    GoalCompleted,
    CampaignJoined,
}

impl PointAction {
    pub fn reward(&self) -> (PointCategory, i64) {
        match self {
            PointAction::LinkClick => (PointCategory::Impact, 1),
            PointAction::ContentShare => (PointCategory::Impact, 3),
            PointAction::ReferralJoined => (PointCategory::Leadership, 25),
            PointAction::DonationSubmitted => (PointCategory::Impact, 20),
            PointAction::DailyStreak => (PointCategory::Consistency, 5),
            PointAction::StreakMilestone => (PointCategory::Consistency, 15),
            PointAction::GoalCompleted => (PointCategory::Reliability, 10),
            PointAction::CampaignJoined => (PointCategory::Consistency, 2),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PointAction::LinkClick => "Smart link click",
            PointAction::ContentShare => "Content shared",
            PointAction::ReferralJoined => "Referred member joined",
            PointAction::DonationSubmitted => "Donation submitted",
            PointAction::DailyStreak => "Daily activity streak",
            PointAction::StreakMilestone => "Streak milestone reached",
            PointAction::GoalCompleted => "Campaign goal completed",
            PointAction::CampaignJoined => "Joined campaign",
        }
    }
}

/// One immutable row in the points ledger. Never updated or deleted once
/// written; all scores derive from scanning these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsLedgerEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub campaign_id: Option<CampaignId>,
    pub category: PointCategory,
    pub value: i64,
    pub description: String,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-category totals for one user, optionally scoped to a campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsSummary {
    pub impact: i64,
    pub consistency: i64,
    pub leadership: i64,
    pub reliability: i64,
    pub total: i64,
}

impl PointsSummary {
    pub fn add(&mut self, category: PointCategory, value: i64) {
        match category {
            PointCategory::Impact => self.impact += value,
            PointCategory::Consistency => self.consistency += value,
            PointCategory::Leadership => self.leadership += value,
            PointCategory::Reliability => self.reliability += value,
        }
        self.total += value;
    }

    pub fn get(&self, category: PointCategory) -> i64 {
        match category {
            PointCategory::Impact => self.impact,
            PointCategory::Consistency => self.consistency,
            PointCategory::Leadership => self.leadership,
            PointCategory::Reliability => self.reliability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_table_categories() {
        // Every action maps into the closed category set with a positive value
        for action in [
            PointAction::LinkClick,
            PointAction::ContentShare,
            PointAction::ReferralJoined,
            PointAction::DonationSubmitted,
            PointAction::DailyStreak,
            PointAction::StreakMilestone,
            PointAction::GoalCompleted,
            PointAction::CampaignJoined,
        ] {
            let (category, value) = action.reward();
            assert!(PointCategory::ALL.contains(&category));
            assert!(value > 0);
        }
    }

    #[test]
    fn test_summary_total_tracks_fields() {
        let mut summary = PointsSummary::default();
        summary.add(PointCategory::Impact, 10);
        summary.add(PointCategory::Leadership, 25);
        assert_eq!(summary.impact, 10);
        assert_eq!(summary.leadership, 25);
        assert_eq!(
            summary.total,
            summary.impact + summary.consistency + summary.leadership + summary.reliability
        );
    }

    #[test]
    fn test_category_serde_snake_case() {
        let json = serde_json::to_string(&PointCategory::Reliability).unwrap();
        assert_eq!(json, "\"reliability\"");
        let back: PointCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PointCategory::Reliability);
    }
}
