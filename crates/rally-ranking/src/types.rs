use rally_types::{CampaignId, GroupId, RankLevel, TeamId, UserId};
use serde::{Deserialize, Serialize};

/// One row of a computed individual leaderboard. Derived on read, never
/// persisted; snapshots materialize a reduced copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub rank: u32,
    pub score: i64,
    pub impact: i64,
    pub consistency: i64,
    pub leadership: i64,
    pub reliability: i64,
    pub campaign_id: Option<CampaignId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamLeaderboardEntry {
    pub team_id: TeamId,
    pub name: String,
    pub rank: u32,
    pub score: i64,
    pub member_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupLeaderboardEntry {
    pub group_id: GroupId,
    pub name: String,
    pub rank: u32,
    pub score: i64,
    pub member_count: usize,
}

/// Where one user stands: a user with no points ranks last rather than being
/// omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRank {
    pub position: u32,
    pub score: i64,
    pub percentile: u32,
}

/// Progress toward the next rank tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankProgress {
    pub current: RankLevel,
    pub next: Option<RankLevel>,
    pub points_to_next: i64,
    pub progress_percent: u32,
}
