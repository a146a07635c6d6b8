//! Leaderboard computation, rank-tier progress and snapshots.
//!
//! Rankings recompute from the full points ledger on every cache miss; the
//! cache only smooths repeated reads inside its TTL. Nothing here validates
//! campaigns or users: a campaign with no ledger rows is an empty ranking,
//! not an error.

pub mod progress;
pub mod types;

pub use progress::rank_progress;
pub use types::{
    GroupLeaderboardEntry, LeaderboardEntry, RankProgress, TeamLeaderboardEntry, UserRank,
};

use chrono::{DateTime, Utc};
use rally_cache::{keys, lookup_json, store_json, CacheStore};
use rally_store::RallyStore;
use rally_types::{
    CampaignId, LeaderboardSnapshot, PointsSummary, RankLadder, Result, TieBreak, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RankingConfig {
    pub ladder: RankLadder,
    pub tie_break: TieBreak,
    /// How long a computed leaderboard may be served before rescanning.
    pub rankings_ttl: Duration,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            ladder: RankLadder::default(),
            tie_break: TieBreak::default(),
            rankings_ttl: Duration::from_secs(60),
        }
    }
}

struct UserScore {
    user_id: UserId,
    summary: PointsSummary,
    /// When the user last gained points; the EarliestAchiever tie break
    /// favors whoever reached the shared score first.
    achieved_at: DateTime<Utc>,
}

pub struct RankingEngine {
    store: Arc<dyn RallyStore>,
    cache: Arc<dyn CacheStore>,
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(
        store: Arc<dyn RallyStore>,
        cache: Arc<dyn CacheStore>,
        config: RankingConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    pub fn ladder(&self) -> &RankLadder {
        &self.config.ladder
    }

    /// Full individual leaderboard, optionally scoped to one campaign.
    pub async fn compute_rankings(
        &self,
        campaign: Option<&CampaignId>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let key = keys::rankings_key(campaign);
        if let Some(cached) = lookup_json::<Vec<LeaderboardEntry>>(self.cache.as_ref(), &key).await
        {
            return Ok(cached);
        }

        let rankings = self.compute_rankings_fresh(campaign).await?;
        store_json(self.cache.as_ref(), &key, &rankings, self.config.rankings_ttl).await;
        Ok(rankings)
    }

    async fn compute_rankings_fresh(
        &self,
        campaign: Option<&CampaignId>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let scores = self.aggregate_scores(campaign).await?;

        let users: Vec<UserId> = scores.iter().map(|s| s.user_id.clone()).collect();
        let profiles = self.store.profiles(&users).await?;

        let mut rows: Vec<LeaderboardEntry> = scores
            .into_iter()
            .map(|score| {
                let profile = profiles.get(&score.user_id);
                LeaderboardEntry {
                    display_name: profile.map(|p| p.display_name.clone()),
                    avatar_url: profile.and_then(|p| p.avatar_url.clone()),
                    rank: 0,
                    score: score.summary.total,
                    impact: score.summary.impact,
                    consistency: score.summary.consistency,
                    leadership: score.summary.leadership,
                    reliability: score.summary.reliability,
                    campaign_id: campaign.cloned(),
                    user_id: score.user_id,
                }
            })
            .collect();

        assign_ranks(&mut rows, self.config.tie_break, |row| row.score, |row, rank| {
            row.rank = rank
        });
        Ok(rows)
    }

    /// Per-user category sums over the ledger, sorted for rank assignment.
    async fn aggregate_scores(&self, campaign: Option<&CampaignId>) -> Result<Vec<UserScore>> {
        let entries = self.store.all_entries(campaign).await?;

        let mut by_user: HashMap<UserId, UserScore> = HashMap::new();
        for entry in entries {
            let slot = by_user
                .entry(entry.user_id.clone())
                .or_insert_with(|| UserScore {
                    user_id: entry.user_id.clone(),
                    summary: PointsSummary::default(),
                    achieved_at: entry.created_at,
                });
            slot.summary.add(entry.category, entry.value);
            if entry.created_at > slot.achieved_at {
                slot.achieved_at = entry.created_at;
            }
        }

        let mut scores: Vec<UserScore> = by_user.into_values().collect();
        match self.config.tie_break {
            TieBreak::EarliestAchiever => scores.sort_by(|a, b| {
                b.summary
                    .total
                    .cmp(&a.summary.total)
                    .then(a.achieved_at.cmp(&b.achieved_at))
                    .then(a.user_id.cmp(&b.user_id))
            }),
            _ => scores.sort_by(|a, b| {
                b.summary
                    .total
                    .cmp(&a.summary.total)
                    .then(a.user_id.cmp(&b.user_id))
            }),
        }
        Ok(scores)
    }

    /// Where one user stands. Users without ledger rows rank after everyone,
    /// not nowhere.
    pub async fn user_rank(
        &self,
        user: &UserId,
        campaign: Option<&CampaignId>,
    ) -> Result<UserRank> {
        let rankings = self.compute_rankings(campaign).await?;
        let total = rankings.len() as u32;

        let (position, score) = match rankings.iter().find(|r| &r.user_id == user) {
            Some(row) => (row.rank, row.score),
            None => (total + 1, 0),
        };

        let percentile = if total == 0 {
            0
        } else {
            let kept = total as i64 - position as i64 + 1;
            if kept <= 0 {
                0
            } else {
                ((kept as f64 / total as f64) * 100.0).round() as u32
            }
        };

        Ok(UserRank {
            position,
            score,
            percentile,
        })
    }

    /// Team roll-up: the sum of current members' individual scores. Members
    /// who left keep their ledger rows but stop counting here.
    pub async fn team_leaderboard(
        &self,
        campaign: Option<&CampaignId>,
    ) -> Result<Vec<TeamLeaderboardEntry>> {
        let score_by_user = self.score_map(campaign).await?;
        let teams = self.store.teams().await?;

        let mut rows = Vec::with_capacity(teams.len());
        for team in teams {
            let members = self.store.team_members(&team.id).await?;
            let score = members
                .iter()
                .map(|m| score_by_user.get(m).copied().unwrap_or(0))
                .sum();
            rows.push(TeamLeaderboardEntry {
                team_id: team.id,
                name: team.name,
                rank: 0,
                score,
                member_count: members.len(),
            });
        }

        rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.team_id.cmp(&b.team_id)));
        assign_ranks(&mut rows, self.config.tie_break, |row| row.score, |row, rank| {
            row.rank = rank
        });
        Ok(rows)
    }

    pub async fn group_leaderboard(
        &self,
        campaign: Option<&CampaignId>,
    ) -> Result<Vec<GroupLeaderboardEntry>> {
        let score_by_user = self.score_map(campaign).await?;
        let groups = self.store.groups().await?;

        let mut rows = Vec::with_capacity(groups.len());
        for group in groups {
            let members = self.store.group_members(&group.id).await?;
            let score = members
                .iter()
                .map(|m| score_by_user.get(m).copied().unwrap_or(0))
                .sum();
            rows.push(GroupLeaderboardEntry {
                group_id: group.id,
                name: group.name,
                rank: 0,
                score,
                member_count: members.len(),
            });
        }

        rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.group_id.cmp(&b.group_id)));
        assign_ranks(&mut rows, self.config.tie_break, |row| row.score, |row, rank| {
            row.rank = rank
        });
        Ok(rows)
    }

    async fn score_map(&self, campaign: Option<&CampaignId>) -> Result<HashMap<UserId, i64>> {
        let scores = self.aggregate_scores(campaign).await?;
        Ok(scores
            .into_iter()
            .map(|s| (s.user_id, s.summary.total))
            .collect())
    }

    /// Progress of a total score through the rank ladder.
    pub fn rank_progress(&self, total_score: i64) -> RankProgress {
        progress::rank_progress(&self.config.ladder, total_score)
    }

    /// Materialize the current ranking for a period, replacing whatever rows
    /// that (campaign, period) held before. The replace is a single
    /// transactional store call; readers never see a half-written period.
    pub async fn refresh_snapshot(
        &self,
        campaign: Option<&CampaignId>,
        period: &str,
    ) -> Result<Vec<LeaderboardSnapshot>> {
        let rankings = self.compute_rankings_fresh(campaign).await?;
        let now = Utc::now();

        let rows: Vec<LeaderboardSnapshot> = rankings
            .iter()
            .map(|entry| LeaderboardSnapshot {
                id: LeaderboardSnapshot::row_id(&entry.user_id, campaign, period),
                user_id: entry.user_id.clone(),
                campaign_id: campaign.cloned(),
                period: period.to_string(),
                rank: entry.rank,
                score: entry.score,
                created_at: now,
            })
            .collect();

        self.store
            .replace_snapshot_period(campaign, period, rows.clone())
            .await?;

        info!(
            period,
            campaign = campaign.map(|c| c.as_str()).unwrap_or("all"),
            rows = rows.len(),
            "📸 Leaderboard snapshot refreshed"
        );
        Ok(rows)
    }

    pub async fn snapshot(
        &self,
        campaign: Option<&CampaignId>,
        period: &str,
    ) -> Result<Vec<LeaderboardSnapshot>> {
        Ok(self.store.snapshots_for_period(campaign, period).await?)
    }
}

/// Assign 1-based ranks over rows already sorted by descending score.
/// Competition ranking lets equal scores share a rank and skips the next
/// ones; the other policies stay dense.
fn assign_ranks<T>(
    rows: &mut [T],
    tie_break: TieBreak,
    score_of: impl Fn(&T) -> i64,
    set_rank: impl Fn(&mut T, u32),
) {
    let mut previous_score: Option<i64> = None;
    let mut previous_rank = 0u32;
    for (idx, row) in rows.iter_mut().enumerate() {
        let score = score_of(row);
        let rank = match tie_break {
            TieBreak::Competition if previous_score == Some(score) => previous_rank,
            _ => idx as u32 + 1,
        };
        set_rank(row, rank);
        previous_score = Some(score);
        previous_rank = rank;
    }
}
