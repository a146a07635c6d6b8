use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rally_types::{
    ActivityEvent, CampaignId, GroupId, GroupInfo, LeaderboardSnapshot, LinkId, MemberProfile,
    PointsLedgerEntry, Referral, SmartLink, TeamId, TeamInfo, TrustRecord, UserId,
};
use std::collections::HashMap;

/// Repository interface the engines depend on. Scoring logic never touches a
/// concrete store; tests inject [`crate::MemoryStore`], production injects a
/// persistent adapter.
///
/// Multi-row writes are bracketed by `begin_transaction` / `commit_transaction`
/// (or `rollback_transaction` on failure); partial application is not
/// observable to readers after a rollback. Counter updates go through
/// [`RallyStore::increment_link_counters`], which adapters must apply as one
/// atomic mutation rather than read-modify-write at the call site.
#[async_trait]
pub trait RallyStore: Send + Sync {
    // --- points ledger (append-only) ---
    async fn append_entry(&self, entry: PointsLedgerEntry) -> Result<()>;
    async fn entries_for_user(
        &self,
        user: &UserId,
        campaign: Option<&CampaignId>,
    ) -> Result<Vec<PointsLedgerEntry>>;
    async fn all_entries(&self, campaign: Option<&CampaignId>) -> Result<Vec<PointsLedgerEntry>>;

    // --- smart links ---
    async fn insert_link(&self, link: SmartLink) -> Result<()>;
    async fn link_by_slug(&self, slug: &str) -> Result<Option<SmartLink>>;
    async fn link_by_owner(
        &self,
        user: &UserId,
        campaign: &CampaignId,
    ) -> Result<Option<SmartLink>>;
    async fn set_link_active(&self, link: &LinkId, active: bool) -> Result<()>;
    /// Atomically bump the counters and return the updated link.
    async fn increment_link_counters(
        &self,
        link: &LinkId,
        clicks: u64,
        unique: u64,
        conversions: u64,
    ) -> Result<SmartLink>;

    // --- activity events (append-only) ---
    async fn append_event(&self, event: ActivityEvent) -> Result<()>;
    async fn events_for_actor_since(
        &self,
        actor: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>>;
    async fn events_for_fingerprint_since(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>>;
    async fn events_for_link(&self, link: &LinkId) -> Result<Vec<ActivityEvent>>;

    // --- referrals ---
    async fn insert_referral(&self, referral: Referral) -> Result<()>;
    async fn referral_by_invitee(&self, invitee: &UserId, slug: &str)
        -> Result<Option<Referral>>;
    async fn referrals_by_inviter(&self, inviter: &UserId) -> Result<Vec<Referral>>;
    async fn all_referrals(&self) -> Result<Vec<Referral>>;

    // --- trust records ---
    async fn trust_record(&self, user: &UserId) -> Result<Option<TrustRecord>>;
    async fn put_trust_record(&self, record: TrustRecord) -> Result<()>;
    async fn flagged_trust_records(&self) -> Result<Vec<TrustRecord>>;

    // --- leaderboard snapshots ---
    /// Replace every row for (campaign, period) in one atomic write, so a
    /// reader never observes the transient empty window of delete-then-insert.
    async fn replace_snapshot_period(
        &self,
        campaign: Option<&CampaignId>,
        period: &str,
        rows: Vec<LeaderboardSnapshot>,
    ) -> Result<()>;
    async fn snapshots_for_period(
        &self,
        campaign: Option<&CampaignId>,
        period: &str,
    ) -> Result<Vec<LeaderboardSnapshot>>;

    // --- roster (profiles, teams, groups) ---
    async fn upsert_profile(&self, profile: MemberProfile) -> Result<()>;
    async fn profile(&self, user: &UserId) -> Result<Option<MemberProfile>>;
    /// Batch display-field lookup for ranking output.
    async fn profiles(&self, users: &[UserId]) -> Result<HashMap<UserId, MemberProfile>>;
    async fn upsert_team(&self, team: TeamInfo) -> Result<()>;
    async fn upsert_group(&self, group: GroupInfo) -> Result<()>;
    async fn teams(&self) -> Result<Vec<TeamInfo>>;
    async fn groups(&self) -> Result<Vec<GroupInfo>>;
    /// Current members only; past members keep their ledger rows but drop out
    /// of roll-ups.
    async fn team_members(&self, team: &TeamId) -> Result<Vec<UserId>>;
    async fn group_members(&self, group: &GroupId) -> Result<Vec<UserId>>;

    // --- transactional boundary ---
    async fn begin_transaction(&self) -> Result<()>;
    async fn commit_transaction(&self) -> Result<()>;
    async fn rollback_transaction(&self) -> Result<()>;
}
