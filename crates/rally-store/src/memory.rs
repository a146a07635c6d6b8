use crate::store::RallyStore;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rally_types::{
    ActivityEvent, CampaignId, GroupId, GroupInfo, LeaderboardSnapshot, LinkId, MemberProfile,
    PointsLedgerEntry, Referral, SmartLink, TeamId, TeamInfo, TrustRecord, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
struct Tables {
    ledger: Vec<PointsLedgerEntry>,
    links: HashMap<LinkId, SmartLink>,
    events: Vec<ActivityEvent>,
    referrals: Vec<Referral>,
    trust: HashMap<UserId, TrustRecord>,
    snapshots: Vec<LeaderboardSnapshot>,
    profiles: HashMap<UserId, MemberProfile>,
    teams: HashMap<TeamId, TeamInfo>,
    groups: HashMap<GroupId, GroupInfo>,
}

/// In-memory adapter used by tests and development. A single table set under
/// one lock; transactions snapshot the whole set and restore it on rollback.
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    transaction_backup: Arc<RwLock<Option<Tables>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            transaction_backup: Arc::new(RwLock::new(None)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RallyStore for MemoryStore {
    async fn append_entry(&self, entry: PointsLedgerEntry) -> Result<()> {
        let mut tables = self.tables.write().await;
        debug!(
            user = %entry.user_id,
            category = %entry.category,
            value = entry.value,
            ledger_size = tables.ledger.len() + 1,
            "Ledger entry appended"
        );
        tables.ledger.push(entry);
        Ok(())
    }

    async fn entries_for_user(
        &self,
        user: &UserId,
        campaign: Option<&CampaignId>,
    ) -> Result<Vec<PointsLedgerEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ledger
            .iter()
            .filter(|e| &e.user_id == user)
            .filter(|e| campaign.is_none() || e.campaign_id.as_ref() == campaign)
            .cloned()
            .collect())
    }

    async fn all_entries(&self, campaign: Option<&CampaignId>) -> Result<Vec<PointsLedgerEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ledger
            .iter()
            .filter(|e| campaign.is_none() || e.campaign_id.as_ref() == campaign)
            .cloned()
            .collect())
    }

    async fn insert_link(&self, link: SmartLink) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.links.values().any(|l| l.slug == link.slug) {
            bail!("slug already taken: {}", link.slug);
        }
        info!(
            link = %link.id,
            slug = %link.slug,
            owner = %link.user_id,
            campaign = %link.campaign_id,
            "🔗 Smart link stored"
        );
        tables.links.insert(link.id.clone(), link);
        Ok(())
    }

    async fn link_by_slug(&self, slug: &str) -> Result<Option<SmartLink>> {
        let tables = self.tables.read().await;
        Ok(tables.links.values().find(|l| l.slug == slug).cloned())
    }

    async fn link_by_owner(
        &self,
        user: &UserId,
        campaign: &CampaignId,
    ) -> Result<Option<SmartLink>> {
        let tables = self.tables.read().await;
        Ok(tables
            .links
            .values()
            .find(|l| &l.user_id == user && &l.campaign_id == campaign)
            .cloned())
    }

    async fn set_link_active(&self, link: &LinkId, active: bool) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.links.get_mut(link) {
            Some(row) => {
                row.is_active = active;
                Ok(())
            }
            None => bail!("link not found: {}", link),
        }
    }

    async fn increment_link_counters(
        &self,
        link: &LinkId,
        clicks: u64,
        unique: u64,
        conversions: u64,
    ) -> Result<SmartLink> {
        // Single mutation under the write lock; concurrent callers serialize
        // here instead of racing a read-modify-write.
        let mut tables = self.tables.write().await;
        match tables.links.get_mut(link) {
            Some(row) => {
                row.click_count += clicks;
                row.unique_click_count += unique;
                row.conversion_count += conversions;
                Ok(row.clone())
            }
            None => bail!("link not found: {}", link),
        }
    }

    async fn append_event(&self, event: ActivityEvent) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.events.push(event);
        Ok(())
    }

    async fn events_for_actor_since(
        &self,
        actor: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.actor.as_ref() == Some(actor) && e.created_at >= since)
            .cloned()
            .collect())
    }

    async fn events_for_fingerprint_since(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.fingerprint.as_deref() == Some(fingerprint) && e.created_at >= since)
            .cloned()
            .collect())
    }

    async fn events_for_link(&self, link: &LinkId) -> Result<Vec<ActivityEvent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.link_id.as_ref() == Some(link))
            .cloned()
            .collect())
    }

    async fn insert_referral(&self, referral: Referral) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .referrals
            .iter()
            .any(|r| r.invitee_id == referral.invitee_id && r.slug == referral.slug)
        {
            bail!(
                "referral already attributed for invitee {} via {}",
                referral.invitee_id,
                referral.slug
            );
        }
        tables.referrals.push(referral);
        Ok(())
    }

    async fn referral_by_invitee(
        &self,
        invitee: &UserId,
        slug: &str,
    ) -> Result<Option<Referral>> {
        let tables = self.tables.read().await;
        Ok(tables
            .referrals
            .iter()
            .find(|r| &r.invitee_id == invitee && r.slug == slug)
            .cloned())
    }

    async fn referrals_by_inviter(&self, inviter: &UserId) -> Result<Vec<Referral>> {
        let tables = self.tables.read().await;
        Ok(tables
            .referrals
            .iter()
            .filter(|r| &r.inviter_id == inviter)
            .cloned()
            .collect())
    }

    async fn all_referrals(&self) -> Result<Vec<Referral>> {
        let tables = self.tables.read().await;
        Ok(tables.referrals.clone())
    }

    async fn trust_record(&self, user: &UserId) -> Result<Option<TrustRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.trust.get(user).cloned())
    }

    async fn put_trust_record(&self, record: TrustRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.trust.insert(record.user_id.clone(), record);
        Ok(())
    }

    async fn flagged_trust_records(&self) -> Result<Vec<TrustRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .trust
            .values()
            .filter(|r| r.is_flagged())
            .cloned()
            .collect())
    }

    async fn replace_snapshot_period(
        &self,
        campaign: Option<&CampaignId>,
        period: &str,
        rows: Vec<LeaderboardSnapshot>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.snapshots.len();
        tables
            .snapshots
            .retain(|s| !(s.period == period && s.campaign_id.as_ref() == campaign));
        let replaced = before - tables.snapshots.len();
        let inserted = rows.len();
        tables.snapshots.extend(rows);
        info!(
            period,
            campaign = campaign.map(|c| c.as_str()).unwrap_or("all"),
            replaced,
            inserted,
            "📸 Snapshot period replaced"
        );
        Ok(())
    }

    async fn snapshots_for_period(
        &self,
        campaign: Option<&CampaignId>,
        period: &str,
    ) -> Result<Vec<LeaderboardSnapshot>> {
        let tables = self.tables.read().await;
        Ok(tables
            .snapshots
            .iter()
            .filter(|s| s.period == period && s.campaign_id.as_ref() == campaign)
            .cloned()
            .collect())
    }

    async fn upsert_profile(&self, profile: MemberProfile) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    async fn profile(&self, user: &UserId) -> Result<Option<MemberProfile>> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.get(user).cloned())
    }

    async fn profiles(&self, users: &[UserId]) -> Result<HashMap<UserId, MemberProfile>> {
        let tables = self.tables.read().await;
        Ok(users
            .iter()
            .filter_map(|u| tables.profiles.get(u).map(|p| (u.clone(), p.clone())))
            .collect())
    }

    async fn upsert_team(&self, team: TeamInfo) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.teams.insert(team.id.clone(), team);
        Ok(())
    }

    async fn upsert_group(&self, group: GroupInfo) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.groups.insert(group.id.clone(), group);
        Ok(())
    }

    async fn teams(&self) -> Result<Vec<TeamInfo>> {
        let tables = self.tables.read().await;
        let mut teams: Vec<TeamInfo> = tables.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(teams)
    }

    async fn groups(&self) -> Result<Vec<GroupInfo>> {
        let tables = self.tables.read().await;
        let mut groups: Vec<GroupInfo> = tables.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    async fn team_members(&self, team: &TeamId) -> Result<Vec<UserId>> {
        let tables = self.tables.read().await;
        let mut members: Vec<UserId> = tables
            .profiles
            .values()
            .filter(|p| p.team_id.as_ref() == Some(team))
            .map(|p| p.user_id.clone())
            .collect();
        members.sort();
        Ok(members)
    }

    async fn group_members(&self, group: &GroupId) -> Result<Vec<UserId>> {
        let tables = self.tables.read().await;
        let mut members: Vec<UserId> = tables
            .profiles
            .values()
            .filter(|p| p.group_id.as_ref() == Some(group))
            .map(|p| p.user_id.clone())
            .collect();
        members.sort();
        Ok(members)
    }

    async fn begin_transaction(&self) -> Result<()> {
        let tables = self.tables.read().await;
        let mut backup = self.transaction_backup.write().await;
        *backup = Some(tables.clone());
        debug!(
            ledger_rows = tables.ledger.len(),
            links = tables.links.len(),
            "Transaction began (snapshot created)"
        );
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        let mut backup = self.transaction_backup.write().await;
        if backup.take().is_some() {
            debug!("Transaction committed (snapshot discarded)");
        }
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        let mut backup = self.transaction_backup.write().await;
        if let Some(saved) = backup.take() {
            let mut tables = self.tables.write().await;
            *tables = saved;
            info!("❌ Transaction rolled back (snapshot restored)");
        }
        Ok(())
    }
}
