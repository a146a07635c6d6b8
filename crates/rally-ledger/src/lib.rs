//! Append-only points ledger, the source of truth for every score.
//!
//! Awards look up a static action table, append one immutable row, and
//! invalidate the cached summaries that row makes stale. Summaries recompute
//! from a full ledger scan on each cache miss; the cache is an optimization,
//! never authoritative.

use rally_cache::{keys, lookup_json, store_json, CacheStore};
use rally_store::RallyStore;
use rally_types::{
    CampaignId, EntryId, PointAction, PointCategory, PointsLedgerEntry, PointsSummary, Result,
    UserId,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// How long a computed summary may be served before rescanning.
    pub summary_ttl: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            summary_ttl: Duration::from_secs(60),
        }
    }
}

pub struct PointsLedger {
    store: Arc<dyn RallyStore>,
    cache: Arc<dyn CacheStore>,
    config: LedgerConfig,
}

impl PointsLedger {
    pub fn new(
        store: Arc<dyn RallyStore>,
        cache: Arc<dyn CacheStore>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Award points for a known action. Appends exactly one row; there is no
    /// idempotency guarantee at this layer, so callers that can re-fire for
    /// the same cause must dedup before calling (the referral and click
    /// pipelines do).
    pub async fn award(
        &self,
        user: &UserId,
        action: PointAction,
        campaign: Option<&CampaignId>,
        reference: Option<&str>,
    ) -> Result<PointsLedgerEntry> {
        let (category, value) = action.reward();
        self.award_value(
            user,
            category,
            value,
            action.description(),
            campaign,
            reference,
        )
        .await
    }

    /// Append a row with an explicit category and value. Used for awards with
    /// dynamic values (goal events); `award` is the common path.
    pub async fn award_value(
        &self,
        user: &UserId,
        category: PointCategory,
        value: i64,
        description: &str,
        campaign: Option<&CampaignId>,
        reference: Option<&str>,
    ) -> Result<PointsLedgerEntry> {
        let entry = PointsLedgerEntry {
            id: EntryId::generate(),
            user_id: user.clone(),
            campaign_id: campaign.cloned(),
            category,
            value,
            description: description.to_string(),
            reference_id: reference.map(|r| r.to_string()),
            created_at: Utc::now(),
        };

        self.store.append_entry(entry.clone()).await?;

        // Any summary including this user is now stale; the per-campaign key
        // shares the user prefix.
        self.cache
            .invalidate_prefix(&keys::summary_prefix(user))
            .await;
        self.cache.invalidate_prefix(keys::rankings_prefix()).await;

        info!(
            user = %user,
            category = %category,
            value,
            campaign = campaign.map(|c| c.as_str()).unwrap_or("all"),
            "🏅 Points awarded"
        );
        Ok(entry)
    }

    /// Per-category totals for a user, optionally scoped to one campaign.
    pub async fn points_summary(
        &self,
        user: &UserId,
        campaign: Option<&CampaignId>,
    ) -> Result<PointsSummary> {
        let key = keys::summary_key(user, campaign);
        if let Some(cached) = lookup_json::<PointsSummary>(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let entries = self.store.entries_for_user(user, campaign).await?;
        let mut summary = PointsSummary::default();
        for entry in &entries {
            summary.add(entry.category, entry.value);
        }

        store_json(self.cache.as_ref(), &key, &summary, self.config.summary_ttl).await;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rally_cache::MemoryCache;
    use rally_store::MemoryStore;

    fn ledger() -> PointsLedger {
        PointsLedger::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new()),
            LedgerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_award_uses_action_table() {
        let ledger = ledger();
        let user = UserId::new("u1");

        let entry = ledger
            .award(&user, PointAction::ReferralJoined, None, Some("ref-1"))
            .await
            .unwrap();
        assert_eq!(entry.category, PointCategory::Leadership);
        assert_eq!(entry.value, 25);
        assert_eq!(entry.reference_id.as_deref(), Some("ref-1"));
    }

    #[tokio::test]
    async fn test_summary_matches_ledger_sum() {
        let ledger = ledger();
        let user = UserId::new("u1");

        ledger
            .award_value(&user, PointCategory::Impact, 10, "manual", None, None)
            .await
            .unwrap();
        ledger
            .award_value(&user, PointCategory::Leadership, 25, "manual", None, None)
            .await
            .unwrap();

        let summary = ledger.points_summary(&user, None).await.unwrap();
        assert_eq!(summary.impact, 10);
        assert_eq!(summary.leadership, 25);
        assert_eq!(summary.total, 35);
        assert_eq!(
            summary.total,
            summary.impact + summary.consistency + summary.leadership + summary.reliability
        );
    }

    #[tokio::test]
    async fn test_campaign_scoped_summary() {
        let ledger = ledger();
        let user = UserId::new("u1");
        let campaign = CampaignId::new("c1");

        ledger
            .award(&user, PointAction::LinkClick, Some(&campaign), None)
            .await
            .unwrap();
        ledger
            .award(&user, PointAction::ContentShare, None, None)
            .await
            .unwrap();

        let scoped = ledger.points_summary(&user, Some(&campaign)).await.unwrap();
        assert_eq!(scoped.total, 1);
        let overall = ledger.points_summary(&user, None).await.unwrap();
        assert_eq!(overall.total, 4);
    }

    #[tokio::test]
    async fn test_award_invalidates_cached_summary() {
        let ledger = ledger();
        let user = UserId::new("u1");

        ledger
            .award(&user, PointAction::LinkClick, None, None)
            .await
            .unwrap();
        assert_eq!(ledger.points_summary(&user, None).await.unwrap().total, 1);

        // Second award must not be hidden by the cached value
        ledger
            .award(&user, PointAction::LinkClick, None, None)
            .await
            .unwrap();
        assert_eq!(ledger.points_summary(&user, None).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_no_dedup_on_reference_id() {
        // Double-award protection is the caller's job at this layer
        let ledger = ledger();
        let user = UserId::new("u1");
        for _ in 0..2 {
            ledger
                .award(&user, PointAction::DonationSubmitted, None, Some("don-1"))
                .await
                .unwrap();
        }
        assert_eq!(ledger.points_summary(&user, None).await.unwrap().total, 40);
    }
}
