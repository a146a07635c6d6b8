//! Umbrella engine wiring the ledger, ranking, trust and link subsystems
//! behind one struct, plus the donation, streak and goal entry points that
//! feed the ledger from outside the click pipeline.

pub mod config;

pub use config::{CacheConfig, LinkSettings, RallyConfig, RankingSettings, StorageConfig};

use anyhow::bail;
use rally_cache::{CacheStore, MemoryCache};
use rally_ledger::{LedgerConfig, PointsLedger};
use rally_links::{
    CampaignGate, CampaignStatus, LinkConfig, LinkEngine, ReferralEngine, StaticCampaignGate,
};
use rally_ranking::{RankingConfig, RankingEngine};
use rally_store::{MemoryStore, RallyStore};
use rally_trust::TrustEngine;
use rally_types::{
    ActivityEvent, ActivityKind, CampaignId, PointAction, PointsLedgerEntry, RallyError, Result,
    UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Consecutive-day counts that earn a milestone bonus on top of the daily
/// streak award.
pub const STREAK_MILESTONES: [u32; 3] = [7, 30, 100];

pub struct RallyEngine {
    pub ledger: Arc<PointsLedger>,
    pub ranking: Arc<RankingEngine>,
    pub trust: Arc<TrustEngine>,
    pub links: Arc<LinkEngine>,
    pub referrals: Arc<ReferralEngine>,
    store: Arc<dyn RallyStore>,
    gate: Arc<dyn CampaignGate>,
}

impl RallyEngine {
    /// Build with the configured store backend, an in-process cache and an
    /// empty static campaign gate. Deployments wiring a real campaign
    /// service use [`RallyEngine::with_components`].
    pub fn new(config: RallyConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn RallyStore> = match config.storage.backend.as_str() {
            "memory" => Arc::new(MemoryStore::new()),
            #[cfg(feature = "rocksdb")]
            "rocksdb" => {
                let path = config.storage.data_dir.join("rally.db");
                Arc::new(rally_store::RocksDbStore::open(
                    path.to_str().unwrap_or("./data/rally.db"),
                )?)
            }
            other => bail!("unknown storage backend: {}", other),
        };
        let cache = Arc::new(MemoryCache::new());
        let gate = Arc::new(StaticCampaignGate::new());
        Ok(Self::with_components(store, cache, gate, config))
    }

    pub fn with_components(
        store: Arc<dyn RallyStore>,
        cache: Arc<dyn CacheStore>,
        gate: Arc<dyn CampaignGate>,
        config: RallyConfig,
    ) -> Self {
        let ledger = Arc::new(PointsLedger::new(
            store.clone(),
            cache.clone(),
            LedgerConfig {
                summary_ttl: Duration::from_secs(config.cache.summary_ttl_secs),
            },
        ));
        let trust = Arc::new(TrustEngine::new(store.clone(), config.trust.clone()));
        let ranking = Arc::new(RankingEngine::new(
            store.clone(),
            cache.clone(),
            RankingConfig {
                tie_break: config.ranking.tie_break,
                rankings_ttl: Duration::from_secs(config.cache.rankings_ttl_secs),
                ..Default::default()
            },
        ));
        let links = Arc::new(LinkEngine::new(
            store.clone(),
            cache.clone(),
            ledger.clone(),
            trust.clone(),
            gate.clone(),
            LinkConfig {
                slug_min_len: config.links.slug_min_len,
                slug_max_len: config.links.slug_max_len,
                max_slug_attempts: config.links.max_slug_attempts,
                dedup_ttl: Duration::from_secs(config.cache.dedup_ttl_secs),
            },
        ));
        let referrals = Arc::new(ReferralEngine::new(store.clone(), cache, ledger.clone()));

        Self {
            ledger,
            ranking,
            trust,
            links,
            referrals,
            store,
            gate,
        }
    }

    /// Score a submitted donation: one ledger row plus one activity event in
    /// a single transaction, then trust evaluation. Payment processing is
    /// not this layer's problem; the amount only gates out zero and negative
    /// submissions.
    pub async fn submit_donation(
        &self,
        user: &UserId,
        campaign: &CampaignId,
        amount_cents: i64,
    ) -> Result<PointsLedgerEntry> {
        if amount_cents <= 0 {
            return Err(RallyError::InvalidParameter(
                "donation amount must be positive".to_string(),
            ));
        }
        let campaign_ref = self
            .gate
            .campaign(campaign)
            .await
            .ok_or_else(|| RallyError::CampaignNotFound(campaign.clone()))?;
        if campaign_ref.status != CampaignStatus::Active {
            return Err(RallyError::CampaignNotActive(campaign.clone()));
        }

        self.store.begin_transaction().await?;
        let outcome = async {
            let entry = self
                .ledger
                .award(user, PointAction::DonationSubmitted, Some(campaign), None)
                .await?;
            let event = ActivityEvent::new(ActivityKind::Donation).with_actor(user.clone());
            self.store.append_event(event.clone()).await?;
            Ok::<_, RallyError>((entry, event))
        }
        .await;

        let (entry, event) = match outcome {
            Ok(value) => {
                self.store
                    .commit_transaction()
                    .await
                    .map_err(RallyError::Storage)?;
                value
            }
            Err(e) => {
                self.store
                    .rollback_transaction()
                    .await
                    .map_err(RallyError::Storage)?;
                return Err(e);
            }
        };

        self.trust.evaluate_event(&event).await?;

        info!(
            user = %user,
            campaign = %campaign,
            amount_cents,
            "💝 Donation scored"
        );
        Ok(entry)
    }

    /// Entry point for the external streak job. Awards the daily streak and,
    /// on milestone days, the bonus. The job passes the consecutive-day
    /// count it tracks; this layer does not dedup repeated calls for the
    /// same day.
    pub async fn record_daily_streak(
        &self,
        user: &UserId,
        consecutive_days: u32,
    ) -> Result<Vec<PointsLedgerEntry>> {
        if consecutive_days == 0 {
            return Err(RallyError::InvalidParameter(
                "streak length must be at least one day".to_string(),
            ));
        }

        let reference = format!("streak-{}", consecutive_days);
        let mut entries = vec![
            self.ledger
                .award(user, PointAction::DailyStreak, None, Some(&reference))
                .await?,
        ];

        if STREAK_MILESTONES.contains(&consecutive_days) {
            entries.push(
                self.ledger
                    .award(user, PointAction::StreakMilestone, None, Some(&reference))
                    .await?,
            );
            info!(user = %user, consecutive_days, "🎯 Streak milestone reached");
        }

        Ok(entries)
    }

    /// Score a completed campaign goal.
    pub async fn record_goal_completion(
        &self,
        user: &UserId,
        campaign: &CampaignId,
        goal_ref: &str,
    ) -> Result<PointsLedgerEntry> {
        self.ledger
            .award(user, PointAction::GoalCompleted, Some(campaign), Some(goal_ref))
            .await
    }

    /// Score joining a campaign.
    pub async fn record_campaign_join(
        &self,
        user: &UserId,
        campaign: &CampaignId,
    ) -> Result<PointsLedgerEntry> {
        self.ledger
            .award(user, PointAction::CampaignJoined, Some(campaign), None)
            .await
    }

    pub fn store(&self) -> Arc<dyn RallyStore> {
        self.store.clone()
    }
}
