//! Smart links: generation, click attribution with fingerprint dedup, link
//! event logging, and referral attribution.

pub mod campaign;
pub mod referral;
pub mod slug;

pub use campaign::{CampaignGate, CampaignRef, CampaignStatus, StaticCampaignGate};
pub use referral::{ReferralEngine, ReferralStats, TopReferrer};

use chrono::Utc;
use rally_cache::{keys, CacheStore};
use rally_ledger::PointsLedger;
use rally_store::RallyStore;
use rally_trust::TrustEngine;
use rally_types::{
    ActivityEvent, ActivityKind, AuthUser, CampaignId, LinkId, PointAction, RallyError, Result,
    Role, SmartLink, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub slug_min_len: usize,
    pub slug_max_len: usize,
    /// Collision retries before giving up on slug generation.
    pub max_slug_attempts: u32,
    /// How long one fingerprint suppresses the unique-click counter.
    pub dedup_ttl: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            slug_min_len: 6,
            slug_max_len: 8,
            max_slug_attempts: 5,
            dedup_ttl: Duration::from_secs(24 * 3600),
        }
    }
}

/// Optional prometheus counters for click traffic.
#[derive(Clone)]
pub struct LinkMetrics {
    pub clicks_total: Arc<prometheus::IntCounter>,
    pub unique_clicks_total: Arc<prometheus::IntCounter>,
    pub links_created: Arc<prometheus::IntCounter>,
}

pub struct LinkEngine {
    store: Arc<dyn RallyStore>,
    cache: Arc<dyn CacheStore>,
    ledger: Arc<PointsLedger>,
    trust: Arc<TrustEngine>,
    gate: Arc<dyn CampaignGate>,
    config: LinkConfig,
    metrics: Option<LinkMetrics>,
}

impl LinkEngine {
    pub fn new(
        store: Arc<dyn RallyStore>,
        cache: Arc<dyn CacheStore>,
        ledger: Arc<PointsLedger>,
        trust: Arc<TrustEngine>,
        gate: Arc<dyn CampaignGate>,
        config: LinkConfig,
    ) -> Self {
        Self {
            store,
            cache,
            ledger,
            trust,
            gate,
            config,
            metrics: None,
        }
    }

    pub fn set_metrics(&mut self, metrics: LinkMetrics) {
        self.metrics = Some(metrics);
    }

    /// Get or create the link for (owner, campaign). Idempotent: an existing
    /// link is returned unchanged, any requested alias ignored.
    pub async fn generate_link(
        &self,
        user: &UserId,
        campaign: &CampaignId,
        custom_alias: Option<&str>,
    ) -> Result<SmartLink> {
        if let Some(existing) = self.store.link_by_owner(user, campaign).await? {
            debug!(slug = %existing.slug, owner = %user, "Returning existing link");
            return Ok(existing);
        }

        let campaign_ref = self
            .gate
            .campaign(campaign)
            .await
            .ok_or_else(|| RallyError::CampaignNotFound(campaign.clone()))?;
        if campaign_ref.status != CampaignStatus::Active {
            return Err(RallyError::CampaignNotActive(campaign.clone()));
        }

        if let Some(alias) = custom_alias {
            if !slug::is_valid_slug(alias, self.config.slug_min_len, self.config.slug_max_len) {
                return Err(RallyError::InvalidParameter(format!(
                    "alias must be {}-{} lowercase alphanumerics",
                    self.config.slug_min_len, self.config.slug_max_len
                )));
            }
        }

        for attempt in 0..self.config.max_slug_attempts {
            let candidate = match (attempt, custom_alias) {
                (0, Some(alias)) => alias.to_string(),
                _ => slug::random_slug(self.config.slug_min_len),
            };
            if self.store.link_by_slug(&candidate).await?.is_some() {
                continue;
            }

            let link = SmartLink {
                id: LinkId::generate(),
                slug: candidate,
                user_id: user.clone(),
                campaign_id: campaign.clone(),
                original_url: campaign_ref.landing_url.clone(),
                click_count: 0,
                unique_click_count: 0,
                conversion_count: 0,
                is_active: true,
                expires_at: None,
                created_at: Utc::now(),
            };
            self.store.insert_link(link.clone()).await?;

            if let Some(metrics) = &self.metrics {
                metrics.links_created.inc();
            }
            info!(
                slug = %link.slug,
                owner = %user,
                campaign = %campaign,
                "🔗 Smart link generated"
            );
            return Ok(link);
        }

        Err(RallyError::SlugExhausted(self.config.max_slug_attempts))
    }

    /// Record one click. Uniqueness is decided by a 24h fingerprint marker in
    /// the cache (or an already-set client cookie); every click, unique or
    /// not, awards one impact point to the link owner in the same
    /// transaction as the counter update. `viewer` is the authenticated
    /// clicker when the request layer knows one.
    pub async fn increment_click(
        &self,
        slug_value: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
        cookie_seen: bool,
        viewer: Option<&UserId>,
    ) -> Result<SmartLink> {
        let link = self.resolve_active(slug_value).await?;

        let fingerprint = slug::fingerprint(ip, user_agent);
        let seen_key = keys::seen_key(&link.id, &fingerprint);
        let is_unique = !cookie_seen && self.cache.lookup(&seen_key).await.is_none();

        self.store.begin_transaction().await?;
        let updated = async {
            let updated = self
                .store
                .increment_link_counters(&link.id, 1, is_unique as u64, 0)
                .await?;
            self.ledger
                .award(
                    &link.user_id,
                    PointAction::LinkClick,
                    Some(&link.campaign_id),
                    Some(link.slug.as_str()),
                )
                .await?;
            let event = ActivityEvent::new(ActivityKind::Click)
                .with_link(link.id.clone(), link.campaign_id.clone())
                .with_fingerprint(fingerprint.clone());
            let event = match viewer {
                Some(viewer) => event.with_actor(viewer.clone()),
                None => event,
            };
            self.store.append_event(event.clone()).await?;
            Ok::<_, RallyError>((updated, event))
        }
        .await;

        let (updated, event) = match updated {
            Ok(value) => {
                self.store.commit_transaction().await.map_err(RallyError::Storage)?;
                value
            }
            Err(e) => {
                self.store.rollback_transaction().await.map_err(RallyError::Storage)?;
                return Err(e);
            }
        };

        if is_unique {
            self.cache
                .store(&seen_key, "1".to_string(), self.config.dedup_ttl)
                .await;
        }

        self.trust.evaluate_event(&event).await?;

        if let Some(metrics) = &self.metrics {
            metrics.clicks_total.inc();
            if is_unique {
                metrics.unique_clicks_total.inc();
            }
        }
        info!(
            slug = %updated.slug,
            clicks = updated.click_count,
            unique = updated.unique_click_count,
            is_unique,
            "👆 Click recorded"
        );
        Ok(updated)
    }

    /// Log a view/share/conversion against a link. Shares score for the
    /// sharer; clicks go through `increment_click` and donations through the
    /// donation handler.
    pub async fn log_link_event(
        &self,
        slug_value: &str,
        kind: ActivityKind,
        actor: Option<&UserId>,
    ) -> Result<ActivityEvent> {
        if matches!(kind, ActivityKind::Click | ActivityKind::Donation) {
            return Err(RallyError::InvalidParameter(format!(
                "{} events are not logged directly",
                kind.as_str()
            )));
        }
        let link = self
            .store
            .link_by_slug(slug_value)
            .await?
            .ok_or_else(|| RallyError::LinkNotFound(slug_value.to_string()))?;

        let event = {
            let event =
                ActivityEvent::new(kind).with_link(link.id.clone(), link.campaign_id.clone());
            match actor {
                Some(actor) => event.with_actor(actor.clone()),
                None => event,
            }
        };
        self.store.append_event(event.clone()).await?;

        if kind == ActivityKind::Share {
            if let Some(actor) = actor {
                self.ledger
                    .award(
                        actor,
                        PointAction::ContentShare,
                        Some(&link.campaign_id),
                        Some(link.slug.as_str()),
                    )
                    .await?;
            }
        }

        self.trust.evaluate_event(&event).await?;
        Ok(event)
    }

    /// Owner or admin turns a link off; clicks on it fail from then on.
    pub async fn deactivate_link(&self, slug_value: &str, caller: &AuthUser) -> Result<()> {
        let link = self
            .store
            .link_by_slug(slug_value)
            .await?
            .ok_or_else(|| RallyError::LinkNotFound(slug_value.to_string()))?;

        if link.user_id != caller.id && caller.role != Role::Admin {
            return Err(RallyError::PermissionDenied(format!(
                "{} does not own link {}",
                caller.id, slug_value
            )));
        }

        self.store.set_link_active(&link.id, false).await?;
        info!(slug = %slug_value, by = %caller.id, "🔗 Smart link deactivated");
        Ok(())
    }

    async fn resolve_active(&self, slug_value: &str) -> Result<SmartLink> {
        let link = self
            .store
            .link_by_slug(slug_value)
            .await?
            .ok_or_else(|| RallyError::LinkNotFound(slug_value.to_string()))?;
        if !link.is_active {
            return Err(RallyError::LinkInactive(slug_value.to_string()));
        }
        if link.is_expired(Utc::now()) {
            return Err(RallyError::LinkExpired(slug_value.to_string()));
        }
        Ok(link)
    }
}
