use chrono::{DateTime, Utc};
use rally_cache::{keys, lookup_json, store_json, CacheStore};
use rally_ledger::PointsLedger;
use rally_store::RallyStore;
use rally_types::{
    ActivityEvent, ActivityKind, EntryId, PointAction, RallyError, Referral, Result, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferralStats {
    pub referral_count: u64,
    pub leadership_points: i64,
    pub last_referral_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopReferrer {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub referral_count: u64,
}

/// Attributes registrations to the link that produced them and keeps the
/// inviter-facing views.
pub struct ReferralEngine {
    store: Arc<dyn RallyStore>,
    cache: Arc<dyn CacheStore>,
    ledger: Arc<PointsLedger>,
    stats_ttl: Duration,
}

impl ReferralEngine {
    pub fn new(
        store: Arc<dyn RallyStore>,
        cache: Arc<dyn CacheStore>,
        ledger: Arc<PointsLedger>,
    ) -> Self {
        Self {
            store,
            cache,
            ledger,
            stats_ttl: Duration::from_secs(60),
        }
    }

    /// Link a freshly registered user to the inviter whose slug brought them
    /// in. Best-effort: an unknown slug or a self-referral is a silent
    /// no-op, not an error; registration never fails on attribution.
    /// Idempotent on (invitee, slug).
    pub async fn attribute_referral(
        &self,
        slug_value: &str,
        registered_user: &UserId,
    ) -> Result<Option<Referral>> {
        let Some(link) = self.store.link_by_slug(slug_value).await? else {
            debug!(slug = slug_value, "Referral slug resolves to no link");
            return Ok(None);
        };
        if &link.user_id == registered_user {
            debug!(slug = slug_value, user = %registered_user, "Self-referral ignored");
            return Ok(None);
        }
        if let Some(existing) = self
            .store
            .referral_by_invitee(registered_user, slug_value)
            .await?
        {
            return Ok(Some(existing));
        }

        let referral = Referral {
            id: EntryId::generate(),
            inviter_id: link.user_id.clone(),
            invitee_id: registered_user.clone(),
            campaign_id: link.campaign_id.clone(),
            slug: link.slug.clone(),
            created_at: Utc::now(),
        };

        self.store.begin_transaction().await?;
        let outcome = async {
            self.store.insert_referral(referral.clone()).await?;
            self.store
                .increment_link_counters(&link.id, 0, 0, 1)
                .await?;
            self.ledger
                .award(
                    &link.user_id,
                    PointAction::ReferralJoined,
                    Some(&link.campaign_id),
                    Some(referral.id.as_str()),
                )
                .await?;
            let event = ActivityEvent::new(ActivityKind::Conversion)
                .with_actor(registered_user.clone())
                .with_link(link.id.clone(), link.campaign_id.clone());
            self.store.append_event(event).await?;
            Ok::<_, RallyError>(())
        }
        .await;

        match outcome {
            Ok(()) => self
                .store
                .commit_transaction()
                .await
                .map_err(RallyError::Storage)?,
            Err(e) => {
                self.store
                    .rollback_transaction()
                    .await
                    .map_err(RallyError::Storage)?;
                return Err(e);
            }
        }

        self.cache
            .invalidate(&keys::referral_stats_key(&link.user_id))
            .await;

        info!(
            inviter = %referral.inviter_id,
            invitee = %referral.invitee_id,
            slug = %referral.slug,
            "🤝 Referral attributed"
        );
        Ok(Some(referral))
    }

    pub async fn referral_stats(&self, user: &UserId) -> Result<ReferralStats> {
        let key = keys::referral_stats_key(user);
        if let Some(cached) = lookup_json::<ReferralStats>(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let referrals = self.store.referrals_by_inviter(user).await?;
        let (_, per_referral) = PointAction::ReferralJoined.reward();
        let stats = ReferralStats {
            referral_count: referrals.len() as u64,
            leadership_points: per_referral * referrals.len() as i64,
            last_referral_at: referrals.iter().map(|r| r.created_at).max(),
        };

        store_json(self.cache.as_ref(), &key, &stats, self.stats_ttl).await;
        Ok(stats)
    }

    /// Inviters ordered by referral count; ties break toward the smaller id
    /// so the listing is stable.
    pub async fn top_referrers(&self, limit: usize) -> Result<Vec<TopReferrer>> {
        let referrals = self.store.all_referrals().await?;
        let mut counts: HashMap<UserId, u64> = HashMap::new();
        for referral in &referrals {
            *counts.entry(referral.inviter_id.clone()).or_insert(0) += 1;
        }

        let mut ranked: Vec<(UserId, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(limit);

        let users: Vec<UserId> = ranked.iter().map(|(u, _)| u.clone()).collect();
        let profiles = self.store.profiles(&users).await?;

        Ok(ranked
            .into_iter()
            .map(|(user_id, referral_count)| TopReferrer {
                display_name: profiles.get(&user_id).map(|p| p.display_name.clone()),
                user_id,
                referral_count,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CampaignStatus, LinkConfig, LinkEngine, StaticCampaignGate};
    use rally_cache::MemoryCache;
    use rally_ledger::LedgerConfig;
    use rally_store::MemoryStore;
    use rally_trust::{TrustConfig, TrustEngine};
    use rally_types::{CampaignId, MemberProfile};

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: Arc<PointsLedger>,
        links: LinkEngine,
        referrals: ReferralEngine,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let gate = Arc::new(StaticCampaignGate::new());
        gate.add(
            &CampaignId::new("c1"),
            CampaignStatus::Active,
            "https://example.org/c1",
        )
        .await;
        let ledger = Arc::new(PointsLedger::new(
            store.clone(),
            cache.clone(),
            LedgerConfig::default(),
        ));
        let trust = Arc::new(TrustEngine::new(store.clone(), TrustConfig::default()));
        let links = LinkEngine::new(
            store.clone(),
            cache.clone(),
            ledger.clone(),
            trust,
            gate,
            LinkConfig::default(),
        );
        let referrals = ReferralEngine::new(store.clone(), cache, ledger.clone());
        Fixture {
            store,
            ledger,
            links,
            referrals,
        }
    }

    #[tokio::test]
    async fn test_attribution_is_idempotent() {
        let fx = fixture().await;
        let inviter = UserId::new("u1");
        let campaign = CampaignId::new("c1");
        let link = fx.links.generate_link(&inviter, &campaign, None).await.unwrap();

        let invitee = UserId::new("u2");
        let first = fx
            .referrals
            .attribute_referral(&link.slug, &invitee)
            .await
            .unwrap()
            .unwrap();
        let second = fx
            .referrals
            .attribute_referral(&link.slug, &invitee)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id, second.id);

        // Exactly one row, one conversion, one award
        assert_eq!(fx.store.all_referrals().await.unwrap().len(), 1);
        let updated = fx.store.link_by_slug(&link.slug).await.unwrap().unwrap();
        assert_eq!(updated.conversion_count, 1);
        let summary = fx.ledger.points_summary(&inviter, None).await.unwrap();
        assert_eq!(summary.leadership, 25);
    }

    #[tokio::test]
    async fn test_unknown_slug_is_silent() {
        let fx = fixture().await;
        let result = fx
            .referrals
            .attribute_referral("nosuch", &UserId::new("u2"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_self_referral_is_silent() {
        let fx = fixture().await;
        let inviter = UserId::new("u1");
        let link = fx
            .links
            .generate_link(&inviter, &CampaignId::new("c1"), None)
            .await
            .unwrap();

        let result = fx
            .referrals
            .attribute_referral(&link.slug, &inviter)
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(fx.store.all_referrals().await.unwrap().is_empty());
        let updated = fx.store.link_by_slug(&link.slug).await.unwrap().unwrap();
        assert_eq!(updated.conversion_count, 0);
    }

    #[tokio::test]
    async fn test_referral_stats() {
        let fx = fixture().await;
        let inviter = UserId::new("u1");
        let link = fx
            .links
            .generate_link(&inviter, &CampaignId::new("c1"), None)
            .await
            .unwrap();

        for invitee in ["u2", "u3", "u4"] {
            fx.referrals
                .attribute_referral(&link.slug, &UserId::new(invitee))
                .await
                .unwrap();
        }

        let stats = fx.referrals.referral_stats(&inviter).await.unwrap();
        assert_eq!(stats.referral_count, 3);
        assert_eq!(stats.leadership_points, 75);
        assert!(stats.last_referral_at.is_some());
    }

    #[tokio::test]
    async fn test_top_referrers_order_and_limit() {
        let fx = fixture().await;
        let campaign = CampaignId::new("c1");

        let link1 = fx
            .links
            .generate_link(&UserId::new("u1"), &campaign, None)
            .await
            .unwrap();
        let link2 = fx
            .links
            .generate_link(&UserId::new("u2"), &campaign, None)
            .await
            .unwrap();

        for invitee in ["a", "b", "c"] {
            fx.referrals
                .attribute_referral(&link1.slug, &UserId::new(invitee))
                .await
                .unwrap();
        }
        fx.referrals
            .attribute_referral(&link2.slug, &UserId::new("d"))
            .await
            .unwrap();

        fx.store
            .upsert_profile(MemberProfile::new(UserId::new("u1"), "Pat"))
            .await
            .unwrap();

        let top = fx.referrals.top_referrers(10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, UserId::new("u1"));
        assert_eq!(top[0].referral_count, 3);
        assert_eq!(top[0].display_name.as_deref(), Some("Pat"));
        assert_eq!(top[1].user_id, UserId::new("u2"));

        let limited = fx.referrals.top_referrers(1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
