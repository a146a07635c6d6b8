//! Trust scoring and fraud-rule evaluation.
//!
//! Every scored activity event is replayed against the actor's own recent
//! history through a fixed rule list. Matching rules union their flags into
//! the actor's trust record and their penalties sum; the score floors at
//! zero and only an explicit Clear review restores it.

pub mod rules;

pub use rules::{RuleHit, TrustConfig};

use chrono::{Duration as ChronoDuration, Utc};
use rally_store::RallyStore;
use rally_types::{
    ActivityEvent, AuthUser, RallyError, Result, ReviewResolution, TrustRecord, UserId,
    DEFAULT_TRUST_SCORE,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct TrustEngine {
    store: Arc<dyn RallyStore>,
    config: TrustConfig,
}

impl TrustEngine {
    pub fn new(store: Arc<dyn RallyStore>, config: TrustConfig) -> Self {
        Self { store, config }
    }

    /// Evaluate one event against the actor's trailing history. Events with
    /// no actor are skipped: anonymous traffic cannot be scored. Returns the
    /// updated record when at least one rule fired.
    pub async fn evaluate_event(&self, event: &ActivityEvent) -> Result<Option<TrustRecord>> {
        let Some(actor) = event.actor.clone() else {
            return Ok(None);
        };

        let since = event.created_at - ChronoDuration::seconds(self.config.window_secs);
        // The event may already be persisted; drop it from history so every
        // rule counts it exactly once.
        let history: Vec<ActivityEvent> = self
            .store
            .events_for_actor_since(&actor, since)
            .await?
            .into_iter()
            .filter(|e| e.id != event.id)
            .collect();

        let mut hits = rules::evaluate(&self.config, event, &history);
        if let Some(hit) = self.check_fingerprint_reuse(event).await? {
            hits.push(hit);
        }

        if hits.is_empty() {
            debug!(actor = %actor, kind = event.kind.as_str(), "Event passed fraud rules");
            return Ok(None);
        }

        let mut record = match self.store.trust_record(&actor).await? {
            Some(record) => record,
            None => TrustRecord::new(actor.clone()),
        };

        let total_penalty: u32 = hits.iter().map(|h| h.penalty).sum();
        let score_before = record.score;
        for hit in &hits {
            record.flags.insert(hit.flag);
        }
        record.penalize(total_penalty);

        warn!(
            actor = %actor,
            score_before,
            score_after = record.score,
            penalty = total_penalty,
            flags = ?record.flags,
            "🚩 Fraud rules triggered"
        );

        self.store.put_trust_record(record.clone()).await?;
        Ok(Some(record))
    }

    // Needs a cross-actor query, so it lives outside the pure rule list: the
    // same device fingerprint showing up under several identities.
    async fn check_fingerprint_reuse(&self, event: &ActivityEvent) -> Result<Option<RuleHit>> {
        let Some(fingerprint) = event.fingerprint.as_deref() else {
            return Ok(None);
        };
        let since = event.created_at - ChronoDuration::seconds(self.config.window_secs);
        let siblings = self
            .store
            .events_for_fingerprint_since(fingerprint, since)
            .await?;

        let mut actors: Vec<&UserId> = siblings.iter().filter_map(|e| e.actor.as_ref()).collect();
        if let Some(actor) = event.actor.as_ref() {
            actors.push(actor);
        }
        actors.sort();
        actors.dedup();

        if actors.len() >= self.config.fingerprint_min_actors {
            Ok(Some(RuleHit {
                flag: rally_types::TrustFlag::FingerprintReuse,
                penalty: self.config.fingerprint_penalty,
            }))
        } else {
            Ok(None)
        }
    }

    /// Current trust record, defaulting to a pristine score of 100. The
    /// default is not persisted: a row exists only once a rule has fired, so
    /// review can distinguish "never flagged" from "flagged and cleared".
    pub async fn user_trust(&self, user: &UserId) -> Result<TrustRecord> {
        match self.store.trust_record(user).await? {
            Some(record) => Ok(record),
            None => Ok(TrustRecord::new(user.clone())),
        }
    }

    /// Every user carrying at least one flag, worst score first.
    pub async fn flagged_users(&self) -> Result<Vec<TrustRecord>> {
        let mut records = self.store.flagged_trust_records().await?;
        records.sort_by(|a, b| a.score.cmp(&b.score).then(a.user_id.cmp(&b.user_id)));
        Ok(records)
    }

    /// Resolve a flagged user. Only organizers and admins may review.
    pub async fn review_flag(
        &self,
        user: &UserId,
        resolution: ReviewResolution,
        reviewer: &AuthUser,
    ) -> Result<TrustRecord> {
        if !reviewer.role.can_review() {
            return Err(RallyError::PermissionDenied(format!(
                "{} may not review trust flags",
                reviewer.id
            )));
        }

        let mut record = self
            .store
            .trust_record(user)
            .await?
            .ok_or_else(|| RallyError::TrustScoreNotFound(user.clone()))?;

        let now = Utc::now();
        match resolution {
            ReviewResolution::Clear => {
                record.flags.clear();
                record.score = DEFAULT_TRUST_SCORE;
                record.last_reviewed_at = Some(now);
                record.updated_at = now;
            }
            ReviewResolution::Penalize => {
                record.penalize(self.config.review_penalty);
                record.last_reviewed_at = Some(now);
            }
            ReviewResolution::Escalate => {
                record.last_reviewed_at = Some(now);
            }
        }

        info!(
            user = %user,
            reviewer = %reviewer.id,
            resolution = ?resolution,
            score = record.score,
            "⚖️ Trust review applied"
        );

        self.store.put_trust_record(record.clone()).await?;
        Ok(record)
    }
}
