//! The fraud rule catalogue.
//!
//! Rules are predicates over `(new event, actor history)`; each match names a
//! flag and an integer penalty. The list is fixed and small;
//! thresholds are configuration, the predicates are code.

use chrono::Duration as ChronoDuration;
use rally_types::{ActivityEvent, ActivityKind, TrustFlag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Trailing history window fetched per evaluation, seconds.
    pub window_secs: i64,

    /// Near-identical events (same kind, link and fingerprint) within this
    /// many seconds count as duplicates once they reach the threshold.
    pub duplicate_window_secs: i64,
    pub duplicate_threshold: usize,
    pub duplicate_penalty: u32,

    /// Clicks within the velocity window before tripping.
    pub velocity_window_secs: i64,
    pub velocity_threshold: usize,
    pub velocity_penalty: u32,

    /// Distinct identities sharing one fingerprint before tripping.
    pub fingerprint_min_actors: usize,
    pub fingerprint_penalty: u32,

    /// Events per minute a single actor may produce before tripping.
    pub rate_limit_per_minute: usize,
    pub rate_limit_penalty: u32,

    /// Fixed deduction applied by a Penalize review.
    pub review_penalty: u32,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            window_secs: 3600,
            duplicate_window_secs: 30,
            duplicate_threshold: 3,
            duplicate_penalty: 10,
            velocity_window_secs: 300,
            velocity_threshold: 20,
            velocity_penalty: 15,
            fingerprint_min_actors: 3,
            fingerprint_penalty: 20,
            rate_limit_per_minute: 30,
            rate_limit_penalty: 10,
            review_penalty: 25,
        }
    }
}

/// One matched rule: the flag it raises and the penalty it contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleHit {
    pub flag: TrustFlag,
    pub penalty: u32,
}

/// Run every history-local rule. `history` is the actor's own events inside
/// the trailing window, with the event under evaluation already removed;
/// each rule counts that event explicitly so evaluation order and storage
/// timing cannot double-count it.
pub fn evaluate(
    config: &TrustConfig,
    event: &ActivityEvent,
    history: &[ActivityEvent],
) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    if let Some(hit) = duplicate_activity(config, event, history) {
        hits.push(hit);
    }
    if let Some(hit) = click_velocity(config, event, history) {
        hits.push(hit);
    }
    if let Some(hit) = rate_limit(config, event, history) {
        hits.push(hit);
    }
    hits
}

fn duplicate_activity(
    config: &TrustConfig,
    event: &ActivityEvent,
    history: &[ActivityEvent],
) -> Option<RuleHit> {
    // Without a fingerprint there is no way to call two events "identical"
    event.fingerprint.as_deref()?;
    let cutoff = event.created_at - ChronoDuration::seconds(config.duplicate_window_secs);
    let twins = history
        .iter()
        .filter(|e| e.created_at >= cutoff)
        .filter(|e| {
            e.kind == event.kind
                && e.link_id == event.link_id
                && e.fingerprint == event.fingerprint
        })
        .count();
    if twins + 1 >= config.duplicate_threshold {
        Some(RuleHit {
            flag: TrustFlag::DuplicateActivity,
            penalty: config.duplicate_penalty,
        })
    } else {
        None
    }
}

fn click_velocity(
    config: &TrustConfig,
    event: &ActivityEvent,
    history: &[ActivityEvent],
) -> Option<RuleHit> {
    if event.kind != ActivityKind::Click {
        return None;
    }
    let cutoff = event.created_at - ChronoDuration::seconds(config.velocity_window_secs);
    let clicks = history
        .iter()
        .filter(|e| e.kind == ActivityKind::Click && e.created_at >= cutoff)
        .count();
    if clicks + 1 >= config.velocity_threshold {
        Some(RuleHit {
            flag: TrustFlag::ClickVelocity,
            penalty: config.velocity_penalty,
        })
    } else {
        None
    }
}

fn rate_limit(
    config: &TrustConfig,
    event: &ActivityEvent,
    history: &[ActivityEvent],
) -> Option<RuleHit> {
    let cutoff = event.created_at - ChronoDuration::seconds(60);
    let recent = history.iter().filter(|e| e.created_at >= cutoff).count();
    if recent + 1 > config.rate_limit_per_minute {
        Some(RuleHit {
            flag: TrustFlag::RateLimited,
            penalty: config.rate_limit_penalty,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rally_types::{CampaignId, LinkId, UserId};

    fn click_with_fp(fp: &str) -> ActivityEvent {
        ActivityEvent::new(ActivityKind::Click)
            .with_actor(UserId::new("u1"))
            .with_link(LinkId::new("l1"), CampaignId::new("c1"))
            .with_fingerprint(fp)
    }

    #[test]
    fn test_duplicate_activity_needs_fingerprint() {
        let config = TrustConfig {
            duplicate_threshold: 2,
            ..Default::default()
        };
        let bare = ActivityEvent::new(ActivityKind::Click).with_actor(UserId::new("u1"));
        let history = vec![bare.clone(), bare.clone()];
        assert!(duplicate_activity(&config, &bare, &history).is_none());

        let printed = click_with_fp("fp1");
        let history = vec![click_with_fp("fp1")];
        assert!(duplicate_activity(&config, &printed, &history).is_some());
    }

    #[test]
    fn test_duplicate_ignores_other_links() {
        let config = TrustConfig {
            duplicate_threshold: 2,
            ..Default::default()
        };
        let event = click_with_fp("fp1");
        let other_link = ActivityEvent::new(ActivityKind::Click)
            .with_actor(UserId::new("u1"))
            .with_link(LinkId::new("l2"), CampaignId::new("c1"))
            .with_fingerprint("fp1");
        assert!(duplicate_activity(&config, &event, &[other_link]).is_none());
    }

    #[test]
    fn test_click_velocity_counts_clicks_only() {
        let config = TrustConfig {
            velocity_threshold: 3,
            ..Default::default()
        };
        let event = click_with_fp("fp1");
        let share = ActivityEvent::new(ActivityKind::Share).with_actor(UserId::new("u1"));
        let history = vec![click_with_fp("fp1"), share, click_with_fp("fp2")];
        let hit = click_velocity(&config, &event, &history).unwrap();
        assert_eq!(hit.flag, TrustFlag::ClickVelocity);

        let thin = vec![click_with_fp("fp1")];
        assert!(click_velocity(&config, &event, &thin).is_none());
    }

    #[test]
    fn test_rate_limit_exceeds_cap() {
        let config = TrustConfig {
            rate_limit_per_minute: 2,
            ..Default::default()
        };
        let event = click_with_fp("fp1");
        // Two prior events: 3 in the minute > cap of 2
        let history = vec![click_with_fp("a"), click_with_fp("b")];
        assert!(rate_limit(&config, &event, &history).is_some());
        // Exactly at the cap does not trip
        let history = vec![click_with_fp("a")];
        assert!(rate_limit(&config, &event, &history).is_none());
    }

    #[test]
    fn test_all_matching_rules_stack() {
        let config = TrustConfig {
            duplicate_threshold: 2,
            velocity_threshold: 2,
            rate_limit_per_minute: 1,
            ..Default::default()
        };
        let event = click_with_fp("fp1");
        let history = vec![click_with_fp("fp1")];
        let hits = evaluate(&config, &event, &history);
        let flags: Vec<TrustFlag> = hits.iter().map(|h| h.flag).collect();
        assert!(flags.contains(&TrustFlag::DuplicateActivity));
        assert!(flags.contains(&TrustFlag::ClickVelocity));
        assert!(flags.contains(&TrustFlag::RateLimited));
    }
}
