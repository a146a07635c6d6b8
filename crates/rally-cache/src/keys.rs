//! Cache key builders.
//!
//! Every cached view gets a stable, documented key shape so writers can
//! invalidate by exact key or by prefix. Key prefixes:
//!
//! - `summary:{user}` / `summary:{user}:{campaign}`: points summaries
//! - `rankings:all` / `rankings:{campaign}`: computed leaderboards
//! - `seen:{link}:{fingerprint}`: click dedup markers (24h TTL)
//! - `referrals:{user}`: referral stats views

use rally_types::{CampaignId, LinkId, UserId};

pub fn summary_key(user: &UserId, campaign: Option<&CampaignId>) -> String {
    match campaign {
        Some(campaign) => format!("summary:{}:{}", user, campaign),
        None => format!("summary:{}", user),
    }
}

/// Prefix matching both the overall and every per-campaign summary of a user.
pub fn summary_prefix(user: &UserId) -> String {
    format!("summary:{}", user)
}

pub fn rankings_key(campaign: Option<&CampaignId>) -> String {
    match campaign {
        Some(campaign) => format!("rankings:{}", campaign),
        None => "rankings:all".to_string(),
    }
}

pub fn rankings_prefix() -> &'static str {
    "rankings:"
}

pub fn seen_key(link: &LinkId, fingerprint: &str) -> String {
    format!("seen:{}:{}", link, fingerprint)
}

pub fn referral_stats_key(user: &UserId) -> String {
    format!("referrals:{}", user)
}
