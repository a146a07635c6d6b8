use crate::id::{CampaignId, EntryId, LinkId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an activity event records. Clicks come from the click pipeline,
/// views/shares/conversions from explicit event logging, donations from the
/// donation handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Click,
    View,
    Share,
    Conversion,
    Donation,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Click => "click",
            ActivityKind::View => "view",
            ActivityKind::Share => "share",
            ActivityKind::Conversion => "conversion",
            ActivityKind::Donation => "donation",
        }
    }
}

/// Append-only event row. The trust engine replays these over a trailing
/// window; the actor is absent for anonymous traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: EntryId,
    pub actor: Option<UserId>,
    pub link_id: Option<LinkId>,
    pub campaign_id: Option<CampaignId>,
    pub kind: ActivityKind,
    /// Coarse visitor fingerprint (ip + user agent hash), when known.
    pub fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(kind: ActivityKind) -> Self {
        Self {
            id: EntryId::generate(),
            actor: None,
            link_id: None,
            campaign_id: None,
            kind,
            fingerprint: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_link(mut self, link_id: LinkId, campaign_id: CampaignId) -> Self {
        self.link_id = Some(link_id);
        self.campaign_id = Some(campaign_id);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}
