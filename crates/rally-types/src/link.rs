use crate::id::{CampaignId, EntryId, GroupId, LinkId, TeamId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trackable short link. One per (owner, campaign); the slug is the public
/// handle, the id is internal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartLink {
    pub id: LinkId,
    pub slug: String,
    pub user_id: UserId,
    pub campaign_id: CampaignId,
    pub original_url: String,
    pub click_count: u64,
    pub unique_click_count: u64,
    pub conversion_count: u64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SmartLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expiry) if now > expiry)
    }
}

/// Attribution of a registered invitee to the link that brought them in.
/// Compound-unique on (invitee_id, slug).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: EntryId,
    pub inviter_id: UserId,
    pub invitee_id: UserId,
    pub campaign_id: CampaignId,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Display fields plus current team/group membership for one participant.
/// Membership is evaluated at computation time; leaving a team removes the
/// member from future roll-ups only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub team_id: Option<TeamId>,
    pub group_id: Option<GroupId>,
}

impl MemberProfile {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            avatar_url: None,
            team_id: None,
            group_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: TeamId,
    pub name: String,
    pub group_id: Option<GroupId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: GroupId,
    pub name: String,
}
