use crate::id::{CampaignId, GroupId, TeamId, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RallyError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    #[error("Campaign not active: {0}")]
    CampaignNotActive(CampaignId),

    #[error("Link not found: {0}")]
    LinkNotFound(String),

    #[error("Link inactive: {0}")]
    LinkInactive(String),

    #[error("Link expired: {0}")]
    LinkExpired(String),

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("No trust record for user: {0}")]
    TrustScoreNotFound(UserId),

    #[error("Slug space exhausted after {0} attempts")]
    SlugExhausted(u32),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RallyError>;
