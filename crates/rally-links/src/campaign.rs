use async_trait::async_trait;
use rally_types::CampaignId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lifecycle state of a campaign as reported by the owning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    Draft,
    Active,
    Ended,
}

/// What link generation needs to know about a campaign.
#[derive(Debug, Clone)]
pub struct CampaignRef {
    pub id: CampaignId,
    pub status: CampaignStatus,
    pub landing_url: String,
}

/// Port to the campaign service. Campaign CRUD lives outside the core; the
/// link pipeline only ever asks "does it exist and is it active".
#[async_trait]
pub trait CampaignGate: Send + Sync {
    async fn campaign(&self, id: &CampaignId) -> Option<CampaignRef>;
}

/// Fixed in-memory gate for tests and development.
pub struct StaticCampaignGate {
    campaigns: Arc<RwLock<HashMap<CampaignId, CampaignRef>>>,
}

impl StaticCampaignGate {
    pub fn new() -> Self {
        Self {
            campaigns: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add(&self, id: &CampaignId, status: CampaignStatus, landing_url: &str) {
        let mut campaigns = self.campaigns.write().await;
        campaigns.insert(
            id.clone(),
            CampaignRef {
                id: id.clone(),
                status,
                landing_url: landing_url.to_string(),
            },
        );
    }

    pub async fn set_status(&self, id: &CampaignId, status: CampaignStatus) {
        let mut campaigns = self.campaigns.write().await;
        if let Some(campaign) = campaigns.get_mut(id) {
            campaign.status = status;
        }
    }
}

impl Default for StaticCampaignGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CampaignGate for StaticCampaignGate {
    async fn campaign(&self, id: &CampaignId) -> Option<CampaignRef> {
        let campaigns = self.campaigns.read().await;
        campaigns.get(id).cloned()
    }
}
