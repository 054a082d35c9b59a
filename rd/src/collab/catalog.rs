//! Campaign catalog backed by configured campaigns and durable counts

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::clock::Clock;
use crate::domain::{Campaign, DailyCapacity};

use super::{CampaignCatalog, CollabResult, ProgressStore};

/// Capacity is derived from reserved progress rows, so it reflects
/// registrations, cancellations and timeouts without separate bookkeeping.
pub struct StoreBackedCatalog {
    campaigns: Vec<Campaign>,
    progress: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
}

impl StoreBackedCatalog {
    pub fn new(campaigns: Vec<Campaign>, progress: Arc<dyn ProgressStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            campaigns,
            progress,
            clock,
        }
    }

    fn find(&self, id: &str) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| c.id == id)
    }
}

#[async_trait]
impl CampaignCatalog for StoreBackedCatalog {
    async fn active_campaigns(&self) -> CollabResult<Vec<Campaign>> {
        let mut open = Vec::new();
        for campaign in self.campaigns.iter().filter(|c| c.active) {
            if self.remaining_capacity(&campaign.id).await? > 0 {
                open.push(campaign.clone());
            }
        }
        debug!(count = open.len(), "active_campaigns: resolved");
        Ok(open)
    }

    async fn campaign_by_id(&self, id: &str) -> CollabResult<Option<Campaign>> {
        Ok(self.find(id).cloned())
    }

    async fn remaining_capacity(&self, id: &str) -> CollabResult<i64> {
        let Some(campaign) = self.find(id) else {
            return Ok(0);
        };
        let reserved = self.progress.count_reserved(id, None).await?;
        Ok((campaign.total_quantity - reserved).max(0))
    }

    async fn remaining_daily_capacity(&self, id: &str) -> CollabResult<DailyCapacity> {
        let Some(cap) = self.find(id).and_then(|c| c.daily_cap) else {
            return Ok(DailyCapacity::Unlimited);
        };
        let since = self.clock.local_midnight_ms();
        let today = self.progress.count_reserved(id, Some(since)).await?;
        Ok(DailyCapacity::Remaining((cap - today).max(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::state::StateManager;
    use progressstore::ProgressStatus;
    use tempfile::tempdir;

    fn campaign(id: &str, total: i64, daily: Option<i64>) -> Campaign {
        Campaign {
            id: id.to_string(),
            product_name: format!("상품 {id}"),
            total_quantity: total,
            daily_cap: daily,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_capacity_tracks_reserved_rows() {
        let temp = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_760_000_000_000));
        let state = StateManager::spawn(temp.path(), clock.clone()).unwrap();
        let catalog = StoreBackedCatalog::new(
            vec![campaign("c1", 3, Some(2)), campaign("c2", 1, None)],
            Arc::new(state.clone()),
            clock.clone(),
        );

        let reviewer = state.upsert_reviewer("a", "010-0000-0000").await.unwrap();
        let ids = state
            .create_records("c1", reviewer, &["x".to_string(), "y".to_string()])
            .await
            .unwrap();

        assert_eq!(catalog.remaining_capacity("c1").await.unwrap(), 1);
        assert_eq!(
            catalog.remaining_daily_capacity("c1").await.unwrap(),
            DailyCapacity::Remaining(0)
        );
        assert_eq!(
            catalog.remaining_daily_capacity("c2").await.unwrap(),
            DailyCapacity::Unlimited
        );

        state.set_status(&ids[..1], ProgressStatus::Cancelled).await.unwrap();
        assert_eq!(catalog.remaining_capacity("c1").await.unwrap(), 2);
        assert_eq!(catalog.remaining_capacity("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_full_campaigns_are_not_listed() {
        let temp = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let state = StateManager::spawn(temp.path(), clock.clone()).unwrap();
        let mut closed = campaign("c3", 5, None);
        closed.active = false;
        let catalog = StoreBackedCatalog::new(
            vec![campaign("c1", 1, None), campaign("c2", 2, None), closed],
            Arc::new(state.clone()),
            clock,
        );

        let reviewer = state.upsert_reviewer("a", "b").await.unwrap();
        state.create_records("c1", reviewer, &["x".to_string()]).await.unwrap();

        let open = catalog.active_campaigns().await.unwrap();
        assert_eq!(open.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["c2"]);
        assert_eq!(catalog.active_campaign_by_index(1).await.unwrap().unwrap().id, "c2");
        assert!(catalog.active_campaign_by_index(2).await.unwrap().is_none());
        assert!(catalog.campaign_by_id("c3").await.unwrap().is_some());
    }
}
