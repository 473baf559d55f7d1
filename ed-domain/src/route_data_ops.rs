use crate::{ConstructionSite, ConstructionSiteId, Market, MarketId};
use async_trait::async_trait;
use mockall::automock;

/// Read access to the construction and market data the route planner works
/// on. Implementations decide where the records come from; the planner only
/// sees snapshots.
#[automock]
#[async_trait]
pub trait RouteDataOps: Send + Sync {
    async fn load_construction_site(&self, site_id: &ConstructionSiteId) -> anyhow::Result<Option<ConstructionSite>>;
    async fn load_candidate_markets(&self, site_id: &ConstructionSiteId) -> anyhow::Result<Vec<Market>>;
    async fn load_market(&self, market_id: &MarketId) -> anyhow::Result<Option<Market>>;
}
