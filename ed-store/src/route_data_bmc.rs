use anyhow::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ed_domain::{ConstructionSite, ConstructionSiteId, Market, MarketId, RouteDataOps};
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{event, Level};

#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub market: Market,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct InMemoryRouteData {
    sites: HashMap<ConstructionSiteId, ConstructionSite>,
    markets: HashMap<MarketId, MarketSnapshot>,
    candidate_markets: HashMap<ConstructionSiteId, Vec<MarketId>>,
}

impl InMemoryRouteData {
    fn new() -> Self {
        Self {
            sites: Default::default(),
            markets: Default::default(),
            candidate_markets: Default::default(),
        }
    }
}

#[derive(Debug)]
pub struct InMemoryRouteDataBmc {
    in_memory_route_data: Arc<RwLock<InMemoryRouteData>>,
}

impl Default for InMemoryRouteDataBmc {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRouteDataBmc {
    pub fn new() -> Self {
        Self {
            in_memory_route_data: Arc::new(RwLock::new(InMemoryRouteData::new())),
        }
    }

    pub async fn upsert_construction_site(&self, site_id: ConstructionSiteId, site: ConstructionSite) {
        self.in_memory_route_data.write().await.sites.insert(site_id, site);
    }

    /// Stores a market snapshot. Snapshots arrive out of order when several
    /// journal files are imported at once, so an older record never replaces
    /// a newer one.
    pub async fn upsert_market(&self, market: Market, recorded_at: DateTime<Utc>) {
        let market_id = market.market_id;
        let mut guard = self.in_memory_route_data.write().await;

        guard
            .markets
            .entry(market_id)
            .and_modify(|existing| {
                if existing.recorded_at <= recorded_at {
                    existing.market = market.clone();
                    existing.recorded_at = recorded_at;
                } else {
                    event!(Level::DEBUG, "Ignoring stale market snapshot for market {}", market_id.0);
                }
            })
            .or_insert(MarketSnapshot { market, recorded_at });
    }

    pub async fn set_candidate_markets(&self, site_id: ConstructionSiteId, market_ids: Vec<MarketId>) {
        self.in_memory_route_data.write().await.candidate_markets.insert(site_id, market_ids);
    }
}

#[async_trait]
impl RouteDataOps for InMemoryRouteDataBmc {
    async fn load_construction_site(&self, site_id: &ConstructionSiteId) -> Result<Option<ConstructionSite>> {
        Ok(self.in_memory_route_data.read().await.sites.get(site_id).cloned())
    }

    async fn load_candidate_markets(&self, site_id: &ConstructionSiteId) -> Result<Vec<Market>> {
        let guard = self.in_memory_route_data.read().await;
        let market_ids = guard.candidate_markets.get(site_id).cloned().unwrap_or_default();

        let markets = market_ids
            .iter()
            .filter_map(|market_id| match guard.markets.get(market_id) {
                Some(snapshot) => Some(snapshot.market.clone()),
                None => {
                    event!(
                        Level::WARN,
                        "Candidate market {} of construction site {} has no stored snapshot",
                        market_id.0,
                        site_id.0
                    );
                    None
                }
            })
            .collect_vec();

        Ok(markets)
    }

    async fn load_market(&self, market_id: &MarketId) -> Result<Option<Market>> {
        Ok(self
            .in_memory_route_data
            .read()
            .await
            .markets
            .get(market_id)
            .map(|snapshot| snapshot.market.clone()))
    }
}
