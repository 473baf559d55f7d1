use anyhow::{Context, Result};
use ed_domain::{
    apply_seller_counts, build_market_inventories, build_material_demands, build_single_run, has_remaining_demand, has_useful_stock,
    initial_total_demand, most_common_system, remaining_total_demand, ConstructionSite, Market, RouteDataOps, RouteOptimizationRequest, RoutePlan,
    SystemName, EPSILON,
};
use std::sync::Arc;
use tracing::{event, Level};

/// Plans greedy delivery runs for a colonization construction site from the
/// latest stored market snapshots. Planning works on copies of the stored
/// records, so a plan never changes what is in the store.
pub struct RoutePlanner {
    data: Arc<dyn RouteDataOps>,
}

impl RoutePlanner {
    pub fn new(data: Arc<dyn RouteDataOps>) -> Self {
        Self { data }
    }

    pub async fn build_route_plan(&self, request: &RouteOptimizationRequest) -> Result<RoutePlan> {
        let site_id = match request.construction_site_id {
            Some(site_id) => site_id,
            None => {
                event!(Level::WARN, "Route optimization request without construction site id");
                return Ok(RoutePlan::empty(None, 0.0));
            }
        };

        if request.cargo_capacity_tons <= 0.0 {
            event!(
                Level::WARN,
                "Route optimization request for construction site {} with non-positive cargo capacity {}t",
                site_id.0,
                request.cargo_capacity_tons
            );
            return Ok(RoutePlan::empty(Some(site_id), 0.0));
        }

        let site = match self
            .data
            .load_construction_site(&site_id)
            .await
            .with_context(|| format!("Failed to load construction site {}", site_id.0))?
        {
            Some(site) => site,
            None => {
                event!(Level::WARN, "Construction site {} not found", site_id.0);
                return Ok(RoutePlan::empty(Some(site_id), 0.0));
            }
        };

        let mut demands = build_material_demands(&site);
        let initial_demand = initial_total_demand(&demands);
        if initial_demand <= EPSILON {
            event!(Level::INFO, "Construction site {} has no outstanding material demand", site_id.0);
            return Ok(RoutePlan::empty(Some(site_id), 1.0));
        }

        let markets = self
            .data
            .load_candidate_markets(&site_id)
            .await
            .with_context(|| format!("Failed to load candidate markets for construction site {}", site_id.0))?;

        let site_system = self.resolve_site_system(&site, &markets).await?;
        apply_seller_counts(&mut demands, &markets);
        let mut inventories = build_market_inventories(&markets, &demands);

        event!(
            Level::DEBUG,
            "Planning {} outstanding materials across {} stocked candidate markets",
            demands.len(),
            inventories.len()
        );
        if inventories.is_empty() {
            event!(
                Level::WARN,
                "No candidate market stocks any outstanding material for construction site {}",
                site_id.0
            );
        }

        let mut runs = Vec::new();
        let mut run_index: u32 = 1;
        while has_remaining_demand(&demands) && has_useful_stock(&inventories, &demands) {
            match build_single_run(run_index, &mut inventories, &mut demands, request, site_system.as_ref()) {
                Some((run, delivered)) if delivered > EPSILON => {
                    event!(
                        Level::INFO,
                        "Run {} loads {:.1}t across {} market stops",
                        run.run_index,
                        run.total_tonnage,
                        run.legs.len()
                    );
                    runs.push(run);
                    run_index += 1;
                }
                _ => break,
            }
        }

        let remaining_demand = remaining_total_demand(&demands);
        let coverage_fraction = ((initial_demand - remaining_demand) / initial_demand).clamp(0.0, 1.0);
        event!(
            Level::INFO,
            "Planned {} delivery runs covering {:.1}% of the outstanding demand for construction site {}",
            runs.len(),
            coverage_fraction * 100.0,
            site_id.0
        );

        Ok(RoutePlan {
            construction_site_id: Some(site_id),
            runs,
            coverage_fraction,
        })
    }

    /// The site's home system comes from the market record of the site itself.
    /// Sites whose market has no resolvable system borrow the system hosting
    /// the most candidate markets instead.
    async fn resolve_site_system(&self, site: &ConstructionSite, candidate_markets: &[Market]) -> Result<Option<SystemName>> {
        let site_market = self
            .data
            .load_market(&site.market_id)
            .await
            .with_context(|| format!("Failed to load market {} of the construction site", site.market_id.0))?;

        match site_market.and_then(|market| market.system_name) {
            Some(system) => Ok(Some(system)),
            None => {
                let fallback = most_common_system(candidate_markets);
                match fallback.as_ref() {
                    Some(system) => event!(
                        Level::INFO,
                        "Construction site at market {} has no resolvable system, assuming {}",
                        site.market_id.0,
                        system.0
                    ),
                    None => event!(
                        Level::WARN,
                        "Could not resolve a home system for the construction site at market {}",
                        site.market_id.0
                    ),
                }
                Ok(fallback)
            }
        }
    }
}
