use ed_domain::{
    Commodity, ConstructionSite, ConstructionSiteId, Market, MarketId, MarketItem, MaterialRequirement, RouteOptimizationRequest, SystemName,
};

pub struct TestObjects;

impl TestObjects {
    pub fn commodity(id: i64, name: &str) -> Commodity {
        Commodity {
            id: Some(id),
            name: Some(name.to_string()),
            name_localised: None,
            category: Some("Manufactured".to_string()),
            category_localised: None,
        }
    }

    pub fn requirement(id: i64, commodity: Commodity, required_quantity: i64, delivered_quantity: i64) -> MaterialRequirement {
        MaterialRequirement {
            id,
            commodity: Some(commodity),
            required_quantity,
            delivered_quantity,
        }
    }

    pub fn construction_site(market_id: i64, requirements: Vec<MaterialRequirement>) -> ConstructionSite {
        ConstructionSite {
            market_id: MarketId(market_id),
            site_id: Some("ColonisationConstructionDepot".to_string()),
            requirements,
        }
    }

    pub fn market(market_id: i64, station_name: &str, system_name: Option<&str>, items: Vec<MarketItem>) -> Market {
        Market {
            market_id: MarketId(market_id),
            station_name: Some(station_name.to_string()),
            station_type: Some("Orbis".to_string()),
            system_name: system_name.map(|system| SystemName(system.to_string())),
            items,
        }
    }

    pub fn market_item(commodity: Commodity, stock: f64) -> MarketItem {
        MarketItem {
            commodity: Some(commodity),
            buy_price: 2_000,
            sell_price: 1_800,
            stock,
            demand: 0.0,
        }
    }

    pub fn request(site_id: i64, cargo_capacity_tons: f64, max_markets_per_run: u32) -> RouteOptimizationRequest {
        RouteOptimizationRequest {
            construction_site_id: Some(ConstructionSiteId(site_id)),
            cargo_capacity_tons,
            max_markets_per_run,
        }
    }
}
