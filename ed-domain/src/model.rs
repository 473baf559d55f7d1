use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct MarketId(pub i64);

#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ConstructionSiteId(pub i64);

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct SystemName(pub String);

impl SystemName {
    pub fn matches(&self, other: &SystemName) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

/// Stable join key between demand lines and market items. Commodities without
/// id and name cannot be keyed and are dropped by the builders.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct CommodityKey(pub String);

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Commodity {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub name_localised: Option<String>,
    pub category: Option<String>,
    pub category_localised: Option<String>,
}

impl Commodity {
    pub fn key(&self) -> Option<CommodityKey> {
        if let Some(id) = self.id {
            return Some(CommodityKey(format!("id:{}", id)));
        }
        self.name
            .as_ref()
            .map(|name| CommodityKey(format!("name:{}", name.to_lowercase())))
    }

    pub fn display_name(&self) -> String {
        if let Some(localised) = self.name_localised.as_ref().filter(|n| !n.trim().is_empty()) {
            return localised.clone();
        }
        if let Some(name) = self.name.as_ref().filter(|n| !n.trim().is_empty()) {
            return name.clone();
        }
        match self.id {
            Some(id) => format!("Commodity-{}", id),
            None => "Commodity".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRequirement {
    pub id: i64,
    pub commodity: Option<Commodity>,
    pub required_quantity: i64,
    pub delivered_quantity: i64,
}

impl MaterialRequirement {
    pub fn outstanding(&self) -> f64 {
        (self.required_quantity - self.delivered_quantity).max(0) as f64
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionSite {
    pub market_id: MarketId,
    pub site_id: Option<String>,
    pub requirements: Vec<MaterialRequirement>,
}

impl ConstructionSite {
    pub fn outstanding_lines(&self) -> Vec<&MaterialRequirement> {
        self.requirements
            .iter()
            .filter(|requirement| requirement.outstanding() > 0.0)
            .collect_vec()
    }

    pub fn progress_fraction(&self) -> f64 {
        let required: i64 = self.requirements.iter().map(|r| r.required_quantity).sum();
        if required <= 0 {
            return 1.0;
        }
        let delivered: i64 = self.requirements.iter().map(|r| r.delivered_quantity).sum();
        (delivered as f64 / required as f64).clamp(0.0, 1.0)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketItem {
    pub commodity: Option<Commodity>,
    pub buy_price: i32,
    pub sell_price: i32,
    pub stock: f64,
    pub demand: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub market_id: MarketId,
    pub station_name: Option<String>,
    pub station_type: Option<String>,
    pub system_name: Option<SystemName>,
    pub items: Vec<MarketItem>,
}

impl Market {
    pub fn display_name(&self) -> String {
        self.station_name
            .clone()
            .or_else(|| self.system_name.as_ref().map(|system| system.0.clone()))
            .unwrap_or_else(|| "Unknown Market".to_string())
    }

    pub fn total_stock(&self) -> f64 {
        self.items.iter().map(|item| item.stock).sum()
    }
}

pub const DEFAULT_MAX_MARKETS_PER_RUN: u32 = 2;

fn default_max_markets_per_run() -> u32 {
    DEFAULT_MAX_MARKETS_PER_RUN
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteOptimizationRequest {
    pub construction_site_id: Option<ConstructionSiteId>,
    pub cargo_capacity_tons: f64,
    #[serde(default = "default_max_markets_per_run")]
    pub max_markets_per_run: u32,
}

impl RouteOptimizationRequest {
    pub fn new(construction_site_id: ConstructionSiteId, cargo_capacity_tons: f64) -> Self {
        RouteOptimizationRequest {
            construction_site_id: Some(construction_site_id),
            cargo_capacity_tons,
            max_markets_per_run: DEFAULT_MAX_MARKETS_PER_RUN,
        }
    }

    pub fn effective_max_markets_per_run(&self) -> u32 {
        self.max_markets_per_run.max(1)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub material_display_name: String,
    pub amount_tons: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunLeg {
    pub market_id: MarketId,
    pub market_display_name: String,
    pub purchases: Vec<Purchase>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRun {
    pub run_index: u32,
    pub legs: Vec<RunLeg>,
    pub total_tonnage: f64,
    pub materials_summary_tons: BTreeMap<String, f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    pub construction_site_id: Option<ConstructionSiteId>,
    pub runs: Vec<DeliveryRun>,
    pub coverage_fraction: f64,
}

impl RoutePlan {
    pub fn empty(construction_site_id: Option<ConstructionSiteId>, coverage_fraction: f64) -> Self {
        RoutePlan {
            construction_site_id,
            runs: Vec::new(),
            coverage_fraction,
        }
    }

    pub fn total_tonnage(&self) -> f64 {
        self.runs.iter().map(|run| run.total_tonnage).sum()
    }
}
