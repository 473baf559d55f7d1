use crate::model::{CommodityKey, ConstructionSite, Market, MarketId, SystemName};
use crate::routing::EPSILON;
use itertools::Itertools;
use std::collections::BTreeMap;

/// Outstanding need for one commodity, aggregated over all requirement lines
/// of a site. `remaining` is drained while legs are planned; `initial_required`
/// stays fixed so coverage can be computed at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDemand {
    pub key: CommodityKey,
    pub display_name: String,
    pub remaining: f64,
    pub initial_required: f64,
    pub seller_count: u32,
    pub scarcity_weight: f64,
}

impl MaterialDemand {
    fn new(key: CommodityKey, display_name: String) -> Self {
        MaterialDemand {
            key,
            display_name,
            remaining: 0.0,
            initial_required: 0.0,
            seller_count: 0,
            scarcity_weight: 1.0,
        }
    }

    pub fn consume(&mut self, amount: f64) {
        self.remaining = (self.remaining - amount).max(0.0);
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining > EPSILON
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialStock {
    pub key: CommodityKey,
    pub initial_stock: f64,
    pub stock: f64,
}

/// One market's stock, filtered down to commodities the site still needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketInventory {
    pub market_id: MarketId,
    pub display_name: String,
    pub system_name: Option<SystemName>,
    pub stocks: BTreeMap<CommodityKey, MaterialStock>,
}

impl MarketInventory {
    fn add_stock(&mut self, key: CommodityKey, quantity: f64) {
        self.stocks.insert(
            key.clone(),
            MaterialStock {
                key,
                initial_stock: quantity,
                stock: quantity,
            },
        );
    }

    pub fn has_stock(&self) -> bool {
        self.stocks.values().any(|entry| entry.stock > EPSILON)
    }

    pub fn has_useful_stock(&self, demands: &BTreeMap<CommodityKey, MaterialDemand>) -> bool {
        self.stocks.values().any(|entry| {
            entry.stock > EPSILON
                && demands
                    .get(&entry.key)
                    .map(|demand| demand.has_remaining())
                    .unwrap_or(false)
        })
    }

    pub fn initial_total_stock(&self) -> f64 {
        self.stocks.values().map(|entry| entry.initial_stock).sum()
    }
}

/// Aggregates the site's requirement lines into one demand record per
/// commodity key. Lines without a resolvable key and lines that are already
/// satisfied are skipped; duplicate lines for the same commodity merge by
/// summation.
pub fn build_material_demands(site: &ConstructionSite) -> BTreeMap<CommodityKey, MaterialDemand> {
    let mut demands: BTreeMap<CommodityKey, MaterialDemand> = BTreeMap::new();
    for requirement in &site.requirements {
        let keyed_commodity = requirement
            .commodity
            .as_ref()
            .and_then(|commodity| commodity.key().map(|key| (key, commodity)));
        if let Some((key, commodity)) = keyed_commodity {
            let outstanding = requirement.outstanding();
            if outstanding <= 0.0 {
                continue;
            }
            let demand = demands
                .entry(key.clone())
                .or_insert_with(|| MaterialDemand::new(key, commodity.display_name()));
            demand.remaining += outstanding;
            demand.initial_required += outstanding;
        }
    }
    demands
}

/// Counts, for every demand record, how many distinct candidate markets list
/// the commodity at all (stock level does not matter), then derives the
/// scarcity weight. A commodity nobody sells keeps the default weight of 1.0.
pub fn apply_seller_counts(demands: &mut BTreeMap<CommodityKey, MaterialDemand>, markets: &[Market]) {
    for market in markets {
        let listed_keys = market
            .items
            .iter()
            .filter_map(|item| item.commodity.as_ref().and_then(|commodity| commodity.key()))
            .unique()
            .collect_vec();
        for key in listed_keys {
            if let Some(demand) = demands.get_mut(&key) {
                demand.seller_count += 1;
            }
        }
    }
    for demand in demands.values_mut() {
        if demand.seller_count > 0 {
            demand.scarcity_weight = 1.0 / demand.seller_count as f64;
        }
    }
}

/// Builds one inventory per market, keeping only positively stocked items the
/// demand set cares about. Markets that end up without any qualifying stock
/// are dropped from the candidate set entirely.
pub fn build_market_inventories(
    markets: &[Market],
    demands: &BTreeMap<CommodityKey, MaterialDemand>,
) -> Vec<MarketInventory> {
    let mut inventories = Vec::new();
    for market in markets {
        let mut inventory = MarketInventory {
            market_id: market.market_id,
            display_name: market.display_name(),
            system_name: market.system_name.clone(),
            stocks: BTreeMap::new(),
        };
        for item in &market.items {
            if item.stock <= 0.0 {
                continue;
            }
            if let Some(key) = item.commodity.as_ref().and_then(|commodity| commodity.key()) {
                if demands.contains_key(&key) {
                    inventory.add_stock(key, item.stock);
                }
            }
        }
        if inventory.has_stock() {
            inventories.push(inventory);
        }
    }
    inventories
}

pub fn initial_total_demand(demands: &BTreeMap<CommodityKey, MaterialDemand>) -> f64 {
    demands.values().map(|demand| demand.initial_required).sum()
}

pub fn remaining_total_demand(demands: &BTreeMap<CommodityKey, MaterialDemand>) -> f64 {
    demands.values().map(|demand| demand.remaining).sum()
}

pub fn has_remaining_demand(demands: &BTreeMap<CommodityKey, MaterialDemand>) -> bool {
    demands.values().any(MaterialDemand::has_remaining)
}

pub fn has_useful_stock(
    inventories: &[MarketInventory],
    demands: &BTreeMap<CommodityKey, MaterialDemand>,
) -> bool {
    inventories
        .iter()
        .any(|inventory| inventory.has_useful_stock(demands))
}
