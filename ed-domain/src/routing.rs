use crate::demand::{MarketInventory, MaterialDemand};
use crate::model::{CommodityKey, DeliveryRun, Market, MarketId, Purchase, RouteOptimizationRequest, RunLeg, SystemName};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::ops::Not;

pub const EPSILON: f64 = 1.0e-6;
pub const SCARCITY_WEIGHT_FACTOR: f64 = 0.25;
pub const PREFERRED_SYSTEM_BONUS: f64 = 1.3;
pub const JUMP_PENALTY_BASE: f64 = 0.75;
pub const JUMP_PENALTY_DECAY: f64 = 0.85;

/// Where the ship currently is while one run is being assembled. The preferred
/// system is the site's home system and stays fixed for the whole plan; the
/// current system follows the visited markets and becomes unknown again when a
/// market has no resolvable system.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteContext {
    pub preferred_system: Option<SystemName>,
    pub current_system: Option<SystemName>,
    pub jump_count: u32,
}

impl RouteContext {
    pub fn new(preferred_system: Option<SystemName>) -> Self {
        let current_system = preferred_system.clone();
        RouteContext {
            preferred_system,
            current_system,
            jump_count: 0,
        }
    }

    /// Registers a market visit. A jump is counted only when both the current
    /// and the next system are known and differ.
    pub fn move_to(&mut self, market_system: Option<&SystemName>) {
        if let (Some(current), Some(next)) = (self.current_system.as_ref(), market_system) {
            if current.matches(next).not() {
                self.jump_count += 1;
            }
        }
        self.current_system = market_system.cloned();
    }

    fn matches_preferred(&self, market_system: Option<&SystemName>) -> bool {
        match (market_system, self.preferred_system.as_ref()) {
            (Some(market), Some(preferred)) => market.matches(preferred),
            _ => false,
        }
    }
}

/// Stock entries of a market in loading order: scarcer materials first, then
/// the ones with more outstanding demand, then by key so equal entries cannot
/// flip between identical calls.
fn leg_order(inventory: &MarketInventory, demands: &BTreeMap<CommodityKey, MaterialDemand>) -> Vec<CommodityKey> {
    inventory
        .stocks
        .keys()
        .sorted_by(|a, b| {
            let rank = |key: &CommodityKey| {
                demands
                    .get(key)
                    .map(|demand| (demand.scarcity_weight, demand.remaining))
                    .unwrap_or((0.0, 0.0))
            };
            let (weight_a, remaining_a) = rank(a);
            let (weight_b, remaining_b) = rank(b);
            OrderedFloat(weight_b)
                .cmp(&OrderedFloat(weight_a))
                .then_with(|| OrderedFloat(remaining_b).cmp(&OrderedFloat(remaining_a)))
                .then_with(|| a.cmp(b))
        })
        .cloned()
        .collect_vec()
}

/// Plans the purchases for one visit of `inventory`, bounded by
/// `capacity_limit` tons. Drains the matched demand and stock records in
/// place. Returns the leg plus the loaded tonnage, or `None` if nothing could
/// be purchased at this market.
pub fn plan_leg(
    inventory: &mut MarketInventory,
    demands: &mut BTreeMap<CommodityKey, MaterialDemand>,
    capacity_limit: f64,
) -> Option<(RunLeg, f64)> {
    let ordered_keys = leg_order(inventory, demands);
    let mut purchases: Vec<Purchase> = Vec::new();
    let mut loaded = 0.0;

    for key in ordered_keys {
        let capacity_left = capacity_limit - loaded;
        if capacity_left <= EPSILON {
            break;
        }
        let demand = match demands.get_mut(&key) {
            Some(demand) if demand.has_remaining() => demand,
            _ => continue,
        };
        let take = match inventory.stocks.get_mut(&key) {
            Some(stock) => {
                let take = demand.remaining.min(stock.stock).min(capacity_left);
                if take <= EPSILON {
                    continue;
                }
                stock.stock -= take;
                take
            }
            None => continue,
        };
        demand.consume(take);
        loaded += take;
        purchases.push(Purchase {
            material_display_name: demand.display_name.clone(),
            amount_tons: take,
        });
    }

    purchases.is_empty().not().then(|| {
        let leg = RunLeg {
            market_id: inventory.market_id,
            market_display_name: inventory.display_name.clone(),
            purchases,
        };
        (leg, loaded)
    })
}

/// Tonnage this market could contribute right now, simulated with the same
/// greedy fill as `plan_leg` but without touching any record.
fn potential_load(
    inventory: &MarketInventory,
    demands: &BTreeMap<CommodityKey, MaterialDemand>,
    capacity_limit: f64,
) -> f64 {
    let mut capacity_left = capacity_limit;
    let mut load = 0.0;
    for (key, stock) in &inventory.stocks {
        if capacity_left <= EPSILON {
            break;
        }
        let remaining = demands.get(key).map(|demand| demand.remaining).unwrap_or(0.0);
        if remaining <= EPSILON {
            continue;
        }
        let take = remaining.min(stock.stock).min(capacity_left);
        if take <= EPSILON {
            continue;
        }
        capacity_left -= take;
        load += take;
    }
    load
}

/// Sum of scarcity weights over every demanded commodity the market still has
/// in stock, deliberately not capped by capacity: a market carrying many
/// scarce items stays attractive even when only part of it fits this leg.
fn scarcity_bonus(inventory: &MarketInventory, demands: &BTreeMap<CommodityKey, MaterialDemand>) -> f64 {
    inventory
        .stocks
        .values()
        .filter(|stock| stock.stock > EPSILON)
        .filter_map(|stock| demands.get(&stock.key))
        .filter(|demand| demand.has_remaining())
        .map(|demand| demand.scarcity_weight)
        .sum()
}

fn system_multiplier(context: &RouteContext, market_system: Option<&SystemName>) -> f64 {
    match context.current_system.as_ref() {
        None => {
            if context.matches_preferred(market_system) {
                PREFERRED_SYSTEM_BONUS
            } else {
                1.0
            }
        }
        Some(_) => JUMP_PENALTY_BASE * JUMP_PENALTY_DECAY.powi(context.jump_count as i32),
    }
}

#[derive(Debug, Clone)]
pub struct ScoredMarketCandidate {
    pub index: usize,
    pub market_id: MarketId,
    pub display_name: String,
    pub potential_load: f64,
    pub scarcity_bonus: f64,
    pub system_multiplier: f64,
    pub score: f64,
    pub matches_preferred_system: bool,
    pub has_known_system: bool,
    pub initial_total_stock: f64,
}

impl ScoredMarketCandidate {
    pub fn calc(
        index: usize,
        inventory: &MarketInventory,
        demands: &BTreeMap<CommodityKey, MaterialDemand>,
        capacity_limit: f64,
        context: &RouteContext,
    ) -> Option<Self> {
        let potential_load = potential_load(inventory, demands, capacity_limit);
        if potential_load <= EPSILON {
            return None;
        }
        let scarcity_bonus = scarcity_bonus(inventory, demands);
        let system_multiplier = system_multiplier(context, inventory.system_name.as_ref());
        let score = potential_load * system_multiplier + SCARCITY_WEIGHT_FACTOR * scarcity_bonus;

        Some(ScoredMarketCandidate {
            index,
            market_id: inventory.market_id,
            display_name: inventory.display_name.clone(),
            potential_load,
            scarcity_bonus,
            system_multiplier,
            score,
            matches_preferred_system: context.matches_preferred(inventory.system_name.as_ref()),
            has_known_system: inventory.system_name.is_some(),
            initial_total_stock: inventory.initial_total_stock(),
        })
    }

    fn beats_on_tie(&self, other: &ScoredMarketCandidate) -> bool {
        let ordering = (
            self.matches_preferred_system,
            self.has_known_system,
            OrderedFloat(self.initial_total_stock),
        )
            .cmp(&(
                other.matches_preferred_system,
                other.has_known_system,
                OrderedFloat(other.initial_total_stock),
            ))
            .then_with(|| other.display_name.cmp(&self.display_name));
        ordering == Ordering::Greater
    }
}

/// Scores every unvisited inventory and returns the best candidate for the
/// next leg, or `None` when no market can contribute anything. Score ties
/// within `EPSILON` fall back to preferred-system membership, known system,
/// initial total stock and finally the display name.
pub fn select_best_market(
    inventories: &[MarketInventory],
    demands: &BTreeMap<CommodityKey, MaterialDemand>,
    capacity_limit: f64,
    visited: &HashSet<MarketId>,
    context: &RouteContext,
) -> Option<ScoredMarketCandidate> {
    let mut best: Option<ScoredMarketCandidate> = None;
    for (index, inventory) in inventories.iter().enumerate() {
        if visited.contains(&inventory.market_id) {
            continue;
        }
        let candidate = match ScoredMarketCandidate::calc(index, inventory, demands, capacity_limit, context) {
            Some(candidate) => candidate,
            None => continue,
        };
        best = match best {
            None => Some(candidate),
            Some(current) => {
                if candidate.score > current.score + EPSILON {
                    Some(candidate)
                } else if (candidate.score - current.score).abs() <= EPSILON && candidate.beats_on_tie(&current) {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }
    best
}

fn merge_summary(summary: &mut BTreeMap<String, f64>, purchases: &[Purchase]) {
    for purchase in purchases {
        *summary.entry(purchase.material_display_name.clone()).or_insert(0.0) += purchase.amount_tons;
    }
}

/// Assembles one delivery run: picks a first market against the full capacity,
/// then keeps adding legs until the market budget or the remaining capacity is
/// exhausted. A partial run with at least one leg is valid; `None` means no
/// market could contribute at all.
pub fn build_single_run(
    run_index: u32,
    inventories: &mut [MarketInventory],
    demands: &mut BTreeMap<CommodityKey, MaterialDemand>,
    request: &RouteOptimizationRequest,
    site_system: Option<&SystemName>,
) -> Option<(DeliveryRun, f64)> {
    let capacity = request.cargo_capacity_tons;
    let max_markets = request.effective_max_markets_per_run() as usize;
    let mut context = RouteContext::new(site_system.cloned());
    let mut visited: HashSet<MarketId> = HashSet::new();
    let mut legs: Vec<RunLeg> = Vec::new();
    let mut materials_summary: BTreeMap<String, f64> = BTreeMap::new();

    let primary = select_best_market(inventories, demands, capacity, &visited, &context)?;
    let primary_index = primary.index;
    visited.insert(inventories[primary_index].market_id);
    let (leg, loaded) = plan_leg(&mut inventories[primary_index], demands, capacity)?;
    let mut delivered = loaded;
    merge_summary(&mut materials_summary, &leg.purchases);
    legs.push(leg);
    context.move_to(inventories[primary_index].system_name.as_ref());
    let mut remaining_capacity = capacity - delivered;

    while legs.len() < max_markets && remaining_capacity > EPSILON {
        let candidate = match select_best_market(inventories, demands, remaining_capacity, &visited, &context) {
            Some(candidate) => candidate,
            None => break,
        };
        let index = candidate.index;
        visited.insert(inventories[index].market_id);
        let (leg, loaded) = match plan_leg(&mut inventories[index], demands, remaining_capacity) {
            Some(leg_plan) => leg_plan,
            None => break,
        };
        delivered += loaded;
        remaining_capacity -= loaded;
        merge_summary(&mut materials_summary, &leg.purchases);
        legs.push(leg);
        context.move_to(inventories[index].system_name.as_ref());
    }

    let run = DeliveryRun {
        run_index,
        legs,
        total_tonnage: delivered,
        materials_summary_tons: materials_summary,
    };
    Some((run, delivered))
}

/// Fallback for a site whose own market record has no resolvable system: the
/// system hosting the most candidate markets wins, then the one with the most
/// total stock, then the alphabetically first. System names group
/// case-insensitively and the first spelling seen is reported.
pub fn most_common_system(markets: &[Market]) -> Option<SystemName> {
    markets
        .iter()
        .filter_map(|market| {
            market
                .system_name
                .clone()
                .map(|system| (system.0.to_ascii_lowercase(), (system, market.total_stock())))
        })
        .into_group_map()
        .into_iter()
        .filter_map(|(key, group)| {
            let market_count = group.len();
            let total_stock: f64 = group.iter().map(|(_, stock)| *stock).sum();
            let first_spelling = group.into_iter().next().map(|(system, _)| system)?;
            Some((key, first_spelling, market_count, total_stock))
        })
        .sorted_by(|a, b| {
            b.2.cmp(&a.2)
                .then_with(|| OrderedFloat(b.3).cmp(&OrderedFloat(a.3)))
                .then_with(|| a.0.cmp(&b.0))
        })
        .map(|(_, system, _, _)| system)
        .next()
}
