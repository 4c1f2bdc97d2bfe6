//! Minimum-cost acquisition planning over the recipe graph
//!
//! Computes, for an item and quantity, whether buying it or crafting it
//! from its reagents is cheaper, recursing through the recipe catalog with
//! explicit cycle tracking and per-run memoization.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::models::{ItemId, Recipe};
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    AuctionHouse,
    Vendor,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::AuctionHouse => write!(f, "Auction House"),
            PriceSource::Vendor => write!(f, "Vendor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceEntry {
    pub source: PriceSource,
    pub unit_price: Money,
}

/// Best-known unit prices per item. An item may carry entries from several
/// sources at once; the resolver scans all of them.
#[derive(Debug, Default)]
pub struct PriceTable {
    entries: HashMap<ItemId, Vec<PriceEntry>>,
}

impl PriceTable {
    pub fn new() -> PriceTable {
        PriceTable::default()
    }

    pub fn insert(&mut self, item: ItemId, source: PriceSource, unit_price: Money) {
        self.entries
            .entry(item)
            .or_default()
            .push(PriceEntry { source, unit_price });
    }

    pub fn sources(&self, item: ItemId) -> &[PriceEntry] {
        self.entries.get(&item).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cheapest entry across all sources; the earliest-inserted entry wins
    /// a price tie.
    pub fn cheapest(&self, item: ItemId) -> Option<PriceEntry> {
        self.sources(item)
            .iter()
            .copied()
            .min_by_key(|entry| entry.unit_price)
    }

    /// Auction house unit price only, used for sell-side valuation.
    pub fn auction_price(&self, item: ItemId) -> Option<Money> {
        self.sources(item)
            .iter()
            .filter(|entry| entry.source == PriceSource::AuctionHouse)
            .map(|entry| entry.unit_price)
            .min()
    }
}

/// Recipes indexed by the item they craft. An item may be craftable by
/// zero, one, or many recipes across professions.
#[derive(Debug, Default)]
pub struct RecipeCatalog {
    by_item: HashMap<ItemId, Vec<Recipe>>,
}

impl RecipeCatalog {
    pub fn new() -> RecipeCatalog {
        RecipeCatalog::default()
    }

    pub fn from_recipes(recipes: impl IntoIterator<Item = Recipe>) -> RecipeCatalog {
        let mut catalog = RecipeCatalog::new();
        for recipe in recipes {
            catalog.insert(recipe);
        }
        catalog
    }

    pub fn insert(&mut self, recipe: Recipe) {
        self.by_item
            .entry(recipe.crafted_item)
            .or_default()
            .push(recipe);
    }

    pub fn producers(&self, item: ItemId) -> &[Recipe] {
        self.by_item.get(&item).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The item has neither a price entry nor a producing recipe.
    #[error("no price or recipe data for item {0}")]
    NoSource(ItemId),
    /// Every crafting path for the item loops back to itself and no
    /// purchase source exists.
    #[error("every crafting path for item {0} loops back to itself")]
    CyclicRecipe(ItemId),
}

/// The chosen acquisition strategy for one item/quantity pair, with enough
/// structure to render a cost breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostPlan {
    pub item: ItemId,
    pub quantity: u32,
    pub total: Money,
    pub acquisition: Acquisition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Buy {
        source: PriceSource,
        unit_price: Money,
    },
    Craft {
        recipe_id: u32,
        recipe_name: String,
        batches: u32,
        reagents: Vec<CostPlan>,
    },
}

impl CostPlan {
    /// Effective unit price for display, rounded up for crafted plans whose
    /// batch total does not divide evenly.
    pub fn unit_price(&self) -> Money {
        match self.acquisition {
            Acquisition::Buy { unit_price, .. } => unit_price,
            Acquisition::Craft { .. } => Money::per_unit(self.total, self.quantity),
        }
    }
}

/// Shared state for one report run: the immutable input tables plus the
/// memo and the active recursion path. Built fresh per snapshot; never a
/// process-wide cache.
pub struct ResolveContext<'a> {
    prices: &'a PriceTable,
    catalog: &'a RecipeCatalog,
    overrides: &'a HashSet<ItemId>,
    memo: HashMap<(ItemId, u32), CostPlan>,
    visiting: HashSet<ItemId>,
    resolutions: usize,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        prices: &'a PriceTable,
        catalog: &'a RecipeCatalog,
        overrides: &'a HashSet<ItemId>,
    ) -> ResolveContext<'a> {
        ResolveContext {
            prices,
            catalog,
            overrides,
            memo: HashMap::new(),
            visiting: HashSet::new(),
            resolutions: 0,
        }
    }

    pub fn prices(&self) -> &'a PriceTable {
        self.prices
    }

    /// Number of non-memoized resolutions performed so far. Instrumentation
    /// hook for observing memo hits.
    pub fn resolutions(&self) -> usize {
        self.resolutions
    }

    /// Cheapest way to acquire `quantity` units of `item`.
    pub fn resolve(&mut self, item: ItemId, quantity: u32) -> Result<CostPlan, ResolveError> {
        if self.visiting.contains(&item) {
            // Re-entered on the active path: the candidate recipe that led
            // here is invalid, not an infinite recursion.
            return Err(ResolveError::CyclicRecipe(item));
        }
        if let Some(plan) = self.memo.get(&(item, quantity)) {
            return Ok(plan.clone());
        }
        self.resolutions += 1;
        self.visiting.insert(item);
        let result = self.resolve_uncached(item, quantity);
        self.visiting.remove(&item);
        if let Ok(plan) = &result {
            self.memo.insert((item, quantity), plan.clone());
        }
        result
    }

    fn resolve_uncached(&mut self, item: ItemId, quantity: u32) -> Result<CostPlan, ResolveError> {
        let buy = self.prices.cheapest(item).map(|entry| CostPlan {
            item,
            quantity,
            total: entry.unit_price.times(quantity),
            acquisition: Acquisition::Buy {
                source: entry.source,
                unit_price: entry.unit_price,
            },
        });

        let catalog = self.catalog;
        let recipes = catalog.producers(item);
        if self.overrides.contains(&item) || recipes.is_empty() {
            return buy.ok_or(ResolveError::NoSource(item));
        }

        // A Craft candidate must be strictly cheaper than the running best,
        // so purchase wins a Buy/Craft tie and the first recipe in catalog
        // order wins a Craft/Craft tie.
        let mut best = buy;
        let mut cycle_seen = false;
        let mut last_err = None;
        for recipe in recipes {
            match self.craft_candidate(recipe, quantity) {
                Ok(candidate) => {
                    if best
                        .as_ref()
                        .map_or(true, |plan| candidate.total < plan.total)
                    {
                        best = Some(candidate);
                    }
                }
                Err(err) => {
                    if matches!(err, ResolveError::CyclicRecipe(_)) {
                        cycle_seen = true;
                    }
                    last_err = Some(err);
                }
            }
        }

        best.ok_or(if cycle_seen {
            ResolveError::CyclicRecipe(item)
        } else {
            last_err.unwrap_or(ResolveError::NoSource(item))
        })
    }

    fn craft_candidate(
        &mut self,
        recipe: &Recipe,
        quantity: u32,
    ) -> Result<CostPlan, ResolveError> {
        // Full batches only: crafting 4 units with a 3-per-batch recipe
        // consumes two batches' worth of reagents.
        let batches = quantity.div_ceil(recipe.crafted_quantity);
        let mut reagents = Vec::with_capacity(recipe.reagents.len());
        let mut total = Money::ZERO;
        for reagent in &recipe.reagents {
            let plan = self.resolve(reagent.item, reagent.quantity * batches)?;
            total += plan.total;
            reagents.push(plan);
        }
        Ok(CostPlan {
            item: recipe.crafted_item,
            quantity,
            total,
            acquisition: Acquisition::Craft {
                recipe_id: recipe.id,
                recipe_name: recipe.name.clone(),
                batches,
                reagents,
            },
        })
    }
}
