//! Data models for game items, recipes, and professions

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Opaque item identifier, unique within one (region, language) data set.
/// Display names are looked up through [`NameTable`] and never used as a
/// join key for cost arithmetic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemQuality {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl ItemQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemQuality::Common => "COMMON",
            ItemQuality::Uncommon => "UNCOMMON",
            ItemQuality::Rare => "RARE",
            ItemQuality::Epic => "EPIC",
            ItemQuality::Legendary => "LEGENDARY",
        }
    }

    pub fn parse(value: &str) -> Option<ItemQuality> {
        match value {
            "COMMON" => Some(ItemQuality::Common),
            "UNCOMMON" => Some(ItemQuality::Uncommon),
            "RARE" => Some(ItemQuality::Rare),
            "EPIC" => Some(ItemQuality::Epic),
            "LEGENDARY" => Some(ItemQuality::Legendary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub quality: ItemQuality,
    /// Unit price when bought from a vendor; `None` for items no vendor sells.
    pub vendor_price: Option<Money>,
}

/// An input item consumed by a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reagent {
    pub item: ItemId,
    pub quantity: u32,
}

/// One auction snapshot row, already normalized to a unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionEntry {
    pub item: ItemId,
    pub unit_price: Money,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub id: u32,
    pub name: String,
    /// Human-readable grouping label (profession skill tier, e.g.
    /// "Shadowlands Alchemy"). Selection and provenance only; never part of
    /// the cost arithmetic.
    pub profession: String,
    pub rank: Option<u32>,
    pub crafted_item: ItemId,
    pub crafted_quantity: u32,
    pub reagents: Vec<Reagent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfessionTier {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profession {
    pub id: u32,
    pub name: String,
    pub tiers: Vec<ProfessionTier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realm {
    pub id: u32,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedRealm {
    pub id: u32,
    pub realms: Vec<Realm>,
}

/// Locale-specific item names, swappable per (region, language) data set.
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    by_id: HashMap<ItemId, String>,
}

impl NameTable {
    pub fn new() -> NameTable {
        NameTable::default()
    }

    pub fn insert(&mut self, item: ItemId, name: String) {
        self.by_id.insert(item, name);
    }

    pub fn get(&self, item: ItemId) -> Option<&str> {
        self.by_id.get(&item).map(String::as_str)
    }

    /// Display name, falling back to the raw id for items the data set
    /// does not know.
    pub fn display(&self, item: ItemId) -> String {
        match self.get(item) {
            Some(name) => name.to_string(),
            None => format!("item {}", item),
        }
    }

    /// Exact-match reverse lookup in the configured locale.
    pub fn find(&self, name: &str) -> Option<ItemId> {
        self.by_id
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }
}

/// Assign ranks to recipes that craft the same item within one profession.
/// Recipe ids ascend with the rank, so sorting by id yields the rank order;
/// ranked recipes get a " (Rank N)" name suffix.
pub fn assign_ranks(recipes: &mut [Recipe]) {
    let mut by_output: HashMap<(String, ItemId), Vec<usize>> = HashMap::new();
    for (idx, recipe) in recipes.iter().enumerate() {
        by_output
            .entry((recipe.profession.clone(), recipe.crafted_item))
            .or_default()
            .push(idx);
    }
    for indices in by_output.values_mut() {
        if indices.len() < 2 {
            continue;
        }
        indices.sort_by_key(|&idx| recipes[idx].id);
        for (rank0, &idx) in indices.iter().enumerate() {
            let rank = rank0 as u32 + 1;
            let recipe = &mut recipes[idx];
            recipe.rank = Some(rank);
            recipe.name = format!("{} (Rank {})", recipe.name, rank);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(id: u32, name: &str, crafted: u32) -> Recipe {
        Recipe {
            id,
            name: name.to_string(),
            profession: "Shadowlands Alchemy".to_string(),
            rank: None,
            crafted_item: ItemId(crafted),
            crafted_quantity: 1,
            reagents: Vec::new(),
        }
    }

    #[test]
    fn ranks_assigned_by_ascending_recipe_id() {
        let mut recipes = vec![
            recipe(42, "Shadowy Potion", 7),
            recipe(40, "Shadowy Potion", 7),
            recipe(41, "Shadowy Potion", 7),
            recipe(50, "Other Potion", 8),
        ];
        assign_ranks(&mut recipes);

        let by_id: HashMap<u32, &Recipe> = recipes.iter().map(|r| (r.id, r)).collect();
        assert_eq!(by_id[&40].name, "Shadowy Potion (Rank 1)");
        assert_eq!(by_id[&41].name, "Shadowy Potion (Rank 2)");
        assert_eq!(by_id[&42].name, "Shadowy Potion (Rank 3)");
        assert_eq!(by_id[&42].rank, Some(3));
        assert_eq!(by_id[&50].name, "Other Potion");
        assert_eq!(by_id[&50].rank, None);
    }

    #[test]
    fn same_item_in_different_professions_is_not_ranked() {
        let mut recipes = vec![recipe(1, "Bar", 9), recipe(2, "Bar", 9)];
        recipes[1].profession = "Shadowlands Mining".to_string();
        assign_ranks(&mut recipes);
        assert!(recipes.iter().all(|r| r.rank.is_none()));
    }

    #[test]
    fn name_table_lookup_and_fallback() {
        let mut names = NameTable::new();
        names.insert(ItemId(171276), "Spiritual Healing Potion".to_string());
        assert_eq!(names.get(ItemId(171276)), Some("Spiritual Healing Potion"));
        assert_eq!(names.find("Spiritual Healing Potion"), Some(ItemId(171276)));
        assert_eq!(names.find("spiritual healing potion"), None);
        assert_eq!(names.display(ItemId(9)), "item 9");
    }

    #[test]
    fn quality_round_trips_through_text() {
        for quality in [
            ItemQuality::Common,
            ItemQuality::Uncommon,
            ItemQuality::Rare,
            ItemQuality::Epic,
            ItemQuality::Legendary,
        ] {
            assert_eq!(ItemQuality::parse(quality.as_str()), Some(quality));
        }
        assert_eq!(ItemQuality::parse("ARTIFACT"), None);
    }
}
