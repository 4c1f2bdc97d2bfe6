//! Per-recipe profit reports over resolved cost plans

use std::fmt::Write as _;

use crate::calculator::{Acquisition, CostPlan, ResolveContext, ResolveError};
use crate::models::{ItemId, NameTable, Recipe};
use crate::money::Money;

/// One display row for an immediate reagent of a reported recipe. Deeper
/// nesting stays available on the underlying [`CostPlan`]; the default
/// rendering shows one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReagentLine {
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Costed {
        /// Auction sell price of one batch; absent when the item is not
        /// currently auctioned (distinct from zero profit).
        price: Option<Money>,
        total_cost: Money,
        profit: Option<Money>,
        reagents: Vec<ReagentLine>,
    },
    /// The recipe could not be costed; sibling recipes still report.
    Unresolvable {
        reagent: ItemId,
        error: ResolveError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeReport {
    pub recipe_id: u32,
    pub recipe_name: String,
    pub profession: String,
    pub item_name: String,
    pub outcome: ReportOutcome,
}

/// Cost one batch of every requested recipe. The context (and so the memo)
/// is shared across the whole run; one unresolvable recipe never aborts
/// its siblings.
pub fn report(
    recipes: &[Recipe],
    ctx: &mut ResolveContext<'_>,
    names: &NameTable,
) -> Vec<RecipeReport> {
    recipes
        .iter()
        .map(|recipe| report_one(recipe, ctx, names))
        .collect()
}

fn report_one(
    recipe: &Recipe,
    ctx: &mut ResolveContext<'_>,
    names: &NameTable,
) -> RecipeReport {
    let mut reagents = Vec::with_capacity(recipe.reagents.len());
    let mut total_cost = Money::ZERO;
    let mut failure = None;

    // One batch of the recipe: reagents at their listed quantities.
    for reagent in &recipe.reagents {
        match ctx.resolve(reagent.item, reagent.quantity) {
            Ok(plan) => {
                total_cost += plan.total;
                reagents.push(reagent_line(&plan, names));
            }
            Err(error) => {
                failure = Some((reagent.item, error));
                break;
            }
        }
    }

    let outcome = match failure {
        Some((reagent, error)) => ReportOutcome::Unresolvable { reagent, error },
        None => {
            let price = ctx
                .prices()
                .auction_price(recipe.crafted_item)
                .map(|unit| unit.times(recipe.crafted_quantity));
            let profit = price.map(|price| price - total_cost);
            ReportOutcome::Costed {
                price,
                total_cost,
                profit,
                reagents,
            }
        }
    };

    RecipeReport {
        recipe_id: recipe.id,
        recipe_name: recipe.name.clone(),
        profession: recipe.profession.clone(),
        item_name: names.display(recipe.crafted_item),
        outcome,
    }
}

fn reagent_line(plan: &CostPlan, names: &NameTable) -> ReagentLine {
    let source = match &plan.acquisition {
        Acquisition::Buy { source, .. } => format!("from {}", source),
        Acquisition::Craft { .. } => format!("from Crafting: {}", names.display(plan.item)),
    };
    ReagentLine {
        name: names.display(plan.item),
        unit_price: plan.unit_price(),
        quantity: plan.quantity,
        subtotal: plan.total,
        source,
    }
}

/// Most profitable first; unpriceable recipes follow, unresolvable ones
/// last. Name and id order break ties so runs are reproducible.
pub fn sort_reports(reports: &mut [RecipeReport]) {
    reports.sort_by(|a, b| {
        sort_rank(b)
            .cmp(&sort_rank(a))
            .then_with(|| a.recipe_name.cmp(&b.recipe_name))
            .then_with(|| a.recipe_id.cmp(&b.recipe_id))
    });
}

fn sort_rank(report: &RecipeReport) -> (u8, Money) {
    match &report.outcome {
        ReportOutcome::Costed {
            profit: Some(profit),
            ..
        } => (2, *profit),
        ReportOutcome::Costed { profit: None, .. } => (1, Money::ZERO),
        ReportOutcome::Unresolvable { .. } => (0, Money::ZERO),
    }
}

/// Text rendering: a header line with price, cost and profit, then one
/// indented line per immediate reagent.
pub fn render_report(report: &RecipeReport, names: &NameTable) -> String {
    let mut out = String::new();
    // Provenance only: the profession never affects the arithmetic.
    let label = if report.recipe_name == report.item_name {
        format!("{} ({})", report.item_name, report.profession)
    } else {
        format!(
            "{} [{}] ({})",
            report.item_name, report.recipe_name, report.profession
        )
    };

    match &report.outcome {
        ReportOutcome::Costed {
            price,
            total_cost,
            profit,
            reagents,
        } => {
            match (price, profit) {
                (Some(price), Some(profit)) => {
                    let _ = writeln!(
                        out,
                        "{}: price: {}, costs: {}, profit: {}",
                        label, price, total_cost, profit
                    );
                }
                _ => {
                    let _ = writeln!(out, "{}: no auction price, costs: {}", label, total_cost);
                }
            }
            for line in reagents {
                let _ = writeln!(
                    out,
                    "  {}: {} x{} = {} ({})",
                    line.name, line.unit_price, line.quantity, line.subtotal, line.source
                );
            }
        }
        ReportOutcome::Unresolvable { reagent, error } => {
            let cause = match error {
                ResolveError::NoSource(item) => {
                    format!("no data for {}", names.display(*item))
                }
                ResolveError::CyclicRecipe(item) => {
                    format!("cyclic recipe for {}", names.display(*item))
                }
            };
            let _ = writeln!(
                out,
                "{}: unresolvable, reagent {}: {}",
                label,
                names.display(*reagent),
                cause
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::calculator::{PriceSource, PriceTable, RecipeCatalog};
    use crate::models::Reagent;

    const VIAL: ItemId = ItemId(1001);
    const BLOSSOM: ItemId = ItemId(1002);
    const POTION: ItemId = ItemId(1003);

    fn potion_recipe() -> Recipe {
        Recipe {
            id: 10,
            name: "Spiritual Healing Potion".to_string(),
            profession: "Shadowlands Alchemy".to_string(),
            rank: None,
            crafted_item: POTION,
            crafted_quantity: 1,
            reagents: vec![
                Reagent {
                    item: VIAL,
                    quantity: 1,
                },
                Reagent {
                    item: BLOSSOM,
                    quantity: 2,
                },
            ],
        }
    }

    fn sample_names() -> NameTable {
        let mut names = NameTable::new();
        names.insert(VIAL, "Rune-Etched Vial".to_string());
        names.insert(BLOSSOM, "Death Blossom".to_string());
        names.insert(POTION, "Spiritual Healing Potion".to_string());
        names
    }

    #[test]
    fn worked_example_costs_and_renders() {
        // Vendor vial at 50c, auctioned blossom at 417c, no auction entry
        // for the potion itself.
        let mut prices = PriceTable::new();
        prices.insert(VIAL, PriceSource::Vendor, Money(50));
        prices.insert(BLOSSOM, PriceSource::AuctionHouse, Money(417));
        let catalog = RecipeCatalog::from_recipes([potion_recipe()]);
        let overrides = HashSet::new();
        let names = sample_names();
        let mut ctx = ResolveContext::new(&prices, &catalog, &overrides);

        let reports = report(&[potion_recipe()], &mut ctx, &names);
        assert_eq!(reports.len(), 1);
        let ReportOutcome::Costed {
            price,
            total_cost,
            profit,
            reagents,
        } = &reports[0].outcome
        else {
            panic!("expected a costed report");
        };

        assert_eq!(*total_cost, Money(884));
        assert_eq!(total_cost.to_string(), "8s, 84c");
        assert_eq!(*price, None);
        assert_eq!(*profit, None);

        assert_eq!(reagents[0].name, "Rune-Etched Vial");
        assert_eq!(reagents[0].unit_price, Money(50));
        assert_eq!(reagents[0].subtotal, Money(50));
        assert_eq!(reagents[0].source, "from Vendor");
        assert_eq!(reagents[1].name, "Death Blossom");
        assert_eq!(reagents[1].quantity, 2);
        assert_eq!(reagents[1].subtotal, Money(834));
        assert_eq!(reagents[1].source, "from Auction House");

        let rendered = render_report(&reports[0], &names);
        assert!(rendered.starts_with(
            "Spiritual Healing Potion (Shadowlands Alchemy): no auction price, costs: 8s, 84c"
        ));
        assert!(rendered.contains("  Rune-Etched Vial: 50c x1 = 50c (from Vendor)"));
        assert!(rendered.contains("  Death Blossom: 4s, 17c x2 = 8s, 34c (from Auction House)"));
    }

    #[test]
    fn profit_against_auction_sell_price() {
        let mut prices = PriceTable::new();
        prices.insert(VIAL, PriceSource::Vendor, Money(50));
        prices.insert(BLOSSOM, PriceSource::AuctionHouse, Money(417));
        prices.insert(POTION, PriceSource::AuctionHouse, Money(1250));
        let catalog = RecipeCatalog::from_recipes([potion_recipe()]);
        let overrides = HashSet::new();
        let names = sample_names();
        let mut ctx = ResolveContext::new(&prices, &catalog, &overrides);

        let reports = report(&[potion_recipe()], &mut ctx, &names);
        let ReportOutcome::Costed { price, profit, .. } = &reports[0].outcome else {
            panic!("expected a costed report");
        };
        assert_eq!(*price, Some(Money(1250)));
        assert_eq!(*profit, Some(Money(366)));
    }

    #[test]
    fn crafted_reagent_is_tagged_one_level_deep() {
        // A flask whose reagent is the potion, itself crafted.
        let flask = ItemId(1005);
        let flask_recipe = Recipe {
            id: 11,
            name: "Spectral Flask".to_string(),
            profession: "Shadowlands Alchemy".to_string(),
            rank: None,
            crafted_item: flask,
            crafted_quantity: 1,
            reagents: vec![Reagent {
                item: POTION,
                quantity: 2,
            }],
        };
        let mut prices = PriceTable::new();
        prices.insert(VIAL, PriceSource::Vendor, Money(50));
        prices.insert(BLOSSOM, PriceSource::AuctionHouse, Money(417));
        let catalog = RecipeCatalog::from_recipes([potion_recipe(), flask_recipe.clone()]);
        let overrides = HashSet::new();
        let mut names = sample_names();
        names.insert(flask, "Spectral Flask".to_string());
        let mut ctx = ResolveContext::new(&prices, &catalog, &overrides);

        let reports = report(&[flask_recipe], &mut ctx, &names);
        let ReportOutcome::Costed { reagents, total_cost, .. } = &reports[0].outcome else {
            panic!("expected a costed report");
        };
        assert_eq!(*total_cost, Money(1768));
        assert_eq!(reagents[0].source, "from Crafting: Spiritual Healing Potion");
        // Crafted unit price rounds the batch total up per unit.
        assert_eq!(reagents[0].unit_price, Money(884));
    }

    #[test]
    fn unresolvable_recipe_does_not_abort_siblings() {
        let mut prices = PriceTable::new();
        prices.insert(VIAL, PriceSource::Vendor, Money(50));
        prices.insert(BLOSSOM, PriceSource::AuctionHouse, Money(417));
        let broken = Recipe {
            id: 12,
            name: "Murky Elixir".to_string(),
            profession: "Shadowlands Alchemy".to_string(),
            rank: None,
            crafted_item: ItemId(1006),
            crafted_quantity: 1,
            reagents: vec![Reagent {
                item: ItemId(9999),
                quantity: 1,
            }],
        };
        let catalog = RecipeCatalog::from_recipes([potion_recipe(), broken.clone()]);
        let overrides = HashSet::new();
        let names = sample_names();
        let mut ctx = ResolveContext::new(&prices, &catalog, &overrides);

        let reports = report(&[broken, potion_recipe()], &mut ctx, &names);
        assert_eq!(
            reports[0].outcome,
            ReportOutcome::Unresolvable {
                reagent: ItemId(9999),
                error: ResolveError::NoSource(ItemId(9999)),
            }
        );
        assert!(matches!(reports[1].outcome, ReportOutcome::Costed { .. }));

        let rendered = render_report(&reports[0], &names);
        assert!(rendered.contains("unresolvable"));
        assert!(rendered.contains("item 9999"));
    }

    #[test]
    fn reports_sort_by_profit_with_failures_last() {
        fn costed(name: &str, profit: Option<Money>) -> RecipeReport {
            RecipeReport {
                recipe_id: 0,
                recipe_name: name.to_string(),
                profession: String::new(),
                item_name: name.to_string(),
                outcome: ReportOutcome::Costed {
                    price: profit.map(|_| Money(100)),
                    total_cost: Money(100),
                    profit,
                    reagents: Vec::new(),
                },
            }
        }
        let failed = RecipeReport {
            recipe_id: 0,
            recipe_name: "d".to_string(),
            profession: String::new(),
            item_name: "d".to_string(),
            outcome: ReportOutcome::Unresolvable {
                reagent: ItemId(2),
                error: ResolveError::NoSource(ItemId(2)),
            },
        };
        let mut reports = vec![
            costed("a", Some(Money(-5))),
            failed,
            costed("b", None),
            costed("c", Some(Money(300))),
        ];
        sort_reports(&mut reports);
        let order: Vec<&str> = reports.iter().map(|r| r.recipe_name.as_str()).collect();
        assert_eq!(order, ["c", "a", "b", "d"]);
    }
}
