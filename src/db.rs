//! Database schema and operations
//!
//! One SQLite database per (region, language) data set. The database is a
//! local cache of downloaded game data and auction snapshots; the
//! calculator never touches it directly and instead works on the in-memory
//! tables the loaders below produce.

use std::collections::HashSet;

use anyhow::Result;
use rusqlite::Connection;

use crate::calculator::{PriceSource, PriceTable, RecipeCatalog};
use crate::models::{
    AuctionEntry, ConnectedRealm, Item, ItemId, ItemQuality, NameTable, Profession,
    ProfessionTier, Reagent, Realm, Recipe,
};
use crate::money::Money;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Item catalog for the configured locale
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            quality TEXT NOT NULL,
            vendor_price INTEGER
        );

        -- Professions and their skill tiers
        CREATE TABLE IF NOT EXISTS professions (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS profession_tiers (
            id INTEGER PRIMARY KEY,
            profession_id INTEGER NOT NULL,
            name TEXT NOT NULL
        );

        -- Recipes keyed by the item they craft
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            profession TEXT NOT NULL,
            rank INTEGER,
            crafted_item INTEGER NOT NULL,
            crafted_quantity INTEGER NOT NULL
        );

        -- Reagent lists; position keeps the recipe order stable
        CREATE TABLE IF NOT EXISTS recipe_reagents (
            recipe_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            item_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            PRIMARY KEY (recipe_id, position)
        );

        -- Connected realms and their member realms
        CREATE TABLE IF NOT EXISTS realms (
            id INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS realm_members (
            connected_realm_id INTEGER NOT NULL,
            realm_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            PRIMARY KEY (connected_realm_id, realm_id)
        );

        -- Latest auction snapshot, one set of rows per realm slug
        CREATE TABLE IF NOT EXISTS auctions (
            realm TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            unit_price INTEGER NOT NULL,
            quantity INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recipes_crafted_item ON recipes(crafted_item);
        CREATE INDEX IF NOT EXISTS idx_recipe_reagents_recipe ON recipe_reagents(recipe_id);
        CREATE INDEX IF NOT EXISTS idx_auctions_realm_item ON auctions(realm, item_id);
        "#,
    )?;
    Ok(())
}

/// Insert or replace an item
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (id, name, quality, vendor_price)
         VALUES (?1, ?2, ?3, ?4)",
        (
            item.id.0,
            &item.name,
            item.quality.as_str(),
            item.vendor_price.map(|p| p.0),
        ),
    )?;
    Ok(())
}

/// Insert or replace a profession and its skill tiers
pub fn upsert_profession(conn: &Connection, profession: &Profession) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO professions (id, name) VALUES (?1, ?2)",
        (profession.id, &profession.name),
    )?;
    conn.execute(
        "DELETE FROM profession_tiers WHERE profession_id = ?1",
        [profession.id],
    )?;
    for tier in &profession.tiers {
        conn.execute(
            "INSERT OR REPLACE INTO profession_tiers (id, profession_id, name)
             VALUES (?1, ?2, ?3)",
            (tier.id, profession.id, &tier.name),
        )?;
    }
    Ok(())
}

/// Insert a recipe and its reagent list
pub fn insert_recipe(conn: &Connection, recipe: &Recipe) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO recipes (id, name, profession, rank, crafted_item, crafted_quantity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            recipe.id,
            &recipe.name,
            &recipe.profession,
            recipe.rank,
            recipe.crafted_item.0,
            recipe.crafted_quantity,
        ),
    )?;
    conn.execute(
        "DELETE FROM recipe_reagents WHERE recipe_id = ?1",
        [recipe.id],
    )?;
    for (position, reagent) in recipe.reagents.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_reagents (recipe_id, position, item_id, quantity)
             VALUES (?1, ?2, ?3, ?4)",
            (recipe.id, position as u32, reagent.item.0, reagent.quantity),
        )?;
    }
    Ok(())
}

/// Replace the stored connected realm list
pub fn replace_realms(conn: &Connection, realms: &[ConnectedRealm]) -> Result<()> {
    conn.execute_batch("DELETE FROM realm_members; DELETE FROM realms;")?;
    for connected in realms {
        conn.execute("INSERT INTO realms (id) VALUES (?1)", [connected.id])?;
        for realm in &connected.realms {
            conn.execute(
                "INSERT INTO realm_members (connected_realm_id, realm_id, name, slug)
                 VALUES (?1, ?2, ?3, ?4)",
                (connected.id, realm.id, &realm.name, &realm.slug),
            )?;
        }
    }
    Ok(())
}

/// Replace the auction snapshot for one realm
pub fn replace_auctions(conn: &mut Connection, realm: &str, entries: &[AuctionEntry]) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM auctions WHERE realm = ?1", [realm])?;
    for entry in entries {
        tx.execute(
            "INSERT INTO auctions (realm, item_id, unit_price, quantity)
             VALUES (?1, ?2, ?3, ?4)",
            (realm, entry.item.0, entry.unit_price.0, entry.quantity),
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Clear all recipe data (for re-download)
pub fn clear_recipes(conn: &Connection) -> Result<()> {
    conn.execute_batch("DELETE FROM recipe_reagents; DELETE FROM recipes;")?;
    Ok(())
}

/// Clear the item catalog (for re-download)
pub fn clear_items(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM items", [])?;
    Ok(())
}

/// All items, ordered by name
pub fn load_items(conn: &Connection) -> Result<Vec<Item>> {
    let mut stmt =
        conn.prepare("SELECT id, name, quality, vendor_price FROM items ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, u32>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<i64>>(3)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (id, name, quality, vendor_price) = row?;
        let quality = ItemQuality::parse(&quality)
            .ok_or_else(|| anyhow::anyhow!("unknown item quality {quality:?} for item {id}"))?;
        items.push(Item {
            id: ItemId(id),
            name,
            quality,
            vendor_price: vendor_price.map(Money),
        });
    }
    Ok(items)
}

/// Locale name table for every known item
pub fn load_name_table(conn: &Connection) -> Result<NameTable> {
    let mut stmt = conn.prepare("SELECT id, name FROM items")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut names = NameTable::new();
    for row in rows {
        let (id, name) = row?;
        names.insert(ItemId(id), name);
    }
    Ok(names)
}

/// All recipes with their reagent lists in stored order
pub fn load_recipes(conn: &Connection) -> Result<Vec<Recipe>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, profession, rank, crafted_item, crafted_quantity
         FROM recipes ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Recipe {
            id: row.get(0)?,
            name: row.get(1)?,
            profession: row.get(2)?,
            rank: row.get(3)?,
            crafted_item: ItemId(row.get(4)?),
            crafted_quantity: row.get(5)?,
            reagents: Vec::new(),
        })
    })?;

    let mut recipes = Vec::new();
    for row in rows {
        recipes.push(row?);
    }

    let mut reagent_stmt = conn.prepare(
        "SELECT item_id, quantity FROM recipe_reagents
         WHERE recipe_id = ?1 ORDER BY position",
    )?;
    for recipe in &mut recipes {
        let rows = reagent_stmt.query_map([recipe.id], |row| {
            Ok(Reagent {
                item: ItemId(row.get(0)?),
                quantity: row.get(1)?,
            })
        })?;
        for row in rows {
            recipe.reagents.push(row?);
        }
    }
    Ok(recipes)
}

/// All professions with their tiers
pub fn load_professions(conn: &Connection) -> Result<Vec<Profession>> {
    let mut stmt = conn.prepare("SELECT id, name FROM professions ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(Profession {
            id: row.get(0)?,
            name: row.get(1)?,
            tiers: Vec::new(),
        })
    })?;

    let mut professions = Vec::new();
    for row in rows {
        professions.push(row?);
    }

    let mut tier_stmt = conn.prepare(
        "SELECT id, name FROM profession_tiers WHERE profession_id = ?1 ORDER BY id",
    )?;
    for profession in &mut professions {
        let rows = tier_stmt.query_map([profession.id], |row| {
            Ok(ProfessionTier {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        for row in rows {
            profession.tiers.push(row?);
        }
    }
    Ok(professions)
}

/// Connected realm id for a realm slug
pub fn find_realm(conn: &Connection, slug: &str) -> Result<Option<u32>> {
    let mut stmt =
        conn.prepare("SELECT connected_realm_id FROM realm_members WHERE slug = ?1")?;
    let mut rows = stmt.query_map([slug], |row| row.get::<_, u32>(0))?;
    match rows.next() {
        Some(id) => Ok(Some(id?)),
        None => Ok(None),
    }
}

/// All member realms, for listings
pub fn load_realms(conn: &Connection) -> Result<Vec<Realm>> {
    let mut stmt =
        conn.prepare("SELECT realm_id, name, slug FROM realm_members ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(Realm {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
        })
    })?;

    let mut realms = Vec::new();
    for row in rows {
        realms.push(row?);
    }
    Ok(realms)
}

/// Minimum auction unit price per item in the realm's snapshot
pub fn min_auction_prices(conn: &Connection, realm: &str) -> Result<Vec<(ItemId, Money)>> {
    let mut stmt = conn.prepare(
        "SELECT item_id, MIN(unit_price) FROM auctions
         WHERE realm = ?1 GROUP BY item_id",
    )?;
    let rows = stmt.query_map([realm], |row| {
        Ok((ItemId(row.get(0)?), Money(row.get(1)?)))
    })?;

    let mut prices = Vec::new();
    for row in rows {
        prices.push(row?);
    }
    Ok(prices)
}

/// Build the price table for one run: cheapest auction price per item plus
/// vendor prices for the curated vendor-purchasable set.
pub fn build_price_table(
    conn: &Connection,
    realm: &str,
    vendor_items: &HashSet<ItemId>,
) -> Result<PriceTable> {
    let mut table = PriceTable::new();
    for (item, price) in min_auction_prices(conn, realm)? {
        table.insert(item, PriceSource::AuctionHouse, price);
    }
    for item in load_items(conn)? {
        if !vendor_items.contains(&item.id) {
            continue;
        }
        if let Some(price) = item.vendor_price {
            table.insert(item.id, PriceSource::Vendor, price);
        }
    }
    Ok(table)
}

/// Build the recipe catalog from every stored recipe
pub fn load_recipe_catalog(conn: &Connection) -> Result<RecipeCatalog> {
    Ok(RecipeCatalog::from_recipes(load_recipes(conn)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn item(id: u32, name: &str, vendor_price: Option<i64>) -> Item {
        Item {
            id: ItemId(id),
            name: name.to_string(),
            quality: ItemQuality::Common,
            vendor_price: vendor_price.map(Money),
        }
    }

    #[test]
    fn item_round_trip() {
        let conn = test_conn();
        upsert_item(&conn, &item(1001, "Rune-Etched Vial", Some(50))).unwrap();
        upsert_item(&conn, &item(1002, "Death Blossom", None)).unwrap();

        let items = load_items(&conn).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Death Blossom");
        assert_eq!(items[0].vendor_price, None);
        assert_eq!(items[1].vendor_price, Some(Money(50)));

        let names = load_name_table(&conn).unwrap();
        assert_eq!(names.find("Death Blossom"), Some(ItemId(1002)));
    }

    #[test]
    fn recipe_round_trip_preserves_reagent_order() {
        let conn = test_conn();
        let recipe = Recipe {
            id: 10,
            name: "Spiritual Healing Potion".to_string(),
            profession: "Shadowlands Alchemy".to_string(),
            rank: Some(2),
            crafted_item: ItemId(1003),
            crafted_quantity: 1,
            reagents: vec![
                Reagent {
                    item: ItemId(1001),
                    quantity: 1,
                },
                Reagent {
                    item: ItemId(1002),
                    quantity: 2,
                },
            ],
        };
        insert_recipe(&conn, &recipe).unwrap();

        let loaded = load_recipes(&conn).unwrap();
        assert_eq!(loaded, vec![recipe]);
    }

    #[test]
    fn reinserting_a_recipe_replaces_its_reagents() {
        let conn = test_conn();
        let mut recipe = Recipe {
            id: 10,
            name: "Potion".to_string(),
            profession: "Alchemy".to_string(),
            rank: None,
            crafted_item: ItemId(1),
            crafted_quantity: 1,
            reagents: vec![Reagent {
                item: ItemId(2),
                quantity: 4,
            }],
        };
        insert_recipe(&conn, &recipe).unwrap();
        recipe.reagents = vec![Reagent {
            item: ItemId(3),
            quantity: 1,
        }];
        insert_recipe(&conn, &recipe).unwrap();

        let loaded = load_recipes(&conn).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].reagents, recipe.reagents);
    }

    #[test]
    fn realm_lookup_by_slug() {
        let conn = test_conn();
        replace_realms(
            &conn,
            &[ConnectedRealm {
                id: 509,
                realms: vec![Realm {
                    id: 1,
                    name: "Silvermoon".to_string(),
                    slug: "silvermoon".to_string(),
                }],
            }],
        )
        .unwrap();

        assert_eq!(find_realm(&conn, "silvermoon").unwrap(), Some(509));
        assert_eq!(find_realm(&conn, "draenor").unwrap(), None);
    }

    #[test]
    fn price_table_takes_min_auction_and_curated_vendor() {
        let mut conn = test_conn();
        upsert_item(&conn, &item(1001, "Rune-Etched Vial", Some(50))).unwrap();
        upsert_item(&conn, &item(1002, "Death Blossom", Some(9999))).unwrap();
        replace_auctions(
            &mut conn,
            "silvermoon",
            &[
                AuctionEntry {
                    item: ItemId(1002),
                    unit_price: Money(500),
                    quantity: 20,
                },
                AuctionEntry {
                    item: ItemId(1002),
                    unit_price: Money(417),
                    quantity: 3,
                },
            ],
        )
        .unwrap();

        // Only the vial is curated as vendor-purchasable; the blossom's
        // vendor price must not leak into the table.
        let vendor_items: HashSet<ItemId> = [ItemId(1001)].into_iter().collect();
        let table = build_price_table(&conn, "silvermoon", &vendor_items).unwrap();

        assert_eq!(
            table.cheapest(ItemId(1002)).map(|e| e.unit_price),
            Some(Money(417))
        );
        assert_eq!(table.sources(ItemId(1002)).len(), 1);
        assert_eq!(
            table.cheapest(ItemId(1001)).map(|e| (e.source, e.unit_price)),
            Some((PriceSource::Vendor, Money(50)))
        );
    }

    #[test]
    fn auction_snapshot_is_replaced_per_realm() {
        let mut conn = test_conn();
        let entry = |price| AuctionEntry {
            item: ItemId(1),
            unit_price: Money(price),
            quantity: 1,
        };
        replace_auctions(&mut conn, "silvermoon", &[entry(100)]).unwrap();
        replace_auctions(&mut conn, "draenor", &[entry(70)]).unwrap();
        replace_auctions(&mut conn, "silvermoon", &[entry(90)]).unwrap();

        assert_eq!(
            min_auction_prices(&conn, "silvermoon").unwrap(),
            vec![(ItemId(1), Money(90))]
        );
        assert_eq!(
            min_auction_prices(&conn, "draenor").unwrap(),
            vec![(ItemId(1), Money(70))]
        );
    }
}
