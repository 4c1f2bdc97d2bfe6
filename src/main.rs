//! Crafting cost and auction profit calculator
//!
//! Downloads game data and auction snapshots, then compares the auction
//! price of craftable items against the cheapest way to obtain their
//! reagents, recursively.

mod api;
mod calculator;
mod config;
mod db;
mod models;
mod money;
mod report;

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use reqwest::StatusCode;
use rusqlite::Connection;

use crate::api::{ApiClient, ApiError};
use crate::calculator::{RecipeCatalog, ResolveContext};
use crate::config::Config;
use crate::models::{
    assign_ranks, AuctionEntry, Item, ItemId, ItemQuality, NameTable, Profession,
    ProfessionTier, Reagent, Recipe,
};
use crate::money::Money;

#[derive(Parser)]
#[command(name = "tradecraft")]
#[command(about = "Crafting cost and auction profit calculator for World of Warcraft")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Path to the SQLite database (default: data/<region>.<language>.db)
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download game data and the auction snapshot
    Update {
        #[command(subcommand)]
        target: Option<UpdateTarget>,
    },

    /// Compare crafting costs against auction prices
    Profit(ProfitArgs),

    /// Search auctioned items by name
    Search {
        /// Keywords the item name must contain, in the configured language
        #[arg(required = true)]
        keywords: Vec<String>,
    },

    /// List downloaded professions and their skill tiers
    ListProfessions,

    /// List downloaded realms and their slugs
    ListRealms,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Load a small built-in data set for trying the calculator offline
    LoadSample,
}

#[derive(Subcommand)]
enum UpdateTarget {
    /// Update realms, professions, recipes, items, and auctions (default)
    All {
        /// Professions to load recipes for
        #[arg(long, value_enum, default_value_t = ProfessionSelection::Config)]
        professions: ProfessionSelection,
    },

    /// Update the realm list
    Realms,

    /// Update the profession list
    Professions,

    /// Update recipes for the selected professions
    Recipes {
        /// Professions to load recipes for
        #[arg(long, value_enum, default_value_t = ProfessionSelection::Config)]
        professions: ProfessionSelection,
    },

    /// Update items referenced by the stored recipes
    Items,

    /// Update the auction snapshot for the configured realm
    Auctions,
}

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq)]
enum ProfessionSelection {
    /// Every downloaded profession skill tier
    All,
    /// The data.professions list from the configuration
    Config,
}

#[derive(Args)]
struct ProfitArgs {
    /// Profession skill tiers to craft with (default: data.professions
    /// from the configuration; all professions when neither is set)
    #[arg(short = 'p', long = "profession")]
    professions: Vec<String>,

    /// Only report recipes whose crafted item name contains this term
    #[arg(short, long)]
    search: Option<String>,

    /// Extra vendor-purchasable item ids for this run
    #[arg(long = "vendor-item")]
    vendor_items: Vec<u32>,

    /// Extra always-buy item ids for this run
    #[arg(long = "buy-item")]
    buy_items: Vec<u32>,

    /// Refresh the auction snapshot before reporting
    #[arg(short, long)]
    update: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize the configuration, prompting for missing values
    Init {
        #[arg(short, long)]
        region: Option<String>,
        #[arg(short = 's', long)]
        realm: Option<String>,
        #[arg(short, long)]
        language: Option<String>,
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        client_secret: Option<String>,
    },

    /// Print the value of a property
    Get { key: String },

    /// Set the value of a property
    Set { key: String, value: String },

    /// Add or remove profession skill tiers, by name, from data.professions
    Professions {
        #[arg(value_enum)]
        action: ListAction,
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Add or remove vendor-purchasable items, by name, from data.vendor_items
    VendorItems {
        #[arg(value_enum)]
        action: ListAction,
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Add or remove always-buy items, by name, from data.buy_items
    BuyItems {
        #[arg(value_enum)]
        action: ListAction,
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq)]
enum ListAction {
    Add,
    Remove,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let config_path = cli.config;
    let database = cli.database;

    match cli.command {
        Commands::Update { target } => {
            config.validate()?;
            let mut conn = open_database(database.as_deref(), &config)?;
            let api = ApiClient::connect(&config)?;
            let target = target.unwrap_or(UpdateTarget::All {
                professions: ProfessionSelection::Config,
            });
            handle_update(&mut conn, &api, &config, target)
        }

        Commands::Profit(args) => {
            let mut conn = open_database(database.as_deref(), &config)?;
            if args.update {
                config.validate()?;
                let api = ApiClient::connect(&config)?;
                update_auctions(&mut conn, &api, &config)?;
            }
            handle_profit(&conn, &config, &args)
        }

        Commands::Search { keywords } => {
            let conn = open_database(database.as_deref(), &config)?;
            handle_search(&conn, &config, &keywords)
        }

        Commands::ListProfessions => {
            let conn = open_database(database.as_deref(), &config)?;
            handle_list_professions(&conn)
        }

        Commands::ListRealms => {
            let conn = open_database(database.as_deref(), &config)?;
            handle_list_realms(&conn)
        }

        Commands::Config { action } => {
            handle_config(&config_path, database.as_deref(), config, action)
        }

        Commands::LoadSample => {
            let mut conn = open_database(database.as_deref(), &config)?;
            handle_load_sample(&mut conn, &config)
        }
    }
}

fn open_database(database: Option<&Path>, config: &Config) -> Result<Connection> {
    let path = database
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.database_path());
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let conn = Connection::open(&path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    db::init_schema(&conn)?;
    Ok(conn)
}

/// Realm slug auction snapshots are stored under; the sample data set
/// works without a configured realm.
fn active_realm(config: &Config) -> String {
    if config.server.realm.is_empty() {
        "sample".to_string()
    } else {
        config.server.realm.clone()
    }
}

fn handle_update(
    conn: &mut Connection,
    api: &ApiClient,
    config: &Config,
    target: UpdateTarget,
) -> Result<()> {
    match target {
        UpdateTarget::Realms => update_realms(conn, api),
        UpdateTarget::Professions => update_professions(conn, api),
        UpdateTarget::Recipes { professions } => update_recipes(conn, api, config, professions),
        UpdateTarget::Items => update_items(conn, api),
        UpdateTarget::Auctions => update_auctions(conn, api, config),
        UpdateTarget::All { professions } => {
            update_realms(conn, api)?;
            update_professions(conn, api)?;
            update_recipes(conn, api, config, professions)?;
            update_items(conn, api)?;
            update_auctions(conn, api, config)
        }
    }
}

fn update_realms(conn: &Connection, api: &ApiClient) -> Result<()> {
    info!("updating realms...");
    let realms = api.realms()?;
    db::replace_realms(conn, &realms)?;
    info!("stored {} connected realms", realms.len());
    Ok(())
}

fn update_professions(conn: &Connection, api: &ApiClient) -> Result<()> {
    info!("updating professions...");
    let professions = api.professions()?;
    for profession in &professions {
        db::upsert_profession(conn, profession)?;
    }
    info!("stored {} professions", professions.len());
    Ok(())
}

/// Profession tiers the recipe download covers.
fn selected_tiers(
    professions: &[Profession],
    selection: ProfessionSelection,
    config: &Config,
) -> Vec<(Profession, ProfessionTier)> {
    let mut pairs = Vec::new();
    for profession in professions {
        for tier in &profession.tiers {
            let wanted = match selection {
                ProfessionSelection::All => true,
                ProfessionSelection::Config => config
                    .data
                    .professions
                    .iter()
                    .any(|name| name == &tier.name),
            };
            if wanted {
                pairs.push((profession.clone(), tier.clone()));
            }
        }
    }
    pairs
}

fn update_recipes(
    conn: &Connection,
    api: &ApiClient,
    config: &Config,
    selection: ProfessionSelection,
) -> Result<()> {
    let professions = db::load_professions(conn)?;
    if professions.is_empty() {
        bail!("no professions in the database, run `tradecraft update professions` first");
    }
    let tiers = selected_tiers(&professions, selection, config);
    if tiers.is_empty() {
        bail!(
            "no profession tiers selected; configure data.professions or pass --professions all"
        );
    }

    let mut recipes = Vec::new();
    for (profession, tier) in &tiers {
        info!("downloading recipes for {}...", tier.name);
        recipes.extend(api.recipes(profession, tier)?);
    }
    assign_ranks(&mut recipes);

    db::clear_recipes(conn)?;
    for recipe in &recipes {
        db::insert_recipe(conn, recipe)?;
    }
    info!("stored {} recipes", recipes.len());
    Ok(())
}

fn update_items(conn: &Connection, api: &ApiClient) -> Result<()> {
    let recipes = db::load_recipes(conn)?;
    if recipes.is_empty() {
        bail!("no recipes in the database, run `tradecraft update recipes` first");
    }

    let mut wanted: BTreeSet<ItemId> = BTreeSet::new();
    for recipe in &recipes {
        wanted.insert(recipe.crafted_item);
        wanted.extend(recipe.reagents.iter().map(|reagent| reagent.item));
    }

    info!("updating {} items...", wanted.len());
    db::clear_items(conn)?;
    let mut stored = 0;
    for id in wanted {
        match api.item(id) {
            Ok(item) => {
                db::upsert_item(conn, &item)?;
                stored += 1;
            }
            Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                warn!("item {} not found, skipping", id);
            }
            Err(err) => return Err(err.into()),
        }
    }
    info!("stored {} items", stored);
    Ok(())
}

fn update_auctions(conn: &mut Connection, api: &ApiClient, config: &Config) -> Result<()> {
    let realm = active_realm(config);
    let connected = db::find_realm(conn, &realm)?.with_context(|| {
        format!(
            "realm {:?} not found, run `tradecraft update realms` first",
            realm
        )
    })?;

    info!("updating auctions for {}...", realm);
    let entries = api.auctions(connected)?;
    db::replace_auctions(conn, &realm, &entries)?;
    info!("stored {} auction entries", entries.len());
    Ok(())
}

/// Split stored recipes into the craftable catalog (profession-filtered)
/// and the report targets (additionally name-filtered). Matching is exact
/// and case-sensitive in the configured locale.
fn select_recipes(
    recipes: Vec<Recipe>,
    professions: &[String],
    search: Option<&str>,
    names: &NameTable,
) -> (Vec<Recipe>, Vec<Recipe>) {
    let catalog: Vec<Recipe> = if professions.is_empty() {
        recipes
    } else {
        recipes
            .into_iter()
            .filter(|recipe| professions.iter().any(|name| name == &recipe.profession))
            .collect()
    };
    let targets = catalog
        .iter()
        .filter(|recipe| match search {
            Some(term) => names.display(recipe.crafted_item).contains(term),
            None => true,
        })
        .cloned()
        .collect();
    (catalog, targets)
}

fn handle_profit(conn: &Connection, config: &Config, args: &ProfitArgs) -> Result<()> {
    let recipes = db::load_recipes(conn)?;
    if recipes.is_empty() {
        bail!("no recipes in the database, run `tradecraft update` or `tradecraft load-sample` first");
    }
    let names = db::load_name_table(conn)?;

    let professions = if args.professions.is_empty() {
        config.data.professions.clone()
    } else {
        args.professions.clone()
    };
    let (catalog_recipes, targets) =
        select_recipes(recipes, &professions, args.search.as_deref(), &names);
    if targets.is_empty() {
        bail!("no recipes match the selection");
    }

    let vendor_items: HashSet<ItemId> = config
        .vendor_items()
        .chain(args.vendor_items.iter().copied().map(ItemId))
        .collect();
    let overrides: HashSet<ItemId> = config
        .buy_items()
        .chain(args.buy_items.iter().copied().map(ItemId))
        .collect();

    let prices = db::build_price_table(conn, &active_realm(config), &vendor_items)?;
    let catalog = RecipeCatalog::from_recipes(catalog_recipes);
    let mut ctx = ResolveContext::new(&prices, &catalog, &overrides);

    let mut reports = report::report(&targets, &mut ctx, &names);
    debug!(
        "{} reports from {} item resolutions",
        reports.len(),
        ctx.resolutions()
    );
    report::sort_reports(&mut reports);
    for recipe_report in &reports {
        println!("{}", report::render_report(recipe_report, &names));
    }
    Ok(())
}

fn handle_search(conn: &Connection, config: &Config, keywords: &[String]) -> Result<()> {
    let items = db::load_items(conn)?;
    let prices = db::min_auction_prices(conn, &active_realm(config))?;
    let mut found = false;
    for item in &items {
        if !keywords.iter().all(|keyword| item.name.contains(keyword)) {
            continue;
        }
        let Some((_, price)) = prices.iter().find(|(id, _)| *id == item.id) else {
            continue;
        };
        println!("{} [{}]: {}", item.name, item.quality.as_str(), price);
        found = true;
    }
    if !found {
        println!("No auctioned items match.");
    }
    Ok(())
}

fn handle_list_professions(conn: &Connection) -> Result<()> {
    let professions = db::load_professions(conn)?;
    if professions.is_empty() {
        println!("No professions in the database. Run 'update professions' first.");
        return Ok(());
    }
    for profession in professions {
        println!("{}", profession.name);
        for tier in profession.tiers {
            println!("  {}", tier.name);
        }
    }
    Ok(())
}

fn handle_list_realms(conn: &Connection) -> Result<()> {
    let realms = db::load_realms(conn)?;
    if realms.is_empty() {
        println!("No realms in the database. Run 'update realms' first.");
        return Ok(());
    }
    for realm in realms {
        println!("{:<30} {}", realm.name, realm.slug);
    }
    Ok(())
}

fn handle_config(
    config_path: &Path,
    database: Option<&Path>,
    mut config: Config,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Init {
            region,
            realm,
            language,
            client_id,
            client_secret,
        } => {
            config.server.region = match region {
                Some(region) if config::valid_region(&region) => region,
                Some(region) => bail!("invalid region {:?}", region),
                None => prompt_validated("Server region (default: us)", "us", config::valid_region)?,
            };
            config.data.language = match language {
                Some(language) if config::valid_language(&language) => language,
                Some(language) => bail!("invalid language locale {:?}", language),
                None => prompt_validated(
                    "Data language (default: en_US)",
                    "en_US",
                    config::valid_language,
                )?,
            };
            config.server.realm = match realm {
                Some(realm) => realm,
                None => prompt("Realm slug")?,
            };
            config.client.id = match client_id {
                Some(id) => id,
                None => prompt("API client ID")?,
            };
            config.client.secret = match client_secret {
                Some(secret) => secret,
                None => prompt("API client secret")?,
            };
            config.store(config_path)?;
            println!("Configuration written to {}", config_path.display());
        }

        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => bail!("no value stored for {}", key),
        },

        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.store(config_path)?;
        }

        ConfigAction::Professions { action, names } => {
            let conn = open_database(database, &config)?;
            let professions = db::load_professions(&conn)?;
            let known: HashSet<&str> = professions
                .iter()
                .flat_map(|profession| profession.tiers.iter())
                .map(|tier| tier.name.as_str())
                .collect();
            for name in names {
                match action {
                    ListAction::Add => {
                        if !known.contains(name.as_str()) {
                            warn!("can't find profession {:?}, skipping", name);
                        } else if !config.data.professions.contains(&name) {
                            config.data.professions.push(name);
                        }
                    }
                    ListAction::Remove => {
                        config.data.professions.retain(|entry| entry != &name);
                    }
                }
            }
            config.store(config_path)?;
        }

        ConfigAction::VendorItems { action, names } => {
            update_item_list(config_path, database, &mut config, action, names, ItemList::Vendor)?;
        }

        ConfigAction::BuyItems { action, names } => {
            update_item_list(config_path, database, &mut config, action, names, ItemList::Buy)?;
        }
    }
    Ok(())
}

enum ItemList {
    Vendor,
    Buy,
}

/// Resolve item names against the downloaded catalog and edit one of the
/// configured id lists.
fn update_item_list(
    config_path: &Path,
    database: Option<&Path>,
    config: &mut Config,
    action: ListAction,
    names: Vec<String>,
    list: ItemList,
) -> Result<()> {
    let conn = open_database(database, config)?;
    let name_table = db::load_name_table(&conn)?;
    let mut resolved = Vec::new();
    for name in names {
        match name_table.find(&name) {
            Some(id) => resolved.push(id),
            None => warn!("can't find item {:?}, skipping", name),
        }
    }

    let ids = match list {
        ItemList::Vendor => &mut config.data.vendor_items,
        ItemList::Buy => &mut config.data.buy_items,
    };
    for id in resolved {
        match action {
            ListAction::Add => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            ListAction::Remove => ids.retain(|entry| *entry != id),
        }
    }
    config.store(config_path)?;
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_validated(
    label: &str,
    default: &str,
    valid: impl Fn(&str) -> bool,
) -> Result<String> {
    loop {
        let mut value = prompt(label)?;
        if value.is_empty() {
            value = default.to_string();
        }
        if valid(&value) {
            return Ok(value);
        }
        println!("Invalid value, try again");
    }
}

fn handle_load_sample(conn: &mut Connection, config: &Config) -> Result<()> {
    let realm = active_realm(config);
    load_sample_data(conn, &realm)?;
    println!("Sample data loaded for realm {:?}.", realm);
    println!("Try: tradecraft profit --vendor-item 1001");
    println!(
        "The Rune-Etched Vial (1001) is vendor-purchasable; curate it permanently with \
         `tradecraft config vendor-items add \"Rune-Etched Vial\"`."
    );
    Ok(())
}

/// Load a small alchemy data set for testing without API credentials
fn load_sample_data(conn: &mut Connection, realm: &str) -> Result<()> {
    db::clear_recipes(conn)?;
    db::clear_items(conn)?;

    let items = [
        Item {
            id: ItemId(1001),
            name: "Rune-Etched Vial".to_string(),
            quality: ItemQuality::Common,
            vendor_price: Some(Money(50)),
        },
        Item {
            id: ItemId(1002),
            name: "Death Blossom".to_string(),
            quality: ItemQuality::Common,
            vendor_price: None,
        },
        Item {
            id: ItemId(1003),
            name: "Spiritual Healing Potion".to_string(),
            quality: ItemQuality::Uncommon,
            vendor_price: None,
        },
        Item {
            id: ItemId(1004),
            name: "Nightshade".to_string(),
            quality: ItemQuality::Rare,
            vendor_price: None,
        },
        Item {
            id: ItemId(1005),
            name: "Spectral Flask of Power".to_string(),
            quality: ItemQuality::Rare,
            vendor_price: None,
        },
    ];
    for item in &items {
        db::upsert_item(conn, item)?;
    }

    // Spiritual Healing Potion: vial + 2x blossom
    db::insert_recipe(
        conn,
        &Recipe {
            id: 10,
            name: "Spiritual Healing Potion".to_string(),
            profession: "Shadowlands Alchemy".to_string(),
            rank: None,
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
        },
    )?;

    // Spectral Flask of Power: 2x potion (cheaper crafted) + 3x nightshade
    db::insert_recipe(
        conn,
        &Recipe {
            id: 11,
            name: "Spectral Flask of Power".to_string(),
            profession: "Shadowlands Alchemy".to_string(),
            rank: None,
            crafted_item: ItemId(1005),
            crafted_quantity: 1,
            reagents: vec![
                Reagent {
                    item: ItemId(1003),
                    quantity: 2,
                },
                Reagent {
                    item: ItemId(1004),
                    quantity: 3,
                },
            ],
        },
    )?;

    let auctions = [
        AuctionEntry {
            item: ItemId(1001),
            unit_price: Money(80),
            quantity: 120,
        },
        AuctionEntry {
            item: ItemId(1002),
            unit_price: Money(417),
            quantity: 200,
        },
        AuctionEntry {
            item: ItemId(1003),
            unit_price: Money(1250),
            quantity: 40,
        },
        AuctionEntry {
            item: ItemId(1004),
            unit_price: Money(2000),
            quantity: 75,
        },
        AuctionEntry {
            item: ItemId(1005),
            unit_price: Money(15000),
            quantity: 10,
        },
    ];
    db::replace_auctions(conn, realm, &auctions)?;

    println!("Loaded {} sample items", items.len());
    Ok(())
}
