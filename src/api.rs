//! Blizzard game-data API client
//!
//! Downloads realms, professions, recipes, items, and auction snapshots.
//! Everything returned here is already normalized into the crate's models;
//! the calculator never sees wire formats.

use std::time::Duration;

use log::warn;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;
use crate::models::{
    AuctionEntry, ConnectedRealm, Item, ItemId, ItemQuality, Profession, ProfessionTier, Realm,
    Reagent, Recipe,
};
use crate::money::Money;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("api credentials missing, run `tradecraft config init` first")]
    MissingCredentials,
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {status} from {url}")]
    Status { status: StatusCode, url: String },
    #[error("malformed payload from {url}: {detail}")]
    Payload { url: String, detail: String },
}

#[derive(Debug, Clone, Copy)]
enum Namespace {
    Static,
    Dynamic,
}

impl Namespace {
    fn as_str(self) -> &'static str {
        match self {
            Namespace::Static => "static",
            Namespace::Dynamic => "dynamic",
        }
    }
}

pub struct ApiClient {
    http: Client,
    region: String,
    locale: String,
    token: String,
}

impl ApiClient {
    /// Build the client and fetch an OAuth2 client-credentials token.
    pub fn connect(config: &Config) -> Result<ApiClient, ApiError> {
        if config.client.id.is_empty() || config.client.secret.is_empty() {
            return Err(ApiError::MissingCredentials);
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(ApiError::ClientBuild)?;

        let url = format!("https://{}.battle.net/oauth/token", config.server.region);
        let response = http
            .post(&url)
            .basic_auth(&config.client.id, Some(&config.client.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        if response.status() != StatusCode::OK {
            return Err(ApiError::Status {
                status: response.status(),
                url,
            });
        }
        let token: TokenResponse = response.json().map_err(|err| ApiError::Payload {
            url: url.clone(),
            detail: err.to_string(),
        })?;

        Ok(ApiClient {
            http,
            region: config.server.region.clone(),
            locale: config.data.language.clone(),
            token: token.access_token,
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        namespace: Namespace,
    ) -> Result<T, ApiError> {
        let url = format!("https://{}.api.blizzard.com{}", self.region, path);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("namespace", format!("{}-{}", namespace.as_str(), self.region)),
                ("locale", self.locale.clone()),
                ("access_token", self.token.clone()),
            ])
            .send()
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        if response.status() != StatusCode::OK {
            return Err(ApiError::Status {
                status: response.status(),
                url,
            });
        }
        response.json().map_err(|err| ApiError::Payload {
            url,
            detail: err.to_string(),
        })
    }

    /// Connected realm list with member realm names and slugs.
    pub fn realms(&self) -> Result<Vec<ConnectedRealm>, ApiError> {
        let index: RealmIndexResponse =
            self.get_json("/data/wow/connected-realm/index", Namespace::Dynamic)?;

        let mut realms = Vec::with_capacity(index.connected_realms.len());
        for link in &index.connected_realms {
            let Some(id) = parse_connected_realm_id(&link.href) else {
                warn!("skipping unrecognized connected realm link {}", link.href);
                continue;
            };
            let detail: ConnectedRealmResponse = self.get_json(
                &format!("/data/wow/connected-realm/{}", id),
                Namespace::Dynamic,
            )?;
            realms.push(ConnectedRealm {
                id,
                realms: detail
                    .realms
                    .into_iter()
                    .map(|realm| Realm {
                        id: realm.id,
                        name: realm.name,
                        slug: realm.slug,
                    })
                    .collect(),
            });
        }
        Ok(realms)
    }

    /// Profession list with skill tiers.
    pub fn professions(&self) -> Result<Vec<Profession>, ApiError> {
        let index: ProfessionIndexResponse =
            self.get_json("/data/wow/profession/index", Namespace::Static)?;

        let mut professions = Vec::with_capacity(index.professions.len());
        for entry in index.professions {
            let detail: ProfessionResponse = self.get_json(
                &format!("/data/wow/profession/{}", entry.id),
                Namespace::Static,
            )?;
            professions.push(Profession {
                id: entry.id,
                name: entry.name,
                tiers: detail
                    .skill_tiers
                    .into_iter()
                    .map(|tier| ProfessionTier {
                        id: tier.id,
                        name: tier.name,
                    })
                    .collect(),
            });
        }
        Ok(professions)
    }

    /// All recipes of one profession skill tier. Recipes that craft nothing
    /// concrete (enchants applied to gear) are skipped.
    pub fn recipes(
        &self,
        profession: &Profession,
        tier: &ProfessionTier,
    ) -> Result<Vec<Recipe>, ApiError> {
        let listing: SkillTierResponse = self.get_json(
            &format!(
                "/data/wow/profession/{}/skill-tier/{}",
                profession.id, tier.id
            ),
            Namespace::Static,
        )?;

        let mut recipes = Vec::new();
        for category in listing.categories {
            for entry in category.recipes {
                let detail: RecipeResponse = self
                    .get_json(&format!("/data/wow/recipe/{}", entry.id), Namespace::Static)?;
                let Some(crafted) = detail.crafted_item else {
                    warn!("recipe {} ({}) crafts no item, skipping", detail.id, detail.name);
                    continue;
                };
                let crafted_quantity = detail
                    .crafted_quantity
                    .map(|q| q.value.max(1.0) as u32)
                    .unwrap_or(1);
                recipes.push(Recipe {
                    id: detail.id,
                    name: detail.name,
                    profession: tier.name.clone(),
                    rank: None,
                    crafted_item: ItemId(crafted.id),
                    crafted_quantity,
                    reagents: detail
                        .reagents
                        .into_iter()
                        .map(|reagent| Reagent {
                            item: ItemId(reagent.reagent.id),
                            quantity: reagent.quantity,
                        })
                        .collect(),
                });
            }
        }
        Ok(recipes)
    }

    /// Item detail in the configured locale.
    pub fn item(&self, id: ItemId) -> Result<Item, ApiError> {
        let detail: ItemResponse =
            self.get_json(&format!("/data/wow/item/{}", id), Namespace::Static)?;
        let quality = ItemQuality::parse(&detail.quality.kind).unwrap_or_else(|| {
            warn!(
                "item {} has unknown quality {:?}, treating as common",
                detail.id, detail.quality.kind
            );
            ItemQuality::Common
        });
        Ok(Item {
            id: ItemId(detail.id),
            name: detail.name,
            quality,
            vendor_price: detail.purchase_price.filter(|price| price.0 > 0),
        })
    }

    /// Commodity auction snapshot for a connected realm, normalized to
    /// unit prices.
    pub fn auctions(&self, connected_realm: u32) -> Result<Vec<AuctionEntry>, ApiError> {
        let snapshot: AuctionsResponse = self.get_json(
            &format!("/data/wow/connected-realm/{}/auctions", connected_realm),
            Namespace::Dynamic,
        )?;

        let mut entries = Vec::with_capacity(snapshot.auctions.len());
        for row in snapshot.auctions {
            let Some(unit_price) = lot_unit_price(&row) else {
                continue; // bid-only listing, no buyout to price against
            };
            entries.push(AuctionEntry {
                item: ItemId(row.item.id),
                unit_price,
                quantity: row.quantity,
            });
        }
        Ok(entries)
    }
}

/// Connected realm ids only appear inside the index's href links.
fn parse_connected_realm_id(href: &str) -> Option<u32> {
    let pattern = Regex::new(r"/data/wow/connected-realm/(\d+)").expect("static href pattern");
    pattern
        .captures(href)
        .and_then(|caps| caps[1].parse().ok())
}

/// Unit price of one listing: commodities carry it directly, item lots
/// only a buyout for the whole stack.
fn lot_unit_price(row: &AuctionRow) -> Option<Money> {
    match (row.unit_price, row.buyout) {
        (Some(unit), _) => Some(unit),
        (None, Some(buyout)) if row.quantity > 0 => Some(Money::per_unit(buyout, row.quantity)),
        _ => None,
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Link {
    href: String,
}

#[derive(Deserialize)]
struct RealmIndexResponse {
    connected_realms: Vec<Link>,
}

#[derive(Deserialize)]
struct RealmData {
    id: u32,
    name: String,
    slug: String,
}

#[derive(Deserialize)]
struct ConnectedRealmResponse {
    realms: Vec<RealmData>,
}

#[derive(Deserialize)]
struct IdName {
    id: u32,
    name: String,
}

#[derive(Deserialize)]
struct ProfessionIndexResponse {
    professions: Vec<IdName>,
}

#[derive(Deserialize)]
struct ProfessionResponse {
    #[serde(default)]
    skill_tiers: Vec<IdName>,
}

#[derive(Deserialize)]
struct SkillTierResponse {
    #[serde(default)]
    categories: Vec<SkillTierCategory>,
}

#[derive(Deserialize)]
struct SkillTierCategory {
    #[serde(default)]
    recipes: Vec<IdName>,
}

#[derive(Deserialize)]
struct RecipeResponse {
    id: u32,
    name: String,
    crafted_item: Option<IdName>,
    crafted_quantity: Option<CraftedQuantity>,
    #[serde(default)]
    reagents: Vec<RecipeReagent>,
}

#[derive(Deserialize)]
struct CraftedQuantity {
    value: f64,
}

#[derive(Deserialize)]
struct RecipeReagent {
    reagent: IdName,
    quantity: u32,
}

#[derive(Deserialize)]
struct ItemResponse {
    id: u32,
    name: String,
    quality: QualityType,
    purchase_price: Option<Money>,
}

#[derive(Deserialize)]
struct QualityType {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct AuctionsResponse {
    #[serde(default)]
    auctions: Vec<AuctionRow>,
}

#[derive(Deserialize)]
struct AuctionRow {
    item: AuctionItemRef,
    quantity: u32,
    unit_price: Option<Money>,
    buyout: Option<Money>,
}

#[derive(Deserialize)]
struct AuctionItemRef {
    id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_realm_id_from_href() {
        assert_eq!(
            parse_connected_realm_id(
                "https://eu.api.blizzard.com/data/wow/connected-realm/509?namespace=dynamic-eu"
            ),
            Some(509)
        );
        assert_eq!(
            parse_connected_realm_id("https://eu.api.blizzard.com/data/wow/realm/509"),
            None
        );
    }

    #[test]
    fn unit_price_prefers_the_commodity_field() {
        let row = AuctionRow {
            item: AuctionItemRef { id: 1 },
            quantity: 200,
            unit_price: Some(Money(417)),
            buyout: Some(Money(999_999)),
        };
        assert_eq!(lot_unit_price(&row), Some(Money(417)));
    }

    #[test]
    fn lot_buyout_is_divided_rounding_up() {
        let row = AuctionRow {
            item: AuctionItemRef { id: 1 },
            quantity: 3,
            unit_price: None,
            buyout: Some(Money(100)),
        };
        assert_eq!(lot_unit_price(&row), Some(Money(34)));
    }

    #[test]
    fn bid_only_listings_are_skipped() {
        let row = AuctionRow {
            item: AuctionItemRef { id: 1 },
            quantity: 1,
            unit_price: None,
            buyout: None,
        };
        assert_eq!(lot_unit_price(&row), None);
    }
}
