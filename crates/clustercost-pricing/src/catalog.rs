//! Regional price catalog
//!
//! A [`PriceCatalog`] indexes the vendor list prices of one region from
//! static snapshot files under a resources directory:
//!
//! ```text
//! <resources>/compute/<region>.json.gz   on-demand compute price list
//! <resources>/service/<region>.json.gz   managed-service fee list
//! <resources>/units/rates.tsv.gz         surcharge cost per unit
//! <resources>/units/units.tsv.gz         surcharge units per instance kind
//! ```
//!
//! Every file may also be stored uncompressed (without the `.gz` suffix).
//! Missing files leave the corresponding index empty; lookups never fail.

use crate::surcharge::{self, SurchargeTable, UnitInfo};
use clustercost_core::error::{CostError, Result};
use clustercost_core::types::{InstanceKind, Region};
use clustercost_core::workload::{ServicePlan, WorkloadVariant};
use flate2::read::GzDecoder;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Hardware attributes of an instance kind (vcpu, memory, ...)
pub type HardwareSpecs = HashMap<String, String>;

static NO_SPECS: Lazy<HardwareSpecs> = Lazy::new(HashMap::new);

/// Counters collected while indexing price lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// SKUs that passed the eligibility filter
    pub eligible: usize,
    /// Eligible SKUs dropped because their instance kind already had a price
    pub duplicates: usize,
    /// SKUs dropped for a malformed body or for not resolving to exactly one price
    pub ambiguous: usize,
}

impl std::ops::AddAssign for ParseStats {
    fn add_assign(&mut self, other: Self) {
        self.eligible += other.eligible;
        self.duplicates += other.duplicates;
        self.ambiguous += other.ambiguous;
    }
}

/// Offer file envelope. SKU bodies stay untyped so that one malformed
/// entry only drops that SKU.
#[derive(Debug, Default, Deserialize)]
struct OfferFile {
    #[serde(default)]
    products: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    terms: Terms,
}

#[derive(Debug, Default, Deserialize)]
struct Product {
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct Terms {
    #[serde(rename = "OnDemand", default)]
    on_demand: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Term {
    #[serde(rename = "priceDimensions", default)]
    price_dimensions: HashMap<String, PriceDimension>,
}

#[derive(Debug, Deserialize)]
struct PriceDimension {
    #[serde(rename = "pricePerUnit", default)]
    price_per_unit: HashMap<String, String>,
}

/// Which price list an offer file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferKind {
    /// Raw compute, filtered to shared-tenancy Linux on-demand capacity
    Compute,
    /// Managed-service per-instance software fee
    Service,
}

impl OfferKind {
    /// Directory under the resources root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Service => "service",
        }
    }

    /// Offer code in the vendor's offer index
    pub fn offer_code(&self) -> &'static str {
        match self {
            Self::Compute => "AmazonEC2",
            Self::Service => "ElasticMapReduce",
        }
    }

    fn is_eligible(&self, attributes: &HashMap<String, String>) -> bool {
        let has = |key: &str, value: &str| attributes.get(key).is_some_and(|v| v == value);
        match self {
            Self::Compute => {
                has("tenancy", "Shared")
                    && has("operatingSystem", "Linux")
                    && has("operation", "RunInstances")
                    && has("capacitystatus", "Used")
            }
            Self::Service => has("softwareType", "EMR"),
        }
    }
}

/// Index built from one offer file
#[derive(Debug, Default)]
struct PriceIndex {
    prices: HashMap<InstanceKind, f64>,
    attributes: HashMap<InstanceKind, HardwareSpecs>,
    stats: ParseStats,
}

/// Resolve a SKU's on-demand terms to exactly one USD price
fn single_price(terms: Option<&serde_json::Value>) -> Option<f64> {
    let terms = HashMap::<String, Term>::deserialize(terms?).ok()?;
    if terms.len() != 1 {
        return None;
    }
    let term = terms.values().next()?;
    if term.price_dimensions.len() != 1 {
        return None;
    }
    let dimension = term.price_dimensions.values().next()?;
    dimension.price_per_unit.get("USD")?.parse::<f64>().ok()
}

fn index_offer_file(offer: OfferFile, kind: OfferKind, source: &Path) -> PriceIndex {
    let mut index = PriceIndex::default();

    for (sku, raw) in offer.products {
        let product = match Product::deserialize(&raw) {
            Ok(product) => product,
            Err(e) => {
                warn!(
                    "Skipping malformed product {} in {}: {}",
                    sku,
                    source.display(),
                    e
                );
                index.stats.ambiguous += 1;
                continue;
            }
        };
        if !kind.is_eligible(&product.attributes) {
            continue;
        }
        let Some(instance_type) = product.attributes.get("instanceType") else {
            continue;
        };
        let instance_kind = InstanceKind::new(instance_type.as_str());
        index.stats.eligible += 1;

        let Some(price) = single_price(offer.terms.on_demand.get(&sku)) else {
            warn!(
                "SKU {} for {} in {} does not resolve to exactly one price",
                sku,
                instance_kind,
                source.display()
            );
            index.stats.ambiguous += 1;
            continue;
        };

        if index.prices.contains_key(&instance_kind) {
            warn!(
                "Price for {} from {} already added, skipping SKU {}",
                instance_kind,
                source.display(),
                sku
            );
            index.stats.duplicates += 1;
            continue;
        }

        if kind == OfferKind::Compute {
            index
                .attributes
                .insert(instance_kind.clone(), product.attributes);
        }
        index.prices.insert(instance_kind, price);
    }

    index
}

/// Read `path`, preferring a gzip-compressed `<path>.gz` sibling.
///
/// Returns `Ok(None)` when neither file exists.
pub fn read_resource(path: &Path) -> Result<Option<String>> {
    let gz_path = gz_variant(path);
    if gz_path.exists() {
        let file = std::fs::File::open(&gz_path)?;
        let mut content = String::new();
        GzDecoder::new(file)
            .read_to_string(&mut content)
            .map_err(|e| CostError::Parse {
                file: gz_path.clone(),
                error: e.to_string(),
            })?;
        return Ok(Some(content));
    }
    if path.exists() {
        return Ok(Some(std::fs::read_to_string(path)?));
    }
    Ok(None)
}

fn gz_variant(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Path of a region's offer file (without the `.gz` suffix)
pub fn offer_path(resources: &Path, kind: OfferKind, region: &Region) -> PathBuf {
    resources
        .join(kind.dir_name())
        .join(format!("{}.json", region.as_str()))
}

fn load_offer(resources: &Path, kind: OfferKind, region: &Region) -> Result<PriceIndex> {
    let path = offer_path(resources, kind, region);
    let Some(content) = read_resource(&path)? else {
        warn!(
            "{} price list for region {} at {} missing, run `clustercost fetch-prices`",
            kind.offer_code(),
            region,
            path.display()
        );
        return Ok(PriceIndex::default());
    };

    let offer: OfferFile = serde_json::from_str(&content).map_err(|e| CostError::Parse {
        file: path.clone(),
        error: e.to_string(),
    })?;
    let index = index_offer_file(offer, kind, &path);
    debug!(
        "Indexed {} prices from {} ({} eligible, {} duplicate, {} ambiguous)",
        index.prices.len(),
        path.display(),
        index.stats.eligible,
        index.stats.duplicates,
        index.stats.ambiguous
    );
    Ok(index)
}

fn load_surcharge(resources: &Path) -> Result<SurchargeTable> {
    let rates_path = resources.join("units").join("rates.tsv");
    let units_path = resources.join("units").join("units.tsv");

    let (Some(rates), Some(units)) = (read_resource(&rates_path)?, read_resource(&units_path)?)
    else {
        debug!("No surcharge tables under {}", resources.display());
        return Ok(SurchargeTable::default());
    };

    let rates = surcharge::parse_rates(&rates, &rates_path)?;
    surcharge::parse_units(&units, &rates, &units_path)
}

/// Immutable list-price index for one region
#[derive(Debug, Default)]
pub struct PriceCatalog {
    region: Option<Region>,
    on_demand: HashMap<InstanceKind, f64>,
    service_fee: HashMap<InstanceKind, f64>,
    hardware: HashMap<InstanceKind, HardwareSpecs>,
    surcharge: SurchargeTable,
    stats: ParseStats,
}

impl PriceCatalog {
    /// Catalog with no prices; every lookup returns the zero sentinel
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the catalog for `region` from a resources directory.
    ///
    /// Absent files are tolerated. Malformed JSON and unknown workload
    /// labels in the surcharge tables are errors.
    pub fn load(resources: &Path, region: &Region) -> Result<Self> {
        let compute = load_offer(resources, OfferKind::Compute, region)?;
        let service = load_offer(resources, OfferKind::Service, region)?;
        let surcharge = load_surcharge(resources)?;

        let mut stats = compute.stats;
        stats += service.stats;
        stats.duplicates += surcharge.duplicates;

        info!(
            "Loaded price catalog for {}: {} compute prices, {} service fees, {} surcharge kinds",
            region,
            compute.prices.len(),
            service.prices.len(),
            surcharge.kinds()
        );

        Ok(Self {
            region: Some(region.clone()),
            on_demand: compute.prices,
            service_fee: service.prices,
            hardware: compute.attributes,
            surcharge,
            stats,
        })
    }

    /// Builder-style insertion of an on-demand price, used for fixtures
    pub fn with_on_demand(mut self, kind: impl Into<String>, price: f64) -> Self {
        self.on_demand.insert(InstanceKind::new(kind), price);
        self
    }

    /// Builder-style insertion of a service fee, used for fixtures
    pub fn with_service_fee(mut self, kind: impl Into<String>, price: f64) -> Self {
        self.service_fee.insert(InstanceKind::new(kind), price);
        self
    }

    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn has_price(&self, kind: &InstanceKind) -> bool {
        self.on_demand.contains_key(kind)
    }

    /// Hourly on-demand price, 0 when unknown
    pub fn price_for(&self, kind: &InstanceKind) -> f64 {
        match self.on_demand.get(kind) {
            Some(price) => *price,
            None => {
                warn!("No on-demand price for {} in {}", kind, self.region_label());
                0.0
            }
        }
    }

    /// Hourly managed-service fee, 0 when unknown
    pub fn service_fee_for(&self, kind: &InstanceKind) -> f64 {
        match self.service_fee.get(kind) {
            Some(price) => *price,
            None => {
                warn!("No service fee for {} in {}", kind, self.region_label());
                0.0
            }
        }
    }

    /// Surcharge units and cost per hour, (0, 0) when unknown
    pub fn secondary_unit_cost(
        &self,
        kind: &InstanceKind,
        variant: WorkloadVariant,
        plan: &ServicePlan,
    ) -> UnitInfo {
        match self.surcharge.get(kind, variant, plan) {
            Some(info) => info,
            None => {
                warn!("No unit info for {} on {} / {}", kind, variant, plan);
                UnitInfo::default()
            }
        }
    }

    /// Hardware attributes, empty when unknown
    pub fn hardware_specs(&self, kind: &InstanceKind) -> &HardwareSpecs {
        self.hardware.get(kind).unwrap_or(&*NO_SPECS)
    }

    pub fn on_demand_count(&self) -> usize {
        self.on_demand.len()
    }

    fn region_label(&self) -> &str {
        self.region.as_ref().map_or("<no region>", |r| r.as_str())
    }
}

/// Owns the active catalog and rebuilds it when the region changes
pub struct CatalogStore {
    resources: PathBuf,
    active: RwLock<Option<Arc<PriceCatalog>>>,
}

impl CatalogStore {
    pub fn new(resources: impl Into<PathBuf>) -> Self {
        Self {
            resources: resources.into(),
            active: RwLock::new(None),
        }
    }

    pub fn resources(&self) -> &Path {
        &self.resources
    }

    /// Catalog for `region`, loading it if the active one is for another region
    pub async fn catalog_for(&self, region: &Region) -> Result<Arc<PriceCatalog>> {
        {
            let active = self.active.read().await;
            if let Some(catalog) = active.as_ref() {
                if catalog.region() == Some(region) {
                    return Ok(Arc::clone(catalog));
                }
            }
        }

        let mut active = self.active.write().await;
        // Another writer may have loaded it while we waited
        if let Some(catalog) = active.as_ref() {
            if catalog.region() == Some(region) {
                return Ok(Arc::clone(catalog));
            }
        }

        let resources = self.resources.clone();
        let target = region.clone();
        let catalog = tokio::task::spawn_blocking(move || PriceCatalog::load(&resources, &target))
            .await
            .map_err(|e| CostError::Config(format!("catalog loader panicked: {e}")))??;
        let catalog = Arc::new(catalog);
        *active = Some(Arc::clone(&catalog));
        Ok(catalog)
    }
}
