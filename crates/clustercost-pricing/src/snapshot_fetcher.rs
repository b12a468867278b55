//! Download vendor price lists into the resources layout
//!
//! The vendor publishes an offer index listing one region index per
//! service; each region index points at the current price list for every
//! region. Price lists are written gzip-compressed so [`PriceCatalog`]
//! can load them directly.
//!
//! [`PriceCatalog`]: crate::catalog::PriceCatalog

use crate::catalog::{OfferKind, offer_path};
use clustercost_core::error::{CostError, Result};
use clustercost_core::types::{Platform, Region};
use flate2::Compression;
use flate2::write::GzEncoder;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Host serving the public price list API
pub const PRICING_BASE_URL: &str = "https://pricing.us-east-1.amazonaws.com";

/// Path of the offer index on [`PRICING_BASE_URL`]
pub const OFFER_INDEX_PATH: &str = "/offers/v1.0/aws/index.json";

/// Regions the managed-service price list is published for
pub const KNOWN_REGIONS: [&str; 28] = [
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "af-south-1",
    "ap-east-1",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ca-central-1",
    "eu-central-1",
    "eu-central-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-south-1",
    "eu-south-2",
    "eu-north-1",
    "il-central-1",
    "me-south-1",
    "me-central-1",
    "sa-east-1",
];

#[derive(Debug, Deserialize)]
struct OfferIndex {
    offers: HashMap<String, OfferEntry>,
}

#[derive(Debug, Deserialize)]
struct OfferEntry {
    #[serde(rename = "currentRegionIndexUrl")]
    current_region_index_url: String,
}

#[derive(Debug, Deserialize)]
struct RegionIndex {
    regions: HashMap<String, RegionEntry>,
}

#[derive(Debug, Deserialize)]
struct RegionEntry {
    #[serde(rename = "currentVersionUrl")]
    current_version_url: String,
}

/// Expand a region argument list: `*` (or nothing) selects every known
/// region, unknown names are skipped with a warning.
pub fn resolve_regions(args: &[String]) -> Vec<Region> {
    let requested: Vec<&str> = args
        .iter()
        .flat_map(|arg| arg.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if requested.is_empty() || requested.contains(&"*") {
        return KNOWN_REGIONS.iter().map(|r| Region::new(*r)).collect();
    }

    let mut regions: Vec<Region> = Vec::new();
    for name in requested {
        if !KNOWN_REGIONS.contains(&name) {
            warn!("Region {} is not a known region, skipping", name);
            continue;
        }
        let region = Region::new(name);
        if !regions.contains(&region) {
            regions.push(region);
        }
    }
    regions
}

/// Offer kinds a platform needs on disk
pub fn offers_for(platform: Platform) -> &'static [OfferKind] {
    match platform {
        Platform::Emr => &[OfferKind::Service, OfferKind::Compute],
        Platform::Databricks => &[OfferKind::Compute],
    }
}

/// Downloads price list snapshots over HTTPS
pub struct SnapshotFetcher {
    client: reqwest::Client,
    base_url: String,
    resources: PathBuf,
    show_progress: bool,
}

impl SnapshotFetcher {
    pub fn new(resources: impl Into<PathBuf>, show_progress: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: PRICING_BASE_URL.to_string(),
            resources: resources.into(),
            show_progress,
        }
    }

    /// Point the fetcher at another host (mirrors, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CostError::Upstream {
                code: status.as_u16().to_string(),
                message: format!("GET {url}"),
            });
        }
        Ok(response.json().await?)
    }

    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CostError::Upstream {
                code: status.as_u16().to_string(),
                message: format!("GET {url}"),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn region_urls(&self, index: &OfferIndex, kind: OfferKind) -> Result<RegionIndex> {
        let entry = index.offers.get(kind.offer_code()).ok_or_else(|| {
            CostError::Config(format!("offer index has no {} entry", kind.offer_code()))
        })?;
        self.get_json(&entry.current_region_index_url).await
    }

    /// Download the price lists `platform` needs for every region.
    ///
    /// Regions missing from a region index are skipped with a warning.
    /// Returns the files written.
    pub async fn fetch(&self, platform: Platform, regions: &[Region]) -> Result<Vec<PathBuf>> {
        let index: OfferIndex = self.get_json(OFFER_INDEX_PATH).await?;
        let offers = offers_for(platform);

        let mut region_indexes = Vec::with_capacity(offers.len());
        for kind in offers {
            region_indexes.push((*kind, self.region_urls(&index, *kind).await?));
        }

        let progress = if self.show_progress {
            let pb = ProgressBar::new((regions.len() * offers.len()) as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} price lists")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut written = Vec::new();
        for region in regions {
            for (kind, region_index) in &region_indexes {
                if let Some(pb) = &progress {
                    pb.set_message(format!("{} {}", kind.dir_name(), region));
                }
                let Some(entry) = region_index.regions.get(region.as_str()) else {
                    warn!(
                        "No {} price list published for {}, skipping",
                        kind.offer_code(),
                        region
                    );
                    continue;
                };

                let body = self.get_bytes(&entry.current_version_url).await?;
                let path = gz_path(&offer_path(&self.resources, *kind, region));
                write_gzipped(&path, &body)?;
                info!("Wrote {} price list for {} to {}", kind.offer_code(), region, path.display());
                written.push(path);

                if let Some(pb) = &progress {
                    pb.inc(1);
                }
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message("Price lists downloaded");
        }
        Ok(written)
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Write `content` gzip-compressed, creating parent directories
pub fn write_gzipped(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(content)?;
    encoder.finish()?;
    Ok(())
}
