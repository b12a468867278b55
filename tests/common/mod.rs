//! Common test utilities and helpers for clustercost tests
//!
//! Builders for recorded inventories and helpers that lay out price list
//! snapshots in a temporary resources directory.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use clustercost::snapshot::{InventorySnapshot, RecordedCluster, RecordedGroup};
use clustercost_core::types::{
    ClusterDescriptor, ClusterId, ClusterState, GroupId, Instance, InstanceKind, PricingMode,
    Region, ResourceGroup, RuntimeSignals, VolumeSpec, Zone,
};
use clustercost_pricing::catalog::{OfferKind, offer_path};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;
use std::io::Write;
use std::path::Path;

pub const TEST_REGION: &str = "us-east-1";
pub const TEST_ZONE: &str = "us-east-1a";

/// Fixed reference time for all fixtures
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

/// Builder for creating test Instance values
pub struct InstanceBuilder {
    id: String,
    kind: String,
    mode: PricingMode,
    created_at: DateTime<Utc>,
    terminated_at: Option<DateTime<Utc>>,
    volumes: Vec<VolumeSpec>,
}

impl InstanceBuilder {
    /// On-demand instance running one hour from [`t0`]
    pub fn new(id: &str, kind: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            mode: PricingMode::OnDemand,
            created_at: t0(),
            terminated_at: Some(t0() + Duration::hours(1)),
            volumes: Vec::new(),
        }
    }

    pub fn spot(mut self) -> Self {
        self.mode = PricingMode::Spot;
        self
    }

    pub fn seconds(mut self, seconds: i64) -> Self {
        self.terminated_at = Some(self.created_at + Duration::seconds(seconds));
        self
    }

    pub fn running(mut self) -> Self {
        self.terminated_at = None;
        self
    }

    pub fn volume(mut self, volume_type: &str, size_gib: u32) -> Self {
        self.volumes.push(VolumeSpec::new(volume_type, size_gib));
        self
    }

    pub fn build(self) -> Instance {
        Instance {
            id: self.id,
            kind: InstanceKind::new(self.kind),
            pricing_mode: self.mode,
            created_at: self.created_at,
            terminated_at: self.terminated_at,
            volumes: self.volumes,
        }
    }
}

/// Builder for creating recorded clusters
pub struct ClusterBuilder {
    descriptor: ClusterDescriptor,
    fleets_only: bool,
    groups: Vec<RecordedGroup>,
}

impl ClusterBuilder {
    /// Terminated cluster that ran from [`t0`] for one hour
    pub fn new(id: &str) -> Self {
        Self {
            descriptor: ClusterDescriptor {
                id: ClusterId::new(id),
                name: format!("{id}-name"),
                state: ClusterState::Terminated,
                zone: Zone::new(TEST_ZONE),
                created_at: t0(),
                ended_at: Some(t0() + Duration::hours(1)),
                runtime: None,
            },
            fleets_only: false,
            groups: Vec::new(),
        }
    }

    pub fn state(mut self, state: ClusterState) -> Self {
        self.descriptor.state = state;
        if !state.is_terminal() {
            self.descriptor.ended_at = None;
        }
        self
    }

    pub fn fleets(mut self) -> Self {
        self.fleets_only = true;
        self
    }

    pub fn runtime(mut self, job_flag: &str, runtime_version: &str) -> Self {
        self.descriptor.runtime = Some(RuntimeSignals {
            job_flag: job_flag.to_string(),
            runtime_version: runtime_version.to_string(),
        });
        self
    }

    pub fn group(mut self, role: &str, kind: &str, instances: Vec<Instance>) -> Self {
        self.groups.push(RecordedGroup {
            group: ResourceGroup {
                id: GroupId::new(format!("g-{}-{}", role.to_lowercase(), self.groups.len())),
                role: role.to_string(),
                instance_kind: InstanceKind::new(kind),
                volumes: Vec::new(),
            },
            instances,
        });
        self
    }

    /// Attach a volume to every instance of the most recently added group
    pub fn group_volume(mut self, volume_type: &str, size_gib: u32) -> Self {
        if let Some(last) = self.groups.last_mut() {
            last.group.volumes.push(VolumeSpec::new(volume_type, size_gib));
        }
        self
    }

    pub fn build(self) -> RecordedCluster {
        RecordedCluster {
            descriptor: self.descriptor,
            fleets_only: self.fleets_only,
            groups: self.groups,
        }
    }
}

pub fn inventory(clusters: Vec<RecordedCluster>) -> InventorySnapshot {
    InventorySnapshot { clusters }
}

fn compute_offer(prices: &[(&str, f64)]) -> serde_json::Value {
    let mut products = serde_json::Map::new();
    let mut terms = serde_json::Map::new();
    for (i, (kind, price)) in prices.iter().enumerate() {
        let sku = format!("SKU{i:04}");
        products.insert(
            sku.clone(),
            json!({ "attributes": {
                "instanceType": kind, "tenancy": "Shared", "operatingSystem": "Linux",
                "operation": "RunInstances", "capacitystatus": "Used", "vcpu": "4"
            }}),
        );
        terms.insert(
            sku,
            json!({ "T": { "priceDimensions": { "D": { "pricePerUnit": {
                "USD": price.to_string()
            }}}}}),
        );
    }
    json!({ "products": products, "terms": { "OnDemand": terms } })
}

fn service_offer(fees: &[(&str, f64)]) -> serde_json::Value {
    let mut products = serde_json::Map::new();
    let mut terms = serde_json::Map::new();
    for (i, (kind, fee)) in fees.iter().enumerate() {
        let sku = format!("EMR{i:04}");
        products.insert(
            sku.clone(),
            json!({ "attributes": { "instanceType": kind, "softwareType": "EMR" } }),
        );
        terms.insert(
            sku,
            json!({ "T": { "priceDimensions": { "D": { "pricePerUnit": {
                "USD": fee.to_string()
            }}}}}),
        );
    }
    json!({ "products": products, "terms": { "OnDemand": terms } })
}

fn write_plain(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn write_gz(path: &Path, content: &str) {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    let gz = std::path::PathBuf::from(name);
    std::fs::create_dir_all(gz.parent().unwrap()).unwrap();
    let mut encoder = GzEncoder::new(std::fs::File::create(gz).unwrap(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

/// Write compute prices for [`TEST_REGION`] as a gzip snapshot
pub fn write_compute_prices(resources: &Path, prices: &[(&str, f64)]) {
    let path = offer_path(resources, OfferKind::Compute, &Region::new(TEST_REGION));
    write_gz(&path, &compute_offer(prices).to_string());
}

/// Write managed-service fees for [`TEST_REGION`] as plain JSON
pub fn write_service_fees(resources: &Path, fees: &[(&str, f64)]) {
    let path = offer_path(resources, OfferKind::Service, &Region::new(TEST_REGION));
    write_plain(&path, &service_offer(fees).to_string());
}

/// Write surcharge rate and unit tables
pub fn write_surcharge_tables(resources: &Path, rates: &str, units: &str) {
    write_plain(&resources.join("units").join("rates.tsv"), rates);
    write_plain(&resources.join("units").join("units.tsv"), units);
}
