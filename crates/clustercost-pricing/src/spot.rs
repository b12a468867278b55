//! Spot-price history interpolation
//!
//! Spot prices are published as sparse change-points: a timestamp and the
//! price in effect from that moment until the next change. The price curve
//! is therefore piecewise-constant, and the cost of running an instance over
//! `[start, end)` is the integral of that curve divided by 3600.
//!
//! [`SpotPriceInterpolator`] keeps one [`SpotPriceHistory`] per
//! (instance kind, zone), fills it from a [`SpotPriceSource`] when a request
//! falls outside the cached range, and integrates.

use clustercost_core::error::Result;
use clustercost_core::provider::{SpotPricePage, SpotPriceSource};
use clustercost_core::retry::RetryPolicy;
use clustercost_core::types::{InstanceKind, Zone, normalized_cost, seconds_between};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Longest expected gap between consecutive observations
pub fn max_observation_gap() -> Duration {
    Duration::hours(25)
}

/// Observed spot prices for one (instance kind, zone), ordered by timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotPriceHistory {
    points: BTreeMap<DateTime<Utc>, f64>,
}

impl SpotPriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation; a later observation at the same timestamp wins
    pub fn insert(&mut self, at: DateTime<Utc>, price: f64) {
        self.points.insert(at, price);
    }

    pub fn extend<I>(&mut self, observations: I)
    where
        I: IntoIterator<Item = (DateTime<Utc>, f64)>,
    {
        self.points.extend(observations);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.points.keys().next().copied()
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.points.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.points.iter().map(|(at, price)| (*at, *price))
    }

    /// Whether the cached range cannot answer a query over `[start, end)`.
    ///
    /// True when nothing is cached, when the latest observation is more than
    /// 25 hours before `end`, or when the earliest is after `start`.
    pub fn needs_refresh(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        match (self.earliest(), self.latest()) {
            (Some(earliest), Some(latest)) => {
                end - latest > max_observation_gap() || earliest > start
            }
            _ => true,
        }
    }

    /// Consecutive observations further apart than the expected maximum
    pub fn gaps(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.points
            .keys()
            .zip(self.points.keys().skip(1))
            .filter(|(a, b)| **b - **a > max_observation_gap())
            .map(|(a, b)| (*a, *b))
            .collect()
    }
}

impl FromIterator<(DateTime<Utc>, f64)> for SpotPriceHistory {
    fn from_iter<I: IntoIterator<Item = (DateTime<Utc>, f64)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Integrate the piecewise-constant price curve over `[start, end)`.
///
/// Each observation's price holds until the next observation. When no
/// observation precedes `start`, the lead-in up to the first observation is
/// charged at the earliest observed price. Empty histories and empty
/// intervals cost 0.
pub fn integrate(history: &SpotPriceHistory, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    if end <= start {
        return 0.0;
    }

    let points: Vec<(DateTime<Utc>, f64)> = history.iter().collect();
    match points.as_slice() {
        [] => return 0.0,
        [(_, price)] => return normalized_cost(seconds_between(start, end), *price),
        _ => {}
    }

    // index of the first observation at or after start
    let first_inside = points.partition_point(|(at, _)| *at < start);
    let mut price = match first_inside {
        0 => points[0].1,
        i => points[i - 1].1,
    };

    // start and end inside one constant segment
    let next_change = points.get(first_inside).map(|(at, _)| *at);
    if next_change.is_none_or(|at| end <= at) {
        return normalized_cost(seconds_between(start, end), price);
    }

    let mut sum = 0.0;
    let mut cursor = start;
    for &(at, next_price) in &points[first_inside..] {
        if at >= end {
            break;
        }
        sum += normalized_cost(seconds_between(cursor, at), price);
        cursor = at;
        price = next_price;
    }
    sum += normalized_cost(seconds_between(cursor, end), price);

    if !sum.is_finite() || sum < 0.0 {
        warn!(
            "Spot integration over {} to {} produced {}, returning partial result",
            start, end, sum
        );
    }
    sum
}

type HistoryKey = (InstanceKind, Zone);

/// Per-(kind, zone) spot history cache with on-demand range fill
pub struct SpotPriceInterpolator {
    source: Arc<dyn SpotPriceSource>,
    histories: RwLock<HashMap<HistoryKey, Arc<Mutex<SpotPriceHistory>>>>,
    retry: RetryPolicy,
}

impl SpotPriceInterpolator {
    pub fn new(source: Arc<dyn SpotPriceSource>) -> Self {
        Self::with_retry(source, RetryPolicy::default())
    }

    pub fn with_retry(source: Arc<dyn SpotPriceSource>, retry: RetryPolicy) -> Self {
        Self {
            source,
            histories: RwLock::new(HashMap::new()),
            retry,
        }
    }

    /// Interpolator with no upstream; only seeded histories are priced
    pub fn offline() -> Self {
        Self::with_retry(Arc::new(NoSpotPrices), RetryPolicy::none())
    }

    async fn history(&self, kind: &InstanceKind, zone: &Zone) -> Arc<Mutex<SpotPriceHistory>> {
        let key = (kind.clone(), zone.clone());
        {
            let histories = self.histories.read().await;
            if let Some(history) = histories.get(&key) {
                return Arc::clone(history);
            }
        }
        let mut histories = self.histories.write().await;
        Arc::clone(histories.entry(key).or_default())
    }

    /// Pre-load observations, e.g. from an offline recording
    pub async fn seed<I>(&self, kind: &InstanceKind, zone: &Zone, observations: I)
    where
        I: IntoIterator<Item = (DateTime<Utc>, f64)>,
    {
        let history = self.history(kind, zone).await;
        history.lock().await.extend(observations);
    }

    /// Copy of the cached history for a key
    pub async fn snapshot(&self, kind: &InstanceKind, zone: &Zone) -> SpotPriceHistory {
        let history = self.history(kind, zone).await;
        let guard = history.lock().await;
        guard.clone()
    }

    /// Spot cost of running `kind` in `zone` over `[start, end)`
    pub async fn estimate(
        &self,
        kind: &InstanceKind,
        zone: &Zone,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64> {
        let history = self.history(kind, zone).await;
        let mut history = history.lock().await;

        if history.needs_refresh(start, end) {
            let fetched = self.fetch_range(kind, zone, start, end).await?;
            debug!(
                "Fetched {} spot observations for {} in {}",
                fetched.len(),
                kind,
                zone
            );
            history.extend(fetched);
            for (from, to) in history.gaps() {
                warn!(
                    "Spot history for {} in {} has a gap from {} to {}",
                    kind, zone, from, to
                );
            }
        }

        Ok(integrate(&history, start, end))
    }

    async fn fetch_range(
        &self,
        kind: &InstanceKind,
        zone: &Zone,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, f64)>> {
        let mut observations = Vec::new();
        let mut next_token: Option<String> = None;
        let operation = format!("spot price history for {kind} in {zone}");

        loop {
            let token = next_token.clone();
            let page: SpotPricePage = self
                .retry
                .run(&operation, move || {
                    self.source
                        .fetch_page(kind, zone, start, end, token.clone())
                })
                .await?;
            observations.extend(page.observations);

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(observations)
    }
}

/// Source that never has any observations
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpotPrices;

#[async_trait]
impl SpotPriceSource for NoSpotPrices {
    async fn fetch_page(
        &self,
        _kind: &InstanceKind,
        _zone: &Zone,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _next_token: Option<String>,
    ) -> Result<SpotPricePage> {
        Ok(SpotPricePage::default())
    }
}
