//! Exact + approximate range cache.
//!
//! A coarser cache flavour than the block store: requests are quantized by
//! sampling rate and height into fixed-size tiles. Tiles present at the exact
//! key are returned as is; for missing tiles a fetch is issued (once per
//! distinct request) and the best committed data from other keys fills in
//! until it lands.
//!
//! `get` is rate limited: within the throttle interval the previous answer
//! is returned unchanged.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{ApproximateIndex, RangeKey, Throttle};
use crate::config::RangeCacheConfig;
use crate::fetch::{FetchError, FetchRequest, TileSource};
use crate::tile::TilePayload;

/// One piece of a `get` answer.
#[derive(Debug)]
pub struct RangeHit<P> {
    pub key: RangeKey,
    /// Absolute range this piece supplies.
    pub range: Range<u64>,
    pub payload: Arc<P>,
    /// True when the key matches the request's quantized key.
    pub exact: bool,
}

impl<P> Clone for RangeHit<P> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            range: self.range.clone(),
            payload: Arc::clone(&self.payload),
            exact: self.exact,
        }
    }
}

struct Entry<P> {
    range: Range<u64>,
    payload: Arc<P>,
}

struct RangeCompletion<P> {
    request_id: u64,
    key: RangeKey,
    range: Range<u64>,
    descriptor: String,
    result: Result<P, FetchError>,
}

/// Range cache for one data source.
pub struct RangeCache<P> {
    name: String,
    bounds: Range<u64>,
    config: RangeCacheConfig,
    entries: HashMap<RangeKey, Entry<P>>,
    index: ApproximateIndex,
    /// Live request id per in-flight descriptor.
    in_flight: HashMap<String, u64>,
    next_request_id: u64,
    source: Arc<dyn TileSource<P>>,
    runtime: Handle,
    completions_tx: mpsc::UnboundedSender<RangeCompletion<P>>,
    completions_rx: mpsc::UnboundedReceiver<RangeCompletion<P>>,
    throttle: Throttle,
    last_result: Vec<RangeHit<P>>,
}

impl<P: TilePayload> RangeCache<P> {
    /// Cache data of `name` within `[min_bp, max_bp]`.
    pub fn new(
        name: impl Into<String>,
        min_bp: u64,
        max_bp: u64,
        source: Arc<dyn TileSource<P>>,
        config: RangeCacheConfig,
        runtime: Handle,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            bounds: min_bp..max_bp.saturating_add(1),
            throttle: Throttle::new(config.throttle_interval),
            config,
            entries: HashMap::new(),
            index: ApproximateIndex::new(),
            in_flight: HashMap::new(),
            next_request_id: 0,
            source,
            runtime,
            completions_tx,
            completions_rx,
            last_result: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Committed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Rate-limited lookup at the current time.
    pub fn get(&mut self, start: f64, end: f64, sampling_rate: f64, height_px: f64) -> Vec<RangeHit<P>> {
        self.get_at(Instant::now(), start, end, sampling_rate, height_px)
    }

    /// Rate-limited lookup as of `now`.
    ///
    /// Calls within the throttle interval of the last evaluated call return
    /// that call's answer.
    pub fn get_at(
        &mut self,
        now: Instant,
        start: f64,
        end: f64,
        sampling_rate: f64,
        height_px: f64,
    ) -> Vec<RangeHit<P>> {
        if self.throttle.try_acquire(now) {
            self.last_result = self.evaluate(start, end, sampling_rate, height_px);
        }
        self.last_result.clone()
    }

    /// Unthrottled lookup.
    ///
    /// Returns exact hits plus approximate pieces for missing tiles, issuing
    /// a fetch for each missing tile not already in flight.
    pub fn evaluate(&mut self, start: f64, end: f64, sampling_rate: f64, height_px: f64) -> Vec<RangeHit<P>> {
        let start = (start.max(0.0).round() as u64).max(self.bounds.start);
        let end = (end.max(0.0).round() as u64).min(self.bounds.end);
        if start >= end {
            return Vec::new();
        }

        let sampling_rate = self.config.x_sampler.sample(sampling_rate).max(1);
        let height_bucket = self.config.y_sampler.sample(height_px);
        let bp_per_tile = self.config.tile_size.max(1).saturating_mul(sampling_rate);
        let first_index = start / bp_per_tile;
        let last_index = (end - 1) / bp_per_tile;

        let mut hits = Vec::new();
        for tile_index in first_index..=last_index {
            let tile_start = tile_index.saturating_mul(bp_per_tile);
            let range = tile_start.max(self.bounds.start)
                ..tile_start.saturating_add(bp_per_tile).min(self.bounds.end);
            if range.start >= range.end {
                continue;
            }
            let key = RangeKey {
                height_bucket,
                sampling_rate,
                tile_index,
            };

            let wanted = range.start.max(start)..range.end.min(end);

            if let Some(entry) = self.entries.get(&key) {
                let clipped = entry.range.start.max(wanted.start)..entry.range.end.min(wanted.end);
                if clipped.start < clipped.end {
                    hits.push(RangeHit {
                        key,
                        range: clipped,
                        payload: Arc::clone(&entry.payload),
                        exact: true,
                    });
                }
                continue;
            }

            self.request(key, range);
            for piece in self.index.query(&wanted, sampling_rate) {
                if let Some(entry) = self.entries.get(&piece.key) {
                    hits.push(RangeHit {
                        key: piece.key,
                        range: piece.range,
                        payload: Arc::clone(&entry.payload),
                        exact: false,
                    });
                }
            }
        }
        hits
    }

    /// Commit every fetch result that has arrived. Returns how many committed.
    pub fn poll_completions(&mut self) -> usize {
        let mut committed = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            if self.apply(completion) {
                committed += 1;
            }
        }
        committed
    }

    /// Wait for the next fetch result and commit it.
    ///
    /// Returns `None` when nothing is in flight, otherwise whether it committed.
    pub async fn next_completion(&mut self) -> Option<bool> {
        if self.in_flight.is_empty() {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Forget every entry and pending request.
    ///
    /// Results of fetches issued before the clear are discarded on arrival.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.in_flight.clear();
        self.last_result.clear();
        self.throttle.reset();
    }

    fn request(&mut self, key: RangeKey, range: Range<u64>) {
        let request = FetchRequest::new(self.name.as_str(), range.start, range.end, key.sampling_rate)
            .with_height(key.height_bucket);
        let descriptor = request.descriptor();
        if self.in_flight.contains_key(&descriptor) {
            return;
        }
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.in_flight.insert(descriptor.clone(), request_id);
        debug!(cache = %self.name, request = %descriptor, request_id, "Fetching range");

        let fetch = self.source.fetch(request);
        let completions = self.completions_tx.clone();
        self.runtime.spawn(async move {
            let result = fetch.await;
            let _ = completions.send(RangeCompletion {
                request_id,
                key,
                range,
                descriptor,
                result,
            });
        });
    }

    fn apply(&mut self, completion: RangeCompletion<P>) -> bool {
        let RangeCompletion {
            request_id,
            key,
            range,
            descriptor,
            result,
        } = completion;
        if self.in_flight.get(&descriptor) != Some(&request_id) {
            debug!(cache = %self.name, request = %descriptor, request_id, "Dropping stale range result");
            return false;
        }
        self.in_flight.remove(&descriptor);

        match result {
            Ok(payload) => {
                let entry = Entry {
                    range: range.clone(),
                    payload: Arc::new(payload),
                };
                if let Some(previous) = self.entries.insert(key, entry) {
                    self.index.remove(&previous.range, key);
                }
                self.index.insert(range, key);
                debug!(cache = %self.name, request = %descriptor, "Range committed");
                true
            }
            Err(e) => {
                warn!(cache = %self.name, request = %descriptor, error = %e, "Range fetch failed");
                false
            }
        }
    }
}
