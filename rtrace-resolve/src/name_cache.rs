//! Resolved name cache
//!
//! Memoizes `address → formatted line` so repeated backtrace addresses skip the
//! symbol lookup. The cache is a fixed table of hash buckets, each one the start
//! of a short run of probe slots. Nothing is ever allocated after construction.
//!
//! # Eviction
//!
//! When every slot of a probe run is taken, the slot with the lowest hit rate
//! projected to the current time is replaced. Rates are compared by cross
//! multiplication (`hits_a * age_b < hits_b * age_a`) against a logical clock
//! that ticks on every insertion. A slot without hits is taken as soon as the
//! scan reaches it; backtrace addresses arrive in bursts, so an entry that was
//! never reused is the cheapest one to lose.

use log::{debug, warn};

/// Number of hash bits, giving `1 << CACHE_BITS` buckets.
pub const CACHE_BITS: u32 = 16;

/// Probe slots per bucket.
pub const SLOT_COUNT: usize = 5;

#[derive(Debug, Clone)]
struct CacheEntry {
    address: u64,
    name: String,
    hits: u32,
    stamp: u64,
}

/// Fixed-capacity address → name cache.
#[derive(Debug)]
pub struct NameCache {
    /// `buckets + SLOT_COUNT` slots so the last bucket's run stays in bounds.
    slots: Vec<Option<CacheEntry>>,
    mask: u64,
    access_counter: u64,
}

impl Default for NameCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NameCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_bucket_bits(CACHE_BITS)
    }

    /// Creates a cache with `1 << bits` buckets.
    ///
    /// Falls back to a pass-through cache when the table cannot be allocated.
    #[must_use]
    pub fn with_bucket_bits(bits: u32) -> Self {
        let buckets = 1usize << bits;
        let total = buckets + SLOT_COUNT;
        let mut slots = Vec::new();
        if let Err(e) = slots.try_reserve_exact(total) {
            warn!("failed to allocate resolved name cache ({e}), resolving without cache");
            return Self::disabled();
        }
        slots.resize_with(total, || None);
        debug!("name cache: {buckets} buckets x {SLOT_COUNT} slots");
        Self { slots, mask: (buckets - 1) as u64, access_counter: 1 }
    }

    /// A cache that stores nothing; every lookup misses.
    #[must_use]
    pub fn disabled() -> Self {
        Self { slots: Vec::new(), mask: 0, access_counter: 1 }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Total number of slots, fixed for the cache's lifetime.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket index of `address`: its bits folded in overlapping chunks.
    #[must_use]
    pub fn bucket(&self, address: u64) -> usize {
        let mut hash = 0;
        let mut value = address;
        while value != 0 {
            hash ^= value & self.mask;
            value >>= 3;
        }
        // masked, so it always fits
        hash as usize
    }

    fn probe_run(&self, address: u64) -> std::ops::Range<usize> {
        let start = self.bucket(address);
        start..start + SLOT_COUNT
    }

    fn position(&self, address: u64) -> Option<usize> {
        if !self.is_enabled() {
            return None;
        }
        self.probe_run(address)
            .find(|&idx| matches!(&self.slots[idx], Some(entry) if entry.address == address))
    }

    /// Looks up a cached name. Does not touch hit statistics.
    #[must_use]
    pub fn get(&self, address: u64) -> Option<&str> {
        self.position(address)
            .and_then(|idx| self.slots[idx].as_ref())
            .map(|entry| entry.name.as_str())
    }

    /// Counts a reuse of `address`, refreshing its access stamp.
    pub fn record_hit(&mut self, address: u64) {
        let now = self.access_counter;
        if let Some(idx) = self.position(address) {
            if let Some(entry) = self.slots[idx].as_mut() {
                entry.hits = entry.hits.saturating_add(1);
                entry.stamp = now;
            }
        }
    }

    /// Stores `name` for `address`, evicting within the probe run if needed.
    pub fn put(&mut self, address: u64, name: impl Into<String>) {
        if !self.is_enabled() {
            return;
        }
        self.access_counter += 1;
        let now = self.access_counter;

        let run = self.probe_run(address);
        let target = self
            .position(address)
            .or_else(|| run.clone().find(|&idx| self.slots[idx].is_none()))
            .unwrap_or_else(|| self.pick_victim(run.start, now));

        self.slots[target] = Some(CacheEntry { address, name: name.into(), hits: 0, stamp: now });
    }

    fn pick_victim(&self, start: usize, now: u64) -> usize {
        let mut victim = start;
        for idx in start + 1..start + SLOT_COUNT {
            let (Some(current), Some(candidate)) = (&self.slots[victim], &self.slots[idx]) else {
                break;
            };
            if current.hits == 0 {
                break;
            }
            let candidate_weight =
                u128::from(candidate.hits) * u128::from(now.saturating_sub(current.stamp));
            let current_weight =
                u128::from(current.hits) * u128::from(now.saturating_sub(candidate.stamp));
            if candidate_weight < current_weight {
                victim = idx;
            }
        }
        victim
    }

    /// Drops every entry whose address lies in `[start, end]`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_range(&mut self, start: u64, end: u64) -> usize {
        let mut removed = 0;
        for slot in &mut self.slots {
            if matches!(slot, Some(entry) if (start..=end).contains(&entry.address)) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }
}
