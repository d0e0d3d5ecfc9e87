//! Bounded, distance-ordered accumulator for the k best neighbors seen so far.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

/// Keeps the `capacity` items with the smallest distances.
///
/// Entries are keyed by `(distance, arrival)`, so equal distances stay in
/// arrival order and never collide. A new item only displaces the current
/// worst entry when it is strictly closer.
#[derive(Debug, Clone)]
pub struct KBestNeighbors<P> {
    capacity: usize,
    arrivals: u64,
    entries: BTreeMap<(OrderedFloat<f64>, u64), P>,
}

impl<P> KBestNeighbors<P> {
    pub fn new(capacity: usize) -> Self {
        KBestNeighbors {
            capacity,
            arrivals: 0,
            entries: BTreeMap::new(),
        }
    }

    /// Offers an item; returns whether it was kept.
    pub fn add(&mut self, distance: f64, item: P) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.entries.len() >= self.capacity {
            let worst = self.entries.last_key_value().map(|(&(d, _), _)| d);
            match worst {
                Some(worst) if OrderedFloat(distance) < worst => {
                    self.entries.pop_last();
                }
                _ => return false,
            }
        }
        self.entries
            .insert((OrderedFloat(distance), self.arrivals), item);
        self.arrivals += 1;
        true
    }

    /// Distance of the worst kept entry, or `None` while fewer than
    /// `capacity` items are held (an unbounded search radius).
    pub fn current_farthest_distance(&self) -> Option<f64> {
        if self.is_full() {
            self.entries.last_key_value().map(|(&(d, _), _)| d.0)
        } else {
            None
        }
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Kept entries, closest first.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &P)> {
        self.entries.iter().map(|(&(d, _), item)| (d.0, item))
    }

    pub fn into_sorted_points(self) -> Vec<(f64, P)> {
        self.entries
            .into_iter()
            .map(|((d, _), item)| (d.0, item))
            .collect()
    }
}
