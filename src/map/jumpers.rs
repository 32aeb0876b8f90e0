use log::debug;
use rustc_hash::FxHashMap;

use crate::geom::Jumper;

/// `JumperIndex`
///
/// Maintains the merged chains of street segments shorter than the
/// minimum trackable length. Stitching is amortized on the write side:
/// inserting a chain searches the existing chains adjacent at either of
/// its endpoints and stores every merged variant, so `get` stays a flat
/// map lookup on the hot path.
#[derive(Debug, Default)]
pub struct JumperIndex {
    jumpers: FxHashMap<(u64, u64), Jumper>,
    /// Chain keys grouped by their start node.
    by_start: FxHashMap<u64, Vec<(u64, u64)>>,
    /// Chain keys grouped by their end node.
    by_end: FxHashMap<u64, Vec<(u64, u64)>>,
}

impl JumperIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, start_node: u64, end_node: u64) -> Option<&Jumper> {
        self.jumpers.get(&(start_node, end_node))
    }

    pub fn len(&self) -> usize {
        self.jumpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jumpers.is_empty()
    }

    pub fn insert(&mut self, jumper: Jumper) {
        let key = (jumper.start_node, jumper.end_node);
        if self.jumpers.contains_key(&key) {
            return;
        }

        // chains starting where this one ends
        let mut merged = Vec::new();
        for adjacent_key in self.by_start.get(&jumper.end_node).into_iter().flatten() {
            if let Some(adjacent) = self.jumpers.get(adjacent_key) {
                // a chain running straight back would form a loop
                if adjacent.start_node == jumper.end_node && adjacent.end_node == jumper.start_node
                {
                    continue;
                }

                if let Some(longer) = adjacent.merge(&jumper) {
                    merged.push(longer);
                }
            }
        }

        // chains ending where this one starts
        for adjacent_key in self.by_end.get(&jumper.start_node).into_iter().flatten() {
            if let Some(adjacent) = self.jumpers.get(adjacent_key) {
                if adjacent.start_node == jumper.end_node && adjacent.end_node == jumper.start_node
                {
                    continue;
                }

                if let Some(longer) = adjacent.merge(&jumper) {
                    merged.push(longer);
                }
            }
        }

        for longer in merged {
            debug!(
                "stitched jumper {}..{} spanning {} segments",
                longer.start_node,
                longer.end_node,
                longer.segments.len()
            );
            self.store(longer);
        }

        self.store(jumper);
    }

    fn store(&mut self, jumper: Jumper) {
        let key = (jumper.start_node, jumper.end_node);

        if self.jumpers.insert(key, jumper).is_none() {
            self.by_start.entry(key.0).or_default().push(key);
            self.by_end.entry(key.1).or_default().push(key);
        }
    }
}
