//! Master list assembly.
//!
//! Flattens indexed source pages into the single ordered sequence the reader
//! walks through. Ordering is by numeric page index.

use std::collections::{BTreeMap, BTreeSet};

/// Concatenate every indexed page's links in ascending page-index order.
pub fn assemble(pages: &BTreeMap<u32, Vec<String>>) -> Vec<String> {
    let total = pages.values().map(Vec::len).sum();
    let mut master = Vec::with_capacity(total);
    for links in pages.values() {
        master.extend(links.iter().cloned());
    }
    master
}

/// Lowest page index below `total_pages` that has not been indexed yet.
pub fn next_unindexed(indexed: &BTreeSet<u32>, total_pages: u32) -> Option<u32> {
    (0..total_pages).find(|p| !indexed.contains(p))
}
