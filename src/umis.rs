use rustc_hash::{FxHashMap, FxHashSet};

use crate::base_index;
use crate::errors::{Error, Result};

const NO_CHILD: u32 = u32::MAX;
const NO_LEAF: u32 = u32::MAX;

#[derive(Clone)]
struct UmiNode {
    children: [u32; 4],
    leaf: u32,
}

impl UmiNode {
    fn new() -> Self {
        UmiNode {
            children: [NO_CHILD; 4],
            leaf: NO_LEAF,
        }
    }
}

/// Per-UMI dedup state: for each tag ordinal, the set of barcodes already
/// credited for this (UMI, tag) pair. Both layers are created lazily.
#[derive(Default)]
struct UmiLeaf {
    seen: FxHashMap<u32, FxHashSet<Vec<u8>>>,
}

/// Handle to one observed UMI's dedup state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UmiLeafId(u32);

/// Four-way trie over observed UMIs, grown on demand during streaming. This
/// is the only structure without a known size bound; it is bounded by the
/// number of distinct (UMI, tag, barcode) triples in the input.
pub struct UmiTrie {
    nodes: Vec<UmiNode>,
    leaves: Vec<UmiLeaf>,
}

impl UmiTrie {
    pub fn new() -> Self {
        UmiTrie {
            nodes: vec![UmiNode::new()],
            leaves: Vec::new(),
        }
    }

    /// Walk to this UMI's leaf, inserting the path on first sight. A UMI
    /// containing `N` is rejected outright with no insertion; this is an
    /// expected, frequent condition. Any other non-DNA symbol is malformed
    /// stream data.
    pub fn lookup_or_create(&mut self, umi: &[u8]) -> Result<Option<UmiLeafId>> {
        // Reject N before touching the trie so a rejected UMI leaves no
        // partial path behind.
        for &base in umi {
            if base == b'N' {
                return Ok(None);
            }
            if base_index(base).is_none() {
                return Err(Error::StreamAlphabet {
                    region: "UMI",
                    symbol: base as char,
                    seq: String::from_utf8_lossy(umi).into_owned(),
                });
            }
        }
        let mut node = 0usize;
        for &base in umi {
            let slot = base_index(base).unwrap();
            let child = self.nodes[node].children[slot];
            node = if child == NO_CHILD {
                self.nodes.push(UmiNode::new());
                let new = (self.nodes.len() - 1) as u32;
                self.nodes[node].children[slot] = new;
                new as usize
            } else {
                child as usize
            };
        }
        if self.nodes[node].leaf == NO_LEAF {
            self.leaves.push(UmiLeaf::default());
            self.nodes[node].leaf = (self.leaves.len() - 1) as u32;
        }
        Ok(Some(UmiLeafId(self.nodes[node].leaf)))
    }

    /// The authoritative dedup gate: returns true iff this exact
    /// (UMI, tag, barcode) triple has not been seen before. The same UMI may
    /// be credited to any number of other barcodes or tags.
    pub fn mark_seen(&mut self, leaf: UmiLeafId, tag_index: usize, barcode: &[u8]) -> bool {
        let barcodes = self.leaves[leaf.0 as usize]
            .seen
            .entry(tag_index as u32)
            .or_default();
        if barcodes.contains(barcode) {
            false
        } else {
            barcodes.insert(barcode.to_vec());
            true
        }
    }

    /// Number of distinct UMIs observed so far.
    pub fn distinct_umis(&self) -> usize {
        self.leaves.len()
    }
}

impl Default for UmiTrie {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_wins() {
        let mut trie = UmiTrie::new();
        let leaf = trie.lookup_or_create(b"AAAAAAAAAAAA").unwrap().unwrap();
        assert!(trie.mark_seen(leaf, 0, b"AAAACCCCGGGGTTTT"));
        assert!(!trie.mark_seen(leaf, 0, b"AAAACCCCGGGGTTTT"));
        assert!(!trie.mark_seen(leaf, 0, b"AAAACCCCGGGGTTTT"));
    }

    #[test]
    fn test_same_umi_different_barcode_or_tag() {
        let mut trie = UmiTrie::new();
        let leaf = trie.lookup_or_create(b"AAAAAAAAAAAA").unwrap().unwrap();
        assert!(trie.mark_seen(leaf, 0, b"AAAACCCCGGGGTTTT"));
        // Molecule collisions across cells are expected: new barcode, same
        // UMI and tag, still counts.
        assert!(trie.mark_seen(leaf, 0, b"TTTTGGGGCCCCAAAA"));
        // Same barcode, different tag, still counts.
        assert!(trie.mark_seen(leaf, 1, b"AAAACCCCGGGGTTTT"));
    }

    #[test]
    fn test_leaf_is_stable_across_lookups() {
        let mut trie = UmiTrie::new();
        let first = trie.lookup_or_create(b"ACGTACGTACGT").unwrap().unwrap();
        let second = trie.lookup_or_create(b"ACGTACGTACGT").unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(trie.distinct_umis(), 1);
    }

    #[test]
    fn test_n_rejected_without_insertion() {
        let mut trie = UmiTrie::new();
        assert_eq!(trie.lookup_or_create(b"AAAAAAAAAAAN").unwrap(), None);
        assert_eq!(trie.distinct_umis(), 0);
        // The rejected UMI must not leave partial paths that alias other
        // UMIs' leaves.
        assert_eq!(trie.nodes.len(), 1);
    }

    #[test]
    fn test_bad_symbol_is_fatal() {
        let mut trie = UmiTrie::new();
        assert!(matches!(
            trie.lookup_or_create(b"AAAAAAAAAAA-"),
            Err(Error::StreamAlphabet { region: "UMI", .. })
        ));
    }
}
