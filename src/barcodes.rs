use crate::base_index;
use crate::errors::{Error, Result};

const NO_CHILD: u32 = u32::MAX;
const NO_LEAF: u32 = u32::MAX;

#[derive(Clone)]
struct BcNode {
    children: [u32; 4],
    leaf: u32,
}

impl BcNode {
    fn new() -> Self {
        BcNode {
            children: [NO_CHILD; 4],
            leaf: NO_LEAF,
        }
    }
}

struct BcLeaf {
    barcode: Vec<u8>,
    total: u64,
    counts: Vec<u32>,
}

/// Handle to a whitelisted barcode's counters. Only valid for the trie that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafId(u32);

/// Four-way exact-match trie over the cell-barcode whitelist. Nodes live in
/// an index-linked arena; leaves hold the per-tag count vector and total for
/// one accepted barcode, in whitelist order.
pub struct BarcodeTrie {
    nodes: Vec<BcNode>,
    leaves: Vec<BcLeaf>,
    bc_len: usize,
}

impl BarcodeTrie {
    /// Build the trie from an ordered whitelist. Each entry must be exactly
    /// `bc_len` bases of pure ACGT; one malformed line invalidates the whole
    /// load. Listing a barcode twice is harmless, its counters are allocated
    /// once.
    pub fn build(whitelist: &[Vec<u8>], bc_len: usize, tag_count: usize) -> Result<Self> {
        let mut trie = BarcodeTrie {
            nodes: vec![BcNode::new()],
            leaves: Vec::new(),
            bc_len,
        };
        for barcode in whitelist {
            trie.insert(barcode, tag_count)?;
        }
        Ok(trie)
    }

    fn insert(&mut self, barcode: &[u8], tag_count: usize) -> Result<()> {
        if barcode.len() != self.bc_len {
            return Err(Error::BarcodeLength {
                barcode: String::from_utf8_lossy(barcode).into_owned(),
                len: barcode.len(),
                expected: self.bc_len,
            });
        }
        let mut node = 0usize;
        for &base in barcode {
            let slot = base_index(base).ok_or_else(|| Error::BarcodeAlphabet {
                barcode: String::from_utf8_lossy(barcode).into_owned(),
            })?;
            let child = self.nodes[node].children[slot];
            node = if child == NO_CHILD {
                self.nodes.push(BcNode::new());
                let new = (self.nodes.len() - 1) as u32;
                self.nodes[node].children[slot] = new;
                new as usize
            } else {
                child as usize
            };
        }
        if self.nodes[node].leaf == NO_LEAF {
            self.leaves.push(BcLeaf {
                barcode: barcode.to_vec(),
                total: 0,
                counts: vec![0; tag_count],
            });
            self.nodes[node].leaf = (self.leaves.len() - 1) as u32;
        }
        Ok(())
    }

    /// Exact lookup. A missing path or an `N` anywhere in the query is a
    /// soft miss; any other non-DNA symbol is malformed stream data.
    pub fn lookup(&self, barcode: &[u8]) -> Result<Option<LeafId>> {
        let mut node = 0usize;
        for &base in barcode {
            if base == b'N' {
                return Ok(None);
            }
            let slot = base_index(base).ok_or_else(|| Error::StreamAlphabet {
                region: "barcode",
                symbol: base as char,
                seq: String::from_utf8_lossy(barcode).into_owned(),
            })?;
            match self.nodes[node].children[slot] {
                NO_CHILD => return Ok(None),
                child => node = child as usize,
            }
        }
        match self.nodes[node].leaf {
            NO_LEAF => Ok(None),
            leaf => Ok(Some(LeafId(leaf))),
        }
    }

    /// Credit one deduplicated read to `tag_index` for this barcode.
    pub fn record_hit(&mut self, leaf: LeafId, tag_index: usize) {
        let leaf = &mut self.leaves[leaf.0 as usize];
        leaf.counts[tag_index] += 1;
        leaf.total += 1;
    }

    /// The whitelist string behind a leaf.
    pub fn barcode(&self, leaf: LeafId) -> &[u8] {
        &self.leaves[leaf.0 as usize].barcode
    }

    /// Number of distinct whitelisted barcodes.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Leaves in whitelist order as `(barcode, total, per-tag counts)`.
    pub fn iter_counts(&self) -> impl Iterator<Item = (&[u8], u64, &[u32])> {
        self.leaves
            .iter()
            .map(|l| (l.barcode.as_slice(), l.total, l.counts.as_slice()))
    }

    /// Sum of `total` over all leaves.
    pub fn grand_total(&self) -> u64 {
        self.leaves.iter().map(|l| l.total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist(entries: &[&str]) -> Vec<Vec<u8>> {
        entries.iter().map(|e| e.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_round_trip() {
        let wl = whitelist(&["AAAACCCCGGGGTTTT", "TTTTGGGGCCCCAAAA"]);
        let trie = BarcodeTrie::build(&wl, 16, 2).unwrap();
        assert_eq!(trie.len(), 2);
        for bc in &wl {
            let leaf = trie.lookup(bc).unwrap().expect("whitelisted barcode");
            assert_eq!(trie.barcode(leaf), bc.as_slice());
        }
        // Alphabet-valid but never inserted.
        assert_eq!(trie.lookup(b"ACGTACGTACGTACGT").unwrap(), None);
        // Shares a 15-base prefix with a whitelist entry.
        assert_eq!(trie.lookup(b"AAAACCCCGGGGTTTA").unwrap(), None);
    }

    #[test]
    fn test_n_in_query_is_soft_miss() {
        let wl = whitelist(&["AAAACCCCGGGGTTTT"]);
        let trie = BarcodeTrie::build(&wl, 16, 1).unwrap();
        assert_eq!(trie.lookup(b"NAAACCCCGGGGTTTT").unwrap(), None);
    }

    #[test]
    fn test_bad_symbol_in_query_is_fatal() {
        let wl = whitelist(&["AAAACCCCGGGGTTTT"]);
        let trie = BarcodeTrie::build(&wl, 16, 1).unwrap();
        assert!(matches!(
            trie.lookup(b"ZAAACCCCGGGGTTTT"),
            Err(Error::StreamAlphabet { region: "barcode", .. })
        ));
    }

    #[test]
    fn test_build_rejects_malformed_whitelist() {
        assert!(matches!(
            BarcodeTrie::build(&whitelist(&["AAAA"]), 16, 1),
            Err(Error::BarcodeLength { .. })
        ));
        assert!(matches!(
            BarcodeTrie::build(&whitelist(&["AAAACCCCGGGGTTTN"]), 16, 1),
            Err(Error::BarcodeAlphabet { .. })
        ));
    }

    #[test]
    fn test_duplicate_whitelist_entry_is_idempotent() {
        let wl = whitelist(&["AAAACCCCGGGGTTTT", "AAAACCCCGGGGTTTT"]);
        let trie = BarcodeTrie::build(&wl, 16, 1).unwrap();
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_record_hit_accumulates() {
        let wl = whitelist(&["AAAACCCCGGGGTTTT"]);
        let mut trie = BarcodeTrie::build(&wl, 16, 3).unwrap();
        let leaf = trie.lookup(b"AAAACCCCGGGGTTTT").unwrap().unwrap();
        trie.record_hit(leaf, 1);
        trie.record_hit(leaf, 1);
        trie.record_hit(leaf, 2);
        let (_, total, counts) = trie.iter_counts().next().unwrap();
        assert_eq!(total, 3);
        assert_eq!(counts, &[0, 2, 1]);
        assert_eq!(trie.grand_total(), 3);
    }
}
