use crate::errors::{Error, Result};
use crate::{base_index, tag_base_index, Config, BASES};

/// Count of differing positions between two equal-length sequences.
///
/// # Panics
/// Panics in debug builds if the slices are of unequal length.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> usize {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

/// One antibody-derived tag: its nucleotide sequence and display name. The
/// catalog ordinal doubles as the column position in the output CSV.
#[derive(Debug, Clone)]
pub struct TagEntry {
    pub sequence: Vec<u8>,
    pub name: String,
}

/// Immutable, validated collection of tags loaded from the taglist.
#[derive(Debug)]
pub struct TagCatalog {
    entries: Vec<TagEntry>,
}

impl TagCatalog {
    /// Validate raw `(sequence, name)` records and build the catalog.
    ///
    /// Every structural violation is fatal: wrong sequence length, non-ACGT
    /// symbol, over-long name, duplicate sequence or name, empty or
    /// oversized list, and any pair of sequences closer than
    /// `cfg.min_tag_hdist`.
    pub fn load(records: Vec<(String, String)>, cfg: &Config) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::EmptyTagList);
        }
        if records.len() > cfg.max_tags {
            return Err(Error::TooManyTags {
                count: records.len(),
                max: cfg.max_tags,
            });
        }

        let mut entries: Vec<TagEntry> = Vec::with_capacity(records.len());
        for (sequence, name) in records {
            if sequence.len() != cfg.tag_len {
                return Err(Error::TagLength {
                    len: sequence.len(),
                    tag: sequence,
                    expected: cfg.tag_len,
                });
            }
            if sequence.bytes().any(|b| base_index(b).is_none()) {
                return Err(Error::TagAlphabet { tag: sequence });
            }
            if name.len() > cfg.name_len {
                return Err(Error::TagNameLength {
                    len: name.len(),
                    name,
                    max: cfg.name_len,
                });
            }
            if entries.iter().any(|e| e.sequence == sequence.as_bytes()) {
                return Err(Error::DuplicateTagSequence { tag: sequence });
            }
            if entries.iter().any(|e| e.name == name) {
                return Err(Error::DuplicateTagName { name });
            }
            entries.push(TagEntry {
                sequence: sequence.into_bytes(),
                name,
            });
        }

        let catalog = TagCatalog { entries };
        catalog.validate_min_distance(cfg.min_tag_hdist)?;
        Ok(catalog)
    }

    /// Check that every pair of catalog sequences is at least `min` apart.
    /// This is the precondition that lets the tag trie expand each sequence
    /// into its full single-substitution neighborhood without collisions.
    pub fn validate_min_distance(&self, min: usize) -> Result<()> {
        for i in 0..self.entries.len() {
            for j in i + 1..self.entries.len() {
                let dist = hamming_distance(&self.entries[i].sequence, &self.entries[j].sequence);
                if dist < min {
                    return Err(Error::TagDistance {
                        a: String::from_utf8_lossy(&self.entries[i].sequence).into_owned(),
                        b: String::from_utf8_lossy(&self.entries[j].sequence).into_owned(),
                        dist,
                        min,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

const NO_CHILD: u32 = u32::MAX;
const NO_TAG: u32 = u32::MAX;

#[derive(Clone)]
struct TagNode {
    children: [u32; 5],
    index: u32,
}

impl TagNode {
    fn new() -> Self {
        TagNode {
            children: [NO_CHILD; 5],
            index: NO_TAG,
        }
    }
}

/// Five-way trie over every canonical tag sequence plus all of its
/// single-substitution neighbors, the fifth arm carrying the `N` wildcard.
/// Nodes live in an index-linked arena; node 0 is the root.
pub struct TagTrie {
    nodes: Vec<TagNode>,
}

impl TagTrie {
    /// Build the trie from a validated catalog. For each entry the canonical
    /// sequence and, per position, the three other canonical bases plus `N`
    /// are inserted, all mapping back to the entry's ordinal.
    pub fn build(catalog: &TagCatalog) -> Self {
        let mut trie = TagTrie {
            nodes: vec![TagNode::new()],
        };
        let mut variant = Vec::new();
        for (index, entry) in catalog.iter().enumerate() {
            trie.insert(&entry.sequence, index);
            for pos in 0..entry.sequence.len() {
                variant.clear();
                variant.extend_from_slice(&entry.sequence);
                for alt in BASES.iter().chain(std::iter::once(&b'N')) {
                    if *alt == entry.sequence[pos] {
                        continue;
                    }
                    variant[pos] = *alt;
                    trie.insert(&variant, index);
                }
            }
        }
        trie
    }

    fn insert(&mut self, sequence: &[u8], index: usize) {
        let mut node = 0usize;
        for &base in sequence {
            // Catalog sequences are ACGT and variants only add N, so the
            // slot always exists.
            let slot = tag_base_index(base).unwrap();
            let child = self.nodes[node].children[slot];
            node = if child == NO_CHILD {
                self.nodes.push(TagNode::new());
                let new = (self.nodes.len() - 1) as u32;
                self.nodes[node].children[slot] = new;
                new as usize
            } else {
                child as usize
            };
        }
        let existing = self.nodes[node].index;
        assert!(
            existing == NO_TAG || existing == index as u32,
            "tag trie collision: catalog violates the minimum pairwise distance"
        );
        self.nodes[node].index = index as u32;
    }

    /// Resolve a tag sequence to its catalog ordinal. `N` is accepted at any
    /// position via the wildcard arm; a missing path is a soft miss; any
    /// symbol outside `{A,C,G,T,N}` is malformed stream data.
    pub fn lookup(&self, tag: &[u8]) -> Result<Option<usize>> {
        let mut node = 0usize;
        for &base in tag {
            let slot = tag_base_index(base).ok_or_else(|| Error::StreamAlphabet {
                region: "tag",
                symbol: base as char,
                seq: String::from_utf8_lossy(tag).into_owned(),
            })?;
            match self.nodes[node].children[slot] {
                NO_CHILD => return Ok(None),
                child => node = child as usize,
            }
        }
        match self.nodes[node].index {
            NO_TAG => Ok(None),
            index => Ok(Some(index as usize)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::default()
    }

    fn catalog_from(seqs: &[(&str, &str)]) -> Result<TagCatalog> {
        TagCatalog::load(
            seqs.iter()
                .map(|(s, n)| (s.to_string(), n.to_string()))
                .collect(),
            &test_config(),
        )
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(b"AAAA", b"AAAA"), 0);
        assert_eq!(hamming_distance(b"AAAA", b"AATT"), 2);
    }

    #[test]
    fn test_catalog_load_ok() {
        let catalog = catalog_from(&[
            ("AAAAAAAAAAAAAAA", "Tag1"),
            ("CCCCCCCCCCCCCCC", "Tag2"),
        ])
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["Tag1", "Tag2"]);
    }

    #[test]
    fn test_catalog_rejects_empty() {
        assert!(matches!(catalog_from(&[]), Err(Error::EmptyTagList)));
    }

    #[test]
    fn test_catalog_rejects_bad_length() {
        assert!(matches!(
            catalog_from(&[("AAAA", "Tag1")]),
            Err(Error::TagLength { .. })
        ));
    }

    #[test]
    fn test_catalog_rejects_non_dna() {
        assert!(matches!(
            catalog_from(&[("AAAAAAAAAAAAAAX", "Tag1")]),
            Err(Error::TagAlphabet { .. })
        ));
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        assert!(matches!(
            catalog_from(&[("AAAAAAAAAAAAAAA", "Tag1"), ("AAAAAAAAAAAAAAA", "Tag2")]),
            Err(Error::DuplicateTagSequence { .. })
        ));
        assert!(matches!(
            catalog_from(&[("AAAAAAAAAAAAAAA", "Tag1"), ("CCCCCCCCCCCCCCC", "Tag1")]),
            Err(Error::DuplicateTagName { .. })
        ));
    }

    #[test]
    fn test_catalog_rejects_close_tags() {
        // Distance 1, minimum is 3.
        let err = catalog_from(&[("AAAAAAAAAAAAAAA", "Tag1"), ("AAAAAAAAAAAAAAC", "Tag2")]);
        assert!(matches!(err, Err(Error::TagDistance { dist: 1, .. })));
    }

    #[test]
    fn test_catalog_rejects_over_long_name() {
        let long_name = "x".repeat(51);
        let result = TagCatalog::load(
            vec![("AAAAAAAAAAAAAAA".to_string(), long_name)],
            &test_config(),
        );
        assert!(matches!(result, Err(Error::TagNameLength { .. })));
    }

    #[test]
    fn test_tag_trie_neighborhood_complete() {
        let catalog = catalog_from(&[
            ("AAAAAAAAAAAAAAA", "Tag1"),
            ("CCCCCCCCCCCCCCC", "Tag2"),
        ])
        .unwrap();
        let trie = TagTrie::build(&catalog);

        // Canonical sequences resolve to their own ordinal.
        assert_eq!(trie.lookup(b"AAAAAAAAAAAAAAA").unwrap(), Some(0));
        assert_eq!(trie.lookup(b"CCCCCCCCCCCCCCC").unwrap(), Some(1));

        // Every single substitution, including to N, resolves too.
        let canonical = b"AAAAAAAAAAAAAAA";
        for pos in 0..canonical.len() {
            for alt in [b'C', b'G', b'T', b'N'] {
                let mut variant = canonical.to_vec();
                variant[pos] = alt;
                assert_eq!(trie.lookup(&variant).unwrap(), Some(0), "pos {pos} alt {alt}");
            }
        }
    }

    #[test]
    fn test_tag_trie_misses_at_distance_two() {
        let catalog = catalog_from(&[("AAAAAAAAAAAAAAA", "Tag1")]).unwrap();
        let trie = TagTrie::build(&catalog);
        assert_eq!(trie.lookup(b"TTAAAAAAAAAAAAA").unwrap(), None);
        assert_eq!(trie.lookup(b"NNAAAAAAAAAAAAA").unwrap(), None);
    }

    #[test]
    fn test_tag_trie_rejects_bad_symbol() {
        let catalog = catalog_from(&[("AAAAAAAAAAAAAAA", "Tag1")]).unwrap();
        let trie = TagTrie::build(&catalog);
        assert!(matches!(
            trie.lookup(b"AAAAAAA.AAAAAAA"),
            Err(Error::StreamAlphabet { region: "tag", .. })
        ));
    }
}
