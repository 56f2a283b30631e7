pub mod barcodes;
pub mod errors;
pub mod io;
pub mod pipeline;
pub mod tags;
pub mod umis;

/// Canonical nucleotide alphabet in the fixed cyclic order used by barcode
/// correction (A -> C -> G -> T -> A).
pub const BASES: [u8; 4] = *b"ACGT";

/// Map a canonical base to its child slot in the 4-way tries (A=0, C=1,
/// G=2, T=3). Returns `None` for any other byte, including `N`; callers
/// decide whether that is a soft miss or malformed input.
#[inline]
pub fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Map a base to its child slot in the 5-way tag trie, where `N` occupies
/// the wildcard arm (index 4).
#[inline]
pub fn tag_base_index(base: u8) -> Option<usize> {
    match base {
        b'N' => Some(4),
        other => base_index(other),
    }
}

/// Fixed run parameters. The reference tool hard-codes these; here they are
/// plain data so the CLI can override them per run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cell barcode length in read 1.
    pub bc_len: usize,
    /// UMI length in read 1.
    pub umi_len: usize,
    /// Antibody tag length in read 2.
    pub tag_len: usize,
    /// Offset of the barcode in read 1.
    pub bc_first: usize,
    /// Offset of the UMI in read 1.
    pub umi_first: usize,
    /// Offset of the tag in read 2.
    pub tag_first: usize,
    /// Phred quality below which a barcode base is eligible for correction.
    pub min_phred: u8,
    /// Maximum number of catalog entries.
    pub max_tags: usize,
    /// Maximum tag display-name length.
    pub name_len: usize,
    /// Minimum pairwise Hamming distance between catalog sequences.
    pub min_tag_hdist: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bc_len: 16,
            umi_len: 12,
            tag_len: 15,
            bc_first: 0,
            umi_first: 16,
            tag_first: 0,
            min_phred: 20,
            max_tags: 300,
            name_len: 50,
            min_tag_hdist: 3,
        }
    }
}

impl Config {
    /// Raw Phred+33 byte threshold; quality bytes strictly below this mark a
    /// basecall as low quality.
    #[inline]
    pub fn qual_cutoff(&self) -> u8 {
        33 + self.min_phred
    }
}
