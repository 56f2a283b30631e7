use crate::barcodes::{BarcodeTrie, LeafId};
use crate::errors::{Error, Result};
use crate::tags::TagTrie;
use crate::umis::UmiTrie;
use crate::{base_index, Config, BASES};

/// What happened to one read pair. Returned by the per-pair step so callers
/// aggregate counts themselves instead of the pipeline mutating globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Barcode failed both exact and single-mismatch resolution.
    BarcodeMiss,
    /// Barcode resolved but the tag did not.
    TagMiss { corrected: bool },
    /// Barcode and tag resolved but nothing was counted: the UMI contained
    /// N or the (barcode, UMI, tag) triple was already seen.
    NotCounted { corrected: bool },
    /// First sighting of this (barcode, UMI, tag) triple; the barcode's
    /// count for the tag was incremented.
    Counted { corrected: bool },
}

/// Run-level counters, aggregated from per-read outcomes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Counters {
    pub total_reads: u64,
    /// Reads whose barcode resolved, exactly or via correction.
    pub valid_barcodes: u64,
    /// Subset of `valid_barcodes` resolved via a substitution.
    pub corrected_barcodes: u64,
    /// Reads whose tag resolved, given a valid barcode.
    pub valid_tags: u64,
    /// Reads that passed deduplication and were counted.
    pub counted: u64,
}

impl Counters {
    pub fn record(&mut self, outcome: ReadOutcome) {
        use ReadOutcome::*;
        self.total_reads += 1;
        let corrected = match outcome {
            BarcodeMiss => return,
            TagMiss { corrected } => corrected,
            NotCounted { corrected } | Counted { corrected } => {
                self.valid_tags += 1;
                corrected
            }
        };
        self.valid_barcodes += 1;
        if corrected {
            self.corrected_barcodes += 1;
        }
        if matches!(outcome, Counted { .. }) {
            self.counted += 1;
        }
    }
}

/// The per-read-pair matching engine: fixed-offset extraction, quality-aware
/// barcode resolution, tag lookup, and UMI-scoped deduplication.
pub struct Pipeline {
    cfg: Config,
    barcodes: BarcodeTrie,
    tags: TagTrie,
    umis: UmiTrie,
}

impl Pipeline {
    pub fn new(cfg: Config, barcodes: BarcodeTrie, tags: TagTrie) -> Self {
        Pipeline {
            cfg,
            barcodes,
            tags,
            umis: UmiTrie::new(),
        }
    }

    /// Process one read pair: barcode and UMI from read 1, tag from read 2.
    /// `r1_qual` is read 1's full quality string; only the bytes aligned
    /// with the barcode region are consulted.
    pub fn process_pair(
        &mut self,
        r1_seq: &[u8],
        r1_qual: &[u8],
        r2_seq: &[u8],
    ) -> Result<ReadOutcome> {
        let cfg = &self.cfg;
        let bc_end = cfg.bc_first + cfg.bc_len;
        let umi_end = cfg.umi_first + cfg.umi_len;
        let tag_end = cfg.tag_first + cfg.tag_len;
        if r1_seq.len() < bc_end || r1_seq.len() < umi_end {
            return Err(Error::ReadTooShort {
                region: "barcode/UMI",
                len: r1_seq.len(),
                needed: bc_end.max(umi_end),
            });
        }
        if r1_qual.len() < bc_end {
            return Err(Error::ReadTooShort {
                region: "barcode quality",
                len: r1_qual.len(),
                needed: bc_end,
            });
        }
        if r2_seq.len() < tag_end {
            return Err(Error::ReadTooShort {
                region: "tag",
                len: r2_seq.len(),
                needed: tag_end,
            });
        }

        let barcode = &r1_seq[cfg.bc_first..bc_end];
        let bc_quals = &r1_qual[cfg.bc_first..bc_end];
        let umi = &r1_seq[cfg.umi_first..umi_end];
        let tag = &r2_seq[cfg.tag_first..tag_end];

        let Some((bc_leaf, corrected)) = self.resolve_barcode(barcode, bc_quals)? else {
            return Ok(ReadOutcome::BarcodeMiss);
        };

        let Some(tag_index) = self.tags.lookup(tag)? else {
            return Ok(ReadOutcome::TagMiss { corrected });
        };

        let Some(umi_leaf) = self.umis.lookup_or_create(umi)? else {
            return Ok(ReadOutcome::NotCounted { corrected });
        };
        // Dedup against the resolved whitelist barcode, not the raw
        // observed one, so a read and its corrected twin share one molecule.
        if self
            .umis
            .mark_seen(umi_leaf, tag_index, self.barcodes.barcode(bc_leaf))
        {
            self.barcodes.record_hit(bc_leaf, tag_index);
            Ok(ReadOutcome::Counted { corrected })
        } else {
            Ok(ReadOutcome::NotCounted { corrected })
        }
    }

    /// Resolve a barcode exactly or by a single quality-gated substitution.
    ///
    /// On an exact miss, positions are scanned left to right; at each
    /// position whose basecall is below the quality cutoff the other
    /// canonical bases are tried in cyclic order starting after the observed
    /// base (all four, in order, when the observed base is N). The first
    /// hit wins and ends the whole scan; combinations across positions are
    /// never tried, and nothing is tried at positions of adequate quality
    /// even if the read then stays unresolved.
    fn resolve_barcode(&self, barcode: &[u8], quals: &[u8]) -> Result<Option<(LeafId, bool)>> {
        if let Some(leaf) = self.barcodes.lookup(barcode)? {
            return Ok(Some((leaf, false)));
        }
        let cutoff = self.cfg.qual_cutoff();
        let mut candidate = barcode.to_vec();
        for pos in 0..barcode.len() {
            if quals[pos] >= cutoff {
                continue;
            }
            let observed = barcode[pos];
            // The exact lookup above already rejected symbols outside
            // {A,C,G,T,N}, so observed is N or canonical here.
            let (start, substitutes) = match base_index(observed) {
                Some(i) => (i + 1, 3),
                None => (0, 4),
            };
            for r in 0..substitutes {
                candidate[pos] = BASES[(start + r) % 4];
                if let Some(leaf) = self.barcodes.lookup(&candidate)? {
                    return Ok(Some((leaf, true)));
                }
            }
            candidate[pos] = observed;
        }
        Ok(None)
    }

    /// Read-only view of the barcode counters for output.
    pub fn barcodes(&self) -> &BarcodeTrie {
        &self.barcodes
    }

    /// Number of distinct UMIs seen so far.
    pub fn distinct_umis(&self) -> usize {
        self.umis.distinct_umis()
    }
}
