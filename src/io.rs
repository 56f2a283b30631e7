use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use flate2::read::MultiGzDecoder;
use indicatif::ProgressBar;
use log::info;
use needletail::parse_fastx_file;

use crate::errors::{Error, Result};
use crate::pipeline::{Counters, Pipeline};
use crate::tags::TagCatalog;

/// Read the cell-barcode whitelist, one barcode per line. The format is
/// chosen by extension: `.txt` plaintext or `.gz` gzip; anything else is a
/// fatal whitelist error. Blank lines are skipped; all validation of the
/// barcodes themselves happens when the trie is built.
pub fn read_whitelist(path: &Path) -> Result<Vec<Vec<u8>>> {
    let ext = path.extension().and_then(|e| e.to_str());
    let file = File::open(path).map_err(|source| Error::FileIo {
        path: path.to_path_buf(),
        source,
    })?;
    let reader: Box<dyn BufRead> = match ext {
        Some("gz") => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        Some("txt") => Box::new(BufReader::new(file)),
        _ => {
            return Err(Error::WhitelistExtension {
                path: path.to_path_buf(),
            })
        }
    };

    let mut barcodes = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source| Error::FileIo {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            barcodes.push(trimmed.as_bytes().to_vec());
        }
    }
    info!("loaded {} whitelist lines from {}", barcodes.len(), path.display());
    Ok(barcodes)
}

/// Read the taglist CSV of headerless `sequence,name` rows. Structural
/// validation (lengths, duplicates, pairwise distance) is the catalog's job.
pub fn read_taglist(path: &Path) -> Result<Vec<(String, String)>> {
    let file = File::open(path).map_err(|source| Error::FileIo {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| Error::TagListFormat {
            reason: e.to_string(),
        })?;
        let sequence = record.get(0).unwrap_or("").to_string();
        let name = match record.get(1) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(Error::TagListFormat {
                    reason: format!("row \"{sequence}\" is missing a tag name"),
                })
            }
        };
        records.push((sequence, name));
    }
    info!("loaded {} taglist rows from {}", records.len(), path.display());
    Ok(records)
}

/// Stream one read pair file couple through the pipeline, in lockstep. The
/// couple ends as soon as either stream ends; no partial pair is processed.
pub fn stream_pairs(
    r1_path: &Path,
    r2_path: &Path,
    pipeline: &mut Pipeline,
    counters: &mut Counters,
    progress: &ProgressBar,
) -> Result<()> {
    let mut reader1 =
        parse_fastx_file(r1_path).map_err(|e| Error::FastqParse(e.to_string()))?;
    let mut reader2 =
        parse_fastx_file(r2_path).map_err(|e| Error::FastqParse(e.to_string()))?;

    loop {
        let Some(rec1) = reader1.next() else { break };
        let rec1 = rec1.map_err(|e| Error::FastqParse(e.to_string()))?;
        let Some(rec2) = reader2.next() else { break };
        let rec2 = rec2.map_err(|e| Error::FastqParse(e.to_string()))?;

        let qual1 = rec1.qual().ok_or(Error::MissingQuality)?;
        let outcome = pipeline.process_pair(&rec1.seq(), qual1, &rec2.seq())?;
        counters.record(outcome);
        progress.inc(1);
    }
    Ok(())
}

/// Write the per-barcode tag counts CSV: header
/// `cell_barcode,total,<name_1>,...,<name_k>` in catalog order, then one row
/// per whitelist barcode with a nonzero total, in whitelist order.
pub fn write_counts_csv(
    path: &Path,
    catalog: &TagCatalog,
    pipeline: &Pipeline,
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header = csv::ByteRecord::new();
    header.push_field(b"cell_barcode");
    header.push_field(b"total");
    for name in catalog.names() {
        header.push_field(name.as_bytes());
    }
    writer.write_byte_record(&header)?;

    let mut rows = 0usize;
    let mut record = csv::ByteRecord::new();
    for (barcode, total, counts) in pipeline.barcodes().iter_counts() {
        if total == 0 {
            continue;
        }
        record.clear();
        record.push_field(barcode);
        record.push_field(total.to_string().as_bytes());
        for count in counts {
            record.push_field(count.to_string().as_bytes());
        }
        writer.write_byte_record(&record)?;
        rows += 1;
    }
    writer.flush()?;
    info!("wrote {} barcode rows to {}", rows, path.display());
    Ok(())
}
