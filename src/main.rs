use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Duration;

use barcounter::barcodes::BarcodeTrie;
use barcounter::errors::Error;
use barcounter::io::{read_taglist, read_whitelist, stream_pairs, write_counts_csv};
use barcounter::pipeline::{Counters, Pipeline};
use barcounter::tags::{TagCatalog, TagTrie};
use barcounter::Config;

/// Maximum number of fastq pairs per run.
const MAX_FASTQ: usize = 100;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Counts valid antibody-derived tags (ADTs) per whitelisted cell barcode, once per UMI"
)]
struct Args {
    /// Cell barcode whitelist, one barcode per line (.txt or .gz)
    #[arg(short, long)]
    whitelist: PathBuf,

    /// Taglist in CSV format: sequence,name rows with no header
    #[arg(short, long)]
    taglist: PathBuf,

    /// Read1 fastq files (gzipped), comma-separated with no spaces
    #[arg(short = '1', long)]
    read1: String,

    /// Read2 fastq files (gzipped), comma-separated with no spaces
    #[arg(short = '2', long)]
    read2: String,

    /// Output directory; created if it does not exist
    #[arg(short, long)]
    outdir: PathBuf,

    /// Cell barcode length in read1
    #[arg(long, default_value_t = 16)]
    bc_length: usize,

    /// UMI length in read1
    #[arg(long, default_value_t = 12)]
    umi_length: usize,

    /// Tag length in read2
    #[arg(long, default_value_t = 15)]
    tag_length: usize,

    /// Offset of the barcode in read1
    #[arg(long, default_value_t = 0)]
    bc_offset: usize,

    /// Offset of the UMI in read1; defaults to right after the barcode
    #[arg(long)]
    umi_offset: Option<usize>,

    /// Offset of the tag in read2
    #[arg(long, default_value_t = 0)]
    tag_offset: usize,

    /// Phred quality below which a barcode base may be substituted
    #[arg(long, default_value_t = 20)]
    quality_threshold: u8,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            bc_len: self.bc_length,
            umi_len: self.umi_length,
            tag_len: self.tag_length,
            bc_first: self.bc_offset,
            umi_first: self.umi_offset.unwrap_or(self.bc_offset + self.bc_length),
            tag_first: self.tag_offset,
            min_phred: self.quality_threshold,
            ..Config::default()
        }
    }
}

/// First `_`-delimited field of an Illumina-style fastq basename, e.g.
/// `Sample` for `Sample_S1_L001_R1_001.fastq.gz`.
fn sample_name(path: &Path) -> Result<String, Error> {
    let fields = name_fields(path)?;
    Ok(fields[0].clone())
}

/// Fourth `_`-delimited field, which Illumina convention reserves for the
/// read label (`R1`/`R2`).
fn read_label(path: &Path) -> Result<String, Error> {
    let fields = name_fields(path)?;
    Ok(fields[3].clone())
}

fn name_fields(path: &Path) -> Result<Vec<String>, Error> {
    let naming_err = || Error::FastqNaming {
        path: path.to_path_buf(),
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(naming_err)?;
    let fields: Vec<String> = name.split('_').map(str::to_string).collect();
    if fields.len() < 4 {
        return Err(naming_err());
    }
    Ok(fields)
}

/// Check the fastq path lists: equal counts, within the pair limit, every
/// file present, a single shared sample name, and R1/R2 labels in the right
/// lists. Returns the sample name, which names the output files.
fn validate_fastq_pairs(paths1: &[PathBuf], paths2: &[PathBuf]) -> Result<String, Error> {
    if paths1.len() != paths2.len() || paths1.is_empty() {
        return Err(Error::UnpairedFastqs {
            count: paths1.len(),
            count2: paths2.len(),
        });
    }
    if paths1.len() > MAX_FASTQ {
        return Err(Error::TooManyFastqs { max: MAX_FASTQ });
    }
    for path in paths1.iter().chain(paths2) {
        if !path.is_file() {
            return Err(Error::MissingFastq {
                path: path.clone(),
            });
        }
    }

    let sample = sample_name(&paths1[0])?;
    for (paths, expected) in [(paths1, "R1"), (paths2, "R2")] {
        for path in paths {
            let found = sample_name(path)?;
            if found != sample {
                return Err(Error::SampleNameMismatch {
                    first: sample,
                    second: found,
                });
            }
            if read_label(path)? != expected {
                return Err(Error::FastqReadLabel {
                    path: path.clone(),
                    expected,
                });
            }
        }
    }
    Ok(sample)
}

fn split_paths(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn run(args: Args) -> Result<()> {
    let cfg = args.config();
    let paths1 = split_paths(&args.read1);
    let paths2 = split_paths(&args.read2);
    let sample = validate_fastq_pairs(&paths1, &paths2)?;

    info!("whitelist: {}", args.whitelist.display());
    info!("taglist: {}", args.taglist.display());
    for (r1, r2) in paths1.iter().zip(&paths2) {
        info!("fastq pair: {} / {}", r1.display(), r2.display());
    }

    if args.outdir.is_dir() {
        info!("output will be written to existing directory {}", args.outdir.display());
    } else {
        info!("creating output directory {}", args.outdir.display());
        std::fs::create_dir_all(&args.outdir).map_err(|source| Error::FileIo {
            path: args.outdir.clone(),
            source,
        })?;
    }
    let counts_path = args.outdir.join(format!("{sample}_Tag_Counts.csv"));
    info!("ADT counts will be written to {}", counts_path.display());

    let catalog = TagCatalog::load(read_taglist(&args.taglist)?, &cfg)?;
    info!("taglist loaded: {} tags", catalog.len());
    let tag_trie = TagTrie::build(&catalog);

    let whitelist = read_whitelist(&args.whitelist)?;
    let barcodes = BarcodeTrie::build(&whitelist, cfg.bc_len, catalog.len())?;
    info!("barcode whitelist loaded: {} barcodes", barcodes.len());

    let mut pipeline = Pipeline::new(cfg, barcodes, tag_trie);
    let mut counters = Counters::default();

    let progress = ProgressBar::new_spinner().with_style(ProgressStyle::with_template(
        "{spinner} {human_pos} reads processed ({per_sec})",
    )?);
    progress.enable_steady_tick(Duration::from_millis(100));

    for (r1, r2) in paths1.iter().zip(&paths2) {
        info!("processing pair {} / {}", r1.display(), r2.display());
        stream_pairs(r1, r2, &mut pipeline, &mut counters, &progress)?;
    }
    progress.finish_and_clear();

    write_counts_csv(&counts_path, &catalog, &pipeline)?;

    info!("processing complete: {} distinct UMIs", pipeline.distinct_umis());
    println!("Total reads processed: {}", counters.total_reads);
    println!(
        "Uncorrected barcodes: {}",
        counters.valid_barcodes - counters.corrected_barcodes
    );
    println!("Corrected barcodes: {}", counters.corrected_barcodes);
    println!("Total valid barcodes: {}", counters.valid_barcodes);
    println!("Valid tags: {}", counters.valid_tags);
    println!("Counted reads: {}", counters.counted);

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(err) = run(args) {
        error!("{err:#}");
        let code = err.downcast_ref::<Error>().map_or(1, Error::exit_code);
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_name_and_label() {
        let path = Path::new("/data/PBMC_S1_L001_R1_001.fastq.gz");
        assert_eq!(sample_name(path).unwrap(), "PBMC");
        assert_eq!(read_label(path).unwrap(), "R1");
    }

    #[test]
    fn test_non_illumina_name_rejected() {
        assert!(matches!(
            sample_name(Path::new("reads.fastq.gz")),
            Err(Error::FastqNaming { .. })
        ));
    }

    #[test]
    fn test_validate_fastq_pairs_count_mismatch() {
        let paths1 = vec![PathBuf::from("a_S1_L001_R1_001.fastq.gz")];
        let paths2: Vec<PathBuf> = vec![];
        assert!(matches!(
            validate_fastq_pairs(&paths1, &paths2),
            Err(Error::UnpairedFastqs { .. })
        ));
    }

    #[test]
    fn test_validate_fastq_pairs_missing_file() {
        let paths1 = vec![PathBuf::from("/no/such/a_S1_L001_R1_001.fastq.gz")];
        let paths2 = vec![PathBuf::from("/no/such/a_S1_L001_R2_001.fastq.gz")];
        assert!(matches!(
            validate_fastq_pairs(&paths1, &paths2),
            Err(Error::MissingFastq { .. })
        ));
    }

    #[test]
    fn test_split_paths() {
        let paths = split_paths("a.fastq.gz,b.fastq.gz");
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1], PathBuf::from("b.fastq.gz"));
    }

    #[test]
    fn test_args_parsing_defaults() {
        let args = Args::try_parse_from([
            "barcounter",
            "-w", "wl.txt",
            "-t", "tags.csv",
            "-1", "a_S1_L001_R1_001.fastq.gz",
            "-2", "a_S1_L001_R2_001.fastq.gz",
            "-o", "out",
        ])
        .unwrap();
        let cfg = args.config();
        assert_eq!(cfg.bc_len, 16);
        assert_eq!(cfg.umi_len, 12);
        assert_eq!(cfg.tag_len, 15);
        assert_eq!(cfg.umi_first, 16);
        assert_eq!(cfg.qual_cutoff(), 53);
    }

    #[test]
    fn test_umi_offset_follows_barcode_by_default() {
        let args = Args::try_parse_from([
            "barcounter",
            "-w", "wl.txt",
            "-t", "tags.csv",
            "-1", "a_S1_L001_R1_001.fastq.gz",
            "-2", "a_S1_L001_R2_001.fastq.gz",
            "-o", "out",
            "--bc-offset", "4",
            "--bc-length", "10",
        ])
        .unwrap();
        assert_eq!(args.config().umi_first, 14);
    }
}
