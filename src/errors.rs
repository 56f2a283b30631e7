use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal conditions. Per-record resolution failures (unknown barcode,
/// unmatched tag, UMI containing N) are not errors; they only show up in the
/// aggregate counters.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not read \"{}\": {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("taglist is empty")]
    EmptyTagList,

    #[error("taglist has {count} tags, the maximum is {max}")]
    TooManyTags { count: usize, max: usize },

    #[error("tag {tag} has length {len}, all tags must be exactly {expected} bases")]
    TagLength {
        tag: String,
        len: usize,
        expected: usize,
    },

    #[error("tag name {name} has length {len}, the maximum is {max}")]
    TagNameLength {
        name: String,
        len: usize,
        max: usize,
    },

    #[error("tag sequence {tag} is listed multiple times in the taglist")]
    DuplicateTagSequence { tag: String },

    #[error("tag name {name} is listed multiple times in the taglist")]
    DuplicateTagName { name: String },

    #[error("Hamming distance between tags {a} and {b} is {dist}, the minimum allowed is {min}")]
    TagDistance {
        a: String,
        b: String,
        dist: usize,
        min: usize,
    },

    #[error("non-DNA base in taglist tag {tag}")]
    TagAlphabet { tag: String },

    #[error("malformed taglist record: {reason}")]
    TagListFormat { reason: String },

    #[error("whitelist barcode {barcode} has length {len}, barcodes must be {expected} bases")]
    BarcodeLength {
        barcode: String,
        len: usize,
        expected: usize,
    },

    #[error("non-DNA base in whitelist barcode {barcode}")]
    BarcodeAlphabet { barcode: String },

    #[error("unknown whitelist file extension on \"{}\", expected .txt or .gz", path.display())]
    WhitelistExtension { path: PathBuf },

    #[error("{count} read1 files and {count2} read2 files were provided, counts must be equal")]
    UnpairedFastqs { count: usize, count2: usize },

    #[error("maximum number of fastq pairs ({max}) exceeded")]
    TooManyFastqs { max: usize },

    #[error("fastq path \"{}\" does not exist", path.display())]
    MissingFastq { path: PathBuf },

    #[error("fastq file \"{}\" is not in standard Illumina naming format", path.display())]
    FastqNaming { path: PathBuf },

    #[error("fastq file \"{}\" does not carry the expected {expected} label", path.display())]
    FastqReadLabel { path: PathBuf, expected: &'static str },

    #[error("input fastqs must share one sample name, found {first} and {second}")]
    SampleNameMismatch { first: String, second: String },

    #[error("non-DNA base '{symbol}' in {region} \"{seq}\" from input fastq")]
    StreamAlphabet {
        region: &'static str,
        symbol: char,
        seq: String,
    },

    #[error("read of length {len} is too short for the configured {region} region (needs {needed} bases)")]
    ReadTooShort {
        region: &'static str,
        len: usize,
        needed: usize,
    },

    #[error("read1 record is missing quality scores, input must be fastq")]
    MissingQuality,

    #[error("fastq parse error: {0}")]
    FastqParse(String),
}

impl Error {
    /// Process exit status for this failure, one per category so callers can
    /// tell load-time config problems from malformed stream data.
    pub fn exit_code(&self) -> i32 {
        use Error::*;
        match self {
            FileIo { .. } | FastqParse(_) => 2,
            EmptyTagList
            | TooManyTags { .. }
            | TagLength { .. }
            | TagNameLength { .. }
            | DuplicateTagSequence { .. }
            | DuplicateTagName { .. }
            | TagDistance { .. }
            | TagAlphabet { .. }
            | TagListFormat { .. } => 3,
            BarcodeLength { .. } | BarcodeAlphabet { .. } | WhitelistExtension { .. } => 4,
            UnpairedFastqs { .. }
            | TooManyFastqs { .. }
            | MissingFastq { .. }
            | FastqNaming { .. }
            | FastqReadLabel { .. }
            | SampleNameMismatch { .. } => 5,
            StreamAlphabet { .. } | ReadTooShort { .. } | MissingQuality => 6,
        }
    }
}
