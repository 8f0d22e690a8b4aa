use thiserror::Error;

/// Failures that stop one recording from being processed.
#[derive(Debug, Error)]
pub enum StudyboxError {
    #[error("WAV data shorter than the {0}-byte header")]
    TruncatedHeader(usize),

    #[error("Missing RIFF/WAVE signature")]
    NotRiff,

    #[error("Sample position {0} does not fit in a 32-bit container field")]
    PositionOverflow(usize),

    #[error("{0}-byte chunk does not fit in a 32-bit length field")]
    ChunkTooLarge(usize),

    #[error("{0} page(s) failed validation, container not written")]
    InvalidPages(usize),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StudyboxError>;

/// Page-scoped decode problems. None of these abort the scan; they only
/// mark the page they occur in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageFault {
    #[error("Gap too large: {position}")]
    SyncLoss { position: usize },

    #[error("0 bit expected (start of byte marker) at {position}")]
    FramingViolation { position: usize },

    #[error("Gap too large (after 0): {position}")]
    IllegalCellAfterZero { position: usize },

    #[error("Header byte {found:#04X} is not {expected:#04X}")]
    HeaderMismatch { found: u8, expected: u8 },

    #[error("Lead-in at {lead_in} starts after data start {data_start}")]
    LeadInAfterDataStart { lead_in: usize, data_start: usize },

    #[error("Page still invalid after {retries} filtered retries")]
    RetryExhausted { retries: u32 },
}
