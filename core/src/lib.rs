//! Studybox tape decoder
//!
//! Recovers data pages from a 16-bit PCM capture of a Studybox cassette and
//! packs them, together with a mono copy of the recording, into a `.studybox`
//! container.

pub mod error;
pub mod config;
pub mod wav;
pub mod samples;
pub mod clock;
pub mod timing;
pub mod assembler;
pub mod page;
pub mod decoder;
pub mod container;
pub mod encoder;

pub use config::DecoderConfig;
pub use container::{ContainerWriter, Emission};
pub use decoder::{DecodeReport, DecodeSession};
pub use encoder::Encoder;
pub use error::{PageFault, Result, StudyboxError};
pub use page::Page;

// Recording format
pub const SAMPLE_RATE: u32 = 44100;
pub const WAV_HEADER_SIZE: usize = 44;
pub const STEREO_FRAME_BYTES: usize = 4;

// Clock detection
pub const AMPLITUDE_THRESHOLD: i32 = 500;
pub const CLOCK_PROBE_DISTANCE: usize = 3;

// Gap bands, in samples between accepted clocks
pub const MIN_CLOCK_GAP: usize = 6;
pub const SHORT_CELL_MAX: usize = 11;
pub const MEDIUM_CELL_MAX: usize = 15;
pub const CELL_MAX: usize = 20;
pub const SYNC_LOSS_GAP: usize = 1000;
pub const HARD_BOUNDARY_GAP: usize = 70000;

// Track start needs more than this many zeros of lead-in
pub const LEAD_IN_MIN_ZEROS: usize = 10;

// Recovery
pub const MAX_RETRIES: u32 = 2;
pub const FILTER_STEP_HZ: u32 = 250;

// Page layout
pub const PAGE_HEADER_BYTE: u8 = 0xC5;
pub const PAGE_ID_OFFSET: usize = 5;

// Container layout
pub const CONTAINER_VERSION: u32 = 0x0100;
pub const AUDIO_TYPE_WAV: u32 = 0;
