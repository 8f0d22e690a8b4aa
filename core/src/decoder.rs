use crate::clock::{ClockDetector, Debounce};
use crate::config::DecoderConfig;
use crate::error::Result;
use crate::page::{ErrorLog, Page, PageManager};
use crate::samples::{SampleBuffer, SampleStore};
use crate::timing::{ClockOutcome, TrackDecoder};
use crate::wav;

/// Bounded filter retry counter.
///
/// Each step raises the high-pass cutoff by one `filter_step_hz`. The counter
/// only goes back to zero when a page is finalized, so a page is re-decoded
/// at most `max` times before it is accepted as it is.
#[derive(Debug, Clone, Copy)]
pub struct RetryFilter {
    count: u32,
    max: u32,
}

impl RetryFilter {
    pub fn new(max: u32) -> Self {
        Self { count: 0, max }
    }

    /// Move to the next retry, or `None` once the budget is spent
    pub fn advance(&mut self) -> Option<u32> {
        if self.count >= self.max {
            return None;
        }
        self.count += 1;
        Some(self.count)
    }

    /// Clear the counter, returning how many retries were used
    pub fn reset(&mut self) -> u32 {
        std::mem::replace(&mut self.count, 0)
    }
}

/// Result of decoding one recording
#[derive(Debug)]
pub struct DecodeReport {
    pub pages: Vec<Page>,
    pub log: ErrorLog,
    /// Every page is both header-valid and data-valid
    pub all_valid: bool,
    /// Filtered re-decodes performed over the whole recording
    pub retries: usize,
    /// Filtered sample buffers that had to be computed
    pub filtered_variants: usize,
}

impl DecodeReport {
    pub fn failed_pages(&self) -> usize {
        self.pages.iter().filter(|p| !p.is_valid()).count()
    }

    /// Share of failed pages in percent (0 when there are no pages)
    pub fn failure_percent(&self) -> usize {
        if self.pages.is_empty() {
            0
        } else {
            self.failed_pages() * 100 / self.pages.len()
        }
    }
}

/// Decode state for one recording.
///
/// Owns the sample buffers, the bit timing machine, the retry counter and the
/// logs. The scan only moves forward, except for the rewind a filter retry
/// performs back to the position where the current page began.
pub struct DecodeSession {
    config: DecoderConfig,
    detector: ClockDetector,
    store: SampleStore,
    active: SampleBuffer,
    track: TrackDecoder,
    pages: PageManager,
    retry: RetryFilter,
    debounce: Debounce,
    last_clock: usize,
    last_save_position: usize,
    /// First data start seen for the current page, kept across retries
    data_start: Option<usize>,
    retries: usize,
}

impl DecodeSession {
    pub fn new(samples: Vec<i16>, config: DecoderConfig) -> Self {
        let store = SampleStore::new(samples, config.sample_rate);
        Self {
            detector: ClockDetector::new(&config),
            active: store.original(),
            store,
            track: TrackDecoder::new(),
            pages: PageManager::new(&config),
            retry: RetryFilter::new(config.max_retries),
            debounce: Debounce::default(),
            last_clock: 0,
            last_save_position: 0,
            data_start: None,
            retries: 0,
            config,
        }
    }

    /// Session over the right channel of a 16-bit stereo WAV image
    pub fn from_wav(bytes: &[u8], config: DecoderConfig) -> Result<Self> {
        let samples = wav::right_channel(bytes)?;
        Ok(Self::new(samples, config))
    }

    /// Scan the whole recording and finalize every page
    pub fn run(mut self) -> DecodeReport {
        let range = self.detector.scan_range(self.store.len());
        log::info!("Scanning {} samples", self.store.len());

        let mut i = range.start;
        while i < range.end {
            i = match self.step(i) {
                Some(rewind) => rewind,
                None => i + 1,
            };
        }

        let retries = self.retry.reset();
        self.finalize_page(range.end, retries);

        let filtered_variants = self.store.cached_variants();
        let (pages, log, all_valid) = self.pages.into_parts();
        let report = DecodeReport {
            pages,
            log,
            all_valid,
            retries: self.retries,
            filtered_variants,
        };

        if report.failed_pages() > 0 {
            log::warn!(
                "Failed {} pages ({}%)",
                report.failed_pages(),
                report.failure_percent()
            );
        }
        report
    }

    /// Process sample `i`. Returns the scan position to resume from when a
    /// retry rewinds.
    fn step(&mut self, i: usize) -> Option<usize> {
        let edge = self.detector.classify(&self.active, i);
        if self.debounce.is_repeat(edge) {
            return None;
        }

        let gap = i.saturating_sub(self.last_clock);
        if gap < self.config.min_clock_gap {
            if self.track.is_track_started() {
                log::debug!("Gap between clocks too small, ignoring clock: {}", i);
            }
            return None;
        }
        self.last_clock = i;

        let outcome = self.track.on_clock(gap, i, &self.config);
        if outcome != (ClockOutcome::PageBoundary { hard: true }) {
            self.debounce.accept(edge);
        }

        match outcome {
            ClockOutcome::Continue => None,
            ClockOutcome::TrackStart => {
                self.pages.note(format_args!("Started new data track at: {}", i));
                None
            }
            ClockOutcome::PageInvalid(fault) => {
                log::debug!("{}", fault);
                None
            }
            ClockOutcome::PageBoundary { .. } => self.boundary(i),
        }
    }

    fn boundary(&mut self, i: usize) -> Option<usize> {
        if self.track.is_invalid(&self.config) {
            if let Some(attempt) = self.retry.advance() {
                return Some(self.rewind(attempt));
            }
        }

        let retries = self.retry.reset();
        self.finalize_page(i, retries);
        None
    }

    fn rewind(&mut self, attempt: u32) -> usize {
        let cutoff = self.config.cutoff_for_retry(attempt);
        let target = self.last_save_position.max(self.detector.scan_range(0).start);

        self.pages.note(format_args!(
            "Retrying page at {} with {} Hz high-pass filter (attempt {})",
            target, cutoff, attempt
        ));
        log::info!(
            "Page at {} invalid, retrying with {} Hz high-pass filter",
            target,
            cutoff
        );

        self.data_start = self.data_start.or(self.track.data_start());
        self.track = TrackDecoder::new();
        self.active = self.store.select(cutoff);
        self.last_clock = target.saturating_sub(2);
        self.retries += 1;
        target
    }

    fn finalize_page(&mut self, position: usize, retries: u32) {
        self.last_save_position = position;
        let mut capture = self.track.take();
        if let Some(first) = self.data_start.take() {
            capture.data_start = first;
        }
        self.pages.finalize(capture, retries);
        self.active = self.store.original();
    }
}
