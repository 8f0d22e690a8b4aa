//! Page finalization and the diagnostic log

use std::fmt;

use crate::config::DecoderConfig;
use crate::error::PageFault;
use crate::timing::TrackCapture;

/// One decoded page. Immutable once finalized.
#[derive(Debug, Clone)]
pub struct Page {
    /// Position in the recording, counted from 0
    pub index: usize,
    pub payload: Vec<u8>,
    /// Sample position of the first zero of the lead-in
    pub lead_in_start: usize,
    /// Number of zero bits in the lead-in
    pub lead_in_len: usize,
    /// Sample position of the track start marker
    pub data_start: usize,
    pub header_valid: bool,
    pub data_valid: bool,
    /// Filtered retries spent on this page
    pub retries: u32,
    pub faults: Vec<PageFault>,
    page_id_offset: usize,
}

impl Page {
    pub fn is_valid(&self) -> bool {
        self.header_valid && self.data_valid
    }

    /// Page number recorded inside the payload, if the payload is long enough
    pub fn page_id(&self) -> Option<u8> {
        self.payload.get(self.page_id_offset).copied()
    }

    /// File name used when dumping the raw payload
    pub fn dump_name(&self) -> String {
        let mut name = format!("Page{}", self.index + 1);
        if !self.header_valid {
            name.push_str(".InvalidHeader");
        }
        if !self.data_valid {
            name.push_str(".BadData");
        }
        match self.page_id() {
            Some(id) => format!("{} (Number={}).bin", name, id),
            None => format!("{}.bin", name),
        }
    }
}

/// Append-only diagnostic text
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    text: String,
}

impl ErrorLog {
    pub fn push(&mut self, line: impl fmt::Display) {
        self.text.push_str(&line.to_string());
        self.text.push('\n');
    }

    /// Move everything from `other` to the end of this log
    pub fn absorb(&mut self, other: &mut ErrorLog) {
        self.text.push_str(&other.text);
        other.text.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Collects finalized pages for one recording
#[derive(Debug)]
pub struct PageManager {
    page_header: u8,
    page_id_offset: usize,
    max_retries: u32,
    pages: Vec<Page>,
    page_log: ErrorLog,
    file_log: ErrorLog,
    all_valid: bool,
}

impl PageManager {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            page_header: config.page_header,
            page_id_offset: config.page_id_offset,
            max_retries: config.max_retries,
            pages: Vec::new(),
            page_log: ErrorLog::default(),
            file_log: ErrorLog::default(),
            all_valid: true,
        }
    }

    /// Record a line against the page in progress
    pub fn note(&mut self, line: impl fmt::Display) {
        self.page_log.push(line);
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn all_valid(&self) -> bool {
        self.all_valid
    }

    /// Turn a capture into a page. Empty captures produce no page, but their
    /// log lines are still kept.
    pub fn finalize(&mut self, capture: TrackCapture, retries: u32) -> Option<&Page> {
        if capture.payload.is_empty() {
            self.file_log.absorb(&mut self.page_log);
            return None;
        }

        let mut data_valid = capture.faults.is_empty();
        let mut faults = capture.faults;
        let first = capture.payload[0];
        let header_valid = first == self.page_header;
        if !header_valid {
            faults.push(PageFault::HeaderMismatch {
                found: first,
                expected: self.page_header,
            });
        }

        if capture.lead_in_start > capture.data_start {
            data_valid = false;
            faults.push(PageFault::LeadInAfterDataStart {
                lead_in: capture.lead_in_start,
                data_start: capture.data_start,
            });
        }

        let index = self.pages.len();
        if !(header_valid && data_valid) {
            if retries >= self.max_retries {
                faults.push(PageFault::RetryExhausted { retries });
            }
            for fault in &faults {
                self.page_log.push(fault);
            }
            self.page_log.push(format_args!(
                "Page Index {} failed (Start: {})",
                index, capture.data_start
            ));
            log::warn!("Page {} failed (start {})", index, capture.data_start);
            self.all_valid = false;
        } else {
            log::info!(
                "Page {} decoded: {} bytes, start {}",
                index,
                capture.payload.len(),
                capture.data_start
            );
        }

        self.pages.push(Page {
            index,
            payload: capture.payload,
            lead_in_start: capture.lead_in_start,
            lead_in_len: capture.lead_in_len,
            data_start: capture.data_start,
            header_valid,
            data_valid,
            retries,
            faults,
            page_id_offset: self.page_id_offset,
        });
        self.file_log.absorb(&mut self.page_log);
        self.pages.last()
    }

    pub fn into_parts(mut self) -> (Vec<Page>, ErrorLog, bool) {
        self.file_log.absorb(&mut self.page_log);
        (self.pages, self.file_log, self.all_valid)
    }
}
