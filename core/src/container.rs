//! `.studybox` container serialization and the diagnostic report
//!
//! Layout (little-endian):
//!
//! ```text
//! "STBX" u32 len=4          u32 version=0x0100
//! "PAGE" u32 len=payload+8  u32 lead_in  u32 data_start  payload   (per page)
//! "AUDI" u32 len=wav+4      u32 audio_type=0             mono wav
//! ```

use std::fmt::Write as _;
use std::io::Write;

use crate::decoder::DecodeReport;
use crate::error::{Result, StudyboxError};
use crate::page::Page;
use crate::{wav, AUDIO_TYPE_WAV, CONTAINER_VERSION};

fn position_field(position: usize) -> Result<u32> {
    u32::try_from(position).map_err(|_| StudyboxError::PositionOverflow(position))
}

fn length_field(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| StudyboxError::ChunkTooLarge(len))
}

/// Chunk-level writer for the container format
pub struct ContainerWriter<W: Write> {
    inner: W,
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    fn chunk_header(&mut self, magic: &[u8; 4], len: usize) -> Result<()> {
        self.inner.write_all(magic)?;
        self.inner.write_all(&length_field(len)?.to_le_bytes())?;
        Ok(())
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.chunk_header(b"STBX", 4)?;
        self.inner.write_all(&CONTAINER_VERSION.to_le_bytes())?;
        Ok(())
    }

    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        self.chunk_header(b"PAGE", page.payload.len() + 8)?;
        self.inner.write_all(&position_field(page.lead_in_start)?.to_le_bytes())?;
        self.inner.write_all(&position_field(page.data_start)?.to_le_bytes())?;
        self.inner.write_all(&page.payload)?;
        Ok(())
    }

    /// Embed an already re-headered WAV image
    pub fn write_audio(&mut self, wav_image: &[u8]) -> Result<()> {
        self.chunk_header(b"AUDI", wav_image.len() + 4)?;
        self.inner.write_all(&AUDIO_TYPE_WAV.to_le_bytes())?;
        self.inner.write_all(wav_image)?;
        Ok(())
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Write a complete container for `pages` and the source recording.
///
/// Refuses to write anything if a page is invalid.
pub fn write_studybox<W: Write>(writer: W, pages: &[Page], source_wav: &[u8]) -> Result<W> {
    let invalid = pages.iter().filter(|p| !p.is_valid()).count();
    if invalid > 0 {
        return Err(StudyboxError::InvalidPages(invalid));
    }

    let mono = wav::mono_copy(source_wav)?;

    let mut container = ContainerWriter::new(writer);
    container.write_header()?;
    for page in pages {
        container.write_page(page)?;
    }
    container.write_audio(&mono)?;
    container.into_inner()
}

/// Per-page summary used when a recording fails validation
pub fn page_summary(pages: &[Page]) -> String {
    let mut out = String::new();
    for page in pages {
        let id = match page.page_id() {
            Some(id) => format!("{:#04X}", id),
            None => "--".to_string(),
        };
        let _ = writeln!(
            out,
            "Page {}: id={} lead-in={} ({} bits) data-start={} length={} header={} data={} retries={}",
            page.index,
            id,
            page.lead_in_start,
            page.lead_in_len,
            page.data_start,
            page.payload.len(),
            if page.header_valid { "ok" } else { "BAD" },
            if page.data_valid { "ok" } else { "BAD" },
            page.retries,
        );
    }
    out
}

/// What a decoded recording turns into
#[derive(Debug)]
pub enum Emission {
    /// Every page was valid
    Container(Vec<u8>),
    /// At least one page was invalid; no container
    Diagnostics {
        error_log: String,
        page_summary: String,
    },
}

impl Emission {
    pub fn build(report: &DecodeReport, source_wav: &[u8]) -> Result<Self> {
        if !report.all_valid {
            return Ok(Emission::Diagnostics {
                error_log: report.log.to_string(),
                page_summary: page_summary(&report.pages),
            });
        }

        let bytes = write_studybox(Vec::new(), &report.pages, source_wav)?;
        Ok(Emission::Container(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecoderConfig;
    use crate::page::PageManager;
    use crate::timing::TrackCapture;

    fn pages(payloads: &[&[u8]]) -> Vec<Page> {
        let mut manager = PageManager::new(&DecoderConfig::default());
        for (n, payload) in payloads.iter().enumerate() {
            manager.finalize(
                TrackCapture {
                    payload: payload.to_vec(),
                    lead_in_start: 1000 * (n + 1),
                    lead_in_len: 40,
                    data_start: 1000 * (n + 1) + 400,
                    faults: Vec::new(),
                },
                0,
            );
        }
        manager.into_parts().0
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_container_layout() {
        let source = wav::stereo_wav(&[1, 2, 3, 4], &[5, 6, 7, 8]).unwrap();
        let pages = pages(&[&[0xC5, 1, 2, 3, 4, 9]]);
        let bytes = write_studybox(Vec::new(), &pages, &source).unwrap();

        assert_eq!(&bytes[0..4], b"STBX");
        assert_eq!(u32_at(&bytes, 4), 4);
        assert_eq!(u32_at(&bytes, 8), 0x0100);

        assert_eq!(&bytes[12..16], b"PAGE");
        assert_eq!(u32_at(&bytes, 16), 14);
        assert_eq!(u32_at(&bytes, 20), 1000);
        assert_eq!(u32_at(&bytes, 24), 1400);
        assert_eq!(&bytes[28..34], &[0xC5, 1, 2, 3, 4, 9]);

        assert_eq!(&bytes[34..38], b"AUDI");
        let wav_len = 44 + 8;
        assert_eq!(u32_at(&bytes, 38), wav_len as u32 + 4);
        assert_eq!(u32_at(&bytes, 42), 0);
        let audio = &bytes[46..];
        assert_eq!(audio.len(), wav_len);
        assert_eq!(audio[0x16], 1);
        assert_eq!(bytes.len(), 46 + wav_len);
    }

    #[test]
    fn test_multiple_pages_in_order() {
        let source = wav::stereo_wav(&[0; 4], &[0; 4]).unwrap();
        let pages = pages(&[&[0xC5, 0xAA], &[0xC5, 0xBB, 0xCC]]);
        let bytes = write_studybox(Vec::new(), &pages, &source).unwrap();

        assert_eq!(&bytes[12..16], b"PAGE");
        assert_eq!(u32_at(&bytes, 16), 10);
        let second = 12 + 8 + 10;
        assert_eq!(&bytes[second..second + 4], b"PAGE");
        assert_eq!(u32_at(&bytes, second + 4), 11);
        assert_eq!(u32_at(&bytes, second + 8), 2000);
    }

    #[test]
    fn test_invalid_page_blocks_container() {
        let source = wav::stereo_wav(&[0; 4], &[0; 4]).unwrap();
        let pages = pages(&[&[0xC5, 1], &[0x12, 2]]);
        match write_studybox(Vec::new(), &pages, &source) {
            Err(StudyboxError::InvalidPages(1)) => {}
            other => panic!("Expected InvalidPages(1), got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_oversized_chunk_rejected() {
        let len = u32::MAX as usize + 1;
        assert!(matches!(length_field(len), Err(StudyboxError::ChunkTooLarge(l)) if l == len));
        assert!(matches!(
            position_field(len),
            Err(StudyboxError::PositionOverflow(_))
        ));
    }

    #[test]
    fn test_summary_lists_every_page() {
        let pages = pages(&[&[0xC5, 1, 2, 3, 4, 0x21], &[0x00]]);
        let summary = page_summary(&pages);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Page 0: id=0x21 lead-in=1000 (40 bits) data-start=1400"));
        assert!(lines[1].contains("id=--"));
        assert!(lines[1].contains("header=BAD"));
    }
}
