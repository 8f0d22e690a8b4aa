use crate::error::PageFault;

/// Groups the track bit stream into bytes.
///
/// Every byte is preceded by a 0 framing bit and carried MSB first. A
/// missing framing bit marks the page bad, and the assembler keeps waiting
/// for the next 0 so decoding can continue.
#[derive(Debug, Clone, Default)]
pub struct ByteAssembler {
    expect_framing: bool,
    register: u8,
    remaining: u8,
}

impl ByteAssembler {
    /// Start waiting for the framing bit of the first byte
    pub fn arm(&mut self) {
        self.expect_framing = true;
        self.register = 0;
        self.remaining = 0;
    }

    /// Feed one bit. Returns the completed byte after its 8th data bit.
    pub fn push(&mut self, bit: u8, position: usize) -> Result<Option<u8>, PageFault> {
        if self.expect_framing {
            if bit != 0 {
                return Err(PageFault::FramingViolation { position });
            }
            self.expect_framing = false;
            self.remaining = 8;
            return Ok(None);
        }

        if self.remaining == 0 {
            return Ok(None);
        }

        self.remaining -= 1;
        self.register |= (bit & 1) << self.remaining;

        if self.remaining > 0 {
            return Ok(None);
        }

        let byte = self.register;
        self.register = 0;
        self.expect_framing = true;
        Ok(Some(byte))
    }
}
