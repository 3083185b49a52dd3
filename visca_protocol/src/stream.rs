//! # Stream deframing
//!
//! When VISCA is carried over a byte stream (eg: TCP, or a serial port), there
//! are no message boundaries. Every VISCA message ends with `0xff`, and no
//! other byte in a message can be `0xff`, so that is used to split the stream.
use crate::command::TERMINATOR;

/// Splits a byte stream into complete VISCA frames.
#[derive(Debug, Default)]
pub struct StreamDeframer {
    buf: Vec<u8>,
}

impl StreamDeframer {
    /// Maximum length of a VISCA frame, including address and terminator.
    pub const MAX_FRAME_LENGTH: usize = 16;

    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes read from the stream.
    ///
    /// If the buffer holds more than [`Self::MAX_FRAME_LENGTH`] bytes without a
    /// terminator, the unterminated bytes are discarded.
    pub fn push(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);

        let tail = self
            .buf
            .iter()
            .rposition(|&b| b == TERMINATOR)
            .map_or(0, |p| p + 1);
        if self.buf.len() - tail > Self::MAX_FRAME_LENGTH {
            warn!(
                "discarding {} bytes of unterminated data: {}",
                self.buf.len() - tail,
                hex::encode(&self.buf[tail..])
            );
            self.buf.truncate(tail);
        }
    }

    /// Takes the next complete frame from the buffer, including its
    /// terminator.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let end = self.buf.iter().position(|&b| b == TERMINATOR)?;
        Some(self.buf.drain(..=end).collect())
    }

    /// Number of bytes currently buffered.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Result;

    #[test]
    fn two_frames_one_read() -> Result<()> {
        let mut d = StreamDeframer::new();
        d.push(&hex::decode("9041ff9051ff")?);
        assert_eq!(Some(hex::decode("9041ff")?), d.next_frame());
        assert_eq!(Some(hex::decode("9051ff")?), d.next_frame());
        assert_eq!(None, d.next_frame());
        assert_eq!(0, d.pending());
        Ok(())
    }

    #[test]
    fn split_frame() -> Result<()> {
        let mut d = StreamDeframer::new();
        d.push(&hex::decode("905000")?);
        assert_eq!(None, d.next_frame());
        d.push(&hex::decode("0102")?);
        assert_eq!(None, d.next_frame());
        assert_eq!(5, d.pending());
        d.push(&hex::decode("03ff90")?);
        assert_eq!(Some(hex::decode("905000010203ff")?), d.next_frame());
        assert_eq!(None, d.next_frame());
        assert_eq!(1, d.pending());
        d.push(&[0x41, 0xff]);
        assert_eq!(Some(hex::decode("9041ff")?), d.next_frame());
        Ok(())
    }

    #[test]
    fn discard_garbage() -> Result<()> {
        let _ = tracing_subscriber::fmt().try_init();
        let mut d = StreamDeframer::new();
        d.push(&[0x00; 17]);
        assert_eq!(0, d.pending());
        assert_eq!(None, d.next_frame());

        // Complete frames before the garbage are kept.
        d.push(&hex::decode("9041ff")?);
        d.push(&[0x01; 20]);
        assert_eq!(3, d.pending());
        assert_eq!(Some(hex::decode("9041ff")?), d.next_frame());
        Ok(())
    }
}
