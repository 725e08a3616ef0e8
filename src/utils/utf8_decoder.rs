use tracing::trace;

/// Incremental UTF-8 decoder for pipe output.
///
/// Reads from a pipe can end in the middle of a multi-byte character. The
/// incomplete tail is held back and prefixed to the next chunk, so every
/// character reaches the browser intact. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `bytes`, returning the text that is complete so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let keep_from = incomplete_tail_start(&self.pending);
        let tail = self.pending.split_off(keep_from);
        let complete = std::mem::replace(&mut self.pending, tail);

        if !self.pending.is_empty() {
            trace!(held_back = self.pending.len(), "Holding partial UTF-8 sequence");
        }
        String::from_utf8_lossy(&complete).into_owned()
    }

    /// Flushes whatever is still held back once the stream has ended.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

/// Index where a trailing, not yet complete, UTF-8 sequence begins, or
/// `bytes.len()` when the buffer ends on a character boundary.
fn incomplete_tail_start(bytes: &[u8]) -> usize {
    let len = bytes.len();
    // A UTF-8 sequence is at most 4 bytes, so only the last 3 can be a partial lead.
    for back in 1..=len.min(3) {
        let idx = len - back;
        let b = bytes[idx];
        if b & 0b1100_0000 == 0b1000_0000 {
            continue; // continuation byte, keep looking for the lead
        }
        let needed = match b {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return len, // ASCII or invalid lead: nothing to wait for
        };
        return if back < needed { idx } else { len };
    }
    len
}
