//! Reassembly of token bytes into UTF-8 text.
//!
//! A single token can end in the middle of a multi-byte character, so bytes
//! are buffered until they form complete characters.

#[derive(Debug, Default)]
pub struct Utf8Buffer {
    bytes: Vec<u8>,
}

impl Utf8Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append token bytes and return whatever is complete text so far.
    ///
    /// Invalid sequences are replaced with U+FFFD; an incomplete trailing
    /// sequence is kept for the next call.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.bytes.extend_from_slice(bytes);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.bytes) {
                Ok(s) => {
                    out.push_str(s);
                    self.bytes.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.bytes[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.bytes.drain(..valid + bad);
                        }
                        None => {
                            self.bytes.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush the remaining bytes lossily.
    pub fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.bytes).into_owned();
        self.bytes.clear();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_straight_through() {
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(b"hello"), "hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn split_multibyte_character_is_reassembled() {
        let bytes = "é".as_bytes();
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(&bytes[..1]), "");
        assert!(!buf.is_empty());
        assert_eq!(buf.push(&bytes[1..]), "é");
    }

    #[test]
    fn valid_prefix_is_released_before_partial_tail() {
        let emoji = "🦙".as_bytes();
        let mut input = b"hi ".to_vec();
        input.extend_from_slice(&emoji[..2]);
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(&input), "hi ");
        assert_eq!(buf.push(&emoji[2..]), "🦙");
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(&[b'a', 0xff, b'b']), "a\u{fffd}b");
    }

    #[test]
    fn finish_flushes_dangling_bytes() {
        let mut buf = Utf8Buffer::new();
        buf.push(&"é".as_bytes()[..1]);
        assert_eq!(buf.finish(), "\u{fffd}");
        assert!(buf.is_empty());
    }
}
