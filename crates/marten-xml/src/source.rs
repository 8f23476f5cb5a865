//! Character cursor over a single entity.
//!
//! [§ 2.11 End-of-Line Handling](https://www.w3.org/TR/xml/#sec-line-ends)
//!
//! "the XML processor MUST behave as if it normalized all line breaks in
//! external parsed entities (including the document entity) on input, before
//! parsing, by translating both the two-character sequence #xD #xA and any
//! #xD that is not followed by #xA to a single #xA character."

use crate::encoding::Encoding;
use crate::error::EncodingError;

/// Characters decoded per refill once the encoding is committed.
const CHUNK_SIZE: usize = 4096;

/// A cursor over the characters of one entity.
///
/// Until [`keep_encoding`](Self::keep_encoding) is called the source decodes
/// one character at a time, so that a declared encoding can still replace
/// the guessed one without re-reading anything but the current character.
#[derive(Debug, Clone)]
pub struct CharacterSource {
    /// Undecoded input, empty for text sources.
    bytes: Vec<u8>,
    /// Text sources are decoded up front and ignore encoding changes.
    text: bool,
    encoding: Encoding,
    /// Byte offset of the next undecoded octet.
    offset: usize,
    /// Byte offset the current buffer was decoded from.
    buffer_start: usize,
    buffer: Vec<char>,
    pos: usize,
    chunk: usize,
    locked: bool,
    has_bom: bool,
    current: Option<char>,
    line: usize,
    column: usize,
    ignore_lf: bool,
}

impl CharacterSource {
    /// Open a byte source. With no `encoding` the encoding is detected
    /// from the first four octets.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodingError`] if the first character cannot be decoded.
    pub fn from_bytes(bytes: Vec<u8>, encoding: Option<Encoding>) -> Result<Self, EncodingError> {
        let encoding = encoding.unwrap_or_else(|| Encoding::detect(&bytes));
        let mut source = Self::empty(bytes, encoding, false);
        source.reset()?;
        Ok(source)
    }

    /// Open an already decoded text source.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut source = Self::empty(Vec::new(), Encoding::Utf8, true);
        source.buffer = text.chars().collect();
        source.locked = true;
        // Text sources never fail to decode.
        let _ = source.reset();
        source
    }

    fn empty(bytes: Vec<u8>, encoding: Encoding, text: bool) -> Self {
        Self {
            bytes,
            text,
            encoding,
            offset: 0,
            buffer_start: 0,
            buffer: Vec::new(),
            pos: 0,
            chunk: 1,
            locked: false,
            has_bom: false,
            current: None,
            line: 1,
            column: 0,
            ignore_lf: false,
        }
    }

    /// Rewind to the first character, discarding a leading byte order mark
    /// for the Unicode encodings.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodingError`] if the first character cannot be decoded.
    pub fn reset(&mut self) -> Result<(), EncodingError> {
        if !self.text {
            self.buffer.clear();
            self.offset = 0;
            self.buffer_start = 0;
        }
        self.pos = 0;
        self.line = 1;
        self.column = 1;
        self.ignore_lf = false;
        self.has_bom = false;
        self.settle()?;
        if self.current == Some('\u{FEFF}') && self.encoding.is_unicode() {
            self.has_bom = true;
            self.advance()?;
            self.column = 1;
        }
        Ok(())
    }

    /// The current character, `None` once the source is exhausted.
    #[must_use]
    pub const fn current(&self) -> Option<char> {
        self.current
    }

    /// Move to the next character.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodingError`] if the next character cannot be decoded.
    pub fn advance(&mut self) -> Result<(), EncodingError> {
        if self.current.is_none() {
            return Ok(());
        }
        self.pos += 1;
        self.column += 1;
        self.settle()
    }

    /// Apply end-of-line handling to the raw character at `pos`.
    fn settle(&mut self) -> Result<(), EncodingError> {
        loop {
            match self.raw()? {
                None => {
                    self.current = None;
                }
                Some('\r') => {
                    self.current = Some('\n');
                    self.ignore_lf = true;
                    self.new_line();
                }
                Some('\n') if self.ignore_lf => {
                    self.ignore_lf = false;
                    self.pos += 1;
                    continue;
                }
                Some('\n') => {
                    self.current = Some('\n');
                    self.new_line();
                }
                Some(c) => {
                    self.ignore_lf = false;
                    self.current = Some(c);
                }
            }
            return Ok(());
        }
    }

    /// The raw character at `pos`, refilling the buffer when needed.
    fn raw(&mut self) -> Result<Option<char>, EncodingError> {
        if let Some(&c) = self.buffer.get(self.pos) {
            return Ok(Some(c));
        }
        if self.text {
            return Ok(None);
        }
        self.buffer.clear();
        self.pos = 0;
        self.buffer_start = self.offset;
        while self.buffer.len() < self.chunk {
            let Some((c, len)) = self.encoding.decode_char(&self.bytes, self.offset)? else {
                break;
            };
            self.buffer.push(c);
            self.offset += len;
        }
        Ok(self.buffer.first().copied())
    }

    const fn new_line(&mut self) {
        self.line += 1;
        self.column = 0;
    }

    /// Re-decode the current character under a newly declared encoding and
    /// commit to it.
    ///
    /// Text sources accept any supported name and only commit.
    ///
    /// # Errors
    ///
    /// [`EncodingError::Committed`] after [`keep_encoding`](Self::keep_encoding),
    /// [`EncodingError::Unsupported`] for an unknown name.
    pub fn change_encoding(&mut self, label: &str) -> Result<(), EncodingError> {
        if self.locked && !self.text {
            return Err(EncodingError::Committed {
                current: self.encoding,
                requested: label.to_string(),
            });
        }
        let encoding = Encoding::from_declared(label, self.encoding)
            .ok_or_else(|| EncodingError::Unsupported(label.to_string()))?;
        if !self.text && encoding != self.encoding {
            let (line, column) = (self.line, self.column);
            self.encoding = encoding;
            self.offset = self.buffer_start;
            self.buffer.clear();
            self.pos = 0;
            self.ignore_lf = false;
            self.settle()?;
            self.line = line;
            self.column = column;
        }
        self.keep_encoding();
        Ok(())
    }

    /// Commit to the current encoding and switch to chunked decoding.
    pub const fn keep_encoding(&mut self) {
        self.locked = true;
        self.chunk = CHUNK_SIZE;
    }

    /// The encoding in use.
    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// True if a byte order mark was skipped by [`reset`](Self::reset).
    #[must_use]
    pub const fn has_bom(&self) -> bool {
        self.has_bom
    }

    /// True for sources opened from decoded text.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        self.text
    }

    /// Current 1-based line.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Current column; 0 while positioned on a line feed.
    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut CharacterSource) -> String {
        let mut out = String::new();
        while let Some(c) = source.current() {
            out.push(c);
            source.advance().unwrap();
        }
        out
    }

    #[test]
    fn test_crlf_collapses_to_lf() {
        let mut source = CharacterSource::from_bytes(b"a\r\nb\rc\n".to_vec(), None).unwrap();
        assert_eq!(drain(&mut source), "a\nb\nc\n");
        assert_eq!(source.line(), 4);
    }

    #[test]
    fn test_bom_is_skipped() {
        let mut source =
            CharacterSource::from_bytes(vec![0xEF, 0xBB, 0xBF, b'<', b'a'], None).unwrap();
        assert!(source.has_bom());
        assert_eq!(drain(&mut source), "<a");
    }

    #[test]
    fn test_change_encoding_redecodes_current() {
        let mut source = CharacterSource::from_bytes(vec![b'x', 0xC3, 0xA9], None).unwrap();
        source.advance().unwrap();
        assert_eq!(source.current(), Some('é'));
        assert!(source.change_encoding("ISO-8859-1").is_ok());
        assert_eq!(source.current(), Some('Ã'));
        source.advance().unwrap();
        assert_eq!(source.current(), Some('©'));
        assert!(matches!(
            source.change_encoding("UTF-8"),
            Err(EncodingError::Committed { .. })
        ));
    }
}
