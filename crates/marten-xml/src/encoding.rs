//! Character encodings understood by [`CharacterSource`](crate::source::CharacterSource).
//!
//! [§ 4.3.3 Character Encoding in Entities](https://www.w3.org/TR/xml/#charencoding)
//! [Appendix F Autodetection of Character Encodings](https://www.w3.org/TR/xml/#sec-guessing)

use strum_macros::Display;

use crate::error::EncodingError;

/// A decodable character encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Encoding {
    /// UTF-8, the default when nothing else is detected.
    #[strum(serialize = "UTF-8")]
    Utf8,
    /// UTF-16, little-endian code units.
    #[strum(serialize = "UTF-16LE")]
    Utf16Le,
    /// UTF-16, big-endian code units.
    #[strum(serialize = "UTF-16BE")]
    Utf16Be,
    /// UTF-32 / UCS-4, little-endian.
    #[strum(serialize = "UTF-32LE")]
    Utf32Le,
    /// UTF-32 / UCS-4, big-endian.
    #[strum(serialize = "UTF-32BE")]
    Utf32Be,
    /// ISO-8859-1: every octet is the code point of the same value.
    #[strum(serialize = "ISO-8859-1")]
    Latin1,
    /// US-ASCII: octets above 0x7F are errors.
    #[strum(serialize = "US-ASCII")]
    Ascii,
    /// windows-1252, the usual mislabelled "latin-1" of the web.
    #[strum(serialize = "windows-1252")]
    Windows1252,
}

/// windows-1252 code points for octets 0x80..=0x9F. Zero marks an octet
/// with no assigned character.
const WINDOWS_1252_HIGH: [u32; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

impl Encoding {
    /// Look up an encoding by its IANA name or a common alias.
    ///
    /// Labels that name a byte-order-neutral Unicode encoding (`UTF-16`,
    /// `ISO-10646-UCS-2`, `UTF-32`, ...) map to the big-endian form; use
    /// [`Encoding::from_declared`] to keep an already-detected byte order.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        let encoding = match label.as_str() {
            "utf-8" | "utf8" => Self::Utf8,
            "utf-16le" | "utf16le" => Self::Utf16Le,
            "utf-16be" | "utf16be" => Self::Utf16Be,
            "utf-32le" | "utf32le" | "ucs-4le" => Self::Utf32Le,
            "utf-32be" | "utf32be" | "ucs-4be" => Self::Utf32Be,
            "utf-16" | "utf16" | "ucs-2" | "iso-10646-ucs-2" | "unicode" => Self::Utf16Be,
            "utf-32" | "utf32" | "ucs-4" | "iso-10646-ucs-4" => Self::Utf32Be,
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "latin-1" | "l1" | "cp819"
            | "iso-ir-100" => Self::Latin1,
            "us-ascii" | "ascii" | "ansi_x3.4-1968" | "iso646-us" => Self::Ascii,
            "windows-1252" | "cp1252" | "x-cp1252" => Self::Windows1252,
            _ => return None,
        };
        Some(encoding)
    }

    /// Resolve a declared encoding name while reading with `current`.
    ///
    /// A document cannot reach its declaration without the byte order of a
    /// 16- or 32-bit encoding already being right, so byte-order-neutral
    /// names keep `current` when it belongs to the same family.
    #[must_use]
    pub fn from_declared(label: &str, current: Self) -> Option<Self> {
        let declared = Self::from_label(label)?;
        let lower = label.to_ascii_lowercase();
        let keep = !lower.ends_with("le")
            && !lower.ends_with("be")
            && matches!(
                (declared, current),
                (Self::Utf16Be, Self::Utf16Le | Self::Utf16Be)
                    | (Self::Utf32Be, Self::Utf32Le | Self::Utf32Be)
            );
        Some(if keep { current } else { declared })
    }

    /// Guess the encoding of an entity from its first four octets.
    ///
    /// [Appendix F.1](https://www.w3.org/TR/xml/#sec-guessing-no-ext-info)
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes {
            [0x00, 0x00, 0xFE, 0xFF, ..] | [0x00, 0x00, 0x00, 0x3C, ..] => Self::Utf32Be,
            [0xFF, 0xFE, 0x00, 0x00, ..] | [0x3C, 0x00, 0x00, 0x00, ..] => Self::Utf32Le,
            [0xFE, 0xFF, ..] | [0x00, 0x3C, 0x00, 0x3F, ..] => Self::Utf16Be,
            [0xFF, 0xFE, ..] | [0x3C, 0x00, 0x3F, 0x00, ..] => Self::Utf16Le,
            _ => Self::Utf8,
        }
    }

    /// True for the UTF family, whose streams may start with a byte order
    /// mark.
    #[must_use]
    pub const fn is_unicode(self) -> bool {
        matches!(
            self,
            Self::Utf8 | Self::Utf16Le | Self::Utf16Be | Self::Utf32Le | Self::Utf32Be
        )
    }

    /// True for UTF-16 in either byte order.
    #[must_use]
    pub const fn is_utf16(self) -> bool {
        matches!(self, Self::Utf16Le | Self::Utf16Be)
    }

    /// Decode the character starting at `offset`.
    ///
    /// Returns `Ok(None)` at the end of `bytes` and the character with its
    /// length in octets otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::Malformed`] for an invalid or truncated
    /// sequence.
    pub fn decode_char(
        self,
        bytes: &[u8],
        offset: usize,
    ) -> Result<Option<(char, usize)>, EncodingError> {
        let Some(rest) = bytes.get(offset..).filter(|rest| !rest.is_empty()) else {
            return Ok(None);
        };
        let malformed = || EncodingError::Malformed {
            encoding: self,
            offset,
        };
        let decoded = match self {
            Self::Utf8 => {
                let len = match rest[0] {
                    0x00..=0x7F => 1,
                    0xC2..=0xDF => 2,
                    0xE0..=0xEF => 3,
                    0xF0..=0xF4 => 4,
                    _ => return Err(malformed()),
                };
                let c = rest
                    .get(..len)
                    .and_then(|seq| std::str::from_utf8(seq).ok())
                    .and_then(|s| s.chars().next())
                    .ok_or_else(malformed)?;
                (c, len)
            }
            Self::Utf16Le | Self::Utf16Be => {
                let unit = |i: usize| -> Option<u16> {
                    let pair = [*rest.get(i)?, *rest.get(i + 1)?];
                    Some(if self == Self::Utf16Le {
                        u16::from_le_bytes(pair)
                    } else {
                        u16::from_be_bytes(pair)
                    })
                };
                let first = unit(0).ok_or_else(malformed)?;
                let units: Vec<u16> = if (0xD800..0xDC00).contains(&first) {
                    vec![first, unit(2).ok_or_else(malformed)?]
                } else {
                    vec![first]
                };
                let len = units.len() * 2;
                let c = char::decode_utf16(units)
                    .next()
                    .and_then(Result::ok)
                    .ok_or_else(malformed)?;
                (c, len)
            }
            Self::Utf32Le | Self::Utf32Be => {
                let quad: [u8; 4] = rest
                    .get(..4)
                    .and_then(|q| q.try_into().ok())
                    .ok_or_else(malformed)?;
                let code = if self == Self::Utf32Le {
                    u32::from_le_bytes(quad)
                } else {
                    u32::from_be_bytes(quad)
                };
                (char::from_u32(code).ok_or_else(malformed)?, 4)
            }
            Self::Latin1 => (char::from(rest[0]), 1),
            Self::Ascii => {
                if !rest[0].is_ascii() {
                    return Err(malformed());
                }
                (char::from(rest[0]), 1)
            }
            Self::Windows1252 => {
                let byte = rest[0];
                let c = if (0x80..0xA0).contains(&byte) {
                    let code = WINDOWS_1252_HIGH[usize::from(byte - 0x80)];
                    char::from_u32(code)
                        .filter(|_| code != 0)
                        .ok_or_else(malformed)?
                } else {
                    char::from(byte)
                };
                (c, 1)
            }
        };
        Ok(Some(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_boms_and_patterns() {
        assert_eq!(Encoding::detect(&[0xEF, 0xBB, 0xBF, b'<']), Encoding::Utf8);
        assert_eq!(Encoding::detect(&[0xFF, 0xFE, b'<', 0x00]), Encoding::Utf16Le);
        assert_eq!(Encoding::detect(&[0xFF, 0xFE, 0x00, 0x00]), Encoding::Utf32Le);
        assert_eq!(Encoding::detect(&[0x00, 0x3C, 0x00, 0x3F]), Encoding::Utf16Be);
        assert_eq!(Encoding::detect(b"<?xm"), Encoding::Utf8);
        assert_eq!(Encoding::detect(b""), Encoding::Utf8);
    }

    #[test]
    fn test_declared_ucs2_keeps_byte_order() {
        assert_eq!(
            Encoding::from_declared("ISO-10646-UCS-2", Encoding::Utf16Le),
            Some(Encoding::Utf16Le)
        );
        assert_eq!(
            Encoding::from_declared("UTF-16BE", Encoding::Utf16Le),
            Some(Encoding::Utf16Be)
        );
        assert_eq!(
            Encoding::from_declared("latin1", Encoding::Utf8),
            Some(Encoding::Latin1)
        );
        assert_eq!(Encoding::from_declared("klingon", Encoding::Utf8), None);
    }

    #[test]
    fn test_decode_multibyte() {
        let bytes = "é€😀".as_bytes();
        assert_eq!(Encoding::Utf8.decode_char(bytes, 0), Ok(Some(('é', 2))));
        assert_eq!(Encoding::Utf8.decode_char(bytes, 2), Ok(Some(('€', 3))));
        assert_eq!(Encoding::Utf8.decode_char(bytes, 5), Ok(Some(('😀', 4))));
        assert_eq!(Encoding::Utf8.decode_char(bytes, 9), Ok(None));
        assert!(Encoding::Utf8.decode_char(&[0xE2, 0x82], 0).is_err());

        let utf16: Vec<u8> = "😀".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(Encoding::Utf16Le.decode_char(&utf16, 0), Ok(Some(('😀', 4))));
        assert_eq!(Encoding::Windows1252.decode_char(&[0x80], 0), Ok(Some(('€', 1))));
        assert!(Encoding::Windows1252.decode_char(&[0x81], 0).is_err());
        assert!(Encoding::Ascii.decode_char(&[0xE9], 0).is_err());
    }
}
