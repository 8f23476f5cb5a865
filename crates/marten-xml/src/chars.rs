//! Character classes from the XML 1.0 (Fifth Edition) grammar.
//!
//! [§ 2.2 Characters](https://www.w3.org/TR/xml/#charsets)
//! [§ 2.3 Common Syntactic Constructs](https://www.w3.org/TR/xml/#sec-common-syn)

/// [2] Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[must_use]
pub const fn is_char(c: char) -> bool {
    is_char_code(c as u32)
}

/// [2] Char, tested on a raw code point so that surrogates from character
/// references can be rejected before they become a `char`.
#[must_use]
pub const fn is_char_code(code: u32) -> bool {
    matches!(code, 0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x1_0000..=0x10_FFFF)
}

/// [3] S ::= (#x20 | #x9 | #xD | #xA)+
#[must_use]
pub const fn is_s(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// [4] NameStartChar
#[must_use]
pub const fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

/// [4a] NameChar ::= NameStartChar | "-" | "." | [0-9] | #xB7 | [#x0300-#x036F] | [#x203F-#x2040]
#[must_use]
pub const fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c, '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// [13] PubidChar ::= #x20 | #xD | #xA | [a-zA-Z0-9] | [-'()+,./:=?;!*#@$_%]
#[must_use]
pub const fn is_pubid_char(c: char) -> bool {
    matches!(c,
        ' ' | '\r' | '\n' | 'a'..='z' | 'A'..='Z' | '0'..='9'
        | '-' | '\'' | '(' | ')' | '+' | ',' | '.' | '/' | ':' | '='
        | '?' | ';' | '!' | '*' | '#' | '@' | '$' | '_' | '%')
}

/// [81] EncName ::= [A-Za-z] ([A-Za-z0-9._] | '-')*, first character.
#[must_use]
pub const fn is_enc_name_start(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// [81] EncName, subsequent characters.
#[must_use]
pub const fn is_enc_name(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// [5] Name ::= NameStartChar (NameChar)*
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char)
}

/// [7] Nmtoken ::= (NameChar)+
#[must_use]
pub fn is_valid_nmtoken(token: &str) -> bool {
    !token.is_empty() && token.chars().all(is_name_char)
}

/// True if every character of `data` matches S (vacuously true when empty).
#[must_use]
pub fn is_white_space(data: &str) -> bool {
    data.chars().all(is_s)
}

/// True if `data` contains at least one S character.
#[must_use]
pub fn contains_s(data: &str) -> bool {
    data.chars().any(is_s)
}

/// `data` without its leading S characters.
#[must_use]
pub fn strip_leading_s(data: &str) -> &str {
    data.trim_start_matches(is_s)
}

/// [§ 3.3.3 Attribute-Value Normalization](https://www.w3.org/TR/xml/#AVNormalize)
///
/// "...by discarding any leading and trailing space (#x20) characters, and by
/// replacing sequences of space (#x20) characters by a single space (#x20)
/// character."
#[must_use]
pub fn normalize_space(data: &str) -> String {
    data.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_excludes_controls_and_surrogates() {
        assert!(is_char('\t'));
        assert!(!is_char('\u{0}'));
        assert!(!is_char('\u{FFFE}'));
        assert!(is_char_code(0x10_FFFF));
        assert!(!is_char_code(0xD800));
    }

    #[test]
    fn test_names() {
        assert!(is_valid_name("xml:lang"));
        assert!(is_valid_name("_a.b-c"));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name(""));
        assert!(is_valid_nmtoken("1abc"));
        assert!(!is_valid_nmtoken("a b"));
    }

    #[test]
    fn test_normalize_space_collapses_only_spaces() {
        assert_eq!(normalize_space("  a   b c  "), "a b c");
        assert_eq!(normalize_space("a\tb"), "a\tb");
        assert_eq!(normalize_space("   "), "");
    }

    #[test]
    fn test_strip_leading_s() {
        assert_eq!(strip_leading_s(" \n\tx y"), "x y");
        assert!(is_white_space(" \r\n"));
        assert!(contains_s("a b"));
        assert!(!contains_s("ab"));
    }
}
