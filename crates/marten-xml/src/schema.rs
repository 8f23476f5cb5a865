//! Per-element-type attribute tables for typed object models.
//!
//! A builder whose element types keep attributes in typed fields declares a
//! static [`AttributeSchema`] per type: for each attribute name, a function
//! that decodes the parsed value into the field and one that encodes it
//! back. The table is resolved once when the type is defined.

use crate::builder::AttributeValueError;
use crate::chars::{is_valid_name, is_valid_nmtoken};

/// Decodes a value into a field of `T`.
pub type DecodeFn<T> = fn(&mut T, &str) -> Result<(), String>;

/// Encodes a field of `T`, `None` when the attribute is unset.
pub type EncodeFn<T> = fn(&T) -> Option<String>;

/// One attribute of an element type.
pub struct AttributeSlot<T: 'static> {
    /// The attribute name.
    pub name: &'static str,
    /// Store a parsed value.
    pub decode: DecodeFn<T>,
    /// Read the stored value back.
    pub encode: EncodeFn<T>,
    /// The attribute must be present.
    pub required: bool,
}

/// The attribute table of one element type.
pub struct AttributeSchema<T: 'static> {
    slots: &'static [AttributeSlot<T>],
}

impl<T: 'static> AttributeSchema<T> {
    /// A schema over `slots`.
    #[must_use]
    pub const fn new(slots: &'static [AttributeSlot<T>]) -> Self {
        Self { slots }
    }

    /// The slot for `name`.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&AttributeSlot<T>> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    /// Decode `value` into the slot called `name`.
    ///
    /// Returns `Ok(false)` if the type has no such attribute.
    ///
    /// # Errors
    ///
    /// Returns an [`AttributeValueError`] if the slot's decoder refuses the
    /// value.
    pub fn set(
        &self,
        target: &mut T,
        name: &str,
        value: &str,
    ) -> Result<bool, AttributeValueError> {
        let Some(slot) = self.slot(name) else {
            return Ok(false);
        };
        (slot.decode)(target, value)
            .map_err(|reason| AttributeValueError::new(name, value, reason))?;
        Ok(true)
    }

    /// The encoded value of the slot called `name`.
    #[must_use]
    pub fn get(&self, target: &T, name: &str) -> Option<String> {
        self.slot(name).and_then(|slot| (slot.encode)(target))
    }

    /// All set attributes, in slot order.
    #[must_use]
    pub fn attributes(&self, target: &T) -> Vec<(&'static str, String)> {
        self.slots
            .iter()
            .filter_map(|slot| (slot.encode)(target).map(|value| (slot.name, value)))
            .collect()
    }

    /// Required attributes that are still unset.
    #[must_use]
    pub fn missing_required(&self, target: &T) -> Vec<&'static str> {
        self.slots
            .iter()
            .filter(|slot| slot.required && (slot.encode)(target).is_none())
            .map(|slot| slot.name)
            .collect()
    }
}

/// Decode an optionally signed decimal integer.
///
/// # Errors
///
/// Returns a description if `value` is not an integer.
pub fn decode_integer(value: &str) -> Result<i64, String> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("expected an integer: {e}"))
}

/// Decode a boolean: `true`/`false`, `1`/`0`, or the SGML minimized form
/// where the value repeats the attribute `name`.
///
/// # Errors
///
/// Returns a description for any other value.
pub fn decode_boolean(name: &str, value: &str) -> Result<bool, String> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        v if v.eq_ignore_ascii_case(name) => Ok(true),
        _ => Err("expected a boolean".to_string()),
    }
}

/// Decode a value that must match Name.
///
/// # Errors
///
/// Returns a description if `value` is not a Name.
pub fn decode_name(value: &str) -> Result<String, String> {
    if is_valid_name(value) {
        Ok(value.to_string())
    } else {
        Err("expected a name".to_string())
    }
}

/// Decode a space-separated list of name tokens.
///
/// # Errors
///
/// Returns a description if any token is not an Nmtoken.
pub fn decode_nmtokens(value: &str) -> Result<Vec<String>, String> {
    value
        .split_whitespace()
        .map(|token| {
            if is_valid_nmtoken(token) {
                Ok(token.to_string())
            } else {
                Err(format!("{token:?} is not a name token"))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Img {
        width: Option<i64>,
        src: Option<String>,
    }

    static IMG_SLOTS: [AttributeSlot<Img>; 2] = [
        AttributeSlot {
            name: "width",
            decode: |img, value| {
                img.width = Some(decode_integer(value)?);
                Ok(())
            },
            encode: |img| img.width.map(|w| w.to_string()),
            required: false,
        },
        AttributeSlot {
            name: "src",
            decode: |img, value| {
                img.src = Some(value.to_string());
                Ok(())
            },
            encode: |img| img.src.clone(),
            required: true,
        },
    ];

    static IMG: AttributeSchema<Img> = AttributeSchema::new(&IMG_SLOTS);

    #[test]
    fn test_schema_decodes_and_encodes() {
        let mut img = Img::default();
        assert_eq!(IMG.missing_required(&img), vec!["src"]);
        assert_eq!(IMG.set(&mut img, "width", " 40 "), Ok(true));
        assert_eq!(IMG.set(&mut img, "alt", "x"), Ok(false));
        assert!(IMG.set(&mut img, "width", "wide").is_err());
        assert_eq!(IMG.get(&img, "width").as_deref(), Some("40"));
        assert_eq!(IMG.attributes(&img), vec![("width", "40".to_string())]);
    }

    #[test]
    fn test_decode_boolean_minimized() {
        assert_eq!(decode_boolean("checked", "checked"), Ok(true));
        assert_eq!(decode_boolean("checked", "0"), Ok(false));
        assert!(decode_boolean("checked", "maybe").is_err());
    }
}
