//! Filter configs and their persisted JSON form.
//!
//! A `FilterConfig` pairs a compiled rule with the visual treatment applied
//! when it matches. Rules serialize as a tagged union keyed by their
//! `discriminator` field; colors serialize as hex scalars rather than
//! structural objects.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::rule::{EvalContext, ItemSnapshot, Rule};

/// An RGBA color, persisted as `#RRGGBB` (opaque) or `#AARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// Parse a `#RRGGBB` or `#AARRGGBB` scalar.
    pub fn from_hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let parse = |range: &str| u8::from_str_radix(range, 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(
                parse(&digits[0..2])?,
                parse(&digits[2..4])?,
                parse(&digits[4..6])?,
            )),
            8 => Some(Self {
                a: parse(&digits[0..2])?,
                r: parse(&digits[2..4])?,
                g: parse(&digits[4..6])?,
                b: parse(&digits[6..8])?,
            }),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 0xff {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s)
            .ok_or_else(|| D::Error::custom(format!("invalid color scalar '{}'", s)))
    }
}

/// The visual treatment attached to a matching rule. Opaque to evaluation;
/// only the renderer interprets it. `meta` carries the free-form descriptive
/// entries of a filter's `meta` block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

/// Raised when the persisted form cannot be reconstructed: unknown
/// discriminator, missing field, or malformed scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializeError {
    pub message: String,
}

impl DeserializeError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deserialize error: {}", self.message)
    }
}

impl std::error::Error for DeserializeError {}

/// The unit exchanged with persistence: a compiled rule plus its display
/// treatment. Equality is structural over both fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub rule: Rule,
    pub display: DisplayConfig,
}

impl FilterConfig {
    pub fn new(rule: Rule, display: DisplayConfig) -> Self {
        Self { rule, display }
    }

    /// Thin delegation to the rule; the display plays no role in matching.
    pub fn test(&self, ctx: &dyn EvalContext, item: &ItemSnapshot) -> bool {
        self.rule.test(ctx, item)
    }

    pub fn to_json(filters: &[FilterConfig]) -> Result<String, serde_json::Error> {
        serde_json::to_string(filters)
    }

    pub fn from_json(json: &str) -> Result<Vec<FilterConfig>, DeserializeError> {
        serde_json::from_str(json).map_err(|e| DeserializeError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Comparator;

    fn sample_filters() -> Vec<FilterConfig> {
        vec![
            FilterConfig::new(
                Rule::And {
                    left: Box::new(Rule::ItemValue {
                        cmp: Comparator::GtEq,
                        rhs: 1000,
                    }),
                    right: Box::new(Rule::Not {
                        inner: Box::new(Rule::ItemIdIn { ids: vec![995] }),
                    }),
                },
                DisplayConfig {
                    color: Some(Color::rgb(0xff, 0, 0)),
                    text: Some("valuable".to_string()),
                    ..DisplayConfig::default()
                },
            ),
            FilterConfig::new(
                Rule::ItemNameIn {
                    names: vec!["Bones".to_string()],
                },
                DisplayConfig {
                    hidden: Some(true),
                    meta: [("author".to_string(), "sam".to_string())].into(),
                    ..DisplayConfig::default()
                },
            ),
        ]
    }

    #[test]
    fn test_json_round_trip() {
        let filters = sample_filters();
        let json = FilterConfig::to_json(&filters).unwrap();
        let restored = FilterConfig::from_json(&json).unwrap();
        assert_eq!(restored, filters);
    }

    #[test]
    fn test_rule_serializes_with_discriminator() {
        let json = FilterConfig::to_json(&sample_filters()).unwrap();
        assert!(json.contains(r#""discriminator":"and""#));
        assert!(json.contains(r#""discriminator":"item_value""#));
        assert!(json.contains(r#""cmp":"GT_EQ""#));
    }

    #[test]
    fn test_unknown_discriminator_is_rejected() {
        let json = r#"[{"rule":{"discriminator":"frobnicate"},"display":{}}]"#;
        let err = FilterConfig::from_json(json).unwrap_err();
        assert!(err.message.contains("frobnicate"));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        // item_value requires both cmp and rhs
        let json = r#"[{"rule":{"discriminator":"item_value","cmp":"GT"},"display":{}}]"#;
        assert!(FilterConfig::from_json(json).is_err());
    }

    #[test]
    fn test_color_hex_round_trip() {
        for hex in ["#FF0000", "#01A2B3", "#80FF0000"] {
            let color = Color::from_hex(hex).unwrap();
            assert_eq!(color.to_hex(), hex);
        }
        assert_eq!(Color::from_hex("#ff0000"), Some(Color::rgb(0xff, 0, 0)));
    }

    #[test]
    fn test_color_rejects_malformed_scalars() {
        for bad in ["FF0000", "#FF00", "#GG0000", "#FF00001", ""] {
            assert_eq!(Color::from_hex(bad), None, "accepted {bad:?}");
        }
    }

    #[test]
    fn test_color_serializes_as_scalar() {
        let json = serde_json::to_string(&Color::rgb(0xff, 0, 0)).unwrap();
        assert_eq!(json, r##""#FF0000""##);
    }
}
