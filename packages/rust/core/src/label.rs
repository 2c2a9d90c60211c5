//! The `objectConfig` attribute: JSON, HTML-escaped into a single attribute
//! value. Only the label box is interpreted; every other key is carried
//! through untouched and in its original order.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use recipeforge_shared::{RecipeForgeError, Result};

use crate::layout::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(rename = "Label")]
    pub label: LabelBox,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelBox {
    #[serde(default, deserialize_with = "coordinate")]
    pub left: i64,

    #[serde(default, deserialize_with = "coordinate")]
    pub top: i64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Coordinates are written by several tools; accept floats and numeric strings.
fn coordinate<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| D::Error::custom(format!("coordinate out of range: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(|f| f.round() as i64)
            .map_err(|_| D::Error::custom(format!("coordinate is not a number: {s:?}"))),
        Value::Null => Ok(0),
        other => Err(D::Error::custom(format!("unexpected coordinate: {other}"))),
    }
}

impl LabelConfig {
    /// Decode a raw attribute value: HTML-unescape, then parse JSON.
    pub fn decode(raw: &str) -> Result<Self> {
        let json = quick_xml::escape::unescape(raw)
            .map_err(|e| RecipeForgeError::config_blob(format!("unescape failed: {e}")))?;
        serde_json::from_str(&json)
            .map_err(|e| RecipeForgeError::config_blob(format!("invalid JSON: {e}")))
    }

    /// Compact JSON, HTML-escaped for storage in the attribute.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_string(self)
            .map_err(|e| RecipeForgeError::config_blob(format!("serialize failed: {e}")))?;
        Ok(quick_xml::escape::escape(json.as_str()).into_owned())
    }

    /// Move the label so it sits `label_offset` left of the fragment.
    pub fn place(&mut self, position: Position, label_offset: i64) {
        self.label.left = position.x - label_offset;
        self.label.top = position.label_top;
    }
}

/// Rewrite a raw `objectConfig` value for `position`.
pub fn reposition(raw: &str, position: Position, label_offset: i64) -> Result<String> {
    let mut config = LabelConfig::decode(raw)?;
    config.place(position, label_offset);
    config.encode()
}
