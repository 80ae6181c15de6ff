//! Typed item values carried by item events

use std::fmt;

use serde::Deserialize;

use crate::error::{DecodeError, DecodeResult};

/// The `{type, value}` pair the server uses for item states and commands
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypedValue {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// An item state or command value
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    /// `UnDef`, `NULL`, `UNDEF` or the normalized `"NONE"` placeholder
    Undefined,
    Number(f64),
    Quantity { value: f64, unit: String },
    Percent(f64),
    OnOff(bool),
    OpenClosed(bool),
    Text(String),
    /// A value type without a dedicated variant, kept verbatim
    Raw { kind: String, value: String },
}

impl ItemValue {
    /// Decode a typed value. `event_type` is only used for error messages.
    pub fn from_typed(event_type: &str, typed: &TypedValue) -> DecodeResult<Self> {
        let value = match typed.value.as_deref() {
            None | Some("NULL") | Some("UNDEF") => return Ok(ItemValue::Undefined),
            Some(value) => value,
        };

        let parse_number = |text: &str| {
            text.trim()
                .parse::<f64>()
                .map_err(|e| DecodeError::payload(event_type, format!("{} value {:?}: {}", typed.kind, text, e)))
        };

        match typed.kind.as_str() {
            "UnDef" => Ok(ItemValue::Undefined),
            "Decimal" => Ok(ItemValue::Number(parse_number(value)?)),
            "Percent" => Ok(ItemValue::Percent(parse_number(value)?)),
            "Quantity" => {
                let (number, unit) = value.split_once(' ').unwrap_or((value, ""));
                Ok(ItemValue::Quantity {
                    value: parse_number(number)?,
                    unit: unit.trim().to_string(),
                })
            }
            "OnOff" => match value {
                "ON" => Ok(ItemValue::OnOff(true)),
                "OFF" => Ok(ItemValue::OnOff(false)),
                other => Err(DecodeError::payload(event_type, format!("invalid OnOff value {other:?}"))),
            },
            "OpenClosed" => match value {
                "OPEN" => Ok(ItemValue::OpenClosed(true)),
                "CLOSED" => Ok(ItemValue::OpenClosed(false)),
                other => Err(DecodeError::payload(event_type, format!("invalid OpenClosed value {other:?}"))),
            },
            "String" => Ok(ItemValue::Text(value.to_string())),
            kind => Ok(ItemValue::Raw {
                kind: kind.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, ItemValue::Undefined)
    }
}

/// Renders the value in the server's text form, as sent with raw-text bodies
impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemValue::Undefined => write!(f, "NULL"),
            ItemValue::Number(n) | ItemValue::Percent(n) => write!(f, "{n}"),
            ItemValue::Quantity { value, unit } if unit.is_empty() => write!(f, "{value}"),
            ItemValue::Quantity { value, unit } => write!(f, "{value} {unit}"),
            ItemValue::OnOff(true) => write!(f, "ON"),
            ItemValue::OnOff(false) => write!(f, "OFF"),
            ItemValue::OpenClosed(true) => write!(f, "OPEN"),
            ItemValue::OpenClosed(false) => write!(f, "CLOSED"),
            ItemValue::Text(text) => write!(f, "{text}"),
            ItemValue::Raw { value, .. } => write!(f, "{value}"),
        }
    }
}
