//! Runtime values of the expression language and their coercion rules

use std::cmp::Ordering;
use std::fmt;

use serde_yaml::Value;

/// Result of evaluating an expression
///
/// `Undefined` stands for a context value nobody could resolve. It is
/// absorbing: comparisons against it are false and it renders as empty text,
/// so one unknown identifier never turns into a failure elsewhere.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExprValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ExprValue>),
    Object(Vec<(String, ExprValue)>),
}

impl ExprValue {
    pub fn object<K: Into<String>>(pairs: impl IntoIterator<Item = (K, ExprValue)>) -> Self {
        Self::Object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }

    /// Numeric coercion used when operands of different types meet
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => parse_number(s),
            Self::Undefined | Self::Array(_) | Self::Object(_) => f64::NAN,
        }
    }

    /// Property lookup; keys compare case-insensitively
    pub fn get(&self, key: &str) -> ExprValue {
        match self {
            Self::Object(pairs) => pairs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
            _ => Self::Undefined,
        }
    }

    /// Index lookup: numbers index arrays, anything else is a property name
    pub fn index(&self, index: &ExprValue) -> ExprValue {
        match (self, index) {
            (Self::Array(items), Self::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => {
                items.get(*n as usize).cloned().unwrap_or_default()
            }
            (Self::Object(_), index) => self.get(&index.to_string()),
            _ => Self::Undefined,
        }
    }

    /// Property names of an object, in insertion order
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::Object(pairs) => pairs.iter().map(|(k, _)| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Loose equality: mixed primitive types compare as numbers, strings ignore case
    pub fn loose_eq(&self, other: &ExprValue) -> bool {
        match (self, other) {
            (Self::Undefined, _) | (_, Self::Undefined) => false,
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a.to_lowercase() == b.to_lowercase(),
            (Self::Array(_) | Self::Object(_), _) | (_, Self::Array(_) | Self::Object(_)) => false,
            _ => self.to_number() == other.to_number(),
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`; `None` when the operands don't compare
    pub fn loose_cmp(&self, other: &ExprValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Undefined, _) | (_, Self::Undefined) => None,
            (Self::Array(_) | Self::Object(_), _) | (_, Self::Array(_) | Self::Object(_)) => None,
            (Self::String(a), Self::String(b)) => Some(a.to_lowercase().cmp(&b.to_lowercase())),
            _ => self.to_number().partial_cmp(&other.to_number()),
        }
    }
}

fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    if let Some(hex) = text.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    text.parse().unwrap_or(f64::NAN)
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined | Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::String(s) => write!(f, "{}", s),
            Self::Array(_) => write!(f, "Array"),
            Self::Object(_) => write!(f, "Object"),
        }
    }
}

impl From<&Value> for ExprValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(s.clone()),
            Value::Sequence(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Mapping(mapping) => Self::Object(
                mapping
                    .iter()
                    .map(|(k, v)| (ExprValue::from(k).to_string(), Self::from(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from(&tagged.value),
        }
    }
}

impl From<&serde_json::Value> for ExprValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::String(s.clone()),
            Json::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Json::Object(map) => {
                Self::Object(map.iter().map(|(k, v)| (k.clone(), Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for ExprValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ExprValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for ExprValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ExprValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
