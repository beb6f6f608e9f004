use std::fmt;

/// Declared type of a solver option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionType {
    Int,
    Float,
    Str,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptionType::Int => "int",
            OptionType::Float => "double",
            OptionType::Str => "string",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl OptionValue {
    pub fn option_type(&self) -> OptionType {
        match self {
            OptionValue::Int(_) => OptionType::Int,
            OptionValue::Float(_) => OptionType::Float,
            OptionValue::Str(_) => OptionType::Str,
        }
    }

    /// Parse `text` as a value of `option_type`. Quotes around strings are
    /// stripped.
    pub fn parse(option_type: OptionType, text: &str) -> Option<Self> {
        let text = text.trim();
        match option_type {
            OptionType::Int => text.parse().ok().map(OptionValue::Int),
            OptionType::Float => text.parse().ok().map(OptionValue::Float),
            OptionType::Str => {
                let unquoted = ['"', '\'']
                    .iter()
                    .find_map(|quote| text.strip_prefix(*quote)?.strip_suffix(*quote))
                    .unwrap_or(text);
                Some(OptionValue::Str(unquoted.to_string()))
            }
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(value) => write!(f, "{value}"),
            OptionValue::Float(value) => write!(f, "{value}"),
            OptionValue::Str(value) => f.write_str(value),
        }
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

/// Rust types usable as option values.
pub trait OptionKind: Sized + Clone + 'static {
    const TYPE: OptionType;

    fn into_value(self) -> OptionValue;

    /// Exact conversion; no widening between types.
    fn from_value(value: OptionValue) -> Option<Self>;
}

impl OptionKind for i64 {
    const TYPE: OptionType = OptionType::Int;

    fn into_value(self) -> OptionValue {
        OptionValue::Int(self)
    }

    fn from_value(value: OptionValue) -> Option<Self> {
        match value {
            OptionValue::Int(value) => Some(value),
            _ => None,
        }
    }
}

impl OptionKind for f64 {
    const TYPE: OptionType = OptionType::Float;

    fn into_value(self) -> OptionValue {
        OptionValue::Float(self)
    }

    fn from_value(value: OptionValue) -> Option<Self> {
        match value {
            OptionValue::Float(value) => Some(value),
            _ => None,
        }
    }
}

impl OptionKind for String {
    const TYPE: OptionType = OptionType::Str;

    fn into_value(self) -> OptionValue {
        OptionValue::Str(self)
    }

    fn from_value(value: OptionValue) -> Option<Self> {
        match value {
            OptionValue::Str(value) => Some(value),
            _ => None,
        }
    }
}
