//! Engine-neutral script values.
//!
//! `ScriptValue` is the only shape the core exchanges with the script host.
//! Coercions follow the Lua conventions the handlers are written against:
//! numbers are string-coercible, numeric strings are integer-coercible.
//! Strings are byte strings, as in the engine; they need not be UTF-8.

use std::fmt;

use axum::body::Bytes;

/// A value crossing the host/script boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(Bytes),
    Table(ScriptTable),
    /// A value the host cannot represent (functions, userdata, threads).
    Opaque(&'static str),
}

impl ScriptValue {
    /// Type name as the script would report it.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Nil => "nil",
            ScriptValue::Boolean(_) => "boolean",
            ScriptValue::Integer(_) | ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Table(_) => "table",
            ScriptValue::Opaque(name) => *name,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, ScriptValue::Nil)
    }

    pub fn as_table(&self) -> Option<&ScriptTable> {
        match self {
            ScriptValue::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Integer coercion: integers, integral floats and numeric strings.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            ScriptValue::Integer(i) => Some(*i),
            ScriptValue::Number(n) => float_to_integer(*n),
            ScriptValue::String(s) => {
                let s = std::str::from_utf8(s).ok()?.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(float_to_integer))
            }
            _ => None,
        }
    }

    /// Byte-string coercion: strings verbatim, numbers formatted the way
    /// the script's `tostring` formats them. Everything else is not coercible.
    pub fn to_bytes(&self) -> Option<Bytes> {
        match self {
            ScriptValue::String(s) => Some(s.clone()),
            ScriptValue::Integer(_) | ScriptValue::Number(_) => self.to_text().map(Bytes::from),
            _ => None,
        }
    }

    /// Text coercion, as `to_bytes` but decoded lossily as UTF-8.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ScriptValue::String(s) => Some(String::from_utf8_lossy(s).into_owned()),
            ScriptValue::Integer(i) => Some(i.to_string()),
            ScriptValue::Number(n) => Some(format_number(*n)),
            _ => None,
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(Bytes::from(s))
    }
}

impl From<Bytes> for ScriptValue {
    fn from(bytes: Bytes) -> Self {
        ScriptValue::String(bytes)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Integer(i)
    }
}

impl From<ScriptTable> for ScriptValue {
    fn from(table: ScriptTable) -> Self {
        ScriptValue::Table(table)
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => write!(f, "<{}>", self.type_name()),
        }
    }
}

fn float_to_integer(n: f64) -> Option<i64> {
    // i64::MAX is not representable as f64; the bound is exclusive.
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

/// Significant digits of the engine's float formatting (`%.14g`).
const FLOAT_DIGITS: i32 = 14;

/// Formats a float as `%.14g`, then marks integral results with `.0`.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        return if n.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // Rounded to the target precision first, so the exponent is final.
    let scientific = format!("{:.*e}", (FLOAT_DIGITS - 1) as usize, n);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let text = if exponent < -4 || exponent >= FLOAT_DIGITS {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (FLOAT_DIGITS - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, n)).to_string()
    };

    if text.bytes().all(|b| b == b'-' || b.is_ascii_digit()) {
        text + ".0"
    } else {
        text
    }
}

fn trim_fraction(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

/// An associative table of key/value pairs.
///
/// Insertion order is preserved; inserting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptTable {
    entries: Vec<(ScriptValue, ScriptValue)>,
}

impl ScriptTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<ScriptValue>, value: impl Into<ScriptValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Appends a pair without checking for an existing key. Used when the
    /// source already guarantees unique keys (an engine table).
    pub fn push(&mut self, key: ScriptValue, value: ScriptValue) {
        self.entries.push((key, value));
    }

    /// Looks up a string-keyed field.
    pub fn get(&self, field: &str) -> Option<&ScriptValue> {
        self.entries.iter().find_map(|(k, v)| match k {
            ScriptValue::String(name) if name == field.as_bytes() => Some(v),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ScriptValue, ScriptValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ScriptTable
where
    K: Into<ScriptValue>,
    V: Into<ScriptValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = ScriptTable::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}
