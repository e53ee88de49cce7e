//! Canonical command model.
//!
//! Commands arrive from an external Normalizer already unit-converted:
//! feed rates are whole numbers in the target feed unit, lengths are floats
//! in the target length unit. Codes are decimal, never integers, because
//! fractional codes select firmware variants (`G59.1`, `M3.9`).

use crate::error::WordError;
use std::fmt;

/// A typed parameter value carried by a canonical command.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A numeric value (axis position, feed, RPM, index).
    Number(f64),
    /// Free text destined for a quoted firmware string field.
    Text(String),
}

impl Value {
    /// The numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    /// The text value, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Text(s) => Some(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl fmt::Display for Value {
    /// Integral numbers print without a fractional part, so raw fallback
    /// tokens and plain-styled fields read `F500`, not `F500.0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Insertion-ordered parameter map.
///
/// Iteration preserves the Normalizer's field order, which fixes token
/// order on the output line. Duplicate-call identity checks in the command
/// formatter compare parameters as an unordered set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    /// An empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace the value under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// The value under `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether no parameters are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Key-sorted copy used for order-independent identity comparison.
    pub(crate) fn identity(&self) -> Vec<(String, Value)> {
        let mut pairs = self.0.clone();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }
}

/// Command word letter.
///
/// The Normalizer decides the word before commands reach the engine; the
/// engine dispatches on this closed tag and never inspects source types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Word {
    /// Geometry and machine-cycle commands.
    G,
    /// Miscellaneous / machine-control commands.
    M,
}

impl Word {
    /// Map a source command letter onto a word tag.
    pub fn from_letter(letter: char) -> Result<Self, WordError> {
        match letter.to_ascii_uppercase() {
            'G' => Ok(Word::G),
            'M' => Ok(Word::M),
            other => Err(WordError(other)),
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Word::G => f.write_str("G"),
            Word::M => f.write_str("M"),
        }
    }
}

/// One canonical machining command: a decimal code plus typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// The command word.
    pub word: Word,
    /// The decimal command code.
    pub code: f64,
    /// Field parameters in source order.
    pub params: Params,
}

impl Command {
    /// A G command with no parameters.
    pub fn g(code: f64) -> Self {
        Self {
            word: Word::G,
            code,
            params: Params::new(),
        }
    }

    /// An M command with no parameters.
    pub fn m(code: f64) -> Self {
        Self {
            word: Word::M,
            code,
            params: Params::new(),
        }
    }

    /// Builder form: attach one parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.set(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Number(500.0).to_string(), "500");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-3.0).to_string(), "-3");
        assert_eq!(Value::Text("M3.9.g".to_string()).to_string(), "M3.9.g");
    }

    #[test]
    fn test_params_preserve_insertion_order() {
        let params = Params::new().with("X", 1.0).with("F", 500.0).with("Y", 2.0);
        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["X", "F", "Y"]);
    }

    #[test]
    fn test_params_set_replaces() {
        let mut params = Params::new().with("X", 1.0);
        params.set("X", 2.0);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("X"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_params_identity_is_order_independent() {
        let a = Params::new().with("X", 1.0).with("Y", 2.0);
        let b = Params::new().with("Y", 2.0).with("X", 1.0);
        assert_ne!(a, b);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_word_from_letter() {
        assert_eq!(Word::from_letter('g'), Ok(Word::G));
        assert_eq!(Word::from_letter('M'), Ok(Word::M));
        assert!(Word::from_letter('T').is_err());
    }

    #[test]
    fn test_command_builder() {
        let cmd = Command::g(1.0).with("X", 10.0).with("F", 500.0);
        assert_eq!(cmd.word, Word::G);
        assert_eq!(cmd.code, 1.0);
        assert_eq!(cmd.params.get("F"), Some(&Value::Number(500.0)));
    }
}
