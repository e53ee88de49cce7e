//! Field and command formatting with modal suppression.
//!
//! Rendering is byte-exact and stateful: every field keeps a last-value
//! memo, every command formatter keeps a last-code and last-identity memo,
//! and modal groups track which member code is active. A token is only
//! produced when the machine does not already know the value.

use crate::command::{Params, Value};
use crate::error::FormatError;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

/// Output control flags, combined by set union (`|`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ctrl {
    /// Emit even when memos say the machine already knows the value.
    pub force: bool,
    /// Drop parameters with no registered field format instead of falling
    /// back to a raw `key+value` token.
    pub strict: bool,
    /// Omit the field entirely when its rendered value is exactly zero.
    pub nonzero: bool,
}

impl Ctrl {
    /// No flags set.
    pub const NONE: Ctrl = Ctrl {
        force: false,
        strict: false,
        nonzero: false,
    };
    /// Only `force`.
    pub const FORCE: Ctrl = Ctrl {
        force: true,
        strict: false,
        nonzero: false,
    };
    /// Only `strict`.
    pub const STRICT: Ctrl = Ctrl {
        force: false,
        strict: true,
        nonzero: false,
    };
    /// Only `nonzero`.
    pub const NONZERO: Ctrl = Ctrl {
        force: false,
        strict: false,
        nonzero: true,
    };
}

impl BitOr for Ctrl {
    type Output = Ctrl;

    fn bitor(self, rhs: Ctrl) -> Ctrl {
        Ctrl {
            force: self.force || rhs.force,
            strict: self.strict || rhs.strict,
            nonzero: self.nonzero || rhs.nonzero,
        }
    }
}

/// Print style for a rendered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Fixed-point with the given number of decimals; trailing fractional
    /// zeros and a trailing point are trimmed, negative zero prints as `0`.
    Fixed(usize),
    /// Double-quoted text.
    Quoted,
    /// The value's plain display form.
    Plain,
}

/// Value types a field accepts.
///
/// Several field formats may share a prefix, distinguished by the type they
/// accept; the first format whose type matches wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accepts {
    /// Any value the style can print.
    #[default]
    Any,
    /// Numbers only.
    Number,
    /// Text only.
    Text,
}

/// Outcome of rendering one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// A rendered `prefix + value` token.
    Token(String),
    /// The field stays silent: memo-equal value, or a NONZERO zero.
    Suppressed,
    /// The value's type does not match this format; try the next one
    /// registered under the same prefix.
    Rejected,
}

/// Renders one typed value into a prefixed token.
#[derive(Debug, Clone)]
pub struct FieldFormat {
    prefix: String,
    style: Style,
    accepts: Accepts,
    ctrl: Ctrl,
    last: Option<Value>,
}

impl FieldFormat {
    /// A field with the given prefix and print style.
    pub fn new(prefix: impl Into<String>, style: Style) -> Self {
        Self {
            prefix: prefix.into(),
            style,
            accepts: Accepts::Any,
            ctrl: Ctrl::NONE,
            last: None,
        }
    }

    /// Restrict the accepted value type.
    pub fn accepts(mut self, accepts: Accepts) -> Self {
        self.accepts = accepts;
        self
    }

    /// Set the field's control flags.
    pub fn ctrl(mut self, ctrl: Ctrl) -> Self {
        self.ctrl = ctrl;
        self
    }

    /// The field's prefix key.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Render a value through this field's memo.
    pub fn render(&mut self, value: &Value) -> FieldOutcome {
        if !self.matches(value) {
            return FieldOutcome::Rejected;
        }
        if !self.ctrl.force && self.last.as_ref() == Some(value) {
            return FieldOutcome::Suppressed;
        }
        self.last = Some(value.clone());
        match self.print(value) {
            Some(text) => FieldOutcome::Token(format!("{}{}", self.prefix, text)),
            None => FieldOutcome::Suppressed,
        }
    }

    /// Format without consulting or updating the memo.
    pub fn format_value(&self, value: &Value) -> Option<String> {
        if !self.matches(value) {
            return None;
        }
        self.print(value)
            .map(|text| format!("{}{}", self.prefix, text))
    }

    /// Clear the memo, forcing re-emission on next use.
    pub fn reset(&mut self) {
        self.last = None;
    }

    fn matches(&self, value: &Value) -> bool {
        let type_ok = match self.accepts {
            Accepts::Any => true,
            Accepts::Number => matches!(value, Value::Number(_)),
            Accepts::Text => matches!(value, Value::Text(_)),
        };
        // Fixed-point can only print numbers, whatever the filter says.
        let style_ok = match self.style {
            Style::Fixed(_) => matches!(value, Value::Number(_)),
            Style::Quoted | Style::Plain => true,
        };
        type_ok && style_ok
    }

    fn print(&self, value: &Value) -> Option<String> {
        let text = match self.style {
            Style::Fixed(places) => {
                let n = value.as_number()?;
                clean_number(format!("{n:.places$}"))
            }
            Style::Quoted => format!("\"{value}\""),
            Style::Plain => value.to_string(),
        };
        if self.ctrl.nonzero && text == "0" {
            return None;
        }
        Some(text)
    }
}

/// Strip trailing fractional zeros and a trailing decimal point, and
/// normalize negative zero.
fn clean_number(mut text: String) -> String {
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text.truncate(0);
        text.push('0');
    }
    text
}

/// A formatted command line: its tokens, and which fields changed.
///
/// `changed` maps field keys to token positions. The code token does not
/// count as changed; a command whose parameters were all suppressed is
/// discarded entirely by [`CommandFormat::emit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Emitted {
    /// Rendered tokens in output order.
    pub tokens: Vec<String>,
    /// Field key to token index, for every field that produced a token.
    pub changed: BTreeMap<String, usize>,
}

impl Emitted {
    /// The space-joined output line.
    pub fn line(&self) -> String {
        self.tokens.join(" ")
    }

    /// Remove the token rendered for `key`, fixing up later indices.
    pub fn remove(&mut self, key: &str) {
        if let Some(index) = self.changed.remove(key) {
            self.tokens.remove(index);
            for position in self.changed.values_mut() {
                if *position > index {
                    *position -= 1;
                }
            }
        }
    }
}

/// Composes a command code and its parameter fields into a token line,
/// suppressing anything the machine already knows.
#[derive(Debug, Clone)]
pub struct CommandFormat {
    code_field: FieldFormat,
    fields: Vec<FieldFormat>,
    ctrl: Ctrl,
    last_code: Option<f64>,
    last_identity: Option<(f64, Vec<(String, Value)>)>,
    modal_groups: Vec<Vec<u64>>,
    active_modals: Vec<Option<u64>>,
}

impl CommandFormat {
    /// A command formatter with the given code prefix and code style.
    pub fn new(prefix: impl Into<String>, style: Style) -> Self {
        Self {
            code_field: FieldFormat::new(prefix, style),
            fields: Vec::new(),
            ctrl: Ctrl::NONE,
            last_code: None,
            last_identity: None,
            modal_groups: Vec::new(),
            active_modals: Vec::new(),
        }
    }

    /// Set the default control flags applied by [`emit`](Self::emit).
    pub fn ctrl(mut self, ctrl: Ctrl) -> Self {
        self.ctrl = ctrl;
        self
    }

    /// Register a field format. Formats sharing a prefix are tried in
    /// registration order; the first whose type matches wins.
    pub fn field(mut self, field: FieldFormat) -> Self {
        self.fields.push(field);
        self
    }

    /// Register a modal group: only one member code is active at a time,
    /// and re-announcing the active member does not re-trigger the group.
    pub fn modal_group(mut self, codes: &[f64]) -> Self {
        self.modal_groups
            .push(codes.iter().map(|c| c.to_bits()).collect());
        self.active_modals.push(None);
        self
    }

    /// The command word prefix.
    pub fn prefix(&self) -> &str {
        self.code_field.prefix()
    }

    /// The currently-active member of the group containing `code`.
    pub fn active_modal(&self, code: f64) -> Option<f64> {
        let group = self.group_of(code)?;
        self.active_modals[group].map(f64::from_bits)
    }

    /// Format `code` and `params` with the formatter's default flags.
    pub fn emit(&mut self, code: f64, params: &Params) -> Result<Option<Emitted>, FormatError> {
        self.emit_with(code, params, self.ctrl)
    }

    /// Format `code` and `params`.
    ///
    /// Returns `Ok(None)` when the whole call is suppressed: an exact
    /// repeat of the previous call without `force`, or a call whose
    /// parameters were all individually suppressed with no new code to
    /// announce.
    pub fn emit_with(
        &mut self,
        code: f64,
        params: &Params,
        ctrl: Ctrl,
    ) -> Result<Option<Emitted>, FormatError> {
        let identity = (code, params.identity());
        if !ctrl.force && self.last_identity.as_ref() == Some(&identity) {
            return Ok(None);
        }
        self.last_identity = Some(identity);

        let mut out = Emitted::default();
        if ctrl.force || self.last_code != Some(code) {
            let token = self
                .code_field
                .format_value(&Value::Number(code))
                .ok_or_else(|| FormatError::UnrenderableCode {
                    prefix: self.prefix().to_string(),
                    code,
                })?;
            out.tokens.push(token);
            self.last_code = Some(code);
        }

        // An already-active group member does not re-trigger its group,
        // though a freshly rendered code token still appears literally.
        if let Some(group) = self.group_of(code) {
            if self.active_modals[group] != Some(code.to_bits()) {
                self.active_modals[group] = Some(code.to_bits());
            }
        }

        for (key, value) in params.iter() {
            let mut candidates = self
                .fields
                .iter_mut()
                .filter(|f| f.prefix() == key)
                .peekable();
            if candidates.peek().is_none() {
                if !ctrl.strict {
                    out.tokens.push(format!("{key}{value}"));
                    out.changed.insert(key.to_string(), out.tokens.len() - 1);
                }
                continue;
            }
            let mut rejected_by_all = true;
            for field in candidates {
                match field.render(value) {
                    FieldOutcome::Token(token) => {
                        out.tokens.push(token);
                        out.changed.insert(key.to_string(), out.tokens.len() - 1);
                        rejected_by_all = false;
                        break;
                    }
                    // The type matched; suppression is final for this key.
                    FieldOutcome::Suppressed => {
                        rejected_by_all = false;
                        break;
                    }
                    FieldOutcome::Rejected => continue,
                }
            }
            if rejected_by_all {
                return Err(FormatError::UnrenderableValue {
                    prefix: key.to_string(),
                    value: value.to_string(),
                });
            }
        }

        // A command with all-suppressed arguments and no new code to
        // announce is not emitted.
        if !params.is_empty() && out.changed.is_empty() {
            return Ok(None);
        }
        Ok(Some(out))
    }

    /// Reset the memos for the named field keys. A key equal to this
    /// formatter's own prefix also clears the last-code and last-identity
    /// memos, for returns to an unknown modal state.
    pub fn reset(&mut self, keys: &[&str]) {
        for key in keys {
            for field in self.fields.iter_mut().filter(|f| f.prefix() == *key) {
                field.reset();
            }
            if self.code_field.prefix() == *key {
                self.last_code = None;
                self.last_identity = None;
            }
        }
    }

    fn group_of(&self, code: f64) -> Option<usize> {
        let bits = code.to_bits();
        self.modal_groups.iter().position(|g| g.contains(&bits))
    }
}

/// Restrict free text for a quoted firmware string field.
///
/// Characters outside `[0-9a-zA-Z.:,=_-]` and whitespace are stripped, and
/// embedded quotes are doubled.
pub fn sanitize_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '"' {
            out.push_str("\"\"");
        } else if c.is_ascii_alphanumeric()
            || c.is_whitespace()
            || matches!(c, '.' | ':' | ',' | '=' | '_' | '-')
        {
            out.push(c);
        }
    }
    out
}

impl fmt::Display for Emitted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(prefix: &str) -> FieldFormat {
        FieldFormat::new(prefix, Style::Fixed(3))
    }

    #[test]
    fn test_numeric_cleanup() {
        let mut x = axis("X");
        assert_eq!(
            x.render(&Value::Number(1.2)),
            FieldOutcome::Token("X1.2".to_string())
        );
        assert_eq!(
            x.render(&Value::Number(1.0)),
            FieldOutcome::Token("X1".to_string())
        );
        assert_eq!(
            x.render(&Value::Number(-0.0)),
            FieldOutcome::Token("X0".to_string())
        );
    }

    #[test]
    fn test_zero_suppression() {
        let mut i = axis("I").ctrl(Ctrl::NONZERO);
        assert_eq!(i.render(&Value::Number(0.0)), FieldOutcome::Suppressed);

        let mut i = axis("I");
        assert_eq!(
            i.render(&Value::Number(0.0)),
            FieldOutcome::Token("I0".to_string())
        );
    }

    #[test]
    fn test_field_memo_and_reset() {
        let mut x = axis("X");
        assert_eq!(
            x.render(&Value::Number(5.0)),
            FieldOutcome::Token("X5".to_string())
        );
        assert_eq!(x.render(&Value::Number(5.0)), FieldOutcome::Suppressed);
        x.reset();
        assert_eq!(
            x.render(&Value::Number(5.0)),
            FieldOutcome::Token("X5".to_string())
        );
    }

    #[test]
    fn test_type_filter_rejects() {
        let mut s = FieldFormat::new("S", Style::Quoted).accepts(Accepts::Text);
        assert_eq!(s.render(&Value::Number(1.0)), FieldOutcome::Rejected);
        assert_eq!(
            s.render(&Value::Text("hello".to_string())),
            FieldOutcome::Token("S\"hello\"".to_string())
        );
    }

    fn plain_g() -> CommandFormat {
        CommandFormat::new("G", Style::Fixed(3))
            .field(axis("X"))
            .field(axis("Y"))
            .field(axis("Z"))
    }

    #[test]
    fn test_repeat_suppression() {
        let mut g = plain_g();
        let params = Params::new().with("X", 5.0);
        assert!(g.emit(1.0, &params).unwrap().is_some());
        assert!(g.emit(1.0, &params).unwrap().is_none());
    }

    #[test]
    fn test_repeat_with_force() {
        let mut g = plain_g().ctrl(Ctrl::FORCE);
        let first = g.emit(1.0, &Params::new().with("X", 5.0)).unwrap().unwrap();
        assert_eq!(first.tokens, vec!["G1", "X5"]);
        // Force re-renders the code token on every call, but fields stay
        // memoized, so an exact repeat still has nothing new to say.
        assert!(g.emit(1.0, &Params::new().with("X", 5.0)).unwrap().is_none());
        // A changed field re-emits, code token included.
        let third = g.emit(1.0, &Params::new().with("X", 6.0)).unwrap().unwrap();
        assert_eq!(third.tokens, vec!["G1", "X6"]);
    }

    #[test]
    fn test_code_token_only_on_change() {
        let mut g = plain_g();
        let out = g.emit(1.0, &Params::new().with("X", 5.0)).unwrap().unwrap();
        assert_eq!(out.tokens, vec!["G1", "X5"]);
        let out = g.emit(1.0, &Params::new().with("X", 6.0)).unwrap().unwrap();
        assert_eq!(out.tokens, vec!["X6"]);
        assert_eq!(out.changed.get("X"), Some(&0));
    }

    #[test]
    fn test_identity_is_order_independent() {
        let mut g = plain_g();
        let forward = Params::new().with("X", 1.0).with("Y", 2.0);
        let reversed = Params::new().with("Y", 2.0).with("X", 1.0);
        assert!(g.emit(1.0, &forward).unwrap().is_some());
        assert!(g.emit(1.0, &reversed).unwrap().is_none());
    }

    #[test]
    fn test_all_suppressed_params_discard_call() {
        let mut g = plain_g();
        assert!(g.emit(1.0, &Params::new().with("X", 5.0)).unwrap().is_some());
        // New code, but its only parameter is memo-suppressed.
        assert!(g.emit(2.0, &Params::new().with("X", 5.0)).unwrap().is_none());
    }

    #[test]
    fn test_modal_reannouncement() {
        let mut g = plain_g().modal_group(&[0.0, 1.0, 2.0, 3.0]);
        let a = g.emit(1.0, &Params::new().with("X", 1.0)).unwrap().unwrap();
        assert_eq!(a.tokens[0], "G1");
        assert_eq!(g.active_modal(1.0), Some(1.0));

        let b = g.emit(2.0, &Params::new().with("X", 2.0)).unwrap().unwrap();
        assert_eq!(b.tokens[0], "G2");
        assert_eq!(g.active_modal(1.0), Some(2.0));

        // A sibling deactivated the group member; A re-renders even though
        // its literal value never changed.
        let a = g.emit(1.0, &Params::new().with("X", 3.0)).unwrap().unwrap();
        assert_eq!(a.tokens[0], "G1");
        assert_eq!(g.active_modal(1.0), Some(1.0));
    }

    #[test]
    fn test_raw_fallback_and_strict() {
        let mut g = plain_g();
        let out = g.emit(4.0, &Params::new().with("P", 500.0)).unwrap().unwrap();
        assert_eq!(out.tokens, vec!["G4", "P500"]);
        assert_eq!(out.changed.get("P"), Some(&1));

        let mut strict = plain_g().ctrl(Ctrl::STRICT);
        // The only parameter is unregistered, so nothing changed and the
        // whole call is discarded.
        assert!(strict
            .emit(4.0, &Params::new().with("P", 500.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_prefix_overloads_pick_by_type() {
        let mut m = CommandFormat::new("M", Style::Fixed(3))
            .ctrl(Ctrl::FORCE)
            .field(
                FieldFormat::new("P", Style::Quoted)
                    .accepts(Accepts::Text)
                    .ctrl(Ctrl::FORCE),
            )
            .field(FieldFormat::new("P", Style::Fixed(0)).ctrl(Ctrl::FORCE));

        let text = m
            .emit(3000.0, &Params::new().with("P", "dialog"))
            .unwrap()
            .unwrap();
        assert_eq!(text.tokens, vec!["M3000", "P\"dialog\""]);

        let number = m
            .emit(4000.0, &Params::new().with("P", 2.0))
            .unwrap()
            .unwrap();
        assert_eq!(number.tokens, vec!["M4000", "P2"]);
    }

    #[test]
    fn test_unrenderable_value_errors() {
        let mut m = CommandFormat::new("M", Style::Fixed(3))
            .ctrl(Ctrl::FORCE)
            .field(FieldFormat::new("S", Style::Quoted).accepts(Accepts::Text));
        let err = m
            .emit(3000.0, &Params::new().with("S", 10.0))
            .unwrap_err();
        assert_eq!(
            err,
            FormatError::UnrenderableValue {
                prefix: "S".to_string(),
                value: "10".to_string(),
            }
        );
    }

    #[test]
    fn test_reset_own_prefix_clears_code_memo() {
        let mut g = plain_g();
        assert!(g.emit(1.0, &Params::new().with("X", 1.0)).unwrap().is_some());
        g.reset(&["G", "X"]);
        let out = g.emit(1.0, &Params::new().with("X", 1.0)).unwrap().unwrap();
        assert_eq!(out.tokens, vec!["G1", "X1"]);
    }

    #[test]
    fn test_emitted_remove_fixes_indices() {
        let mut out = Emitted {
            tokens: vec!["G0".to_string(), "X1".to_string(), "F500".to_string()],
            changed: BTreeMap::from([("X".to_string(), 1), ("F".to_string(), 2)]),
        };
        out.remove("X");
        assert_eq!(out.line(), "G0 F500");
        assert_eq!(out.changed.get("F"), Some(&1));
    }

    #[test]
    fn test_fractional_codes_render_exactly() {
        let mut g = CommandFormat::new("G", Style::Fixed(3)).ctrl(Ctrl::FORCE);
        let out = g.emit(59.1, &Params::new()).unwrap().unwrap();
        assert_eq!(out.line(), "G59.1");
        let mut m = CommandFormat::new("M", Style::Fixed(3)).ctrl(Ctrl::FORCE);
        let out = m.emit(3.9, &Params::new()).unwrap().unwrap();
        assert_eq!(out.line(), "M3.9");
    }

    #[test]
    fn test_sanitize_quoted() {
        assert_eq!(sanitize_quoted("End Mill 6mm"), "End Mill 6mm");
        assert_eq!(sanitize_quoted("say \"hi\""), "say \"\"hi\"\"");
        assert_eq!(sanitize_quoted("a<b>{c}&#d"), "abcd");
        assert_eq!(sanitize_quoted("F=2 L=12, CR:0.5"), "F=2 L=12, CR:0.5");
    }
}
