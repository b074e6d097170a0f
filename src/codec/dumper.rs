//! Value-to-text rendering in FRID-native, strict-JSON, JSON5, or
//! escaped-JSON mode, all sharing one walk over [`Value`].
//!
//! Ported from `frid/dumper.py`'s `FridDumper`. User hooks
//! (`print_real`/`print_date`/`print_blob`/`print_user`) let a caller
//! override how any one kind of leaf renders, falling back to the built-in
//! rendering when a hook returns `None`.

use base64::Engine;

use crate::codec::pretty::{Printer, TokenKind};
use crate::error::{FridError, Result};
use crate::codec::chrono::{format_chrono, ParsedChrono};
use crate::value::{is_frid_identifier, is_frid_quote_free, Mapping, Value};

/// Which text dialect a dumper emits.
#[derive(Debug, Clone)]
pub enum OutputMode {
    /// FRID's own native, most permissive grammar.
    Frid,
    /// Strict JSON: no NaN/Infinity, no blobs, no named constructors.
    Json,
    /// JSON5: strict JSON plus `NaN`/`Infinity`/unquoted identifier keys.
    Json5,
    /// JSON wrapping FRID text for anything JSON itself can't express,
    /// tagged with the given prefix string inside a JSON string literal.
    EscapedJson(String),
}

impl OutputMode {
    fn uses_frid_grammar(&self) -> bool {
        matches!(self, OutputMode::Frid)
    }

    fn escape_prefix(&self) -> Option<&str> {
        match self {
            OutputMode::EscapedJson(prefix) => Some(prefix.as_str()),
            _ => None,
        }
    }
}

type RealHook<'a> = dyn Fn(f64, &str) -> Option<String> + 'a;
type DateHook<'a> = dyn Fn(&ParsedChrono, &str) -> Option<String> + 'a;
type BlobHook<'a> = dyn Fn(&[u8], &str) -> Option<String> + 'a;

/// Optional user callbacks overriding how individual leaf kinds render.
#[derive(Default)]
pub struct DumperHooks<'a> {
    pub print_real: Option<Box<RealHook<'a>>>,
    pub print_date: Option<Box<DateHook<'a>>>,
    pub print_blob: Option<Box<BlobHook<'a>>>,
}

pub struct Dumper<'a, P: Printer> {
    printer: P,
    mode: OutputMode,
    ascii_only: bool,
    escape: crate::codec::strops::StringEscape,
    hooks: DumperHooks<'a>,
}

impl<'a, P: Printer> Dumper<'a, P> {
    pub fn new(printer: P, mode: OutputMode, ascii_only: bool) -> Self {
        use crate::codec::strops::HexForms;
        let hex = if ascii_only {
            HexForms::NONE
        } else {
            match mode {
                OutputMode::Frid | OutputMode::EscapedJson(_) => HexForms::FRID,
                OutputMode::Json5 => HexForms::JSON5,
                OutputMode::Json => HexForms::JSON,
            }
        };
        let pairs = [
            ('\n', 'n'), ('\t', 't'), ('\r', 'r'), ('\x0c', 'f'), ('\x0b', 'v'),
            ('\x08', 'b'), ('\x07', 'a'), ('\x1b', 'e'), ('\0', '0'),
        ];
        let escape = crate::codec::strops::StringEscape::new('\\', &pairs, hex).ascii_only(ascii_only);
        Dumper { printer, mode, ascii_only, escape, hooks: DumperHooks::default() }
    }

    pub fn with_hooks(mut self, hooks: DumperHooks<'a>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn into_printer(self) -> P {
        self.printer
    }

    fn real_to_str(&self, data: f64, is_int: bool, path: &str) -> Result<String> {
        if is_int {
            return Ok((data as i64).to_string());
        }
        let frid_or_escaped = self.mode.uses_frid_grammar() || self.mode.escape_prefix().is_some();
        if frid_or_escaped {
            if data.is_nan() {
                return Ok(if data.is_sign_negative() { "-.".to_string() } else { "+.".to_string() });
            }
            if data.is_infinite() {
                return Ok(if data > 0.0 { "++".to_string() } else { "--".to_string() });
            }
            return Ok(format_real(data));
        }
        if matches!(self.mode, OutputMode::Json5) {
            if data.is_nan() {
                return Ok("NaN".to_string());
            }
            if data.is_infinite() {
                return Ok(if data > 0.0 { "+Infinity".to_string() } else { "-Infinity".to_string() });
            }
            return Ok(format_real(data));
        }
        if data.is_nan() {
            return Err(FridError::encode(path, "NaN is not representable in strict JSON"));
        }
        if data.is_infinite() {
            return Err(FridError::encode(path, "Infinity is not representable in strict JSON"));
        }
        Ok(format_real(data))
    }

    fn blob_to_str(&self, data: &[u8], path: &str) -> Result<String> {
        let b64 = base64::engine::general_purpose::URL_SAFE.encode(data);
        let out = if let Some(stripped) = b64.strip_suffix("==") {
            format!("..{stripped}..")
        } else if let Some(stripped) = b64.strip_suffix('=') {
            format!("..{stripped}.")
        } else {
            format!("..{b64}")
        };
        if self.mode.uses_frid_grammar() {
            return Ok(out);
        }
        match self.mode.escape_prefix() {
            Some(prefix) => Ok(format!("\"{prefix}{out}\"")),
            None => Err(FridError::encode(path, "blobs are not representable in this dump mode")),
        }
    }

    fn prime_data_str(&self, value: &Value, path: &str) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(Some(if self.mode.uses_frid_grammar() { ".".to_string() } else { "null".to_string() })),
            Value::Bool(b) => Ok(Some(if self.mode.uses_frid_grammar() {
                if *b { "+".to_string() } else { "-".to_string() }
            } else {
                if *b { "true".to_string() } else { "false".to_string() }
            })),
            Value::Int(i) => {
                if let Some(hook) = &self.hooks.print_real {
                    if let Some(out) = hook(*i as f64, path) {
                        return Ok(Some(self.maybe_quoted_sync(&out, path)?));
                    }
                }
                Ok(Some(self.real_to_str(*i as f64, true, path)?))
            }
            Value::Real(r) => {
                if let Some(hook) = &self.hooks.print_real {
                    if let Some(out) = hook(*r, path) {
                        return Ok(Some(self.maybe_quoted_sync(&out, path)?));
                    }
                }
                Ok(Some(self.real_to_str(*r, false, path)?))
            }
            Value::Text(s) if self.mode.uses_frid_grammar() && is_frid_identifier(s) => Ok(Some(s.clone())),
            Value::Text(_) => Ok(None),
            Value::Date(_) | Value::Time(..) | Value::DateTime(_) => {
                let parsed = match value {
                    Value::Date(d) => ParsedChrono::Date(*d),
                    Value::Time(t, off) => ParsedChrono::Time(*t, *off),
                    Value::DateTime(dt) => ParsedChrono::DateTime(*dt),
                    _ => unreachable!(),
                };
                if let Some(hook) = &self.hooks.print_date {
                    if let Some(out) = hook(&parsed, path) {
                        return Ok(Some(self.maybe_quoted_sync(&out, path)?));
                    }
                }
                let rendered = format_chrono(&parsed, 3)?;
                if self.mode.uses_frid_grammar() {
                    return Ok(Some(rendered));
                }
                match self.mode.escape_prefix() {
                    Some(prefix) => Ok(Some(format!("\"{prefix}{rendered}\""))),
                    None => Err(FridError::encode(path, "date/time values are not representable in this dump mode")),
                }
            }
            Value::Blob(b) => {
                if let Some(hook) = &self.hooks.print_blob {
                    if let Some(out) = hook(b, path) {
                        return Ok(Some(self.maybe_quoted_sync(&out, path)?));
                    }
                }
                Ok(Some(self.blob_to_str(b, path)?))
            }
            Value::Array(_) | Value::Mapping(_) | Value::Named(_) => Ok(None),
        }
    }

    fn maybe_quoted_sync(&self, s: &str, path: &str) -> Result<String> {
        if self.mode.uses_frid_grammar() {
            return Ok(s.to_string());
        }
        let escaped = self.escape.encode(s, '"');
        match self.mode.escape_prefix() {
            Some(prefix) => Ok(format!("\"{prefix}{escaped}\"")),
            None => Err(FridError::encode(path, "this dump mode cannot carry an unescaped custom rendering")),
        }
    }

    fn print_quoted(&mut self, s: &str, as_label: bool) {
        let escaped = self.escape.encode(s, '"');
        let kind = if as_label { TokenKind::Label } else { TokenKind::Entry };
        self.printer.print(&format!("\"{escaped}\""), kind);
    }

    fn is_unquoted_key(&self, key: &str) -> bool {
        if self.ascii_only && !key.is_ascii() {
            return false;
        }
        if self.mode.uses_frid_grammar() {
            return is_frid_identifier(key);
        }
        matches!(self.mode, OutputMode::Json5) && is_json5_bare_key(key)
    }

    fn print_array(&mut self, items: &[Value], path: &str) -> Result<()> {
        self.printer.print("[", TokenKind::Start);
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.printer.print(",", TokenKind::Sep0);
            }
            self.print_value(item, &format!("{path}[{i}]"))?;
        }
        let trailing_ok = self.mode.uses_frid_grammar() || matches!(self.mode, OutputMode::Json5);
        if !items.is_empty() && trailing_ok {
            self.printer.print(",", TokenKind::Opt0);
        }
        self.printer.print("]", TokenKind::Close);
        Ok(())
    }

    fn print_mapping(&mut self, map: &Mapping, path: &str) -> Result<()> {
        self.printer.print("{", TokenKind::Start);
        for (i, (key, value)) in map.iter().enumerate() {
            if i > 0 {
                self.printer.print(",", TokenKind::Sep0);
            }
            if self.is_unquoted_key(key) {
                self.printer.print(key, TokenKind::Label);
            } else {
                self.print_quoted(key, true);
            }
            self.printer.print(":", TokenKind::Sep1);
            self.print_value(value, path)?;
        }
        let trailing_ok = self.mode.uses_frid_grammar() || matches!(self.mode, OutputMode::Json5);
        if !map.is_empty() && trailing_ok {
            self.printer.print(",", TokenKind::Opt0);
        }
        self.printer.print("}", TokenKind::Close);
        Ok(())
    }

    fn print_named(&mut self, name: &str, positional: &[Value], keyword: &Mapping, path: &str) -> Result<()> {
        if !self.mode.uses_frid_grammar() {
            return Err(FridError::encode(path, "named constructors are only representable in FRID-native mode"));
        }
        if !is_frid_identifier(name) {
            return Err(FridError::encode(path, format!("invalid constructor name {name:?}")));
        }
        self.printer.print(name, TokenKind::Entry);
        self.printer.print("(", TokenKind::Start);
        for (i, arg) in positional.iter().enumerate() {
            if i > 0 {
                self.printer.print(",", TokenKind::Sep0);
            }
            self.print_value(arg, &format!("{path}({name})[{i}]"))?;
        }
        if !positional.is_empty() && !keyword.is_empty() {
            self.printer.print(",", TokenKind::Sep0);
        }
        for (i, (key, value)) in keyword.iter().enumerate() {
            if i > 0 {
                self.printer.print(",", TokenKind::Sep0);
            }
            self.printer.print(key, TokenKind::Label);
            self.printer.print("=", TokenKind::Sep1);
            self.print_value(value, &format!("{path}({name}).{key}"))?;
        }
        self.printer.print(")", TokenKind::Close);
        Ok(())
    }

    /// Renders one [`Value`] and everything it contains.
    pub fn print_value(&mut self, value: &Value, path: &str) -> Result<()> {
        if let Some(s) = self.prime_data_str(value, path)? {
            self.printer.print(&s, TokenKind::Entry);
            return Ok(());
        }
        match value {
            Value::Text(s) => {
                if self.mode.uses_frid_grammar() && is_frid_quote_free(s) {
                    self.printer.print(s, TokenKind::Entry);
                } else {
                    self.print_quoted(s, false);
                }
                Ok(())
            }
            Value::Array(items) => self.print_array(items, path),
            Value::Mapping(map) => self.print_mapping(map, path),
            Value::Named(named) => self.print_named(&named.name, &named.positional, &named.keyword, path),
            _ => unreachable!("prime_data_str already handled every remaining variant"),
        }
    }
}

fn format_real(data: f64) -> String {
    if data == data.trunc() && data.abs() < 1e15 {
        format!("{data:.1}")
    } else {
        format!("{data}")
    }
}

fn is_json5_bare_key(key: &str) -> bool {
    if matches!(key, "true" | "false" | "null") {
        return false;
    }
    let normalized = key.replace('$', "_");
    let mut chars = normalized.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Renders `value` to a freshly allocated string in the given mode.
pub fn dump_to_string(value: &Value, mode: OutputMode) -> Result<String> {
    let mut buf = String::new();
    {
        let printer = crate::codec::pretty::CompactPrinter::new(&mut buf);
        let mut dumper = Dumper::new(printer, mode, false);
        dumper.print_value(value, "")?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dumps_scalars_frid() {
        assert_eq!(dump_to_string(&Value::Null, OutputMode::Frid).unwrap(), ".");
        assert_eq!(dump_to_string(&Value::Bool(true), OutputMode::Frid).unwrap(), "+");
        assert_eq!(dump_to_string(&Value::Int(42), OutputMode::Frid).unwrap(), "42");
    }

    #[test]
    fn dumps_array_and_map() {
        let value = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(dump_to_string(&value, OutputMode::Frid).unwrap(), "[1, 2]");
    }

    #[test]
    fn strict_json_rejects_nan() {
        let err = dump_to_string(&Value::Real(f64::NAN), OutputMode::Json).unwrap_err();
        assert!(matches!(err, FridError::Encode { .. }));
    }

    #[test]
    fn json5_allows_nan() {
        assert_eq!(dump_to_string(&Value::Real(f64::NAN), OutputMode::Json5).unwrap(), "NaN");
    }

    #[test]
    fn quote_free_text_stays_bare_in_frid() {
        assert_eq!(dump_to_string(&Value::text("hello"), OutputMode::Frid).unwrap(), "hello");
    }

    #[test]
    fn non_quote_free_text_is_quoted() {
        assert_eq!(dump_to_string(&Value::text("has space end$"), OutputMode::Frid).unwrap(), "\"has space end$\"");
    }
}
