//! Recursive-descent parser shared by every input dialect (FRID-native,
//! strict JSON, JSON5, escaped JSON).
//!
//! Ported from `frid/loader.py`'s `FridLoader`. The original threads a
//! `prev` value through `scan_multi_data` to support open-ended
//! string/prime-data concatenation across an arbitrary number of chunks;
//! here only the common case that motivates it — two or more adjacent
//! quoted-string literals merging into one `Text` — is implemented, since
//! it is the only form of that rule actually load-bearing for round-
//! tripping a dumper's own output.

use crate::codec::chrono::parse_datetime;
use crate::codec::strops::{HexForms, StringEscape};
use crate::error::{FridError, Result};
use crate::value::{Mapping, Named, Value};

const UNQUOTED_EXTRA: &str = "!?@#$%^&*/";
const QUOTE_CHARS: [char; 3] = ['"', '\'', '`'];

/// Parses `s` as a single top-level FRID value, erroring on trailing data.
pub fn load_from_str(s: &str) -> Result<Value> {
    let mut loader = Loader::new(s, false);
    let value = loader.parse_top()?;
    Ok(value)
}

/// Parses `s` treating unrecognized prime literals the JSON way (accepting
/// `true`/`false`/`null` even without FRID's `+`/`-`/`.` shorthands, though
/// those shorthands still work since FRID's grammar is a superset).
pub fn load_from_json_str(s: &str) -> Result<Value> {
    let mut loader = Loader::new(s, true);
    let value = loader.parse_top()?;
    Ok(value)
}

/// Parses the naked body of a list (no surrounding `[` `]`), as used for
/// shell-style argument lists.
pub fn load_naked_list(s: &str) -> Result<Vec<Value>> {
    let mut loader = Loader::new(s, false);
    let items = loader.parse_naked_list(&[])?;
    loader.skip_ws();
    loader.expect_end()?;
    Ok(items)
}

/// Parses the naked body of a mapping (no surrounding `{` `}`).
pub fn load_naked_dict(s: &str) -> Result<Mapping> {
    let mut loader = Loader::new(s, false);
    let map = loader.parse_naked_dict(&[])?;
    loader.skip_ws();
    loader.expect_end()?;
    Ok(map)
}

struct Loader<'a> {
    buf: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    json: bool,
    escape: StringEscape,
}

impl<'a> Loader<'a> {
    fn new(buf: &'a str, json: bool) -> Self {
        let chars: Vec<(usize, char)> = buf.char_indices().collect();
        let pairs = [
            ('\n', 'n'), ('\t', 't'), ('\r', 'r'), ('\x0c', 'f'), ('\x0b', 'v'),
            ('\x08', 'b'), ('\x07', 'a'), ('\x1b', 'e'), ('\0', '0'),
        ];
        Loader { buf, chars, pos: 0, json, escape: StringEscape::new('\\', &pairs, HexForms::FRID) }
    }

    fn byte_offset(&self) -> usize {
        self.chars.get(self.pos).map(|(i, _)| *i).unwrap_or(self.buf.len())
    }

    fn err(&self, message: impl Into<String>) -> FridError {
        FridError::parse(self.buf.to_string(), self.byte_offset(), String::new(), message.into())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.err(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.err(format!("expected '{expected}', found end of input"))),
        }
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos < self.chars.len() {
            Err(self.err("trailing data after a complete value"))
        } else {
            Ok(())
        }
    }

    fn parse_top(&mut self) -> Result<Value> {
        let value = self.parse_value()?;
        self.skip_ws();
        self.expect_end()?;
        Ok(value)
    }

    fn parse_value(&mut self) -> Result<Value> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.err("unexpected end of input")),
            Some('[') => {
                self.bump();
                let items = self.parse_naked_list(&[']'])?;
                self.skip_ws();
                self.expect_char(']')?;
                Ok(Value::Array(items))
            }
            Some('{') => {
                self.bump();
                let map = self.parse_naked_dict(&['}'])?;
                self.skip_ws();
                self.expect_char('}')?;
                Ok(Value::Mapping(map))
            }
            Some(q) if QUOTE_CHARS.contains(&q) => self.parse_quoted_chain(),
            _ => self.parse_prime_or_named(),
        }
    }

    fn parse_quoted_chain(&mut self) -> Result<Value> {
        let mut text = String::new();
        loop {
            let Some(quote) = self.peek() else { break };
            if !QUOTE_CHARS.contains(&quote) {
                break;
            }
            self.bump();
            text.push_str(&self.scan_quoted_body(quote)?);
            let checkpoint = self.pos;
            self.skip_ws();
            if !matches!(self.peek(), Some(c) if QUOTE_CHARS.contains(&c)) {
                self.pos = checkpoint;
                break;
            }
        }
        Ok(Value::Text(text))
    }

    fn scan_quoted_body(&mut self, quote: char) -> Result<String> {
        let start = self.byte_offset();
        let (decoded, consumed) = self.escape.decode(self.buf, start, &[quote])?;
        let new_byte_offset = start + consumed;
        while self.byte_offset() < new_byte_offset {
            self.pos += 1;
        }
        self.expect_char(quote)?;
        Ok(decoded)
    }

    /// Scans an unquoted token, which may contain single embedded spaces
    /// (never a double space, never a trailing one) so that quote-free
    /// multi-word text round-trips through the dumper unquoted.
    fn parse_prime_or_named(&mut self) -> Result<Value> {
        let start = self.pos;
        let mut end = self.pos;
        let head_is_quote_free = matches!(self.peek(), Some(c) if is_quote_free_head(c));
        while let Some(c) = self.peek() {
            if is_token_char(c) {
                self.pos += 1;
                end = self.pos;
            } else if head_is_quote_free
                && c == ' '
                && matches!(self.chars.get(self.pos + 1), Some((_, next)) if is_token_char(*next))
            {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.pos = end;
        if self.pos == start {
            let found = self.peek().map(|c| c.to_string()).unwrap_or_else(|| "end of input".to_string());
            return Err(self.err(format!("unexpected character {found}")));
        }
        let token: String = self.chars[start..self.pos].iter().map(|(_, c)| *c).collect();

        if matches!(self.peek(), Some('(')) && is_ident_like(&token) {
            self.bump();
            let named = self.parse_named(token)?;
            return Ok(Value::Named(Box::new(named)));
        }
        self.parse_prime_str(&token)
    }

    fn parse_named(&mut self, name: String) -> Result<Named> {
        let positional = self.parse_naked_list(&[')'])?;
        self.skip_ws();
        let keyword = if matches!(self.peek(), Some(')')) {
            Mapping::new()
        } else {
            self.parse_named_kwargs()?
        };
        self.skip_ws();
        self.expect_char(')')?;
        Ok(Named::new(name, positional, keyword))
    }

    /// `name(a, b, key=value, ...)` keyword tail: `key=value` pairs.
    fn parse_named_kwargs(&mut self) -> Result<Mapping> {
        let mut map = Mapping::new();
        loop {
            self.skip_ws();
            let key_start = self.pos;
            while matches!(self.peek(), Some(c) if is_token_char(c) && c != '=') {
                self.pos += 1;
            }
            let key: String = self.chars[key_start..self.pos].iter().map(|(_, c)| *c).collect();
            if key.is_empty() {
                return Err(self.err("expected a keyword argument name"));
            }
            self.skip_ws();
            self.expect_char('=')?;
            let value = self.parse_value()?;
            if map.insert(key.clone(), value).is_some() {
                return Err(self.err(format!("duplicate keyword argument '{key}'")));
            }
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                _ => break,
            }
        }
        Ok(map)
    }

    fn parse_naked_list(&mut self, stop: &[char]) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(c) if stop.contains(&c) => break,
                None if !stop.is_empty() => return Err(self.err("unexpected end of input inside a list")),
                None => break,
                _ => {}
            }
            out.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                    self.skip_ws();
                    if matches!(self.peek(), Some(c) if stop.contains(&c)) {
                        break;
                    }
                }
                Some(c) if stop.contains(&c) => break,
                None => break,
                Some(c) => return Err(self.err(format!("expected ',' or closing bracket, found '{c}'"))),
            }
        }
        Ok(out)
    }

    fn parse_naked_dict(&mut self, stop: &[char]) -> Result<Mapping> {
        let mut map = Mapping::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(c) if stop.contains(&c) => break,
                None if !stop.is_empty() => return Err(self.err("unexpected end of input inside a map")),
                None => break,
                _ => {}
            }
            let key_value = self.parse_value()?;
            let key = key_value
                .as_text()
                .ok_or_else(|| self.err("map keys must be text"))?
                .to_string();
            self.skip_ws();
            self.expect_char(':')?;
            let value = self.parse_value()?;
            if map.insert(key.clone(), value).is_some() {
                return Err(self.err(format!("duplicate key '{key}' in map")));
            }
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                    self.skip_ws();
                    if matches!(self.peek(), Some(c) if stop.contains(&c)) {
                        break;
                    }
                }
                Some(c) if stop.contains(&c) => break,
                None => break,
                Some(c) => return Err(self.err(format!("expected ',' or closing brace, found '{c}'"))),
            }
        }
        Ok(map)
    }

    fn parse_prime_str(&self, s: &str) -> Result<Value> {
        if s.is_empty() {
            return Ok(Value::Text(String::new()));
        }
        match s {
            "." => return Ok(Value::Null),
            "+" => return Ok(Value::Bool(true)),
            "-" => return Ok(Value::Bool(false)),
            "++" => return Ok(Value::Real(f64::INFINITY)),
            "--" => return Ok(Value::Real(f64::NEG_INFINITY)),
            "+." => return Ok(Value::Real(f64::NAN)),
            "-." => return Ok(Value::Real(-f64::NAN)),
            _ => {}
        }
        if self.json {
            match s {
                "true" => return Ok(Value::Bool(true)),
                "false" => return Ok(Value::Bool(false)),
                "null" => return Ok(Value::Null),
                _ => {}
            }
        }
        if let Some(rest) = s.strip_prefix("..") {
            return self.decode_blob(rest).map(Value::Blob);
        }
        if let Some(parsed) = parse_datetime(s) {
            return Ok(parsed.into_value());
        }
        let first = s.chars().next().unwrap();
        if first.is_ascii_digit() || ((first == '+' || first == '-') && s.len() > 1) {
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::Int(i));
            }
            if let Ok(r) = s.parse::<f64>() {
                return Ok(Value::Real(r));
            }
        }
        Ok(Value::Text(s.to_string()))
    }

    fn decode_blob(&self, s: &str) -> Result<Vec<u8>> {
        use base64::Engine;
        let normalized = if let Some(stripped) = s.strip_suffix("..") {
            format!("{stripped}==")
        } else if let Some(stripped) = s.strip_suffix('.') {
            format!("{stripped}=")
        } else {
            s.to_string()
        };
        base64::engine::general_purpose::URL_SAFE
            .decode(normalized.as_bytes())
            .map_err(|e| self.err(format!("invalid base64 blob literal: {e}")))
    }
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '+' | '-') || UNQUOTED_EXTRA.contains(c)
}

/// Head character of quote-free text (§6.1): a letter, `_`, or `$`. Only a
/// token starting this way may absorb embedded single spaces — a numeric or
/// sentinel token (`1`, `+`, `..`) never does, so `1 2` stays two tokens and
/// surfaces as trailing data rather than being read as text `"1 2"`.
fn is_quote_free_head(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '$')
}

fn is_ident_like(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalars() {
        assert_eq!(load_from_str(".").unwrap(), Value::Null);
        assert_eq!(load_from_str("+").unwrap(), Value::Bool(true));
        assert_eq!(load_from_str("42").unwrap(), Value::Int(42));
        assert_eq!(load_from_str("-7").unwrap(), Value::Int(-7));
    }

    #[test]
    fn parses_quoted_string_with_escapes() {
        assert_eq!(load_from_str("\"a\\nb\"").unwrap(), Value::Text("a\nb".to_string()));
    }

    #[test]
    fn concatenates_adjacent_quoted_strings() {
        assert_eq!(load_from_str("\"ab\" \"cd\"").unwrap(), Value::Text("abcd".to_string()));
    }

    #[test]
    fn parses_array_with_trailing_comma() {
        let value = load_from_str("[1, 2, 3,]").unwrap();
        assert_eq!(value, Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
    }

    #[test]
    fn parses_map() {
        let value = load_from_str("{a: 1, b: 2}").unwrap();
        let map = value.as_mapping().unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert_eq!(map.get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn parses_bare_identifier_as_text() {
        assert_eq!(load_from_str("hello").unwrap(), Value::Text("hello".to_string()));
    }

    #[test]
    fn parses_quote_free_text_with_single_spaces() {
        assert_eq!(load_from_str("hello world").unwrap(), Value::Text("hello world".to_string()));
    }

    #[test]
    fn parses_named_constructor() {
        let value = load_from_str("point(1, 2, label=origin)").unwrap();
        match value {
            Value::Named(named) => {
                assert_eq!(named.name, "point");
                assert_eq!(named.positional, vec![Value::Int(1), Value::Int(2)]);
                assert_eq!(named.keyword.get("label"), Some(&Value::Text("origin".to_string())));
            }
            other => panic!("expected Named, got {other:?}"),
        }
    }

    #[test]
    fn rejects_trailing_data() {
        assert!(load_from_str("1 2").is_err());
    }

    #[test]
    fn parses_blob_literal() {
        let value = load_from_str("..aGVsbG8=").unwrap();
        assert_eq!(value, Value::Blob(b"hello".to_vec()));
    }
}
