//! Bidirectional string-escape codec.
//!
//! Configured by a sequence of (raw, escaped) character pairs, a single
//! escape-lead character, and up to three hex-escape prefixes for 2-, 4-,
//! and 8-hex-digit forms. Ported from the shape of `frid/strops.py`'s
//! `StringEscape`, simplified to the direct encode/decode pass a dumper and
//! loader actually need (the original's generic multi-pattern
//! `str_transform` scanner is an implementation choice, not a contract).

use crate::error::{FridError, Result};

/// Which hex-escape widths are enabled, and their lead character.
#[derive(Debug, Clone, Copy)]
pub struct HexForms {
    pub two: Option<char>,
    pub four: Option<char>,
    pub eight: Option<char>,
}

impl HexForms {
    pub const NONE: HexForms = HexForms { two: None, four: None, eight: None };

    /// The FRID-native set: `\x##`, `\u####`, `\U########`.
    pub const FRID: HexForms = HexForms { two: Some('x'), four: Some('u'), eight: Some('U') };

    /// The JSON set: only `\u####` (no 2- or 8-digit forms).
    pub const JSON: HexForms = HexForms { two: None, four: Some('u'), eight: None };

    /// The JSON5 set: `\x##` and `\u####`, no 8-digit form.
    pub const JSON5: HexForms = HexForms { two: Some('x'), four: Some('u'), eight: None };
}

/// A configured bidirectional escape codec.
#[derive(Debug, Clone)]
pub struct StringEscape {
    escape_lead: char,
    /// (raw char, escape suffix) pairs used for encoding *and* decoding.
    pairs: Vec<(char, char)>,
    hex: HexForms,
    ascii_only: bool,
}

impl StringEscape {
    pub fn new(escape_lead: char, pairs: &[(char, char)], hex: HexForms) -> Self {
        StringEscape { escape_lead, pairs: pairs.to_vec(), hex, ascii_only: false }
    }

    pub fn ascii_only(mut self, ascii_only: bool) -> Self {
        self.ascii_only = ascii_only;
        self
    }

    fn encoded_pair_for(&self, c: char) -> Option<char> {
        self.pairs.iter().find(|(raw, _)| *raw == c).map(|(_, esc)| *esc)
    }

    fn decoded_pair_for(&self, esc: char) -> Option<char> {
        self.pairs.iter().find(|(_, e)| *e == esc).map(|(raw, _)| *raw)
    }

    /// Encode `s`, wrapping the output so that `quote` characters inside the
    /// string are always escaped even when `quote` is not one of the
    /// configured pairs (matches `StringEscapeEncode`'s call convention of
    /// passing the surrounding quote char in, used by the dumper).
    pub fn encode(&self, s: &str, quote: char) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            if c == quote {
                out.push(self.escape_lead);
                out.push(quote);
                continue;
            }
            if let Some(esc) = self.encoded_pair_for(c) {
                out.push(self.escape_lead);
                out.push(esc);
                continue;
            }
            let cp = c as u32;
            if cp >= 0x20 && cp < 0x7f {
                out.push(c);
                continue;
            }
            if self.ascii_only || cp >= 0x80 {
                out.push_str(&self.encode_hex(cp));
                continue;
            }
            out.push(c);
        }
        out
    }

    fn encode_hex(&self, cp: u32) -> String {
        if cp < 0x100 {
            if let Some(lead) = self.hex.two {
                return format!("{}{}{:02x}", self.escape_lead, lead, cp);
            }
        }
        if cp < 0x10000 {
            if let Some(lead) = self.hex.four {
                return format!("{}{}{:04x}", self.escape_lead, lead, cp);
            }
        } else if let Some(lead) = self.hex.eight {
            return format!("{}{}{:08x}", self.escape_lead, lead, cp);
        }
        if let Some(lead) = self.hex.four {
            // Surrogate pair via the 4-digit form for code points above
            // U+FFFF when no 8-digit form is configured.
            let cpx = cp - 0x10000;
            let hi = (cpx >> 10) + 0xD800;
            let lo = (cpx & 0x3FF) + 0xDC00;
            return format!("{0}{1}{2:04x}{0}{1}{3:04x}", self.escape_lead, lead, hi, lo);
        }
        // No hex escape configured at all: emit the raw char (best effort).
        char::from_u32(cp).map(String::from).unwrap_or_default()
    }

    /// Decode a string previously produced by [`Self::encode`], starting at
    /// byte offset `start` and scanning until any character in `stop_at` is
    /// hit, or the input is exhausted. Returns the decoded text and the
    /// number of *bytes* consumed (not including a trailing stop char).
    pub fn decode(&self, s: &str, start: usize, stop_at: &[char]) -> Result<(String, usize)> {
        let bytes_from_start = &s[start..];
        let mut out = String::new();
        let mut chars = bytes_from_start.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if stop_at.contains(&c) {
                return Ok((out, i));
            }
            if c != self.escape_lead {
                out.push(c);
                continue;
            }
            let (esc_char_idx, esc_char) = chars.next().ok_or_else(|| {
                FridError::parse(s.to_string(), start + i, String::new(), "truncated escape sequence")
            })?;
            let _ = esc_char_idx;
            if esc_char == self.escape_lead {
                out.push(self.escape_lead);
                continue;
            }
            if stop_at.contains(&esc_char) {
                out.push(esc_char);
                continue;
            }
            if let Some(raw) = self.decoded_pair_for(esc_char) {
                out.push(raw);
                continue;
            }
            let width = if Some(esc_char) == self.hex.two {
                2
            } else if Some(esc_char) == self.hex.four {
                4
            } else if Some(esc_char) == self.hex.eight {
                8
            } else {
                return Err(FridError::parse(
                    s.to_string(),
                    start + i,
                    String::new(),
                    format!("unknown escape sequence '{esc_char}'"),
                ));
            };
            let mut hex = String::with_capacity(width);
            for _ in 0..width {
                let (_, hc) = chars.next().ok_or_else(|| {
                    FridError::parse(s.to_string(), start + i, String::new(), "truncated hex escape")
                })?;
                hex.push(hc);
            }
            let cp = u32::from_str_radix(&hex, 16).map_err(|_| {
                FridError::parse(s.to_string(), start + i, String::new(), "invalid hex digits in escape")
            })?;
            match char::from_u32(cp) {
                Some(ch) => out.push(ch),
                None => {
                    // Might be the first half of a surrogate pair; handled by
                    // the caller re-combining two \u escapes is out of scope
                    // for FRID (surrogate pairs only ever appear in the
                    // encoder's own output for code points > U+FFFF, and
                    // `char::from_u32` rejects lone surrogates). Emit the
                    // replacement character rather than erroring, mirroring
                    // lenient decoders.
                    out.push('\u{FFFD}');
                }
            }
        }
        Ok((out, bytes_from_start.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frid_escape() -> StringEscape {
        StringEscape::new(
            '\\',
            &[('\n', 'n'), ('\t', 't'), ('\r', 'r'), ('\x0c', 'f'), ('\x0b', 'v'), ('\x08', 'b'), ('\x07', 'a'), ('\x1b', 'e'), ('\0', '0')],
            HexForms::FRID,
        )
    }

    #[test]
    fn round_trip_basic() {
        let codec = frid_escape();
        let input = "hello\nworld\t\"quoted\"";
        let encoded = codec.encode(input, '"');
        let (decoded, consumed) = codec.decode(&encoded, 0, &['"']).unwrap();
        assert_eq!(decoded, input);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn round_trip_unicode() {
        let codec = frid_escape().ascii_only(true);
        let input = "caf\u{e9} \u{1F600}";
        let encoded = codec.encode(input, '"');
        assert!(encoded.is_ascii());
        let (decoded, _) = codec.decode(&encoded, 0, &['"']).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn decode_stops_at_quote() {
        let codec = frid_escape();
        let (decoded, consumed) = codec.decode("abc\"rest", 0, &['"']).unwrap();
        assert_eq!(decoded, "abc");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn decode_truncated_hex_errors() {
        let codec = frid_escape();
        let err = codec.decode("\\x1", 0, &[]).unwrap_err();
        assert!(matches!(err, FridError::Parse { .. }));
    }
}
