//! Token-driven pretty printer shared by every dump mode.
//!
//! A dumper never writes whitespace directly — it emits a stream of
//! `(token, TokenKind)` pairs and leaves layout decisions (spacing,
//! indentation, line breaks) to a [`Printer`] implementation. Ported from
//! `frid/pretty.py`'s `PPTokenType`/`PrettyPrint`/`MultilineFormatMixin`.

/// The role a token plays in the output grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A block-opening token such as `[`, `{`, or a named-value `(`.
    Start,
    /// A block-closing token such as `]`, `}`, `)`.
    Close,
    /// A mapping key.
    Label,
    /// A complete array item or mapping value.
    Entry,
    /// A fragment of a larger entry (e.g. one chunk of a streamed string).
    Piece,
    /// The primary separator between entries (typically `,`).
    Sep0,
    /// The secondary separator between a label and its value (typically `:`).
    Sep1,
    /// A primary separator that may be entirely omitted (trailing comma).
    Opt0,
    /// A secondary separator that may be entirely omitted.
    Opt1,
}

/// Receives the token stream and decides how to lay it out.
pub trait Printer {
    fn print(&mut self, token: &str, kind: TokenKind);
    fn finish(&mut self) {}
}

/// Writes tokens into a `String` with no inserted whitespace beyond a
/// single space after `,`/`:` separators — the default, compact behavior
/// every [`Printer`] falls back to.
pub struct CompactPrinter<'a> {
    out: &'a mut String,
}

impl<'a> CompactPrinter<'a> {
    pub fn new(out: &'a mut String) -> Self {
        CompactPrinter { out }
    }
}

impl Printer for CompactPrinter<'_> {
    fn print(&mut self, token: &str, kind: TokenKind) {
        if !matches!(kind, TokenKind::Opt0 | TokenKind::Opt1) {
            self.out.push_str(token);
        }
        if matches!(kind, TokenKind::Sep0 | TokenKind::Sep1) && (token == ":" || token == ",") {
            self.out.push(' ');
        }
    }
}

/// Multi-line, indented layout: newline-and-indent after every opening
/// bracket and before every closing one, one entry per line.
pub struct MultilinePrinter<'a> {
    out: &'a mut String,
    indent: String,
    newline: &'static str,
    extra_comma: bool,
    level: i32,
    delta: Vec<bool>,
    indented_back: bool,
    start_newline: bool,
}

impl<'a> MultilinePrinter<'a> {
    pub fn new(out: &'a mut String, indent_width: usize) -> Self {
        MultilinePrinter {
            out,
            indent: " ".repeat(indent_width),
            newline: "\n",
            extra_comma: false,
            level: 0,
            delta: Vec::new(),
            indented_back: false,
            start_newline: false,
        }
    }

    pub fn with_extra_comma(mut self, extra_comma: bool) -> Self {
        self.extra_comma = extra_comma;
        self
    }
}

impl Printer for MultilinePrinter<'_> {
    fn print(&mut self, token: &str, kind: TokenKind) {
        let mut prefix = String::new();
        if self.start_newline || self.indented_back {
            prefix.push_str(self.newline);
            prefix.push_str(&self.indent.repeat(self.level.max(0) as usize));
        }
        self.indented_back = false;
        self.start_newline = false;

        let mut token = token.to_string();
        match kind {
            TokenKind::Start => {
                if token == "[" || token == "{" {
                    self.level += 1;
                    self.start_newline = true;
                }
                self.delta.push(self.start_newline);
            }
            TokenKind::Close => {
                if token == "}" || token == "]" {
                    self.level -= 1;
                }
                self.indented_back = self.delta.pop().unwrap_or(false);
                if self.indented_back {
                    prefix.clear();
                    prefix.push_str(self.newline);
                    prefix.push_str(&self.indent.repeat(self.level.max(0) as usize));
                }
            }
            TokenKind::Sep0 => {
                prefix.clear();
                self.start_newline = self.delta.last().copied().unwrap_or(false);
                if !self.start_newline {
                    token.push(' ');
                }
            }
            TokenKind::Sep1 => {
                if token == ":" {
                    token.push(' ');
                }
            }
            TokenKind::Opt0 => {
                prefix.clear();
                self.start_newline = self.delta.last().copied().unwrap_or(false);
                if !self.start_newline || !self.extra_comma {
                    token.clear();
                }
            }
            TokenKind::Opt1 => token.clear(),
            TokenKind::Label | TokenKind::Entry | TokenKind::Piece => {}
        }
        if !prefix.is_empty() {
            self.out.push_str(&prefix);
        }
        if !token.is_empty() {
            self.out.push_str(&token);
        }
        if self.level <= 0 {
            self.out.push_str(self.newline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_prints_with_separator_spaces() {
        let mut buf = String::new();
        let mut p = CompactPrinter::new(&mut buf);
        p.print("[", TokenKind::Start);
        p.print("1", TokenKind::Entry);
        p.print(",", TokenKind::Sep0);
        p.print("2", TokenKind::Entry);
        p.print("]", TokenKind::Close);
        assert_eq!(buf, "[1, 2]");
    }

    #[test]
    fn multiline_indents_nested_arrays() {
        let mut buf = String::new();
        let mut p = MultilinePrinter::new(&mut buf, 2);
        p.print("[", TokenKind::Start);
        p.print("1", TokenKind::Entry);
        p.print(",", TokenKind::Sep0);
        p.print("2", TokenKind::Entry);
        p.print("]", TokenKind::Close);
        assert!(buf.contains("\n  1"));
        assert!(buf.contains("\n  2"));
    }
}
