//! Identifier and quote-free string char-class predicates.
//!
//! Ported from `frid/guards.py`, treated as authoritative over the sibling
//! `frid/checks.py` module in the original source, whose equivalent
//! predicates have `and` where they needed `or`, making every one of its
//! head/char/tail checks always `false` — not a variant worth reproducing.

/// First character of an identifier: a letter or `_`.
fn is_identifier_head(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Middle characters of an identifier: alphanumeric or `_.+-`.
fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '+' | '-')
}

/// Last character of an identifier: alphanumeric or `_`.
fn is_identifier_tail(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Is `s` a valid FRID identifier?
///
/// Must start with a letter or `_`, contain only letters/digits/`._+-` in
/// the body, and not end with `.`, `+`, or `-`.
pub fn is_frid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else { return false };
    if !is_identifier_head(first) {
        return false;
    }
    let rest: Vec<char> = chars.collect();
    let Some((&last, body)) = rest.split_last() else {
        // Single-character identifier: head rule already satisfied it, and
        // the tail rule (alphanumeric or `_`) must also hold for that char.
        return is_identifier_tail(first);
    };
    body.iter().all(|&c| is_identifier_char(c)) && is_identifier_tail(last)
}

/// First character of a quote-free string: a letter, `_`, or `$`.
fn is_quote_free_head(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '$')
}

/// Middle characters of a quote-free string: alphanumeric, a single space,
/// or one of `_.+-$@%`.
fn is_quote_free_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ' ' | '_' | '.' | '+' | '-' | '$' | '@' | '%')
}

/// Last character of a quote-free string: alphanumeric or `_.+-%` — `$` and
/// `@` are valid mid-string but never as the last character. This narrows
/// `frid/guards.py`'s `is_quote_free_tail`, which still allows a trailing
/// `$`.
fn is_quote_free_tail(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '+' | '-' | '%')
}

/// Is `s` representable unquoted in FRID-native output?
///
/// Must start with a letter/`_`/`$`, contain only quote-free body chars
/// (single spaces allowed, no double space), and not end in `$` or `@`.
pub fn is_frid_quote_free(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let mut chars = s.chars();
    let first = chars.next().unwrap();
    if !is_quote_free_head(first) {
        return false;
    }
    let rest: Vec<char> = chars.collect();
    let last = match rest.split_last() {
        Some((&last, body)) => {
            if !body.iter().all(|&c| is_quote_free_char(c)) {
                return false;
            }
            last
        }
        None => first,
    };
    if !is_quote_free_tail(last) {
        return false;
    }
    !s.contains("  ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_basic() {
        assert!(is_frid_identifier("abc"));
        assert!(is_frid_identifier("_abc_123"));
        assert!(is_frid_identifier("a"));
        assert!(!is_frid_identifier(""));
        assert!(!is_frid_identifier("1abc"));
        assert!(!is_frid_identifier("abc-"));
        assert!(!is_frid_identifier("abc."));
        assert!(is_frid_identifier("a-b.c_d"));
    }

    #[test]
    fn quote_free_basic() {
        assert!(is_frid_quote_free("hello world"));
        assert!(is_frid_quote_free("a.b+c-d"));
        assert!(!is_frid_quote_free("hello  world"));
        assert!(!is_frid_quote_free("ends$"));
        assert!(!is_frid_quote_free("ends@"));
        assert!(!is_frid_quote_free(""));
        assert!(is_frid_quote_free("$starts"));
        assert!(!is_frid_quote_free("1starts"));
    }
}
