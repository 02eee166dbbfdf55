//! Small byte/string helpers for trimming whitespace and parsing a leading
//! run of digits, working on borrowed `&str` slices rather than mutating a
//! buffer in place.

/// Advance past any leading ASCII whitespace.
pub fn strip_left(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_ascii_whitespace())
}

/// Drop any trailing ASCII whitespace run.
pub fn chomp(s: &str) -> &str {
    s.trim_end_matches(|c: char| c.is_ascii_whitespace())
}

/// `chomp(strip_left(s))`.
pub fn trim(s: &str) -> &str {
    chomp(strip_left(s))
}

/// Outcome of [`parse_long`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseLongStatus {
    /// No digits were consumed at all.
    NoDigits,
    /// Digits were consumed but the value doesn't fit in an `i64`.
    Overflow,
    /// Parsed cleanly.
    Ok,
}

/// Parse a leading run of ASCII digits (after skipping leading whitespace)
/// as a non-negative `i64`. Returns the parsed value (0 on failure), the
/// unconsumed tail, and a status distinguishing "no digits" from "overflow"
/// from "ok": callers need that distinction to tell a genuine test number
/// apart from descriptive text that merely starts with a digit.
pub fn parse_long(s: &str) -> (i64, &str, ParseLongStatus) {
    let skipped = s.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let digit_len = skipped
        .as_bytes()
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();

    if digit_len == 0 {
        return (0, skipped, ParseLongStatus::NoDigits);
    }

    let (digits, tail) = skipped.split_at(digit_len);
    match digits.parse::<i64>() {
        Ok(value) => (value, tail, ParseLongStatus::Ok),
        Err(_) => (0, tail, ParseLongStatus::Overflow),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_left_skips_leading_whitespace() {
        assert_eq!(strip_left("   hello"), "hello");
        assert_eq!(strip_left("hello"), "hello");
        assert_eq!(strip_left("   "), "");
    }

    #[test]
    fn chomp_drops_trailing_whitespace() {
        assert_eq!(chomp("hello   "), "hello");
        assert_eq!(chomp("hello\r\n"), "hello");
        assert_eq!(chomp(""), "");
    }

    #[test]
    fn trim_is_chomp_of_strip_left() {
        for s in ["  a  ", "a", "", "   ", "\tfoo\t\n"] {
            assert_eq!(trim(s), chomp(strip_left(s)));
        }
    }

    #[test]
    fn parse_long_ok() {
        let (v, tail, status) = parse_long("123abc");
        assert_eq!(v, 123);
        assert_eq!(tail, "abc");
        assert_eq!(status, ParseLongStatus::Ok);
    }

    #[test]
    fn parse_long_no_digits() {
        let (_, tail, status) = parse_long("abc");
        assert_eq!(tail, "abc");
        assert_eq!(status, ParseLongStatus::NoDigits);
    }

    #[test]
    fn parse_long_overflow() {
        let huge = "99999999999999999999999999";
        let (_, _, status) = parse_long(huge);
        assert_eq!(status, ParseLongStatus::Overflow);
    }

    #[test]
    fn parse_long_skips_leading_whitespace() {
        let (v, tail, status) = parse_long("   42 ");
        assert_eq!(v, 42);
        assert_eq!(tail, " ");
        assert_eq!(status, ParseLongStatus::Ok);
    }
}
