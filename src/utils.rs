//! Locale-independent number parsing for header fields.
//!
//! NIC writes header numbers with a period as decimal separator regardless of the
//! recording machine's locale, so parsing is pinned to that one format.

/// 非本地化的无符号整数解析（只接受ASCII数字）
pub fn parse_uint_invariant(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    s.parse().ok()
}

/// 非本地化的小数解析，小数点只能是 '.'
///
/// Signs, exponents, thousands separators and commas are rejected.
pub fn parse_decimal_invariant(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (integer_part, decimal_part) = match s.split_once('.') {
        Some((i, d)) => (i, d),
        None => (s, ""),
    };

    if integer_part.is_empty() && decimal_part.is_empty() {
        return None;
    }

    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !digits_only(integer_part) || !digits_only(decimal_part) {
        return None;
    }

    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uint_invariant() {
        assert_eq!(parse_uint_invariant("123"), Some(123));
        assert_eq!(parse_uint_invariant(" 42\n"), Some(42));
        assert_eq!(parse_uint_invariant("0"), Some(0));
        assert_eq!(parse_uint_invariant("-1"), None);
        assert_eq!(parse_uint_invariant("+1"), None);
        assert_eq!(parse_uint_invariant("1,000"), None);
        assert_eq!(parse_uint_invariant(""), None);
    }

    #[test]
    fn test_parse_decimal_invariant() {
        assert_eq!(parse_decimal_invariant("1.35"), Some(1.35));
        assert_eq!(parse_decimal_invariant("2"), Some(2.0));
        assert_eq!(parse_decimal_invariant(".5"), Some(0.5));
        assert_eq!(parse_decimal_invariant("1,4"), None);
        assert_eq!(parse_decimal_invariant("1e3"), None);
        assert_eq!(parse_decimal_invariant("1.2.3"), None);
        assert_eq!(parse_decimal_invariant("."), None);
    }
}
