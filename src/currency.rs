// Currency Normalizer
// Display strings from the exports -> signed f64

/// Symbols stripped before parsing. Longer prefixes first.
const CURRENCY_SYMBOLS: [&str; 7] = ["US$", "USD", "$", "€", "£", "¥", "￥"];

/// Normalize a monetary display string into a signed amount.
///
/// Handles currency symbols, thousands separators, surrounding whitespace
/// and accounting-style negatives. Anything unparseable becomes `0.0` so
/// totals stay defined.
///
/// ```
/// use delivery_report::normalize_amount;
///
/// assert_eq!(normalize_amount("$1,234.56"), 1234.56);
/// assert_eq!(normalize_amount("(5.00)"), -5.0);
/// assert_eq!(normalize_amount("  7 "), 7.0);
/// assert_eq!(normalize_amount("n/a"), 0.0);
/// ```
pub fn normalize_amount(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    let mut s = cleaned.as_str();
    let mut negative = false;

    // Sign, parentheses and symbol may nest in any order: "$(5.00)", "(5.00)USD", "-$3"
    loop {
        if s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
            negative = !negative;
            s = &s[1..s.len() - 1];
        } else if let Some(rest) = s.strip_prefix('-') {
            negative = !negative;
            s = rest;
        } else if let Some(rest) = s.strip_prefix('+') {
            s = rest;
        } else if let Some(rest) = strip_symbol(s) {
            s = rest;
        } else {
            break;
        }
    }

    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return 0.0;
    }

    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            if negative {
                -v
            } else {
                v
            }
        }
        _ => 0.0,
    }
}

fn strip_symbol(s: &str) -> Option<&str> {
    CURRENCY_SYMBOLS
        .iter()
        .find_map(|symbol| s.strip_prefix(symbol).or_else(|| s.strip_suffix(symbol)))
}
