//! Canonical forms for header text and sample cell values.

/// Lowercase, turn underscores into spaces, drop everything that is not a
/// letter, digit or whitespace (any script), then trim and collapse runs of
/// whitespace to one space.
pub fn normalize(header: &str) -> String {
    let stripped: String = header
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim a sample value and collapse internal whitespace (non-breaking spaces
/// included) without changing case or punctuation, so patterns see the value
/// the way it was typed.
pub fn normalize_sample(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an amount written with either `.` or `,` as decimal separator and
/// optional thousands separators or currency text ("1.234,56 ден", "27,826.17").
pub fn parse_amount(value: &str) -> Option<f64> {
    let kept: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let last_dot = kept.rfind('.');
    let last_comma = kept.rfind(',');
    let decimal = match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(if d > c { '.' } else { ',' }),
        (Some(d), None) => decimal_if_not_grouping(&kept, d, '.'),
        (None, Some(c)) => decimal_if_not_grouping(&kept, c, ','),
        (None, None) => None,
    };
    let mut canonical = String::with_capacity(kept.len());
    for (i, c) in kept.char_indices() {
        match c {
            '.' | ',' => {
                if Some(c) == decimal && Some(i) == kept.rfind(c) {
                    canonical.push('.');
                }
            }
            '-' if i == 0 => canonical.push('-'),
            '-' => {}
            _ => canonical.push(c),
        }
    }
    canonical.parse::<f64>().ok()
}

/// A lone separator followed by exactly three digits, repeated, is grouping
/// ("1.234.567"); otherwise it is the decimal point.
fn decimal_if_not_grouping(s: &str, last: usize, sep: char) -> Option<char> {
    let occurrences = s.matches(sep).count();
    let tail = &s[last + sep.len_utf8()..];
    if tail.len() == 3 && (occurrences > 1 || s.trim_start_matches('-').find(sep) <= Some(3)) {
        None
    } else {
        Some(sep)
    }
}
