//! Schema fingerprint (learning cache key) and column letter helpers.

/// Deterministic, order-independent hash of a sheet's header set.
///
/// Headers are sorted before hashing so reordered columns keep their learned
/// mappings; adding, removing or renaming a header yields a new key. The hash
/// is the classic `h * 31 + byte` over the `|`-joined headers, rendered in
/// base 36. Collisions only cost learning quality, never current-run matching.
pub fn fingerprint<S: AsRef<str>>(headers: &[S]) -> String {
    let mut sorted: Vec<&str> = headers.iter().map(|h| h.as_ref()).collect();
    sorted.sort_unstable();
    let joined = sorted.join("|");
    let mut hash: i32 = 0;
    for b in joined.bytes() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(b as i32);
    }
    to_radix36(hash.unsigned_abs())
}

fn to_radix36(mut n: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    out.iter().rev().collect()
}

/// Column index (0-based) to Excel letter (0→A, 25→Z, 26→AA).
pub fn column_index_to_letter(index: usize) -> String {
    let mut n = index;
    let mut s = String::new();
    loop {
        let r = (n % 26) as u8;
        s.insert(0, (b'A' + r) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    s
}

/// Excel letter to column index (A→0, AA→26). Case-insensitive; `None` for
/// empty or non-alphabetic input.
pub fn column_letter_to_index(letter: &str) -> Option<usize> {
    let letter = letter.trim();
    if letter.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for c in letter.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let v = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n.checked_mul(26)?.checked_add(v)?;
    }
    Some(n - 1)
}
