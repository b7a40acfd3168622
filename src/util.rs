//! Shared data structures used across xiphos components.

pub mod bit_vector;
pub mod hash_set;
pub mod priority_queue;

pub use bit_vector::BitVector;
pub use hash_set::{HashKeyStatus, HashSet};
pub use priority_queue::{PqInsert, PriorityQueue};

/// Multiplicative string hash shared by query, filter and term hashing.
pub fn str_hash(s: &str) -> u64 {
    s.bytes()
        .fold(0u64, |h, b| h.wrapping_mul(37).wrapping_add(u64::from(b)))
}

/// Hash contribution of an `f32`, taken from its bit pattern.
pub fn float_hash(f: f32) -> u64 {
    u64::from(f.to_bits())
}

/// Format a float with seven significant digits, dropping trailing zeros
/// but always keeping one digit after the decimal point.
///
/// ```
/// use xiphos::util::float_to_s;
///
/// assert_eq!(float_to_s(2.0), "2.0");
/// assert_eq!(float_to_s(0.4f32 as f64), "0.4");
/// assert_eq!(float_to_s(12345678.0), "1.234568e+07");
/// ```
pub fn float_to_s(num: f64) -> String {
    if num.is_nan() {
        return "NaN".to_string();
    }
    if num.is_infinite() {
        return if num < 0.0 { "-Infinity" } else { "Infinity" }.to_string();
    }

    let sci = format!("{num:.6e}");
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (sci.clone(), 0),
    };

    // Six integer digits would leave no fraction digit, so those go
    // scientific as well.
    let (mut body, suffix) = if num != 0.0 && !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        (mantissa, format!("e{sign}{:02}", exp.abs()))
    } else {
        let precision = (6 - exp).max(1) as usize;
        (format!("{num:.precision$}"), String::new())
    };

    while body.ends_with('0') {
        let bytes = body.as_bytes();
        if bytes.len() < 2 || !bytes[bytes.len() - 2].is_ascii_digit() {
            break;
        }
        body.pop();
    }
    body + &suffix
}
