//! Export token issuing and validation.
//!
//! Tokens look like `figment_<base36 millis>_<6 base36 chars>`. They are
//! syntactically valid but not guaranteed unique; a collision overwrites
//! that token's records.

use rand::Rng;

pub const TOKEN_PREFIX: &str = "figment";
const SUFFIX_LEN: usize = 6;
const MAX_TOKEN_LEN: usize = 128;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn issue_token() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    issue_token_at(millis, &mut rand::thread_rng())
}

fn issue_token_at<R: Rng + ?Sized>(millis: u64, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}_{}_{}", TOKEN_PREFIX, to_base36(millis), suffix)
}

pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Tokens end up in file names, so only `[A-Za-z0-9_-]` is allowed.
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Accept a client-supplied token, or issue a fresh one when none (or an empty one) was sent.
pub fn accept_or_issue(supplied: Option<&str>) -> Result<String, String> {
    match supplied.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) if is_valid_token(token) => Ok(token.to_string()),
        Some(token) => Err(format!(
            "Invalid token '{}': only letters, digits, '_' and '-' are allowed (max {} chars)",
            token, MAX_TOKEN_LEN
        )),
        None => Ok(issue_token()),
    }
}
