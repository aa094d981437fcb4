use std::fmt;

use crate::error::Error;

/// Byte count for a referenced/exclusive limit, or a request to drop the limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeLimit {
    Bytes(u64),
    Clear,
}

impl SizeLimit {
    /// Value the kernel expects in `max_rfer`/`max_excl`.
    pub const fn to_raw(self) -> u64 {
        match self {
            SizeLimit::Bytes(n) => n,
            SizeLimit::Clear => u64::MAX,
        }
    }
}

impl fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeLimit::Bytes(n) => write!(f, "{}", n),
            SizeLimit::Clear => f.write_str("none"),
        }
    }
}

fn suffix_exponent(c: u8) -> Option<u32> {
    match c.to_ascii_lowercase() {
        b'k' => Some(1),
        b'm' => Some(2),
        b'g' => Some(3),
        b't' => Some(4),
        _ => None,
    }
}

/// Parses `<digits>[kmgt]` (binary units, any case) or `none`.
pub fn parse_limit(s: &str) -> Result<SizeLimit, Error> {
    if s.eq_ignore_ascii_case("none") {
        return Ok(SizeLimit::Clear);
    }

    let invalid = || Error::InvalidLimit(s.to_string());
    let bytes = s.as_bytes();
    let ndigits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if ndigits == 0 {
        // also covers a leading '-'
        return Err(invalid());
    }

    let (digits, rest) = s.split_at(ndigits);
    let size: u64 = digits.parse().map_err(|_| invalid())?;
    let exp = match rest.as_bytes() {
        [] => 0,
        [c] => suffix_exponent(*c).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };

    1024u64
        .checked_pow(exp)
        .and_then(|mult| size.checked_mul(mult))
        .map(SizeLimit::Bytes)
        .ok_or_else(invalid)
}
