//! Bijective base-26 ticker encoding.
//!
//! A ticker is declared as a big-endian integer push and rendered as a
//! lowercase letter string with "spreadsheet column" numbering: a=1 .. z=26,
//! aa=27 and so on. Zero has no representation; callers reject the empty
//! string.

use num_bigint::BigUint;
use num_traits::Zero;

/// Converts a declared ticker push into its letter form. Returns an empty
/// string for the zero value.
pub fn ticker_from_push(push: &[u8]) -> String {
    to_base26(&BigUint::from_bytes_be(push))
}

fn to_base26(num: &BigUint) -> String {
    let mut result = Vec::new();
    let mut quotient = num.clone();
    let one = BigUint::from(1u8);
    let twenty_six = BigUint::from(26u8);

    while !quotient.is_zero() {
        let decremented = &quotient - &one;
        let remainder = (&decremented % &twenty_six)
            .iter_u32_digits()
            .next()
            .unwrap_or(0) as u8;
        result.push(b'a' + remainder);
        quotient = decremented / &twenty_six;
    }

    result.reverse();
    String::from_utf8(result).unwrap_or_default()
}

/// Inverse of [`ticker_from_push`]; ignores non-letter characters the way
/// the wire format does.
pub fn ticker_to_int(ticker: &str) -> BigUint {
    let mut result = BigUint::zero();
    let twenty_six = BigUint::from(26u8);

    for c in ticker.to_lowercase().chars() {
        if !c.is_ascii_lowercase() {
            continue;
        }
        let position = (c as u8 - b'a') as u32 + 1;
        result = result * &twenty_six + BigUint::from(position);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_letters() {
        assert_eq!(to_base26(&BigUint::from(1u8)), "a");
        assert_eq!(to_base26(&BigUint::from(26u8)), "z");
    }

    #[test]
    fn test_multi_letters() {
        assert_eq!(to_base26(&BigUint::from(27u8)), "aa");
        assert_eq!(to_base26(&BigUint::from(28u8)), "ab");
        assert_eq!(to_base26(&BigUint::from(702u32)), "zz");
        assert_eq!(to_base26(&BigUint::from(703u32)), "aaa");
    }

    #[test]
    fn test_zero_is_empty() {
        assert_eq!(to_base26(&BigUint::zero()), "");
        assert_eq!(ticker_from_push(&[]), "");
    }

    #[test]
    fn test_round_trip() {
        for n in [1u32, 25, 26, 27, 475_254, 12_356_630] {
            let ticker = to_base26(&BigUint::from(n));
            assert_eq!(ticker_to_int(&ticker), BigUint::from(n));
        }
    }

    #[test]
    fn test_from_push_bytes() {
        // 0x1c = 28 → "ab"
        assert_eq!(ticker_from_push(&[0x1c]), "ab");
    }
}
