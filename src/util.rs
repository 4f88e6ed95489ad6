// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Crate-private utilities.

/// A wrapper around [`str`] references whose [`PartialEq`] and [`Eq`]
/// implementations are ASCII-case-insensitive.
pub struct Caseless<'a>(pub &'a str);

impl PartialEq for Caseless<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(other.0)
    }
}

impl Eq for Caseless<'_> {}

/// The digits of base 36, lower-case.
const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Converts the big-endian unsigned integer given by `octets` into its
/// base-36 representation, most significant digit first. Lower-case
/// letters are used. Zero converts to `"0"`.
pub fn to_base36(octets: &[u8]) -> String {
    let mut number = octets.to_vec();
    let mut digits = Vec::new();

    // Schoolbook long division by 36; each pass yields one digit, least
    // significant first.
    while number.iter().any(|&octet| octet != 0) {
        let mut remainder = 0u32;
        for octet in number.iter_mut() {
            let accumulator = (remainder << 8) | *octet as u32;
            *octet = (accumulator / 36) as u8;
            remainder = accumulator % 36;
        }
        digits.push(BASE36_DIGITS[remainder as usize]);
    }

    if digits.is_empty() {
        return String::from("0");
    }
    digits.iter().rev().map(|&digit| digit as char).collect()
}

/// The maximum length of a DNS label.
pub const MAX_LABEL_LEN: usize = 63;

/// The maximum length of an absolute domain name in text form, with its
/// trailing dot. This corresponds to 255 octets on the wire.
pub const MAX_NAME_LEN: usize = 254;

/// Returns whether `name` can be sent as a DNS query name: every label
/// is 1 to 63 octets long and the whole name fits in 255 wire octets. A
/// trailing dot is allowed.
pub fn is_valid_query_name(name: &str) -> bool {
    let relative = name.strip_suffix('.').unwrap_or(name);
    !relative.is_empty()
        && relative.len() + 1 <= MAX_NAME_LEN
        && relative
            .split('.')
            .all(|label| !label.is_empty() && label.len() <= MAX_LABEL_LEN)
}

/// Returns whether `text` is non-empty and consists only of ASCII
/// digits.
pub fn is_ascii_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_conversion_works() {
        assert_eq!(to_base36(&[]), "0");
        assert_eq!(to_base36(&[0, 0]), "0");
        assert_eq!(to_base36(&[35]), "z");
        assert_eq!(to_base36(&[36]), "10");
        assert_eq!(to_base36(&[0x01, 0x00]), "74");
    }

    #[test]
    fn query_names_are_checked() {
        assert!(is_valid_query_name("1._num.numexample.com."));
        assert!(is_valid_query_name("numexample.com"));
        assert!(!is_valid_query_name(""));
        assert!(!is_valid_query_name("."));
        assert!(!is_valid_query_name("a..b."));
        assert!(!is_valid_query_name(&format!("_{}.com.", "x".repeat(63))));
        assert!(is_valid_query_name(&format!("{}.com.", "x".repeat(63))));
        let long = format!("{}.{}", ["x".repeat(63).as_str(); 3].join("."), "x".repeat(61));
        assert!(is_valid_query_name(&format!("{long}.")));
        assert!(!is_valid_query_name(&format!("{long}.a.")));
    }

    #[test]
    fn caseless_compares_ascii_case_insensitively() {
        assert!(Caseless("HTTPS") == Caseless("https"));
        assert!(Caseless("http") != Caseless("https"));
    }
}
