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

//! Validation and normalization of the fields of an address.
//!
//! Every function here lower-cases its input before checking it, and
//! returns the normalized form on success.

use url::Host;

use super::Error;
use crate::util::{is_ascii_digits, MAX_LABEL_LEN};

/// The maximum length of a host, not counting a trailing dot.
const MAX_HOST_LEN: usize = 253;

/// The maximum length of the user info of an email address.
const MAX_USER_INFO_LEN: usize = 64;

/// The minimum and maximum number of digits in a telephone number.
const TELEPHONE_DIGITS: std::ops::RangeInclusive<usize> = 2..=15;

/// Validates and normalizes a host. Hosts beginning with `+` must be
/// telephone numbers; all other hosts must be domain names, which are
/// converted to their ASCII-compatible encoding if necessary.
pub fn normalize_host(host: &str) -> Result<String, Error> {
    let host = host.trim().to_lowercase();
    if let Some(digits) = host.strip_prefix('+') {
        if is_ascii_digits(digits) && TELEPHONE_DIGITS.contains(&digits.len()) {
            return Ok(host);
        } else {
            return Err(Error::MalformedTelephoneNumber);
        }
    }

    let host = host.strip_suffix('.').unwrap_or(&host);
    let host = if host.is_ascii() {
        host.to_owned()
    } else {
        match Host::parse(host) {
            Ok(Host::Domain(ascii)) => ascii,
            _ => return Err(Error::MalformedHost),
        }
    };
    validate_domain(&host)?;
    Ok(host)
}

/// Returns whether `host` is a valid domain name or telephone number.
pub fn is_valid_host(host: &str) -> bool {
    normalize_host(host).is_ok()
}

/// Checks the domain-name grammar: at least two labels, each of 1 to 63
/// letters, digits, hyphens, or underscores, with no label beginning or
/// ending with a hyphen, and a top-level label that is not entirely
/// numeric.
fn validate_domain(host: &str) -> Result<(), Error> {
    if host.len() > MAX_HOST_LEN {
        return Err(Error::HostTooLong);
    }

    let mut n_labels = 0;
    let mut last_label = "";
    for label in host.split('.') {
        if label.is_empty() {
            return Err(Error::MalformedHost);
        } else if label.len() > MAX_LABEL_LEN {
            return Err(Error::LabelTooLong);
        } else if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::MalformedHost);
        } else if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(Error::MalformedHost);
        }
        n_labels += 1;
        last_label = label;
    }

    if n_labels < 2 || is_ascii_digits(last_label) {
        Err(Error::MalformedHost)
    } else {
        Ok(())
    }
}

/// Validates and normalizes a path into its `/`-rooted form. Empty and
/// `.` segments are dropped and `..` removes the preceding segment, so
/// `a//b/./c/..` normalizes to `/a/b`. The empty path normalizes to `/`.
/// A `..` above the root is malformed.
pub fn normalize_path(path: &str) -> Result<String, Error> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => (),
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::MalformedPathSegment);
                }
            }
            _ => segments.push(normalize_path_segment(segment)?),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Validates and normalizes a single path segment. Segments containing
/// non-ASCII characters are converted to their ASCII-compatible
/// encoding, like host labels. A segment becomes part of a DNS name, so
/// it may not be empty or begin or end with `.`.
pub fn normalize_path_segment(segment: &str) -> Result<String, Error> {
    let segment = segment.to_lowercase();
    if segment.is_empty()
        || segment.starts_with('.')
        || segment.ends_with('.')
        || segment
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(Error::MalformedPathSegment);
    }

    let segment = if segment.is_ascii() {
        segment
    } else {
        match Host::parse(&segment) {
            Ok(Host::Domain(ascii)) => ascii,
            _ => return Err(Error::MalformedPathSegment),
        }
    };

    if segment.len() > MAX_LABEL_LEN {
        Err(Error::PathSegmentTooLong)
    } else {
        Ok(segment)
    }
}

/// Validates and normalizes the user info (local part) of an email
/// address.
pub fn normalize_user_info(user_info: &str) -> Result<String, Error> {
    let user_info = user_info.to_lowercase();
    if user_info.len() > MAX_USER_INFO_LEN {
        Err(Error::UserInfoTooLong)
    } else if user_info.is_empty()
        || user_info.contains("..")
        || user_info.starts_with('.')
        || user_info.ends_with('.')
        || user_info.contains('\\')
        || user_info
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
    {
        Err(Error::MalformedUserInfo)
    } else {
        Ok(user_info)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_are_lowercased() {
        assert_eq!(normalize_host("NumExample.COM").unwrap(), "numexample.com");
        assert_eq!(normalize_host("numexample.com.").unwrap(), "numexample.com");
    }

    #[test]
    fn unicode_hosts_are_converted_to_ascii() {
        assert_eq!(normalize_host("bücher.de").unwrap(), "xn--bcher-kva.de");
    }

    #[test]
    fn malformed_hosts_are_rejected() {
        for host in ["", "com", "a..com", "-a.com", "a-.com", "a b.com", "1.2.3.4"] {
            assert!(normalize_host(host).is_err(), "{host} was accepted");
        }
        let long_label = "x".repeat(64);
        assert_eq!(
            normalize_host(&format!("{long_label}.com")),
            Err(Error::LabelTooLong),
        );
        let long_host = ["x".repeat(60).as_str(); 5].join(".");
        assert_eq!(normalize_host(&long_host), Err(Error::HostTooLong));
    }

    #[test]
    fn telephone_numbers_are_validated() {
        assert_eq!(normalize_host("+441632960000").unwrap(), "+441632960000");
        for host in ["+", "+1", "+1234567890123456", "+44a", "+44 1632"] {
            assert_eq!(
                normalize_host(host),
                Err(Error::MalformedTelephoneNumber),
                "{host} was accepted",
            );
        }
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(normalize_path("").unwrap(), "/");
        assert_eq!(normalize_path("/").unwrap(), "/");
        assert_eq!(normalize_path("/A//b/").unwrap(), "/a/b");
    }

    #[test]
    fn dot_segments_are_resolved() {
        assert_eq!(normalize_path("/a/..").unwrap(), "/");
        assert_eq!(normalize_path("/a/./b/../c").unwrap(), "/a/c");
        assert_eq!(normalize_path("/.."), Err(Error::MalformedPathSegment));
    }

    #[test]
    fn segments_with_outer_dots_are_rejected() {
        for path in ["/.a", "/a.", "/x/...", "/a/b."] {
            assert_eq!(
                normalize_path(path),
                Err(Error::MalformedPathSegment),
                "{path} was accepted",
            );
        }
        assert_eq!(normalize_path("/a.b").unwrap(), "/a.b");
    }

    #[test]
    fn malformed_path_segments_are_rejected() {
        assert_eq!(normalize_path("/a b"), Err(Error::MalformedPathSegment));
        assert_eq!(normalize_path("/a\tb"), Err(Error::MalformedPathSegment));
        assert_eq!(
            normalize_path(&format!("/{}", "x".repeat(64))),
            Err(Error::PathSegmentTooLong),
        );
    }

    #[test]
    fn user_info_rules_are_enforced() {
        assert_eq!(normalize_user_info("John.Smith").unwrap(), "john.smith");
        for user_info in ["", ".john", "john.", "jo..hn", "jo\\hn"] {
            assert_eq!(
                normalize_user_info(user_info),
                Err(Error::MalformedUserInfo),
                "{user_info} was accepted",
            );
        }
        assert_eq!(
            normalize_user_info(&"x".repeat(65)),
            Err(Error::UserInfoTooLong),
        );
    }
}
