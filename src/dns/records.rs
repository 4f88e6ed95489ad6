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

//! Reassembly of NUM records split over several TXT strings.
//!
//! A record too large for one TXT string is published as a set of
//! fragments, each prefixed with a header. The first fragment (or any
//! one of them) declares the total with `<index>/<total>|`; the others
//! carry just `<index>|`. Indices start at 1. The declaring fragment may
//! be followed by a `@n=<version>;` marker, which is not part of the
//! record.

use std::collections::BTreeMap;

use log::debug;

use super::{DnsClient, Error, HttpClient, Question, Rcode};

/// A parsed fragment header.
struct Fragment<'a> {
    index: usize,
    total: Option<usize>,
    content: &'a str,
}

impl<'a> Fragment<'a> {
    fn parse(text: &'a str) -> Option<Self> {
        let (header, content) = text.split_once('|')?;
        let (index, total) = match header.split_once('/') {
            Some((index, total)) => (index, Some(parse_number(total)?)),
            None => (header, None),
        };
        let index = parse_number(index)?;
        if index == 0 || total == Some(0) {
            return None;
        }
        let content = if total.is_some() {
            strip_version_marker(content)
        } else {
            content
        };
        Some(Self {
            index,
            total,
            content,
        })
    }
}

fn parse_number(text: &str) -> Option<usize> {
    if crate::util::is_ascii_digits(text) {
        text.parse().ok()
    } else {
        None
    }
}

fn strip_version_marker(content: &str) -> &str {
    content
        .strip_prefix("@n=")
        .and_then(|rest| rest.split_once(';'))
        .filter(|(version, _)| crate::util::is_ascii_digits(version))
        .map_or(content, |(_, rest)| rest)
}

/// Rebuilds one logical record from the TXT strings of an answer, which
/// may arrive in any order.
///
/// A single string without a fragment header is the record itself.
/// Otherwise every string must be a fragment, one fragment must declare
/// the total, all declared totals must agree, and the fragments must
/// cover every index from 1 to the total. When fragments share an
/// index, the last one wins.
///
/// ```
/// # use numlookup::dns::rebuild_txt_record_content;
/// let strings = ["2|bar".to_owned(), "1/2|@n=1;foo".to_owned()];
/// assert_eq!(rebuild_txt_record_content(&strings).unwrap(), "foobar");
/// ```
pub fn rebuild_txt_record_content(strings: &[String]) -> Result<String, Error> {
    if let [single] = strings {
        if Fragment::parse(single).is_none() {
            return Ok(single.clone());
        }
    }

    let mut fragments = BTreeMap::new();
    let mut total = None;
    let mut unrecognized = 0;
    for text in strings {
        let Some(fragment) = Fragment::parse(text) else {
            unrecognized += 1;
            continue;
        };
        match (total, fragment.total) {
            (Some(a), Some(b)) if a != b => {
                debug!("Fragments declare conflicting totals {a} and {b}.");
                unrecognized += 1;
                continue;
            }
            (None, Some(b)) => total = Some(b),
            _ => (),
        }
        fragments.insert(fragment.index, fragment.content);
    }

    let Some(expected) = total else {
        return Err(Error::IncompleteRecordSet {
            expected: None,
            unrecognized,
        });
    };
    let out_of_range = fragments.range(expected + 1..).count();
    if unrecognized > 0 || out_of_range > 0 || fragments.len() != expected {
        return Err(Error::IncompleteRecordSet {
            expected: Some(expected),
            unrecognized: unrecognized + out_of_range,
        });
    }

    Ok(fragments.into_values().collect())
}

impl<H: HttpClient> DnsClient<H> {
    /// Fetches the TXT record at `name` and reassembles it.
    ///
    /// Returns `Ok(None)` when the name does not exist or has no TXT
    /// data.
    pub async fn get_record_from_dns(
        &self,
        name: &str,
        dnssec: bool,
    ) -> Result<Option<String>, Error> {
        let response = match self.query(&Question::txt(name, dnssec)).await {
            Ok(response) => response,
            Err(Error::Rcode(Rcode::NxDomain)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let strings = response.txt_strings();
        if strings.is_empty() {
            Ok(None)
        } else {
            rebuild_txt_record_content(&strings).map(Some)
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::DEFAULT_QUERY_TIMEOUT;
    use super::*;

    fn strings(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|&t| t.to_owned()).collect()
    }

    #[test]
    fn single_unlabeled_strings_are_used_as_is() {
        assert_eq!(
            rebuild_txt_record_content(&strings(&["a=1;b=2"])).unwrap(),
            "a=1;b=2",
        );
    }

    #[test]
    fn fragments_are_reassembled_in_any_order() {
        for texts in [["1/2|@n=1;foo", "2|bar"], ["2|bar", "1/2|@n=1;foo"]] {
            assert_eq!(
                rebuild_txt_record_content(&strings(&texts)).unwrap(),
                "foobar",
            );
        }
        assert_eq!(
            rebuild_txt_record_content(&strings(&["3|c", "1|a", "2/3|b"])).unwrap(),
            "abc",
        );
    }

    #[test]
    fn missing_fragments_are_detected() {
        assert_eq!(
            rebuild_txt_record_content(&strings(&["1/2|foo"])),
            Err(Error::IncompleteRecordSet {
                expected: Some(2),
                unrecognized: 0,
            }),
        );
        assert_eq!(
            rebuild_txt_record_content(&strings(&["1/2|foo", "bar"])),
            Err(Error::IncompleteRecordSet {
                expected: Some(2),
                unrecognized: 1,
            }),
        );
    }

    #[test]
    fn a_declared_total_is_required() {
        assert_eq!(
            rebuild_txt_record_content(&strings(&["1|foo", "2|bar"])),
            Err(Error::IncompleteRecordSet {
                expected: None,
                unrecognized: 0,
            }),
        );
    }

    #[test]
    fn conflicting_totals_are_rejected() {
        assert!(rebuild_txt_record_content(&strings(&["1/2|a", "2/3|b"])).is_err());
        assert!(rebuild_txt_record_content(&strings(&["1/2|a", "3|b"])).is_err());
    }

    #[test]
    fn index_collisions_keep_the_last_fragment() {
        assert_eq!(
            rebuild_txt_record_content(&strings(&["1/2|a", "2|b", "2|c"])).unwrap(),
            "ac",
        );
    }

    #[tokio::test]
    async fn get_record_from_dns_reassembles_answers() {
        let dns = DnsClient::new(
            MockHttpClient::new(|_| Ok(txt_response("x.test.", &["2|bar", "1/2|foo"]))),
            pool(1),
            DEFAULT_QUERY_TIMEOUT,
        );
        assert_eq!(
            dns.get_record_from_dns("x.test.", false).await,
            Ok(Some("foobar".to_owned())),
        );
    }

    #[tokio::test]
    async fn get_record_from_dns_maps_nxdomain_to_none() {
        let dns = DnsClient::new(
            MockHttpClient::new(|_| Ok(rcode_response(3))),
            pool(2),
            DEFAULT_QUERY_TIMEOUT,
        );
        assert_eq!(dns.get_record_from_dns("x.test.", false).await, Ok(None));
    }
}
