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

//! The DNS-over-HTTPS JSON response format and the decoding of the TXT
//! data it carries.

use serde::Deserialize;

use super::Error;

/// A DNS-over-HTTPS JSON response, as served by e.g. Google and
/// Cloudflare. Members the client does not use are ignored.
#[derive(Debug, Deserialize)]
pub struct JsonResponse {
    #[serde(rename = "Status")]
    pub status: u16,

    #[serde(rename = "AD", default)]
    pub authenticated: bool,

    #[serde(rename = "Answer", default)]
    pub answers: Vec<JsonAnswer>,
}

/// One member of the `Answer` array of a [`JsonResponse`].
#[derive(Debug, Deserialize)]
pub struct JsonAnswer {
    pub name: String,

    #[serde(rename = "type")]
    pub rr_type: u16,

    pub data: String,

    #[serde(rename = "TTL", default)]
    pub ttl: u32,
}

impl JsonResponse {
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(body).map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}

////////////////////////////////////////////////////////////////////////
// TXT DATA                                                           //
////////////////////////////////////////////////////////////////////////

/// Decodes the `data` of a TXT answer into its text.
///
/// Resolvers present TXT RDATA in zone-file form: a sequence of quoted
/// `<character-string>`s, which may contain `\"`, `\\`, and `\DDD`
/// escapes. The strings are concatenated, since a single logical TXT
/// string longer than 255 octets must be split into several. Data that
/// does not begin with a quote is taken verbatim.
pub fn decode_txt_data(data: &str) -> Result<String, Error> {
    let data = data.trim();
    if !data.starts_with('"') {
        return Ok(data.to_owned());
    }

    let mut octets = Vec::with_capacity(data.len());
    let mut iter = data.bytes();
    loop {
        // Skip the whitespace between strings.
        match iter.find(|b| !b.is_ascii_whitespace()) {
            Some(b'"') => (),
            Some(_) => return Err(invalid("text outside of a quoted string")),
            None => break,
        }

        loop {
            match iter.next() {
                Some(b'"') => break,
                Some(b'\\') => octets.push(decode_escape(&mut iter)?),
                Some(octet) => octets.push(octet),
                None => return Err(invalid("unterminated quoted string")),
            }
        }
    }

    String::from_utf8(octets).map_err(|_| invalid("TXT data is not UTF-8"))
}

/// Decodes an escape sequence after the leading `\` (see [RFC 1035 §
/// 5.1]): either three decimal digits giving an octet value, or a
/// single octet taken literally.
///
/// [RFC 1035 § 5.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-5.1
fn decode_escape(iter: &mut impl Iterator<Item = u8>) -> Result<u8, Error> {
    let first = iter.next().ok_or_else(|| invalid("unterminated escape"))?;
    if !first.is_ascii_digit() {
        return Ok(first);
    }

    let mut value = (first - b'0') as usize;
    for _ in 0..2 {
        match iter.next() {
            Some(digit) if digit.is_ascii_digit() => value = 10 * value + (digit - b'0') as usize,
            _ => return Err(invalid("decimal escapes need three digits")),
        }
    }
    value
        .try_into()
        .map_err(|_| invalid("decimal escape out of range"))
}

fn invalid(reason: &str) -> Error {
    Error::InvalidDnsResponse(reason.to_owned())
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responses_parse() {
        let body = br#"{
            "Status": 0, "TC": false, "RD": true, "RA": true, "AD": true, "CD": false,
            "Question": [{"name": "1._num.numexample.com.", "type": 16}],
            "Answer": [
                {"name": "1._num.numexample.com.", "type": 16, "TTL": 300, "data": "\"@n=1;a=b\""}
            ]
        }"#;
        let response = JsonResponse::parse(body).unwrap();
        assert_eq!(response.status, 0);
        assert!(response.authenticated);
        assert_eq!(response.answers.len(), 1);
        assert_eq!(response.answers[0].rr_type, 16);
        assert_eq!(response.answers[0].ttl, 300);
        assert_eq!(response.answers[0].data, "\"@n=1;a=b\"");
    }

    #[test]
    fn responses_without_answers_parse() {
        let response = JsonResponse::parse(br#"{"Status": 3}"#).unwrap();
        assert_eq!(response.status, 3);
        assert!(!response.authenticated);
        assert!(response.answers.is_empty());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            JsonResponse::parse(b"<html>"),
            Err(Error::MalformedResponse(_)),
        ));
    }

    #[test]
    fn quoted_strings_are_concatenated() {
        assert_eq!(decode_txt_data(r#""abc" "def""#).unwrap(), "abcdef");
        assert_eq!(decode_txt_data(r#""abc""def""#).unwrap(), "abcdef");
    }

    #[test]
    fn escapes_are_decoded() {
        assert_eq!(decode_txt_data(r#""a\"b\\c\059""#).unwrap(), "a\"b\\c;");
    }

    #[test]
    fn unquoted_data_is_verbatim() {
        assert_eq!(decode_txt_data("@n=1;a=b").unwrap(), "@n=1;a=b");
    }

    #[test]
    fn malformed_data_is_rejected() {
        for data in [r#""abc"#, r#""abc" def"#, r#""\25""#, r#""\256""#] {
            assert!(
                matches!(decode_txt_data(data), Err(Error::InvalidDnsResponse(_))),
                "{data} was accepted",
            );
        }
    }
}
