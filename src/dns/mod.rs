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

//! The DNS-over-HTTPS transport.
//!
//! A [`DnsClient`] issues queries as HTTP GET requests to the resolvers
//! of a [`ResolverPool`], in order. A resolver that times out, fails at
//! the HTTP level, sends a malformed body, or answers `SERVFAIL` (or
//! another failure RCODE) is put into cooldown and the next one is
//! tried. `NXDOMAIN` ends the query at once and does not count as a
//! failure. Fail-over as a whole is bounded by a deadline.
//!
//! The HTTP requests themselves are made through the [`HttpClient`]
//! trait, so that any HTTP stack can be plugged in. An implementation
//! on [`reqwest`](https://docs.rs/reqwest) is provided with the
//! `reqwest` feature.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use url::{Host, Url};

mod json;
mod rcode;
mod records;
mod resolver;
#[cfg(feature = "reqwest")]
mod reqwest;
mod rr_type;
pub use json::decode_txt_data;
pub use rcode::Rcode;
pub use records::rebuild_txt_record_content;
pub use resolver::{Resolver, ResolverPool, DEFAULT_COOLDOWN, DEFAULT_RESOLVERS};
#[cfg(feature = "reqwest")]
pub use self::reqwest::ReqwestHttpClient;
pub use rr_type::Type;

use crate::util::is_valid_query_name;
use json::JsonResponse;

/// The default timeout of a single DNS-over-HTTPS request.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// The default bound on one query, across all the resolvers it is
/// tried at.
pub const DEFAULT_QUERY_DEADLINE: Duration = Duration::from_secs(10);

/// The media type of DNS-over-HTTPS JSON responses.
pub const DNS_JSON_MEDIA_TYPE: &str = "application/dns-json";

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// Errors that arise while querying the DNS.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// The HTTP request failed.
    Transport(String),

    /// The HTTP request did not complete within the timeout, or the
    /// query did not complete within its deadline.
    Timeout,

    /// The query name is not a valid DNS name. Nothing was sent.
    InvalidQueryName(String),

    /// The resolver answered with a non-2xx HTTP status.
    HttpStatus(u16),

    /// The response body was not valid DNS JSON.
    MalformedResponse(String),

    /// The resolver answered with an RCODE other than `NOERROR`.
    Rcode(Rcode),

    /// The answer contained something a NUM record cannot: a CNAME,
    /// SPF data, or undecodable TXT data.
    InvalidDnsResponse(String),

    /// The TXT strings of a multi-part record did not form a complete
    /// set.
    IncompleteRecordSet {
        expected: Option<usize>,
        unrecognized: usize,
    },

    /// Every resolver is in cooldown (or the pool is empty).
    NoResolverAvailable,
}

impl Error {
    /// Returns whether this error indicates a failing resolver, which
    /// is circuit-broken and failed over from.
    pub fn is_resolver_failure(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::HttpStatus(_) | Self::MalformedResponse(_) => {
                true
            }
            Self::Rcode(rcode) => rcode.is_resolver_failure(),
            Self::InvalidQueryName(_)
            | Self::InvalidDnsResponse(_)
            | Self::IncompleteRecordSet { .. }
            | Self::NoResolverAvailable => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Transport(reason) => write!(f, "HTTP request failed: {reason}"),
            Self::Timeout => f.write_str("DNS query timed out"),
            Self::InvalidQueryName(name) => write!(f, "{name} is not a valid query name"),
            Self::HttpStatus(status) => write!(f, "resolver answered with HTTP status {status}"),
            Self::MalformedResponse(reason) => write!(f, "malformed DNS JSON response: {reason}"),
            Self::Rcode(rcode) => write!(f, "resolver answered {rcode}"),
            Self::InvalidDnsResponse(reason) => write!(f, "invalid DNS response: {reason}"),
            Self::IncompleteRecordSet {
                expected: Some(expected),
                unrecognized,
            } => write!(
                f,
                "incomplete record set: expected {expected} parts, {unrecognized} unrecognized",
            ),
            Self::IncompleteRecordSet {
                expected: None,
                unrecognized,
            } => write!(
                f,
                "incomplete record set: no part declares the total, {unrecognized} unrecognized",
            ),
            Self::NoResolverAvailable => f.write_str("no resolver is available"),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
// THE HTTP COLLABORATOR                                              //
////////////////////////////////////////////////////////////////////////

/// The capability to issue HTTP GET requests.
pub trait HttpClient: Send + Sync {
    /// Issues a GET request for `url`, giving up after `timeout`.
    /// Implementations should send `Accept: application/dns-json`.
    fn get(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> impl Future<Output = Result<HttpResponse, HttpError>> + Send;
}

impl<T: HttpClient> HttpClient for Arc<T> {
    fn get(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> impl Future<Output = Result<HttpResponse, HttpError>> + Send {
        (**self).get(url, timeout)
    }
}

/// The parts of an HTTP response the DNS client uses.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// An error reported by an [`HttpClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpError(pub String);

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HttpError {}

////////////////////////////////////////////////////////////////////////
// QUESTIONS AND RESPONSES                                            //
////////////////////////////////////////////////////////////////////////

/// A DNS question.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Question {
    pub name: String,
    pub rr_type: Type,
    pub dnssec: bool,
}

impl Question {
    /// Creates a TXT question for `name`.
    pub fn txt(name: impl Into<String>, dnssec: bool) -> Self {
        Self {
            name: name.into(),
            rr_type: Type::TXT,
            dnssec,
        }
    }
}

/// A record of a DNS answer. TXT data is already decoded into text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Answer {
    pub name: String,
    pub rr_type: Type,
    pub data: String,
    pub ttl: u32,
}

/// A successful DNS response.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Response {
    pub answers: Vec<Answer>,

    /// Whether the resolver claims to have validated the answer with
    /// DNSSEC (the `AD` flag). This is not verified locally.
    pub authenticated: bool,
}

impl Response {
    /// Returns the TXT strings of the answer, in answer order.
    pub fn txt_strings(&self) -> Vec<String> {
        self.answers
            .iter()
            .filter(|a| a.rr_type == Type::TXT)
            .map(|a| a.data.clone())
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////
// THE DNS CLIENT                                                     //
////////////////////////////////////////////////////////////////////////

/// Issues DNS queries over HTTPS with resolver fail-over.
///
/// The [`ResolverPool`] is shared (through an [`Arc`]) by all clients
/// made from it, so that a resolver circuit-broken by one lookup is
/// skipped by concurrent ones too.
#[derive(Debug)]
pub struct DnsClient<H> {
    http: H,
    pool: Arc<ResolverPool>,
    timeout: Duration,
    deadline: Duration,
}

impl<H: HttpClient> DnsClient<H> {
    /// Creates a client. Each request to a resolver is bounded by
    /// `timeout`; exceeding it counts as a resolver failure. Each query
    /// as a whole is bounded by [`DEFAULT_QUERY_DEADLINE`].
    pub fn new(http: H, pool: Arc<ResolverPool>, timeout: Duration) -> Self {
        Self {
            http,
            pool,
            timeout,
            deadline: DEFAULT_QUERY_DEADLINE,
        }
    }

    /// Sets the bound on each query, fail-over included.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn pool(&self) -> &Arc<ResolverPool> {
        &self.pool
    }

    /// Answers `question` using the first resolver that responds
    /// properly. Each active resolver is tried at most once, and the
    /// whole query must finish within the client's deadline.
    pub async fn query(&self, question: &Question) -> Result<Response, Error> {
        let name = to_ascii_name(&question.name)?;
        match tokio::time::timeout(self.deadline, self.query_resolvers(&name, question)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Query for {} did not complete within {:?}.",
                    name, self.deadline,
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn query_resolvers(&self, name: &str, question: &Question) -> Result<Response, Error> {
        let mut last_error = None;

        for resolver in self.pool.active() {
            debug!(
                "Querying {} for {} {}.",
                resolver.name(),
                name,
                question.rr_type,
            );
            let url = request_url(resolver.url(), name, question);
            let result = match tokio::time::timeout(self.timeout, self.http.get(&url, self.timeout))
                .await
            {
                Ok(Ok(response)) => parse_response(response),
                Ok(Err(e)) => Err(Error::Transport(e.0)),
                Err(_) => Err(Error::Timeout),
            };

            match result {
                Ok(json) => {
                    if question.dnssec && !json.authenticated {
                        // DNSSEC validation is left to the resolver.
                        warn!(
                            "DNSSEC was requested, but {} did not authenticate {}.",
                            resolver.name(),
                            name,
                        );
                    }
                    return build_response(json, question.rr_type);
                }
                Err(Error::Rcode(Rcode::NxDomain)) => {
                    debug!("{} answered NXDOMAIN for {}.", resolver.name(), name);
                    return Err(Error::Rcode(Rcode::NxDomain));
                }
                Err(e) if e.is_resolver_failure() => {
                    debug!("Query to {} failed: {}.", resolver.name(), e);
                    self.pool.deactivate(resolver);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(Error::NoResolverAvailable))
    }
}

/// Builds the DNS-over-HTTPS request URL for `question` at `resolver`.
fn request_url(resolver: &Url, name: &str, question: &Question) -> Url {
    let mut url = resolver.clone();
    url.query_pairs_mut()
        .append_pair("name", name)
        .append_pair("type", &question.rr_type.to_string())
        .append_pair("dnssec", if question.dnssec { "1" } else { "0" })
        .append_pair("ct", DNS_JSON_MEDIA_TYPE);
    url
}

/// Checks the HTTP status and parses the body of a response.
fn parse_response(response: HttpResponse) -> Result<JsonResponse, Error> {
    if !(200..300).contains(&response.status) {
        return Err(Error::HttpStatus(response.status));
    }
    let json = JsonResponse::parse(&response.body)?;
    match Rcode::from(json.status) {
        Rcode::NoError => Ok(json),
        rcode => Err(Error::Rcode(rcode)),
    }
}

/// Converts a parsed response into a [`Response`], rejecting answers
/// that cannot belong to a NUM record.
fn build_response(json: JsonResponse, rr_type: Type) -> Result<Response, Error> {
    let mut answers = Vec::with_capacity(json.answers.len());
    for answer in json.answers {
        let answer_type = Type::from(answer.rr_type);
        if answer_type == Type::CNAME {
            warn!("Rejecting a CNAME answer for {}.", answer.name);
            return Err(Error::InvalidDnsResponse(format!(
                "unexpected CNAME for {}",
                answer.name,
            )));
        } else if answer_type != rr_type {
            continue;
        }

        let data = if answer_type == Type::TXT {
            let text = decode_txt_data(&answer.data)?;
            if text.starts_with("v=spf1") {
                warn!("Rejecting an SPF record at {}.", answer.name);
                return Err(Error::InvalidDnsResponse(format!(
                    "unexpected SPF record at {}",
                    answer.name,
                )));
            }
            text
        } else {
            answer.data
        };

        answers.push(Answer {
            name: answer.name,
            rr_type: answer_type,
            data,
            ttl: answer.ttl,
        });
    }
    Ok(Response {
        answers,
        authenticated: json.authenticated,
    })
}

/// Lower-cases `name` and converts any non-ASCII labels to their
/// ASCII-compatible encoding. The result must be a valid DNS name.
fn to_ascii_name(name: &str) -> Result<String, Error> {
    let mut labels = Vec::new();
    for label in name.split('.') {
        if label.is_ascii() {
            labels.push(label.to_ascii_lowercase());
        } else {
            match Host::parse(label) {
                Ok(Host::Domain(ascii)) => labels.push(ascii),
                _ => return Err(Error::InvalidQueryName(name.to_owned())),
            }
        }
    }
    let ascii = labels.join(".");
    if is_valid_query_name(&ascii) {
        Ok(ascii)
    } else {
        Err(Error::InvalidQueryName(ascii))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::*;
    use super::*;

    fn client(mock: MockHttpClient, n_resolvers: usize) -> DnsClient<MockHttpClient> {
        DnsClient::new(mock, pool(n_resolvers), DEFAULT_QUERY_TIMEOUT)
    }

    #[tokio::test]
    async fn txt_answers_are_decoded() {
        let dns = client(
            MockHttpClient::new(|_| Ok(txt_response("x.test.", &["a\"b", "c"]))),
            1,
        );
        let response = dns.query(&Question::txt("x.test.", false)).await.unwrap();
        assert_eq!(response.txt_strings(), ["a\"b", "c"]);
    }

    #[tokio::test]
    async fn requests_carry_the_doh_parameters() {
        let mock = Arc::new(MockHttpClient::new(|_| Ok(txt_response("x.test.", &["a"]))));
        let dns = DnsClient::new(mock.clone(), pool(1), DEFAULT_QUERY_TIMEOUT);
        dns.query(&Question::txt("X.Test.", true)).await.unwrap();
        let requests = mock.requests();
        let pairs: Vec<(String, String)> = requests[0].query_pairs().into_owned().collect();
        assert_eq!(requests[0].host_str(), Some("r0.test"));
        assert_eq!(
            pairs,
            [
                ("name".to_owned(), "x.test.".to_owned()),
                ("type".to_owned(), "TXT".to_owned()),
                ("dnssec".to_owned(), "1".to_owned()),
                ("ct".to_owned(), "application/dns-json".to_owned()),
            ],
        );
    }

    #[tokio::test]
    async fn failing_resolvers_are_failed_over_and_circuit_broken() {
        let mock = Arc::new(MockHttpClient::new(|url| match url.host_str() {
            Some("r0.test") => Ok(rcode_response(2)),
            Some("r1.test") => Err(HttpError("connection refused".to_owned())),
            _ => Ok(txt_response("x.test.", &["found"])),
        }));
        let dns = DnsClient::new(mock.clone(), pool(3), DEFAULT_QUERY_TIMEOUT);
        let response = dns.query(&Question::txt("x.test.", false)).await.unwrap();
        assert_eq!(response.txt_strings(), ["found"]);
        assert_eq!(mock.requests().len(), 3);

        // The first two resolvers are now in cooldown.
        dns.query(&Question::txt("x.test.", false)).await.unwrap();
        assert_eq!(mock.requests().len(), 4);
        assert_eq!(mock.requests()[3].host_str(), Some("r2.test"));
    }

    #[tokio::test]
    async fn http_errors_and_malformed_bodies_fail_over() {
        let dns = client(
            MockHttpClient::new(|url| match url.host_str() {
                Some("r0.test") => Ok(HttpResponse {
                    status: 503,
                    body: Vec::new(),
                }),
                _ => Ok(HttpResponse {
                    status: 200,
                    body: b"not json".to_vec(),
                }),
            }),
            2,
        );
        assert!(matches!(
            dns.query(&Question::txt("x.test.", false)).await,
            Err(Error::MalformedResponse(_)),
        ));
        assert_eq!(
            dns.query(&Question::txt("x.test.", false)).await,
            Err(Error::NoResolverAvailable),
        );
    }

    #[tokio::test]
    async fn nxdomain_ends_the_query_without_cooldown() {
        let mock = Arc::new(MockHttpClient::new(|_| Ok(rcode_response(3))));
        let dns = DnsClient::new(mock.clone(), pool(2), DEFAULT_QUERY_TIMEOUT);
        for _ in 0..2 {
            assert_eq!(
                dns.query(&Question::txt("x.test.", false)).await,
                Err(Error::Rcode(Rcode::NxDomain)),
            );
        }
        let hosts: Vec<_> = mock
            .requests()
            .iter()
            .map(|url| url.host_str().unwrap_or_default().to_owned())
            .collect();
        assert_eq!(hosts, ["r0.test", "r0.test"]);
    }

    #[tokio::test]
    async fn invalid_query_names_are_never_sent() {
        let mock = Arc::new(MockHttpClient::new(|_| Ok(rcode_response(2))));
        let dns = DnsClient::new(mock.clone(), pool(2), DEFAULT_QUERY_TIMEOUT);
        let name = format!("1._{}.e._num.numexample.com.", "x".repeat(64));
        let result = dns.query(&Question::txt(name, false)).await;
        assert!(matches!(result, Err(Error::InvalidQueryName(_))));
        assert!(!result.unwrap_err().is_resolver_failure());
        assert!(mock.requests().is_empty());
        assert_eq!(dns.pool().active().count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_over_is_bounded_by_the_deadline() {
        struct SlowHttpClient(std::sync::atomic::AtomicUsize);

        impl HttpClient for SlowHttpClient {
            async fn get(&self, _url: &Url, _timeout: Duration) -> Result<HttpResponse, HttpError> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(HttpError("unreachable".to_owned()))
            }
        }

        let http = Arc::new(SlowHttpClient(Default::default()));
        let dns = DnsClient::new(http.clone(), pool(3), Duration::from_secs(5))
            .with_deadline(Duration::from_secs(8));
        let start = tokio::time::Instant::now();
        assert_eq!(
            dns.query(&Question::txt("x.test.", false)).await,
            Err(Error::Timeout),
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(8) && elapsed < Duration::from_secs(9));
        assert_eq!(http.0.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cname_answers_are_rejected() {
        let dns = client(
            MockHttpClient::new(|_| {
                let body = json!({
                    "Status": 0,
                    "Answer": [{"name": "x.test.", "type": 5, "TTL": 60, "data": "y.test."}],
                });
                Ok(HttpResponse {
                    status: 200,
                    body: body.to_string().into_bytes(),
                })
            }),
            2,
        );
        assert!(matches!(
            dns.query(&Question::txt("x.test.", false)).await,
            Err(Error::InvalidDnsResponse(_)),
        ));
    }

    #[tokio::test]
    async fn spf_records_are_rejected() {
        let dns = client(
            MockHttpClient::new(|_| Ok(txt_response("x.test.", &["v=spf1 -all"]))),
            1,
        );
        assert!(matches!(
            dns.query(&Question::txt("x.test.", false)).await,
            Err(Error::InvalidDnsResponse(_)),
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_resolvers_time_out() {
        struct SlowHttpClient;

        impl HttpClient for SlowHttpClient {
            async fn get(&self, _url: &Url, _timeout: Duration) -> Result<HttpResponse, HttpError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(HttpError("unreachable".to_owned()))
            }
        }

        let dns = DnsClient::new(SlowHttpClient, pool(1), Duration::from_secs(1));
        assert_eq!(
            dns.query(&Question::txt("x.test.", false)).await,
            Err(Error::Timeout),
        );
    }

    #[test]
    fn unicode_names_are_encoded() {
        assert_eq!(
            to_ascii_name("1._num.Bücher.de.").unwrap(),
            "1._num.xn--bcher-kva.de.",
        );
    }
}
