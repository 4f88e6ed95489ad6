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

//! Implementation of the crate-level [`Error`] type.

use std::fmt;

use crate::address;
use crate::client::InterpretError;

/// Errors that terminate a NUM lookup.
///
/// Transport and protocol problems with individual DNS queries are not
/// represented here: those are recovered from (by resolver fail-over)
/// or treated as the absence of a record, so that the lookup can
/// progress to the next location. See [`dns::Error`](crate::dns::Error).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// The address (or an absolute redirect target) was malformed.
    Address(address::Error),

    /// A telephone number's international dialing code has no known
    /// mapping into the DNS.
    NoCountryCodeMapping(String),

    /// A redirect would have left the query location unchanged.
    RedundantRedirect,

    /// A computed query name is not a valid DNS name, for instance
    /// because a label is longer than 63 octets.
    InvalidQueryName(String),

    /// A relative redirect path climbed above the root with `..`.
    PathEscapesRoot,

    /// More redirects were followed than the configured limit allows.
    TooManyRedirects,

    /// A relative redirect was received when no record location was
    /// being queried.
    InvalidRedirect(String),

    /// The external interpreter failed.
    Interpreter(InterpretError),

    /// The lookup state machine was stepped after finishing.
    InvalidStateTransition,

    /// More populator delays were configured than populator states
    /// exist.
    TooManyPopulatorDelays(usize),

    /// No record was found at any location.
    NoRecordFound,

    /// The whole lookup exceeded its configured ceiling.
    LookupTimedOut,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Address(e) => e.fmt(f),
            Self::NoCountryCodeMapping(code) => {
                write!(f, "no DNS mapping for the telephone number {code}")
            }
            Self::RedundantRedirect => {
                f.write_str("the redirect would leave the query location unchanged")
            }
            Self::InvalidQueryName(name) => {
                write!(f, "the query name {name} is not a valid DNS name")
            }
            Self::PathEscapesRoot => f.write_str("the redirect path climbs above the root"),
            Self::TooManyRedirects => f.write_str("too many redirects"),
            Self::InvalidRedirect(target) => {
                write!(f, "cannot apply the relative redirect {target:?} here")
            }
            Self::Interpreter(e) => write!(f, "failed to interpret the record: {e}"),
            Self::InvalidStateTransition => {
                f.write_str("the lookup state machine was stepped after completion")
            }
            Self::TooManyPopulatorDelays(n) => write!(
                f,
                "{n} populator delays were given, but at most {} are supported",
                crate::state::MAX_POPULATOR_DELAYS,
            ),
            Self::NoRecordFound => f.write_str("no record was found"),
            Self::LookupTimedOut => f.write_str("the lookup timed out"),
        }
    }
}

impl From<address::Error> for Error {
    fn from(error: address::Error) -> Self {
        Self::Address(error)
    }
}

impl From<InterpretError> for Error {
    fn from(error: InterpretError) -> Self {
        Self::Interpreter(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Address(e) => Some(e),
            Self::Interpreter(e) => Some(e),
            _ => None,
        }
    }
}
