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

//! Implementation of the [`Address`] type, the identifier that a NUM
//! lookup starts from.

use std::fmt;
use std::str::FromStr;

use crate::util::Caseless;

mod error;
mod validation;
pub use error::Error;
pub(crate) use validation::{is_valid_host, normalize_path_segment};

/// The default module number, used when an address gives none.
pub const DEFAULT_MODULE: u32 = 0;

/// The largest module number with an assigned meaning. Larger numbers
/// are still accepted.
pub const MAX_ASSIGNED_MODULE: u32 = 10;

////////////////////////////////////////////////////////////////////////
// ADDRESSES                                                          //
////////////////////////////////////////////////////////////////////////

/// A validated NUM identifier.
///
/// An `Address` has the shape of a URI:
///
/// ```text
/// [scheme://][user-info@]host[:module][/path]
/// ```
///
/// * The host is either a domain name or a telephone number of the form
///   `+` followed by 2 to 15 digits.
/// * The user info, if present, is the local part of an email address.
/// * The "port" is the NUM module number.
/// * The path is a `/`-rooted sequence of non-empty segments.
///
/// All fields are lower-cased, and non-ASCII host labels and path
/// segments are converted to their ASCII-compatible encoding.
///
/// Addresses are immutable. The `with_*` methods derive a new, again
/// validated, address.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Address {
    scheme: Option<Scheme>,
    user_info: Option<String>,
    host: String,
    port: u32,
    path: String,
}

/// The URL schemes an [`Address`] may carry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Scheme {
    Http,
    Https,
}

/// The four kinds of identifier, which determine how DNS names are
/// generated for an [`Address`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AddressKind {
    Domain,
    Email,
    Url,
    Tnum,
}

impl Address {
    /// Parses and validates a raw identifier.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Empty);
        }

        // Split off the scheme.
        let (scheme, rest) = match raw.split_once("://") {
            Some((scheme, rest)) => (Some(scheme.parse::<Scheme>()?), rest),
            None => (None, raw),
        };

        // The query and fragment of a URL play no part in the lookup.
        let rest = match scheme {
            Some(_) => rest.split(['?', '#']).next().unwrap_or_default(),
            None => rest,
        };

        // Split the authority from the path.
        let (authority, path) = match rest.find('/') {
            Some(index) => rest.split_at(index),
            None => (rest, "/"),
        };

        // The user info ends at the last @, so that the host is never
        // taken from inside the user info.
        let (user_info, host_and_port) = match authority.rsplit_once('@') {
            Some((user_info, host_and_port)) => (Some(user_info), host_and_port),
            None => (None, authority),
        };

        let (host, port) = match host_and_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(parse_port(port)?)),
            None => (host_and_port, None),
        };

        let mut address = Self::build(host, port, user_info, Some(path))?;
        address.scheme = scheme;
        Ok(address)
    }

    /// Builds an address from its fields, validating each one with the
    /// same rules as [`Address::parse`].
    pub fn build(
        host: &str,
        port: Option<u32>,
        user_info: Option<&str>,
        path: Option<&str>,
    ) -> Result<Self, Error> {
        Ok(Self {
            scheme: None,
            user_info: user_info.map(validation::normalize_user_info).transpose()?,
            host: validation::normalize_host(host)?,
            port: port.unwrap_or(DEFAULT_MODULE),
            path: validation::normalize_path(path.unwrap_or("/"))?,
        })
    }

    /// Returns a copy of this address with a different host.
    pub fn with_host(&self, host: &str) -> Result<Self, Error> {
        Ok(Self {
            host: validation::normalize_host(host)?,
            ..self.clone()
        })
    }

    /// Returns a copy of this address with a different module number.
    pub fn with_port(&self, port: u32) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }

    /// Returns a copy of this address with different (or no) user info.
    pub fn with_user_info(&self, user_info: Option<&str>) -> Result<Self, Error> {
        Ok(Self {
            user_info: user_info.map(validation::normalize_user_info).transpose()?,
            ..self.clone()
        })
    }

    /// Returns a copy of this address with a different path.
    pub fn with_path(&self, path: &str) -> Result<Self, Error> {
        Ok(Self {
            path: validation::normalize_path(path)?,
            ..self.clone()
        })
    }

    /// Returns the scheme, if the address is a URL.
    pub fn scheme(&self) -> Option<Scheme> {
        self.scheme
    }

    /// Returns the user info (email local part), if any.
    pub fn user_info(&self) -> Option<&str> {
        self.user_info.as_deref()
    }

    /// Returns the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the module number.
    pub fn port(&self) -> u32 {
        self.port
    }

    /// Returns the normalized, `/`-rooted path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the segments of the path, in order.
    pub fn path_segments(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Returns the branch of this address: the path segments in reverse
    /// order, joined by dots. For example, the path `/a/b/c` gives the
    /// branch `c.b.a`. Returns [`None`] for the root path.
    pub fn branch(&self) -> Option<String> {
        let branch = self.path_segments().rev().collect::<Vec<_>>().join(".");
        if branch.is_empty() {
            None
        } else {
            Some(branch)
        }
    }

    /// Returns the kind of identifier this address represents. User
    /// info takes precedence, followed by a URL scheme, followed by a
    /// telephone-number host.
    pub fn kind(&self) -> AddressKind {
        if self.user_info.is_some() {
            AddressKind::Email
        } else if self.scheme.is_some() {
            AddressKind::Url
        } else if self.host.starts_with('+') {
            AddressKind::Tnum
        } else {
            AddressKind::Domain
        }
    }
}

fn parse_port(port: &str) -> Result<u32, Error> {
    if crate::util::is_ascii_digits(port) {
        port.parse().map_err(|_| Error::MalformedPort)
    } else {
        Err(Error::MalformedPort)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(scheme) = self.scheme {
            write!(f, "{scheme}://")?;
        }
        if let Some(ref user_info) = self.user_info {
            write!(f, "{user_info}@")?;
        }
        f.write_str(&self.host)?;
        if self.port != DEFAULT_MODULE {
            write!(f, ":{}", self.port)?;
        }
        if self.path != "/" {
            f.write_str(&self.path)?;
        }
        Ok(())
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match Caseless(text) {
            Caseless("http") => Ok(Self::Http),
            Caseless("https") => Ok(Self::Https),
            _ => Err(Error::UnsupportedScheme),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
