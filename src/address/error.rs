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

//! Implementation of the [`Error`] type for malformed addresses.

use std::fmt;

/// An error type used to report why an [`Address`](super::Address)
/// could not be parsed or built.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The address was empty.
    Empty,

    /// The address had a scheme other than `http` or `https`.
    UnsupportedScheme,

    /// The host was not a valid domain name or telephone number.
    MalformedHost,

    /// The host was longer than 253 octets.
    HostTooLong,

    /// A label of the host was longer than 63 octets.
    LabelTooLong,

    /// The host looked like a telephone number, but did not consist of
    /// 2 to 15 digits after the `+`.
    MalformedTelephoneNumber,

    /// The port (module number) was not a non-negative integer.
    MalformedPort,

    /// A path segment was empty, began or ended with `.`, contained
    /// whitespace or a control character, or a `..` segment climbed
    /// above the root.
    MalformedPathSegment,

    /// A path segment was longer than 63 octets.
    PathSegmentTooLong,

    /// The user info was empty, contained `..` or a backslash, or began
    /// or ended with `.`.
    MalformedUserInfo,

    /// The user info was longer than 64 octets.
    UserInfoTooLong,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Empty => f.write_str("malformed address: the address is empty"),
            Self::UnsupportedScheme => {
                f.write_str("malformed address: only http and https schemes are supported")
            }
            Self::MalformedHost => f.write_str("malformed address: invalid host"),
            Self::HostTooLong => f.write_str("malformed address: host is longer than 253 octets"),
            Self::LabelTooLong => {
                f.write_str("malformed address: host label is longer than 63 octets")
            }
            Self::MalformedTelephoneNumber => f.write_str(
                "malformed address: telephone numbers must be + followed by 2 to 15 digits",
            ),
            Self::MalformedPort => f.write_str("malformed address: invalid module number"),
            Self::MalformedPathSegment => f.write_str(
                "malformed address: path segment is empty, climbs above the root, \
                 begins or ends with a dot, or contains whitespace or a control character",
            ),
            Self::PathSegmentTooLong => {
                f.write_str("malformed address: path segment is longer than 63 octets")
            }
            Self::MalformedUserInfo => f.write_str("malformed address: invalid user info"),
            Self::UserInfoTooLong => {
                f.write_str("malformed address: user info is longer than 64 octets")
            }
        }
    }
}

impl std::error::Error for Error {}
