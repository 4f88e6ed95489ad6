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

//! Generation of the DNS names at which NUM records are published.
//!
//! A NUM record for an identifier may be found at three locations:
//!
//! * the *independent* location, under the identifier's own domain;
//! * the *hosted* location, under a shared hosting zone, sharded by a
//!   digest of the identifier (see [`hash_by_depth`](crate::hash::hash_by_depth));
//! * the *populator* location, where a service may synthesize a record
//!   on demand (domains and URLs only).
//!
//! Each is computed by a [`LookupGenerator`], which has one variant per
//! [`AddressKind`].

use crate::address::{self, Address, AddressKind};
use crate::Error;

mod domain;
mod email;
mod tnum;
pub use domain::{DomainLookupGenerator, UrlLookupGenerator};
pub use email::{EmailLookupGenerator, MAX_DISTRIBUTION_LEVELS};
pub use tnum::{CountryCodeMapping, MappingPattern, TnumLookupGenerator};

/// The default zone for hosted and populator records.
pub const DEFAULT_ZONE: &str = "num.net";

/// Settings shared by all lookup generators.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneratorConfig {
    /// The zone under which hosted records live.
    pub hosted_zone: String,

    /// The zone under which populator records live.
    pub populator_zone: String,

    /// The number of levels across which email records are
    /// distributed. Zero means that they are not distributed.
    pub email_distribution_levels: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            hosted_zone: DEFAULT_ZONE.to_owned(),
            populator_zone: DEFAULT_ZONE.to_owned(),
            email_distribution_levels: 0,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// LOOKUP GENERATORS                                                  //
////////////////////////////////////////////////////////////////////////

/// Computes the query names for one identifier.
///
/// All names are absolute (they end with a `.`). The "root" forms
/// ignore the identifier's path; the plain forms prepend the address
/// [branch](Address::branch), if there is one.
#[derive(Clone, Debug)]
pub enum LookupGenerator {
    Domain(DomainLookupGenerator),
    Email(EmailLookupGenerator),
    Url(UrlLookupGenerator),
    Tnum(TnumLookupGenerator),
}

impl LookupGenerator {
    /// Selects and constructs the generator for `address`'s kind.
    pub fn new(address: &Address, config: &GeneratorConfig) -> Result<Self, Error> {
        Ok(match address.kind() {
            AddressKind::Domain => Self::Domain(DomainLookupGenerator::new(address, config)),
            AddressKind::Email => Self::Email(
                EmailLookupGenerator::new(address, config)
                    .ok_or(Error::Address(address::Error::MalformedUserInfo))?
                    .distributed(config.email_distribution_levels),
            ),
            AddressKind::Url => Self::Url(UrlLookupGenerator::new(address, config)),
            AddressKind::Tnum => Self::Tnum(TnumLookupGenerator::new(address, config)?),
        })
    }

    pub fn root_independent_location(&self, module: u32) -> String {
        match self {
            Self::Domain(g) => g.root_independent_location(module),
            Self::Email(g) => g.root_independent_location(module),
            Self::Url(g) => g.root_independent_location(module),
            Self::Tnum(g) => g.root_independent_location(module),
        }
    }

    pub fn root_hosted_location(&self, module: u32) -> String {
        match self {
            Self::Domain(g) => g.root_hosted_location(module),
            Self::Email(g) => g.root_hosted_location(module),
            Self::Url(g) => g.root_hosted_location(module),
            Self::Tnum(g) => g.root_hosted_location(module),
        }
    }

    pub fn independent_location(&self, module: u32) -> String {
        with_branch(self.branch(), self.root_independent_location(module))
    }

    pub fn hosted_location(&self, module: u32) -> String {
        with_branch(self.branch(), self.root_hosted_location(module))
    }

    /// Returns the populator location, which exists only for domains
    /// and URLs without a branch.
    pub fn populator_location(&self, module: u32) -> Option<String> {
        match self {
            Self::Domain(g) => g.populator_location(module),
            Self::Url(g) => g.populator_location(module),
            Self::Email(_) | Self::Tnum(_) => None,
        }
    }

    fn branch(&self) -> Option<&str> {
        match self {
            Self::Domain(g) => g.branch(),
            Self::Email(g) => g.branch(),
            Self::Url(g) => g.branch(),
            Self::Tnum(g) => g.branch(),
        }
    }
}

/// Prepends `branch` (if any) to the absolute name `root`.
fn with_branch(branch: Option<&str>, root: String) -> String {
    match branch {
        Some(branch) => format!("{branch}.{root}"),
        None => root,
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(address: &str) -> LookupGenerator {
        LookupGenerator::new(&address.parse().unwrap(), &GeneratorConfig::default()).unwrap()
    }

    #[test]
    fn domain_locations_match_reference() {
        let g = generator("numexample.com");
        assert_eq!(g.independent_location(1), "1._num.numexample.com.");
        assert_eq!(g.hosted_location(1), "1._numexample.com.c.7.m.num.net.");
        assert_eq!(
            g.populator_location(1).as_deref(),
            Some("1._numexample.com.populator.num.net."),
        );
    }

    #[test]
    fn branches_are_prepended() {
        let g = generator("numexample.com/a/b/c");
        assert_eq!(g.independent_location(1), "c.b.a.1._num.numexample.com.");
        assert_eq!(g.root_independent_location(1), "1._num.numexample.com.");
        assert_eq!(
            g.hosted_location(1),
            "c.b.a.1._numexample.com.c.7.m.num.net.",
        );
        assert_eq!(g.populator_location(1), None);
    }

    #[test]
    fn locations_are_deterministic() {
        for address in [
            "numexample.com/x",
            "https://www.numexample.com/y",
            "john.smith@example.com",
            "+441632960000/z",
        ] {
            let (a, b) = (generator(address), generator(address));
            assert_eq!(a.independent_location(3), b.independent_location(3));
            assert_eq!(a.hosted_location(3), b.hosted_location(3));
        }
    }

    #[test]
    fn kinds_select_variants() {
        assert!(matches!(generator("numexample.com"), LookupGenerator::Domain(_)));
        assert!(matches!(generator("a@numexample.com"), LookupGenerator::Email(_)));
        assert!(matches!(generator("http://numexample.com"), LookupGenerator::Url(_)));
        assert!(matches!(generator("+441632960000"), LookupGenerator::Tnum(_)));
    }

    #[test]
    fn email_has_no_populator_location() {
        assert_eq!(generator("john@numexample.com").populator_location(1), None);
    }
}
