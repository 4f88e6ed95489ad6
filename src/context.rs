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

//! Implementation of [`Context`], the state of one lookup.

use std::collections::HashMap;

use log::debug;

use crate::address::{is_valid_host, Address, DEFAULT_MODULE};
use crate::lookup::GeneratorConfig;
use crate::query::{resolve_path, QueryLocationSet};
use crate::state::Location;
use crate::Error;

/// The default number of redirects a lookup may follow.
pub const DEFAULT_MAX_REDIRECTS: usize = 3;

/// The state of one lookup: the address being looked up, the query
/// locations (as rewritten by redirects so far), the location being
/// queried, and the record once one is found.
///
/// A failed lookup leaves the context with no result and the location
/// [`Location::None`]; it never holds a partial result.
#[derive(Clone, Debug)]
pub struct Context {
    address: Address,
    location: Location,
    result: Option<String>,
    redirect_count: usize,
    max_redirects: usize,
    queries: QueryLocationSet,
    generator_config: GeneratorConfig,
    dnssec: bool,

    /// Variables passed through to the record interpreter.
    pub user_variables: HashMap<String, String>,
}

impl Context {
    /// Creates the context for looking up `address`, at the module
    /// given by its port.
    pub fn new(
        address: Address,
        generator_config: GeneratorConfig,
        max_redirects: usize,
        dnssec: bool,
    ) -> Result<Self, Error> {
        let queries = QueryLocationSet::new(address.port(), &address, &generator_config)?;
        Ok(Self {
            address,
            location: Location::Independent,
            result: None,
            redirect_count: 0,
            max_redirects,
            queries,
            generator_config,
            dnssec,
            user_variables: HashMap::new(),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Returns the module number being looked up.
    pub fn module(&self) -> u32 {
        self.address.port()
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn redirect_count(&self) -> usize {
        self.redirect_count
    }

    pub fn queries(&self) -> &QueryLocationSet {
        &self.queries
    }

    /// Returns whether DNSSEC-validated answers were requested.
    pub fn dnssec(&self) -> bool {
        self.dnssec
    }

    pub(crate) fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    pub(crate) fn set_result(&mut self, result: Option<String>) {
        self.result = result;
    }

    /// Marks the lookup as failed.
    pub(crate) fn fail(&mut self) {
        self.result = None;
        self.location = Location::None;
    }

    /// Applies a redirect to `target`, received while querying the
    /// current location, and returns the location that the lookup
    /// should restart at.
    ///
    /// A target with a scheme, or whose authority is a valid host, is an
    /// absolute redirect: the query locations are recomputed for the new
    /// address (keeping the current module unless the target names
    /// one), and the lookup restarts at the independent location.
    /// Anything else is a path, resolved against the record path of the
    /// location being queried. Relative redirects received from the
    /// populator apply to the hosted location.
    ///
    /// Every redirect counts towards the limit; exceeding it fails with
    /// [`Error::TooManyRedirects`]. Any failure marks the lookup as
    /// failed.
    pub fn handle_query_redirect(&mut self, target: &str) -> Result<Location, Error> {
        self.redirect_count += 1;
        let result = if self.redirect_count > self.max_redirects {
            Err(Error::TooManyRedirects)
        } else if is_absolute_target(target) {
            self.redirect_absolute(target)
        } else {
            self.redirect_relative(target)
        };

        match result {
            Ok(location) => {
                debug!(
                    "Followed redirect {} of {} to {:?}; restarting at the {} location.",
                    self.redirect_count, self.max_redirects, target, location,
                );
                self.result = None;
                self.location = location;
                Ok(location)
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    fn redirect_absolute(&mut self, target: &str) -> Result<Location, Error> {
        let mut address = Address::parse(target)?;
        if address.port() == DEFAULT_MODULE {
            address = address.with_port(self.module());
        }
        let queries = QueryLocationSet::new(address.port(), &address, &self.generator_config)?;
        if queries == self.queries {
            return Err(Error::RedundantRedirect);
        }
        self.queries = queries;
        Ok(Location::Independent)
    }

    fn redirect_relative(&mut self, target: &str) -> Result<Location, Error> {
        match self.location {
            Location::Independent => {
                let path = resolve_path(&self.queries.independent_record_path(), target)?;
                self.queries.redirect_independent_path(&path)?;
                Ok(Location::Independent)
            }
            Location::Hosted | Location::Populator => {
                let path = resolve_path(&self.queries.hosted_record_path(), target)?;
                self.queries.redirect_hosted_path(&path)?;
                Ok(Location::Hosted)
            }
            Location::None => Err(Error::InvalidRedirect(target.to_owned())),
        }
    }
}

/// Returns whether a redirect target names a new address rather than a
/// path.
fn is_absolute_target(target: &str) -> bool {
    if target.contains("://") {
        return true;
    }
    let authority = target.split('/').next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.rsplit_once(':').map_or(host, |(host, _)| host);
    !host.is_empty() && is_valid_host(host)
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn context(address: &str) -> Context {
        Context::new(
            address.parse().unwrap(),
            GeneratorConfig::default(),
            DEFAULT_MAX_REDIRECTS,
            false,
        )
        .unwrap()
    }

    #[test]
    fn new_contexts_start_at_the_independent_location() {
        let context = context("numexample.com:1");
        assert_eq!(context.location(), Location::Independent);
        assert_eq!(context.result(), None);
        assert_eq!(context.redirect_count(), 0);
        assert_eq!(context.module(), 1);
        assert_eq!(
            context.queries().independent_location(),
            "1._num.numexample.com.",
        );
    }

    #[test]
    fn three_redirects_succeed_and_a_fourth_fails() {
        let mut context = context("numexample.com:1");
        for target in ["a", "b", "c"] {
            assert_eq!(
                context.handle_query_redirect(target),
                Ok(Location::Independent),
            );
        }
        assert_eq!(
            context.queries().independent_location(),
            "c.b.a.1._num.numexample.com.",
        );

        context.set_result(Some("record".to_owned()));
        assert_eq!(
            context.handle_query_redirect("d"),
            Err(Error::TooManyRedirects),
        );
        assert_eq!(context.result(), None);
        assert_eq!(context.location(), Location::None);
    }

    #[test]
    fn relative_redirects_resolve_against_the_record_path() {
        let mut context = context("numexample.com:1/a/b");
        context.handle_query_redirect("../c").unwrap();
        assert_eq!(
            context.queries().independent_location(),
            "c.a.1._num.numexample.com.",
        );
        context.handle_query_redirect("/").unwrap();
        assert_eq!(
            context.queries().independent_location(),
            "1._num.numexample.com.",
        );
    }

    #[test]
    fn hosted_and_populator_redirects_rewrite_the_hosted_location() {
        let mut context = context("numexample.com:1");
        context.set_location(Location::Populator);
        assert_eq!(context.handle_query_redirect("x"), Ok(Location::Hosted));
        assert_eq!(
            context.queries().hosted_location(),
            "x.1._numexample.com.c.7.m.num.net.",
        );
        assert_eq!(
            context.queries().independent_location(),
            "1._num.numexample.com.",
        );
    }

    #[test]
    fn absolute_redirects_replace_the_query_locations() {
        let mut context = context("numexample.com:1");
        context.set_location(Location::Hosted);
        assert_eq!(
            context.handle_query_redirect("other.example"),
            Ok(Location::Independent),
        );
        assert_eq!(
            context.queries().independent_location(),
            "1._num.other.example.",
        );
        context
            .handle_query_redirect("https://third.example:2/x")
            .unwrap();
        assert_eq!(
            context.queries().independent_location(),
            "x.2._num.third.example.",
        );
        assert_eq!(context.address().host(), "numexample.com");
    }

    #[test]
    fn redundant_redirects_fail_the_lookup() {
        let mut context = context("numexample.com:1/a");
        assert_eq!(
            context.handle_query_redirect("."),
            Err(Error::RedundantRedirect),
        );
        assert_eq!(context.location(), Location::None);
    }

    #[test]
    fn escaping_redirects_fail_the_lookup() {
        let mut context = context("numexample.com:1");
        assert_eq!(
            context.handle_query_redirect("../.."),
            Err(Error::PathEscapesRoot),
        );
    }

    #[test]
    fn relative_redirects_need_a_location() {
        let mut context = context("numexample.com:1");
        context.set_location(Location::None);
        assert_eq!(
            context.handle_query_redirect("a"),
            Err(Error::InvalidRedirect("a".to_owned())),
        );
    }

    #[test]
    fn targets_are_classified() {
        assert!(is_absolute_target("https://x.example"));
        assert!(is_absolute_target("x.example"));
        assert!(is_absolute_target("john@x.example:2/a"));
        assert!(!is_absolute_target("a/b"));
        assert!(!is_absolute_target("/a"));
        assert!(!is_absolute_target(".."));
    }
}
