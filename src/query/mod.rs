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

//! The set of DNS names queried during one lookup, and its rewriting by
//! redirects.

use log::debug;

use crate::address::{normalize_path_segment, Address};
use crate::lookup::{GeneratorConfig, LookupGenerator};
use crate::util::is_valid_query_name;
use crate::Error;

mod path;
pub use path::resolve_path;

/// The query locations for one lookup.
///
/// The root locations are computed once, when the set is created. The
/// current independent and hosted locations begin as the address's own
/// locations (the root locations plus the address branch) and are
/// rewritten by relative redirects; an absolute redirect instead
/// replaces the whole set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryLocationSet {
    independent_location: String,
    hosted_location: String,
    root_independent_location: String,
    root_hosted_location: String,
    populator_location: Option<String>,
}

impl QueryLocationSet {
    /// Computes the query locations for `address` and `module`. Fails
    /// with [`Error::InvalidQueryName`] if any of them is not a valid
    /// DNS name.
    pub fn new(module: u32, address: &Address, config: &GeneratorConfig) -> Result<Self, Error> {
        let generator = LookupGenerator::new(address, config)?;
        Ok(Self {
            independent_location: checked(generator.independent_location(module))?,
            hosted_location: checked(generator.hosted_location(module))?,
            root_independent_location: generator.root_independent_location(module),
            root_hosted_location: generator.root_hosted_location(module),
            populator_location: generator.populator_location(module).map(checked).transpose()?,
        })
    }

    pub fn independent_location(&self) -> &str {
        &self.independent_location
    }

    pub fn hosted_location(&self) -> &str {
        &self.hosted_location
    }

    pub fn root_independent_location(&self) -> &str {
        &self.root_independent_location
    }

    pub fn root_hosted_location(&self) -> &str {
        &self.root_hosted_location
    }

    pub fn populator_location(&self) -> Option<&str> {
        self.populator_location.as_deref()
    }

    /// Returns the path corresponding to the current independent
    /// location's branch, e.g. `/a/b/c` for `c.b.a.<root>`.
    pub fn independent_record_path(&self) -> String {
        record_path(&self.independent_location, &self.root_independent_location)
    }

    /// Returns the path corresponding to the current hosted location's
    /// branch.
    pub fn hosted_record_path(&self) -> String {
        record_path(&self.hosted_location, &self.root_hosted_location)
    }

    /// Points the independent location at the `/`-rooted `path` below
    /// the root independent location. Fails with
    /// [`Error::RedundantRedirect`] if this would not change the
    /// location.
    pub fn redirect_independent_path(&mut self, path: &str) -> Result<(), Error> {
        let location = redirect_location(path, &self.root_independent_location)?;
        if location == self.independent_location {
            return Err(Error::RedundantRedirect);
        }
        debug!(
            "Redirecting independent location {} to {}.",
            self.independent_location, location,
        );
        self.independent_location = location;
        Ok(())
    }

    /// The hosted counterpart of
    /// [`QueryLocationSet::redirect_independent_path`].
    pub fn redirect_hosted_path(&mut self, path: &str) -> Result<(), Error> {
        let location = redirect_location(path, &self.root_hosted_location)?;
        if location == self.hosted_location {
            return Err(Error::RedundantRedirect);
        }
        debug!(
            "Redirecting hosted location {} to {}.",
            self.hosted_location, location,
        );
        self.hosted_location = location;
        Ok(())
    }
}

/// Converts the labels that `location` adds to `root` into a path,
/// reversing their order.
fn record_path(location: &str, root: &str) -> String {
    let branch = location
        .strip_suffix(root)
        .unwrap_or_default()
        .trim_end_matches('.');
    let segments: Vec<&str> = branch.split('.').filter(|l| !l.is_empty()).rev().collect();
    format!("/{}", segments.join("/"))
}

/// Converts a `/`-rooted path into a location below `root`.
fn redirect_location(path: &str, root: &str) -> Result<String, Error> {
    let mut labels = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()).rev() {
        labels.push(normalize_path_segment(segment)?);
    }
    if labels.is_empty() {
        Ok(root.to_owned())
    } else {
        checked(format!("{}.{root}", labels.join(".")))
    }
}

/// Passes `name` through if it is a valid DNS query name.
fn checked(name: String) -> Result<String, Error> {
    if is_valid_query_name(&name) {
        Ok(name)
    } else {
        Err(Error::InvalidQueryName(name))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn location_set(address: &str) -> QueryLocationSet {
        QueryLocationSet::new(1, &address.parse().unwrap(), &GeneratorConfig::default()).unwrap()
    }

    #[test]
    fn overlong_labels_are_rejected_before_querying() {
        let address: Address = format!("{}@numexample.com:1", "x".repeat(64)).parse().unwrap();
        assert!(matches!(
            QueryLocationSet::new(1, &address, &GeneratorConfig::default()),
            Err(Error::InvalidQueryName(_)),
        ));
    }

    #[test]
    fn overlong_names_are_rejected() {
        let host = format!("{}.com", ["x".repeat(60).as_str(); 4].join("."));
        let address: Address = host.parse().unwrap();
        assert!(matches!(
            QueryLocationSet::new(1, &address, &GeneratorConfig::default()),
            Err(Error::InvalidQueryName(_)),
        ));
    }

    #[test]
    fn redirects_cannot_make_overlong_names() {
        let mut set = location_set("numexample.com:1");
        let path = format!("/{}", ["x".repeat(60).as_str(); 4].join("/"));
        assert!(matches!(
            set.redirect_independent_path(&path),
            Err(Error::InvalidQueryName(_)),
        ));
        assert_eq!(set.independent_location(), "1._num.numexample.com.");
    }

    #[test]
    fn new_computes_all_locations() {
        let set = location_set("numexample.com");
        assert_eq!(set.independent_location(), "1._num.numexample.com.");
        assert_eq!(set.root_independent_location(), "1._num.numexample.com.");
        assert_eq!(set.hosted_location(), "1._numexample.com.c.7.m.num.net.");
        assert_eq!(
            set.populator_location(),
            Some("1._numexample.com.populator.num.net."),
        );
    }

    #[test]
    fn record_paths_reverse_the_branch() {
        let set = location_set("numexample.com/a/b/c");
        assert_eq!(set.independent_record_path(), "/a/b/c");
        assert_eq!(set.hosted_record_path(), "/a/b/c");
        assert_eq!(location_set("numexample.com").independent_record_path(), "/");
    }

    #[test]
    fn record_path_round_trips_through_redirects() {
        for address in ["numexample.com/a/b", "john@numexample.com/x", "+441632960000/p/q"] {
            let original = location_set(address);
            let mut set = original.clone();

            // Moving away and back again reproduces the original name.
            let path = set.independent_record_path();
            set.redirect_independent_path("/elsewhere").unwrap();
            set.redirect_independent_path(&path).unwrap();
            assert_eq!(set.independent_location(), original.independent_location());

            let path = set.hosted_record_path();
            set.redirect_hosted_path("/elsewhere").unwrap();
            set.redirect_hosted_path(&path).unwrap();
            assert_eq!(set.hosted_location(), original.hosted_location());
        }
    }

    #[test]
    fn redundant_redirects_fail() {
        let mut set = location_set("numexample.com/a/b");
        assert_eq!(
            set.redirect_independent_path("/a/b"),
            Err(Error::RedundantRedirect),
        );
        assert_eq!(
            set.redirect_hosted_path("/a//b/"),
            Err(Error::RedundantRedirect),
        );
    }

    #[test]
    fn redirects_rewrite_only_their_location() {
        let mut set = location_set("numexample.com");
        set.redirect_independent_path("/x/y").unwrap();
        assert_eq!(set.independent_location(), "y.x.1._num.numexample.com.");
        assert_eq!(set.hosted_location(), "1._numexample.com.c.7.m.num.net.");
        set.redirect_independent_path("/").unwrap();
        assert_eq!(set.independent_location(), "1._num.numexample.com.");
    }

    #[test]
    fn redirect_paths_are_validated() {
        let mut set = location_set("numexample.com");
        assert!(set.redirect_hosted_path("/a b").is_err());
        assert_eq!(set.hosted_location(), "1._numexample.com.c.7.m.num.net.");
    }
}
