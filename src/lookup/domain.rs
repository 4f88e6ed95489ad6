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

//! Lookup generators for domain names and URLs.

use super::GeneratorConfig;
use crate::address::Address;
use crate::hash::{hash_by_depth, HOSTED_SHARD_DEPTH};

/// Generates locations for a bare domain name.
///
/// For the domain `numexample.com`, module 1, and the default zones:
///
/// * independent: `1._num.numexample.com.`
/// * hosted: `1._numexample.com.c.7.m.num.net.`
/// * populator: `1._numexample.com.populator.num.net.`
#[derive(Clone, Debug)]
pub struct DomainLookupGenerator {
    domain: String,
    branch: Option<String>,
    config: GeneratorConfig,
}

impl DomainLookupGenerator {
    pub fn new(address: &Address, config: &GeneratorConfig) -> Self {
        Self::for_domain(address.host(), address.branch(), config)
    }

    fn for_domain(domain: &str, branch: Option<String>, config: &GeneratorConfig) -> Self {
        Self {
            domain: domain.to_owned(),
            branch,
            config: config.clone(),
        }
    }

    pub fn root_independent_location(&self, module: u32) -> String {
        format!("{module}._num.{}.", self.domain)
    }

    pub fn root_hosted_location(&self, module: u32) -> String {
        format!(
            "{module}._{}{}.{}.",
            self.domain,
            hash_by_depth(&self.domain, HOSTED_SHARD_DEPTH),
            self.config.hosted_zone,
        )
    }

    pub fn populator_location(&self, module: u32) -> Option<String> {
        if self.branch.is_some() {
            None
        } else {
            Some(format!(
                "{module}._{}.populator.{}.",
                self.domain, self.config.populator_zone,
            ))
        }
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }
}

/// Generates locations for a URL.
///
/// URLs are looked up like their host's domain name, except that a
/// leading `www` label is dropped: `https://www.numexample.com/` and
/// `numexample.com` share their records.
#[derive(Clone, Debug)]
pub struct UrlLookupGenerator(DomainLookupGenerator);

impl UrlLookupGenerator {
    pub fn new(address: &Address, config: &GeneratorConfig) -> Self {
        let host = address.host();
        let domain = match host.strip_prefix("www.") {
            // Keep "www." when it is followed by a single label.
            Some(rest) if rest.contains('.') => rest,
            _ => host,
        };
        Self(DomainLookupGenerator::for_domain(
            domain,
            address.branch(),
            config,
        ))
    }

    pub fn root_independent_location(&self, module: u32) -> String {
        self.0.root_independent_location(module)
    }

    pub fn root_hosted_location(&self, module: u32) -> String {
        self.0.root_hosted_location(module)
    }

    pub fn populator_location(&self, module: u32) -> Option<String> {
        self.0.populator_location(module)
    }

    pub fn branch(&self) -> Option<&str> {
        self.0.branch()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_drops_leading_www() {
        let address = "https://www.numexample.com/foo".parse().unwrap();
        let generator = UrlLookupGenerator::new(&address, &GeneratorConfig::default());
        assert_eq!(
            generator.root_independent_location(0),
            "0._num.numexample.com.",
        );
        assert_eq!(
            generator.root_hosted_location(0),
            "0._numexample.com.c.7.m.num.net.",
        );
        assert_eq!(generator.branch(), Some("foo"));
    }

    #[test]
    fn url_keeps_www_of_two_label_hosts() {
        let address = "http://www.com".parse().unwrap();
        let generator = UrlLookupGenerator::new(&address, &GeneratorConfig::default());
        assert_eq!(generator.root_independent_location(1), "1._num.www.com.");
    }

    #[test]
    fn custom_zones_are_used() {
        let config = GeneratorConfig {
            hosted_zone: "hosted.test".to_owned(),
            populator_zone: "pop.test".to_owned(),
            ..Default::default()
        };
        let address = "numexample.com".parse().unwrap();
        let generator = DomainLookupGenerator::new(&address, &config);
        assert_eq!(
            generator.root_hosted_location(2),
            "2._numexample.com.c.7.m.hosted.test.",
        );
        assert_eq!(
            generator.populator_location(2).as_deref(),
            Some("2._numexample.com.populator.pop.test."),
        );
    }
}
