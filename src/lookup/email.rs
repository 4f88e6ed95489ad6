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

//! Lookup generator for email addresses.

use super::GeneratorConfig;
use crate::address::Address;
use crate::hash::{hash_by_depth, HOSTED_SHARD_DEPTH};

/// The maximum number of distribution levels for email records.
pub const MAX_DISTRIBUTION_LEVELS: usize = 3;

/// Generates locations for an email address.
///
/// For `john.smith@example.com` and module 1, the independent location
/// is `1._john.smith.e._num.example.com.` and the hosted location is
/// `1._john.smith.e._example.com.9.h.1.num.net.`.
///
/// Domains with very many mailboxes may *distribute* their records: the
/// local part is then also hashed, to the configured number of levels,
/// and the digest is spliced in after the `e` label. With two levels,
/// the independent location above becomes
/// `1._john.smith.e.6.3._num.example.com.`. Email addresses have no
/// populator location.
#[derive(Clone, Debug)]
pub struct EmailLookupGenerator {
    local_part: String,
    domain: String,
    branch: Option<String>,
    levels: usize,
    hosted_zone: String,
}

impl EmailLookupGenerator {
    /// Creates a generator for an undistributed email address. Returns
    /// [`None`] if `address` has no user info.
    pub fn new(address: &Address, config: &GeneratorConfig) -> Option<Self> {
        Some(Self {
            local_part: address.user_info()?.to_owned(),
            domain: address.host().to_owned(),
            branch: address.branch(),
            levels: 0,
            hosted_zone: config.hosted_zone.clone(),
        })
    }

    /// Returns a generator for the same address distributed across
    /// `levels` levels. The value is capped at
    /// [`MAX_DISTRIBUTION_LEVELS`].
    pub fn distributed(self, levels: usize) -> Self {
        Self {
            levels: levels.min(MAX_DISTRIBUTION_LEVELS),
            ..self
        }
    }

    pub fn root_independent_location(&self, module: u32) -> String {
        format!("{}._num.{}.", self.mailbox_prefix(module), self.domain)
    }

    pub fn root_hosted_location(&self, module: u32) -> String {
        format!(
            "{}._{}{}.{}.",
            self.mailbox_prefix(module),
            self.domain,
            hash_by_depth(&self.domain, HOSTED_SHARD_DEPTH),
            self.hosted_zone,
        )
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Computes `<module>._<local-part>.e`, followed by the distribution
    /// digest if the address is distributed.
    fn mailbox_prefix(&self, module: u32) -> String {
        format!(
            "{module}._{}.e{}",
            self.local_part,
            hash_by_depth(&self.local_part, self.levels),
        )
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(address: &str) -> EmailLookupGenerator {
        EmailLookupGenerator::new(&address.parse().unwrap(), &GeneratorConfig::default()).unwrap()
    }

    #[test]
    fn undistributed_locations_are_correct() {
        let g = generator("John.Smith@example.com");
        assert_eq!(
            g.root_independent_location(1),
            "1._john.smith.e._num.example.com.",
        );
        assert_eq!(
            g.root_hosted_location(1),
            "1._john.smith.e._example.com.9.h.1.num.net.",
        );
    }

    #[test]
    fn distributed_locations_splice_in_the_local_part_digest() {
        let g = generator("john.smith@example.com").distributed(2);
        assert_eq!(
            g.root_independent_location(1),
            "1._john.smith.e.6.3._num.example.com.",
        );
        assert_eq!(
            g.root_hosted_location(1),
            "1._john.smith.e.6.3._example.com.9.h.1.num.net.",
        );
    }

    #[test]
    fn distribution_levels_are_capped() {
        let g = generator("john.smith@example.com").distributed(10);
        assert_eq!(
            g.root_independent_location(1),
            "1._john.smith.e.d.6.3._num.example.com.",
        );
    }
}
