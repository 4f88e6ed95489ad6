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

//! Computation of the short digests used to shard hosted NUM records.

use sha1::{Digest, Sha1};

use crate::util::to_base36;

/// The number of shard levels used for hosted and distributed names.
pub const HOSTED_SHARD_DEPTH: usize = 3;

/// Computes the shard suffix of `value` with `depth` levels.
///
/// The SHA-1 digest of `value` is written in base 36, and its leading
/// `depth` digits are emitted in reverse order, each as its own DNS
/// label. For instance, the digest of `test` is
/// `jrwjerxiekdtj9k82lg930wpkr6tq6r` in base 36, so a depth of three
/// yields `.w.r.j`. A depth of zero yields the empty string.
///
/// The result is meant to be appended directly to another label, which
/// spreads sibling identifiers across different DNS zones.
pub fn hash_by_depth(value: &str, depth: usize) -> String {
    let digest = Sha1::digest(value.as_bytes());
    let encoded = to_base36(&digest);
    let mut suffix = String::with_capacity(2 * depth);
    for digit in encoded.chars().take(depth).collect::<Vec<_>>().into_iter().rev() {
        suffix.push('.');
        suffix.push(digit);
    }
    suffix
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_by_depth_matches_reference_vectors() {
        assert_eq!(hash_by_depth("test", 1), ".j");
        assert_eq!(hash_by_depth("test", 2), ".r.j");
        assert_eq!(hash_by_depth("test", 3), ".w.r.j");
        assert_eq!(hash_by_depth("numexample.com", 3), ".c.7.m");
    }

    #[test]
    fn hash_by_depth_zero_is_empty() {
        assert_eq!(hash_by_depth("test", 0), "");
    }

    #[test]
    fn hash_by_depth_is_deterministic() {
        assert_eq!(
            hash_by_depth("example.com", HOSTED_SHARD_DEPTH),
            hash_by_depth("example.com", HOSTED_SHARD_DEPTH),
        );
    }
}
