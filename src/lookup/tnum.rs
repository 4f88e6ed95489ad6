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

//! Lookup generator for telephone numbers (TNUM).

use std::collections::HashMap;

use lazy_static::lazy_static;

use super::GeneratorConfig;
use crate::address::Address;
use crate::hash::{hash_by_depth, HOSTED_SHARD_DEPTH};
use crate::Error;

/// How the national part of a telephone number is split into DNS
/// labels. In both cases the resulting labels are ordered from least to
/// most significant, like ENUM.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MappingPattern {
    /// Block-digit split: blocks of three digits, counted from the left.
    Bds,

    /// Single-digit split: one digit per label.
    Sds,
}

/// The DNS mapping for one international dialing code.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CountryCodeMapping {
    pub pattern: MappingPattern,
    pub zone: &'static str,
}

lazy_static! {
    static ref COUNTRY_CODES: HashMap<&'static str, CountryCodeMapping> = {
        use MappingPattern::*;
        [
            ("1", Sds, "nanp.tnum.net"),
            ("33", Sds, "fr.tnum.net"),
            ("44", Bds, "uk.tnum.net"),
            ("49", Bds, "de.tnum.net"),
            ("61", Bds, "au.tnum.net"),
            ("91", Sds, "in.tnum.net"),
            ("353", Bds, "ie.tnum.net"),
        ]
        .into_iter()
        .map(|(code, pattern, zone)| (code, CountryCodeMapping { pattern, zone }))
        .collect()
    };
}

/// The longest international dialing code.
const MAX_COUNTRY_CODE_LEN: usize = 3;

/// Returns the mapping for the dialing code `code`, if there is one.
pub fn country_code_mapping(code: &str) -> Option<CountryCodeMapping> {
    COUNTRY_CODES.get(code).copied()
}

/// Generates locations for a telephone number.
///
/// The dialing code is matched (longest prefix first) against a table
/// of known codes, which determines both the label pattern for the
/// remaining digits and the DNS zone. For `+441632960000` (UK, block
/// split) and module 1:
///
/// * independent: `1._num.0.000.296.163.uk.tnum.net.`
/// * hosted: `1._0.000.296.163.44.h.1.g.num.net.`
///
/// Telephone numbers have no populator location.
#[derive(Clone, Debug)]
pub struct TnumLookupGenerator {
    number: String,
    country_code: String,
    labels: String,
    zone: &'static str,
    branch: Option<String>,
    hosted_zone: String,
}

impl TnumLookupGenerator {
    /// Creates a generator for a telephone-number address. This fails
    /// with [`Error::NoCountryCodeMapping`] if the dialing code is not
    /// known.
    pub fn new(address: &Address, config: &GeneratorConfig) -> Result<Self, Error> {
        let number = address.host();
        let digits = number.trim_start_matches('+');
        for len in (1..=MAX_COUNTRY_CODE_LEN).rev() {
            if digits.len() <= len {
                continue;
            }
            let (code, national) = digits.split_at(len);
            if let Some(mapping) = country_code_mapping(code) {
                return Ok(Self {
                    number: number.to_owned(),
                    country_code: code.to_owned(),
                    labels: split_digits(national, mapping.pattern),
                    zone: mapping.zone,
                    branch: address.branch(),
                    hosted_zone: config.hosted_zone.clone(),
                });
            }
        }
        Err(Error::NoCountryCodeMapping(number.to_owned()))
    }

    pub fn root_independent_location(&self, module: u32) -> String {
        format!("{module}._num.{}.{}.", self.labels, self.zone)
    }

    pub fn root_hosted_location(&self, module: u32) -> String {
        format!(
            "{module}._{}.{}{}.{}.",
            self.labels,
            self.country_code,
            hash_by_depth(&self.number, HOSTED_SHARD_DEPTH),
            self.hosted_zone,
        )
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }
}

/// Splits the national digits of a telephone number into labels
/// according to `pattern`, least significant label first.
fn split_digits(national: &str, pattern: MappingPattern) -> String {
    let blocks: Vec<&str> = match pattern {
        MappingPattern::Sds => (0..national.len()).map(|i| &national[i..i + 1]).collect(),
        MappingPattern::Bds => national
            .as_bytes()
            .chunks(3)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect(),
    };
    blocks.into_iter().rev().collect::<Vec<_>>().join(".")
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
