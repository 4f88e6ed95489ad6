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

//! Implements the configuration file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use serde::Deserialize;
use url::Url;

use numlookup::context::DEFAULT_MAX_REDIRECTS;
use numlookup::dns::{
    DEFAULT_COOLDOWN, DEFAULT_QUERY_DEADLINE, DEFAULT_QUERY_TIMEOUT, DEFAULT_RESOLVERS,
};
use numlookup::lookup::{DEFAULT_ZONE, MAX_DISTRIBUTION_LEVELS};
use numlookup::state::{DEFAULT_POPULATOR_DELAYS_MS, MAX_POPULATOR_DELAYS};
use numlookup::ClientConfig;

use crate::args::LookupArgs;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads the configuration from the file given by `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let raw_config =
        fs::read_to_string(path.as_ref()).context("failed to read the configuration file")?;
    let config: Config =
        toml::from_str(&raw_config).context("failed to parse the configuration file")?;
    config.validate()?;
    log_config_summary(&config);
    Ok(config)
}

/// Loads the configuration from the parsed command line arguments given
/// by `args`. Anything not given on the command line takes its default.
pub fn load_from_args(args: &LookupArgs) -> Config {
    let config = Config {
        resolvers: if args.resolvers.is_empty() {
            default_resolvers()
        } else {
            args.resolvers.clone()
        },
        query_timeout: args.timeout.unwrap_or_else(default_query_timeout),
        dnssec: args.dnssec,
        ..Config::default()
    };
    log_config_summary(&config);
    config
}

/// Summarizes the configuration in the log, if the debug log level is
/// enabled.
fn log_config_summary(config: &Config) {
    if !log_enabled!(Debug) {
        return;
    }

    let resolvers: Vec<&str> = config.resolvers.iter().map(Url::as_str).collect();
    let lookup_timeout = match config.lookup_timeout {
        Some(secs) => format!("{secs} s"),
        None => String::from("none"),
    };
    debug!(
        "Configuration loaded:\n\
         Resolvers:        {}\n\
         Query timeout:    {} s\n\
         Query deadline:   {} s\n\
         Cooldown:         {} s\n\
         Populator delays: {:?} s\n\
         Hosted zone:      {}\n\
         Populator zone:   {}\n\
         Max. redirects:   {}\n\
         Lookup timeout:   {}\n\
         DNSSEC:           {}",
        resolvers.join(", "),
        config.query_timeout,
        config.query_deadline,
        config.resolver_cooldown,
        config.populator_delays,
        config.hosted_zone,
        config.populator_zone,
        config.max_redirects,
        lookup_timeout,
        if config.dnssec { "requested" } else { "not requested" },
    );
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION FILE STRUCTURE                                       //
////////////////////////////////////////////////////////////////////////

/// The complete configuration file. Durations are in seconds.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_resolvers")]
    pub resolvers: Vec<Url>,
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,
    #[serde(default = "default_query_deadline")]
    pub query_deadline: u64,
    #[serde(default = "default_resolver_cooldown")]
    pub resolver_cooldown: u64,
    #[serde(default = "default_populator_delays")]
    pub populator_delays: Vec<u64>,
    #[serde(default = "default_zone")]
    pub hosted_zone: String,
    #[serde(default = "default_zone")]
    pub populator_zone: String,
    #[serde(default)]
    pub email_distribution_levels: usize,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    pub lookup_timeout: Option<u64>,
    #[serde(default)]
    pub dnssec: bool,
}

impl Config {
    fn validate(&self) -> Result<()> {
        if self.resolvers.is_empty() {
            Err(anyhow!("at least one resolver must be configured"))
        } else if self.query_deadline == 0 {
            Err(anyhow!("the query deadline must be at least one second"))
        } else if self.populator_delays.len() > MAX_POPULATOR_DELAYS {
            Err(anyhow!(
                "at most {} populator delays may be configured",
                MAX_POPULATOR_DELAYS,
            ))
        } else if self.email_distribution_levels > MAX_DISTRIBUTION_LEVELS {
            Err(anyhow!(
                "email distribution levels must be between 0 and {}",
                MAX_DISTRIBUTION_LEVELS,
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolvers: default_resolvers(),
            query_timeout: default_query_timeout(),
            query_deadline: default_query_deadline(),
            resolver_cooldown: default_resolver_cooldown(),
            populator_delays: default_populator_delays(),
            hosted_zone: default_zone(),
            populator_zone: default_zone(),
            email_distribution_levels: 0,
            max_redirects: default_max_redirects(),
            lookup_timeout: None,
            dnssec: false,
        }
    }
}

impl From<Config> for ClientConfig {
    fn from(config: Config) -> Self {
        Self {
            resolvers: config.resolvers,
            query_timeout: Duration::from_secs(config.query_timeout),
            query_deadline: Duration::from_secs(config.query_deadline),
            resolver_cooldown: Duration::from_secs(config.resolver_cooldown),
            populator_delays: config
                .populator_delays
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
            hosted_zone: config.hosted_zone,
            populator_zone: config.populator_zone,
            email_distribution_levels: config.email_distribution_levels,
            max_redirects: config.max_redirects,
            lookup_timeout: config.lookup_timeout.map(Duration::from_secs),
            dnssec: config.dnssec,
        }
    }
}

fn default_resolvers() -> Vec<Url> {
    DEFAULT_RESOLVERS
        .iter()
        .filter_map(|(_, url)| Url::parse(url).ok())
        .collect()
}

fn default_query_timeout() -> u64 {
    DEFAULT_QUERY_TIMEOUT.as_secs()
}

fn default_query_deadline() -> u64 {
    DEFAULT_QUERY_DEADLINE.as_secs()
}

fn default_resolver_cooldown() -> u64 {
    DEFAULT_COOLDOWN.as_secs()
}

fn default_populator_delays() -> Vec<u64> {
    DEFAULT_POPULATOR_DELAYS_MS.iter().map(|ms| ms / 1000).collect()
}

fn default_zone() -> String {
    DEFAULT_ZONE.to_owned()
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_files_give_the_library_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(ClientConfig::from(config), ClientConfig::default());
    }

    #[test]
    fn files_override_defaults() {
        let config: Config = toml::from_str(
            r#"
            resolvers = ["https://doh.example/dns-query"]
            populator_delays = [1, 1]
            query_deadline = 4
            lookup_timeout = 20
            dnssec = true
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        let config = ClientConfig::from(config);
        assert_eq!(config.resolvers.len(), 1);
        assert_eq!(config.query_deadline, Duration::from_secs(4));
        assert_eq!(config.populator_delays, [Duration::from_secs(1); 2]);
        assert_eq!(config.lookup_timeout, Some(Duration::from_secs(20)));
        assert!(config.dnssec);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Config>("resolver = []").is_err());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let config: Config = toml::from_str("populator_delays = [1, 1, 1, 1, 1, 1, 1, 1, 1]").unwrap();
        assert!(config.validate().is_err());
        let config: Config = toml::from_str("resolvers = []").unwrap();
        assert!(config.validate().is_err());
        let config: Config = toml::from_str("query_deadline = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
