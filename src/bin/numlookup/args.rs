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

//! Implements command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use numlookup::Address;

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// A client for the NUM lookup protocol
#[derive(Debug, Parser)]
#[command(author, version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Look up the NUM record of an address
    Lookup(LookupArgs),
}

#[derive(Debug, Parser)]
pub struct LookupArgs {
    /// The domain, URL, email address, or telephone number to look up
    #[arg(value_name = "ADDRESS")]
    pub address: Address,

    /// Set the configuration file to use
    #[arg(
        long,
        conflicts_with_all = ["resolvers", "timeout", "dnssec"],
        value_name = "FILE",
    )]
    pub config: Option<PathBuf>,

    /// Add a DNS-over-HTTPS resolver to use
    #[arg(long = "resolver", value_name = "URL")]
    pub resolvers: Vec<Url>,

    /// Set the module number, overriding the one in the address
    #[arg(long, value_name = "N")]
    pub module: Option<u32>,

    /// Set the timeout of each DNS query
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Request DNSSEC-validated answers
    #[arg(long)]
    pub dnssec: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_line_interface_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn lookup_arguments_parse() {
        let args = Args::try_parse_from([
            "numlookup",
            "lookup",
            "numexample.com:1",
            "--resolver",
            "https://dns.example/resolve",
            "--resolver",
            "https://doh.example/dns-query",
            "--dnssec",
        ])
        .unwrap();
        let Command::Lookup(args) = args.command;
        assert_eq!(args.address.to_string(), "numexample.com:1");
        assert_eq!(args.resolvers.len(), 2);
        assert!(args.dnssec);
        assert_eq!(args.config, None);
    }

    #[test]
    fn config_file_conflicts_with_explicit_options() {
        assert!(Args::try_parse_from([
            "numlookup",
            "lookup",
            "numexample.com",
            "--config",
            "numlookup.toml",
            "--dnssec",
        ])
        .is_err());
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        assert!(Args::try_parse_from(["numlookup", "lookup", "not a host"]).is_err());
    }
}
