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

//! Implements the `lookup` command.

use std::fmt::Write;
use std::process;

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info};

use numlookup::dns::ReqwestHttpClient;
use numlookup::Client;

use crate::args::LookupArgs;
use crate::config;

/// Runs a lookup and prints the record.
pub fn run(args: LookupArgs) {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));

    if let Err(e) = try_running(args) {
        let mut message = String::from("Lookup failed:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        error!("{}", message);
        process::exit(1);
    }
}

fn try_running(args: LookupArgs) -> Result<()> {
    info!(
        "numlookup v{}.{}.{} starting.",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        env!("CARGO_PKG_VERSION_PATCH"),
    );

    // Get the configuration, either from the file system or from the
    // command line arguments, as appropriate.
    let config = if let Some(ref config_path) = args.config {
        info!("Loading the configuration from {}.", config_path.display());
        config::load_from_path(config_path).context("failed to load the configuration")?
    } else {
        config::load_from_args(&args)
    };

    let address = match args.module {
        Some(module) => args.address.with_port(module),
        None => args.address,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let http = ReqwestHttpClient::new().context("failed to create the HTTP client")?;
    let client = Client::new(http, config.into());

    info!("Looking up {}.", address);
    let record = runtime
        .block_on(client.lookup(address.clone()))
        .with_context(|| format!("failed to look up {address}"))?;
    println!("{record}");
    Ok(())
}
