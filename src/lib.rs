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

//! A client for the NUM lookup protocol.
//!
//! Given an identifier (a domain, URL, email address, or telephone
//! number), the client computes the DNS names at which a NUM record
//! may be published, queries them over DNS-over-HTTPS, reassembles
//! multi-part TXT records, and follows protocol redirects until it
//! finds a record or gives up.
//!
//! The main entry point is [`Client`]:
//!
//! ```no_run
//! # async fn example<H: numlookup::dns::HttpClient>(http: H) -> Result<(), numlookup::Error> {
//! use numlookup::{Address, Client, ClientConfig};
//!
//! let client = Client::new(http, ClientConfig::default());
//! let mut context = client.create_context("numexample.com:1".parse::<Address>()?)?;
//! let record = client.resolve_record(&mut context).await?;
//! println!("{record}");
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod client;
pub mod context;
pub mod dns;
mod error;
pub mod hash;
pub mod lookup;
pub mod query;
pub mod state;
mod util;

pub use address::{Address, AddressKind};
pub use client::{
    Client, ClientConfig, InterpretError, Interpreter, Outcome, PassthroughInterpreter,
};
pub use context::Context;
pub use error::Error;
pub use state::{Location, PopulatorStatus};
