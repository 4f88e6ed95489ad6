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

//! Implementation of [`Client`], which drives lookups from start to
//! finish.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use url::Url;

use crate::address::Address;
use crate::context::{Context, DEFAULT_MAX_REDIRECTS};
use crate::dns::{
    DnsClient, HttpClient, ResolverPool, DEFAULT_COOLDOWN, DEFAULT_QUERY_DEADLINE,
    DEFAULT_QUERY_TIMEOUT, DEFAULT_RESOLVERS,
};
use crate::lookup::{GeneratorConfig, DEFAULT_ZONE};
use crate::state::{
    Location, LookupLocationStateMachine, PopulatorStatus, StepInput, DEFAULT_POPULATOR_DELAYS_MS,
};
use crate::Error;

/// The key under which an interpreted record carries a redirect.
pub const REDIRECT_KEY: &str = "@R";

////////////////////////////////////////////////////////////////////////
// CONFIGURATION                                                      //
////////////////////////////////////////////////////////////////////////

/// The settings of a [`Client`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    /// The DNS-over-HTTPS resolvers, in order of preference.
    pub resolvers: Vec<Url>,

    /// The timeout of each DNS-over-HTTPS request.
    pub query_timeout: Duration,

    /// The limit on each DNS query, across all the resolvers it is
    /// tried at.
    pub query_deadline: Duration,

    /// How long a failing resolver is left unused.
    pub resolver_cooldown: Duration,

    /// The delays between populator polls. The number of delays is the
    /// number of polls after the first one, at most
    /// [`MAX_POPULATOR_DELAYS`](crate::state::MAX_POPULATOR_DELAYS).
    pub populator_delays: Vec<Duration>,

    /// The zone of hosted records.
    pub hosted_zone: String,

    /// The zone of populator records.
    pub populator_zone: String,

    /// The number of levels across which email records are
    /// distributed (0 to 3).
    pub email_distribution_levels: usize,

    /// The number of redirects a lookup may follow.
    pub max_redirects: usize,

    /// An optional limit on the duration of a whole lookup, including
    /// redirects and populator polling.
    pub lookup_timeout: Option<Duration>,

    /// Whether to request DNSSEC-validated answers.
    pub dnssec: bool,
}

impl ClientConfig {
    fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            hosted_zone: self.hosted_zone.clone(),
            populator_zone: self.populator_zone.clone(),
            email_distribution_levels: self.email_distribution_levels,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            resolvers: DEFAULT_RESOLVERS
                .iter()
                .filter_map(|(_, url)| Url::parse(url).ok())
                .collect(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            query_deadline: DEFAULT_QUERY_DEADLINE,
            resolver_cooldown: DEFAULT_COOLDOWN,
            populator_delays: DEFAULT_POPULATOR_DELAYS_MS
                .iter()
                .map(|&ms| Duration::from_millis(ms))
                .collect(),
            hosted_zone: DEFAULT_ZONE.to_owned(),
            populator_zone: DEFAULT_ZONE.to_owned(),
            email_distribution_levels: 0,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            lookup_timeout: None,
            dnssec: false,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// INTERPRETERS                                                       //
////////////////////////////////////////////////////////////////////////

/// Turns the text of a NUM record into structured data.
///
/// The record language itself is not implemented by this crate. Any
/// function or closure with the signature of
/// [`interpret`](Self::interpret) is an interpreter.
pub trait Interpreter: Send + Sync {
    fn interpret(
        &self,
        payload: &str,
        module: u32,
        user_variables: &HashMap<String, String>,
    ) -> Result<Value, InterpretError>;
}

impl<F> Interpreter for F
where
    F: Fn(&str, u32, &HashMap<String, String>) -> Result<Value, InterpretError> + Send + Sync,
{
    fn interpret(
        &self,
        payload: &str,
        module: u32,
        user_variables: &HashMap<String, String>,
    ) -> Result<Value, InterpretError> {
        self(payload, module, user_variables)
    }
}

/// An [`Interpreter`] that returns the record text as a JSON string.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughInterpreter;

impl Interpreter for PassthroughInterpreter {
    fn interpret(
        &self,
        payload: &str,
        _module: u32,
        _user_variables: &HashMap<String, String>,
    ) -> Result<Value, InterpretError> {
        Ok(Value::String(payload.to_owned()))
    }
}

/// An error reported by an [`Interpreter`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InterpretError(pub String);

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InterpretError {}

/// The result of one pass over the query locations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// A record was found.
    Record(String),

    /// The record found redirects the lookup elsewhere.
    Redirect(String),

    /// The lookup failed.
    Error(Error),
}

/// Returns the redirect target of an interpreted record, if it has one.
fn redirect_target(value: &Value) -> Option<&str> {
    value.get(REDIRECT_KEY)?.as_str()
}

/// Returns the status of an interpreted populator record, if it is
/// one.
fn populator_status(value: &Value) -> Option<PopulatorStatus> {
    let code = value.get("status")?.get("code")?.as_i64()?;
    PopulatorStatus::try_from(code).ok()
}

////////////////////////////////////////////////////////////////////////
// THE CLIENT                                                         //
////////////////////////////////////////////////////////////////////////

/// Looks up NUM records.
///
/// A `Client` may serve any number of concurrent lookups. The resolver
/// pool, whose circuit breakers all lookups share, is the only state
/// not owned by a lookup's [`Context`].
pub struct Client<H> {
    dns: DnsClient<H>,
    interpreter: Box<dyn Interpreter>,
    config: ClientConfig,
}

impl<H: HttpClient> Client<H> {
    /// Creates a client that makes its requests with `http`, using the
    /// [`PassthroughInterpreter`].
    pub fn new(http: H, config: ClientConfig) -> Self {
        let pool = Arc::new(ResolverPool::from_urls(
            config.resolvers.iter().cloned(),
            config.resolver_cooldown,
        ));
        Self::with_pool(http, config, pool)
    }

    /// Creates a client that uses an existing resolver pool, ignoring
    /// the resolvers and cooldown of `config`.
    pub fn with_pool(http: H, config: ClientConfig, pool: Arc<ResolverPool>) -> Self {
        Self {
            dns: DnsClient::new(http, pool, config.query_timeout)
                .with_deadline(config.query_deadline),
            interpreter: Box::new(PassthroughInterpreter),
            config,
        }
    }

    /// Replaces the record interpreter.
    pub fn with_interpreter(mut self, interpreter: impl Interpreter + 'static) -> Self {
        self.interpreter = Box::new(interpreter);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dns(&self) -> &DnsClient<H> {
        &self.dns
    }

    /// Creates the context for looking up `address`.
    pub fn create_context(&self, address: Address) -> Result<Context, Error> {
        Context::new(
            address,
            self.config.generator_config(),
            self.config.max_redirects,
            self.config.dnssec,
        )
    }

    /// Looks up the record of `context`'s address, following redirects,
    /// and returns its text. The record is also left in the context.
    pub async fn resolve_record(&self, context: &mut Context) -> Result<String, Error> {
        let Some(limit) = self.config.lookup_timeout else {
            return self.resolve_with_redirects(context).await;
        };
        match tokio::time::timeout(limit, self.resolve_with_redirects(context)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Lookup of {} timed out after {:?}.", context.address(), limit);
                context.fail();
                Err(Error::LookupTimedOut)
            }
        }
    }

    /// Creates a context for `address` and resolves its record.
    pub async fn lookup(&self, address: Address) -> Result<String, Error> {
        let mut context = self.create_context(address)?;
        self.resolve_record(&mut context).await
    }

    /// Interprets a record found for `context`.
    pub fn interpret(&self, payload: &str, context: &Context) -> Result<Value, Error> {
        self.interpreter
            .interpret(payload, context.module(), &context.user_variables)
            .map_err(Error::from)
    }

    async fn resolve_with_redirects(&self, context: &mut Context) -> Result<String, Error> {
        let mut start = Location::Independent;
        loop {
            let outcome = match self.run_lookup(context, start).await {
                Ok(outcome) => outcome,
                Err(e) => Outcome::Error(e),
            };
            match outcome {
                Outcome::Record(record) => {
                    info!(
                        "Found the record of {} at the {} location.",
                        context.address(),
                        context.location(),
                    );
                    return Ok(record);
                }
                Outcome::Redirect(target) => start = context.handle_query_redirect(&target)?,
                Outcome::Error(e) => {
                    context.fail();
                    return Err(e);
                }
            }
        }
    }

    /// Makes one pass over the query locations, beginning at `start`.
    async fn run_lookup(&self, context: &mut Context, start: Location) -> Result<Outcome, Error> {
        let mut machine =
            LookupLocationStateMachine::with_delays(&self.config.populator_delays)?.starting_at(start);

        while !machine.is_complete() {
            let location = machine.location();
            context.set_location(location);
            let input = match location {
                Location::Independent => {
                    let name = context.queries().independent_location().to_owned();
                    self.query_record(&name, context).await
                }
                Location::Hosted => {
                    let name = context.queries().hosted_location().to_owned();
                    self.query_record(&name, context).await
                }
                Location::Populator => match context.queries().populator_location().map(str::to_owned) {
                    Some(name) => self.query_populator(&name, context).await,
                    None => {
                        debug!("{} has no populator location.", context.address());
                        Ok(StepInput::Populator(PopulatorStatus::Absent))
                    }
                },
                Location::None => break,
            };

            let input = match input {
                Ok(input) => input,
                Err(outcome) => return Ok(outcome),
            };
            let found_at = machine.step(input).await?;
            if machine.is_success() {
                context.set_location(found_at);
            }
        }

        if machine.is_success() {
            match context.result() {
                Some(record) => Ok(Outcome::Record(record.to_owned())),
                None => Ok(Outcome::Error(Error::NoRecordFound)),
            }
        } else {
            Ok(Outcome::Error(Error::NoRecordFound))
        }
    }

    /// Queries a record location. A record that redirects ends the pass
    /// with [`Outcome::Redirect`].
    async fn query_record(&self, name: &str, context: &mut Context) -> Result<StepInput, Outcome> {
        let Some(record) = self.fetch(name, context).await else {
            return Ok(StepInput::NotFound);
        };
        let value = self.interpret(&record, context).map_err(Outcome::Error)?;
        if let Some(target) = redirect_target(&value) {
            return Err(Outcome::Redirect(target.to_owned()));
        }
        context.set_result(Some(record));
        Ok(StepInput::Found)
    }

    /// Queries the populator location. The populator answers with a
    /// status record while it works, and with a redirect or the record
    /// itself once done.
    async fn query_populator(
        &self,
        name: &str,
        context: &mut Context,
    ) -> Result<StepInput, Outcome> {
        let Some(record) = self.fetch(name, context).await else {
            return Ok(StepInput::NotFound);
        };
        let value = self.interpret(&record, context).map_err(Outcome::Error)?;
        if let Some(target) = redirect_target(&value) {
            return Err(Outcome::Redirect(target.to_owned()));
        }
        if let Some(status) = populator_status(&value) {
            debug!("Populator status for {}: {:?}.", name, status);
            return Ok(StepInput::Populator(status));
        }
        context.set_result(Some(record));
        Ok(StepInput::Found)
    }

    /// Fetches the record at `name`. DNS failures are logged and treated
    /// as the absence of a record.
    async fn fetch(&self, name: &str, context: &Context) -> Option<String> {
        match self.dns.get_record_from_dns(name, context.dnssec()).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to query {}: {}.", name, e);
                None
            }
        }
    }
}

impl<H> fmt::Debug for Client<H> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
