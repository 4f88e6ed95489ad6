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

//! The pool of DNS-over-HTTPS resolvers, with circuit breaking.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::warn;
use tokio::time::Instant;
use url::Url;

/// The resolvers used when none are configured.
pub const DEFAULT_RESOLVERS: [(&str, &str); 2] = [
    ("google", "https://dns.google/resolve"),
    ("cloudflare", "https://cloudflare-dns.com/dns-query"),
];

/// The default time a failing resolver is left unused.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

////////////////////////////////////////////////////////////////////////
// RESOLVERS                                                          //
////////////////////////////////////////////////////////////////////////

/// A named DNS-over-HTTPS endpoint.
///
/// A resolver that fails is circuit-broken: it records an instant
/// before which it is not used. Only that instant ever changes, and it
/// is guarded by a mutex, so a `Resolver` may be shared freely between
/// concurrent lookups.
pub struct Resolver {
    name: String,
    url: Url,
    inactive_until: Mutex<Option<Instant>>,
}

impl Resolver {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
            inactive_until: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns whether the resolver may be used at `now`.
    pub fn is_active_at(&self, now: Instant) -> bool {
        let inactive_until = self
            .inactive_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        inactive_until.map_or(true, |until| now >= until)
    }

    /// Takes the resolver out of use for `cooldown`. A cooldown that
    /// ends earlier than one already in force does not shorten it.
    pub fn deactivate_for(&self, cooldown: Duration) {
        let until = Instant::now() + cooldown;
        let mut inactive_until = self
            .inactive_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if inactive_until.map_or(true, |current| current < until) {
            *inactive_until = Some(until);
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("name", &self.name)
            .field("url", &self.url.as_str())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// RESOLVER POOLS                                                     //
////////////////////////////////////////////////////////////////////////

/// An ordered pool of resolvers. Queries use the first active resolver
/// and fail over to the following ones.
#[derive(Debug)]
pub struct ResolverPool {
    resolvers: Vec<Resolver>,
    cooldown: Duration,
}

impl ResolverPool {
    pub fn new(resolvers: Vec<Resolver>, cooldown: Duration) -> Self {
        Self {
            resolvers,
            cooldown,
        }
    }

    /// Creates a pool of the resolvers at `urls`, named by their hosts.
    pub fn from_urls(urls: impl IntoIterator<Item = Url>, cooldown: Duration) -> Self {
        let resolvers = urls
            .into_iter()
            .map(|url| Resolver::new(url.host_str().unwrap_or("resolver").to_owned(), url))
            .collect();
        Self::new(resolvers, cooldown)
    }

    /// Returns the resolvers currently in use, in order.
    pub fn active(&self) -> impl Iterator<Item = &Resolver> {
        let now = Instant::now();
        self.resolvers.iter().filter(move |r| r.is_active_at(now))
    }

    /// Circuit-breaks `resolver` for the pool's cooldown.
    pub fn deactivate(&self, resolver: &Resolver) {
        warn!(
            "Resolver {} failed; not using it for {:?}.",
            resolver.name(),
            self.cooldown,
        );
        resolver.deactivate_for(self.cooldown);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl Default for ResolverPool {
    fn default() -> Self {
        let resolvers = DEFAULT_RESOLVERS
            .iter()
            .filter_map(|&(name, url)| Some(Resolver::new(name, Url::parse(url).ok()?)))
            .collect();
        Self::new(resolvers, DEFAULT_COOLDOWN)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ResolverPool {
        ResolverPool::from_urls(
            [
                Url::parse("https://one.test/resolve").unwrap(),
                Url::parse("https://two.test/resolve").unwrap(),
            ],
            Duration::from_secs(10),
        )
    }

    #[test]
    fn default_pool_has_the_default_resolvers() {
        let pool = ResolverPool::default();
        let names: Vec<_> = pool.active().map(Resolver::name).collect();
        assert_eq!(names, ["google", "cloudflare"]);
    }

    #[tokio::test(start_paused = true)]
    async fn deactivated_resolvers_return_after_the_cooldown() {
        let pool = pool();
        let first = pool.active().next().unwrap();
        pool.deactivate(first);
        let names: Vec<_> = pool.active().map(Resolver::name).collect();
        assert_eq!(names, ["two.test"]);

        tokio::time::advance(Duration::from_secs(10)).await;
        let names: Vec<_> = pool.active().map(Resolver::name).collect();
        assert_eq!(names, ["one.test", "two.test"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shorter_cooldowns_do_not_shorten_longer_ones() {
        let resolver = Resolver::new("r", Url::parse("https://r.test/").unwrap());
        resolver.deactivate_for(Duration::from_secs(60));
        resolver.deactivate_for(Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!resolver.is_active_at(Instant::now()));
    }
}
