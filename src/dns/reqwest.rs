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

//! An [`HttpClient`] implemented on `reqwest`.

use std::time::Duration;

use reqwest::header::ACCEPT;
use url::Url;

use super::{HttpClient, HttpError, HttpResponse, DNS_JSON_MEDIA_TYPE};

/// An [`HttpClient`] backed by a [`reqwest::Client`], which pools
/// connections to the resolvers.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Creates a client with the crate's user agent.
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("numlookup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<HttpResponse, HttpError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, DNS_JSON_MEDIA_TYPE)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| HttpError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError(e.to_string()))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
