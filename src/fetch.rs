//! HTTP request helper for PostgREST endpoints

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::error::Error;

/// Helper for building and executing HTTP requests against a PostgREST
/// endpoint. Every request authenticates with the `apikey` header and a
/// bearer token carrying the same key.
pub struct FetchBuilder<'a> {
    client: &'a Client,
    url: String,
    method: Method,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl<'a> FetchBuilder<'a> {
    /// Create a new FetchBuilder
    pub fn new(client: &'a Client, url: &str, method: Method) -> Self {
        Self {
            client,
            url: url.to_string(),
            method,
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            body: None,
        }
    }

    /// Add a header to the request
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Authenticate with a static API key: sets both the `apikey` header
    /// and an `Authorization: Bearer` header carrying the same key
    pub fn api_key(self, key: &str) -> Self {
        self.header("apikey", key)
            .header("Authorization", &format!("Bearer {}", key))
    }

    /// Append a query parameter to the request
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query_params.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        let json = serde_json::to_vec(body)?;
        self.body = Some(json);
        self = self.header("Content-Type", "application/json");
        Ok(self)
    }

    /// Build the request
    fn build(&self) -> Result<RequestBuilder, Error> {
        let mut url = Url::parse(&self.url)?;

        {
            let mut query_pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                query_pairs.append_pair(key, value);
            }
        }

        let mut req = self.client.request(self.method.clone(), url.as_str());
        req = req.headers(self.headers.clone());

        if let Some(body) = &self.body {
            req = req.body(body.clone());
        }

        Ok(req)
    }

    /// Execute the request and parse the response as JSON
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let response = self.build()?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::rejected(status, text));
        }

        let result = response.json::<T>().await?;
        Ok(result)
    }

    /// Execute the request, discarding the response body. Used for writes
    /// issued with `Prefer: return=minimal`.
    pub async fn execute_empty(&self) -> Result<(), Error> {
        let response = self.build()?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::rejected(status, text));
        }

        Ok(())
    }
}

/// Helper for creating HTTP requests
pub struct Fetch;

impl Fetch {
    /// Create a GET request
    pub fn get<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::GET)
    }

    /// Create a POST request
    pub fn post<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::POST)
    }

    /// Create a PATCH request
    pub fn patch<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::PATCH)
    }

    /// Create a DELETE request
    pub fn delete<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::DELETE)
    }
}
