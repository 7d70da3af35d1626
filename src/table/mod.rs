//! Remote table access through the PostgREST API

mod query;

use reqwest::Client;
use serde_json::Value;

use crate::error::Error;
use crate::model::ConnectionDescriptor;

pub use query::*;

/// Client for one remote table of one connected application.
///
/// All requests carry the application's static API key as both the
/// `apikey` header and a bearer token; writes are issued with
/// `Prefer: return=minimal`. There is no retry and no backoff — a failed
/// call surfaces as an error and the next poll cycle tries again.
pub struct TableClient {
    /// The REST base URL of the connected application
    base_url: String,

    /// The application's static API key
    key: String,

    /// The table name
    table: String,

    /// HTTP client
    client: Client,
}

impl TableClient {
    /// Create a new TableClient
    pub fn new(base_url: &str, key: &str, table: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            table: table.to_string(),
            client,
        }
    }

    /// Create a TableClient for one of a descriptor's tables. Fails when
    /// the descriptor has no API key or no resolvable base URL.
    pub fn for_descriptor(
        desc: &ConnectionDescriptor,
        table: &str,
        client: Client,
    ) -> Result<Self, Error> {
        let base_url = desc
            .base_url()
            .ok_or_else(|| Error::config_invalid(format!("connection '{}' has no base URL", desc.name)))?;
        let key = desc
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::config_invalid(format!("connection '{}' has no API key", desc.name)))?;

        Ok(Self::new(&base_url, key, table, client))
    }

    /// Get the endpoint URL for REST requests against this table
    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    /// Select all columns from the table
    pub fn select(&self) -> SelectBuilder {
        SelectBuilder::new(self.endpoint(), self.key.clone(), self.client.clone())
    }

    /// Insert a row into the table
    pub fn insert(&self, values: Value) -> InsertBuilder {
        InsertBuilder::new(self.endpoint(), self.key.clone(), values, self.client.clone())
    }

    /// Partially update rows in the table
    pub fn patch(&self, values: Value) -> UpdateBuilder {
        UpdateBuilder::new(self.endpoint(), self.key.clone(), values, self.client.clone())
    }

    /// Delete rows from the table
    pub fn delete(&self) -> DeleteBuilder {
        DeleteBuilder::new(self.endpoint(), self.key.clone(), self.client.clone())
    }
}
