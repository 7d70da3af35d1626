//! Query builders for TableClient

use reqwest::Client;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::fetch::Fetch;

/// Builder for SELECT queries
pub struct SelectBuilder {
    url: String,
    key: String,
    client: Client,
    params: Vec<(String, String)>,
}

impl SelectBuilder {
    /// Create a new SelectBuilder selecting all columns
    pub fn new(url: String, key: String, client: Client) -> Self {
        Self {
            url,
            key,
            client,
            params: vec![("select".to_string(), "*".to_string())],
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.params
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Order the results by a column
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    /// Execute the query and return the raw rows
    pub async fn execute(self) -> Result<Vec<Map<String, Value>>, Error> {
        let mut fetch = Fetch::get(&self.client, &self.url).api_key(&self.key);
        for (key, value) in &self.params {
            fetch = fetch.query(key, value);
        }

        fetch.execute::<Vec<Map<String, Value>>>().await
    }
}

/// Builder for INSERT queries
pub struct InsertBuilder {
    url: String,
    key: String,
    values: Value,
    client: Client,
}

impl InsertBuilder {
    /// Create a new InsertBuilder
    pub fn new(url: String, key: String, values: Value, client: Client) -> Self {
        Self {
            url,
            key,
            values,
            client,
        }
    }

    /// Execute the insert without returning the inserted row
    pub async fn execute(self) -> Result<(), Error> {
        Fetch::post(&self.client, &self.url)
            .api_key(&self.key)
            .header("Prefer", "return=minimal")
            .json(&self.values)?
            .execute_empty()
            .await
    }
}

/// Builder for PATCH (partial update) queries
pub struct UpdateBuilder {
    url: String,
    key: String,
    values: Value,
    client: Client,
    params: Vec<(String, String)>,
}

impl UpdateBuilder {
    /// Create a new UpdateBuilder
    pub fn new(url: String, key: String, values: Value, client: Client) -> Self {
        Self {
            url,
            key,
            values,
            client,
            params: Vec::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.params
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Execute the update without returning the updated rows
    pub async fn execute(self) -> Result<(), Error> {
        let mut fetch = Fetch::patch(&self.client, &self.url)
            .api_key(&self.key)
            .header("Prefer", "return=minimal")
            .json(&self.values)?;
        for (key, value) in &self.params {
            fetch = fetch.query(key, value);
        }

        fetch.execute_empty().await
    }
}

/// Builder for DELETE queries
pub struct DeleteBuilder {
    url: String,
    key: String,
    client: Client,
    params: Vec<(String, String)>,
}

impl DeleteBuilder {
    /// Create a new DeleteBuilder
    pub fn new(url: String, key: String, client: Client) -> Self {
        Self {
            url,
            key,
            client,
            params: Vec::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.params
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Execute the delete without returning the deleted rows
    pub async fn execute(self) -> Result<(), Error> {
        let mut fetch = Fetch::delete(&self.client, &self.url)
            .api_key(&self.key)
            .header("Prefer", "return=minimal");
        for (key, value) in &self.params {
            fetch = fetch.query(key, value);
        }

        fetch.execute_empty().await
    }
}
