use crate::config::BackendConfig;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// REST table client for the hosted backend
#[derive(Clone)]
pub struct BackendClient {
  http: reqwest::Client,
  base_url: Url,
  api_key: String,
}

impl BackendClient {
  pub fn new(config: &BackendConfig, api_key: &str) -> Result<Self> {
    let base_url =
      Url::parse(&config.url).map_err(|e| eyre!("Invalid backend url {}: {}", config.url, e))?;

    let mut headers = HeaderMap::new();
    for (name, value) in Self::auth_header_pairs(api_key) {
      let value = HeaderValue::from_str(&value)
        .map_err(|e| eyre!("Invalid value for header {}: {}", name, e))?;
      headers.insert(name, value);
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("prefer", HeaderValue::from_static("return=minimal"));

    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(secs) = config.request_timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }
    let http = builder
      .build()
      .map_err(|e| eyre!("Failed to create backend client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      api_key: api_key.to_string(),
    })
  }

  fn auth_header_pairs(api_key: &str) -> [(&'static str, String); 2] {
    [
      ("apikey", api_key.to_string()),
      ("authorization", format!("Bearer {}", api_key)),
    ]
  }

  /// Headers a plain fetch must carry to reach the backend
  pub fn auth_headers(&self) -> Vec<(String, String)> {
    Self::auth_header_pairs(&self.api_key)
      .into_iter()
      .map(|(name, value)| (name.to_string(), value))
      .collect()
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Resolve a path (with optional query) against the backend base url
  pub fn url(&self, path: &str) -> Result<Url> {
    self
      .base_url
      .join(path)
      .map_err(|e| eyre!("Invalid backend path {}: {}", path, e))
  }

  fn table_url(&self, table: &str) -> Result<Url> {
    self.url(&format!("/rest/v1/{}", table))
  }

  /// Insert a row into a table
  pub async fn insert(&self, table: &str, row: &Value) -> Result<()> {
    let url = self.table_url(table)?;

    self
      .http
      .post(url)
      .json(row)
      .send()
      .await
      .map_err(|e| eyre!("Failed to insert into {}: {}", table, e))?
      .error_for_status()
      .map_err(|e| eyre!("Backend rejected insert into {}: {}", table, e))?;

    Ok(())
  }

  /// Patch the row whose `id` column equals `id`
  pub async fn update_by_id(&self, table: &str, id: &str, changes: &Value) -> Result<()> {
    let mut url = self.table_url(table)?;
    url
      .query_pairs_mut()
      .append_pair("id", &format!("eq.{}", id));

    self
      .http
      .patch(url)
      .json(changes)
      .send()
      .await
      .map_err(|e| eyre!("Failed to update {} {}: {}", table, id, e))?
      .error_for_status()
      .map_err(|e| eyre!("Backend rejected update of {} {}: {}", table, id, e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_json, header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client_for(server: &MockServer) -> BackendClient {
    let config = BackendConfig {
      url: server.uri(),
      request_timeout_secs: Some(5),
    };
    BackendClient::new(&config, "test-key").unwrap()
  }

  #[tokio::test]
  async fn test_insert_sends_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/offers"))
      .and(header("apikey", "test-key"))
      .and(header("authorization", "Bearer test-key"))
      .and(body_json(json!({ "amount": 100 })))
      .respond_with(ResponseTemplate::new(201))
      .expect(1)
      .mount(&server)
      .await;

    client_for(&server)
      .insert("offers", &json!({ "amount": 100 }))
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_update_filters_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
      .and(path("/rest/v1/profiles"))
      .and(query_param("id", "eq.u1"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    client_for(&server)
      .update_by_id("profiles", "u1", &json!({ "full_name": "Thandi" }))
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_error_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let result = client_for(&server).insert("offers", &json!({})).await;
    assert!(result.is_err());
  }

  #[test]
  fn test_auth_headers() {
    let config = BackendConfig {
      url: "https://demo.supabase.co".to_string(),
      request_timeout_secs: None,
    };
    let client = BackendClient::new(&config, "k").unwrap();
    let headers = client.auth_headers();
    assert!(headers.contains(&("apikey".to_string(), "k".to_string())));
    assert!(headers.contains(&("authorization".to_string(), "Bearer k".to_string())));
  }
}
