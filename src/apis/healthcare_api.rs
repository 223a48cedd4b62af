use crate::constants::{CASES_RESOURCE, VACCINATIONS_RESOURCE};
use crate::error::Result;
use crate::metrics;
use crate::types::{DataSource, RawRecord};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

/// Blocking client for the healthcare records API.
///
/// Each fetch is a single GET against `{base_url}/{resource}`. Failures are
/// logged and reported as an empty collection.
pub struct HealthcareApiClient {
    client: Client,
    base_url: String,
}

impl HealthcareApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("HealthcareApiClient initialized with base URL: {}", base_url);
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resource_url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    #[instrument(skip(self))]
    fn fetch_resource(&self, resource: &str) -> Vec<RawRecord> {
        match self.try_fetch_resource(resource) {
            Ok(Some(records)) => {
                info!("Successfully fetched {} {} records", records.len(), resource);
                metrics::record_fetch(resource, "success", records.len());
                records
            }
            Ok(None) => {
                metrics::record_fetch(resource, "rejected", 0);
                Vec::new()
            }
            Err(e) => {
                error!("Error fetching {}: {}", resource, e);
                metrics::record_fetch(resource, "error", 0);
                Vec::new()
            }
        }
    }

    /// `Ok(None)` when the server answered but not with a usable payload
    fn try_fetch_resource(&self, resource: &str) -> Result<Option<Vec<RawRecord>>> {
        let url = self.resource_url(resource);
        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            warn!(
                "Failed to fetch {}. Status code: {}",
                resource,
                status.as_u16()
            );
            return Ok(None);
        }

        let body: Value = response.json()?;
        match body {
            Value::Array(records) => Ok(Some(records)),
            other => {
                warn!(
                    "Expected a JSON array from {}, got {}",
                    url,
                    json_kind(&other)
                );
                Ok(None)
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl DataSource for HealthcareApiClient {
    fn source_name(&self) -> &str {
        &self.base_url
    }

    fn fetch_cases(&self) -> Vec<RawRecord> {
        self.fetch_resource(CASES_RESOURCE)
    }

    fn fetch_vaccinations(&self) -> Vec<RawRecord> {
        self.fetch_resource(VACCINATIONS_RESOURCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = HealthcareApiClient::new("http://localhost:3000/api/");
        assert_eq!(client.base_url(), "http://localhost:3000/api");
        assert_eq!(
            client.resource_url(CASES_RESOURCE),
            "http://localhost:3000/api/cases"
        );
        assert_eq!(
            client.resource_url(VACCINATIONS_RESOURCE),
            "http://localhost:3000/api/vaccinations"
        );
    }

    #[test]
    fn test_connection_refused_yields_empty() {
        // Port 1 is reserved and nothing listens there
        let client = HealthcareApiClient::new("http://127.0.0.1:1/api");
        assert!(client.fetch_cases().is_empty());
        assert!(client.fetch_vaccinations().is_empty());
    }
}
