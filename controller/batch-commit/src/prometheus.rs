//! Prometheus instant query client

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum PrometheusError {
    #[error("Metrics request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },

    #[error("Metrics endpoint returned error status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid metrics response: {message}")]
    InvalidResponse { message: String },

    #[error("Metrics query failed ({error_type}): {error}")]
    QueryFailed { error_type: String, error: String },

    #[error("Failed to build HTTP client: {source}")]
    Client { source: reqwest::Error },
}

/// Metrics the controller reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricQuery {
    BaseFee,
    SectorStatus,
}

impl MetricQuery {
    pub fn metric_name(&self) -> &'static str {
        match self {
            MetricQuery::BaseFee => "lotus_chain_basefee",
            MetricQuery::SectorStatus => "lotus_miner_sector_status",
        }
    }
}

/// Body of `GET /api/v1/query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryData {
    #[serde(rename = "resultType")]
    pub result_type: String,
    pub result: Vec<Sample>,
}

/// One series of an instant vector: labels plus `[timestamp, "value"]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub metric: BTreeMap<String, String>,
    pub value: (f64, String),
}

impl QueryResponse {
    /// Series of a successful response.
    pub fn samples(&self) -> &[Sample] {
        self.data.as_ref().map(|d| d.result.as_slice()).unwrap_or(&[])
    }
}

pub struct PrometheusClient {
    client: Client,
    base_url: String,
}

impl PrometheusClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PrometheusError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| PrometheusError::Client { source })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self), fields(metric = query.metric_name()))]
    pub fn fetch(&self, query: MetricQuery) -> Result<QueryResponse, PrometheusError> {
        debug!("Querying {} at {}", query.metric_name(), self.base_url);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("query", query.metric_name())])
            .send()
            .map_err(|source| PrometheusError::Request {
                url: self.base_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(PrometheusError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .map_err(|e| PrometheusError::InvalidResponse {
                message: format!("failed to read body: {}", e),
            })?;

        let parsed = parse_response(&body)?;
        debug!(series = parsed.samples().len(), "Query returned");
        Ok(parsed)
    }
}

/// Decodes a query response and surfaces `"status": "error"` bodies.
pub fn parse_response(body: &str) -> Result<QueryResponse, PrometheusError> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|e| PrometheusError::InvalidResponse {
            message: e.to_string(),
        })?;

    if response.status != "success" {
        return Err(PrometheusError::QueryFailed {
            error_type: response
                .error_type
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            error: response
                .error
                .clone()
                .unwrap_or_else(|| format!("status {}", response.status)),
        });
    }

    if response.data.is_none() {
        return Err(PrometheusError::InvalidResponse {
            message: "successful response without data".to_string(),
        });
    }

    Ok(response)
}
