// Oracle Provider Service
// HTTP-backed classifier and perplexity oracles

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::OracleScore;
use crate::services::config_store::{AppConfig, ClassifierOracleConfig, PerplexityOracleConfig};
use crate::services::detection::oracle::{ClassifierOracle, OracleError, PerplexityOracle};

const PERPLEXITY_ORACLE_NAME: &str = "perplexity";

#[derive(Debug, Clone, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct PerplexityRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct PerplexityResponse {
    perplexity: Option<f64>,
    loss: Option<f64>,
}

fn build_client(timeout: Duration) -> Result<Client, OracleError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Env var consulted for an oracle's API key, e.g. `VERITEXT_PRIMARY_API_KEY`.
pub fn api_key_env_var(oracle: &str) -> String {
    let normalized: String = oracle
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("VERITEXT_{}_API_KEY", normalized)
}

/// Get an oracle's API key: environment first, then the config file's `apiKeys`.
pub fn resolve_api_key(oracle: &str, config: &AppConfig) -> Option<String> {
    if let Ok(val) = env::var(api_key_env_var(oracle)) {
        let v = val.trim();
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }

    config
        .api_keys
        .get(oracle)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Highest-scoring entry of a text-classification response.
///
/// Accepts `[[{label, score}, ...]]`, `[{label, score}, ...]` or a bare `{label, score}`.
pub fn parse_classification(body: &Value) -> Result<OracleScore, OracleError> {
    let candidates: Vec<&Value> = match body {
        Value::Array(outer) => match outer.first() {
            Some(Value::Array(inner)) => inner.iter().collect(),
            Some(_) => outer.iter().collect(),
            None => Vec::new(),
        },
        Value::Object(_) => vec![body],
        _ => Vec::new(),
    };

    let mut best: Option<OracleScore> = None;
    for candidate in candidates {
        let score: OracleScore = serde_json::from_value(candidate.clone())
            .map_err(|e| OracleError::Malformed(format!("unexpected classification entry: {}", e)))?;
        if best.as_ref().map_or(true, |b| score.confidence > b.confidence) {
            best = Some(score);
        }
    }

    best.ok_or_else(|| OracleError::Malformed("classification response holds no label".to_string()))
}

/// Perplexity from `{"perplexity": x}`, or `exp(loss)` from `{"loss": x}`.
pub fn parse_perplexity(body: &Value) -> Result<f64, OracleError> {
    let parsed: PerplexityResponse = serde_json::from_value(body.clone())
        .map_err(|e| OracleError::Malformed(format!("unexpected perplexity response: {}", e)))?;
    match (parsed.perplexity, parsed.loss) {
        (Some(ppl), _) => Ok(ppl),
        (None, Some(loss)) => Ok(loss.exp()),
        (None, None) => Err(OracleError::Malformed("response has neither perplexity nor loss".to_string())),
    }
}

async fn post_json<T: Serialize>(
    client: &Client,
    url: &str,
    api_key: Option<&str>,
    request: &T,
) -> Result<Value, OracleError> {
    let mut builder = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(request);
    if let Some(key) = api_key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }

    let response = builder.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OracleError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    let text = response.text().await?;
    if text.trim().is_empty() {
        return Err(OracleError::Malformed("empty response body".to_string()));
    }
    serde_json::from_str(&text).map_err(|e| OracleError::Malformed(format!("invalid JSON: {}", e)))
}

/// Text-classification endpoint (Hugging Face inference style).
pub struct HttpClassifierOracle {
    client: Client,
    name: String,
    url: String,
    api_key: Option<String>,
}

impl HttpClassifierOracle {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Ok(Self {
            client: build_client(timeout)?,
            name: name.into(),
            url: url.into(),
            api_key,
        })
    }

    pub fn from_config(
        config: &ClassifierOracleConfig,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Self::new(config.name.clone(), config.url.clone(), api_key, timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ClassifierOracle for HttpClassifierOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify(&self, text: &str) -> Result<OracleScore, OracleError> {
        let start = Instant::now();
        let body = post_json(
            &self.client,
            &self.url,
            self.api_key.as_deref(),
            &ClassifyRequest { inputs: text },
        )
        .await?;
        let score = parse_classification(&body)?;
        debug!(
            oracle = %self.name,
            label = %score.label,
            confidence = score.confidence,
            latency_ms = start.elapsed().as_millis() as u64,
            "classifier.response"
        );
        Ok(score)
    }
}

/// Language-model endpoint returning a document perplexity.
pub struct HttpPerplexityOracle {
    client: Client,
    url: String,
    model: Option<String>,
    api_key: Option<String>,
}

impl HttpPerplexityOracle {
    pub fn new(
        url: impl Into<String>,
        model: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
            model,
            api_key,
        })
    }

    pub fn from_config(
        config: &PerplexityOracleConfig,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Self::new(config.url.clone(), config.model.clone(), api_key, timeout)
    }
}

#[async_trait]
impl PerplexityOracle for HttpPerplexityOracle {
    fn name(&self) -> &str {
        PERPLEXITY_ORACLE_NAME
    }

    async fn score(&self, text: &str) -> Result<f64, OracleError> {
        let start = Instant::now();
        let request = PerplexityRequest {
            text,
            model: self.model.as_deref(),
        };
        let body = post_json(&self.client, &self.url, self.api_key.as_deref(), &request).await?;
        let ppl = parse_perplexity(&body)?;
        debug!(
            perplexity = ppl,
            latency_ms = start.elapsed().as_millis() as u64,
            "perplexity.response"
        );
        Ok(ppl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_classification() {
        let body = json!([[{"label": "Real", "score": 0.12}, {"label": "Fake", "score": 0.88}]]);
        let score = parse_classification(&body).unwrap();
        assert_eq!(score.label, "Fake");
        assert!((score.confidence - 0.88).abs() < 1e-12);
    }

    #[test]
    fn test_parse_flat_classification() {
        let body = json!([{"label": "Human", "score": 0.7}, {"label": "AI", "score": 0.3}]);
        assert_eq!(parse_classification(&body).unwrap().label, "Human");
    }

    #[test]
    fn test_parse_single_object() {
        let body = json!({"label": "LABEL_1", "score": 0.61});
        let score = parse_classification(&body).unwrap();
        assert_eq!(score.label, "LABEL_1");
    }

    #[test]
    fn test_parse_classification_rejects_garbage() {
        assert!(matches!(parse_classification(&json!([])), Err(OracleError::Malformed(_))));
        assert!(matches!(parse_classification(&json!("AI")), Err(OracleError::Malformed(_))));
        assert!(matches!(
            parse_classification(&json!([{"label": "AI"}])),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_perplexity_variants() {
        assert_eq!(parse_perplexity(&json!({"perplexity": 42.5})).unwrap(), 42.5);
        let from_loss = parse_perplexity(&json!({"loss": 2.0})).unwrap();
        assert!((from_loss - 2.0f64.exp()).abs() < 1e-9);
        assert!(parse_perplexity(&json!({"tokens": 12})).is_err());
    }

    #[test]
    fn test_api_key_env_var_name() {
        assert_eq!(api_key_env_var("primary"), "VERITEXT_PRIMARY_API_KEY");
        assert_eq!(api_key_env_var("roberta-openai"), "VERITEXT_ROBERTA_OPENAI_API_KEY");
    }

    #[test]
    fn test_resolve_api_key_from_config() {
        let mut config = AppConfig::default();
        config
            .api_keys
            .insert("veritext-test-only".to_string(), "  hf_secret ".to_string());
        assert_eq!(
            resolve_api_key("veritext-test-only", &config).as_deref(),
            Some("hf_secret")
        );
        assert_eq!(resolve_api_key("veritext-test-missing", &config), None);
    }

    #[test]
    fn test_oracle_creation() {
        let oracle =
            HttpClassifierOracle::new("primary", "http://127.0.0.1:9/classify", None, Duration::from_secs(5))
                .unwrap();
        assert_eq!(oracle.name(), "primary");
        assert!(oracle.url().ends_with("/classify"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let oracle = HttpPerplexityOracle::new(
            "http://127.0.0.1:9/perplexity",
            Some("gpt2".to_string()),
            None,
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(oracle.score("hello").await.is_err());
    }
}
