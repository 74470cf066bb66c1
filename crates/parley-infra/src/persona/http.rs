//! HTTP persona catalog client.
//!
//! Implements `PersonaSource` over plain GETs: catalogs are JSON arrays of
//! personas, prompts are plain text files.

use std::time::Duration;

use tracing::debug;

use parley_core::persona::source::PersonaSource;
use parley_types::error::PersonaError;
use parley_types::persona::Persona;

/// Fetches persona catalogs and prompt texts over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpPersonaSource {
    http: reqwest::Client,
}

impl HttpPersonaSource {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self { http }
    }

    async fn get_text(&self, url: &str) -> Result<String, PersonaError> {
        let fetch_error = |message: String| PersonaError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {status}")));
        }

        response.text().await.map_err(|e| fetch_error(e.to_string()))
    }
}

/// Parse a catalog body, dropping entries without an id.
pub(crate) fn parse_catalog(body: &str) -> Result<Vec<Persona>, PersonaError> {
    let personas: Vec<Persona> =
        serde_json::from_str(body).map_err(|e| PersonaError::InvalidCatalog(e.to_string()))?;

    Ok(personas
        .into_iter()
        .filter(|p| !p.id.trim().is_empty())
        .collect())
}

impl PersonaSource for HttpPersonaSource {
    async fn fetch_catalog(&self, url: &str) -> Result<Vec<Persona>, PersonaError> {
        let body = self.get_text(url).await?;
        let personas = parse_catalog(&body)?;
        debug!(url, count = personas.len(), "Fetched persona catalog");
        Ok(personas)
    }

    async fn fetch_prompt(&self, url: &str) -> Result<String, PersonaError> {
        if url.trim().is_empty() {
            return Err(PersonaError::Fetch {
                url: url.to_string(),
                message: "persona has no prompt URL".to_string(),
            });
        }
        self.get_text(url).await
    }
}
