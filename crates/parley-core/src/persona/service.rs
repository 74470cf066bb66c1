//! Persona service with lazily-fetched, cached catalogs.
//!
//! The official and custom catalogs are each fetched once and cached. A
//! failed fetch is logged and cached as an empty list until `refresh`.
//! Prompt texts are fetched on first use of a persona and cached by id.

use std::collections::HashMap;

use parley_types::config::PersonaConfig;
use parley_types::error::PersonaError;
use parley_types::persona::{CatalogPersona, Persona, PersonaOrigin};
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::source::PersonaSource;

#[derive(Default)]
struct PersonaCache {
    official: Option<Vec<Persona>>,
    custom: Option<Vec<Persona>>,
    prompts: HashMap<String, String>,
}

pub struct PersonaService<S: PersonaSource> {
    source: S,
    config: PersonaConfig,
    cache: Mutex<PersonaCache>,
}

impl<S: PersonaSource> PersonaService<S> {
    pub fn new(source: S, config: PersonaConfig) -> Self {
        Self {
            source,
            config,
            cache: Mutex::new(PersonaCache::default()),
        }
    }

    /// Personas from one catalog.
    pub async fn catalog(&self, origin: PersonaOrigin) -> Vec<Persona> {
        let url = match origin {
            PersonaOrigin::Local => return self.config.local.clone(),
            PersonaOrigin::Official => &self.config.official_url,
            PersonaOrigin::Custom => &self.config.custom_url,
        };

        let mut cache = self.cache.lock().await;
        let slot = match origin {
            PersonaOrigin::Official => &mut cache.official,
            _ => &mut cache.custom,
        };

        if let Some(cached) = slot.as_ref() {
            return cached.clone();
        }

        let personas = match self.source.fetch_catalog(url).await {
            Ok(personas) => {
                debug!(%origin, count = personas.len(), "Loaded persona catalog");
                personas
            }
            Err(e) => {
                error!(%origin, error = %e, "Failed to load persona catalog");
                Vec::new()
            }
        };
        *slot = Some(personas.clone());
        personas
    }

    /// Every persona, official first, then custom, then local.
    pub async fn list_all(&self) -> Vec<CatalogPersona> {
        let mut all = Vec::new();
        for origin in PersonaOrigin::ALL {
            all.extend(
                self.catalog(origin)
                    .await
                    .into_iter()
                    .map(|persona| CatalogPersona { origin, persona }),
            );
        }
        all
    }

    /// Look up a persona by id, fetching its prompt text if needed.
    ///
    /// Returns `Ok(None)` for unknown ids. A failed prompt fetch is an error.
    pub async fn get_persona(&self, id: &str) -> Result<Option<Persona>, PersonaError> {
        let Some(mut persona) = self
            .list_all()
            .await
            .into_iter()
            .map(|entry| entry.persona)
            .find(|p| p.id == id)
        else {
            return Ok(None);
        };

        if persona.prompt.is_some() || persona.prompt_url.is_empty() {
            return Ok(Some(persona));
        }

        let mut cache = self.cache.lock().await;
        if let Some(prompt) = cache.prompts.get(id) {
            persona.prompt = Some(prompt.clone());
            return Ok(Some(persona));
        }

        let prompt = self.source.fetch_prompt(&persona.prompt_url).await?;
        debug!(persona_id = id, len = prompt.len(), "Fetched persona prompt");
        cache.prompts.insert(id.to_string(), prompt.clone());
        persona.prompt = Some(prompt);
        Ok(Some(persona))
    }

    /// The persona's prompt text; empty for unknown personas.
    pub async fn prompt_for(&self, id: &str) -> Result<String, PersonaError> {
        Ok(self
            .get_persona(id)
            .await?
            .and_then(|p| p.prompt)
            .unwrap_or_default())
    }

    /// Display name for a persona id, falling back to the id itself.
    pub async fn display_name(&self, id: &str) -> String {
        self.list_all()
            .await
            .into_iter()
            .find(|entry| entry.persona.id == id)
            .map(|entry| entry.persona.name)
            .unwrap_or_else(|| id.to_string())
    }

    /// Drop all cached catalogs and prompts.
    pub async fn refresh(&self) {
        *self.cache.lock().await = PersonaCache::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OFFICIAL: &str = "https://personas.test/official.json";
    const CUSTOM: &str = "https://personas.test/custom.json";

    struct FakeSource {
        catalog_calls: AtomicUsize,
        prompt_calls: AtomicUsize,
        fail_custom: bool,
    }

    impl FakeSource {
        fn new(fail_custom: bool) -> Self {
            Self {
                catalog_calls: AtomicUsize::new(0),
                prompt_calls: AtomicUsize::new(0),
                fail_custom,
            }
        }
    }

    fn persona(id: &str, prompt_url: &str) -> Persona {
        Persona {
            id: id.to_string(),
            name: id.to_uppercase(),
            icon_url: String::new(),
            description: String::new(),
            prompt_url: prompt_url.to_string(),
            prompt: None,
        }
    }

    impl PersonaSource for FakeSource {
        async fn fetch_catalog(&self, url: &str) -> Result<Vec<Persona>, PersonaError> {
            self.catalog_calls.fetch_add(1, Ordering::SeqCst);
            match url {
                OFFICIAL => Ok(vec![persona("alice", "https://personas.test/alice.txt")]),
                CUSTOM if self.fail_custom => Err(PersonaError::Fetch {
                    url: url.to_string(),
                    message: "404".to_string(),
                }),
                CUSTOM => Ok(vec![persona("bob", "https://personas.test/bob.txt")]),
                _ => Ok(Vec::new()),
            }
        }

        async fn fetch_prompt(&self, url: &str) -> Result<String, PersonaError> {
            self.prompt_calls.fetch_add(1, Ordering::SeqCst);
            if url.ends_with("bob.txt") {
                return Err(PersonaError::Fetch {
                    url: url.to_string(),
                    message: "timeout".to_string(),
                });
            }
            Ok(format!("prompt from {url}"))
        }
    }

    fn config() -> PersonaConfig {
        let mut local = persona("pirate", "");
        local.prompt = Some("Talk like a pirate.".to_string());
        PersonaConfig {
            official_url: OFFICIAL.to_string(),
            custom_url: CUSTOM.to_string(),
            local: vec![local],
        }
    }

    #[tokio::test]
    async fn test_list_all_orders_catalogs() {
        let service = PersonaService::new(FakeSource::new(false), config());
        let all = service.list_all().await;
        let ids: Vec<(&str, PersonaOrigin)> = all
            .iter()
            .map(|e| (e.persona.id.as_str(), e.origin))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("alice", PersonaOrigin::Official),
                ("bob", PersonaOrigin::Custom),
                ("pirate", PersonaOrigin::Local),
            ]
        );
    }

    #[tokio::test]
    async fn test_catalogs_are_cached() {
        let service = PersonaService::new(FakeSource::new(false), config());
        service.list_all().await;
        service.list_all().await;
        assert_eq!(service.source.catalog_calls.load(Ordering::SeqCst), 2);

        service.refresh().await;
        service.list_all().await;
        assert_eq!(service.source.catalog_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failed_catalog_yields_empty_list() {
        let service = PersonaService::new(FakeSource::new(true), config());
        assert!(service.catalog(PersonaOrigin::Custom).await.is_empty());
        assert_eq!(service.catalog(PersonaOrigin::Official).await.len(), 1);
    }

    #[tokio::test]
    async fn test_get_persona_fetches_prompt_once() {
        let service = PersonaService::new(FakeSource::new(false), config());

        let alice = service.get_persona("alice").await.unwrap().unwrap();
        assert_eq!(
            alice.prompt.as_deref(),
            Some("prompt from https://personas.test/alice.txt")
        );
        service.get_persona("alice").await.unwrap();
        assert_eq!(service.source.prompt_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_persona_uses_inline_prompt() {
        let service = PersonaService::new(FakeSource::new(false), config());
        assert_eq!(service.prompt_for("pirate").await.unwrap(), "Talk like a pirate.");
        assert_eq!(service.source.prompt_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_persona_has_empty_prompt() {
        let service = PersonaService::new(FakeSource::new(false), config());
        assert!(service.get_persona("nobody").await.unwrap().is_none());
        assert_eq!(service.prompt_for("nobody").await.unwrap(), "");
        assert_eq!(service.display_name("nobody").await, "nobody");
    }

    #[tokio::test]
    async fn test_prompt_fetch_failure_is_an_error() {
        let service = PersonaService::new(FakeSource::new(false), config());
        let result = service.prompt_for("bob").await;
        assert!(matches!(result, Err(PersonaError::Fetch { .. })));
    }
}
