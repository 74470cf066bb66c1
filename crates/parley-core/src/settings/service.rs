//! Settings service: typed access to the active provider, model and
//! response length on top of the key/value repository.

use parley_types::error::RepositoryError;
use parley_types::provider::ApiProvider;
use parley_types::settings::{ChatSettings, ResponseLength};
use tracing::{info, warn};

use super::repository::SettingsRepository;

const KEY_PROVIDER: &str = "active_provider";
const KEY_MODEL: &str = "model";
const KEY_RESPONSE_LENGTH: &str = "response_length";

pub struct SettingsService<S: SettingsRepository> {
    repo: S,
    default_provider: ApiProvider,
}

impl<S: SettingsRepository> SettingsService<S> {
    /// `default_provider` applies until the user picks one explicitly.
    pub fn new(repo: S, default_provider: ApiProvider) -> Self {
        Self {
            repo,
            default_provider,
        }
    }

    /// Load the current settings. Unparseable stored values fall back to defaults.
    pub async fn load(&self) -> Result<ChatSettings, RepositoryError> {
        let provider = match self.repo.get(KEY_PROVIDER).await? {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(value = %raw, error = %e, "Ignoring stored provider");
                self.default_provider
            }),
            None => self.default_provider,
        };

        let response_length = match self.repo.get(KEY_RESPONSE_LENGTH).await? {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(value = %raw, error = %e, "Ignoring stored response length");
                ResponseLength::default()
            }),
            None => ResponseLength::default(),
        };

        let model = self.repo.get(KEY_MODEL).await?;

        Ok(ChatSettings {
            provider,
            model,
            response_length,
        })
    }

    /// Switch the active provider. The model resets to that provider's default.
    pub async fn set_provider(
        &self,
        provider: ApiProvider,
    ) -> Result<ChatSettings, RepositoryError> {
        self.repo.set(KEY_PROVIDER, &provider.to_string()).await?;
        self.repo.set(KEY_MODEL, provider.default_model()).await?;
        info!(%provider, model = provider.default_model(), "Active provider changed");
        self.load().await
    }

    /// Select a model for the active provider.
    ///
    /// Models outside the built-in catalog are accepted with a warning.
    /// A blank model clears the selection.
    pub async fn set_model(&self, model: &str) -> Result<ChatSettings, RepositoryError> {
        let model = model.trim();
        let current = self.load().await?;
        if model.is_empty() {
            self.repo.delete(KEY_MODEL).await?;
        } else {
            if !current.provider.is_known_model(model) {
                warn!(provider = %current.provider, model, "Model is not in the provider catalog");
            }
            self.repo.set(KEY_MODEL, model).await?;
        }
        self.load().await
    }

    pub async fn set_response_length(
        &self,
        length: ResponseLength,
    ) -> Result<ChatSettings, RepositoryError> {
        self.repo
            .set(KEY_RESPONSE_LENGTH, &length.to_string())
            .await?;
        self.load().await
    }
}
