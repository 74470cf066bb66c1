//! Application state wiring all services together.
//!
//! Services are generic over repository, provider factory and persona source
//! traits; AppState pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parley_core::chat::service::{ChatService, TurnOptions};
use parley_core::persona::service::PersonaService;
use parley_core::secret::service::SecretService;
use parley_core::settings::service::SettingsService;
use parley_infra::config::{load_global_config, resolve_data_dir};
use parley_infra::crypto::vault::{KEY_FILE_NAME, VaultCrypto};
use parley_infra::llm::ParleyProviderFactory;
use parley_infra::persona::HttpPersonaSource;
use parley_infra::secret::VaultSecretProvider;
use parley_infra::secret::chain::build_secret_chain;
use parley_infra::sqlite::chat::SqliteChatRepository;
use parley_infra::sqlite::pool::{DATABASE_FILE, DatabasePool};
use parley_infra::sqlite::secret::SqliteSecretRepository;
use parley_infra::sqlite::settings::SqliteSettingsRepository;
use parley_types::config::GlobalConfig;

/// When set, the vault key is derived from this passphrase instead of the key file.
pub const VAULT_PASSPHRASE_ENV: &str = "PARLEY_VAULT_PASSPHRASE";

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteChatService =
    ChatService<SqliteChatRepository, ParleyProviderFactory, HttpPersonaSource>;

pub type ConcreteSettingsService = SettingsService<SqliteSettingsRepository>;

pub type ConcretePersonaService = PersonaService<HttpPersonaSource>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub settings_service: Arc<ConcreteSettingsService>,
    pub persona_service: Arc<ConcretePersonaService>,
    pub secret_service: Arc<SecretService>,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, open the database, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let db_pool = DatabasePool::open(&data_dir.join(DATABASE_FILE)).await?;

        let vault_crypto = match std::env::var(VAULT_PASSPHRASE_ENV) {
            Ok(passphrase) if !passphrase.is_empty() => VaultCrypto::from_passphrase(&passphrase)?,
            _ => VaultCrypto::from_key_file(&data_dir.join(KEY_FILE_NAME))?,
        };
        let vault_provider =
            VaultSecretProvider::new(SqliteSecretRepository::new(db_pool.clone()), vault_crypto);
        let secret_service = Arc::new(SecretService::new(build_secret_chain(vault_provider, true)));

        let persona_service = Arc::new(PersonaService::new(
            HttpPersonaSource::new(timeout),
            config.persona.clone(),
        ));

        let settings_service = SettingsService::new(
            SqliteSettingsRepository::new(db_pool.clone()),
            config.default_provider,
        );

        let chat_service = ChatService::new(
            SqliteChatRepository::new(db_pool),
            ParleyProviderFactory::new(timeout),
            Arc::clone(&persona_service),
            Arc::clone(&secret_service),
            TurnOptions::from(&config),
        );

        tracing::debug!(data_dir = %data_dir.display(), "Application state ready");

        Ok(Self {
            chat_service: Arc::new(chat_service),
            settings_service: Arc::new(settings_service),
            persona_service,
            secret_service,
            config,
            data_dir,
        })
    }
}
