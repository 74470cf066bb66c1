//! Chat service orchestrating chats, messages, and model turns.
//!
//! ChatService coordinates the ChatRepository, the persona catalog, the
//! secret chain and the provider factory. A model turn inserts a
//! placeholder row, streams the provider's answer into it chunk by chunk,
//! and turns any failure into an error-flagged row instead of an `Err`.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use futures_util::StreamExt;
use parley_types::chat::{
    Chat, ChatMessage, ChatSummary, DEFAULT_CHAT_TITLE, ExportFormat, Sender,
};
use parley_types::config::{GlobalConfig, TitleConfig};
use parley_types::error::{ChatError, RepositoryError};
use parley_types::llm::{CompletionRequest, LlmError, StreamEvent};
use parley_types::provider::ApiProvider;
use parley_types::settings::ChatSettings;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::repository::ChatRepository;
use crate::chat::turn::{TurnEvent, TurnOutcome};
use crate::chat::{export, prompt, title};
use crate::llm::factory::ProviderFactory;
use crate::persona::service::PersonaService;
use crate::persona::source::PersonaSource;
use crate::secret::service::SecretService;

/// Generation parameters shared by every turn.
#[derive(Debug, Clone)]
pub struct TurnOptions {
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub title: TitleConfig,
}

impl From<&GlobalConfig> for TurnOptions {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            title: config.title.clone(),
        }
    }
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self::from(&GlobalConfig::default())
    }
}

/// Orchestrates chat lifecycle and streaming model turns.
///
/// Generic over the repository, provider factory and persona source so
/// parley-core never depends on parley-infra.
pub struct ChatService<C: ChatRepository, F: ProviderFactory, P: PersonaSource> {
    repo: C,
    factory: F,
    personas: Arc<PersonaService<P>>,
    secrets: Arc<SecretService>,
    options: TurnOptions,
}

impl<C: ChatRepository, F: ProviderFactory, P: PersonaSource> ChatService<C, F, P> {
    pub fn new(
        repo: C,
        factory: F,
        personas: Arc<PersonaService<P>>,
        secrets: Arc<SecretService>,
        options: TurnOptions,
    ) -> Self {
        Self {
            repo,
            factory,
            personas,
            secrets,
            options,
        }
    }

    // --- Chat lifecycle ---

    /// Create an empty chat bound to a persona.
    pub async fn create_chat(&self, persona_id: &str) -> Result<Chat, ChatError> {
        let chat = Chat {
            id: Uuid::now_v7(),
            title: DEFAULT_CHAT_TITLE.to_string(),
            persona_id: persona_id.to_string(),
            created_at: Utc::now().trunc_subsecs(3),
        };
        let chat = self.repo.create_chat(&chat).await?;
        info!(chat_id = %chat.id, persona_id, "Chat created");
        Ok(chat)
    }

    /// All chats, newest first.
    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>, ChatError> {
        Ok(self.repo.list_chats().await?)
    }

    pub async fn get_chat(&self, chat_id: &Uuid) -> Result<Chat, ChatError> {
        self.repo
            .get_chat(chat_id)
            .await?
            .ok_or(ChatError::ChatNotFound)
    }

    /// Rename a chat. Blank titles are ignored and reported as `false`.
    pub async fn rename_chat(&self, chat_id: &Uuid, title: &str) -> Result<bool, ChatError> {
        let title = title.trim();
        if title.is_empty() {
            debug!(chat_id = %chat_id, "Ignoring blank chat title");
            return Ok(false);
        }
        self.repo
            .rename_chat(chat_id, title)
            .await
            .map_err(not_found_as(ChatError::ChatNotFound))?;
        info!(chat_id = %chat_id, title, "Chat renamed");
        Ok(true)
    }

    /// Delete a chat together with all of its messages.
    pub async fn delete_chat(&self, chat_id: &Uuid) -> Result<(), ChatError> {
        self.repo
            .delete_chat(chat_id)
            .await
            .map_err(not_found_as(ChatError::ChatNotFound))?;
        info!(chat_id = %chat_id, "Chat deleted");
        Ok(())
    }

    /// Messages of a chat in display order.
    pub async fn history(&self, chat_id: &Uuid) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(self.repo.list_messages(chat_id).await?)
    }

    // --- Messages ---

    /// Append a user message to a chat.
    ///
    /// Blank text is only accepted together with an image.
    pub async fn add_user_message(
        &self,
        chat_id: &Uuid,
        text: &str,
        image_path: Option<String>,
    ) -> Result<ChatMessage, ChatError> {
        if text.trim().is_empty() && image_path.is_none() {
            return Err(ChatError::EmptyMessage);
        }
        let chat = self.get_chat(chat_id).await?;

        let mut message = ChatMessage::user(chat.id, text, image_path);
        message.timestamp = self.next_timestamp(&chat.id).await?;
        self.repo.insert_message(&message).await?;
        debug!(chat_id = %chat.id, message_id = %message.id, "User message saved");
        Ok(message)
    }

    pub async fn delete_message(&self, message_id: &Uuid) -> Result<(), ChatError> {
        self.repo
            .delete_message(message_id)
            .await
            .map_err(not_found_as(ChatError::MessageNotFound))
    }

    /// Edit a message, forking the conversation if it is not the last one.
    ///
    /// Returns `true` when messages after the edited one were removed and
    /// the caller should request a new model turn. Blank or unchanged text
    /// is a no-op.
    pub async fn edit_and_fork(&self, message_id: &Uuid, new_text: &str) -> Result<bool, ChatError> {
        let message = self
            .repo
            .get_message(message_id)
            .await?
            .ok_or(ChatError::MessageNotFound)?;

        if new_text.trim().is_empty() || new_text == message.text {
            return Ok(false);
        }

        let messages = self.repo.list_messages(&message.chat_id).await?;
        let is_last = messages.last().map(|m| m.id) == Some(message.id);

        if is_last {
            self.repo.update_message_text(&message.id, new_text).await?;
            debug!(message_id = %message.id, "Edited last message in place");
            return Ok(false);
        }

        let removed = self
            .repo
            .delete_messages_after(&message.chat_id, message.timestamp)
            .await?;
        self.repo.update_message_text(&message.id, new_text).await?;
        info!(
            chat_id = %message.chat_id,
            message_id = %message.id,
            removed,
            "Forked chat history at edited message"
        );
        Ok(true)
    }

    /// Render a chat transcript for export.
    pub async fn export(&self, chat_id: &Uuid, format: ExportFormat) -> Result<String, ChatError> {
        let chat = self.get_chat(chat_id).await?;
        let messages = self.repo.list_messages(chat_id).await?;
        let persona_name = self.personas.display_name(&chat.persona_id).await;
        export::render_export(&chat, &persona_name, &messages, format)
            .map_err(|e| ChatError::Export(e.to_string()))
    }

    // --- Model turns ---

    /// Answer the latest user message with a streamed model response.
    ///
    /// Progress is reported on `events`. Once the placeholder row exists,
    /// every failure is recorded in that row and reported as
    /// `TurnOutcome::Failed`. `Err` means the chat is missing or the row
    /// itself could not be written. Cancelling before any text arrived
    /// removes the placeholder.
    #[tracing::instrument(
        name = "chat_turn",
        skip(self, settings, events, cancel),
        fields(chat_id = %chat_id, provider = %settings.provider, model = %settings.effective_model())
    )]
    pub async fn send_message(
        &self,
        chat_id: &Uuid,
        settings: &ChatSettings,
        events: UnboundedSender<TurnEvent>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, ChatError> {
        let chat = self.get_chat(chat_id).await?;

        let timestamp = self.next_timestamp(&chat.id).await?;
        let placeholder = ChatMessage::model_placeholder(
            chat.id,
            timestamp,
            settings.provider.to_string(),
            settings.effective_model(),
        );
        let message_id = placeholder.id;
        self.repo.insert_message(&placeholder).await?;
        let _ = events.send(TurnEvent::Started { message_id });

        match self
            .stream_turn(&chat, settings, message_id, &events, &cancel)
            .await
        {
            Ok(StreamedText::Complete(text)) => {
                info!(message_id = %message_id, len = text.len(), "Model turn completed");
                self.maybe_generate_title(&chat, settings.provider, &events)
                    .await;
                Ok(TurnOutcome::Completed { message_id, text })
            }
            Ok(StreamedText::Cancelled(text)) => {
                if text.is_empty() {
                    self.repo.delete_message(&message_id).await?;
                }
                info!(message_id = %message_id, len = text.len(), "Model turn cancelled");
                Ok(TurnOutcome::Cancelled { message_id, text })
            }
            Err(e) => {
                let error = e.to_string();
                warn!(message_id = %message_id, error = %error, "Model turn failed");
                self.repo
                    .mark_message_error(&message_id, &format!("Error: {error}"))
                    .await?;
                let _ = events.send(TurnEvent::Failed {
                    message: error.clone(),
                });
                Ok(TurnOutcome::Failed { message_id, error })
            }
        }
    }

    /// Drop the model's answer(s) to the latest user message and ask again.
    pub async fn retry(
        &self,
        chat_id: &Uuid,
        settings: &ChatSettings,
        events: UnboundedSender<TurnEvent>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, ChatError> {
        let chat = self.get_chat(chat_id).await?;
        let messages = self.repo.list_messages(&chat.id).await?;
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::User)
            .ok_or(ChatError::NoUserMessage)?;
        let removed = self
            .repo
            .delete_messages_after(&chat.id, last_user.timestamp)
            .await?;
        debug!(chat_id = %chat.id, removed, "Cleared previous answer before retry");
        self.send_message(&chat.id, settings, events, cancel).await
    }

    async fn stream_turn(
        &self,
        chat: &Chat,
        settings: &ChatSettings,
        message_id: Uuid,
        events: &UnboundedSender<TurnEvent>,
        cancel: &CancellationToken,
    ) -> Result<StreamedText, ChatError> {
        let messages = self.repo.list_messages(&chat.id).await?;
        let (history, user_message) = prompt::split_for_turn(&messages)?;

        let persona_prompt = self.personas.prompt_for(&chat.persona_id).await?;
        let system = prompt::system_prompt(&persona_prompt, settings.response_length);

        let provider = settings.provider;
        let api_key = self
            .secrets
            .api_key(provider)
            .await?
            .ok_or_else(|| ChatError::MissingApiKey(provider.display_name().to_string()))?;

        let model = settings.effective_model();
        let llm = self.factory.create(provider, model, &api_key)?;

        let request = CompletionRequest {
            model: model.to_string(),
            messages: prompt::build_messages(provider, &history, user_message),
            system: Some(system),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            stream: true,
        };
        debug!(messages = request.messages.len(), "Sending turn request");

        let mut stream = llm.stream(request);
        let mut text = String::new();

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(StreamedText::Cancelled(text)),
                event = stream.next() => event,
            };

            match event {
                None | Some(Ok(StreamEvent::Done)) => break,
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(StreamEvent::TextDelta { text: delta })) => {
                    if delta.is_empty() {
                        continue;
                    }
                    text.push_str(&delta);
                    self.repo.update_message_text(&message_id, &text).await?;
                    let _ = events.send(TurnEvent::Delta { text: delta });
                }
                Some(Ok(StreamEvent::Usage(usage))) => {
                    let _ = events.send(TurnEvent::Usage(usage));
                }
                Some(Ok(StreamEvent::MessageDelta { stop_reason })) => {
                    debug!(?stop_reason, "Stream finishing");
                }
                Some(Ok(StreamEvent::Connected)) => {}
            }
        }

        if text.is_empty() {
            return Err(LlmError::Provider {
                message: "model returned an empty response".to_string(),
            }
            .into());
        }

        Ok(StreamedText::Complete(text))
    }

    /// Give a fresh chat a generated title. Failures are only logged.
    async fn maybe_generate_title(
        &self,
        chat: &Chat,
        provider: ApiProvider,
        events: &UnboundedSender<TurnEvent>,
    ) {
        if !self.options.title.enabled {
            return;
        }
        match self.generate_title_for(chat, provider).await {
            Ok(Some(title)) => {
                info!(chat_id = %chat.id, title = %title, "Chat title generated");
                let _ = events.send(TurnEvent::TitleGenerated { title });
            }
            Ok(None) => {}
            Err(e) => warn!(chat_id = %chat.id, error = %e, "Failed to generate chat title"),
        }
    }

    async fn generate_title_for(
        &self,
        chat: &Chat,
        provider: ApiProvider,
    ) -> Result<Option<String>, ChatError> {
        let messages = self.repo.list_messages(&chat.id).await?;
        if messages.len() > 2 {
            return Ok(None);
        }
        let Some(api_key) = self.secrets.api_key(provider).await? else {
            return Ok(None);
        };

        let model = provider.title_model();
        let llm = self.factory.create(provider, model, &api_key)?;
        let conversation = prompt::conversation_text(&messages);
        let generated = title::generate_title(
            &llm,
            &conversation,
            model,
            self.options.title.language.as_deref(),
        )
        .await?;

        if let Some(title) = &generated {
            self.repo.rename_chat(&chat.id, title).await?;
        }
        Ok(generated)
    }

    /// A timestamp strictly after every message already in the chat.
    async fn next_timestamp(&self, chat_id: &Uuid) -> Result<DateTime<Utc>, ChatError> {
        let now = Utc::now().trunc_subsecs(3);
        let last = self
            .repo
            .list_messages(chat_id)
            .await?
            .last()
            .map(|m| m.timestamp);
        Ok(match last {
            Some(last) if last >= now => last + Duration::milliseconds(1),
            _ => now,
        })
    }
}

enum StreamedText {
    Complete(String),
    Cancelled(String),
}

fn not_found_as(err: ChatError) -> impl FnOnce(RepositoryError) -> ChatError {
    move |e| match e {
        RepositoryError::NotFound => err,
        other => ChatError::Repository(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use parley_types::chat::PLACEHOLDER_TEXT;
    use parley_types::config::PersonaConfig;
    use parley_types::error::PersonaError;
    use parley_types::llm::{
        CompletionResponse, ProviderCapabilities, StopReason, Usage,
    };
    use parley_types::persona::Persona;
    use parley_types::secret::{SecretEntry, SecretSource};
    use parley_types::settings::ResponseLength;
    use tokio::sync::mpsc;

    use crate::llm::box_provider::BoxLlmProvider;
    use crate::llm::provider::LlmProvider;
    use crate::secret::provider::SecretProvider;

    // --- In-memory chat repository ---

    #[derive(Default)]
    struct MemoryChatRepo {
        chats: Mutex<Vec<Chat>>,
        messages: Mutex<Vec<ChatMessage>>,
    }

    impl MemoryChatRepo {
        fn sorted(&self, chat_id: &Uuid) -> Vec<ChatMessage> {
            let mut msgs: Vec<ChatMessage> = self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| &m.chat_id == chat_id)
                .cloned()
                .collect();
            msgs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
            msgs
        }
    }

    impl ChatRepository for MemoryChatRepo {
        async fn create_chat(&self, chat: &Chat) -> Result<Chat, RepositoryError> {
            self.chats.lock().unwrap().push(chat.clone());
            Ok(chat.clone())
        }

        async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
            Ok(self
                .chats
                .lock()
                .unwrap()
                .iter()
                .find(|c| &c.id == chat_id)
                .cloned())
        }

        async fn list_chats(&self) -> Result<Vec<ChatSummary>, RepositoryError> {
            let chats = self.chats.lock().unwrap().clone();
            Ok(chats
                .into_iter()
                .rev()
                .map(|chat| {
                    let message_count = self.sorted(&chat.id).len() as u32;
                    ChatSummary {
                        chat,
                        message_count,
                    }
                })
                .collect())
        }

        async fn rename_chat(&self, chat_id: &Uuid, title: &str) -> Result<(), RepositoryError> {
            let mut chats = self.chats.lock().unwrap();
            let chat = chats
                .iter_mut()
                .find(|c| &c.id == chat_id)
                .ok_or(RepositoryError::NotFound)?;
            chat.title = title.to_string();
            Ok(())
        }

        async fn delete_chat(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
            let mut chats = self.chats.lock().unwrap();
            let before = chats.len();
            chats.retain(|c| &c.id != chat_id);
            if chats.len() == before {
                return Err(RepositoryError::NotFound);
            }
            self.messages
                .lock()
                .unwrap()
                .retain(|m| &m.chat_id != chat_id);
            Ok(())
        }

        async fn insert_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
            self.messages.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn get_message(
            &self,
            message_id: &Uuid,
        ) -> Result<Option<ChatMessage>, RepositoryError> {
            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .find(|m| &m.id == message_id)
                .cloned())
        }

        async fn list_messages(&self, chat_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
            Ok(self.sorted(chat_id))
        }

        async fn update_message_text(
            &self,
            message_id: &Uuid,
            text: &str,
        ) -> Result<(), RepositoryError> {
            let mut msgs = self.messages.lock().unwrap();
            let msg = msgs
                .iter_mut()
                .find(|m| &m.id == message_id)
                .ok_or(RepositoryError::NotFound)?;
            msg.text = text.to_string();
            Ok(())
        }

        async fn mark_message_error(
            &self,
            message_id: &Uuid,
            text: &str,
        ) -> Result<(), RepositoryError> {
            let mut msgs = self.messages.lock().unwrap();
            let msg = msgs
                .iter_mut()
                .find(|m| &m.id == message_id)
                .ok_or(RepositoryError::NotFound)?;
            msg.text = text.to_string();
            msg.is_error = true;
            Ok(())
        }

        async fn delete_message(&self, message_id: &Uuid) -> Result<(), RepositoryError> {
            let mut msgs = self.messages.lock().unwrap();
            let before = msgs.len();
            msgs.retain(|m| &m.id != message_id);
            if msgs.len() == before {
                return Err(RepositoryError::NotFound);
            }
            Ok(())
        }

        async fn delete_messages_after(
            &self,
            chat_id: &Uuid,
            timestamp: DateTime<Utc>,
        ) -> Result<u64, RepositoryError> {
            let mut msgs = self.messages.lock().unwrap();
            let before = msgs.len();
            msgs.retain(|m| !(&m.chat_id == chat_id && m.timestamp > timestamp));
            Ok((before - msgs.len()) as u64)
        }

        async fn count_messages(&self, chat_id: &Uuid) -> Result<u32, RepositoryError> {
            Ok(self.sorted(chat_id).len() as u32)
        }
    }

    // --- Scripted provider ---

    #[derive(Clone)]
    enum Script {
        Events(Vec<Result<StreamEvent, LlmError>>),
        /// Yields one delta and then never finishes.
        Hang(String),
    }

    struct ScriptedProvider {
        script: Script,
        title: Result<String, LlmError>,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
        capabilities: ProviderCapabilities,
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn capabilities(&self) -> &ProviderCapabilities {
            &self.capabilities
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            let content = self.title.clone()?;
            Ok(CompletionResponse {
                id: "title".to_string(),
                content,
                model: request.model.clone(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            })
        }

        fn stream(&self, request: CompletionRequest) -> crate::llm::provider::EventStream {
            self.requests.lock().unwrap().push(request);
            match self.script.clone() {
                Script::Events(events) => Box::pin(futures_util::stream::iter(events)),
                Script::Hang(first) => Box::pin(async_stream::stream! {
                    yield Ok::<_, LlmError>(StreamEvent::TextDelta { text: first });
                    futures_util::future::pending::<()>().await;
                }),
            }
        }
    }

    struct ScriptedFactory {
        script: Script,
        title: Result<String, LlmError>,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
        created: Mutex<Vec<(ApiProvider, String, String)>>,
    }

    impl ProviderFactory for ScriptedFactory {
        fn create(
            &self,
            provider: ApiProvider,
            model: &str,
            api_key: &str,
        ) -> Result<BoxLlmProvider, LlmError> {
            self.created
                .lock()
                .unwrap()
                .push((provider, model.to_string(), api_key.to_string()));
            Ok(BoxLlmProvider::new(ScriptedProvider {
                script: self.script.clone(),
                title: self.title.clone(),
                requests: self.requests.clone(),
                capabilities: ProviderCapabilities {
                    streaming: true,
                    vision: false,
                    max_context_tokens: 128_000,
                    max_output_tokens: 4096,
                },
            }))
        }
    }

    // --- Persona source and secrets ---

    struct StaticPersonas;

    impl PersonaSource for StaticPersonas {
        async fn fetch_catalog(&self, _url: &str) -> Result<Vec<Persona>, PersonaError> {
            Ok(vec![Persona {
                id: "alice".to_string(),
                name: "Alice".to_string(),
                icon_url: String::new(),
                description: String::new(),
                prompt_url: "https://personas.test/alice.txt".to_string(),
                prompt: None,
            }])
        }

        async fn fetch_prompt(&self, _url: &str) -> Result<String, PersonaError> {
            Ok("You are Alice.".to_string())
        }
    }

    struct StaticSecrets(HashMap<String, String>);

    impl SecretProvider for StaticSecrets {
        async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
            Ok(self.0.get(key).cloned())
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), RepositoryError> {
            Err(RepositoryError::Query("read-only".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), RepositoryError> {
            Err(RepositoryError::NotFound)
        }

        async fn list(&self) -> Result<Vec<SecretEntry>, RepositoryError> {
            Ok(self
                .0
                .keys()
                .map(|k| SecretEntry {
                    key: k.clone(),
                    source: SecretSource::Environment,
                    updated_at: None,
                })
                .collect())
        }
    }

    type TestService = ChatService<MemoryChatRepo, ScriptedFactory, StaticPersonas>;

    /// Vault that cannot decrypt anything.
    struct BrokenVault;

    impl SecretProvider for BrokenVault {
        async fn get(&self, _key: &str) -> Result<Option<String>, RepositoryError> {
            Err(RepositoryError::Query("decryption failed".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), RepositoryError> {
            Err(RepositoryError::Query("decryption failed".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), RepositoryError> {
            Err(RepositoryError::NotFound)
        }

        async fn list(&self) -> Result<Vec<SecretEntry>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    fn service_with(
        script: Script,
        title: Result<String, LlmError>,
        keys: &[(&str, &str)],
    ) -> (TestService, Arc<Mutex<Vec<CompletionRequest>>>) {
        let secrets = keys
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        service_with_secrets(script, title, SecretService::new(vec![Arc::new(StaticSecrets(secrets))]))
    }

    fn service_with_secrets(
        script: Script,
        title: Result<String, LlmError>,
        secrets: SecretService,
    ) -> (TestService, Arc<Mutex<Vec<CompletionRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let factory = ScriptedFactory {
            script,
            title,
            requests: requests.clone(),
            created: Mutex::new(Vec::new()),
        };
        let personas = Arc::new(PersonaService::new(StaticPersonas, PersonaConfig {
            official_url: "https://personas.test/official.json".to_string(),
            custom_url: "https://personas.test/custom.json".to_string(),
            local: Vec::new(),
        }));
        let service = ChatService::new(
            MemoryChatRepo::default(),
            factory,
            personas,
            Arc::new(secrets),
            TurnOptions::default(),
        );
        (service, requests)
    }

    fn deltas(parts: &[&str]) -> Script {
        let mut events: Vec<Result<StreamEvent, LlmError>> = vec![Ok(StreamEvent::Connected)];
        events.extend(parts.iter().map(|p| {
            Ok(StreamEvent::TextDelta {
                text: p.to_string(),
            })
        }));
        events.push(Ok(StreamEvent::Usage(Usage {
            input_tokens: 10,
            output_tokens: 5,
        })));
        events.push(Ok(StreamEvent::Done));
        Script::Events(events)
    }

    fn settings() -> ChatSettings {
        ChatSettings {
            provider: ApiProvider::OpenRouter,
            model: None,
            response_length: ResponseLength::Short,
        }
    }

    const KEY: &[(&str, &str)] = &[("OPENROUTER_API_KEY", "or-key")];

    async fn run_turn(service: &TestService, chat_id: &Uuid) -> (TurnOutcome, Vec<TurnEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = service
            .send_message(chat_id, &settings(), tx, CancellationToken::new())
            .await
            .unwrap();
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (outcome, events)
    }

    // --- Tests ---

    #[tokio::test]
    async fn test_create_chat_has_default_title() {
        let (service, _) = service_with(deltas(&[]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        assert_eq!(chat.title, DEFAULT_CHAT_TITLE);
        assert_eq!(chat.persona_id, "alice");
        assert_eq!(service.list_chats().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_ignores_blank_title() {
        let (service, _) = service_with(deltas(&[]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();

        assert!(!service.rename_chat(&chat.id, "   ").await.unwrap());
        assert!(service.rename_chat(&chat.id, "  Trip ").await.unwrap());
        assert_eq!(service.get_chat(&chat.id).await.unwrap().title, "Trip");
    }

    #[tokio::test]
    async fn test_delete_chat_cascades() {
        let (service, _) = service_with(deltas(&[]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "hi", None).await.unwrap();

        service.delete_chat(&chat.id).await.unwrap();
        assert!(service.history(&chat.id).await.unwrap().is_empty());
        assert!(matches!(
            service.delete_chat(&chat.id).await,
            Err(ChatError::ChatNotFound)
        ));
    }

    #[tokio::test]
    async fn test_add_user_message_validation() {
        let (service, _) = service_with(deltas(&[]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();

        assert!(matches!(
            service.add_user_message(&chat.id, "  ", None).await,
            Err(ChatError::EmptyMessage)
        ));
        assert!(
            service
                .add_user_message(&chat.id, "", Some("/tmp/cat.png".to_string()))
                .await
                .is_ok()
        );
        assert!(matches!(
            service.add_user_message(&Uuid::now_v7(), "hi", None).await,
            Err(ChatError::ChatNotFound)
        ));
    }

    #[tokio::test]
    async fn test_messages_get_strictly_increasing_timestamps() {
        let (service, _) = service_with(deltas(&[]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        for i in 0..5 {
            service
                .add_user_message(&chat.id, &format!("m{i}"), None)
                .await
                .unwrap();
        }
        let history = service.history(&chat.id).await.unwrap();
        for pair in history.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_send_message_streams_into_placeholder() {
        let (service, requests) = service_with(
            deltas(&["Hel", "lo", "!"]),
            Ok("\"Greeting\"".to_string()),
            KEY,
        );
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "Hi", None).await.unwrap();

        let (outcome, events) = run_turn(&service, &chat.id).await;

        let TurnOutcome::Completed { message_id, text } = outcome else {
            panic!("expected completed turn, got {outcome:?}");
        };
        assert_eq!(text, "Hello!");

        let history = service.history(&chat.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].id, message_id);
        assert_eq!(history[1].text, "Hello!");
        assert_eq!(history[1].sender, Sender::Model);
        assert!(!history[1].is_error);
        assert_eq!(history[1].model.as_deref(), Some("google/gemini-1.5-pro"));

        assert_eq!(events[0], TurnEvent::Started { message_id });
        let streamed: String = events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::Delta { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(streamed, "Hello!");
        assert!(events.contains(&TurnEvent::TitleGenerated {
            title: "Greeting".to_string()
        }));

        let requests = requests.lock().unwrap();
        let turn = &requests[0];
        assert!(turn.stream);
        assert_eq!(turn.model, "google/gemini-1.5-pro");
        let system = turn.system.as_deref().unwrap();
        assert!(system.starts_with("You are Alice."));
        assert!(system.ends_with(ResponseLength::Short.instruction()));
        assert_eq!(turn.messages.len(), 1);
        assert_eq!(turn.messages[0].content, "Hi");
    }

    #[tokio::test]
    async fn test_title_generated_only_for_fresh_chats() {
        let (service, _) = service_with(deltas(&["ok"]), Ok("Small Talk".to_string()), KEY);
        let chat = service.create_chat("alice").await.unwrap();

        service.add_user_message(&chat.id, "one", None).await.unwrap();
        run_turn(&service, &chat.id).await;
        assert_eq!(service.get_chat(&chat.id).await.unwrap().title, "Small Talk");

        service.rename_chat(&chat.id, "Mine").await.unwrap();
        service.add_user_message(&chat.id, "two", None).await.unwrap();
        let (_, events) = run_turn(&service, &chat.id).await;
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, TurnEvent::TitleGenerated { .. }))
        );
        assert_eq!(service.get_chat(&chat.id).await.unwrap().title, "Mine");
    }

    #[tokio::test]
    async fn test_title_failure_does_not_fail_turn() {
        let (service, _) = service_with(
            deltas(&["fine"]),
            Err(LlmError::RateLimited {
                retry_after_ms: None,
            }),
            KEY,
        );
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "hey", None).await.unwrap();

        let (outcome, _) = run_turn(&service, &chat.id).await;
        assert!(matches!(outcome, TurnOutcome::Completed { .. }));
        assert_eq!(service.get_chat(&chat.id).await.unwrap().title, DEFAULT_CHAT_TITLE);
    }

    #[tokio::test]
    async fn test_stream_error_marks_row() {
        let script = Script::Events(vec![
            Ok(StreamEvent::Connected),
            Ok(StreamEvent::TextDelta {
                text: "partial".to_string(),
            }),
            Err(LlmError::Stream("connection reset".to_string())),
        ]);
        let (service, _) = service_with(script, Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "Hi", None).await.unwrap();

        let (outcome, events) = run_turn(&service, &chat.id).await;
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));

        let row = service.history(&chat.id).await.unwrap().pop().unwrap();
        assert!(row.is_error);
        assert_eq!(row.text, "Error: stream error: connection reset");
        assert!(events.iter().any(|e| matches!(e, TurnEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_missing_api_key_marks_row() {
        let (service, _) = service_with(deltas(&["never"]), Ok(String::new()), &[]);
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "Hi", None).await.unwrap();

        let (outcome, _) = run_turn(&service, &chat.id).await;
        let TurnOutcome::Failed { error, .. } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(error, "API Key for provider OpenRouter not found!");

        let row = service.history(&chat.id).await.unwrap().pop().unwrap();
        assert_eq!(row.text, "Error: API Key for provider OpenRouter not found!");
        assert!(row.is_error);
    }

    #[tokio::test]
    async fn test_no_user_message_marks_row() {
        let (service, _) = service_with(deltas(&["x"]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();

        let (outcome, _) = run_turn(&service, &chat.id).await;
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        let row = service.history(&chat.id).await.unwrap().pop().unwrap();
        assert_eq!(row.text, "Error: No user message found to respond to.");
    }

    #[tokio::test]
    async fn test_send_message_unknown_chat() {
        let (service, _) = service_with(deltas(&["x"]), Ok(String::new()), KEY);
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = service
            .send_message(&Uuid::now_v7(), &settings(), tx, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ChatError::ChatNotFound)));
    }

    #[tokio::test]
    async fn test_empty_response_is_an_error() {
        let (service, _) = service_with(deltas(&[]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "Hi", None).await.unwrap();

        let (outcome, _) = run_turn(&service, &chat.id).await;
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_text() {
        let (service, _) = service_with(
            Script::Hang("Once upon".to_string()),
            Ok(String::new()),
            KEY,
        );
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "Story?", None).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let settings = settings();
        let turn = service.send_message(&chat.id, &settings, tx, cancel.clone());
        let stopper = async {
            while let Some(event) = rx.recv().await {
                if matches!(event, TurnEvent::Delta { .. }) {
                    cancel.cancel();
                }
            }
        };
        let (outcome, ()) = tokio::join!(turn, stopper);

        let TurnOutcome::Cancelled { text, .. } = outcome.unwrap() else {
            panic!("expected cancelled turn");
        };
        assert_eq!(text, "Once upon");
        let row = service.history(&chat.id).await.unwrap().pop().unwrap();
        assert_eq!(row.text, "Once upon");
        assert!(!row.is_error);
    }

    #[tokio::test]
    async fn test_edit_last_message_does_not_fork() {
        let (service, _) = service_with(deltas(&[]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        let msg = service.add_user_message(&chat.id, "helo", None).await.unwrap();

        assert!(!service.edit_and_fork(&msg.id, "hello").await.unwrap());
        let history = service.history(&chat.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "hello");
    }

    #[tokio::test]
    async fn test_edit_earlier_message_forks() {
        let (service, _) = service_with(deltas(&["answer"]), Ok("T".to_string()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        let first = service.add_user_message(&chat.id, "first", None).await.unwrap();
        run_turn(&service, &chat.id).await;
        service.add_user_message(&chat.id, "second", None).await.unwrap();
        run_turn(&service, &chat.id).await;
        assert_eq!(service.history(&chat.id).await.unwrap().len(), 4);

        assert!(service.edit_and_fork(&first.id, "first, edited").await.unwrap());
        let history = service.history(&chat.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "first, edited");
    }

    #[tokio::test]
    async fn test_edit_noop_cases() {
        let (service, _) = service_with(deltas(&[]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        let msg = service.add_user_message(&chat.id, "same", None).await.unwrap();
        service.add_user_message(&chat.id, "later", None).await.unwrap();

        assert!(!service.edit_and_fork(&msg.id, "same").await.unwrap());
        assert!(!service.edit_and_fork(&msg.id, "   ").await.unwrap());
        assert_eq!(service.history(&chat.id).await.unwrap().len(), 2);
        assert!(matches!(
            service.edit_and_fork(&Uuid::now_v7(), "x").await,
            Err(ChatError::MessageNotFound)
        ));
    }

    #[tokio::test]
    async fn test_retry_replaces_previous_answer() {
        let (service, _) = service_with(deltas(&["again"]), Ok("T".to_string()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "Hi", None).await.unwrap();
        run_turn(&service, &chat.id).await;

        let (tx, _rx) = mpsc::unbounded_channel();
        service
            .retry(&chat.id, &settings(), tx, CancellationToken::new())
            .await
            .unwrap();

        let history = service.history(&chat.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].text, "again");
    }

    #[tokio::test]
    async fn test_cancel_before_first_chunk_removes_placeholder() {
        let (service, requests) = service_with(deltas(&["ok"]), Ok("T".to_string()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "Hi", None).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = service
            .send_message(&chat.id, &settings(), tx, cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Cancelled { ref text, .. } if text.is_empty()));

        let history = service.history(&chat.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.iter().all(|m| m.text != PLACEHOLDER_TEXT));

        service.add_user_message(&chat.id, "Hello?", None).await.unwrap();
        run_turn(&service, &chat.id).await;

        let requests = requests.lock().unwrap();
        let turn = requests.iter().rev().find(|r| r.stream).unwrap();
        let texts: Vec<&str> = turn.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["Hi", "Hello?"]);
    }

    #[tokio::test]
    async fn test_history_excludes_failed_rows_on_next_turn() {
        let script = Script::Events(vec![Err(LlmError::Overloaded("busy".to_string()))]);
        let (service, requests) = service_with(script, Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "Hi", None).await.unwrap();
        run_turn(&service, &chat.id).await;
        assert!(service.history(&chat.id).await.unwrap()[1].is_error);

        service.add_user_message(&chat.id, "Hello?", None).await.unwrap();
        run_turn(&service, &chat.id).await;

        let requests = requests.lock().unwrap();
        let turn = requests.last().unwrap();
        let texts: Vec<&str> = turn.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["Hi", "Hello?"]);
    }

    #[tokio::test]
    async fn test_secret_store_failure_marks_row() {
        let (service, _) = service_with_secrets(
            deltas(&["never"]),
            Ok(String::new()),
            SecretService::new(vec![Arc::new(BrokenVault)]),
        );
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "Hi", None).await.unwrap();

        let (outcome, events) = run_turn(&service, &chat.id).await;
        let TurnOutcome::Failed { error, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(error.contains("decryption failed"), "{error}");

        let row = service.history(&chat.id).await.unwrap().pop().unwrap();
        assert!(row.is_error);
        assert_eq!(row.text, format!("Error: {error}"));
        assert!(events.iter().any(|e| matches!(e, TurnEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_retry_unknown_chat() {
        let (service, _) = service_with(deltas(&["x"]), Ok(String::new()), KEY);
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = service
            .retry(&Uuid::now_v7(), &settings(), tx, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ChatError::ChatNotFound)));
    }

    #[tokio::test]
    async fn test_retry_without_user_message() {
        let (service, _) = service_with(deltas(&["x"]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = service
            .retry(&chat.id, &settings(), tx, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ChatError::NoUserMessage)));
    }

    #[tokio::test]
    async fn test_export_uses_persona_name() {
        let (service, _) = service_with(deltas(&[]), Ok(String::new()), KEY);
        let chat = service.create_chat("alice").await.unwrap();
        service.add_user_message(&chat.id, "hi", None).await.unwrap();

        let md = service.export(&chat.id, ExportFormat::Markdown).await.unwrap();
        assert!(md.contains("- **Persona:** Alice"));
    }
}
