use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "solace.duckdb".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Duckdb,
    Hosted,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HostedStoreConfig {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "therapy_sessions".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub hosted: Option<HostedStoreConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub default_model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnthropicConfig {
    pub api_base: String,
    pub api_key: String,
    pub default_model: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub openai: Option<OpenAiConfig>,
    pub anthropic: Option<AnthropicConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            openai: None,
            anthropic: Some(AnthropicConfig {
                api_base: "https://api.anthropic.com".to_string(),
                api_key: "${ANTHROPIC_API_KEY}".to_string(),
                default_model: "claude-3-opus-20240229".to_string(),
            }),
        }
    }
}

pub const DEFAULT_GREETING: &str =
    "Hello! I'm your AI therapy assistant. How are you feeling today?";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an empathetic AI therapist. Respond with understanding and professional therapeutic insights. Keep responses concise and focused on helping the user process their emotions and develop coping strategies.";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub greeting: String,
    pub system_prompt: String,
    /// Number of transcript lines handed to the responder as context.
    pub history_window: usize,
    pub detection_interval_ms: u64,
    pub max_tokens: u32,
    pub camera_enabled: bool,
    pub mic_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_window: 5,
            detection_interval_ms: 200,
            max_tokens: 1024,
            camera_enabled: true,
            mic_enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DetectorConfig {
    /// Face-analysis endpoint. Detection is disabled when unset.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub identity_path: String,
    pub delay_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity_path: "solace_identity.json".to_string(),
            delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub session: SessionConfig,
    pub detector: DetectorConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SOLACE").separator("__"))
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;
        app_config.expand();
        Ok(app_config)
    }

    // Expand environment variables written like ${ANTHROPIC_API_KEY}
    fn expand(&mut self) {
        self.server.host = expand_env(&self.server.host);
        self.database.path = expand_env(&self.database.path);
        self.auth.identity_path = expand_env(&self.auth.identity_path);

        if let Some(ref mut openai) = self.llm.openai {
            openai.api_key = expand_env(&openai.api_key);
        }
        if let Some(ref mut anthropic) = self.llm.anthropic {
            anthropic.api_key = expand_env(&anthropic.api_key);
        }
        if let Some(ref mut hosted) = self.store.hosted {
            hosted.url = expand_env(&hosted.url);
            hosted.api_key = expand_env(&hosted.api_key);
        }
        if let Some(url) = self.detector.url.take() {
            let url = expand_env(&url);
            self.detector.url = (!url.is_empty()).then_some(url);
        }
    }
}

fn expand_env(val: &str) -> String {
    match val.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).unwrap_or_default(),
        None => val.to_string(),
    }
}
