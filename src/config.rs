use crate::extraction::MediaKind;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_AZURE_API_VERSION: &str = "2023-07-01-preview";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
///
/// Any of these is fatal at startup: the server refuses to accept requests without a
/// complete configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable {key}: {reason}")]
    InvalidValue {
        /// Name of the offending variable.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Runtime configuration for the docmind server.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Remote text-generation service settings.
    pub llm: LlmConfig,
    /// Thresholds and caps applied around AI calls.
    pub ai: AiPolicy,
    /// Upload acceptance rules.
    pub uploads: UploadConfig,
    /// Record database and raw byte storage locations.
    pub storage: StorageConfig,
    /// Bearer token settings.
    pub auth: AuthConfig,
    /// Optical character recognition engine settings.
    pub ocr: OcrConfig,
    /// Log file location.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Optional override for the HTTP server port.
    pub port: Option<u16>,
    /// Browser origin allowed to call the API.
    pub cors_allowed_origin: String,
}

/// Supported chat-completion backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    /// Azure OpenAI deployment addressed by endpoint + deployment name.
    Azure,
    /// Public OpenAI chat-completions API.
    OpenAI,
}

impl std::str::FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Connection settings for the chat-completion provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider protocol to speak.
    pub provider: LlmProvider,
    /// Credential sent with every request.
    pub api_key: String,
    /// Azure resource endpoint, or the OpenAI base URL.
    pub endpoint: String,
    /// Azure deployment identifier (unused for OpenAI).
    pub deployment: Option<String>,
    /// Azure `api-version` query parameter (unused for OpenAI).
    pub api_version: Option<String>,
    /// Model identifier sent in the payload (OpenAI only).
    pub model: Option<String>,
    /// Upper bound for a single provider call.
    pub timeout_secs: u64,
}

/// Thresholds and caps applied around AI calls.
#[derive(Debug, Clone, Copy)]
pub struct AiPolicy {
    /// Characters of extracted text sent to the provider.
    pub input_max_chars: usize,
    /// Text must be strictly longer than this to be summarized or questioned.
    pub min_text_chars: usize,
    /// Output token cap for summaries.
    pub summary_max_tokens: u32,
    /// Output token cap for answers.
    pub answer_max_tokens: u32,
}

impl Default for AiPolicy {
    fn default() -> Self {
        Self {
            input_max_chars: 4000,
            min_text_chars: 50,
            summary_max_tokens: 150,
            answer_max_tokens: 200,
        }
    }
}

/// Upload acceptance rules.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Largest accepted upload in bytes.
    pub max_bytes: u64,
    /// Media kinds accepted at the boundary.
    pub accepted: Vec<MediaKind>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            accepted: MediaKind::ALL.to_vec(),
        }
    }
}

/// Record database and raw byte storage locations.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite connection string for document and user records.
    pub database_url: String,
    /// Directory holding raw uploaded bytes.
    pub upload_dir: PathBuf,
}

impl StorageConfig {
    /// Read only the storage keys from the process environment.
    ///
    /// Used by commands that touch the database without serving requests.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the storage keys from an arbitrary lookup; every key has a default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        Self {
            database_url: vars
                .optional("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://docmind.db".into()),
            upload_dir: vars
                .optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
        }
    }
}

/// Where the file log layer writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// File that log lines are appended to.
    pub log_file: PathBuf,
}

impl LoggingConfig {
    /// Read `DOCMIND_LOG_FILE` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read `DOCMIND_LOG_FILE` from an arbitrary lookup, defaulting to `logs/docmind.log`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            log_file: Vars(&lookup)
                .optional("DOCMIND_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs/docmind.log")),
        }
    }
}

/// Bearer token settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret used to sign tokens.
    pub jwt_secret: String,
    /// Token lifetime in days.
    pub token_ttl_days: i64,
}

/// Optical character recognition engine settings.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Executable invoked for OCR.
    pub command: String,
    /// Language pack passed to the engine.
    pub language: String,
    /// Upper bound for a single OCR run.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            command: "tesseract".into(),
            language: "eng".into(),
            timeout_secs: 60,
        }
    }
}

/// Merge a `.env` file from the working directory into the process environment, if present.
///
/// Variables already set in the environment win over the file.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Err(err) if !err.not_found() => {
            tracing::warn!(error = %err, "Ignoring unreadable .env file");
        }
        _ => {}
    }
}

impl Config {
    /// Load `.env` (when present) and read configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        load_dotenv();
        let config = Self::from_env()?;
        tracing::debug!(
            provider = ?config.llm.provider,
            endpoint = %config.llm.endpoint,
            database_url = %config.storage.database_url,
            upload_dir = %config.storage.upload_dir.display(),
            max_upload_bytes = config.uploads.max_bytes,
            server_port = ?config.server.port,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as absent so that `KEY=` in a `.env` file falls back to the
    /// default instead of failing to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let provider = match vars.optional("LLM_PROVIDER") {
            Some(value) => value.parse().map_err(|()| ConfigError::InvalidValue {
                key: "LLM_PROVIDER".into(),
                reason: format!("expected `azure` or `openai`, got `{value}`"),
            })?,
            None => LlmProvider::Azure,
        };
        let llm = match provider {
            LlmProvider::Azure => LlmConfig {
                provider,
                api_key: vars.required("OPENAI_API_KEY")?,
                endpoint: vars.required("AZURE_OPENAI_ENDPOINT")?,
                deployment: Some(vars.required("AZURE_OPENAI_DEPLOYMENT_NAME")?),
                api_version: Some(
                    vars.optional("AZURE_OPENAI_API_VERSION")
                        .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.into()),
                ),
                model: None,
                timeout_secs: vars.parsed("LLM_TIMEOUT_SECS", 30)?,
            },
            LlmProvider::OpenAI => LlmConfig {
                provider,
                api_key: vars.required("OPENAI_API_KEY")?,
                endpoint: vars
                    .optional("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
                deployment: None,
                api_version: None,
                model: Some(
                    vars.optional("OPENAI_MODEL")
                        .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
                ),
                timeout_secs: vars.parsed("LLM_TIMEOUT_SECS", 30)?,
            },
        };
        if llm.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LLM_TIMEOUT_SECS".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let defaults = AiPolicy::default();
        let ai = AiPolicy {
            input_max_chars: vars.parsed("AI_INPUT_MAX_CHARS", defaults.input_max_chars)?,
            min_text_chars: vars.parsed("AI_MIN_TEXT_CHARS", defaults.min_text_chars)?,
            summary_max_tokens: vars.parsed("SUMMARY_MAX_TOKENS", defaults.summary_max_tokens)?,
            answer_max_tokens: vars.parsed("ANSWER_MAX_TOKENS", defaults.answer_max_tokens)?,
        };

        let accepted = match vars.optional("ACCEPTED_MEDIA_TYPES") {
            Some(list) => parse_media_kinds(&list)?,
            None => MediaKind::ALL.to_vec(),
        };
        let uploads = UploadConfig {
            max_bytes: vars.parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            accepted,
        };

        let storage = StorageConfig::from_lookup(&lookup);

        let auth = AuthConfig {
            jwt_secret: vars.required("JWT_SECRET")?,
            token_ttl_days: vars.parsed("JWT_EXPIRY_DAYS", 30)?,
        };

        let ocr_defaults = OcrConfig::default();
        let ocr = OcrConfig {
            command: vars.optional("OCR_COMMAND").unwrap_or(ocr_defaults.command),
            language: vars.optional("OCR_LANGUAGE").unwrap_or(ocr_defaults.language),
            timeout_secs: vars.parsed("OCR_TIMEOUT_SECS", ocr_defaults.timeout_secs)?,
        };

        let server = ServerConfig {
            port: vars
                .optional("SERVER_PORT")
                .map(|value| {
                    value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: "SERVER_PORT".into(),
                        reason: format!("`{value}` is not a port number"),
                    })
                })
                .transpose()?,
            cors_allowed_origin: vars
                .optional("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".into()),
        };

        Ok(Self {
            server,
            llm,
            ai,
            uploads,
            storage,
            auth,
            ocr,
            logging: LoggingConfig::from_lookup(&lookup),
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|err: T::Err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: err.to_string(),
                }),
            None => Ok(default),
        }
    }
}

fn parse_media_kinds(list: &str) -> Result<Vec<MediaKind>, ConfigError> {
    let mut kinds = Vec::new();
    for token in list.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        let kind = MediaKind::from_extension(token)
            .or_else(|| MediaKind::from_mime(token))
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "ACCEPTED_MEDIA_TYPES".into(),
                reason: format!("unknown media type `{token}`"),
            })?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "ACCEPTED_MEDIA_TYPES".into(),
            reason: "at least one media type is required".into(),
        });
    }
    Ok(kinds)
}
