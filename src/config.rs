use clap::Parser;
use std::fmt;

#[derive(Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Gemini model used for caption generation
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash")]
    pub model: String,

    /// Base URL of the Generative Language API
    #[arg(
        long,
        env = "GEMINI_API_BASE",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub api_base: String,

    /// Environment variable holding the API key, read on every request
    #[arg(long, env = "API_KEY_VAR", default_value = "GEMINI_API_KEY")]
    pub api_key_var: String,

    /// Fixed API key; takes precedence over the environment variable
    #[arg(long)]
    pub api_key: Option<String>,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key_var", &self.api_key_var)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl Config {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn api_key_source(&self) -> ApiKeySource {
        match &self.api_key {
            Some(key) => ApiKeySource::Fixed(Some(key.clone())),
            None => ApiKeySource::Env(self.api_key_var.clone()),
        }
    }
}

/// Where the API credential comes from.
///
/// The key is looked up per request, so a missing key is reported to the
/// caller instead of failing startup.
#[derive(Debug, Clone)]
pub enum ApiKeySource {
    Env(String),
    Fixed(Option<String>),
}

impl ApiKeySource {
    pub fn resolve(&self) -> Option<String> {
        let key = match self {
            ApiKeySource::Env(var) => std::env::var(var).ok(),
            ApiKeySource::Fixed(key) => key.clone(),
        };
        key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
    }
}
