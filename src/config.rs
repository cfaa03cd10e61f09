use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub mail: MailConfig,
    pub links: LinkConfig,
    pub documents: DocumentConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Public base URL used when building activation links
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encryption {
    None,
    StartTls,
    Tls,
}

impl Encryption {
    /// Parse the `MAIL_ENCRYPTION` setting. `tls` means STARTTLS and `ssl`
    /// means implicit TLS; anything unrecognised falls back to STARTTLS.
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Encryption::None,
            "ssl" => Encryption::Tls,
            _ => Encryption::StartTls,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub domain: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub encryption: Encryption,
    pub from_address: String,
    pub from_name: String,
    pub template_dir: PathBuf,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            host: "localhost".to_string(),
            port: 1025,
            username: None,
            password: None,
            encryption: Encryption::None,
            from_address: "info@mycompany.com".to_string(),
            from_name: "Info".to_string(),
            template_dir: PathBuf::from("./templates"),
        }
    }
}

#[derive(Clone)]
pub struct LinkConfig {
    /// HMAC key for activation links; a random per-process key when unset
    pub secret: Option<String>,
    pub expiry_minutes: i64,
}

impl std::fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("expiry_minutes", &self.expiry_minutes)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentConfig {
    pub template_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    /// Caps simultaneously running workers; `None` spawns freely
    pub max_concurrent_workers: Option<usize>,
    /// Upper bound on the shutdown drain; `None` waits for every job
    pub drain_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            max_concurrent_workers: None,
            drain_timeout: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mail_defaults = MailConfig::default();

        Ok(Self {
            app: AppConfig {
                base_url: env::var("APP_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            },
            mail: MailConfig {
                domain: env::var("MAIL_DOMAIN").unwrap_or(mail_defaults.domain),
                host: env::var("MAIL_HOST").unwrap_or(mail_defaults.host),
                port: env::var("MAIL_PORT")
                    .unwrap_or_else(|_| "1025".to_string())
                    .parse::<u16>()
                    .context("MAIL_PORT must be a port number")?,
                username: env::var("MAIL_USERNAME").ok().filter(|s| !s.is_empty()),
                password: env::var("MAIL_PASSWORD").ok().filter(|s| !s.is_empty()),
                encryption: Encryption::from_setting(
                    &env::var("MAIL_ENCRYPTION").unwrap_or_else(|_| "none".to_string()),
                ),
                from_address: env::var("MAIL_FROM_ADDRESS").unwrap_or(mail_defaults.from_address),
                from_name: env::var("MAIL_FROM_NAME").unwrap_or(mail_defaults.from_name),
                template_dir: env::var("MAIL_TEMPLATE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(mail_defaults.template_dir),
            },
            links: LinkConfig {
                secret: env::var("LINK_SECRET").ok().filter(|s| !s.is_empty()),
                expiry_minutes: env::var("LINK_EXPIRY_MINUTES")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse::<i64>()
                    .context("LINK_EXPIRY_MINUTES must be an integer")?,
            },
            documents: DocumentConfig {
                template_dir: env::var("DOCUMENT_TEMPLATE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./pdf")),
                output_dir: env::var("DOCUMENT_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| env::temp_dir()),
            },
            pipeline: PipelineConfig {
                queue_capacity: env::var("JOB_QUEUE_CAPACITY")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse::<usize>()
                    .context("JOB_QUEUE_CAPACITY must be an integer")?,
                max_concurrent_workers: env::var("MAX_CONCURRENT_WORKERS")
                    .ok()
                    .map(|v| v.parse::<usize>())
                    .transpose()
                    .context("MAX_CONCURRENT_WORKERS must be an integer")?,
                drain_timeout: env::var("DRAIN_TIMEOUT_SECS")
                    .ok()
                    .map(|v| v.parse::<u64>().map(Duration::from_secs))
                    .transpose()
                    .context("DRAIN_TIMEOUT_SECS must be an integer")?,
            },
        })
    }
}
