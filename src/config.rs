use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{collections::HashMap, env, fmt};
use tracing::{debug, warn};

/// Which object-storage backend the gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// S3-compatible service (AWS, MinIO, Ceph, ...)
    S3,
    /// Process-local store; contents are lost on restart
    Memory,
}

/// Connection settings for the S3 backend.
#[derive(Clone)]
pub struct S3Settings {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub cors_origin: String,
    pub backend: Backend,
    /// Present when `backend` is `S3`.
    pub s3: Option<S3Settings>,
    /// Abort startup when bucket provisioning fails.
    pub strict_provisioning: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Presigned-URL and streaming upload gateway for S3-compatible storage")]
pub struct Args {
    /// Host to bind to (overrides GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Bucket to serve (overrides BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Storage region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Storage endpoint URL for self-hosted providers (overrides AWS_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Origin allowed by the bucket and gateway CORS rules (overrides CORS_ORIGIN)
    #[arg(long)]
    pub cors_origin: Option<String>,

    /// Storage backend (overrides STORAGE_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Exit if the bucket cannot be provisioned at startup
    #[arg(long)]
    pub strict_provisioning: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    /// Values from a `.env` file only fill gaps left by the process environment.
    pub fn from_env_and_args() -> Result<Self> {
        let file_vars = env_file_vars(dotenvy::dotenv_iter());
        Self::from_sources(
            Args::parse(),
            with_env_file(|name| env::var(name).ok(), file_vars),
        )
    }

    /// Merge CLI args over values looked up through `var`, over defaults.
    pub fn from_sources(args: Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = var("GATEWAY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match var("PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PORT value `{}`", value))?,
            None => 3000,
        };
        let env_backend = match var("STORAGE_BACKEND") {
            Some(value) => Backend::from_str(&value, true)
                .map_err(|err| anyhow::anyhow!(err))
                .with_context(|| format!("parsing STORAGE_BACKEND value `{}`", value))?,
            None => Backend::S3,
        };

        // --- Merge ---
        let backend = args.backend.unwrap_or(env_backend);
        let bucket = args
            .bucket
            .or_else(|| var("BUCKET_NAME"))
            .filter(|b| !b.is_empty())
            .context("BUCKET_NAME must be set")?;

        let s3 = match backend {
            Backend::S3 => {
                let access_key_id = var("AWS_ACCESS_KEY_ID")
                    .filter(|v| !v.is_empty())
                    .context("AWS_ACCESS_KEY_ID must be set for the s3 backend")?;
                let secret_access_key = var("AWS_SECRET_ACCESS_KEY")
                    .filter(|v| !v.is_empty())
                    .context("AWS_SECRET_ACCESS_KEY must be set for the s3 backend")?;
                Some(S3Settings {
                    region: args
                        .region
                        .or_else(|| var("AWS_REGION"))
                        .unwrap_or_else(|| "us-east-1".into()),
                    endpoint: args
                        .endpoint
                        .or_else(|| var("AWS_ENDPOINT"))
                        .filter(|e| !e.is_empty()),
                    access_key_id,
                    secret_access_key,
                })
            }
            Backend::Memory => None,
        };

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            bucket,
            cors_origin: args
                .cors_origin
                .or_else(|| var("CORS_ORIGIN"))
                .unwrap_or_else(|| "http://localhost:3000".into()),
            backend,
            s3,
            strict_provisioning: args.strict_provisioning,
        };

        if cfg.cors_origin.trim().is_empty() {
            bail!("CORS_ORIGIN must not be empty");
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Collect the variables of a `.env` file. A missing file yields nothing; a
/// malformed one is logged and ignored as a whole.
fn env_file_vars<I>(source: std::result::Result<I, dotenvy::Error>) -> HashMap<String, String>
where
    I: Iterator<Item = std::result::Result<(String, String), dotenvy::Error>>,
{
    let iter = match source {
        Ok(iter) => iter,
        Err(err) if err.not_found() => {
            debug!("no .env file found");
            return HashMap::new();
        }
        Err(err) => {
            warn!("ignoring unreadable .env file: {}", err);
            return HashMap::new();
        }
    };

    match iter.collect::<std::result::Result<HashMap<_, _>, _>>() {
        Ok(vars) => {
            debug!("loaded {} variables from .env", vars.len());
            vars
        }
        Err(err) => {
            warn!("ignoring malformed .env file: {}", err);
            HashMap::new()
        }
    }
}

fn with_env_file(
    var: impl Fn(&str) -> Option<String>,
    file_vars: HashMap<String, String>,
) -> impl Fn(&str) -> Option<String> {
    move |name| var(name).or_else(|| file_vars.get(name).cloned())
}
