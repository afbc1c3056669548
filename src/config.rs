use anyhow::{Context, Result, bail};
use clap::Parser;
use std::env;
use uuid::Uuid;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub public_url: String,
    pub jwt_secret: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("public_url", &self.public_url)
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

/// One-shot operator tasks that run instead of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Serve,
    Migrate,
    GrantAdmin(Uuid),
    PruneImages,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Community recipe and packaging-idea sharing API")]
pub struct Args {
    /// Host to bind to (overrides PANTRY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PANTRY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded images are stored (overrides PANTRY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides PANTRY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Origin used to build public image URLs (overrides PANTRY_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// HS256 secret shared with the identity provider (overrides PANTRY_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Give the user with this id the admin role and exit
    #[arg(long, value_name = "USER_ID", conflicts_with = "migrate")]
    pub grant_admin: Option<Uuid>,

    /// Delete day-old uploads that no item or profile references, then exit
    #[arg(long, conflicts_with_all = ["migrate", "grant_admin"])]
    pub prune_images: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, Mode)> {
        let args = Args::parse();

        let env_host = env::var("PANTRY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("PANTRY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PANTRY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading PANTRY_PORT"),
        };
        let env_storage =
            env::var("PANTRY_STORAGE_DIR").unwrap_or_else(|_| "./data/images".into());
        let env_db = env::var("PANTRY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/pantry.db".into());

        let port = args.port.unwrap_or(env_port);
        let public_url = match args.public_url.or_else(|| env::var("PANTRY_PUBLIC_URL").ok()) {
            Some(url) => url,
            None => format!("http://localhost:{port}"),
        };

        let mode = match (args.migrate, args.grant_admin, args.prune_images) {
            (true, _, _) => Mode::Migrate,
            (false, Some(user), _) => Mode::GrantAdmin(user),
            (false, None, true) => Mode::PruneImages,
            (false, None, false) => Mode::Serve,
        };

        let jwt_secret = match args.jwt_secret.or_else(|| env::var("PANTRY_JWT_SECRET").ok()) {
            Some(secret) if !secret.is_empty() => secret,
            _ if mode != Mode::Serve => String::new(),
            _ => bail!("PANTRY_JWT_SECRET (or --jwt-secret) must be set"),
        };

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_url,
            jwt_secret,
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
