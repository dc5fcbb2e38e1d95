//! avault: encrypted avatar upload CLI
//!
//! Commands:
//!   upload <image>               - seal an avatar and upload it to the file host
//!   decrypt <sealed> -o <out>    - open a sealed avatar fetched from the host
//!   last                         - show the recorded upload time and avatar URL
//!   status                       - check that the file host is reachable
//!   config show                  - display the active configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use avault_core::config::AvaultConfig;
use avault_crypto::{open_avatar, IntegrityDigest, ProfileKey};
use avault_storage::{OpendalUploadClient, StorageCredentials};
use avault_upload::{AvatarUploadPipeline, EncodedProfileKey, JsonMetadataStore};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "avault",
    version,
    about = "Encrypted avatar upload client",
    long_about = "avault: seal avatar images under a profile key and upload them to an untrusted file host"
)]
struct Cli {
    /// Path to avault.toml configuration file
    #[arg(long, short = 'c', env = "AVAULT_CONFIG", default_value = "~/.config/avault/avault.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "AVAULT_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "AVAULT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seal an avatar image and upload it
    ///
    /// S3 credentials are read from AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY
    /// (or AVAULT_ACCESS_KEY_ID / AVAULT_SECRET_ACCESS_KEY).
    Upload {
        /// Avatar image file
        image: PathBuf,
        /// Base64-encoded 32-byte profile key
        #[arg(long, env = "AVAULT_PROFILE_KEY", hide_env_values = true)]
        key: String,
    },

    /// Decrypt a sealed avatar previously downloaded from the file host
    Decrypt {
        /// Sealed avatar file
        sealed: PathBuf,
        /// Where to write the decrypted image
        #[arg(long, short = 'o')]
        output: PathBuf,
        /// Base64-encoded 32-byte profile key
        #[arg(long, env = "AVAULT_PROFILE_KEY", hide_env_values = true)]
        key: String,
        /// Expected BLAKE3 digest (hex) of the sealed file
        #[arg(long)]
        digest: Option<String>,
    },

    /// Show the last recorded avatar upload
    Last,

    /// Check that the file host is reachable
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_home(&cli.config);
    let config = AvaultConfig::load(&config_path)?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    match cli.command {
        Commands::Upload { image, key } => cmd_upload(&config, &image, key).await,
        Commands::Decrypt {
            sealed,
            output,
            key,
            digest,
        } => cmd_decrypt(&sealed, &output, &key, digest.as_deref()).await,
        Commands::Last => cmd_last(&config),
        Commands::Status => cmd_status(&config).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn cmd_upload(config: &AvaultConfig, image: &Path, key: String) -> Result<()> {
    let plaintext = tokio::fs::read(image)
        .await
        .with_context(|| format!("reading avatar: {}", image.display()))?;

    let op = build_operator(config)?;
    let client = Arc::new(OpendalUploadClient::new(op));
    let store = Arc::new(open_store(config)?);
    let pipeline = AvatarUploadPipeline::from_config(client, store, config);

    info!(image = %image.display(), bytes = plaintext.len(), "uploading avatar");
    let provider = Arc::new(EncodedProfileKey::new(key));
    let handle = pipeline.upload_with_provider(plaintext, provider);
    let cancel = handle.cancellation_token();

    let result = tokio::select! {
        result = handle => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted: no further attempts will be made");
            cancel.cancel();
            anyhow::bail!("upload cancelled");
        }
    };
    let success = result.context("avatar upload failed")?;

    println!("url:      {}", success.url);
    println!("id:       {}", success.id);
    println!("digest:   {}", success.digest);
    println!("bytes:    {}", success.ciphertext_len);
    println!("attempts: {}", success.attempts);
    Ok(())
}

async fn cmd_decrypt(
    sealed: &Path,
    output: &Path,
    key: &str,
    digest: Option<&str>,
) -> Result<()> {
    let bytes = tokio::fs::read(sealed)
        .await
        .with_context(|| format!("reading sealed avatar: {}", sealed.display()))?;

    if let Some(hex) = digest {
        let expected = IntegrityDigest::from_hex(hex)?;
        if !expected.verify(&bytes) {
            anyhow::bail!(
                "digest mismatch: expected {expected}, file hashes to {}",
                IntegrityDigest::of(&bytes)
            );
        }
    }

    let key = ProfileKey::from_base64(key)?;
    let plaintext = open_avatar(&bytes, &key)
        .with_context(|| format!("opening sealed avatar: {}", sealed.display()))?;

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating output dir: {}", parent.display()))?;
    }
    tokio::fs::write(output, &plaintext)
        .await
        .with_context(|| format!("writing avatar: {}", output.display()))?;

    println!("decrypted {} bytes → {}", plaintext.len(), output.display());
    Ok(())
}

fn cmd_last(config: &AvaultConfig) -> Result<()> {
    let store = open_store(config)?;
    match store.last() {
        Some(metadata) => println!("{}", serde_json::to_string_pretty(&metadata)?),
        None => println!("no avatar uploaded yet ({})", store.path().display()),
    }
    Ok(())
}

async fn cmd_status(config: &AvaultConfig) -> Result<()> {
    let op = build_operator(config)?;
    avault_storage::check_health(&op).await?;
    println!("storage: ok ({} / {})", config.storage.endpoint, config.storage.bucket);
    Ok(())
}

fn cmd_config_show(config: &AvaultConfig, path: &Path) -> Result<()> {
    println!("# config: {}", path.display());
    println!("{}", toml::to_string_pretty(config).context("serializing config")?);
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn build_operator(config: &AvaultConfig) -> Result<opendal::Operator> {
    let creds = StorageCredentials::from_env()?;
    avault_storage::build_operator(&config.storage, &creds).context("building storage operator")
}

fn open_store(config: &AvaultConfig) -> Result<JsonMetadataStore> {
    let path = expand_home(&config.metadata.path);
    JsonMetadataStore::open(&path)
        .with_context(|| format!("opening metadata store: {}", path.display()))
}

/// Expand a leading `~/` using $HOME.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
