//! cryptsec: encrypt and decrypt files at rest
//!
//! Commands:
//!   encrypt <path>   - seal a file or every file under a directory
//!   decrypt <path>   - open `.cryptsec` files back into plaintext
//!   config show      - display the active configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zeroize::Zeroizing;

use cryptsec_core::config::CryptsecConfig;
use cryptsec_core::{DirectoryReport, Mode};
use cryptsec_fs::{PoolOptions, ProgressFn};

const PASSPHRASE_ENV: &str = "CRYPTSEC_PASSPHRASE";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cryptsec",
    version,
    about = "Passphrase-based file encryption with secure deletion",
    long_about = "cryptsec: encrypt files or directory trees with AES-256-GCM under an \
                  Argon2id-derived key, and overwrite plaintext before deleting it"
)]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "CRYPTSEC_CONFIG",
        default_value = "~/.config/cryptsec/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long, env = "CRYPTSEC_LOG")]
    log: Option<String>,

    /// Log format; overrides config
    #[arg(long, env = "CRYPTSEC_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file, or every file under a directory
    ///
    /// Each file becomes `<name>.cryptsec`; the plaintext is overwritten
    /// `--passes` times and then deleted. Overwriting is best-effort and does
    /// not defeat SSD wear levelling, copy-on-write filesystems, or snapshots.
    Encrypt {
        /// File or directory
        path: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Decrypt `.cryptsec` files back to their original names
    Decrypt {
        /// File or directory
        path: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Concurrent workers for directories (default from config: 30)
    #[arg(long, short = 't')]
    workers: Option<usize>,

    /// Overwrite passes before deleting plaintext, 0 = plain delete
    #[arg(long, short = 'p')]
    passes: Option<u32>,
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
    let config_path = expand_tilde(&cli.config);
    let config = CryptsecConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    match cli.command {
        Commands::Encrypt { path, run } => cmd_run(&config, Mode::Encrypt, &path, &run).await,
        Commands::Decrypt { path, run } => cmd_run(&config, Mode::Decrypt, &path, &run).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
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

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}

// ── Passphrase ────────────────────────────────────────────────────────────────

/// Read the passphrase from `CRYPTSEC_PASSPHRASE` or the terminal.
///
/// Encryption asks twice; a mismatch aborts before any file is touched.
fn read_passphrase(mode: Mode) -> Result<SecretString> {
    if let Ok(value) = std::env::var(PASSPHRASE_ENV) {
        return Ok(to_secret(Zeroizing::new(value)));
    }

    let prompt = match mode {
        Mode::Encrypt => "Enter encryption passphrase: ",
        Mode::Decrypt => "Enter decryption passphrase: ",
    };
    let first = Zeroizing::new(rpassword::prompt_password(prompt).context("reading passphrase")?);

    if mode == Mode::Encrypt {
        let confirm = Zeroizing::new(
            rpassword::prompt_password("Confirm encryption passphrase: ")
                .context("reading passphrase confirmation")?,
        );
        if *first != *confirm {
            anyhow::bail!("passphrases do not match; nothing was changed");
        }
    }

    if first.is_empty() {
        anyhow::bail!("empty passphrase");
    }
    Ok(to_secret(first))
}

/// Move a passphrase into a `SecretString`, zeroing the source buffer.
///
/// The copy is sized exactly so `SecretString` never reallocates it.
fn to_secret(value: Zeroizing<String>) -> SecretString {
    SecretString::from(value.as_str().to_owned())
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(prefix: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("progress template")?
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

// ── `cryptsec encrypt` / `cryptsec decrypt` ───────────────────────────────────

async fn cmd_run(config: &CryptsecConfig, mode: Mode, path: &Path, run: &RunArgs) -> Result<()> {
    let workers = run.workers.unwrap_or(config.run.workers);
    let passes = run.passes.unwrap_or(config.run.passes);

    let meta = std::fs::metadata(path)
        .with_context(|| format!("path not found: {}", path.display()))?;

    let passphrase = read_passphrase(mode)?;
    let key = tokio::task::spawn_blocking(move || {
        cryptsec_crypto::derive_key_from_passphrase(&passphrase)
    })
    .await
    .context("key derivation task")?
    .context("deriving key")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight files");
            on_signal.cancel();
        }
    });

    let pb = if meta.is_dir() {
        Some(make_progress_bar(&mode.to_string())?)
    } else {
        None
    };
    let progress: Option<ProgressFn> = pb.clone().map(|pb| -> ProgressFn {
        Box::new(move |done: u64, total: u64, path: &Path| {
            pb.set_length(total);
            pb.set_position(done);
            pb.set_message(
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
        })
    });

    let options = PoolOptions {
        exclude_patterns: config.run.exclude_patterns.clone(),
        progress,
        cancel: Some(cancel),
    };

    info!(path = %path.display(), %mode, workers, passes, "starting run");
    let target = path.to_path_buf();
    let report = tokio::task::spawn_blocking(move || {
        cryptsec_fs::process_path(&target, &key, mode, workers, passes, &options)
    })
    .await
    .context("worker task")?
    .with_context(|| format!("processing {}", path.display()))?;

    if let Some(pb) = pb {
        pb.finish_with_message("done".to_string());
    }
    print_report(mode, &report);

    if !report.failures.is_empty() {
        anyhow::bail!("{} file(s) failed", report.failures.len());
    }
    if report.processed < report.total {
        anyhow::bail!(
            "cancelled after {} of {} files",
            report.processed,
            report.total
        );
    }
    Ok(())
}

fn print_report(mode: Mode, report: &DirectoryReport) {
    let verb = match mode {
        Mode::Encrypt => "encrypted",
        Mode::Decrypt => "decrypted",
    };
    println!();
    println!("{mode} complete:");
    println!("  {verb}: {} files", report.succeeded);
    println!("  skipped:   {} files", report.skipped);
    println!("  failed:    {} files", report.failures.len());
    println!("  total:     {} files", report.total);
    for failure in &report.failures {
        println!("  ! {}: {}", failure.path.display(), failure.error);
    }
}

// ── `cryptsec config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &CryptsecConfig, path: &Path) -> Result<()> {
    println!("# config: {}", path.display());
    let rendered = toml::to_string_pretty(config).context("serializing config")?;
    print!("{rendered}");
    Ok(())
}
