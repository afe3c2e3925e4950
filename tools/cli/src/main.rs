//! Offsync CLI - Command line interface for the offline sync queue.
//!
//! This tool queues mutations against a REST API, inspects the pending
//! queue and offline cache, and replays the queue on demand.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use offsync_storage::{create_default_registry, KeyValueStore};
use offsync_sync::{
    Connectivity, FlushOutcome, HttpRemote, ItemOutcome, ManualNetwork, MutationKind,
    OfflineSyncService, SyncConfig,
};

#[derive(Parser)]
#[command(name = "offsync")]
#[command(about = "Offsync - Offline mutation queue for REST APIs")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the queue and cache (file store only).
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Base URL of the remote API.
    #[arg(short, long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a mutation for later delivery.
    Enqueue {
        /// Kind of mutation.
        #[arg(value_enum)]
        kind: KindArg,

        /// Endpoint path, relative to the API base URL.
        target: String,

        /// JSON payload (ignored for delete).
        #[arg(long)]
        data: Option<String>,
    },

    /// Show queue and connectivity status.
    Status,

    /// List pending mutations in delivery order.
    List,

    /// Deliver all pending mutations now.
    Flush,

    /// Discard all pending mutations.
    Clear,

    /// Manage the offline cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Store a JSON value.
    Put {
        key: String,
        /// JSON value.
        value: String,
    },

    /// Print a cached value.
    Get { key: String },

    /// Remove a cached value.
    Remove { key: String },

    /// Remove every cached value.
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Create,
    Update,
    Delete,
}

impl From<KindArg> for MutationKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Create => MutationKind::Create,
            KindArg::Update => MutationKind::Update,
            KindArg::Delete => MutationKind::Delete,
        }
    }
}

/// Store backend selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
struct StoreSettings {
    /// Registered backend name.
    backend: String,
    /// Backend-specific options.
    options: Value,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            options: Value::Object(Default::default()),
        }
    }
}

/// On-disk CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
struct CliConfig {
    api_base_url: Option<String>,
    api_token: Option<String>,
    store: StoreSettings,
    sync: SyncConfig,
}

impl CliConfig {
    /// Load from `path`, or defaults when no file is given.
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&json).context("Invalid config file")
    }

    /// Apply command-line overrides.
    fn with_overrides(mut self, data_dir: Option<&Path>, api_url: Option<&str>) -> Self {
        if let Some(url) = api_url {
            self.api_base_url = Some(url.to_string());
        }

        if self.store.backend == "file" {
            let root = data_dir.map(Path::to_path_buf).or_else(|| {
                let configured = self.store.options.get("root").and_then(Value::as_str);
                match configured {
                    Some(_) => None,
                    None => default_data_dir(),
                }
            });

            if let Some(root) = root {
                self.store.options = serde_json::json!({
                    "root": root.to_string_lossy()
                });
            }
        }
        self
    }
}

fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("offsync"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = CliConfig::load(cli.config.as_deref())?
        .with_overrides(cli.data_dir.as_deref(), cli.api_url.as_deref());
    let service = open_service(&config).await?;

    match cli.command {
        Commands::Enqueue { kind, target, data } => {
            cmd_enqueue(&service, kind.into(), &target, data.as_deref()).await
        }

        Commands::Status => cmd_status(&service, &config).await,

        Commands::List => cmd_list(&service).await,

        Commands::Flush => cmd_flush(&service).await,

        Commands::Clear => cmd_clear(&service).await,

        Commands::Cache { command } => cmd_cache(&service, command).await,
    }
}

/// Build the sync service from configuration.
async fn open_service(config: &CliConfig) -> Result<Arc<OfflineSyncService>> {
    let registry = create_default_registry().context("Failed to set up store backends")?;
    let store: Arc<dyn KeyValueStore> = registry
        .resolve(&config.store.backend, config.store.options.clone())
        .context("Failed to open store")?;

    let base_url = config
        .api_base_url
        .as_deref()
        .unwrap_or("http://localhost:8080");
    let mut remote = HttpRemote::new(base_url).context("Invalid API base URL")?;
    if let Some(token) = &config.api_token {
        remote = remote.with_bearer_token(token.clone());
    }

    // A one-shot process has no connectivity source; attempts decide
    let network = Arc::new(ManualNetwork::new(Connectivity::Online));

    let service = OfflineSyncService::new(store, Arc::new(remote), network, config.sync.clone())
        .context("Invalid sync configuration")?;
    let service = Arc::new(service);
    service.initialize().await.context("Failed to initialize sync")?;

    Ok(service)
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("Invalid JSON: {}", raw))
}

/// Queue a mutation.
async fn cmd_enqueue(
    service: &OfflineSyncService,
    kind: MutationKind,
    target: &str,
    data: Option<&str>,
) -> Result<()> {
    let payload = data.map(parse_json).transpose()?;

    let item = service
        .enqueue(kind, target, payload)
        .await
        .context("Failed to queue mutation")?;

    println!("Queued {} {}", item.kind, item.target);
    println!("  ID: {}", item.id);
    println!("  Pending: {}", service.queue_len().await?);

    Ok(())
}

/// Show queue status.
async fn cmd_status(service: &OfflineSyncService, config: &CliConfig) -> Result<()> {
    let pending = service.pending_items().await.context("Failed to read queue")?;
    let cached = service.cache_entries().await.context("Failed to read cache")?;

    println!("Offsync Status:");
    println!("  Online: {}", service.is_online());
    println!("  Store: {}", config.store.backend);
    if let Some(url) = &config.api_base_url {
        println!("  API: {}", url);
    }
    println!("  Pending: {}", pending.len());
    println!(
        "  Retrying: {}",
        pending.iter().filter(|item| item.retry_count > 0).count()
    );
    println!("  Cached entries: {}", cached.len());
    println!("  Max retries: {}", service.config().max_retries);

    Ok(())
}

/// List pending mutations.
async fn cmd_list(service: &OfflineSyncService) -> Result<()> {
    let items = service.pending_items().await.context("Failed to read queue")?;

    if items.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    println!("Pending mutations ({}):", items.len());
    for item in items {
        println!(
            "  {} {:<6} {} (retries: {}, queued: {})",
            item.id,
            item.kind.to_string(),
            item.target,
            item.retry_count,
            item.enqueued_at.to_rfc3339()
        );
    }

    Ok(())
}

/// Replay the queue.
async fn cmd_flush(service: &OfflineSyncService) -> Result<()> {
    info!("Flushing pending mutations");

    let outcome = service.flush().await.context("Sync failed")?;
    let report = match outcome {
        FlushOutcome::Completed(report) => report,
        FlushOutcome::Offline => {
            println!("Offline, nothing sent.");
            return Ok(());
        }
        FlushOutcome::AlreadyRunning => {
            println!("A sync is already running.");
            return Ok(());
        }
    };

    for record in &report.records {
        let item = &record.item;
        match &record.outcome {
            ItemOutcome::Delivered => println!("  [OK]    {} {}", item.kind, item.target),
            ItemOutcome::Retained { error } => println!(
                "  [RETRY] {} {} ({}): {}",
                item.kind, item.target, item.retry_count, error
            ),
            ItemOutcome::Dropped { error } => {
                println!("  [DROP]  {} {}: {}", item.kind, item.target, error)
            }
        }
    }

    let summary = report.summary();
    println!(
        "Sync complete: {} delivered, {} retained, {} dropped, {} remaining",
        summary.delivered, summary.retained, summary.dropped, summary.remaining
    );

    Ok(())
}

/// Discard the queue.
async fn cmd_clear(service: &OfflineSyncService) -> Result<()> {
    let count = service.queue_len().await.unwrap_or(0);
    service.clear_queue().await.context("Failed to clear queue")?;

    println!("Discarded {} pending mutations.", count);

    Ok(())
}

/// Offline cache operations.
async fn cmd_cache(service: &OfflineSyncService, command: CacheCommands) -> Result<()> {
    let cache = service.cache();

    match command {
        CacheCommands::Put { key, value } => {
            let value = parse_json(&value)?;
            cache.put(&key, &value).await.context("Failed to cache value")?;
            println!("Cached: {}", key);
        }

        CacheCommands::Get { key } => match cache.entry(&key).await? {
            Some(entry) => {
                println!("{}", serde_json::to_string_pretty(&entry.data)?);
                info!("Cached at {}", entry.cached_at.to_rfc3339());
            }
            None => anyhow::bail!("No cached value for {}", key),
        },

        CacheCommands::Remove { key } => {
            cache.remove(&key).await.context("Failed to remove value")?;
            println!("Removed: {}", key);
        }

        CacheCommands::Clear => {
            cache.clear_all().await.context("Failed to clear cache")?;
            println!("Cache cleared.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_enqueue() {
        let cli = Cli::try_parse_from([
            "offsync",
            "--data-dir",
            "/tmp/q",
            "enqueue",
            "create",
            "/items",
            "--data",
            r#"{"name":"a"}"#,
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/q")));
        match cli.command {
            Commands::Enqueue { kind, target, data } => {
                assert_eq!(MutationKind::from(kind), MutationKind::Create);
                assert_eq!(target, "/items");
                assert_eq!(data.as_deref(), Some(r#"{"name":"a"}"#));
            }
            _ => panic!("expected enqueue"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["offsync", "enqueue", "patch", "/items"]).is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = CliConfig::load(None).unwrap();
        assert_eq!(config.store.backend, "file");
        assert_eq!(config.sync.max_retries, 3);
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn test_config_file_and_overrides() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("offsync.json");
        std::fs::write(
            &path,
            r#"{"api_base_url": "https://api.example.com", "sync": {"max_retries": 5}}"#,
        )
        .unwrap();

        let config = CliConfig::load(Some(&path))
            .unwrap()
            .with_overrides(Some(temp.path()), Some("http://localhost:9000"));

        assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(
            config.store.options["root"].as_str(),
            Some(temp.path().to_string_lossy().as_ref())
        );
    }

    #[test]
    fn test_configured_root_is_kept() {
        let mut config = CliConfig::default();
        config.store.options = serde_json::json!({"root": "/srv/offsync"});

        let config = config.with_overrides(None, None);
        assert_eq!(config.store.options["root"], "/srv/offsync");
    }

    #[test]
    fn test_invalid_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(CliConfig::load(Some(&path)).is_err());
    }

    #[tokio::test]
    async fn test_service_over_memory_store() {
        let mut config = CliConfig::default();
        config.store.backend = "memory".to_string();

        let service = open_service(&config).await.unwrap();
        cmd_enqueue(&service, MutationKind::Delete, "/items/1", None)
            .await
            .unwrap();
        assert_eq!(service.queue_len().await.unwrap(), 1);

        cmd_clear(&service).await.unwrap();
        assert_eq!(service.queue_len().await.unwrap(), 0);
    }
}
