//! AxiomStore CLI - Command line interface for blob storage operations.
//!
//! Works against a provider described by a JSON configuration file,
//! normally one created by `axiomstore init` over a local directory.

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;
use url::Url;

use axiomstore_crypto::EncryptionKey;
use axiomstore_storage::prelude::*;
use axiomstore_storage::{
    create_default_registry, reader_stream, BlobContainer, BlobFile, BlobProvider,
    ConnectionDescriptor, CreateFileOptions, LocalTransport, ProviderConfig, DEFAULT_CONTENT_TYPE,
};

#[derive(Parser)]
#[command(name = "axiomstore")]
#[command(about = "AxiomStore - Provider-agnostic blob storage")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: <config dir>/axiomstore/config.json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration for a local storage directory.
    Init {
        /// Root directory of the store.
        #[arg(short, long)]
        root: PathBuf,

        /// Public URL base (default: file URL of the root).
        #[arg(short, long)]
        url_base: Option<String>,

        /// Base64 encryption key to store in the configuration.
        #[arg(short, long, conflicts_with = "generate_key")]
        key: Option<String>,

        /// Generate an encryption key of this many bytes (16, 24, 32, 48 or 64).
        #[arg(short, long)]
        generate_key: Option<usize>,

        /// Replace an existing configuration file.
        #[arg(short, long)]
        force: bool,
    },

    /// Create a container.
    Mkcontainer {
        /// Container name.
        name: String,
    },

    /// Upload a file.
    Put {
        /// Container name.
        container: String,

        /// File name inside the container.
        name: String,

        /// Source file to upload.
        #[arg(short, long)]
        source: PathBuf,

        /// MIME content type.
        #[arg(short = 't', long, default_value = DEFAULT_CONTENT_TYPE)]
        content_type: String,

        /// Encrypt with the configured key.
        #[arg(short, long)]
        encrypt: bool,

        /// Fail if the file already exists.
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Download a file.
    Get {
        /// Container name.
        container: String,

        /// File name inside the container.
        name: String,

        /// Destination file (default: standard output).
        #[arg(short, long)]
        dest: Option<PathBuf>,
    },

    /// Remove a file.
    Rm {
        /// Container name.
        container: String,

        /// File name inside the container.
        name: String,
    },

    /// Check whether a file exists; exits with status 1 if it does not.
    Exists {
        /// Container name.
        container: String,

        /// File name inside the container.
        name: String,
    },

    /// Show file attributes.
    Stat {
        /// Container name.
        container: String,

        /// File name inside the container.
        name: String,

        /// Print attributes as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Read or change file metadata.
    Meta {
        #[command(subcommand)]
        action: MetaAction,
    },

    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum MetaAction {
    /// Print all metadata entries.
    Get {
        /// Container name.
        container: String,

        /// File name inside the container.
        name: String,
    },

    /// Set metadata entries.
    Set {
        /// Container name.
        container: String,

        /// File name inside the container.
        name: String,

        /// Entries as KEY=VALUE.
        #[arg(required_unless_present = "remove", value_parser = parse_entry)]
        entries: Vec<(String, String)>,

        /// Remove these keys.
        #[arg(long = "remove")]
        remove: Vec<String>,
    },
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
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    match cli.command {
        Commands::Init {
            root,
            url_base,
            key,
            generate_key,
            force,
        } => cmd_init(&config_path, &root, url_base, key, generate_key, force),

        Commands::Mkcontainer { name } => cmd_mkcontainer(&config_path, &name).await,

        Commands::Put {
            container,
            name,
            source,
            content_type,
            encrypt,
            no_overwrite,
        } => {
            let mut options = CreateFileOptions::default();
            options.encrypt = encrypt;
            options.overwrite = !no_overwrite;
            cmd_put(&config_path, &container, &name, &source, &content_type, options).await
        }

        Commands::Get {
            container,
            name,
            dest,
        } => cmd_get(&config_path, &container, &name, dest.as_deref()).await,

        Commands::Rm { container, name } => cmd_rm(&config_path, &container, &name).await,

        Commands::Exists { container, name } => {
            let exists = cmd_exists(&config_path, &container, &name).await?;
            if !exists {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Stat {
            container,
            name,
            json,
        } => cmd_stat(&config_path, &container, &name, json).await,

        Commands::Meta { action } => match action {
            MetaAction::Get { container, name } => {
                cmd_meta_get(&config_path, &container, &name).await
            }
            MetaAction::Set {
                container,
                name,
                entries,
                remove,
            } => cmd_meta_set(&config_path, &container, &name, entries, remove).await,
        },

        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "axiomstore",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Failed to determine the configuration directory")?;
    Ok(dir.join("axiomstore").join("config.json"))
}

/// Parse a `KEY=VALUE` metadata entry.
fn parse_entry(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

fn load_config(path: &Path) -> Result<ProviderConfig> {
    ProviderConfig::load(path).with_context(|| {
        format!(
            "Failed to load configuration from {} (run `axiomstore init` first)",
            path.display()
        )
    })
}

fn open_provider(config_path: &Path) -> Result<BlobProvider> {
    let config = load_config(config_path)?;
    debug!(config = ?config, "Loaded configuration");
    BlobProvider::from_config(&config, &create_default_registry())
        .context("Failed to construct storage provider")
}

async fn open_container(provider: &BlobProvider, name: &str) -> Result<BlobContainer> {
    provider
        .client()
        .container(name)
        .await
        .with_context(|| format!("Failed to resolve container '{}'", name))?
        .with_context(|| format!("Container not found: {}", name))
}

async fn open_file(container: &BlobContainer, name: &str) -> Result<BlobFile> {
    container
        .file(name)
        .await
        .with_context(|| format!("Failed to resolve file '{}'", name))?
        .with_context(|| format!("File not found: {}/{}", container.name(), name))
}

/// Write a configuration for a local store.
fn cmd_init(
    config_path: &Path,
    root: &Path,
    url_base: Option<String>,
    key: Option<String>,
    generate_key: Option<usize>,
    force: bool,
) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "Configuration already exists at {} (use --force to replace it)",
            config_path.display()
        );
    }

    let transport = LocalTransport::new(root).context("Failed to create store directory")?;
    let root = transport
        .root()
        .canonicalize()
        .context("Failed to resolve store directory")?;

    let url_base = match url_base {
        Some(url) => url,
        None => Url::from_directory_path(&root)
            .map_err(|_| anyhow::anyhow!("Cannot express {} as a URL", root.display()))?
            .to_string(),
    };

    let key = match (key, generate_key) {
        (Some(key), _) => Some(key),
        (None, Some(len)) => Some(
            EncryptionKey::generate(len)
                .context("Failed to generate encryption key")?
                .to_base64(),
        ),
        (None, None) => None,
    };

    let mut config = ProviderConfig::new(ConnectionDescriptor::local(&root), url_base);
    if let Some(key) = key {
        config = config.with_encryption_key(key);
    }

    // Validate before writing anything
    BlobProvider::from_config(&config, &create_default_registry())
        .context("Invalid configuration")?;

    config
        .save(config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    info!("Configuration written to {}", config_path.display());
    println!("Store initialized!");
    println!("  Root: {}", root.display());
    println!("  URL base: {}", config.url_base);
    println!(
        "  Encryption: {}",
        if config.encryption_key.is_some() {
            "key configured"
        } else {
            "none"
        }
    );

    Ok(())
}

/// Create a container in the configured local store.
async fn cmd_mkcontainer(config_path: &Path, name: &str) -> Result<()> {
    let config = load_config(config_path)?;
    if config.connection.kind != "local" {
        bail!(
            "Containers can only be created for local stores, not '{}'",
            config.connection.kind
        );
    }
    let root = config
        .connection
        .setting_str("root")
        .context("Local store configuration has no root")?;

    let created = LocalTransport::new(root)?
        .create_container(name)
        .await
        .with_context(|| format!("Failed to create container '{}'", name))?;

    if created {
        println!("Container created: {}", name);
    } else {
        println!("Container already exists: {}", name);
    }
    Ok(())
}

/// Upload a local file.
async fn cmd_put(
    config_path: &Path,
    container: &str,
    name: &str,
    source: &Path,
    content_type: &str,
    options: CreateFileOptions,
) -> Result<()> {
    info!("Uploading {} to {}/{}", source.display(), container, name);

    let provider = open_provider(config_path)?;
    let container = open_container(&provider, container).await?;

    let reader = tokio::fs::File::open(source)
        .await
        .with_context(|| format!("Failed to open {}", source.display()))?;

    let file = container
        .create_file(name, content_type, Some(reader_stream(reader)), options)
        .await
        .context("Failed to upload file")?;

    println!("File uploaded: {} ({} bytes)", file.uri(), file.size());
    Ok(())
}

/// Download a file to a local path or standard output.
async fn cmd_get(config_path: &Path, container: &str, name: &str, dest: Option<&Path>) -> Result<()> {
    let provider = open_provider(config_path)?;
    let container = open_container(&provider, container).await?;
    let file = open_file(&container, name).await?;

    match dest {
        Some(dest) => {
            let mut target = tokio::fs::File::create(dest)
                .await
                .with_context(|| format!("Failed to create {}", dest.display()))?;
            let written = file
                .download_to(&mut target)
                .await
                .context("Failed to download file")?;
            info!("Downloaded {} bytes to {}", written, dest.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            file.download_to(&mut stdout)
                .await
                .context("Failed to download file")?;
        }
    }
    Ok(())
}

/// Remove a file.
async fn cmd_rm(config_path: &Path, container: &str, name: &str) -> Result<()> {
    let provider = open_provider(config_path)?;
    let container = open_container(&provider, container).await?;

    if container
        .delete_file(name)
        .await
        .context("Failed to remove file")?
    {
        println!("File removed: {}", name);
    } else {
        println!("File did not exist: {}", name);
    }
    Ok(())
}

async fn cmd_exists(config_path: &Path, container: &str, name: &str) -> Result<bool> {
    let provider = open_provider(config_path)?;
    let container = open_container(&provider, container).await?;
    let exists = container.file_exists(name).await?;
    println!("{}", exists);
    Ok(exists)
}

/// Show file attributes.
async fn cmd_stat(config_path: &Path, container: &str, name: &str, json: bool) -> Result<()> {
    let provider = open_provider(config_path)?;
    let container = open_container(&provider, container).await?;
    let file = open_file(&container, name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(file.properties())?);
        return Ok(());
    }

    println!("File Information:");
    println!("  URI: {}", file.uri());
    println!("  Content type: {}", file.content_type());
    println!("  Size: {} bytes", file.size());
    println!("  Modified: {}", file.last_modified().to_rfc3339());
    println!("  ETag: {}", file.etag());
    match &file.properties().encryption {
        Some(info) => println!(
            "  Encryption: {} (key {})",
            info.algorithm, info.key_fingerprint
        ),
        None => println!("  Encryption: none"),
    }
    println!("  Metadata entries: {}", file.properties().metadata.len());
    Ok(())
}

async fn cmd_meta_get(config_path: &Path, container: &str, name: &str) -> Result<()> {
    let provider = open_provider(config_path)?;
    let container = open_container(&provider, container).await?;
    let mut file = open_file(&container, name).await?;

    let metadata = file.metadata().await?;
    let mut entries: Vec<_> = metadata.iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{}={}", key, value);
    }
    Ok(())
}

async fn cmd_meta_set(
    config_path: &Path,
    container: &str,
    name: &str,
    entries: Vec<(String, String)>,
    remove: Vec<String>,
) -> Result<()> {
    let provider = open_provider(config_path)?;
    let container = open_container(&provider, container).await?;
    let mut file = open_file(&container, name).await?;

    let metadata = file.metadata().await?;
    for key in &remove {
        metadata.remove(key);
    }
    let count = entries.len();
    metadata.extend(entries);

    file.save_metadata().await.context("Failed to save metadata")?;
    println!("Metadata updated: {} set, {} removed", count, remove.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_entry() {
        assert_eq!(
            parse_entry("owner=ops").unwrap(),
            ("owner".to_string(), "ops".to_string())
        );
        assert_eq!(
            parse_entry("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert!(parse_entry("novalue").is_err());
        assert!(parse_entry("=x").is_err());
    }

    #[test]
    fn test_meta_set_needs_entries_or_removals() {
        let parsed = Cli::try_parse_from(["axiomstore", "meta", "set", "docs", "a.txt", "--remove", "k"]);
        match parsed.unwrap().command {
            Commands::Meta {
                action: MetaAction::Set { entries, remove, .. },
            } => {
                assert!(entries.is_empty());
                assert_eq!(remove, vec!["k".to_string()]);
            }
            _ => panic!("expected meta set"),
        }

        assert!(Cli::try_parse_from(["axiomstore", "meta", "set", "docs", "a.txt", "k=v"]).is_ok());
        assert!(Cli::try_parse_from(["axiomstore", "meta", "set", "docs", "a.txt"]).is_err());
    }

    #[tokio::test]
    async fn test_init_put_get_cycle() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        let root = dir.path().join("store");

        cmd_init(&config_path, &root, None, None, Some(32), false).unwrap();
        assert!(cmd_init(&config_path, &root, None, None, None, false).is_err());

        cmd_mkcontainer(&config_path, "docs").await.unwrap();

        let source = dir.path().join("in.txt");
        std::fs::write(&source, b"cli payload").unwrap();
        let options = CreateFileOptions::default().encrypted();
        cmd_put(&config_path, "docs", "a.txt", &source, "text/plain", options)
            .await
            .unwrap();

        assert!(cmd_exists(&config_path, "docs", "a.txt").await.unwrap());

        let dest = dir.path().join("out.txt");
        cmd_get(&config_path, "docs", "a.txt", Some(&dest)).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"cli payload");

        cmd_meta_set(
            &config_path,
            "docs",
            "a.txt",
            vec![("k".to_string(), "v".to_string())],
            Vec::new(),
        )
        .await
        .unwrap();

        cmd_rm(&config_path, "docs", "a.txt").await.unwrap();
        assert!(!cmd_exists(&config_path, "docs", "a.txt").await.unwrap());
    }
}
