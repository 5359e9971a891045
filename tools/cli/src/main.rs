//! FileVault CLI - Command line interface for the encrypted file vault.
//!
//! Files are encrypted with a key derived from a password on upload and
//! decrypted on download. The password is never stored.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

use filevault_common::Error;
use filevault_crypto::DEFAULT_ITERATIONS;
use filevault_storage::create_default_registry;
use filevault_vault::{FileId, FileVault, UploadRequest, VaultSettings, SETTINGS_FILENAME};

#[derive(Parser)]
#[command(name = "filevault")]
#[command(about = "FileVault - Password-encrypted file storage")]
#[command(version)]
struct Cli {
    /// Vault directory.
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Owner the files are stored under (default: $USER).
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault.
    Init {
        /// Tag new uploads so wrong passwords and tampering are detected.
        #[arg(long)]
        integrity: bool,

        /// PBKDF2 iteration count for new uploads.
        #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
        iterations: u32,
    },

    /// Encrypt and upload a file.
    Put {
        /// File to upload.
        file: PathBuf,

        /// Name to store the file under (default: the file name).
        #[arg(short, long)]
        name: Option<String>,

        /// Declared content type.
        #[arg(short, long, default_value = "application/octet-stream")]
        content_type: String,
    },

    /// Download and decrypt a file.
    Get {
        /// File id.
        id: String,

        /// Output path, which must not exist (default: the stored file name in
        /// the current directory).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt a file to stdout.
    Cat {
        /// File id.
        id: String,
    },

    /// Delete a file.
    Rm {
        /// File id.
        id: String,
    },

    /// List stored files.
    Ls,

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let vault_dir = match cli.vault {
        Some(dir) => dir,
        None => default_vault_dir()?,
    };
    let owner = cli.owner.unwrap_or_else(default_owner);

    match cli.command {
        Commands::Init {
            integrity,
            iterations,
        } => cmd_init(&vault_dir, integrity, iterations).await,

        Commands::Put {
            file,
            name,
            content_type,
        } => cmd_put(&vault_dir, &owner, &file, name, content_type).await,

        Commands::Get { id, output } => cmd_get(&vault_dir, &owner, &id, output).await,

        Commands::Cat { id } => cmd_cat(&vault_dir, &owner, &id).await,

        Commands::Rm { id } => cmd_rm(&vault_dir, &owner, &id).await,

        Commands::Ls => cmd_ls(&vault_dir, &owner).await,

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "filevault", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn default_vault_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("filevault"))
        .context("Could not determine data directory; pass --vault")
}

fn default_owner() -> String {
    std::env::var("USER")
        .ok()
        .filter(|user| !user.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password.into_bytes()))
}

fn parse_id(id: &str) -> Result<FileId> {
    id.parse().context("Invalid file id")
}

/// Download target when `-o` is not given: the last component of the stored
/// name, or the file id if the name has none.
fn default_output_path(original_name: &str, id: &FileId) -> PathBuf {
    Path::new(original_name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(id.to_string()))
}

/// Write decrypted data to a file that must not exist yet.
async fn write_new_file(path: &Path, data: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut out = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    out.write_all(data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    out.flush()
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load the vault's settings and open it.
async fn open_vault(vault_dir: &Path) -> Result<FileVault> {
    let settings_path = vault_dir.join(SETTINGS_FILENAME);
    let settings = match VaultSettings::load(&settings_path).await {
        Ok(settings) => settings,
        Err(Error::NotFound(_)) => anyhow::bail!(
            "No vault at {}. Run `filevault init` first.",
            vault_dir.display()
        ),
        Err(e) => return Err(e).context("Failed to load vault settings"),
    };

    let registry = create_default_registry();
    FileVault::open(settings, &registry)
        .await
        .context("Failed to open vault")
}

/// Create a new vault.
async fn cmd_init(vault_dir: &Path, integrity: bool, iterations: u32) -> Result<()> {
    let settings_path = vault_dir.join(SETTINGS_FILENAME);
    if tokio::fs::try_exists(&settings_path)
        .await
        .context("Failed to check vault directory")?
    {
        anyhow::bail!("Vault already exists at {}", vault_dir.display());
    }

    let settings = VaultSettings::local(vault_dir)
        .with_integrity(integrity)
        .with_iterations(iterations);
    settings.validate().context("Invalid vault settings")?;
    settings
        .save(&settings_path)
        .await
        .context("Failed to write vault settings")?;

    info!(path = %vault_dir.display(), integrity, iterations, "Vault created");

    println!("Vault created successfully!");
    println!("  Location: {}", vault_dir.display());
    println!("  Iterations: {}", iterations);
    println!("  Integrity tags: {}", if integrity { "on" } else { "off" });

    Ok(())
}

/// Encrypt and upload a file.
async fn cmd_put(
    vault_dir: &Path,
    owner: &str,
    file: &Path,
    name: Option<String>,
    content_type: String,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Cannot derive a name from the file path; pass --name")?,
    };

    let vault = open_vault(vault_dir).await?;

    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let password = prompt_password("Enter password: ")?;
    let confirm = prompt_password("Confirm password: ")?;

    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    let request = UploadRequest::new(name, content).with_content_type(content_type);
    let record = vault
        .upload(owner, request, &password)
        .await
        .context("Failed to upload file")?;

    println!("File uploaded successfully!");
    println!("  ID: {}", record.id);
    println!("  Name: {}", record.original_name);
    println!("  Size: {} bytes", record.size);

    Ok(())
}

/// Download and decrypt a file.
async fn cmd_get(vault_dir: &Path, owner: &str, id: &str, output: Option<PathBuf>) -> Result<()> {
    let id = parse_id(id)?;
    let vault = open_vault(vault_dir).await?;
    let password = prompt_password("Enter password: ")?;

    let file = vault
        .download(owner, &id, &password)
        .await
        .context("Failed to decrypt file")?;

    let dest = output.unwrap_or_else(|| default_output_path(&file.record.original_name, &id));
    write_new_file(&dest, file.data.as_bytes()).await?;

    println!(
        "File downloaded successfully: {} ({} bytes)",
        dest.display(),
        file.data.len()
    );
    if !file.record.is_sealed() {
        println!("  Note: this file has no integrity tag; a wrong password yields garbage, not an error.");
    }

    Ok(())
}

/// Decrypt a file to stdout.
async fn cmd_cat(vault_dir: &Path, owner: &str, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let vault = open_vault(vault_dir).await?;
    let password = prompt_password("Enter password: ")?;

    let file = vault
        .download(owner, &id, &password)
        .await
        .context("Failed to decrypt file")?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(file.data.as_bytes())
        .and_then(|_| stdout.flush())
        .context("Failed to write to stdout")?;

    Ok(())
}

/// Delete a file.
async fn cmd_rm(vault_dir: &Path, owner: &str, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let vault = open_vault(vault_dir).await?;
    let record = vault.get(owner, &id).await.context("File not found")?;
    let password = prompt_password("Enter password: ")?;

    vault
        .delete(owner, &id, &password)
        .await
        .context("Failed to delete file")?;

    println!("File deleted: {} ({})", record.original_name, record.id);

    Ok(())
}

/// List stored files.
async fn cmd_ls(vault_dir: &Path, owner: &str) -> Result<()> {
    let vault = open_vault(vault_dir).await?;
    let records = vault.list(owner).await;

    if records.is_empty() {
        println!("No files stored for {}.", owner);
        return Ok(());
    }

    println!("Files of {}:", owner);
    for record in &records {
        let created = record.created_at.with_timezone(&chrono::Local);
        println!(
            "  {}  {:>10}  {}  {}  {}{}",
            record.id,
            record.size,
            created.format("%Y-%m-%d %H:%M"),
            record.content_type,
            record.original_name,
            if record.is_sealed() { "" } else { " [untagged]" },
        );
    }

    let usage = vault.usage(owner).await;
    println!("\n{} file(s), {} bytes total", usage.files, usage.total_size);

    Ok(())
}
