//! wallet-keys CLI
//!
//! Runs the startup sequence (migrations, wallet load, integrity check)
//! against a data directory and exposes the wallet operations as
//! subcommands. Secrets live in an encrypted file under the data directory
//! unless `--keychain` selects the OS keychain.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use wallet_keys::{
    Address, Authenticator, BackupType, EncryptedFileStorage, FixedPin, IntegrityChecker, KeychainStorage,
    LocalStore, MigrationRunner, NewWallet, NoHistory, SecretStore, SecureStorage, SettingsManager,
    TrustedDevice, WalletRepository,
};

/// Wallet key management from the command line
#[derive(Parser, Debug)]
#[command(name = "wallet-keys")]
#[command(version)]
#[command(about = "Create, import and inspect HD wallets")]
struct Args {
    /// Data directory (defaults to the platform data directory)
    #[arg(long, env = "WALLET_KEYS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Store secrets in the OS keychain instead of the encrypted file
    #[arg(long)]
    keychain: bool,

    /// Passphrase for the encrypted secret file
    #[arg(long, env = "WALLET_KEYS_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// PIN used to encrypt secrets. Without it the store is trusted to
    /// gate access on its own.
    #[arg(long, env = "WALLET_KEYS_PIN", hide_env_values = true)]
    pin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Wallet(WalletCommand),
    /// Show or change the persisted settings
    Config {
        #[arg(long)]
        network: Option<String>,
        /// Seconds allowed for one history lookup during account discovery
        #[arg(long)]
        discovery_timeout: Option<u64>,
        /// Restore the defaults
        #[arg(long, conflicts_with_all = ["network", "discovery_timeout"])]
        reset: bool,
    },
}

/// Commands that open the secret store
#[derive(Subcommand, Debug)]
enum WalletCommand {
    /// Load the wallet, creating one on first run or importing a secret
    Init {
        /// Mnemonic, hex seed, private key or address to import
        #[arg(long, env = "WALLET_KEYS_IMPORT", hide_env_values = true)]
        import: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<u32>,
        /// Replace a wallet that already holds the imported address
        #[arg(long)]
        overwrite: bool,
    },
    /// Print the wallet collection and the selected account
    List,
    /// Derive the next account of a wallet
    AddAccount {
        wallet_id: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        color: Option<u32>,
    },
    /// Record a manual backup of a wallet
    BackedUp { wallet_id: String },
    /// Print the private key of an account (the selected one by default)
    ExportKey { address: Option<String> },
    /// Verify that every wallet still has its secrets
    Check,
    /// Delete the top-level wallet records
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => EncryptedFileStorage::default_storage_dir()?,
    };
    std::fs::create_dir_all(&data_dir)?;
    let mut settings_manager = SettingsManager::new(&data_dir);

    let command = match args.command {
        Command::Wallet(command) => command,
        Command::Config {
            network,
            discovery_timeout,
            reset,
        } => {
            if reset {
                settings_manager.reset().await?;
            } else if network.is_some() || discovery_timeout.is_some() {
                settings_manager
                    .update(|s| {
                        if let Some(network) = network {
                            s.network = network;
                        }
                        if let Some(secs) = discovery_timeout {
                            s.discovery_timeout_secs = secs;
                        }
                    })
                    .await?;
            }
            println!("{}", serde_json::to_string_pretty(settings_manager.get())?);
            return Ok(());
        }
    };
    let settings = settings_manager.get().clone();

    let mut file_store = None;
    let backend: Arc<dyn SecureStorage> = if args.keychain {
        let keychain = KeychainStorage::new(None);
        if !keychain.is_available() {
            return Err("OS keychain is not available".into());
        }
        Arc::new(keychain)
    } else {
        let storage = Arc::new(EncryptedFileStorage::with_dir(data_dir.join("secrets"))?);
        let passphrase = match args.passphrase {
            Some(passphrase) => passphrase,
            None => rpassword::prompt_password("Store passphrase: ")?,
        };
        storage
            .unlock(&passphrase, settings.store_kdf)
            .await
            .map_err(|e| format!("Failed to unlock secret store: {}", e))?;
        file_store = Some(storage.clone());
        storage
    };
    let store = SecretStore::new(backend);
    info!(
        "Using {} (hardware backed: {})",
        store.backend_name(),
        store.is_hardware_backed()
    );

    let auth: Arc<dyn Authenticator> = match args.pin {
        Some(pin) => Arc::new(FixedPin::new(Some(pin))),
        None => Arc::new(TrustedDevice),
    };
    let network = settings.network.clone();
    let repo = WalletRepository::new(
        store,
        Arc::new(LocalStore::open(&data_dir)?),
        Arc::new(NoHistory),
        auth,
        settings,
    );

    let result = run(&repo, command, &network).await;
    if let Some(storage) = file_store {
        storage.lock().await;
    }
    result
}

/// Migrate, then execute one wallet command
async fn run(
    repo: &WalletRepository,
    command: WalletCommand,
    network: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = MigrationRunner::new().run(repo).await?;
    if outcome.applied > 0 {
        info!("Applied {} migration(s), now at v{}", outcome.applied, outcome.to);
    }

    match command {
        WalletCommand::Init {
            import,
            name,
            color,
            overwrite,
        } => {
            let mut new = match import {
                Some(seed) => NewWallet::import(seed),
                None => NewWallet::generate(),
            }
            .overwrite(overwrite);
            if let Some(name) = name {
                new = new.with_name(name);
            }
            if let Some(color) = color {
                new = new.with_color(color);
            }

            let initialized = repo.init(new, network).await?;
            let Some(address) = initialized.wallet_address else {
                return Err("Wallet could not be created or imported".into());
            };
            if repo.local().keychain_integrity_state().await.is_none() {
                IntegrityChecker::new(repo).check().await?;
            }
            if initialized.is_new {
                println!("Created wallet {}", address);
            } else {
                println!("Wallet ready at {}", address);
            }
        }
        WalletCommand::List => match repo.wallets_load_state(None).await? {
            Some(state) => {
                println!("{}", serde_json::to_string_pretty(&state.wallets)?);
                println!("selected: {} ({})", state.account_address, state.selected.id);
            }
            None => println!("No wallets"),
        },
        WalletCommand::AddAccount {
            wallet_id,
            name,
            color,
        } => {
            let account = repo.create_account_for_wallet(&wallet_id, color, &name).await?;
            println!("Added account {} at index {}", account.address, account.index);
        }
        WalletCommand::BackedUp { wallet_id } => {
            repo.set_wallet_backed_up(&wallet_id, BackupType::Manual, None).await?;
            println!("Wallet {} marked as backed up", wallet_id);
        }
        WalletCommand::ExportKey { address } => {
            let address = match address {
                Some(raw) => Some(
                    raw.parse::<Address>()
                        .map_err(|e| format!("Invalid address {}: {}", raw, e))?,
                ),
                None => None,
            };
            match repo.load_private_key(address.as_ref()).await {
                Ok(Some(private_key)) => println!("{}", private_key.expose()),
                Ok(None) => return Err("No private key stored for this account".into()),
                Err(e) if e.is_auth_failure() => {
                    return Err(format!("{} (PIN-protected stores need --pin)", e).into())
                }
                Err(e) => return Err(e.into()),
            }
        }
        WalletCommand::Check => {
            let report = IntegrityChecker::new(repo).check().await?;
            println!("{}", if report.healthy { "healthy" } else { "problems found" });
            for id in &report.damaged {
                println!("damaged: {}", id);
            }
            if !report.has_address {
                println!("no selected address");
            }
        }
        WalletCommand::Reset => {
            if !repo.clean_up_wallet_keys().await {
                warn!("Secret store unreachable, some records may remain");
            }
            println!("Wallet records removed");
        }
    }

    Ok(())
}
