use std::path::Path;
use std::sync::Arc;

use wallet_keys::{
    Authenticator, EncryptedFileStorage, FixedPin, IntegrityChecker, KdfParams, LocalStore, MigrationRunner,
    NewWallet, NoHistory, SecretStore, Settings, TrustedDevice, WalletError, WalletRepository,
};

const PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn cheap_settings() -> Settings {
    let kdf = KdfParams {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    };
    Settings {
        pin_kdf: kdf,
        store_kdf: kdf,
        ..Settings::default()
    }
}

async fn open(dir: &Path, passphrase: &str, auth: Arc<dyn Authenticator>) -> wallet_keys::Result<WalletRepository> {
    let settings = cheap_settings();
    let storage = EncryptedFileStorage::with_dir(dir.join("secrets"))?;
    storage.unlock(passphrase, settings.store_kdf).await?;

    Ok(WalletRepository::new(
        SecretStore::new(Arc::new(storage)),
        Arc::new(LocalStore::open(dir)?),
        Arc::new(NoHistory),
        auth,
        settings,
    ))
}

#[tokio::test]
async fn test_startup_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let repo = open(dir.path(), "correct horse", Arc::new(TrustedDevice)).await.unwrap();
    let runner = MigrationRunner::new();
    assert_eq!(runner.run(&repo).await.unwrap().applied, runner.target_version());

    let init = repo.init(NewWallet::generate(), "mainnet").await.unwrap();
    assert!(init.is_new);
    let address = init.wallet_address.unwrap();
    assert!(IntegrityChecker::new(&repo).check().await.unwrap().healthy);
    drop(repo);

    let repo = open(dir.path(), "correct horse", Arc::new(TrustedDevice)).await.unwrap();
    assert_eq!(runner.run(&repo).await.unwrap().applied, 0);

    let again = repo.init(NewWallet::generate(), "mainnet").await.unwrap();
    assert!(!again.is_new);
    assert_eq!(again.wallet_address, Some(address));

    let state = repo.wallets_load_state(None).await.unwrap().unwrap();
    assert_eq!(state.wallets.len(), 1);
    assert_eq!(state.account_address, address);
    assert!(repo.load_private_key(None).await.unwrap().is_some());
}

#[tokio::test]
async fn test_wrong_store_passphrase_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open(dir.path(), "correct horse", Arc::new(TrustedDevice)).await.unwrap();
    repo.init(NewWallet::generate(), "mainnet").await.unwrap();
    drop(repo);

    let result = open(dir.path(), "battery staple", Arc::new(TrustedDevice)).await;
    assert!(matches!(result, Err(WalletError::InvalidPassphrase)));
}

#[tokio::test]
async fn test_pin_protected_import_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let pin: Arc<dyn Authenticator> = Arc::new(FixedPin::new(Some("2468".to_string())));

    let repo = open(dir.path(), "passphrase", pin.clone()).await.unwrap();
    MigrationRunner::new().run(&repo).await.unwrap();
    let created = repo.create_wallet(NewWallet::import(PHRASE)).await.unwrap();
    drop(repo);

    let raw = std::fs::read_to_string(dir.path().join("secrets").join("secrets.json")).unwrap();
    assert!(!raw.contains("abandon"));

    let repo = open(dir.path(), "passphrase", pin).await.unwrap();
    let seed = repo
        .load_seed_phrase_and_migrate_if_needed(&created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seed.expose(), PHRASE);

    let wrong = open(dir.path(), "passphrase", Arc::new(FixedPin::new(Some("1111".to_string()))))
        .await
        .unwrap();
    assert!(wrong.load_private_key(Some(&created.address)).await.is_err());
}
