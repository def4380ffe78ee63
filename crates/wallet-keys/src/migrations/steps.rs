//! Registered migration steps, in version order

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Migration, MigrationContext};
use crate::address::Address;
use crate::derive::WalletKind;
use crate::error::Result;
use crate::local::{ColorRef, Contact, UserList, IMAGE_METADATA};
use crate::model::{Account, Wallet, WalletCollection, DEFAULT_WALLET_NAME};
use crate::profile;
use crate::storage::keys;

const WALLET_COLORS_MIGRATED: &str = "profileColorsMigrated.wallets";
const CONTACT_COLORS_MIGRATED: &str = "profileColorsMigrated.contacts";
/// Pre-remap copies, so a retry never remaps already-new indices
const WALLET_COLORS_SNAPSHOT: &str = "profileColorsMigrated.walletsSource";
const CONTACT_COLORS_SNAPSHOT: &str = "profileColorsMigrated.contactsSource";

type Contacts = IndexMap<String, Contact>;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;
const TWO_WEEKS_MILLIS: i64 = 14 * DAY_MILLIS;
const TWO_MONTHS_MILLIS: i64 = 2 * 30 * DAY_MILLIS;

pub fn builtin_steps() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(ResaveAddress),
        Box::new(SingleToMultiWallet),
        Box::new(EnsurePrimaryWallet),
        Box::new(Reserved),
        Box::new(Reserved),
        Box::new(ClearFalseDamage),
        Box::new(StablecoinsList),
        Box::new(EnableWebData),
        Box::new(WipeImageMetadata),
        Box::new(ProfileColors),
        Box::new(ContactEmojis),
        Box::new(ResetReviewTimer),
        Box::new(L2CoinIds),
    ]
}

/// Re-save the address with the device-only access policy
struct ResaveAddress;

#[async_trait]
impl Migration for ResaveAddress {
    fn description(&self) -> &'static str {
        "re-save address with device-only access"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        if let Some(address) = ctx.repo.load_address().await? {
            ctx.repo.save_address(&address).await?;
        }
        Ok(())
    }
}

/// Wrap the address of a single-wallet install into a wallet record
struct SingleToMultiWallet;

#[async_trait]
impl Migration for SingleToMultiWallet {
    fn description(&self) -> &'static str {
        "single wallet to multi-wallet"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let repo = ctx.repo;
        if repo.get_selected_wallet().await?.is_some() {
            return Ok(());
        }
        let Some(address) = repo.load_address().await? else {
            return Ok(());
        };

        let mut wallets = repo.get_all_wallets().await?.unwrap_or_default();
        if let Some(existing) = wallets.values().find(|w| w.account(&address).is_some()) {
            debug!("Address already owned by {}, selecting it", existing.id);
            return repo.set_selected_wallet(existing).await;
        }

        let id = format!("wallet_{}", Uuid::new_v4().simple());
        let color = profile::address_hashed_color_index(&address);
        let wallet = Wallet {
            id: id.clone(),
            kind: WalletKind::Mnemonic,
            imported: false,
            primary: true,
            backed_up: false,
            backup_date: None,
            backup_type: None,
            backup_file: None,
            name: DEFAULT_WALLET_NAME.to_string(),
            color: 0,
            addresses: vec![Account::new(0, address, color, "")],
            damaged: false,
        };
        wallets.insert(id.clone(), wallet.clone());

        repo.save_all_wallets(&wallets).await?;
        repo.set_selected_wallet(&wallet).await?;
        info!("Created wallet {} for legacy address {}", id, address);
        Ok(())
    }
}

/// Only primary wallets may create new accounts
struct EnsurePrimaryWallet;

#[async_trait]
impl Migration for EnsurePrimaryWallet {
    fn description(&self) -> &'static str {
        "ensure a primary wallet"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let Some(mut wallets) = ctx.repo.get_all_wallets().await? else {
            return Ok(());
        };
        if wallets.values().any(|w| w.primary) {
            return Ok(());
        }

        let candidate = wallets
            .values()
            .find(|w| w.kind == WalletKind::Mnemonic && !w.imported)
            .or_else(|| wallets.values().find(|w| w.kind == WalletKind::Mnemonic))
            .map(|w| w.id.clone());

        if let Some(id) = candidate {
            if let Some(wallet) = wallets.get_mut(&id) {
                wallet.primary = true;
            }
            info!("Wallet {} is now primary", id);
            ctx.repo.update_wallets(&wallets).await?;
        }
        Ok(())
    }
}

/// Slot kept so later version numbers stay stable
struct Reserved;

#[async_trait]
impl Migration for Reserved {
    fn description(&self) -> &'static str {
        "reserved"
    }

    async fn apply(&self, _ctx: &MigrationContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Undo damage flags raised while the legacy seed was still unmigrated
struct ClearFalseDamage;

#[async_trait]
impl Migration for ClearFalseDamage {
    fn description(&self) -> &'static str {
        "clear damage flags raised before secret migration"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let repo = ctx.repo;
        let Some(mut wallets) = repo.get_all_wallets().await? else {
            return Ok(());
        };
        if repo.secrets_migrated().await? || !repo.store().has_key(keys::SEED_PHRASE).await? {
            return Ok(());
        }

        let mut cleared = 0;
        for wallet in wallets.values_mut().filter(|w| w.damaged && !w.imported) {
            wallet.damaged = false;
            cleared += 1;
        }
        if cleared > 0 {
            info!("Cleared {} incorrect damage flag(s)", cleared);
            repo.update_wallets(&wallets).await?;
        }
        Ok(())
    }
}

struct StablecoinsList;

#[async_trait]
impl Migration for StablecoinsList {
    fn description(&self) -> &'static str {
        "replace dollars list with stablecoins"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let local = ctx.repo.local();
        let Some(lists) = local.user_lists().await else {
            return Ok(());
        };
        let lists: Vec<UserList> = lists
            .into_iter()
            .map(|list| if list.id == "dollars" { UserList::stablecoins() } else { list })
            .collect();
        local.save_user_lists(&lists).await
    }
}

struct EnableWebData;

#[async_trait]
impl Migration for EnableWebData {
    fn description(&self) -> &'static str {
        "enable web profile data for owned accounts"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let Some(wallets) = ctx.repo.get_all_wallets().await? else {
            return Ok(());
        };
        for wallet in wallets.values().filter(|w| !w.kind.is_read_only()) {
            for account in &wallet.addresses {
                debug!("Enabling web profile for {}", account.address);
                ctx.repo
                    .local()
                    .set_web_data_enabled(true, &account.address, ctx.network)
                    .await?;
            }
        }
        Ok(())
    }
}

struct WipeImageMetadata;

#[async_trait]
impl Migration for WipeImageMetadata {
    fn description(&self) -> &'static str {
        "wipe cached image metadata"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        ctx.repo.local().remove(IMAGE_METADATA).await
    }
}

/// Colour after the palette change. Emoji-less labels switch to the
/// address-derived colour; anything the legacy table cannot map does too.
fn migrated_account_color(account: &Account) -> u32 {
    let hashed = profile::address_hashed_color_index(&account.address);
    if profile::first_emoji(&account.label).is_none() {
        return hashed;
    }
    profile::remap_legacy_color(account.color).unwrap_or(hashed)
}

fn migrated_contact_color(color: &ColorRef, address: Option<&Address>) -> u32 {
    let legacy = match color {
        ColorRef::Index(index) => Some(*index),
        ColorRef::Hex(hex) => profile::legacy_color_index(hex),
    };
    legacy
        .and_then(profile::remap_legacy_color)
        .or_else(|| address.map(profile::address_hashed_color_index))
        .unwrap_or(0)
}

/// Move account and contact colours onto the profile palette and give
/// accounts an emoji. The remap cannot be applied twice, so each half
/// works from a snapshot taken before its first write and is marked done
/// separately.
struct ProfileColors;

#[async_trait]
impl Migration for ProfileColors {
    fn description(&self) -> &'static str {
        "remap colours to the profile palette"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let repo = ctx.repo;
        let local = repo.local();

        if !local.contains(WALLET_COLORS_MIGRATED).await {
            let source = match local.get::<WalletCollection>(WALLET_COLORS_SNAPSHOT).await {
                Some(snapshot) => {
                    debug!("Resuming wallet colour remap from snapshot");
                    Some(snapshot)
                }
                None => {
                    let current = repo.get_all_wallets().await?;
                    if let Some(current) = &current {
                        local.set(WALLET_COLORS_SNAPSHOT, current).await?;
                    }
                    current
                }
            };
            if let Some(mut wallets) = source {
                for wallet in wallets.values_mut() {
                    for account in wallet.addresses.iter_mut() {
                        account.color = migrated_account_color(account);
                        account.label = profile::label_with_emoji(&account.address, &account.label);
                    }
                }
                repo.update_wallets(&wallets).await?;
            }
            local.set(WALLET_COLORS_MIGRATED, &true).await?;
            local.remove(WALLET_COLORS_SNAPSHOT).await?;
        }

        if !local.contains(CONTACT_COLORS_MIGRATED).await {
            let source = match local.get::<Contacts>(CONTACT_COLORS_SNAPSHOT).await {
                Some(snapshot) => {
                    debug!("Resuming contact colour remap from snapshot");
                    Some(snapshot)
                }
                None => {
                    let current = local.contacts().await;
                    if let Some(current) = &current {
                        local.set(CONTACT_COLORS_SNAPSHOT, current).await?;
                    }
                    current
                }
            };
            if let Some(mut contacts) = source {
                for contact in contacts.values_mut() {
                    let address = contact.address.parse::<Address>().ok();
                    contact.color = ColorRef::Index(migrated_contact_color(&contact.color, address.as_ref()));
                }
                local.save_contacts(&contacts).await?;
            }
            local.set(CONTACT_COLORS_MIGRATED, &true).await?;
            local.remove(CONTACT_COLORS_SNAPSHOT).await?;
        }
        Ok(())
    }
}

struct ContactEmojis;

#[async_trait]
impl Migration for ContactEmojis {
    fn description(&self) -> &'static str {
        "give contacts an address emoji"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let local = ctx.repo.local();
        let Some(mut contacts) = local.contacts().await else {
            return Ok(());
        };

        for contact in contacts.values_mut() {
            if profile::first_emoji(&contact.nickname).is_some() {
                continue;
            }
            // names need a resolver, which startup does not have
            let Ok(address) = contact.address.parse::<Address>() else {
                debug!("Skipping contact {}: not an address", contact.address);
                continue;
            };
            contact.nickname = profile::label_with_emoji(&address, &contact.nickname);
            contact.color = ColorRef::Index(profile::address_hashed_color_index(&address));
        }
        local.save_contacts(&contacts).await
    }
}

struct ResetReviewTimer;

#[async_trait]
impl Migration for ResetReviewTimer {
    fn description(&self) -> &'static str {
        "reset review prompt timer"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let local = ctx.repo.local();
        let now = chrono::Utc::now().timestamp_millis();
        if local.review_asked().await.unwrap_or(0) > now - TWO_WEEKS_MILLIS {
            return Ok(());
        }
        local.set_review_asked(now - TWO_MONTHS_MILLIS).await
    }
}

/// Rewrite pinned and hidden L2 coin ids to `{address}_{network}`
struct L2CoinIds;

#[async_trait]
impl Migration for L2CoinIds {
    fn description(&self) -> &'static str {
        "key pinned and hidden L2 coins by network"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let Some(wallets) = ctx.repo.get_all_wallets().await? else {
            return Ok(());
        };
        let local = ctx.repo.local();
        let network = ctx.network;

        for account in wallets.values().flat_map(|w| w.addresses.iter()) {
            let address = &account.address;
            let assets = local.assets(address, network).await;
            let rewrite = |coins: Vec<String>| -> Vec<String> {
                coins
                    .into_iter()
                    .map(|id| {
                        assets
                            .iter()
                            .find(|asset| asset.address.eq_ignore_ascii_case(&id))
                            .map_or(id, |asset| asset.coin_id())
                    })
                    .collect::<IndexSet<_>>()
                    .into_iter()
                    .collect()
            };

            let pinned = rewrite(local.pinned_coins(address, network).await);
            let hidden = rewrite(local.hidden_coins(address, network).await);
            local.save_pinned_coins(&pinned, address, network).await?;
            local.save_hidden_coins(&hidden, address, network).await?;
        }
        Ok(())
    }
}
