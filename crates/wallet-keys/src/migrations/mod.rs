//! Versioned startup migrations
//!
//! Step `i` runs only while the persisted version equals `i`, and the
//! version moves to `i + 1` only after the step returns `Ok`. A failing
//! step stops the run; completed steps are not rolled back, and the next
//! run retries the failed step. Steps read everything they change from
//! persisted state so that a retry after a crash is harmless.

mod steps;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::{Result, WalletError};
use crate::repository::WalletRepository;

pub use steps::builtin_steps;

pub struct MigrationContext<'a> {
    pub repo: &'a WalletRepository,
    pub network: &'a str,
}

#[async_trait]
pub trait Migration: Send + Sync {
    fn description(&self) -> &'static str;

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub from: usize,
    pub to: usize,
    pub applied: usize,
}

pub struct MigrationRunner {
    steps: Vec<Box<dyn Migration>>,
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRunner {
    /// Runner with every registered step
    pub fn new() -> Self {
        Self::with_steps(builtin_steps())
    }

    pub fn with_steps(steps: Vec<Box<dyn Migration>>) -> Self {
        Self { steps }
    }

    /// Version reached once every step has run
    pub fn target_version(&self) -> usize {
        self.steps.len()
    }

    pub async fn run(&self, repo: &WalletRepository) -> Result<MigrationOutcome> {
        let local = repo.local();
        let from = local.migration_version().await;
        let target = self.target_version();

        if from >= target {
            debug!("Migrations up to date at v{}", from);
            return Ok(MigrationOutcome {
                from,
                to: from,
                applied: 0,
            });
        }

        let network = repo.settings().network.clone();
        let ctx = MigrationContext {
            repo,
            network: &network,
        };

        let mut applied = 0;
        for (version, step) in self.steps.iter().enumerate().skip(from) {
            info!("Running migration v{}: {}", version, step.description());
            if let Err(e) = step.apply(&ctx).await {
                error!("Migration v{} failed: {}", version, e);
                return Err(WalletError::MigrationStepFailure {
                    version,
                    source: Box::new(e),
                });
            }
            local.set_migration_version(version + 1).await?;
            applied += 1;
        }

        info!("Migrated from v{} to v{}", from, target);
        Ok(MigrationOutcome {
            from,
            to: target,
            applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TrustedDevice;
    use crate::history::NoHistory;
    use crate::local::LocalStore;
    use crate::settings::Settings;
    use crate::storage::{MemoryStorage, SecretStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Migration for Counting {
        fn description(&self) -> &'static str {
            "count"
        }

        async fn apply(&self, _ctx: &MigrationContext<'_>) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails on the first `failures` attempts
    struct Flaky {
        attempts: Arc<AtomicUsize>,
        failures: usize,
    }

    #[async_trait]
    impl Migration for Flaky {
        fn description(&self) -> &'static str {
            "flaky"
        }

        async fn apply(&self, _ctx: &MigrationContext<'_>) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(WalletError::StoreUnavailable("not yet".to_string()));
            }
            Ok(())
        }
    }

    fn repo() -> WalletRepository {
        WalletRepository::new(
            SecretStore::new(Arc::new(MemoryStorage::new())),
            Arc::new(LocalStore::in_memory()),
            Arc::new(NoHistory),
            Arc::new(TrustedDevice),
            Settings::default(),
        )
    }

    #[tokio::test]
    async fn test_runs_once() {
        let repo = repo();
        let count = Arc::new(AtomicUsize::new(0));
        let runner = MigrationRunner::with_steps(vec![
            Box::new(Counting(count.clone())),
            Box::new(Counting(count.clone())),
        ]);

        let first = runner.run(&repo).await.unwrap();
        assert_eq!(first, MigrationOutcome { from: 0, to: 2, applied: 2 });
        assert_eq!(repo.local().migration_version().await, 2);

        let second = runner.run(&repo).await.unwrap();
        assert_eq!(second, MigrationOutcome { from: 2, to: 2, applied: 0 });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_halts_and_is_retried() {
        let repo = repo();
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let attempts = Arc::new(AtomicUsize::new(0));
        let runner = MigrationRunner::with_steps(vec![
            Box::new(Counting(before.clone())),
            Box::new(Flaky {
                attempts: attempts.clone(),
                failures: 1,
            }),
            Box::new(Counting(after.clone())),
        ]);

        let err = runner.run(&repo).await.unwrap_err();
        assert!(matches!(err, WalletError::MigrationStepFailure { version: 1, .. }));
        assert_eq!(repo.local().migration_version().await, 1);
        assert_eq!(after.load(Ordering::SeqCst), 0);

        let outcome = runner.run(&repo).await.unwrap();
        assert_eq!(outcome, MigrationOutcome { from: 1, to: 3, applied: 2 });
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_builtin_steps_on_empty_install() {
        let repo = repo();
        let runner = MigrationRunner::new();

        let outcome = runner.run(&repo).await.unwrap();
        assert_eq!(outcome.to, runner.target_version());
        assert_eq!(outcome.applied, 13);
        assert!(repo.get_all_wallets().await.unwrap().is_none());
    }
}
