//! Release lifecycle orchestration
//!
//! Builds the next release of a scope for apply, destroy and rollback, and
//! records phase progress. At most one release per scope may be in flight:
//! a new one can only start once the latest has `Succeeded` or `Failed`.
//!
//! The free functions are lock-free building blocks. [`ReleaseManager`]
//! wraps them in a process-local mutex so that two callers in the same
//! process cannot both observe a finished latest release and race for the
//! same next revision. Across processes the store's `create` check is the
//! only guard: the loser sees `ReleaseAlreadyExist` and must start over.

use tokio::sync::Mutex;
use tracing::{info, warn};

use stackyard_core::{Release, ReleasePhase, Spec, State};

use crate::error::{ReleaseError, Result};
use crate::storage::ReleaseStorage;

/// Build the next apply release, not yet persisted
///
/// The first release of a scope starts from an empty state. Later ones carry
/// the previous release's state forward; the spec is attached by the caller.
pub async fn new_apply_release<S>(
    storage: &S,
    project: &str,
    stack: &str,
    workspace: &str,
) -> Result<Release>
where
    S: ReleaseStorage + ?Sized,
{
    check_scope(storage, project, workspace)?;
    let latest_revision = storage.get_latest_revision().await;

    let state = if latest_revision == 0 {
        State::default()
    } else {
        let latest = storage.get(latest_revision).await?;
        ensure_finished(&latest)?;
        latest.state.unwrap_or_default()
    };

    let mut release = Release::new(project, workspace, stack, latest_revision + 1);
    release.state = Some(state);
    Ok(release)
}

/// Build and persist the next destroy release
///
/// The latest state becomes the spec handed to the destroy engine. With
/// nothing left to destroy the release is recorded as already `Succeeded`.
pub async fn create_destroy_release<S>(
    storage: &S,
    project: &str,
    stack: &str,
    workspace: &str,
) -> Result<Release>
where
    S: ReleaseStorage + ?Sized,
{
    check_scope(storage, project, workspace)?;
    let latest = latest_release_or_err(storage).await?;
    ensure_finished(&latest)?;

    let state = latest.state.unwrap_or_default();
    let mut release = Release::new(project, workspace, stack, latest.revision + 1);
    release.spec = Some(Spec::new(state.resources.clone()));
    release.phase = if state.is_empty() {
        ReleasePhase::Succeeded
    } else {
        ReleasePhase::Previewing
    };
    release.state = Some(state);

    storage.create(&release).await?;
    Ok(release)
}

/// Build a release re-applying the spec and state of `target_revision`
///
/// The result is the next revision in `Generating`, not yet persisted.
pub async fn create_rollback_release<S>(storage: &S, target_revision: u64) -> Result<Release>
where
    S: ReleaseStorage + ?Sized,
{
    let latest = latest_release_or_err(storage).await?;
    ensure_finished(&latest)?;

    let target = storage.get(target_revision).await?;
    let mut release = Release::new(
        storage.project(),
        storage.workspace(),
        target.stack,
        latest.revision + 1,
    );
    release.spec = target.spec;
    release.state = target.state;
    Ok(release)
}

/// Persist progress of an apply release
pub async fn update_apply_release<S>(storage: &S, release: &mut Release, dry_run: bool) -> Result<()>
where
    S: ReleaseStorage + ?Sized,
{
    update_release(storage, release, dry_run).await
}

/// Persist progress of a destroy release
pub async fn update_destroy_release<S>(
    storage: &S,
    release: &mut Release,
    dry_run: bool,
) -> Result<()>
where
    S: ReleaseStorage + ?Sized,
{
    update_release(storage, release, dry_run).await
}

async fn update_release<S>(storage: &S, release: &mut Release, dry_run: bool) -> Result<()>
where
    S: ReleaseStorage + ?Sized,
{
    if dry_run {
        return Ok(());
    }
    release.touch();
    if release.phase == ReleasePhase::Failed {
        persist_best_effort(storage, release).await;
        return Ok(());
    }
    storage.update(release).await
}

/// Record a `Failed` phase, logging instead of returning a storage error
///
/// The caller is already handling the failure that led here; failing to
/// record it must not replace that error.
async fn persist_best_effort<S>(storage: &S, release: &Release)
where
    S: ReleaseStorage + ?Sized,
{
    if let Err(e) = storage.update(release).await {
        warn!(
            project = %release.project,
            workspace = %release.workspace,
            revision = release.revision,
            error = %e,
            "failed to record Failed phase"
        );
    }
}

/// Latest release, or `None` when the scope has no history
pub async fn get_latest_release<S>(storage: &S) -> Result<Option<Release>>
where
    S: ReleaseStorage + ?Sized,
{
    match storage.get_latest_revision().await {
        0 => Ok(None),
        revision => storage.get(revision).await.map(Some),
    }
}

/// State recorded by the latest release
pub async fn get_latest_state<S>(storage: &S) -> Result<Option<State>>
where
    S: ReleaseStorage + ?Sized,
{
    Ok(get_latest_release(storage)
        .await?
        .and_then(|release| release.state))
}

async fn latest_release_or_err<S>(storage: &S) -> Result<Release>
where
    S: ReleaseStorage + ?Sized,
{
    get_latest_release(storage)
        .await?
        .ok_or_else(|| ReleaseError::NoRelease {
            project: storage.project().to_string(),
            workspace: storage.workspace().to_string(),
        })
}

fn ensure_finished(latest: &Release) -> Result<()> {
    if latest.is_in_flight() {
        return Err(ReleaseError::ReleaseInFlight {
            project: latest.project.clone(),
            workspace: latest.workspace.clone(),
            revision: latest.revision,
            phase: latest.phase,
        });
    }
    Ok(())
}

fn check_scope<S>(storage: &S, project: &str, workspace: &str) -> Result<()>
where
    S: ReleaseStorage + ?Sized,
{
    if storage.project() != project || storage.workspace() != workspace {
        return Err(ReleaseError::ScopeMismatch {
            expected: format!("{}/{}", storage.project(), storage.workspace()),
            found: format!("{}/{}", project, workspace),
        });
    }
    Ok(())
}

/// Serializes release creation for one scope within this process
pub struct ReleaseManager<S> {
    storage: S,
    lock: Mutex<()>,
}

impl<S: ReleaseStorage> ReleaseManager<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Start an apply of `spec` and persist it in `Generating`
    pub async fn create_apply_release(&self, stack: &str, spec: Spec) -> Result<Release> {
        let _guard = self.lock.lock().await;
        let mut release = new_apply_release(
            &self.storage,
            self.storage.project(),
            stack,
            self.storage.workspace(),
        )
        .await?;
        release.spec = Some(spec);
        self.storage.create(&release).await?;
        Ok(release)
    }

    pub async fn create_destroy_release(&self, stack: &str) -> Result<Release> {
        let _guard = self.lock.lock().await;
        create_destroy_release(
            &self.storage,
            self.storage.project(),
            stack,
            self.storage.workspace(),
        )
        .await
    }

    /// Start a rollback to `target_revision` and persist it in `Generating`
    pub async fn create_rollback_release(&self, target_revision: u64) -> Result<Release> {
        let _guard = self.lock.lock().await;
        let release = create_rollback_release(&self.storage, target_revision).await?;
        self.storage.create(&release).await?;
        Ok(release)
    }

    /// Mark a stuck latest release `Failed` so that a new one can start
    ///
    /// A latest release that already finished is returned unchanged.
    pub async fn unlock(&self) -> Result<Release> {
        let _guard = self.lock.lock().await;
        let mut latest = latest_release_or_err(&self.storage).await?;
        if !latest.is_in_flight() {
            return Ok(latest);
        }

        let stuck = latest.phase;
        latest.set_phase(ReleasePhase::Failed)?;
        self.storage.update(&latest).await?;
        info!(
            project = %latest.project,
            workspace = %latest.workspace,
            revision = latest.revision,
            from = %stuck,
            "unlocked release"
        );
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryReleaseStorage, ReleaseStore};
    use stackyard_backend::{MemoryBackend, StoreOptions};
    use stackyard_core::{Resource, ResourceType};
    use std::sync::Arc;

    fn namespace() -> Resource {
        Resource::new("v1:Namespace:shop", ResourceType::Kubernetes)
    }

    async fn open(backend: &MemoryBackend) -> MemoryReleaseStorage {
        ReleaseStore::open(Arc::new(backend.clone()), "shop", "dev", StoreOptions::default())
            .await
            .unwrap()
    }

    /// Persist a finished apply release carrying `resources` as its state
    async fn seed(storage: &MemoryReleaseStorage, resources: Vec<Resource>) -> Release {
        let mut release = new_apply_release(storage, "shop", "dev", "dev").await.unwrap();
        release.spec = Some(Spec::new(resources.clone()));
        storage.create(&release).await.unwrap();
        release.state = Some(State::new(resources));
        release.phase = ReleasePhase::Succeeded;
        update_apply_release(storage, &mut release, false).await.unwrap();
        release
    }

    #[tokio::test]
    async fn test_first_apply_release() {
        let storage = open(&MemoryBackend::new()).await;
        let release = new_apply_release(&storage, "shop", "dev", "dev").await.unwrap();

        assert_eq!(release.revision, 1);
        assert_eq!(release.phase, ReleasePhase::Generating);
        assert_eq!(release.state, Some(State::default()));
        assert_eq!(release.spec, None);
    }

    #[tokio::test]
    async fn test_apply_release_carries_state_forward() {
        let storage = open(&MemoryBackend::new()).await;
        seed(&storage, vec![namespace()]).await;

        let release = new_apply_release(&storage, "shop", "dev", "dev").await.unwrap();
        assert_eq!(release.revision, 2);
        assert_eq!(release.state, Some(State::new(vec![namespace()])));
    }

    #[tokio::test]
    async fn test_apply_release_rejected_while_in_flight() {
        let storage = open(&MemoryBackend::new()).await;
        let mut release = new_apply_release(&storage, "shop", "dev", "dev").await.unwrap();
        release.spec = Some(Spec::default());
        storage.create(&release).await.unwrap();

        let err = new_apply_release(&storage, "shop", "dev", "dev")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::ReleaseInFlight {
                revision: 1,
                phase: ReleasePhase::Generating,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_apply_release_scope_mismatch() {
        let storage = open(&MemoryBackend::new()).await;
        let err = new_apply_release(&storage, "shop", "dev", "prod")
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::ScopeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_destroy_requires_history() {
        let storage = open(&MemoryBackend::new()).await;
        let err = create_destroy_release(&storage, "shop", "dev", "dev")
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::NoRelease { .. }));
    }

    #[tokio::test]
    async fn test_destroy_release_targets_current_state() {
        let storage = open(&MemoryBackend::new()).await;
        seed(&storage, vec![namespace()]).await;

        let release = create_destroy_release(&storage, "shop", "dev", "dev")
            .await
            .unwrap();
        assert_eq!(release.revision, 2);
        assert_eq!(release.phase, ReleasePhase::Previewing);
        assert_eq!(release.spec, Some(Spec::new(vec![namespace()])));

        // Persisted immediately
        assert_eq!(storage.get(2).await.unwrap(), release);
    }

    #[tokio::test]
    async fn test_rollback_restamps_target() {
        let storage = open(&MemoryBackend::new()).await;
        let first = seed(&storage, vec![namespace()]).await;
        seed(&storage, vec![]).await;

        let release = create_rollback_release(&storage, 1).await.unwrap();
        assert_eq!(release.revision, 3);
        assert_eq!(release.phase, ReleasePhase::Generating);
        assert_eq!(release.spec, first.spec);
        assert_eq!(release.state, first.state);
    }

    #[tokio::test]
    async fn test_rollback_to_unknown_revision() {
        let storage = open(&MemoryBackend::new()).await;
        seed(&storage, vec![namespace()]).await;

        let err = create_rollback_release(&storage, 7).await.unwrap_err();
        assert!(err.is_not_exist());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_write() {
        let backend = MemoryBackend::new();
        let storage = open(&backend).await;
        let mut release = seed(&storage, vec![namespace()]).await;
        backend.reset_counts();

        release.phase = ReleasePhase::Failed;
        update_apply_release(&storage, &mut release, true).await.unwrap();
        assert_eq!(backend.operation_counts().writes, 0);
    }

    #[tokio::test]
    async fn test_failed_phase_persistence_is_best_effort() {
        let backend = MemoryBackend::new();
        let storage = open(&backend).await;
        let mut release = new_apply_release(&storage, "shop", "dev", "dev").await.unwrap();
        release.spec = Some(Spec::default());
        storage.create(&release).await.unwrap();
        backend.fail_writes_to("releases/shop/dev/1.yaml");

        release.phase = ReleasePhase::Failed;
        update_apply_release(&storage, &mut release, false).await.unwrap();

        // Any other phase still surfaces the error
        release.phase = ReleasePhase::Applying;
        let err = update_destroy_release(&storage, &mut release, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Backend(_)));
    }

    #[tokio::test]
    async fn test_latest_helpers() {
        let storage = open(&MemoryBackend::new()).await;
        assert_eq!(get_latest_release(&storage).await.unwrap(), None);
        assert_eq!(get_latest_state(&storage).await.unwrap(), None);

        seed(&storage, vec![namespace()]).await;
        assert_eq!(
            get_latest_state(&storage).await.unwrap(),
            Some(State::new(vec![namespace()]))
        );
    }

    #[tokio::test]
    async fn test_manager_unlock() {
        let manager = ReleaseManager::new(open(&MemoryBackend::new()).await);
        let stuck = manager
            .create_apply_release("dev", Spec::new(vec![namespace()]))
            .await
            .unwrap();
        assert!(manager.create_apply_release("dev", Spec::default()).await.is_err());

        let unlocked = manager.unlock().await.unwrap();
        assert_eq!(unlocked.revision, stuck.revision);
        assert_eq!(unlocked.phase, ReleasePhase::Failed);
        assert_eq!(
            manager.storage().get(1).await.unwrap().phase,
            ReleasePhase::Failed
        );

        let next = manager.create_apply_release("dev", Spec::default()).await.unwrap();
        assert_eq!(next.revision, 2);
    }
}
