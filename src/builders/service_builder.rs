//! Builders to construct the storage stack and the scheduling service from
//! configuration.

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use tracing::info;

use crate::config::{MirrorBackendConfig, MirrorConfig, OfficeConfig, PrimaryBackendConfig, PrimaryConfig};
use crate::core::{
    AppResult, Clock, InMemoryAuditSink, LocalCache, MirrorStore, Notifier, PrimaryStore, SeatService,
    Spawn, StaticDirectory, StopHandle, WeeklyTasks,
};
use crate::infra::{BlockingPrimary, FileCache, InMemoryMirror, InMemoryPrimary, NoopMirror, StartupSnapshot};
use crate::sync::{DualStore, Flusher, MirrorSync, OperationBuffer, RateLimiter};

/// Audit events kept in memory.
pub const AUDIT_RETENTION: usize = 1024;

/// Raw backends before they are combined.
pub struct StoreParts {
    /// Authoritative store.
    pub primary: Arc<dyn PrimaryStore>,
    /// Spreadsheet backend.
    pub mirror: Arc<dyn MirrorStore>,
    /// Flat-file tier.
    pub cache: Arc<dyn LocalCache>,
}

/// A wired service and the handles needed to observe and stop it.
pub struct SeatSystem {
    /// Command surface.
    pub service: Arc<SeatService>,
    /// Combined store the service writes through.
    pub store: Arc<DualStore>,
    /// Mirror adapter, for health and manual flushes.
    pub mirror: Arc<MirrorSync>,
    /// Recent audit events.
    pub audit: Arc<InMemoryAuditSink>,
    /// Background flusher.
    pub flusher: StopHandle,
    /// Weekly reminder and publication, when enabled.
    pub weekly: Option<StopHandle>,
}

impl SeatSystem {
    /// Stop background work.
    pub fn shutdown(&self) {
        self.flusher.stop();
        if let Some(weekly) = &self.weekly {
            weekly.stop();
        }
    }
}

/// Open the configured primary store. Postgres migrations are applied.
pub async fn build_primary(cfg: &PrimaryConfig) -> AppResult<Arc<dyn PrimaryStore>> {
    match cfg.backend {
        PrimaryBackendConfig::InMemory => Ok(Arc::new(InMemoryPrimary::new())),
        #[cfg(feature = "postgres")]
        PrimaryBackendConfig::Postgres => {
            let store = crate::infra::primary::PostgresPrimary::connect(cfg)
                .await
                .context("connecting to postgres")?;
            store.run_migrations().await.context("running migrations")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        PrimaryBackendConfig::Postgres => bail!("built without the `postgres` feature"),
    }
}

/// Open the configured primary store on a private runtime and read the state
/// the service loads at startup. For checks that run before the main runtime
/// exists; fails when called from inside one.
pub fn startup_snapshot(cfg: &PrimaryConfig) -> AppResult<StartupSnapshot> {
    let primary = BlockingPrimary::open(|| build_primary(cfg)).context("opening primary store")?;
    let snapshot = primary.load_snapshot().context("loading startup state")?;
    info!(
        employees = snapshot.employees.len(),
        admins = snapshot.admins.len(),
        pending = snapshot.pending.len(),
        stored_default = snapshot.default.is_some(),
        "primary store checked"
    );
    Ok(snapshot)
}

/// Create the configured mirror backend.
pub fn build_mirror_backend(cfg: &MirrorConfig) -> AppResult<Arc<dyn MirrorStore>> {
    match cfg.backend {
        MirrorBackendConfig::Disabled => Ok(Arc::new(NoopMirror)),
        MirrorBackendConfig::InMemory => Ok(Arc::new(InMemoryMirror::new())),
        #[cfg(feature = "sheets")]
        MirrorBackendConfig::Sheets => {
            let mirror = crate::infra::mirror::SheetsMirror::from_config(cfg).context("configuring sheets mirror")?;
            Ok(Arc::new(mirror))
        }
        #[cfg(not(feature = "sheets"))]
        MirrorBackendConfig::Sheets => bail!("built without the `sheets` feature"),
    }
}

/// Build every backend named by the configuration.
pub async fn build_parts(cfg: &OfficeConfig) -> AppResult<StoreParts> {
    let primary = build_primary(&cfg.primary).await?;
    let mirror = build_mirror_backend(&cfg.mirror)?;
    let cache = FileCache::new(&cfg.data_dir)
        .with_context(|| format!("opening cache at {}", cfg.data_dir.display()))?;
    Ok(StoreParts {
        primary,
        mirror,
        cache: Arc::new(cache),
    })
}

/// Combine backends into a running service: load state and start the flusher.
pub async fn assemble<S: Spawn>(
    cfg: &OfficeConfig,
    parts: StoreParts,
    notifier: Arc<dyn Notifier>,
    spawner: &S,
) -> AppResult<SeatSystem> {
    assemble_with_clock(cfg, parts, notifier, spawner, Arc::new(Utc::now)).await
}

/// [`assemble`] with an explicit wall clock.
pub async fn assemble_with_clock<S: Spawn>(
    cfg: &OfficeConfig,
    parts: StoreParts,
    notifier: Arc<dyn Notifier>,
    spawner: &S,
    clock: Clock,
) -> AppResult<SeatSystem> {
    if let Err(e) = cfg.validate() {
        bail!("config invalid: {e}");
    }
    let mirror = Arc::new(MirrorSync::new(
        parts.mirror,
        RateLimiter::new(cfg.sync.rate_limit()),
        OperationBuffer::new(cfg.sync.buffer_capacity, cfg.sync.replay_order),
    ));
    let store = Arc::new(DualStore::new(
        parts.primary,
        mirror.clone(),
        parts.cache,
        cfg.max_seats,
        cfg.fallback_assignment(),
        cfg.admin_ids.clone(),
    ));
    let audit = Arc::new(InMemoryAuditSink::new(AUDIT_RETENTION));
    let service = SeatService::new(
        store.clone(),
        Arc::new(StaticDirectory::new()),
        notifier,
        cfg.max_seats,
        cfg.utc_offset_minutes,
    )
    .with_audit(audit.clone())
    .with_bootstrap_admins(cfg.admin_ids.clone())
    .with_clock(clock);
    service.reload().await.context("loading service state")?;

    let service = Arc::new(service);
    let flusher = Flusher::new(mirror.clone(), cfg.sync.flush_interval()).start(spawner);
    let weekly = cfg.weekly.enabled.then(|| {
        WeeklyTasks::new(service.clone(), cfg.weekly.times(), cfg.weekly.check_interval()).start(spawner)
    });
    info!(
        max_seats = cfg.max_seats,
        primary = ?cfg.primary.backend,
        mirror = ?cfg.mirror.backend,
        "seat service ready"
    );
    Ok(SeatSystem {
        service,
        store,
        mirror,
        audit,
        flusher,
        weekly,
    })
}

/// Build backends from configuration and assemble the service.
pub async fn build_service<S: Spawn>(
    cfg: &OfficeConfig,
    notifier: Arc<dyn Notifier>,
    spawner: &S,
) -> AppResult<SeatSystem> {
    let parts = build_parts(cfg).await?;
    assemble(cfg, parts, notifier, spawner).await
}
