//! Warm pool of sandbox processes
//!
//! Keeps up to `pool_size` idle processes per language so a request does not
//! pay for container startup. Every acquisition triggers a refill in the
//! background.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, ImageRef, Language};
use crate::sandbox::SandboxError;
use crate::sandbox::command::SandboxCommand;
use crate::sandbox::process::PooledProcess;
use crate::types::ResourceLimits;

/// Process-wide counter so names stay unique across pools
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Everything needed to start a sandbox for one language
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub image: ImageRef,
    pub command: Vec<String>,
    pub env: HashMap<String, String>,
    pub limits: ResourceLimits,
}

impl SpawnSpec {
    /// Build the spec for `language`, applying its limit overrides
    pub fn from_language(config: &Config, language: &Language) -> Self {
        Self {
            image: language.image.clone(),
            command: language.command.clone(),
            env: language.env.clone(),
            limits: config.effective_limits(language),
        }
    }
}

/// Pool of warm sandbox processes, keyed by language ID
///
/// Cloning is cheap; clones share the same processes.
#[derive(Debug, Clone)]
pub struct ProcessPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    runtime_path: PathBuf,
    /// Idle processes to keep per language
    target: usize,
    /// How long an acquisition waits on in-flight spawns before spawning itself
    acquire_wait: Duration,
    specs: HashMap<String, SpawnSpec>,
    slots: Mutex<HashMap<String, Slots>>,
    /// Signalled whenever a background spawn finishes, successfully or not
    spawned: Notify,
}

#[derive(Debug, Default)]
struct Slots {
    idle: VecDeque<PooledProcess>,
    /// Background spawns started but not yet finished
    pending: usize,
}

impl ProcessPool {
    /// Create a pool for every language in `config`
    ///
    /// No process is started until [`warm`](Self::warm) or the first
    /// acquisition.
    pub fn new(config: &Config) -> Self {
        let specs = config
            .languages
            .iter()
            .map(|(id, language)| (id.clone(), SpawnSpec::from_language(config, language)))
            .collect();

        Self::with_specs(
            config.runtime_binary(),
            config.pool_size,
            config.acquire_wait(),
            specs,
        )
    }

    /// Create a pool from explicit spawn specs
    pub fn with_specs(
        runtime_path: impl Into<PathBuf>,
        target: usize,
        acquire_wait: Duration,
        specs: HashMap<String, SpawnSpec>,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                runtime_path: runtime_path.into(),
                target,
                acquire_wait,
                specs,
                slots: Mutex::new(HashMap::new()),
                spawned: Notify::new(),
            }),
        }
    }

    /// Start filling every language up to the target
    ///
    /// Returns immediately; spawns complete in the background. Must be called
    /// from within a tokio runtime.
    pub fn warm(&self) {
        for language in self.inner.specs.keys() {
            self.replenish(language);
        }
    }

    /// Take an unused sandbox process for `language`
    ///
    /// Hands out a warm process when one is idle. If the pool is empty but
    /// spawns are in flight, waits up to the configured acquire wait for one
    /// to land, then falls back to spawning a process directly. Never hands
    /// the same process out twice.
    #[instrument(skip(self))]
    pub async fn acquire(&self, language: &str) -> Result<PooledProcess, SandboxError> {
        if !self.inner.specs.contains_key(language) {
            return Err(SandboxError::UnknownLanguage(language.to_string()));
        }

        let deadline = Instant::now() + self.inner.acquire_wait;
        loop {
            // Register before checking so a spawn finishing in between still wakes us
            let spawned = self.inner.spawned.notified();

            let (process, pending) = self.take_idle(language);
            if let Some(process) = process {
                debug!(id = process.id(), age = ?process.age(), "acquired warm sandbox");
                self.replenish(language);
                return Ok(process);
            }

            if pending == 0 || tokio::time::timeout_at(deadline, spawned).await.is_err() {
                break;
            }
        }

        debug!("no warm sandbox available, spawning on demand");
        self.replenish(language);
        self.spawn_process(language)
            .map_err(|e| SandboxError::Unavailable {
                language: language.to_string(),
                reason: e.to_string(),
            })
    }

    /// Number of idle processes for `language`
    pub fn idle_count(&self, language: &str) -> usize {
        self.lock_slots()
            .get(language)
            .map_or(0, |slots| slots.idle.len())
    }

    /// Number of background spawns in flight for `language`
    pub fn pending_count(&self, language: &str) -> usize {
        self.lock_slots()
            .get(language)
            .map_or(0, |slots| slots.pending)
    }

    /// Idle processes kept per language
    pub fn capacity(&self) -> usize {
        self.inner.target
    }

    /// Language IDs this pool can serve
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.inner.specs.keys().map(String::as_str)
    }

    /// Discard every idle process
    ///
    /// Spawns still in flight land in the pool afterwards and are removed
    /// when the pool is dropped.
    pub async fn shutdown(&self) {
        let idle: Vec<PooledProcess> = {
            let mut slots = self.lock_slots();
            slots
                .values_mut()
                .flat_map(|slots| slots.idle.drain(..))
                .collect()
        };

        info!(count = idle.len(), "shutting down sandbox pool");
        for process in idle {
            process.discard().await;
        }
    }

    /// Pop the first live idle process, returning the pending count alongside
    fn take_idle(&self, language: &str) -> (Option<PooledProcess>, usize) {
        let mut slots = self.lock_slots();
        let Some(slots) = slots.get_mut(language) else {
            return (None, 0);
        };

        while let Some(mut process) = slots.idle.pop_front() {
            if process.is_alive() {
                return (Some(process), slots.pending);
            }
            debug!(id = process.id(), "dropping dead idle sandbox");
        }

        (None, slots.pending)
    }

    /// Start background spawns until idle plus pending reaches the target
    fn replenish(&self, language: &str) {
        let deficit = {
            let mut slots = self.lock_slots();
            let slots = slots.entry(language.to_string()).or_default();
            let deficit = self
                .inner
                .target
                .saturating_sub(slots.idle.len() + slots.pending);
            slots.pending += deficit;
            deficit
        };

        if deficit > 0 {
            debug!(language, deficit, "replenishing sandbox pool");
        }

        for _ in 0..deficit {
            let pool = self.clone();
            let language = language.to_string();
            tokio::spawn(async move { pool.finish_background_spawn(&language) });
        }
    }

    fn finish_background_spawn(&self, language: &str) {
        let result = self.spawn_process(language);

        {
            let mut slots = self.lock_slots();
            let slots = slots.entry(language.to_string()).or_default();
            slots.pending = slots.pending.saturating_sub(1);
            match result {
                Ok(process) => slots.idle.push_back(process),
                Err(e) => warn!(language, error = %e, "background sandbox spawn failed"),
            }
        }

        self.inner.spawned.notify_waiters();
    }

    fn spawn_process(&self, language: &str) -> Result<PooledProcess, SandboxError> {
        let spec = self
            .inner
            .specs
            .get(language)
            .ok_or_else(|| SandboxError::UnknownLanguage(language.to_string()))?;

        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let name = container_name(language, id);

        let mut command = SandboxCommand::new(&self.inner.runtime_path, name)
            .image(spec.image.clone())
            .command(spec.command.iter().cloned());
        for (key, value) in &spec.env {
            command = command.env(key, value);
        }

        PooledProcess::spawn(id, language, command, spec.limits.clone())
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slots>> {
        // Every critical section leaves the map consistent, so poisoning is ignored
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Container names must match `[a-zA-Z0-9][a-zA-Z0-9_.-]*`
fn container_name(language: &str, id: u64) -> String {
    let language: String = language
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("solvebox-{}-{language}-{id}", std::process::id())
}
