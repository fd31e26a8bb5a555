//! Transaction manager.

use crate::associativity::AssociativityPolicy;
use crate::change_feed::{ChangeFeed, ChangeKind, EntityChange};
use crate::command::{Command, CommandOutput, ExecContext, Fate};
use crate::config::{Config, ExecutionMode};
use crate::entity::EntityHandle;
use crate::error::{CoreError, CoreResult};
use crate::kernel::GeometricKernel;
use crate::ledger::ChangeStatus;
use crate::stats::SessionStats;
use crate::transaction::history::{Entry, History};
use crate::types::CommandId;
use crate::world::World;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful submit, undo or redo.
#[derive(Debug, Clone)]
pub struct CommandReport {
    /// Command id, stable across undo and redo.
    pub id: CommandId,
    /// The command's trace.
    pub description: String,
    /// Touched entities with their statuses as reported to observers.
    pub changes: Vec<(EntityHandle, ChangeStatus)>,
    /// What the command did.
    pub output: CommandOutput,
    /// History revision after the transition.
    pub revision: u64,
}

/// Runs commands as atomic transactions and keeps the undo/redo history.
///
/// ## Single writer
///
/// Every mutation happens while the history mutex and the world write lock
/// are both held, always taken in that order. In [`ExecutionMode::Pooled`]
/// the read-only prepare phase runs on the worker pool under an upgradable
/// read lock, which is then upgraded for execution; readers are never
/// blocked during construction.
///
/// ## Associativity
///
/// Every command passes through the [`AssociativityPolicy`] right before it
/// executes, against the world as it is at that moment. Submission is
/// crate-private; outside callers go through the session.
///
/// ```compile_fail
/// use cadledger_core::{ExecutionMode, Session};
///
/// let session = Session::open_default().unwrap();
/// session.manager().submit_batch(Vec::new(), ExecutionMode::Sync);
/// ```
///
/// ## Lifecycle
///
/// On success a command goes onto the undo stack and the redo stack is
/// dropped. On failure the world is unchanged, the name counters are
/// restored and whatever the command created is released. A command leaving
/// the history releases the entities only it still refers to.
pub struct TransactionManager {
    world: RwLock<World>,
    history: Mutex<History>,
    kernel: Arc<dyn GeometricKernel>,
    policy: AssociativityPolicy,
    pool: rayon::ThreadPool,
    feed: Arc<ChangeFeed>,
    stats: Arc<SessionStats>,
    history_limit: usize,
    default_mode: ExecutionMode,
}

impl TransactionManager {
    /// Creates a manager over an empty world.
    pub(crate) fn new(
        config: &Config,
        kernel: Arc<dyn GeometricKernel>,
        policy: AssociativityPolicy,
        feed: Arc<ChangeFeed>,
        stats: Arc<SessionStats>,
    ) -> CoreResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("cadledger-worker-{i}"))
            .build()
            .map_err(|e| CoreError::invalid_operation(format!("worker pool: {e}")))?;
        let mut world = World::new();
        if config.shifting_id {
            world.names_mut().activate_shifting();
        }
        Ok(Self {
            world: RwLock::new(world),
            history: Mutex::new(History::new()),
            kernel,
            policy,
            pool,
            feed,
            stats,
            history_limit: config.history_limit,
            default_mode: config.execution_mode,
        })
    }

    /// Read access to the world.
    pub fn read(&self) -> RwLockReadGuard<'_, World> {
        self.world.read()
    }

    /// The kernel commands are constructed with.
    #[must_use]
    pub fn kernel(&self) -> &Arc<dyn GeometricKernel> {
        &self.kernel
    }

    /// The associativity policy every command is guarded by.
    #[must_use]
    pub fn policy(&self) -> &AssociativityPolicy {
        &self.policy
    }

    /// Default execution mode.
    #[must_use]
    pub fn default_mode(&self) -> ExecutionMode {
        self.default_mode
    }

    /// Builds a command against the current world and submits it.
    ///
    /// `build` runs inside the transaction, so what it sees is exactly
    /// what the command executes against.
    pub(crate) fn submit_with<F>(&self, build: F, mode: ExecutionMode) -> CoreResult<CommandReport>
    where
        F: FnOnce(&World) -> CoreResult<Box<dyn Command>>,
    {
        let mut history = self.history.lock();
        let world = self.world.upgradable_read();
        self.stats.record_submit();

        let mut command = match build(&world) {
            Ok(command) => command,
            Err(err) => {
                self.stats.record_failure();
                return Err(err);
            }
        };
        if mode == ExecutionMode::Pooled {
            let kernel = self.kernel.as_ref();
            let world_ref: &World = &world;
            let prepared = self.pool.install(|| command.prepare(world_ref, kernel));
            if let Err(err) = prepared {
                debug!(command = command.label(), %err, "prepare failed");
            }
        }

        let mut world = RwLockUpgradableReadGuard::upgrade(world);
        self.commit(&mut history, &mut world, command)
    }

    /// Submits several commands, each as its own transaction, in order.
    ///
    /// In pooled mode, when no two commands declare overlapping targets,
    /// all of them are prepared concurrently before the first executes.
    /// Each is still guarded only when its turn comes, so it sees what the
    /// commands before it in the batch did.
    pub(crate) fn submit_batch(
        &self,
        commands: Vec<Box<dyn Command>>,
        mode: ExecutionMode,
    ) -> Vec<CoreResult<CommandReport>> {
        let mut history = self.history.lock();
        let world = self.world.upgradable_read();
        let mut pending = commands;
        for _ in &pending {
            self.stats.record_submit();
        }

        if mode == ExecutionMode::Pooled {
            let kernel = self.kernel.as_ref();
            if disjoint_targets(pending.iter().map(|command| command.as_ref())) {
                debug!(commands = pending.len(), "preparing batch on the pool");
                let world_ref: &World = &world;
                self.pool.install(|| {
                    pending.par_iter_mut().for_each(|command| {
                        if let Err(err) = command.prepare(world_ref, kernel) {
                            debug!(command = command.label(), %err, "prepare failed");
                        }
                    });
                });
            } else {
                debug!("overlapping targets, preparing batch sequentially");
                for command in &mut pending {
                    if let Err(err) = command.prepare(&world, kernel) {
                        debug!(command = command.label(), %err, "prepare failed");
                    }
                }
            }
        }

        let mut world = RwLockUpgradableReadGuard::upgrade(world);
        pending
            .into_iter()
            .map(|command| self.commit(&mut history, &mut world, command))
            .collect()
    }

    fn commit(
        &self,
        history: &mut History,
        world: &mut World,
        command: Box<dyn Command>,
    ) -> CoreResult<CommandReport> {
        let checkpoint = world.names().checkpoint();
        // nothing executed yet, nothing to release
        let mut command = match self.policy.guard(world, command) {
            Ok(command) => command,
            Err(err) => {
                self.stats.record_failure();
                info!(%err, "associativity check rejected command");
                return Err(err);
            }
        };
        let result = command.execute(&mut ExecContext::guarded(
            world,
            self.kernel.as_ref(),
            &self.policy,
        ));
        if let Err(err) = result {
            world.names_mut().restore(checkpoint);
            let released = command.release(world, Fate::Discarded);
            self.stats.record_failure();
            self.stats.record_release(released);
            if err.is_internal() {
                warn!(command = command.label(), %err, "internal invariant violated");
            } else {
                info!(command = command.label(), %err, "transaction rolled back");
            }
            return Err(err);
        }

        let id = history.next_id();
        history.revision += 1;
        let report = CommandReport {
            id,
            description: command.describe(),
            changes: command.changes(),
            output: command.output(),
            revision: history.revision,
        };
        let events = entity_changes(world, &report.changes);

        let mut released = history.discard_redo(world);
        history.undo.push_back(Entry { id, command });
        let (evicted, evicted_released) = history.evict(world, self.history_limit);
        released += evicted_released;
        for _ in 0..evicted {
            self.stats.record_eviction();
        }
        self.stats.record_commit();
        self.stats.record_release(released);

        info!(%id, description = %report.description, released, "committed");
        self.feed
            .emit(id, ChangeKind::Committed, report.description.clone(), events);
        Ok(report)
    }

    /// Undoes the most recent command. `Ok(None)` if there is nothing to undo.
    pub fn undo(&self) -> CoreResult<Option<CommandReport>> {
        let mut history = self.history.lock();
        let Some(mut entry) = history.undo.pop_back() else {
            return Ok(None);
        };
        let mut world = self.world.write();
        if let Err(err) = entry.command.undo(&mut world) {
            warn!(id = %entry.id, %err, "undo failed");
            history.undo.push_back(entry);
            return Err(err);
        }

        history.revision += 1;
        let report = report(&entry, history.revision, true);
        let events = entity_changes(&world, &report.changes);
        history.redo.push(entry);
        self.stats.record_undo();

        info!(id = %report.id, description = %report.description, "undone");
        self.feed
            .emit(report.id, ChangeKind::Undone, report.description.clone(), events);
        Ok(Some(report))
    }

    /// Redoes the most recently undone command. `Ok(None)` if there is
    /// nothing to redo.
    pub fn redo(&self) -> CoreResult<Option<CommandReport>> {
        let mut history = self.history.lock();
        let Some(mut entry) = history.redo.pop() else {
            return Ok(None);
        };
        let mut world = self.world.write();
        let result = entry
            .command
            .execute(&mut ExecContext::new(&mut world, self.kernel.as_ref()));
        if let Err(err) = result {
            warn!(id = %entry.id, %err, "redo failed");
            history.redo.push(entry);
            return Err(err);
        }

        history.revision += 1;
        let report = report(&entry, history.revision, false);
        let events = entity_changes(&world, &report.changes);
        history.undo.push_back(entry);
        let (evicted, released) = history.evict(&mut world, self.history_limit);
        for _ in 0..evicted {
            self.stats.record_eviction();
        }
        self.stats.record_release(released);
        self.stats.record_redo();

        info!(id = %report.id, description = %report.description, "redone");
        self.feed
            .emit(report.id, ChangeKind::Redone, report.description.clone(), events);
        Ok(Some(report))
    }

    /// Empties both stacks, releasing what the dropped commands own.
    /// Returns the number of released entities.
    pub fn clear_history(&self) -> usize {
        let mut history = self.history.lock();
        let mut world = self.world.write();
        let mut released = history.discard_redo(&mut world);
        let (_, evicted_released) = history.evict(&mut world, 0);
        released += evicted_released;
        self.stats.record_release(released);
        info!(released, "history cleared");
        released
    }

    /// Returns true if there is a command to undo.
    pub fn can_undo(&self) -> bool {
        !self.history.lock().undo.is_empty()
    }

    /// Returns true if there is a command to redo.
    pub fn can_redo(&self) -> bool {
        !self.history.lock().redo.is_empty()
    }

    /// Trace of the command [`undo`](Self::undo) would revert.
    pub fn undo_description(&self) -> Option<String> {
        self.history.lock().undo_description()
    }

    /// Trace of the command [`redo`](Self::redo) would replay.
    pub fn redo_description(&self) -> Option<String> {
        self.history.lock().redo_description()
    }

    /// Number of commands on the undo stack.
    pub fn undo_len(&self) -> usize {
        self.history.lock().undo.len()
    }

    /// Number of commands on the redo stack.
    pub fn redo_len(&self) -> usize {
        self.history.lock().redo.len()
    }

    /// Current history revision.
    pub fn revision(&self) -> u64 {
        self.history.lock().revision
    }

    /// Runs `f` with exclusive access to the world, outside any command.
    ///
    /// For session-level state that is not part of the history, such as
    /// the shifting-id mode.
    pub(crate) fn with_world_mut<R>(&self, f: impl FnOnce(&mut World) -> R) -> R {
        let _history = self.history.lock();
        f(&mut self.world.write())
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("kernel", &self.kernel.name())
            .field("history_limit", &self.history_limit)
            .field("default_mode", &self.default_mode)
            .field("workers", &self.pool.current_num_threads())
            .finish_non_exhaustive()
    }
}

fn report(entry: &Entry, revision: u64, inverse: bool) -> CommandReport {
    let changes = entry
        .command
        .changes()
        .into_iter()
        .map(|(h, s)| (h, if inverse { s.inverse() } else { s }))
        .collect();
    CommandReport {
        id: entry.id,
        description: entry.command.describe(),
        changes,
        output: entry.command.output(),
        revision,
    }
}

fn disjoint_targets<'a>(commands: impl Iterator<Item = &'a dyn Command>) -> bool {
    let mut seen = BTreeSet::new();
    for command in commands {
        let targets: BTreeSet<EntityHandle> = command.targets().into_iter().collect();
        for target in targets {
            if !seen.insert(target) {
                return false;
            }
        }
    }
    true
}

fn entity_changes(world: &World, changes: &[(EntityHandle, ChangeStatus)]) -> Vec<EntityChange> {
    changes
        .iter()
        .filter_map(|(handle, status)| {
            let entity = world.entity(*handle).ok()?;
            Some(EntityChange {
                handle: *handle,
                name: entity.name().to_string(),
                domain: entity.domain(),
                status: *status,
            })
        })
        .collect()
}
