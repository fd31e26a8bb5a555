//! Session facade.

mod geometry;
mod topology;

pub use geometry::GeometryService;
pub use topology::TopologyService;

use crate::associativity::AssociativityPolicy;
use crate::audit::ScriptRecorder;
use crate::change_feed::{ChangeEvent, ChangeFeed};
use crate::command::{Command, CompositeCommand, LeafCommand};
use crate::config::Config;
use crate::domain::{DependentDomain, SecondaryDomain, TopologyDomain, TransformTopology};
use crate::entity::EntityHandle;
use crate::error::{CoreError, CoreResult};
use crate::geometry::TransformGeometry;
use crate::kernel::{GeometricKernel, ReferenceKernel};
use crate::shape::Transform;
use crate::stats::{SessionStats, StatsSnapshot};
use crate::transaction::{CommandReport, TransactionManager};
use crate::types::{Dimension, Domain, SessionId};
use crate::world::World;
use parking_lot::RwLockReadGuard;
use std::fmt;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{info, warn};

/// An editing session: one world, one history.
///
/// `Session` is the entry point for callers. It resolves entity names and
/// submits commands to the [`TransactionManager`], which runs each through
/// the [`AssociativityPolicy`].
///
/// ```rust,ignore
/// use cadledger_core::{Point3, Session};
///
/// let session = Session::open_default()?;
/// session.geometry().create_vertex(Point3::ORIGIN)?;
/// session.geometry().create_vertex(Point3::new(1.0, 0.0, 0.0))?;
/// session.geometry().create_segment("Pt0000", "Pt0001")?;
/// session.topology().create_edge(&[] as &[&str], Some("Crv0000"))?;
///
/// // the edge loses its association, atomically with the destroy
/// session.geometry().destroy(&["Pt0000"], false)?;
/// session.undo()?;
/// ```
pub struct Session {
    id: SessionId,
    config: Config,
    manager: TransactionManager,
    feed: Arc<ChangeFeed>,
    stats: Arc<SessionStats>,
    secondary: Option<Arc<dyn SecondaryDomain>>,
}

impl Session {
    /// Opens a session with the reference kernel and the topology domain.
    pub fn open(config: Config) -> CoreResult<Self> {
        Self::open_with(
            config,
            Arc::new(ReferenceKernel::new()),
            Arc::new(TopologyDomain::new()),
        )
    }

    /// Opens a session with the default configuration.
    pub fn open_default() -> CoreResult<Self> {
        Self::open(Config::default())
    }

    /// Opens a session over the given collaborators.
    pub fn open_with(
        config: Config,
        kernel: Arc<dyn GeometricKernel>,
        domain: Arc<dyn DependentDomain>,
    ) -> CoreResult<Self> {
        let feed = Arc::new(ChangeFeed::with_max_history(config.feed_history));
        let stats = Arc::new(SessionStats::new());
        let manager = TransactionManager::new(
            &config,
            kernel,
            AssociativityPolicy::new(domain),
            Arc::clone(&feed),
            Arc::clone(&stats),
        )?;
        let id = SessionId::new();
        info!(
            session = %id,
            kernel = manager.kernel().name(),
            domain = manager.policy().domain().name(),
            "session opened"
        );
        Ok(Self {
            id,
            config,
            manager,
            feed,
            stats,
            secondary: None,
        })
    }

    /// Attaches a secondary domain that follows whole-model transforms.
    #[must_use]
    pub fn with_secondary(mut self, secondary: Arc<dyn SecondaryDomain>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Configuration the session was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read access to the world.
    pub fn world(&self) -> RwLockReadGuard<'_, World> {
        self.manager.read()
    }

    /// The transaction manager.
    #[must_use]
    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    /// The associativity policy.
    #[must_use]
    pub fn policy(&self) -> &AssociativityPolicy {
        self.manager.policy()
    }

    /// The change feed.
    #[must_use]
    pub fn feed(&self) -> &Arc<ChangeFeed> {
        &self.feed
    }

    /// Subscribes to change events.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Starts recording a replayable trail.
    #[must_use]
    pub fn recorder(&self) -> ScriptRecorder {
        ScriptRecorder::attach(&self.feed)
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Geometry operations.
    #[must_use]
    pub fn geometry(&self) -> GeometryService<'_> {
        GeometryService::new(self)
    }

    /// Topology operations.
    #[must_use]
    pub fn topology(&self) -> TopologyService<'_> {
        TopologyService::new(self)
    }

    /// Submits a command through the associativity policy.
    ///
    /// The children of a [`CompositeCommand`] are guarded one at a time as
    /// they execute.
    pub fn submit(&self, command: Box<dyn Command>) -> CoreResult<CommandReport> {
        self.run(|_| Ok(command))
    }

    /// Submits commands as independent transactions, each through the
    /// associativity policy against the world the earlier ones left.
    pub fn submit_batch(&self, commands: Vec<Box<dyn Command>>) -> Vec<CoreResult<CommandReport>> {
        self.manager.submit_batch(commands, self.config.execution_mode)
    }

    pub(crate) fn run<F>(&self, build: F) -> CoreResult<CommandReport>
    where
        F: FnOnce(&World) -> CoreResult<Box<dyn Command>>,
    {
        self.manager.submit_with(build, self.config.execution_mode)
    }

    /// Undoes the last command. `Ok(None)` if there is nothing to undo.
    pub fn undo(&self) -> CoreResult<Option<CommandReport>> {
        self.manager.undo()
    }

    /// Redoes the last undone command. `Ok(None)` if there is nothing to redo.
    pub fn redo(&self) -> CoreResult<Option<CommandReport>> {
        self.manager.redo()
    }

    /// Returns true if there is a command to undo.
    pub fn can_undo(&self) -> bool {
        self.manager.can_undo()
    }

    /// Returns true if there is a command to redo.
    pub fn can_redo(&self) -> bool {
        self.manager.can_redo()
    }

    /// Trace of the command `undo` would revert.
    pub fn undo_description(&self) -> Option<String> {
        self.manager.undo_description()
    }

    /// Trace of the command `redo` would replay.
    pub fn redo_description(&self) -> Option<String> {
        self.manager.redo_description()
    }

    /// Drops the whole history. Returns the number of released entities.
    pub fn clear_history(&self) -> usize {
        self.manager.clear_history()
    }

    /// Transforms the whole model: every live geometry and topology entity
    /// in one transaction, then the secondary domain, best effort.
    pub fn transform_all(&self, transform: Transform) -> CoreResult<CommandReport> {
        if let Some(reason) = transform.degeneracy() {
            return Err(CoreError::invalid_operation(reason));
        }
        let report = self.run(|world| {
            let geometry: Vec<EntityHandle> = world.geometry().live_all().map(|(h, _)| h).collect();
            let topology: Vec<EntityHandle> = world.topology().live_all().map(|(h, _)| h).collect();
            let mut children: Vec<Box<dyn Command>> = Vec::new();
            if !geometry.is_empty() {
                children.push(LeafCommand::boxed(TransformGeometry::new(geometry, transform)));
            }
            if !topology.is_empty() {
                children.push(LeafCommand::boxed(TransformTopology::new(topology, transform)));
            }
            if children.is_empty() {
                return Err(CoreError::empty_selection("transform all"));
            }
            // topology follows through its own child
            Ok(Box::new(CompositeCommand::compensated(children)))
        })?;

        if let Some(secondary) = &self.secondary {
            if let Err(message) = secondary.transform_all(&transform) {
                warn!(domain = secondary.name(), %message, "secondary domain did not follow transform");
            }
        }
        Ok(report)
    }

    /// Turns shifting-id name resolution on or off.
    ///
    /// Turning it on captures the current name counters as the offset for
    /// stale names; turning it off drops every registered alias.
    pub fn set_shifting_id(&self, on: bool) {
        self.manager.with_world_mut(|world| {
            if on {
                world.names_mut().activate_shifting();
            } else {
                world.names_mut().deactivate_shifting();
            }
        });
    }

    /// Returns true if shifting-id resolution is active.
    pub fn is_shifting_id(&self) -> bool {
        self.world().names().is_shifting()
    }

    /// Registers an explicit translation from a stale name.
    pub fn register_alias(&self, old: &str, current: &str) {
        self.manager
            .with_world_mut(|world| world.names_mut().register_alias(old, current));
    }

    /// Names of `handles`, `?` for unknown ones.
    pub fn names_of(&self, handles: &[EntityHandle]) -> Vec<String> {
        let world = self.world();
        handles
            .iter()
            .map(|h| world.name_of(*h).map_or_else(|_| "?".to_string(), str::to_string))
            .collect()
    }

    /// Names of live entities of one domain and dimension, in creation order.
    pub fn live_names(&self, domain: Domain, dim: Dimension) -> Vec<String> {
        self.world()
            .store(domain)
            .live(dim)
            .map(|(_, e)| e.name().to_string())
            .collect()
    }

    /// Resolves a name in `domain` to a live entity.
    pub fn resolve(&self, domain: Domain, name: &str) -> CoreResult<EntityHandle> {
        self.world().resolve(domain, name)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("manager", &self.manager)
            .field("secondary", &self.secondary.as_ref().map(|s| s.name().to_string()))
            .finish_non_exhaustive()
    }
}

/// Resolves caller-supplied names inside a transaction.
pub(crate) fn resolve_all<S: AsRef<str>>(
    world: &World,
    domain: Domain,
    operation: &str,
    names: &[S],
) -> CoreResult<Vec<EntityHandle>> {
    if names.is_empty() {
        return Err(CoreError::empty_selection(operation));
    }
    names
        .iter()
        .map(|name| world.resolve(domain, name.as_ref()))
        .collect()
}
