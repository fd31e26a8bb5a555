//! # cadledger core
//!
//! Command and undo/redo transaction engine for interactive CAD editing.
//!
//! This crate provides:
//! - Entity stores for the geometry and topology domains
//! - Unique entity names, with legacy-name remapping ("shifting id")
//! - Per-command change ledgers and snapshot-based undo/redo
//! - Leaf and all-or-nothing composite commands
//! - A single-writer transaction manager with bounded history
//! - Associativity enforcement between geometry and the topology built on it

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod associativity;
mod audit;
mod change_feed;
mod command;
mod config;
mod domain;
mod entity;
mod error;
mod geometry;
mod kernel;
mod ledger;
mod names;
mod session;
mod shape;
mod stats;
mod transaction;
mod types;
mod world;

pub use associativity::AssociativityPolicy;
pub use audit::ScriptRecorder;
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind, EntityChange};
pub use command::{
    Command, CommandOutput, CommandState, CompositeCommand, ExecContext, Fate, LeafCommand,
    Mutator, Operation,
};
pub use config::{Config, ExecutionMode};
pub use domain::{
    Associate, ClearAssociation, Compensation, CreateTopology, DependentDomain, DestroyDependents,
    DestroyTopology, DuplicateDependents, ExtrudeDependents, ReassociateDependents,
    SecondaryDomain, TopologyDomain, TransformDependents, TransformTopology,
};
pub use entity::{Entity, EntityHandle, EntityKind, EntitySnapshot, EntityState, EntityStore};
pub use error::{CoreError, CoreResult};
pub use geometry::{
    CopyGeometry, CreateBounded, CreateVertex, DestroyGeometry, EditGroup, ExtrudeGeometry,
    GlueGeometry, ReplaceGeometry, Replacement, TransformGeometry,
};
pub use kernel::{
    BuiltShape, GeometricKernel, KernelInput, KernelOp, KernelRequest, ReferenceKernel,
    GLUE_TOLERANCE,
};
pub use ledger::{ChangeLedger, ChangeStatus};
pub use names::{NameCheckpoint, NameRegistry};
pub use session::{GeometryService, Session, TopologyService};
pub use shape::{Plane, Point3, ShapeData, Transform, EPSILON};
pub use stats::{SessionStats, StatsSnapshot};
pub use transaction::{CommandReport, TransactionManager};
pub use types::{CommandId, Dimension, Domain, SessionId};
pub use world::World;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
