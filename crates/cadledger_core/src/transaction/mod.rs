//! Transactions over the world.
//!
//! Every submitted command is all-or-nothing: it either commits and lands
//! on the undo stack, or fails and leaves the world exactly as it was.

mod history;
mod manager;

pub use manager::{CommandReport, TransactionManager};
