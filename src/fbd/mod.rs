//! Function-block diagram programs.
//!
//! A program is a DAG of typed blocks wired port-to-port. Each cycle the
//! executor decodes the stored diagram, orders the blocks topologically,
//! evaluates them once, and hands the scheduler a flattened output map plus
//! the point writes its output blocks produced.

mod blocks;
mod diagram;
mod executor;
mod graph;

pub use blocks::{BlockCtx, eval_block};
pub use diagram::{Diagram, Edge, Node};
pub use executor::{CycleOutcome, FbdExecutor, flatten_values};
pub use graph::topo_order;
