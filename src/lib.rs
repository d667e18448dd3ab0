//! Coalescent simulation and tree-sequence simplification under
//! recombination and population structure.
//!
//! A tree sequence is a succinct encoding of correlated genealogies
//! along a recombining chromosome, represented here as node, edgeset,
//! site, and mutation tables ([``tables``]). [``simulator``] generates
//! one under a Hudson-style coalescent process; [``simplifier``]
//! reduces an arbitrary input tree sequence to the ancestry of a
//! chosen sample set.
//!
//! Adapted from `forrustts`, generalized from a single-child edge
//! table and a standalone simplification routine to a multi-child
//! edgeset table, a simulator, and a demographic model.

pub mod ancestry_map;
pub mod demography;
pub mod error;
pub mod input;
pub mod node_flags;
pub mod output;
pub mod overlap_map;
pub mod segment;
pub mod segment_pool;
pub mod simplifier;
pub mod simulator;
pub mod tables;
pub mod tsdef;

pub use demography::{DemographicEvent, DemographicModel};
pub use error::TsCoalError;
pub use input::InputTreeSequence;
pub use node_flags::NodeFlags;
pub use simplifier::simplify;
pub use simulator::Simulator;
pub use tables::{Edgeset, Mutation, Node, Site, TableCollection};
pub use tsdef::{IdType, Position, Time, TsInt};
