pub mod config;
pub mod error;
pub mod guillotine;
pub mod instance;
pub mod level;
pub mod plates;
pub mod render;
pub mod residual;
pub mod solution;
pub mod solver;
pub mod tree;
pub mod types;
pub mod waste;

pub use config::Constraints;
pub use error::{Result, SolveError};
pub use plates::Plate;
pub use solution::{NodeRecord, Solution};
pub use solver::{Solver, Strategy};
pub use types::{Batch, Defect, Item, Stack};
