#![cfg_attr(not(test), no_std)]

pub mod budget;
pub mod io;
pub mod scalar;

pub use budget::{BudgetConfig, ConfigError};
pub use io::{BufReader, BufWriter, ReadError, WriteError};
pub use scalar::Scalar;
