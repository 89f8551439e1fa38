pub mod error;
pub mod kind;

pub use error::{Error, Result};
pub use kind::{CategoryKind, TransactionKind};
