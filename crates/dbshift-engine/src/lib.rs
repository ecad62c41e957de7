//! The rewrite engine: drives the scan/lock/update protocol over a
//! [`dbshift_store::Transport`], table by table, feeding every
//! candidate cell through the serialization-aware substitution.

mod pass;
mod rename;
mod runner;

pub use rename::rename_prefix;
pub use runner::run;

use thiserror::Error;

/// Failures that end the whole run. Everything recoverable (a table
/// that cannot be locked, a row whose update fails) is logged and
/// skipped inside the engine instead of surfacing here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] dbshift_store::StoreError),
    #[error(transparent)]
    Entropy(#[from] dbshift_core::sequence::EntropyError),
    #[error(transparent)]
    Replace(#[from] dbshift_replace::ReplaceError),
}
