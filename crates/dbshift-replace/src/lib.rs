mod subst;
mod tokens;

pub use subst::{substitute, substitute_batch};
pub use tokens::TokenPool;

/// Errors of the substitution engine. Everything except entropy exhaustion
/// is handled by returning the subject unchanged; entropy failure is fatal
/// because tokens must be unpredictable.
#[derive(Debug, thiserror::Error)]
pub enum ReplaceError {
    #[error("entropy source failure: {0}")]
    Entropy(String),
}
