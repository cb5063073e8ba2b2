use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// An item is missing a field reconciliation or write-back depends on
    #[error("invalid item '{item}' from {server}: {reason}")]
    InvalidItem {
        server: String,
        item: String,
        reason: String,
    },
}
