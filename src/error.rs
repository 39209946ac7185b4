//! Error types
//!
//! Library-wide error taxonomy. Collaborator failures (prices, market listings)
//! never appear here: they are downgraded inside `pricing`.

use thiserror::Error;

/// Errors surfaced by the crafting engine
#[derive(Debug, Error)]
pub enum CraftError {
    /// Malformed target spec or engine configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Target names an item base the catalog does not know
    #[error("Unknown item base: {0}")]
    UnknownBase(String),

    /// No modifier pool registered for the base at any level
    #[error("No modifier pool for base {base} (requested item level {level})")]
    PoolNotFound { base: String, level: u32 },

    /// Some required modifiers cannot be produced by any catalog action
    #[error("No viable strategy: no action can produce {}", unmet.join(", "))]
    Infeasible { unmet: Vec<String> },

    /// Static catalog is internally inconsistent
    #[error("Corrupted catalog: {0}")]
    Catalog(String),
}

/// Errors raised while reading or writing data files
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to serialize {what}: {message}")]
    Serialize { what: String, message: String },
}

/// Convenience alias used across the crate
pub type CraftResult<T> = Result<T, CraftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infeasible_lists_unmet_modifiers() {
        let err = CraftError::Infeasible {
            unmet: vec!["maximum Life".to_string(), "Fire Resistance".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("maximum Life"));
        assert!(msg.contains("Fire Resistance"));
    }
}
