//! Error types for dronegallery.
//!
//! This module defines all error types used throughout the dronegallery crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dronegallery operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Subscription Errors ===
    /// The collection reported a failure on a live subscription.
    #[error("subscription to '{collection}' failed: {message}")]
    Subscription {
        /// Name of the subscribed collection.
        collection: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The subscription was released before the operation completed.
    #[error("subscription to '{collection}' is closed")]
    SubscriptionClosed {
        /// Name of the subscribed collection.
        collection: String,
    },

    // === View Errors ===
    /// A state change was attempted on a gallery view after teardown.
    #[error("gallery view has been torn down")]
    ViewTornDown,

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for dronegallery operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new subscription error for the given collection.
    #[must_use]
    pub fn subscription(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscription {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error was reported by a live subscription.
    #[must_use]
    pub fn is_subscription_error(&self) -> bool {
        matches!(
            self,
            Self::Subscription { .. } | Self::SubscriptionClosed { .. }
        )
    }

    /// Check if this error indicates use of a torn-down view.
    #[must_use]
    pub fn is_view_torn_down(&self) -> bool {
        matches!(self, Self::ViewTornDown)
    }
}
