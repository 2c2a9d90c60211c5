//! Error types for RecipeForge.
//!
//! Library crates use [`RecipeForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all RecipeForge operations.
#[derive(Debug, thiserror::Error)]
pub enum RecipeForgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// XML parsing error, with the document it came from.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// XML rendering error.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty material list, broken invariants, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The node a build or attach must splice into does not exist.
    #[error("anchor not found: no eProcObject with objType='{marker}' in {context}")]
    AnchorNotFound { marker: String, context: String },

    /// A step name that the component registry does not know.
    #[error("component not found: '{name}'")]
    ComponentNotFound { name: String },

    /// A material id the metadata source could not resolve.
    #[error("material not found: '{id}'")]
    MaterialNotFound { id: String },

    /// The escaped `objectConfig` blob of a fragment could not be decoded.
    #[error("objectConfig blob error: {message}")]
    ConfigBlob { message: String },

    /// A fatal error raised while a named component, material, or BOM was being processed.
    #[error("while processing {subject}: {source}")]
    Context {
        subject: String,
        #[source]
        source: Box<RecipeForgeError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RecipeForgeError>;

impl RecipeForgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a blob decoding error from any displayable message.
    pub fn config_blob(msg: impl Into<String>) -> Self {
        Self::ConfigBlob {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Anchor lookup failure for the given `objType` marker.
    pub fn anchor_not_found(marker: impl Into<String>, context: impl Into<String>) -> Self {
        Self::AnchorNotFound {
            marker: marker.into(),
            context: context.into(),
        }
    }

    /// Attach the name of the component/material/BOM being processed.
    pub fn while_processing(self, subject: impl Into<String>) -> Self {
        Self::Context {
            subject: subject.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through any [`RecipeForgeError::Context`] layers.
    pub fn root_cause(&self) -> &RecipeForgeError {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// `true` for an unknown component name, wrapped or not.
    pub fn is_component_not_found(&self) -> bool {
        matches!(self.root_cause(), Self::ComponentNotFound { .. })
    }
}

/// Adds processing context to a fallible result.
pub trait ResultExt<T> {
    /// Wrap the error (if any) with the subject that was being processed.
    fn while_processing<F, S>(self, subject: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn while_processing<F, S>(self, subject: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.while_processing(subject()))
    }
}
