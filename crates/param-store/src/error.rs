//! Error types for the parameter store.

/// Errors that can occur when loading or serializing parameters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to read the parameter file from disk.
    #[error("failed to read parameter file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The parameter text is not valid YAML, or the tree could not be
    /// written back out.
    #[error("failed to process parameter YAML: {source}")]
    Yaml {
        /// The underlying YAML error.
        source: serde_yml::Error,
    },

    /// The document parsed, but its top level is not a block of keys.
    #[error("parameter document root must be a mapping, found {found}")]
    RootNotMapping {
        /// Short name of the node kind that was found instead.
        found: &'static str,
    },
}

impl From<serde_yml::Error> for StoreError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}
