//! The error taxonomy returned by every fallible operation in the index.

use std::fmt;

/// Everything that can go wrong building, querying, or (de)serializing a
/// hierarchical interleaved Bloom filter.
#[derive(Debug, thiserror::Error)]
pub enum HibfError {
    /// A `Config` failed eager validation before any work started.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The hierarchical binning DP could not find a feasible layout under
    /// the given `tmax`/`alpha` and input cardinalities.
    #[error("no feasible layout: {0}")]
    LayoutInfeasible(String),

    /// The caller-supplied `input_fn` returned an error while the builder
    /// was filling technical bins.
    #[error("builder callback failed for user bin {user_bin}: {source}")]
    BuilderCallbackFailed {
        /// The user bin whose callback failed.
        user_bin: u32,
        /// The underlying error returned by the callback.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A layout or index failed to (de)serialize, usually a truncated or
    /// corrupt binary stream.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl HibfError {
    /// Builds a [`HibfError::ConfigInvalid`] from anything `Display`.
    pub fn config_invalid(message: impl fmt::Display) -> Self {
        Self::ConfigInvalid(message.to_string())
    }

    /// Builds a [`HibfError::LayoutInfeasible`] from anything `Display`.
    pub fn layout_infeasible(message: impl fmt::Display) -> Self {
        Self::LayoutInfeasible(message.to_string())
    }

    /// Builds a [`HibfError::BuilderCallbackFailed`] wrapping `source`.
    pub fn builder_callback_failed(
        user_bin: u32,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::BuilderCallbackFailed {
            user_bin,
            source: Box::new(source),
        }
    }

    /// Builds a [`HibfError::Serialization`] from anything `Display`.
    pub fn serialization(message: impl fmt::Display) -> Self {
        Self::Serialization(message.to_string())
    }
}

/// Convenience alias used throughout the HIBF crates.
pub type Result<T> = std::result::Result<T, HibfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_invalid_carries_message() {
        let err = HibfError::config_invalid("tmax must be a multiple of 64");
        assert_eq!(
            err.to_string(),
            "invalid configuration: tmax must be a multiple of 64"
        );
    }

    #[test]
    fn builder_callback_failed_reports_user_bin() {
        #[derive(Debug, thiserror::Error)]
        #[error("boom")]
        struct Boom;

        let err = HibfError::builder_callback_failed(7, Boom);
        assert!(err.to_string().contains("user bin 7"));
    }
}
