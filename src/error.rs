//! Error types for the transformer.
//!
//! Upstream failures (normalizer, LWC compiler) are carried without rewording so
//! the host runner shows the diagnostic the failing tool produced.

use thiserror::Error;

/// Boxed upstream error as returned by a collaborator.
pub type UpstreamError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can abort a transform or a cache-key request.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The host runner called `getCacheKey` with an unsupported arity.
    #[error("Unexpected transform arguments.")]
    UnexpectedArguments {
        /// Number of arguments after `sourceText` and `sourcePath`.
        count: usize,
    },

    /// An argument had the right position but the wrong shape.
    #[error("invalid transform argument: {0}")]
    InvalidArgument(String),

    /// The typed-source normalizer rejected the input.
    #[error("{message}")]
    Normalize { path: String, message: String },

    /// The LWC compiler failed. Displayed exactly as the compiler reported it.
    #[error(transparent)]
    Compiler(UpstreamError),

    /// The general transform engine could not parse the compiled module.
    #[error("{filename}: {message}")]
    Parse { filename: String, message: String },

    /// A reserved `@salesforce/*` import used a shape its pass does not support.
    #[error("{specifier}: {message}")]
    ScopedImport { specifier: String, message: String },

    /// A source map or cache-key field could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TransformError {
    pub fn compiler<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TransformError::Compiler(Box::new(err))
    }

    pub(crate) fn scoped_import(specifier: &str, message: impl Into<String>) -> Self {
        TransformError::ScopedImport {
            specifier: specifier.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("LWC1007: Unexpected token (3:4)")]
    struct FakeCompilerError;

    #[test]
    fn test_compiler_error_is_transparent() {
        let err = TransformError::compiler(FakeCompilerError);
        assert_eq!(err.to_string(), "LWC1007: Unexpected token (3:4)");
    }

    #[test]
    fn test_unexpected_arguments_message() {
        let err = TransformError::UnexpectedArguments { count: 3 };
        assert_eq!(err.to_string(), "Unexpected transform arguments.");
    }
}
