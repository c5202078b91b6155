//! # LWC Jest Transformer
//!
//! Turns Lightning Web Component sources (`.js`, `.ts`, `.html`, `.css`) into
//! CommonJS modules a Jest test runner can execute.
//!
//! ## Pipeline
//!
//! 1. **Classify** the file by extension.
//! 2. **Normalize** `.ts` sources: type syntax is stripped, decorators are kept
//!    for the LWC compiler.
//! 3. **Compile** with the LWC compiler (supplied by the host).
//! 4. **Finalize**: Jest hoisting, dynamic `import()` support, ES module to
//!    CommonJS conversion and the `@salesforce/*` scoped-import rewrites.
//!
//! `get_cache_key` fingerprints a file so the runner can skip unchanged work.

mod cache;
mod classify;
mod compiler;
mod config;
mod emit;
mod error;
mod normalize;
mod pipeline;
mod scoped_imports;
mod source_map;
mod transformer;

#[cfg(feature = "napi")]
mod napi_bindings;

#[cfg(test)]
mod transformer_tests;

pub use cache::{derive_key, CacheKeyArgs, CacheKeyInput, CACHE_EPOCH};
pub use classify::{classify, source_map_filename, FileKind};
pub use compiler::{CompileOptions, CompiledUnit, ComponentCompiler, ScopedCssSuffix, ScopedStylePredicate};
pub use config::{
    CallOptions, NormalizeConfig, Pass, PipelineConfig, Preset, SourceMapMode, TransformerContext,
    BUNDLED_COMPILER_VERSION,
};
pub use error::{Result, TransformError, UpstreamError};
pub use normalize::{OxcNormalizer, TypedSourceNormalizer};
pub use pipeline::{finalize, OxcEngine, TransformEngine, TransformOutput};
pub use scoped_imports::{ImportBinding, ScopedImportKind, SCOPED_IMPORT_PASSES};
pub use source_map::SourceMapDocument;
pub use transformer::{get_cache_key, process, Collaborators, Transformer};

#[cfg(feature = "napi")]
pub use napi_bindings::{compiler_options_for_native, get_cache_key_native, process_native};
