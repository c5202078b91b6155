//! Entry points called by the host test runner: `process` and `getCacheKey`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::cache::{self, CacheKeyArgs, CacheKeyInput};
use crate::classify::{classify, source_map_filename};
use crate::compiler::{CompileOptions, ComponentCompiler, ScopedStylePredicate};
use crate::config::TransformerContext;
use crate::error::Result;
use crate::normalize::{OxcNormalizer, TypedSourceNormalizer};
use crate::pipeline::{finalize, OxcEngine, TransformEngine, TransformOutput};

/// Collaborators used by a single [`process`] call.
pub struct Collaborators<'c> {
    pub normalizer: &'c dyn TypedSourceNormalizer,
    pub compiler: &'c dyn ComponentCompiler,
    pub styles: &'c dyn ScopedStylePredicate,
    pub engine: &'c dyn TransformEngine,
}

/// Transforms one source file into a CommonJS module Jest can execute.
///
/// `.ts` sources are stripped of types first; every file then goes through the
/// LWC compiler and the final pipeline. Upstream errors are returned as is.
pub fn process(
    ctx: &TransformerContext,
    with: &Collaborators<'_>,
    source: &str,
    path: &str,
) -> Result<TransformOutput> {
    let kind = classify(path);
    let _span = tracing::debug_span!("process", path, ?kind).entered();

    let normalized;
    let source = if kind.needs_type_stripping() {
        normalized = with.normalizer.normalize(source, path, &ctx.normalize)?;
        normalized.as_str()
    } else {
        source
    };

    let options = CompileOptions::for_path(path, with.styles);
    let compiled = with.compiler.compile(source, path, &options)?;

    finalize(
        with.engine,
        &ctx.pipeline,
        &compiled.code,
        &source_map_filename(path),
        compiled.map,
    )
}

/// Fingerprint of one source file under the current configuration,
/// environment and compiler version.
pub fn get_cache_key(
    ctx: &TransformerContext,
    source_text: &str,
    source_path: &str,
    args: &CacheKeyArgs,
) -> Result<String> {
    let environment = cache::current_environment();
    let key = cache::derive_key(&CacheKeyInput {
        source_text,
        source_path,
        config_string: args.config_string(),
        environment: &environment,
        compiler_version: &ctx.compiler_version,
    })?;
    tracing::trace!(source_path, %key, "derived cache key");
    Ok(key)
}

lazy_static! {
    static ref SHARED: Mutex<HashMap<String, Arc<Transformer>>> = Mutex::new(HashMap::new());
}

/// The transformer with its built-in normalizer and engine. Only the LWC
/// compiler and the scoped-style predicate come from outside.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    pub context: TransformerContext,
    normalizer: OxcNormalizer,
    engine: OxcEngine,
}

impl Transformer {
    pub fn new(context: TransformerContext) -> Self {
        Transformer {
            context,
            normalizer: OxcNormalizer,
            engine: OxcEngine,
        }
    }

    /// Process-wide transformer for `compiler_version`, built on first use.
    pub fn shared(compiler_version: &str) -> Arc<Transformer> {
        let mut shared = SHARED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        shared
            .entry(compiler_version.to_string())
            .or_insert_with(|| Arc::new(Transformer::new(TransformerContext::new(compiler_version))))
            .clone()
    }

    pub fn process(
        &self,
        compiler: &dyn ComponentCompiler,
        styles: &dyn ScopedStylePredicate,
        source: &str,
        path: &str,
    ) -> Result<TransformOutput> {
        let with = Collaborators {
            normalizer: &self.normalizer,
            compiler,
            styles,
            engine: &self.engine,
        };
        process(&self.context, &with, source, path)
    }

    pub fn get_cache_key(&self, source_text: &str, source_path: &str, args: &CacheKeyArgs) -> Result<String> {
        get_cache_key(&self.context, source_text, source_path, args)
    }
}
