// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════
//
// The Jest-facing surface. The LWC compiler and the optional scoped-style
// predicate are JavaScript functions; they are wrapped in proxies that satisfy
// the crate's collaborator traits for the duration of one call.
//
// Jest loads a small JS entry module, not this addon directly. That module
// supplies what only JavaScript can reach:
//
//   const compiler = require("@lwc/compiler");
//   module.exports = {
//     process: (src, path) => native.process(src, path, compiler.transformSync),
//     getCacheKey: (src, path, ...rest) =>
//       native.getCacheKey(src, path, compiler.version, rest),
//   };
//
// `rest` is Jest's trailing arguments exactly as received, so both calling
// conventions (and the arity check) are handled here.

use std::sync::Once;

use napi::{Env, JsFunction, JsUnknown};
use napi_derive::napi;
use serde::Deserialize;
use serde_json::Value;

use crate::cache::CacheKeyArgs;
use crate::compiler::{CompileOptions, CompiledUnit, ComponentCompiler, ScopedCssSuffix, ScopedStylePredicate};
use crate::config::BUNDLED_COMPILER_VERSION;
use crate::error::{Result, TransformError};
use crate::transformer::Transformer;

/// Environment variable holding the log level for the native side.
const LOG_ENV: &str = "LWC_JEST_TRANSFORMER_LOG";

static LOGGING: Once = Once::new();


fn init_logging() {
    LOGGING.call_once(|| {
        let Some(level) = std::env::var(LOG_ENV)
            .ok()
            .and_then(|raw| raw.parse::<tracing::Level>().ok())
        else {
            return;
        };
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

#[napi(object)]
pub struct TransformOutput {
    pub code: String,
    pub map: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawCompilerResult {
    code: String,
    #[serde(default)]
    map: Option<Value>,
}

/// Calls `transformSync(source, path, options)` from the LWC compiler package.
struct JsComponentCompiler<'e> {
    env: &'e Env,
    transform_sync: &'e JsFunction,
}

impl JsComponentCompiler<'_> {
    fn call(&self, source: &str, path: &str, options: &CompileOptions) -> napi::Result<RawCompilerResult> {
        let args: [JsUnknown; 3] = [
            self.env.create_string(source)?.into_unknown(),
            self.env.create_string(path)?.into_unknown(),
            self.env.to_js_value(options)?,
        ];
        let result = self.transform_sync.call(None, &args)?;
        self.env.from_js_value(result)
    }
}

impl ComponentCompiler for JsComponentCompiler<'_> {
    fn compile(&self, source: &str, path: &str, options: &CompileOptions) -> Result<CompiledUnit> {
        let raw = self.call(source, path, options).map_err(TransformError::compiler)?;
        Ok(CompiledUnit::from_raw(raw.code, raw.map))
    }
}

/// Host-supplied scoped stylesheet check. A throwing predicate counts as `false`.
struct JsScopedStyle<'e> {
    env: &'e Env,
    predicate: &'e JsFunction,
}

impl ScopedStylePredicate for JsScopedStyle<'_> {
    fn is_scoped_style(&self, path: &str) -> bool {
        let answer = self
            .env
            .create_string(path)
            .and_then(|arg| self.predicate.call(None, &[arg]))
            .and_then(|value| value.coerce_to_bool())
            .and_then(|value| value.get_value());
        match answer {
            Ok(scoped) => scoped,
            Err(err) => {
                tracing::warn!(path, %err, "scoped style predicate failed");
                false
            }
        }
    }
}

/// Compiler errors pass through untouched so the original JS error reaches Jest.
fn into_napi_error(err: TransformError) -> napi::Error {
    match err {
        TransformError::Compiler(upstream) => match upstream.downcast::<napi::Error>() {
            Ok(original) => *original,
            Err(other) => napi::Error::from_reason(other.to_string()),
        },
        other => napi::Error::from_reason(other.to_string()),
    }
}

#[napi(js_name = "process")]
pub fn process_native(
    env: Env,
    source_text: String,
    source_path: String,
    transform_sync: JsFunction,
    is_scoped_css: Option<JsFunction>,
) -> napi::Result<TransformOutput> {
    init_logging();
    let compiler = JsComponentCompiler {
        env: &env,
        transform_sync: &transform_sync,
    };
    let host_styles = is_scoped_css.as_ref().map(|predicate| JsScopedStyle { env: &env, predicate });
    let styles: &dyn ScopedStylePredicate = match &host_styles {
        Some(predicate) => predicate,
        None => &ScopedCssSuffix,
    };

    let output = Transformer::shared(BUNDLED_COMPILER_VERSION)
        .process(&compiler, styles, &source_text, &source_path)
        .map_err(into_napi_error)?;
    let map = output
        .map
        .map(|map| map.to_value())
        .transpose()
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    Ok(TransformOutput { code: output.code, map })
}

/// `getCacheKey(sourceText, sourcePath, compilerVersion, rest)`. `rest` holds
/// Jest's trailing arguments: `[options]` or `[configString, transformConfig]`.
/// `compilerVersion` is the version of the LWC compiler the entry module loaded.
#[napi(js_name = "getCacheKey")]
pub fn get_cache_key_native(
    source_text: String,
    source_path: String,
    compiler_version: String,
    rest: Vec<serde_json::Value>,
) -> napi::Result<String> {
    init_logging();
    let args = CacheKeyArgs::from_values(&rest).map_err(into_napi_error)?;
    Transformer::shared(&compiler_version)
        .get_cache_key(&source_text, &source_path, &args)
        .map_err(into_napi_error)
}

/// The options `process` hands the LWC compiler for `sourcePath`, with the
/// default scoped-style rule.
#[napi(js_name = "compilerOptionsFor")]
pub fn compiler_options_for_native(source_path: String) -> napi::Result<serde_json::Value> {
    serde_json::to_value(CompileOptions::for_path(&source_path, &ScopedCssSuffix))
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}
