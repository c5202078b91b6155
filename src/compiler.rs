//! LWC compiler invocation.
//!
//! The compiler itself lives outside this crate; this module owns the fixed
//! option set it is called with and the shape of what comes back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::source_map::SourceMapDocument;

/// Placeholder component name; it cannot be derived from a test file path.
pub const DEFAULT_COMPONENT_NAME: &str = "test";
/// Placeholder namespace, for the same reason.
pub const DEFAULT_NAMESPACE: &str = "x";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub sourcemap: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicComponentConfig {
    pub strict_specifier: bool,
}

/// Options passed to every compiler call. Field names follow the LWC compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    pub name: String,
    pub namespace: String,
    pub output_config: OutputConfig,
    pub experimental_dynamic_component: DynamicComponentConfig,
    pub scoped_styles: bool,
    pub enable_lwc_spread: bool,
    pub enable_dynamic_components: bool,
}

impl CompileOptions {
    pub fn for_path(path: &str, styles: &dyn ScopedStylePredicate) -> Self {
        CompileOptions {
            name: DEFAULT_COMPONENT_NAME.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            output_config: OutputConfig { sourcemap: true },
            experimental_dynamic_component: DynamicComponentConfig {
                strict_specifier: false,
            },
            scoped_styles: styles.is_scoped_style(path),
            enable_lwc_spread: true,
            enable_dynamic_components: true,
        }
    }
}

/// Compiler output: module code plus an optional map for chaining.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUnit {
    pub code: String,
    pub map: Option<SourceMapDocument>,
}

impl CompiledUnit {
    /// Builds a unit from raw compiler output, discarding maps without a
    /// version marker. `.html` and `.css` outputs typically carry none.
    pub fn from_raw(code: String, map: Option<Value>) -> Self {
        let map = match map {
            Some(raw) => {
                let parsed = SourceMapDocument::from_value(raw);
                if parsed.is_none() {
                    tracing::debug!("compiler returned a source map without a version marker, ignoring it");
                }
                parsed
            }
            None => None,
        };
        CompiledUnit { code, map }
    }
}

pub trait ComponentCompiler {
    /// Compiles one single-file-component source. Errors are returned as the
    /// compiler reported them.
    fn compile(&self, source: &str, path: &str, options: &CompileOptions) -> Result<CompiledUnit>;
}

/// Decides whether a path is a scoped stylesheet.
pub trait ScopedStylePredicate {
    fn is_scoped_style(&self, path: &str) -> bool;
}

impl<F> ScopedStylePredicate for F
where
    F: Fn(&str) -> bool,
{
    fn is_scoped_style(&self, path: &str) -> bool {
        self(path)
    }
}

/// Recognises scoped stylesheets by their `.scoped.css` suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopedCssSuffix;

impl ScopedStylePredicate for ScopedCssSuffix {
    fn is_scoped_style(&self, path: &str) -> bool {
        path.ends_with(".scoped.css")
    }
}
