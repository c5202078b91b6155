//! Immutable transform configurations.
//!
//! Both records are built once per process and shared by reference. Per-call
//! data (filename, upstream source map) travels in [`CallOptions`].

use crate::scoped_imports::{ScopedImportKind, SCOPED_IMPORT_PASSES};
use crate::source_map::SourceMapDocument;

/// Version of the LWC compiler this build is bound to, used when the host does
/// not report one.
pub const BUNDLED_COMPILER_VERSION: &str = "2.45.3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMapMode {
    Off,
    Inline,
    External,
    Both,
}

impl SourceMapMode {
    pub fn inlines(self) -> bool {
        matches!(self, SourceMapMode::Inline | SourceMapMode::Both)
    }

    pub fn returns_map(self) -> bool {
        matches!(self, SourceMapMode::External | SourceMapMode::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Hoists `jest.mock`-style calls above the module's imports.
    Jest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    ClassProperties,
    Decorators { before_export: bool },
    TypeScript { allow_declare_fields: bool },
    DynamicImport,
    ModulesCommonJs,
    ScopedImport(ScopedImportKind),
}

/// Configuration of the TypeScript pre-pass.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeConfig {
    pub source_maps: SourceMapMode,
    pub passes: Vec<Pass>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            source_maps: SourceMapMode::Inline,
            passes: vec![
                Pass::ClassProperties,
                Pass::Decorators { before_export: true },
                Pass::TypeScript { allow_declare_fields: true },
            ],
        }
    }
}

/// Configuration of the final pipeline run over the compiler output.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub source_maps: SourceMapMode,
    pub presets: Vec<Preset>,
    pub passes: Vec<Pass>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut passes = vec![Pass::DynamicImport, Pass::ModulesCommonJs];
        passes.extend(SCOPED_IMPORT_PASSES.iter().copied().map(Pass::ScopedImport));
        PipelineConfig {
            source_maps: SourceMapMode::Both,
            presets: vec![Preset::Jest],
            passes,
        }
    }
}

impl PipelineConfig {
    pub fn has_pass(&self, pass: Pass) -> bool {
        self.passes.contains(&pass)
    }

    pub fn has_preset(&self, preset: Preset) -> bool {
        self.presets.contains(&preset)
    }

    /// Scoped-import passes in configured order.
    pub fn scoped_imports(&self) -> Vec<ScopedImportKind> {
        self.passes
            .iter()
            .filter_map(|pass| match pass {
                Pass::ScopedImport(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }
}

/// Per-invocation options merged over an immutable config.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Identity of the output in its source map.
    pub filename: String,
    /// Map produced by the previous stage, chained into the output map.
    pub input_source_map: Option<SourceMapDocument>,
}

/// Process-wide, read-only state handed to every transform call.
#[derive(Debug, Clone)]
pub struct TransformerContext {
    pub normalize: NormalizeConfig,
    pub pipeline: PipelineConfig,
    pub compiler_version: String,
}

impl TransformerContext {
    pub fn new(compiler_version: impl Into<String>) -> Self {
        TransformerContext {
            normalize: NormalizeConfig::default(),
            pipeline: PipelineConfig::default(),
            compiler_version: compiler_version.into(),
        }
    }
}

impl Default for TransformerContext {
    fn default() -> Self {
        Self::new(BUNDLED_COMPILER_VERSION)
    }
}
