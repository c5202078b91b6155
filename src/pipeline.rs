//! Final transform pipeline
//!
//! Runs the LWC compiler's output through the Jest preset, dynamic-import
//! support, ES module → CommonJS conversion and the scoped-import passes, in a
//! single oxc parse. Rewrites are span edits on the original text. Removed
//! statements leave their newlines behind and everything new is prepended as a
//! header, so the body keeps its line numbers and the upstream map can be
//! chained by a plain line shift.

use std::collections::HashSet;

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use regex::Regex;

use crate::config::{CallOptions, Pass, PipelineConfig, Preset};
use crate::error::{Result, TransformError};
use crate::emit::{is_identifier, js_string, member, property_key};
use crate::scoped_imports::{find_pass, ImportBinding, ScopedImportKind};
use crate::source_map::SourceMapDocument;

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub code: String,
    pub map: Option<SourceMapDocument>,
}

/// A general-purpose source transformer driven by a [`PipelineConfig`].
pub trait TransformEngine {
    fn transform(&self, code: &str, config: &PipelineConfig, call: &CallOptions) -> Result<TransformOutput>;
}

/// Runs the compiled module through `engine`.
///
/// `filename` becomes the identity of the output in its source map, and
/// `input_map` (the compiler's map, if it had one) is chained underneath.
pub fn finalize(
    engine: &dyn TransformEngine,
    config: &PipelineConfig,
    code: &str,
    filename: &str,
    input_map: Option<SourceMapDocument>,
) -> Result<TransformOutput> {
    let call = CallOptions {
        filename: filename.to_string(),
        input_source_map: input_map,
    };
    tracing::debug!(
        filename,
        passes = config.passes.len(),
        chained_map = call.input_source_map.is_some(),
        "finalizing module"
    );
    engine.transform(code, config, &call)
}

// ═══════════════════════════════════════════════════════════════════════════════
// OXC ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Jest calls that must run before any `require` of the module under test.
const HOISTED_JEST_METHODS: [&str; 5] = ["mock", "unmock", "enableAutomock", "disableAutomock", "deepUnmock"];

fn interop_require_default(name: &str) -> String {
    format!(
        "function {}(e) {{ return e && e.__esModule ? e : {{ default: e }}; }}\n",
        name
    )
}

fn interop_require_wildcard(name: &str) -> String {
    format!(
        "function {}(e) {{ if (e && e.__esModule) return e; var n = {{ default: e }}; if (e !== null && (typeof e === \"object\" || typeof e === \"function\")) {{ for (var k in e) {{ if (k !== \"default\" && Object.prototype.hasOwnProperty.call(e, k)) n[k] = e[k]; }} }} return n; }}\n",
        name
    )
}

lazy_static::lazy_static! {
    /// Map comments left by earlier stages; only the final map may be referenced.
    static ref SOURCE_MAPPING_URL: Regex = Regex::new(r"(?m)^[ \t]*//[#@] sourceMappingURL=.*$").unwrap();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OxcEngine;

impl TransformEngine for OxcEngine {
    fn transform(&self, code: &str, config: &PipelineConfig, call: &CallOptions) -> Result<TransformOutput> {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true);
        let ret = Parser::new(&allocator, code, source_type).parse();
        if ret.panicked || !ret.errors.is_empty() {
            return Err(TransformError::Parse {
                filename: call.filename.clone(),
                message: ret
                    .errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("\n"),
            });
        }

        let mut rewriter = ModuleRewriter::new(code, config);
        rewriter.rewrite_program(&ret.program)?;
        let (header, body, footer) = rewriter.finish();
        let body = SOURCE_MAPPING_URL.replace_all(&body, "");

        let header_lines = header.matches('\n').count();
        let mut output = String::with_capacity(header.len() + body.len() + footer.len());
        output.push_str(&header);
        output.push_str(&body);
        if !footer.is_empty() {
            if !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&footer);
        }

        let map = match &call.input_source_map {
            Some(input) => input.clone().shift_generated_lines(header_lines),
            None => SourceMapDocument::line_identity(&call.filename, code, header_lines),
        }
        .with_file(&call.filename);

        if config.source_maps.inlines() {
            if !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&map.inline_comment()?);
        }

        Ok(TransformOutput {
            code: output,
            map: config.source_maps.returns_map().then_some(map),
        })
    }
}

/// Names of the interop helpers, allocated on first use.
#[derive(Default)]
struct Helpers {
    default: Option<String>,
    wildcard: Option<String>,
}

struct ModuleRewriter<'s> {
    source: &'s str,
    scoped_passes: Vec<ScopedImportKind>,
    commonjs: bool,
    dynamic_import: bool,
    hoist_jest: bool,

    replacements: Vec<(u32, u32, String)>,
    hoisted: Vec<String>,
    imports: Vec<String>,
    exports: Vec<String>,
    helpers: Helpers,
    has_exports: bool,
    references: HashSet<String>,
}

impl<'s> ModuleRewriter<'s> {
    fn new(source: &'s str, config: &PipelineConfig) -> Self {
        let commonjs = config.has_pass(Pass::ModulesCommonJs);
        ModuleRewriter {
            source,
            scoped_passes: config.scoped_imports(),
            commonjs,
            // import() needs require() to be meaningful
            dynamic_import: commonjs && config.has_pass(Pass::DynamicImport),
            hoist_jest: config.has_preset(Preset::Jest),
            replacements: Vec::new(),
            hoisted: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            helpers: Helpers::default(),
            has_exports: false,
            references: HashSet::new(),
        }
    }

    fn slice(&self, span: Span) -> &'s str {
        &self.source[span.start as usize..span.end as usize]
    }

    /// Drops a statement while keeping its newlines.
    fn blank(&mut self, span: Span) {
        let newlines = self.slice(span).matches('\n').count();
        self.replacements.push((span.start, span.end, "\n".repeat(newlines)));
    }

    fn rewrite_program(&mut self, program: &Program<'_>) -> Result<()> {
        let mut names = NameCollector::default();
        names.visit_program(program);
        self.references = names.names;

        let dynamic_imports = if self.dynamic_import {
            let mut collector = DynamicImportCollector::default();
            collector.visit_program(program);
            collector.found
        } else {
            Vec::new()
        };
        let mut dynamic_edits = Vec::with_capacity(dynamic_imports.len());
        for (whole, source) in dynamic_imports {
            let helper = self.wildcard_helper();
            let replacement = format!(
                "Promise.resolve().then(() => {}(require({})))",
                helper,
                self.slice(source)
            );
            dynamic_edits.push((whole.start, whole.end, replacement));
        }

        for stmt in &program.body {
            match stmt {
                Statement::ImportDeclaration(decl) => self.rewrite_import(decl)?,
                Statement::ExportDefaultDeclaration(decl) if self.commonjs => {
                    self.rewrite_export_default(decl)
                }
                Statement::ExportNamedDeclaration(decl) if self.commonjs => self.rewrite_export_named(decl),
                Statement::ExportAllDeclaration(decl) if self.commonjs => self.rewrite_export_all(decl),
                Statement::ExpressionStatement(expr) if self.hoist_jest && is_hoisted_jest_call(expr) => {
                    // Moved text must carry the edits made inside it.
                    let nested = dynamic_edits
                        .iter()
                        .filter(|(start, end, _)| *start >= expr.span.start && *end <= expr.span.end)
                        .cloned()
                        .collect();
                    let call = apply_edits(self.slice(expr.span), expr.span.start, nested);
                    self.hoisted.push(call);
                    self.blank(expr.span);
                }
                _ => {}
            }
        }

        self.replacements.extend(dynamic_edits);
        Ok(())
    }

    // ── imports ──────────────────────────────────────────────────────────────

    fn rewrite_import(&mut self, decl: &ImportDeclaration<'_>) -> Result<()> {
        if decl.import_kind.is_type() {
            self.blank(decl.span);
            return Ok(());
        }

        let specifier = decl.source.value.as_str();
        let bindings = import_bindings(decl);
        let type_only_specifiers = decl.specifiers.as_ref().map_or(false, |s| !s.is_empty()) && bindings.is_empty();

        if let Some(pass) = find_pass(&self.scoped_passes, specifier) {
            tracing::trace!(specifier, pass = pass.name(), "rewriting scoped import");
            self.imports.push(pass.rewrite(specifier, &bindings)?);
            self.blank(decl.span);
            return Ok(());
        }

        if !self.commonjs {
            return Ok(());
        }
        if !type_only_specifiers {
            let statement = self.require_statement(specifier, &bindings);
            self.imports.push(statement);
        }
        self.blank(decl.span);
        Ok(())
    }

    fn require_statement(&mut self, specifier: &str, bindings: &[ImportBinding]) -> String {
        let require = format!("require({})", js_string(specifier));
        if bindings.is_empty() {
            return format!("{};\n", require);
        }

        // `{ default as x }` needs the interop helper like a default import.
        let named_only = bindings
            .iter()
            .all(|b| matches!(b, ImportBinding::Named { imported, .. } if imported != "default"));
        if named_only {
            let fields = bindings
                .iter()
                .filter_map(|b| match b {
                    ImportBinding::Named { imported, local } if imported == local && is_identifier(imported) => {
                        Some(local.clone())
                    }
                    ImportBinding::Named { imported, local } => Some(format!("{}: {}", property_key(imported), local)),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(", ");
            return format!("const {{ {} }} = {};\n", fields, require);
        }

        if let [ImportBinding::Default(local)] = bindings {
            let helper = self.default_helper();
            return format!("const {} = {}({}).default;\n", local, helper, require);
        }

        let helper = self.wildcard_helper();
        let reference = self.fresh_reference(specifier);
        let mut declarators = vec![format!("{} = {}({})", reference, helper, require)];
        for binding in bindings {
            declarators.push(match binding {
                ImportBinding::Default(local) => format!("{} = {}.default", local, reference),
                ImportBinding::Namespace(local) => format!("{} = {}", local, reference),
                ImportBinding::Named { imported, local } => {
                    format!("{} = {}{}", local, reference, member(imported))
                }
            });
        }
        format!("const {};\n", declarators.join(", "))
    }

    /// Module reference name derived from the specifier, e.g. `./foo.html` → `_foo`.
    fn fresh_reference(&mut self, specifier: &str) -> String {
        let stem = specifier
            .rsplit('/')
            .next()
            .unwrap_or(specifier)
            .split('.')
            .next()
            .unwrap_or_default();
        let cleaned: String = stem
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
            .collect();
        self.fresh_name(&format!("_{}", cleaned))
    }

    /// `base`, or `base2`, `base3`, ... when the module already uses the name.
    fn fresh_name(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut n = 2;
        while !self.references.insert(candidate.clone()) {
            candidate = format!("{}{}", base, n);
            n += 1;
        }
        candidate
    }

    fn default_helper(&mut self) -> String {
        if let Some(name) = &self.helpers.default {
            return name.clone();
        }
        let name = self.fresh_name("_interopRequireDefault");
        self.helpers.default = Some(name.clone());
        name
    }

    fn wildcard_helper(&mut self) -> String {
        if let Some(name) = &self.helpers.wildcard {
            return name.clone();
        }
        let name = self.fresh_name("_interopRequireWildcard");
        self.helpers.wildcard = Some(name.clone());
        name
    }

    // ── exports ──────────────────────────────────────────────────────────────

    fn rewrite_export_default(&mut self, decl: &ExportDefaultDeclaration<'_>) {
        self.has_exports = true;
        let inner = decl.declaration.span();
        let named = match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(func) => func.id.as_ref().map(|id| id.name.to_string()),
            ExportDefaultDeclarationKind::ClassDeclaration(class) => class.id.as_ref().map(|id| id.name.to_string()),
            ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
                self.blank(decl.span);
                return;
            }
            _ => None,
        };
        match named {
            Some(name) => {
                self.replacements.push((decl.span.start, inner.start, String::new()));
                self.exports.push(format!("exports.default = {};\n", name));
            }
            None => {
                self.replacements
                    .push((decl.span.start, inner.start, "exports.default = ".to_string()));
                // A declaration needs no semicolon, the assignment does.
                if matches!(
                    decl.declaration,
                    ExportDefaultDeclarationKind::FunctionDeclaration(_)
                        | ExportDefaultDeclarationKind::ClassDeclaration(_)
                ) {
                    self.replacements.push((inner.end, inner.end, ";".to_string()));
                }
            }
        }
    }

    fn rewrite_export_named(&mut self, decl: &ExportNamedDeclaration<'_>) {
        if decl.export_kind.is_type() {
            self.blank(decl.span);
            return;
        }
        self.has_exports = true;

        if let Some(source) = &decl.source {
            let reference = self.reexport_reference(source.value.as_str());
            for spec in &decl.specifiers {
                if spec.export_kind.is_type() {
                    continue;
                }
                self.exports.push(getter_export(
                    &spec.exported.name(),
                    &format!("{}{}", reference, member(&spec.local.name())),
                ));
            }
            self.blank(decl.span);
            return;
        }

        if let Some(declaration) = &decl.declaration {
            let names = match declaration {
                Declaration::VariableDeclaration(var) => {
                    let mut names = Vec::new();
                    for declarator in &var.declarations {
                        collect_binding_names(&declarator.id, &mut names);
                    }
                    names
                }
                Declaration::FunctionDeclaration(func) => func.id.iter().map(|id| id.name.to_string()).collect(),
                Declaration::ClassDeclaration(class) => class.id.iter().map(|id| id.name.to_string()).collect(),
                _ => {
                    self.blank(decl.span);
                    return;
                }
            };
            self.replacements
                .push((decl.span.start, declaration.span().start, String::new()));
            for name in names {
                self.exports.push(format!("exports{} = {};\n", member(&name), name));
            }
            return;
        }

        for spec in &decl.specifiers {
            if spec.export_kind.is_type() {
                continue;
            }
            self.exports
                .push(format!("exports{} = {};\n", member(&spec.exported.name()), spec.local.name()));
        }
        self.blank(decl.span);
    }

    fn rewrite_export_all(&mut self, decl: &ExportAllDeclaration<'_>) {
        if decl.export_kind.is_type() {
            self.blank(decl.span);
            return;
        }
        self.has_exports = true;
        let reference = self.reexport_reference(decl.source.value.as_str());
        match &decl.exported {
            Some(name) => self.exports.push(format!("exports{} = {};\n", member(&name.name()), reference)),
            None => self.exports.push(format!(
                "Object.keys({r}).forEach(function (key) {{ if (key === \"default\" || key === \"__esModule\") return; if (key in exports && exports[key] === {r}[key]) return; Object.defineProperty(exports, key, {{ enumerable: true, get: function () {{ return {r}[key]; }} }}); }});\n",
                r = reference
            )),
        }
        self.blank(decl.span);
    }

    fn reexport_reference(&mut self, specifier: &str) -> String {
        let helper = self.wildcard_helper();
        let reference = self.fresh_reference(specifier);
        self.imports.push(format!(
            "const {} = {}(require({}));\n",
            reference,
            helper,
            js_string(specifier)
        ));
        reference
    }

    // ── assembly ─────────────────────────────────────────────────────────────

    fn finish(mut self) -> (String, String, String) {
        let mut header = String::new();
        if self.commonjs {
            header.push_str("\"use strict\";\n");
            if self.has_exports {
                header.push_str("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
            }
        }
        if let Some(name) = &self.helpers.default {
            header.push_str(&interop_require_default(name));
        }
        if let Some(name) = &self.helpers.wildcard {
            header.push_str(&interop_require_wildcard(name));
        }
        for call in &self.hoisted {
            header.push_str(call);
            header.push('\n');
        }
        for import in &self.imports {
            header.push_str(import);
        }

        let body = apply_edits(self.source, 0, self.replacements);
        (header, body, self.exports.concat())
    }
}

/// Applies `(start, end, text)` edits to `text`, which begins at offset `base`
/// of the module. An edit nested inside an earlier one is dropped.
fn apply_edits(text: &str, base: u32, mut edits: Vec<(u32, u32, String)>) -> String {
    edits.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    let mut kept: Vec<(u32, u32, String)> = Vec::with_capacity(edits.len());
    for edit in edits {
        if kept.last().map_or(true, |last| edit.0 >= last.1) {
            kept.push(edit);
        }
    }
    let mut out = text.to_string();
    for (start, end, replacement) in kept.into_iter().rev() {
        out.replace_range(((start - base) as usize)..((end - base) as usize), &replacement);
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// AST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Every identifier the module binds or references.
#[derive(Default)]
struct NameCollector {
    names: HashSet<String>,
}

impl<'a> Visit<'a> for NameCollector {
    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.names.insert(ident.name.to_string());
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.names.insert(ident.name.to_string());
    }
}

#[derive(Default)]
struct DynamicImportCollector {
    /// (whole `import(...)` span, specifier argument span)
    found: Vec<(Span, Span)>,
}

impl<'a> Visit<'a> for DynamicImportCollector {
    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        self.found.push((expr.span, expr.source.span()));
    }
}

fn is_hoisted_jest_call(stmt: &ExpressionStatement<'_>) -> bool {
    let Expression::CallExpression(call) = &stmt.expression else {
        return false;
    };
    let Expression::StaticMemberExpression(callee) = &call.callee else {
        return false;
    };
    matches!(&callee.object, Expression::Identifier(obj) if obj.name == "jest")
        && HOISTED_JEST_METHODS.contains(&callee.property.name.as_str())
}

fn import_bindings(decl: &ImportDeclaration<'_>) -> Vec<ImportBinding> {
    let mut bindings = Vec::new();
    if let Some(specifiers) = &decl.specifiers {
        for specifier in specifiers {
            match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    if s.import_kind.is_type() {
                        continue;
                    }
                    bindings.push(ImportBinding::Named {
                        imported: s.imported.name().to_string(),
                        local: s.local.name.to_string(),
                    });
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    bindings.push(ImportBinding::Default(s.local.name.to_string()));
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    bindings.push(ImportBinding::Namespace(s.local.name.to_string()));
                }
            }
        }
    }
    bindings
}

fn collect_binding_names(pattern: &BindingPattern<'_>, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for pattern in arr.elements.iter().flatten() {
                collect_binding_names(pattern, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        BindingPattern::AssignmentPattern(assign) => collect_binding_names(&assign.left, names),
    }
}

fn getter_export(exported: &str, target: &str) -> String {
    format!(
        "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {}; }} }});\n",
        js_string(exported),
        target
    )
}
