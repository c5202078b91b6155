//! TypeScript pre-pass.
//!
//! Strips type syntax from `.ts` component sources before they reach the LWC
//! compiler. Decorators (`@api`, `@track`, `@wire`) and class fields are left
//! in place for the compiler to process.
//!
//! The configured passes decide what syntax is accepted:
//! - without `ClassProperties` class fields are an error;
//! - without `TypeScript` the source is parsed as plain JavaScript;
//! - `TypeScript { allow_declare_fields: false }` rejects `declare` fields;
//! - without `Decorators` any decorator is an error;
//! - `Decorators { before_export }` fixes where class decorators sit relative
//!   to `export`.

use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::{SourceType, Span};
use oxc_transformer::{TransformOptions, Transformer};

use crate::config::{NormalizeConfig, Pass};
use crate::error::{Result, TransformError};

pub trait TypedSourceNormalizer {
    /// Returns untyped module source for `source`. Any parse failure is fatal.
    fn normalize(&self, source: &str, path: &str, config: &NormalizeConfig) -> Result<String>;
}

/// Normalizer backed by the oxc parser, transformer and code generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OxcNormalizer;

impl TypedSourceNormalizer for OxcNormalizer {
    fn normalize(&self, source: &str, path: &str, config: &NormalizeConfig) -> Result<String> {
        let syntax = SyntaxOptions::from_passes(&config.passes);
        let allocator = Allocator::default();
        let source_type = SourceType::default()
            .with_typescript(syntax.typescript)
            .with_module(true);

        let ret = Parser::new(&allocator, source, source_type).parse();
        if ret.panicked || !ret.errors.is_empty() {
            return Err(TransformError::Normalize {
                path: path.to_string(),
                message: join_diagnostics(ret.errors.iter().map(|e| e.to_string())),
            });
        }
        let mut program = ret.program;

        syntax
            .check(&program, source)
            .map_err(|message| TransformError::Normalize {
                path: path.to_string(),
                message,
            })?;

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();

        // Defaults keep decorators unlowered and class fields as written.
        let mut transform_options = TransformOptions::default();
        transform_options.typescript.allow_declare_fields = syntax.allow_declare_fields;
        let ret = Transformer::new(&allocator, Path::new(path), &transform_options)
            .build_with_scoping(scoping, &mut program);
        if !ret.errors.is_empty() {
            return Err(TransformError::Normalize {
                path: path.to_string(),
                message: join_diagnostics(ret.errors.iter().map(|e| e.to_string())),
            });
        }

        let codegen_options = CodegenOptions {
            source_map_path: config.source_maps.inlines().then(|| PathBuf::from(path)),
            ..CodegenOptions::default()
        };
        let ret = Codegen::new().with_options(codegen_options).build(&program);

        let mut code = ret.code;
        if let Some(map) = ret.map {
            if !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str("//# sourceMappingURL=");
            code.push_str(&map.to_data_url());
        }

        tracing::trace!(path, bytes = code.len(), "stripped typescript");
        Ok(code)
    }
}

/// What the configured passes allow the source to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyntaxOptions {
    class_properties: bool,
    typescript: bool,
    allow_declare_fields: bool,
    /// `None` when decorators are not enabled at all.
    decorators_before_export: Option<bool>,
}

impl SyntaxOptions {
    fn from_passes(passes: &[Pass]) -> Self {
        let mut options = SyntaxOptions {
            class_properties: false,
            typescript: false,
            allow_declare_fields: false,
            decorators_before_export: None,
        };
        for pass in passes {
            match *pass {
                Pass::ClassProperties => options.class_properties = true,
                Pass::TypeScript { allow_declare_fields } => {
                    options.typescript = true;
                    options.allow_declare_fields = allow_declare_fields;
                }
                Pass::Decorators { before_export } => options.decorators_before_export = Some(before_export),
                _ => {}
            }
        }
        options
    }

    fn check(&self, program: &Program<'_>, source: &str) -> std::result::Result<(), String> {
        let mut usage = SyntaxUsage::default();
        usage.visit_program(program);

        if !self.class_properties && usage.class_field.is_some() {
            return Err("Class fields are not enabled.".to_string());
        }
        if self.typescript && !self.allow_declare_fields && usage.declare_field.is_some() {
            return Err("The 'declare' modifier is only allowed when allowDeclareFields is enabled.".to_string());
        }
        let Some(before_export) = self.decorators_before_export else {
            return match usage.decorator {
                Some(_) => Err("Decorators are not enabled.".to_string()),
                None => Ok(()),
            };
        };
        for class in exported_classes(program) {
            let Some(last) = class.decorators.last() else {
                continue;
            };
            let placed_before = source[last.span.end as usize..].trim_start().starts_with("export");
            if placed_before != before_export {
                let position = if before_export { "before" } else { "after" };
                return Err(format!("Decorators must be placed *{}* the 'export' keyword.", position));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct SyntaxUsage {
    decorator: Option<Span>,
    class_field: Option<Span>,
    declare_field: Option<Span>,
}

impl<'a> Visit<'a> for SyntaxUsage {
    fn visit_decorator(&mut self, decorator: &Decorator<'a>) {
        self.decorator.get_or_insert(decorator.span);
        walk::walk_decorator(self, decorator);
    }

    fn visit_property_definition(&mut self, def: &PropertyDefinition<'a>) {
        if def.declare {
            self.declare_field.get_or_insert(def.span);
        } else {
            self.class_field.get_or_insert(def.span);
        }
        walk::walk_property_definition(self, def);
    }
}

fn exported_classes<'p, 'a>(program: &'p Program<'a>) -> impl Iterator<Item = &'p Class<'a>> {
    program.body.iter().filter_map(|stmt| match stmt {
        Statement::ExportDefaultDeclaration(decl) => match &decl.declaration {
            ExportDefaultDeclarationKind::ClassDeclaration(class) => Some(&**class),
            _ => None,
        },
        Statement::ExportNamedDeclaration(decl) => match &decl.declaration {
            Some(Declaration::ClassDeclaration(class)) => Some(&**class),
            _ => None,
        },
        _ => None,
    })
}

fn join_diagnostics(diagnostics: impl Iterator<Item = String>) -> String {
    diagnostics.collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceMapMode;

    fn no_maps() -> NormalizeConfig {
        NormalizeConfig {
            source_maps: SourceMapMode::Off,
            ..NormalizeConfig::default()
        }
    }

    #[test]
    fn test_strips_type_annotations() {
        let src = "const count: number = 1;\nfunction greet(name: string): string { return name; }\nexport { count, greet };";
        let code = OxcNormalizer.normalize(src, "c/foo/foo.ts", &no_maps()).unwrap();
        assert!(!code.contains(": number"));
        assert!(!code.contains(": string"));
        assert!(code.contains("const count = 1"));
    }

    #[test]
    fn test_keeps_decorators_and_class_fields() {
        let src = r#"import { LightningElement, api } from "lwc";
interface Props { label: string }
export default class Foo extends LightningElement {
    @api label: string = "hi";
    count = 0;
    declare hidden: boolean;
}
"#;
        let code = OxcNormalizer.normalize(src, "c/foo/foo.ts", &no_maps()).unwrap();
        assert!(code.contains("@api"));
        assert!(code.contains("count = 0"));
        assert!(!code.contains("interface Props"));
        assert!(!code.contains("declare hidden"));
        assert!(code.contains("from \"lwc\""));
    }

    #[test]
    fn test_inline_map_when_configured() {
        let code = OxcNormalizer
            .normalize("const a: number = 1;", "c/foo/foo.ts", &NormalizeConfig::default())
            .unwrap();
        assert!(code.contains("//# sourceMappingURL=data:application/json"));
    }

    fn with_passes(passes: Vec<Pass>) -> NormalizeConfig {
        NormalizeConfig {
            source_maps: SourceMapMode::Off,
            passes,
        }
    }

    fn message(err: TransformError) -> String {
        match err {
            TransformError::Normalize { message, .. } => message,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_class_fields_need_class_properties_pass() {
        let src = "export default class Foo {\n    count = 0;\n}\n";
        let config = with_passes(vec![Pass::TypeScript { allow_declare_fields: true }]);
        let err = OxcNormalizer.normalize(src, "c/foo/foo.ts", &config).unwrap_err();
        assert_eq!(message(err), "Class fields are not enabled.");
        assert!(OxcNormalizer.normalize(src, "c/foo/foo.ts", &no_maps()).is_ok());
    }

    #[test]
    fn test_declare_fields_follow_config() {
        let src = "class Foo {\n    declare hidden: boolean;\n}\nexport default Foo;\n";
        let allowed = with_passes(vec![Pass::TypeScript { allow_declare_fields: true }]);
        assert!(OxcNormalizer.normalize(src, "c/foo/foo.ts", &allowed).is_ok());

        let denied = with_passes(vec![Pass::TypeScript { allow_declare_fields: false }]);
        let err = OxcNormalizer.normalize(src, "c/foo/foo.ts", &denied).unwrap_err();
        assert!(message(err).contains("allowDeclareFields"));
    }

    #[test]
    fn test_type_syntax_needs_typescript_pass() {
        let config = with_passes(vec![Pass::Decorators { before_export: true }]);
        let err = OxcNormalizer
            .normalize("const a: number = 1;", "c/foo/foo.ts", &config)
            .unwrap_err();
        assert!(matches!(err, TransformError::Normalize { .. }));
    }

    #[test]
    fn test_decorators_need_decorator_pass() {
        let src = "import { api } from \"lwc\";\nexport default class Foo {\n    @api label: string;\n}\n";
        let config = with_passes(vec![Pass::ClassProperties, Pass::TypeScript { allow_declare_fields: true }]);
        let err = OxcNormalizer.normalize(src, "c/foo/foo.ts", &config).unwrap_err();
        assert_eq!(message(err), "Decorators are not enabled.");
    }

    #[test]
    fn test_class_decorator_position() {
        let before = "@register\nexport class Foo {}\n";
        let after = "export @register class Foo {}\n";
        let before_export = no_maps();
        assert!(OxcNormalizer.normalize(before, "c/foo/foo.ts", &before_export).is_ok());
        let err = OxcNormalizer.normalize(after, "c/foo/foo.ts", &before_export).unwrap_err();
        assert!(message(err).contains("*before*"));

        let after_export = with_passes(vec![
            Pass::Decorators { before_export: false },
            Pass::TypeScript { allow_declare_fields: true },
        ]);
        assert!(OxcNormalizer.normalize(after, "c/foo/foo.ts", &after_export).is_ok());
        let err = OxcNormalizer.normalize(before, "c/foo/foo.ts", &after_export).unwrap_err();
        assert!(message(err).contains("*after*"));
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let err = OxcNormalizer
            .normalize("const = ;", "c/foo/broken.ts", &no_maps())
            .unwrap_err();
        assert!(matches!(err, TransformError::Normalize { ref path, .. } if path == "c/foo/broken.ts"));
    }
}
