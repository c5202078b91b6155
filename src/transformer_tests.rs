//! End-to-end tests of `process` and `get_cache_key` with a stand-in LWC compiler.

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use crate::cache::CacheKeyArgs;
    use crate::compiler::{CompileOptions, CompiledUnit, ComponentCompiler, ScopedCssSuffix};
    use crate::config::{NormalizeConfig, TransformerContext};
    use crate::error::{Result, TransformError};
    use crate::normalize::{OxcNormalizer, TypedSourceNormalizer};
    use crate::pipeline::OxcEngine;
    use crate::transformer::{process, Collaborators, Transformer};

    /// Passes scripts through untouched and turns markup and styles into
    /// template and stylesheet modules, like the real compiler does.
    #[derive(Default)]
    struct FakeCompiler {
        calls: RefCell<Vec<(String, String, CompileOptions)>>,
        map: Option<serde_json::Value>,
    }

    impl ComponentCompiler for FakeCompiler {
        fn compile(&self, source: &str, path: &str, options: &CompileOptions) -> Result<CompiledUnit> {
            self.calls
                .borrow_mut()
                .push((source.to_string(), path.to_string(), options.clone()));
            let code = if path.ends_with(".html") {
                "import { registerTemplate } from \"lwc\";\nfunction tmpl() { return []; }\nexport default registerTemplate(tmpl);\n".to_string()
            } else if path.ends_with(".css") {
                "function stylesheet() { return \"\"; }\nexport default [stylesheet];\n".to_string()
            } else {
                source.to_string()
            };
            Ok(CompiledUnit::from_raw(code, self.map.clone()))
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("LWC1075: Unexpected token `<` (2:3)")]
    struct CompileFailure;

    struct FailingCompiler;

    impl ComponentCompiler for FailingCompiler {
        fn compile(&self, _: &str, _: &str, _: &CompileOptions) -> Result<CompiledUnit> {
            Err(TransformError::compiler(CompileFailure))
        }
    }

    /// Records that it ran, then delegates to the oxc normalizer.
    struct RecordingNormalizer<'l> {
        log: &'l RefCell<Vec<&'static str>>,
    }

    impl TypedSourceNormalizer for RecordingNormalizer<'_> {
        fn normalize(&self, source: &str, path: &str, config: &NormalizeConfig) -> Result<String> {
            self.log.borrow_mut().push("normalize");
            OxcNormalizer.normalize(source, path, config)
        }
    }

    struct RecordingCompiler<'l> {
        log: &'l RefCell<Vec<&'static str>>,
        inner: FakeCompiler,
    }

    impl ComponentCompiler for RecordingCompiler<'_> {
        fn compile(&self, source: &str, path: &str, options: &CompileOptions) -> Result<CompiledUnit> {
            self.log.borrow_mut().push("compile");
            self.inner.compile(source, path, options)
        }
    }

    fn run_recorded(path: &str, source: &str) -> Vec<&'static str> {
        let log = RefCell::new(Vec::new());
        let normalizer = RecordingNormalizer { log: &log };
        let compiler = RecordingCompiler {
            log: &log,
            inner: FakeCompiler::default(),
        };
        let with = Collaborators {
            normalizer: &normalizer,
            compiler: &compiler,
            styles: &ScopedCssSuffix,
            engine: &OxcEngine,
        };
        process(&TransformerContext::default(), &with, source, path).unwrap();
        log.into_inner()
    }

    #[test]
    fn test_typescript_is_normalized_before_compiling() {
        assert_eq!(
            run_recorded("c/foo/foo.ts", "const a: number = 1;\nexport default a;\n"),
            vec!["normalize", "compile"]
        );
    }

    #[test]
    fn test_other_kinds_skip_normalization() {
        assert_eq!(run_recorded("c/foo/foo.js", "export default 1;\n"), vec!["compile"]);
        assert_eq!(run_recorded("c/foo/foo.html", "<template></template>"), vec!["compile"]);
        assert_eq!(run_recorded("c/foo/foo.css", ":host {}"), vec!["compile"]);
    }

    #[test]
    fn test_output_has_no_module_syntax_left() {
        let compiler = FakeCompiler::default();
        let src = "import { LightningElement } from \"lwc\";\nexport default class Foo extends LightningElement {\n  async load() { return import(\"c/lazy\"); }\n}\n";
        let out = Transformer::default()
            .process(&compiler, &ScopedCssSuffix, src, "c/foo/foo.js")
            .unwrap();
        assert!(!out.code.contains("import "));
        assert!(!out.code.contains("import("));
        assert!(!out.code.contains("export "));
        assert!(out.code.contains("require(\"lwc\")"));
        assert!(out.code.contains("require(\"c/lazy\")"));
    }

    #[test]
    fn test_label_import_is_rewritten() {
        let compiler = FakeCompiler::default();
        let src = "import myLabel from \"@salesforce/label/c.myLabel\";\nexport default myLabel;\n";
        let out = Transformer::default()
            .process(&compiler, &ScopedCssSuffix, src, "c/foo/foo.js")
            .unwrap();
        assert!(!out.code.contains("import myLabel from"));
        assert!(out.code.contains("myLabel = \"c.myLabel\";"));
    }

    #[test]
    fn test_decorated_typescript_field() {
        let compiler = FakeCompiler::default();
        let src = "import { LightningElement, api } from \"lwc\";\nexport default class Foo extends LightningElement {\n    @api recordId: string;\n    count: number = 0;\n}\n";
        let out = Transformer::default()
            .process(&compiler, &ScopedCssSuffix, src, "c/foo/foo.ts")
            .unwrap();
        let calls = compiler.calls.borrow();
        let (received, path, _) = &calls[0];
        assert_eq!(path, "c/foo/foo.ts");
        assert!(!received.contains(": string"));
        assert!(!received.contains(": number"));
        assert!(received.contains("@api"));
        assert!(out.map.unwrap().file.unwrap().ends_with("foo.ts.compiled"));
    }

    #[test]
    fn test_source_map_filename_suffix() {
        let compiler = FakeCompiler::default();
        let transformer = Transformer::default();

        let html = transformer
            .process(&compiler, &ScopedCssSuffix, "<template></template>", "c/foo/foo.html")
            .unwrap();
        assert_eq!(html.map.unwrap().file.as_deref(), Some("c/foo/foo.html.compiled"));

        let js = transformer
            .process(&compiler, &ScopedCssSuffix, "export default 1;\n", "c/foo/foo.js")
            .unwrap();
        assert_eq!(js.map.unwrap().file.as_deref(), Some("c/foo/foo.js"));
    }

    #[test]
    fn test_compiler_map_chained_only_when_versioned() {
        let versioned = FakeCompiler {
            map: Some(json!({ "version": 3, "sources": ["foo.js"], "names": [], "mappings": "AAAA" })),
            ..FakeCompiler::default()
        };
        let out = Transformer::default()
            .process(&versioned, &ScopedCssSuffix, "export default 1;\n", "c/foo/foo.js")
            .unwrap();
        assert_eq!(out.map.unwrap().sources, vec!["foo.js".to_string()]);

        let unversioned = FakeCompiler {
            map: Some(json!({ "mappings": "" })),
            ..FakeCompiler::default()
        };
        let out = Transformer::default()
            .process(&unversioned, &ScopedCssSuffix, "export default 1;\n", "c/foo/foo.js")
            .unwrap();
        assert_eq!(out.map.unwrap().sources, vec!["c/foo/foo.js".to_string()]);
    }

    #[test]
    fn test_compile_options_for_scoped_styles() {
        let compiler = FakeCompiler::default();
        let transformer = Transformer::default();
        transformer
            .process(&compiler, &ScopedCssSuffix, ":host {}", "c/foo/foo.scoped.css")
            .unwrap();
        transformer
            .process(&compiler, &ScopedCssSuffix, ":host {}", "c/foo/foo.css")
            .unwrap();
        let calls = compiler.calls.borrow();
        assert!(calls[0].2.scoped_styles);
        assert!(!calls[1].2.scoped_styles);
        assert_eq!(calls[0].2.name, "test");
        assert_eq!(calls[0].2.namespace, "x");
    }

    #[test]
    fn test_stylesheet_output_is_commonjs() {
        let compiler = FakeCompiler::default();
        let out = Transformer::default()
            .process(&compiler, &ScopedCssSuffix, ":host { color: red; }", "c/foo/foo.css")
            .unwrap();
        assert!(out.code.contains("exports.default = [stylesheet];"));
        assert_eq!(out.map.unwrap().file.as_deref(), Some("c/foo/foo.css.compiled"));
    }

    #[test]
    fn test_compiler_error_propagates_unchanged() {
        let err = Transformer::default()
            .process(&FailingCompiler, &ScopedCssSuffix, "<template>", "c/foo/foo.html")
            .unwrap_err();
        assert_eq!(err.to_string(), "LWC1075: Unexpected token `<` (2:3)");
    }

    #[test]
    fn test_process_is_idempotent() {
        let compiler = FakeCompiler::default();
        let transformer = Transformer::default();
        let src = "import a from \"c/a\";\nexport default a;\n";
        let first = transformer.process(&compiler, &ScopedCssSuffix, src, "c/foo/foo.js").unwrap();
        let second = transformer.process(&compiler, &ScopedCssSuffix, src, "c/foo/foo.js").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_key_conventions_agree() {
        let transformer = Transformer::new(TransformerContext::new("2.45.3"));
        let options = CacheKeyArgs::from_values(&[json!({ "configString": "v1" })]).unwrap();
        let positional = CacheKeyArgs::from_values(&[json!("v1"), json!({ "anything": true })]).unwrap();
        let a = transformer.get_cache_key("src", "c/foo/foo.js", &options).unwrap();
        let b = transformer.get_cache_key("src", "c/foo/foo.js", &positional).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_transformer_built_once_per_version() {
        let first = Transformer::shared("9.9.9-shared");
        let again = Transformer::shared("9.9.9-shared");
        assert!(std::sync::Arc::ptr_eq(&first, &again));
        assert_eq!(first.context.compiler_version, "9.9.9-shared");

        let other = Transformer::shared("9.9.8-shared");
        assert!(!std::sync::Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_cache_key_tracks_compiler_version() {
        let args = CacheKeyArgs::from_values(&[json!({ "configString": "v1" })]).unwrap();
        let old = Transformer::new(TransformerContext::new("2.45.3"))
            .get_cache_key("src", "c/foo/foo.js", &args)
            .unwrap();
        let new = Transformer::new(TransformerContext::new("2.46.0"))
            .get_cache_key("src", "c/foo/foo.js", &args)
            .unwrap();
        assert_ne!(old, new);
    }
}
