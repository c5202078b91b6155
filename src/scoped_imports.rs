//! Reserved `@salesforce/*` import namespaces.
//!
//! Every namespace is one independent pass in a fixed, ordered list. A pass only
//! looks at import declarations whose source falls in its own namespace and
//! replaces them with a guarded `require`: a `jest.mock` or `moduleNameMapper`
//! entry still wins, and the fallback value applies when nothing resolves.
//! Supporting a new namespace means appending one more variant to the list.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::emit::{self, js_string};
use crate::error::{Result, TransformError};

/// A single binding introduced by an import declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBinding {
    Default(String),
    Named { imported: String, local: String },
    Namespace(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopedImportKind {
    Apex,
    ApexContinuation,
    CustomPermission,
    I18n,
    Label,
    ContentAssetUrl,
    ResourceUrl,
    Schema,
    User,
    UserPermission,
    Client,
    MessageChannel,
    AccessCheck,
    Site,
}

/// All scoped-import passes, in registration order.
pub const SCOPED_IMPORT_PASSES: [ScopedImportKind; 14] = [
    ScopedImportKind::Apex,
    ScopedImportKind::ApexContinuation,
    ScopedImportKind::CustomPermission,
    ScopedImportKind::I18n,
    ScopedImportKind::Label,
    ScopedImportKind::ContentAssetUrl,
    ScopedImportKind::ResourceUrl,
    ScopedImportKind::Schema,
    ScopedImportKind::User,
    ScopedImportKind::UserPermission,
    ScopedImportKind::Client,
    ScopedImportKind::MessageChannel,
    ScopedImportKind::AccessCheck,
    ScopedImportKind::Site,
];

const APEX_MODULE: &str = "@salesforce/apex";
const RESOLVED_PROMISE: &str = "function () { return Promise.resolve(); }";

lazy_static! {
    /// Locale values used when a test does not mock `@salesforce/i18n/*`.
    static ref I18N_DEFAULTS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("lang", r#""en-US""#);
        m.insert("dir", r#""ltr""#);
        m.insert("locale", r#""en-US""#);
        m.insert("currency", r#""USD""#);
        m.insert("firstDayOfWeek", "1");
        m.insert("timeZone", r#""America/Los_Angeles""#);
        m.insert("showJapaneseCalendar", "false");
        m.insert("defaultCalendar", r#""gregorian""#);
        m.insert("defaultNumberingSystem", r#""latn""#);
        m.insert("calendarData", "{}");
        m.insert("common.calendarData", "{}");
        m.insert("common.digits", r#""0123456789""#);
        m.insert("number.currencySymbol", r#""$""#);
        m.insert("number.decimalSeparator", r#"".""#);
        m.insert("number.groupingSeparator", r#"",""#);
        m.insert("number.numberFormat", r##""#,##0.###""##);
        m.insert("number.percentFormat", r##""#,##0%""##);
        m.insert("number.currencyFormat", r##""¤#,##0.00;(¤#,##0.00)""##);
        m.insert("dateTime.shortDateFormat", r#""M/d/yyyy""#);
        m.insert("dateTime.mediumDateFormat", r#""MMM d, yyyy""#);
        m.insert("dateTime.longDateFormat", r#""MMMM d, yyyy""#);
        m.insert("dateTime.shortTimeFormat", r#""h:mm a""#);
        m.insert("dateTime.mediumTimeFormat", r#""h:mm:ss a""#);
        m.insert("dateTime.shortDateTimeFormat", r#""M/d/yyyy h:mm a""#);
        m.insert("dateTime.mediumDateTimeFormat", r#""MMM d, yyyy h:mm:ss a""#);
        m
    };
}

impl ScopedImportKind {
    /// Pass name, used in logs and in `PipelineConfig` listings.
    pub fn name(self) -> &'static str {
        match self {
            ScopedImportKind::Apex => "apex-scoped-import",
            ScopedImportKind::ApexContinuation => "apex-continuation-scoped-import",
            ScopedImportKind::CustomPermission => "custom-permission-scoped-import",
            ScopedImportKind::I18n => "i18n-scoped-import",
            ScopedImportKind::Label => "label-scoped-import",
            ScopedImportKind::ContentAssetUrl => "content-asset-url-scoped-import",
            ScopedImportKind::ResourceUrl => "resource-scoped-import",
            ScopedImportKind::Schema => "schema-scoped-import",
            ScopedImportKind::User => "user-scoped-import",
            ScopedImportKind::UserPermission => "user-permission-scoped-import",
            ScopedImportKind::Client => "client-scoped-import",
            ScopedImportKind::MessageChannel => "message-channel-scoped-import",
            ScopedImportKind::AccessCheck => "access-check-scoped-import",
            ScopedImportKind::Site => "site-scoped-import",
        }
    }

    /// Specifier prefix owned by this pass.
    pub fn namespace(self) -> &'static str {
        match self {
            ScopedImportKind::Apex => "@salesforce/apex/",
            ScopedImportKind::ApexContinuation => "@salesforce/apexContinuation/",
            ScopedImportKind::CustomPermission => "@salesforce/customPermission/",
            ScopedImportKind::I18n => "@salesforce/i18n/",
            ScopedImportKind::Label => "@salesforce/label/",
            ScopedImportKind::ContentAssetUrl => "@salesforce/contentAssetUrl/",
            ScopedImportKind::ResourceUrl => "@salesforce/resourceUrl/",
            ScopedImportKind::Schema => "@salesforce/schema/",
            ScopedImportKind::User => "@salesforce/user/",
            ScopedImportKind::UserPermission => "@salesforce/userPermission/",
            ScopedImportKind::Client => "@salesforce/client/",
            ScopedImportKind::MessageChannel => "@salesforce/messageChannel/",
            ScopedImportKind::AccessCheck => "@salesforce/accessCheck/",
            ScopedImportKind::Site => "@salesforce/site/",
        }
    }

    pub fn matches(self, specifier: &str) -> bool {
        if self == ScopedImportKind::Apex && specifier == APEX_MODULE {
            return true;
        }
        specifier.starts_with(self.namespace())
    }

    /// Replacement statements for one matching import declaration.
    pub fn rewrite(self, specifier: &str, bindings: &[ImportBinding]) -> Result<String> {
        if self == ScopedImportKind::Apex && specifier == APEX_MODULE {
            return rewrite_apex_helpers(specifier, bindings);
        }

        let resource = &specifier[self.namespace().len()..];
        let mut out = String::new();
        for binding in bindings {
            match binding {
                ImportBinding::Default(local) => {
                    out.push_str(&guarded_require(local, specifier, "default", &self.fallback(resource)));
                }
                _ => {
                    return Err(TransformError::scoped_import(
                        specifier,
                        format!("{} modules only support default imports", self.namespace().trim_end_matches('/')),
                    ));
                }
            }
        }
        Ok(out)
    }

    /// JavaScript expression used when the module cannot be required.
    fn fallback(self, resource: &str) -> String {
        match self {
            ScopedImportKind::Label
            | ScopedImportKind::ResourceUrl
            | ScopedImportKind::ContentAssetUrl
            | ScopedImportKind::MessageChannel => js_string(resource),
            ScopedImportKind::Schema => schema_fallback(resource),
            ScopedImportKind::I18n => I18N_DEFAULTS
                .get(resource)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "undefined".to_string()),
            ScopedImportKind::User => match resource {
                "Id" => js_string("005000000000000000"),
                "isGuest" => "false".to_string(),
                _ => "undefined".to_string(),
            },
            ScopedImportKind::Client => match resource {
                "formFactor" => js_string("Large"),
                _ => "undefined".to_string(),
            },
            ScopedImportKind::Apex | ScopedImportKind::ApexContinuation => RESOLVED_PROMISE.to_string(),
            ScopedImportKind::AccessCheck => "true".to_string(),
            ScopedImportKind::CustomPermission
            | ScopedImportKind::UserPermission
            | ScopedImportKind::Site => "undefined".to_string(),
        }
    }
}

/// First pass in `passes` owning `specifier`.
pub fn find_pass(passes: &[ScopedImportKind], specifier: &str) -> Option<ScopedImportKind> {
    passes.iter().copied().find(|pass| pass.matches(specifier))
}

fn rewrite_apex_helpers(specifier: &str, bindings: &[ImportBinding]) -> Result<String> {
    let mut out = String::new();
    for binding in bindings {
        let ImportBinding::Named { imported, local } = binding else {
            return Err(TransformError::scoped_import(
                specifier,
                "only named imports of refreshApex and getSObjectValue are supported",
            ));
        };
        let fallback = match imported.as_str() {
            "refreshApex" => RESOLVED_PROMISE,
            "getSObjectValue" => "jest.fn()",
            other => {
                return Err(TransformError::scoped_import(
                    specifier,
                    format!("unknown apex helper `{}`", other),
                ))
            }
        };
        out.push_str(&guarded_require(local, specifier, imported, fallback));
    }
    Ok(out)
}

fn schema_fallback(resource: &str) -> String {
    match resource.split_once('.') {
        Some((object, field)) => format!(
            "{{ objectApiName: {}, fieldApiName: {} }}",
            js_string(object),
            js_string(field)
        ),
        None => format!("{{ objectApiName: {} }}", js_string(resource)),
    }
}

fn guarded_require(local: &str, specifier: &str, member: &str, fallback: &str) -> String {
    format!(
        "let {local};\ntry {{\n  {local} = require({source}){access};\n}} catch (e) {{\n  {local} = {fallback};\n}}\n",
        local = local,
        source = js_string(specifier),
        access = emit::member(member),
        fallback = fallback,
    )
}
