//! Source map documents exchanged between the compiler and the final pipeline.
//!
//! Maps are never built column-accurately here. The final stage either chains the
//! compiler's map (shifted past any header lines the pipeline prepends) or emits
//! a line-identity map over the compiled module.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

const DATA_URL_PREFIX: &str = "data:application/json;charset=utf-8;base64,";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub mappings: String,
}

fn default_version() -> u32 {
    3
}

/// Truthiness of the `version` marker, the only check applied to upstream maps.
fn has_version_marker(value: &Value) -> bool {
    match value.get("version") {
        Some(Value::Number(n)) => n.as_f64().map_or(false, |v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Bool(b)) => *b,
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        _ => false,
    }
}

impl SourceMapDocument {
    /// Accepts an upstream map only when it carries a version marker and has the
    /// shape of a source map. Anything else is treated as "no map".
    pub fn from_value(value: Value) -> Option<Self> {
        if !has_version_marker(&value) {
            return None;
        }
        let version = match value.get("version") {
            Some(Value::Number(n)) => n.as_u64().map(|v| v as u32),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or_else(default_version);

        let mut value = value;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("version");
        }
        let mut map: SourceMapDocument = serde_json::from_value(value).ok()?;
        map.version = version;
        Some(map)
    }

    /// A map sending each generated line after `header_lines` to the same line of `source`.
    pub fn line_identity(filename: &str, source: &str, header_lines: usize) -> Self {
        let body_lines = source.split('\n').count();
        let mut segments = Vec::with_capacity(body_lines);
        for line in 0..body_lines {
            segments.push(if line == 0 { "AAAA" } else { "AACA" });
        }
        SourceMapDocument {
            version: default_version(),
            file: Some(filename.to_string()),
            source_root: None,
            sources: vec![filename.to_string()],
            sources_content: Some(vec![Some(source.to_string())]),
            names: Vec::new(),
            mappings: format!("{}{}", ";".repeat(header_lines), segments.join(";")),
        }
    }

    /// Chains this map behind `lines` freshly prepended generated lines.
    pub fn shift_generated_lines(mut self, lines: usize) -> Self {
        if lines > 0 {
            self.mappings = format!("{}{}", ";".repeat(lines), self.mappings);
        }
        self
    }

    pub fn with_file(mut self, filename: &str) -> Self {
        self.file = Some(filename.to_string());
        self
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_data_url(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(json)))
    }

    /// `//# sourceMappingURL=` comment carrying the whole map inline.
    pub fn inline_comment(&self) -> Result<String> {
        Ok(format!("//# sourceMappingURL={}", self.to_data_url()?))
    }
}
