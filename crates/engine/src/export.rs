//! Text exports of the active shader and the inverse settings import.
//!
//! Exports only read the descriptor and the value map; importing goes through
//! `ParameterStore::set_value` like any other edit.
use catalog::{ParameterKind, ParameterValue, ParameterValueMap, ShaderDescriptor};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::ParameterStore;

const RULE: &str = "// ============================================";

pub fn shader_file_name(shader_id: &str) -> String {
    format!("{shader_id}-shader.glsl")
}

pub fn settings_file_name(shader_id: &str) -> String {
    format!("{shader_id}-config.json")
}

/// Fragment source prefixed with a header listing every parameter and its
/// current value.
pub fn annotated_source(descriptor: &ShaderDescriptor, values: &ParameterValueMap) -> String {
    let declarations: Vec<String> = descriptor
        .params()
        .iter()
        .map(|spec| {
            let value = values.get(&spec.key).unwrap_or(&spec.default);
            let note = match spec.kind {
                ParameterKind::Color => format!("hex: {value}"),
                ParameterKind::Texture => "texture".to_string(),
                _ => value.to_string(),
            };
            format!(
                "uniform {} {}; // {} (default: {})",
                spec.kind.glsl_type(),
                spec.key,
                spec.label.as_deref().unwrap_or(&spec.key),
                note
            )
        })
        .collect();

    let description = if descriptor.description().trim().is_empty() {
        "shaderlab export"
    } else {
        descriptor.description()
    };

    format!(
        "// {name}\n// {description}\n// Exported from shaderlab\n\n{RULE}\n// Uniforms\n{RULE}\n{uniforms}\n\n{RULE}\n// Fragment Shader\n{RULE}\n{fragment}",
        name = descriptor.name(),
        uniforms = declarations.join("\n"),
        fragment = descriptor.fragment_source(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    pub shader_id: String,
    pub shader_name: String,
    pub uniform_values: ParameterValueMap,
    pub exported_at: String,
}

impl SettingsDocument {
    pub fn capture(
        descriptor: &ShaderDescriptor,
        values: &ParameterValueMap,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            shader_id: descriptor.id().to_string(),
            shader_name: descriptor.name().to_string(),
            uniform_values: values.clone(),
            exported_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub fn settings_json(
    descriptor: &ShaderDescriptor,
    values: &ParameterValueMap,
    now: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    SettingsDocument::capture(descriptor, values, now).to_json()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportDocument {
    #[serde(default)]
    shader_id: Option<String>,
    uniform_values: serde_json::Map<String, serde_json::Value>,
}

/// Applies every `uniformValues` entry of an exported settings document to
/// the active shader. Returns true when at least one value was applied.
pub fn import_settings(store: &mut ParameterStore, json: &str) -> bool {
    let document: ImportDocument = match serde_json::from_str(json) {
        Ok(document) => document,
        Err(err) => {
            warn!(error = %err, "failed to import settings");
            return false;
        }
    };
    if let Some(source) = document.shader_id.as_deref() {
        if source != store.shader_id() {
            warn!(
                from = %source,
                active = %store.shader_id(),
                "importing settings exported from another shader"
            );
        }
    }

    let mut applied = 0;
    for (key, raw) in document.uniform_values {
        let value = match serde_json::from_value::<ParameterValue>(raw) {
            Ok(value) => value,
            Err(err) => {
                debug!(key = %key, error = %err, "skipping unreadable imported value");
                continue;
            }
        };
        match store.set_value(&key, value) {
            Ok(()) => applied += 1,
            Err(err) => debug!(key = %key, error = %err, "skipping imported value"),
        }
    }
    info!(applied, shader = %store.shader_id(), "imported settings");
    applied > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use catalog::{Catalog, ParameterSpec};
    use chrono::TimeZone;

    fn descriptor() -> ShaderDescriptor {
        ShaderDescriptor::new(
            "grad",
            "Gradient",
            "",
            "",
            "void main() {}\n",
            vec![
                ParameterSpec::scalar("uAngle", 45.0).with_label("Angle"),
                ParameterSpec::new(
                    "uColor1",
                    ParameterKind::Color,
                    ParameterValue::Color("#ff6b6b".into()),
                ),
                ParameterSpec::new(
                    "uCenter",
                    ParameterKind::Vector2,
                    ParameterValue::Vector2([0.5, 0.25]),
                ),
                ParameterSpec::new("uTexture", ParameterKind::Texture, ParameterValue::Empty),
            ],
        )
        .unwrap()
    }

    fn store() -> ParameterStore {
        let mut catalog = Catalog::new();
        catalog.insert(descriptor());
        let mut store = ParameterStore::new(Arc::new(catalog));
        store.select_shader("grad");
        store
    }

    #[test]
    fn annotated_source_lists_current_values() {
        let descriptor = descriptor();
        let mut values = descriptor.default_values();
        values.insert("uAngle".into(), ParameterValue::Scalar(90.0));
        let text = annotated_source(&descriptor, &values);

        assert!(text.starts_with("// Gradient\n// shaderlab export\n// Exported from shaderlab\n"));
        assert!(text.contains("uniform float uAngle; // Angle (default: 90)\n"));
        assert!(text.contains("uniform vec3 uColor1; // uColor1 (default: hex: #ff6b6b)\n"));
        assert!(text.contains("uniform vec2 uCenter; // uCenter (default: 0.5,0.25)\n"));
        assert!(text.contains("uniform sampler2D uTexture; // uTexture (default: texture)\n"));
        assert!(text.ends_with("// Fragment Shader\n// ============================================\nvoid main() {}\n"));
    }

    #[test]
    fn settings_document_shape() {
        let descriptor = descriptor();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let json = settings_json(&descriptor, &descriptor.default_values(), now).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["shaderId"], "grad");
        assert_eq!(parsed["shaderName"], "Gradient");
        assert_eq!(parsed["uniformValues"]["uAngle"], 45.0);
        assert_eq!(parsed["exportedAt"], "2024-05-01T12:00:00.000Z");
        assert!(json.contains("\n  \"shaderId\""));
    }

    #[test]
    fn import_applies_known_keys() {
        let mut store = store();
        let json = r#"{"shaderId":"grad","uniformValues":{"uAngle":120,"uCenter":[1,1],"gone":3}}"#;
        assert!(import_settings(&mut store, json));
        assert_eq!(store.value("uAngle"), Some(&ParameterValue::Scalar(120.0)));
        assert_eq!(store.value("uCenter"), Some(&ParameterValue::Vector2([1.0, 1.0])));
    }

    #[test]
    fn malformed_import_is_rejected() {
        let mut store = store();
        assert!(!import_settings(&mut store, "{oops"));
        assert!(!import_settings(&mut store, r#"{"shaderId":"grad"}"#));
        assert!(!import_settings(&mut store, r#"{"uniformValues":{"gone":1}}"#));
        assert_eq!(store.value("uAngle"), Some(&ParameterValue::Scalar(45.0)));
    }

    #[test]
    fn export_round_trips_through_import() {
        let mut store = store();
        store.set_value("uAngle", ParameterValue::Scalar(200.0)).unwrap();
        let json = settings_json(store.descriptor().unwrap(), store.values(), Utc::now()).unwrap();
        store.reset_to_defaults();
        assert!(import_settings(&mut store, &json));
        assert_eq!(store.value("uAngle"), Some(&ParameterValue::Scalar(200.0)));
    }
}
