//! Control-schema builder.
//!
//! `ControlPanel` derives a `ControlSchema` from the active descriptor and
//! rebuilds it from scratch whenever its dependency key (shader generation,
//! preset count) changes. Every rebuild gets a new schema generation, and
//! surfaces address events to the generation they were mounted with, so an
//! event aimed at a previous shader's widgets is dropped instead of landing
//! on the new one.
//!
//! The panel never writes to the store. `handle` turns a surface event into a
//! `PanelAction` that the playground applies, which keeps coercion in the
//! shared table in `catalog::coerce` and the write path in one place.
//!
//! While a programmatic replay is in progress (`begin_update`/`end_update`,
//! re-entrant) value echoes from the surface are suppressed.
use std::path::PathBuf;

use catalog::{
    control_for, is_reserved_uniform, reflect_value, value_from_control, ControlKind,
    ControlValue, ParameterKind, ParameterSpec, ParameterValue,
};
use tracing::debug;

use crate::presets::Preset;
use crate::scene::GeometryKind;
use crate::store::ParameterStore;

pub const SCENE_GROUP: &str = "Scene";
pub const SHADER_SELECT: &str = "scene.shader";
pub const GEOMETRY_SELECT: &str = "scene.geometry";
pub const RESET: &str = "shader.reset";
pub const PRESET_SAVE: &str = "presets.save";
pub const COPY_SOURCE: &str = "export.copy";
pub const DOWNLOAD_SOURCE: &str = "export.shader";
pub const DOWNLOAD_SETTINGS: &str = "export.settings";
pub const IMPORT_SETTINGS: &str = "export.import";

const PARAM_PREFIX: &str = "param.";
const PRESET_APPLY_PREFIX: &str = "presets.apply.";
const PRESET_REMOVE_PREFIX: &str = "presets.remove.";

pub fn param_control_id(key: &str) -> String {
    format!("{PARAM_PREFIX}{key}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    Select {
        options: Vec<SelectOption>,
        selected: String,
    },
    Parameter {
        control: ControlKind,
        value: Option<ControlValue>,
    },
    Button,
    TextEntry {
        placeholder: String,
    },
    Note,
}

#[derive(Debug, Clone, PartialEq)]
enum Binding {
    Shader,
    Geometry,
    Parameter(ParameterSpec),
    Reset,
    SavePreset,
    ApplyPreset(String),
    RemovePreset(String),
    CopySource,
    DownloadSource,
    DownloadSettings,
    ImportSettings,
    Inert,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub id: String,
    pub label: String,
    pub folder: Option<String>,
    pub widget: Widget,
    binding: Binding,
}

impl Control {
    fn new(id: impl Into<String>, label: impl Into<String>, widget: Widget, binding: Binding) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            folder: None,
            widget,
            binding,
        }
    }

    fn in_folder(mut self, folder: Option<&str>) -> Self {
        self.folder = folder.map(str::to_string);
        self
    }

    /// Parameter key driven by this control, if any.
    pub fn parameter_key(&self) -> Option<&str> {
        match &self.binding {
            Binding::Parameter(spec) => Some(&spec.key),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlGroup {
    pub title: String,
    pub controls: Vec<Control>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlSchema {
    generation: u64,
    groups: Vec<ControlGroup>,
}

impl ControlSchema {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn groups(&self) -> &[ControlGroup] {
        &self.groups
    }

    pub fn group(&self, title: &str) -> Option<&ControlGroup> {
        self.groups.iter().find(|group| group.title == title)
    }

    pub fn find(&self, id: &str) -> Option<&Control> {
        self.groups
            .iter()
            .flat_map(|group| group.controls.iter())
            .find(|control| control.id == id)
    }

    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.groups.iter().flat_map(|group| group.controls.iter())
    }
}

/// What a surface sends for a widget, or what the panel reflects into one.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetInput {
    Value(ControlValue),
    Choose(String),
    Press,
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    pub generation: u64,
    pub control: String,
    pub input: WidgetInput,
}

impl ControlEvent {
    pub fn new(generation: u64, control: impl Into<String>, input: WidgetInput) -> Self {
        Self {
            generation,
            control: control.into(),
            input,
        }
    }
}

/// Store or session change requested by a control.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelAction {
    SelectShader(String),
    SelectGeometry(GeometryKind),
    SetValue { key: String, value: ParameterValue },
    LoadTexture { key: String, path: PathBuf },
    ClearTexture { key: String },
    Reset,
    SavePreset { name: String },
    ApplyPreset { id: String },
    RemovePreset { id: String },
    CopySource,
    DownloadSource,
    DownloadSettings,
    ImportSettings { json: String },
}

/// Renders schemas and shows reflected values; implemented by the binary's
/// console and by test doubles.
pub trait ControlSurface {
    fn mount(&mut self, schema: &ControlSchema);
    fn reflect(&mut self, generation: u64, updates: &[(String, WidgetInput)]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SchemaKey {
    shader_generation: u64,
    preset_count: usize,
}

#[derive(Debug, Default)]
pub struct ControlPanel {
    schema: ControlSchema,
    key: Option<SchemaKey>,
    updating: u32,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self) -> &ControlSchema {
        &self.schema
    }

    /// Rebuilds the schema when the shader or the preset count changed.
    /// Returns true when a new schema was built.
    pub fn sync(&mut self, store: &ParameterStore, presets: &[Preset]) -> bool {
        let key = SchemaKey {
            shader_generation: store.generation(),
            preset_count: presets.len(),
        };
        if self.key == Some(key) {
            return false;
        }
        self.key = Some(key);
        self.schema = build_schema(self.schema.generation + 1, store, presets);
        debug!(
            generation = self.schema.generation,
            shader = %store.shader_id(),
            presets = presets.len(),
            "rebuilt control schema"
        );
        true
    }

    pub fn begin_update(&mut self) {
        self.updating += 1;
    }

    pub fn end_update(&mut self) {
        self.updating = self.updating.saturating_sub(1);
    }

    pub fn is_updating(&self) -> bool {
        self.updating > 0
    }

    /// Display values for every parameter widget plus both scene selectors.
    pub fn reflection(&self, store: &ParameterStore) -> Vec<(String, WidgetInput)> {
        let mut updates = vec![
            (
                SHADER_SELECT.to_string(),
                WidgetInput::Choose(store.shader_id().to_string()),
            ),
            (
                GEOMETRY_SELECT.to_string(),
                WidgetInput::Choose(store.geometry().as_str().to_string()),
            ),
        ];
        for control in self.schema.controls() {
            if let Binding::Parameter(spec) = &control.binding {
                let shown = if spec.kind == ParameterKind::Texture {
                    Some(ControlValue::File(
                        store.texture(&spec.key).map(|handle| handle.source().to_string()),
                    ))
                } else {
                    store
                        .value(&spec.key)
                        .and_then(|value| reflect_value(spec, value))
                };
                if let Some(value) = shown {
                    updates.push((control.id.clone(), WidgetInput::Value(value)));
                }
            }
        }
        updates
    }

    /// Resolves a surface event against the current schema.
    pub fn handle(&self, event: &ControlEvent) -> Option<PanelAction> {
        if event.generation != self.schema.generation {
            debug!(
                control = %event.control,
                event_generation = event.generation,
                schema_generation = self.schema.generation,
                "dropping event for stale schema"
            );
            return None;
        }
        let control = match self.schema.find(&event.control) {
            Some(control) => control,
            None => {
                debug!(control = %event.control, "event for unknown control");
                return None;
            }
        };
        if self.is_updating() && matches!(event.input, WidgetInput::Value(_) | WidgetInput::Choose(_)) {
            debug!(control = %event.control, "suppressing echo during programmatic update");
            return None;
        }

        match (&control.binding, &event.input) {
            (Binding::Shader, WidgetInput::Choose(id)) => Some(PanelAction::SelectShader(id.clone())),
            (Binding::Geometry, WidgetInput::Choose(raw)) => match raw.parse() {
                Ok(kind) => Some(PanelAction::SelectGeometry(kind)),
                Err(err) => {
                    debug!(error = %err, "ignoring geometry choice");
                    None
                }
            },
            (Binding::Parameter(spec), WidgetInput::Value(value)) => parameter_action(spec, value),
            (Binding::Reset, WidgetInput::Press) => Some(PanelAction::Reset),
            (Binding::SavePreset, WidgetInput::Text(name)) => {
                Some(PanelAction::SavePreset { name: name.clone() })
            }
            (Binding::ApplyPreset(id), WidgetInput::Press) => {
                Some(PanelAction::ApplyPreset { id: id.clone() })
            }
            (Binding::RemovePreset(id), WidgetInput::Press) => {
                Some(PanelAction::RemovePreset { id: id.clone() })
            }
            (Binding::CopySource, WidgetInput::Press) => Some(PanelAction::CopySource),
            (Binding::DownloadSource, WidgetInput::Press) => Some(PanelAction::DownloadSource),
            (Binding::DownloadSettings, WidgetInput::Press) => Some(PanelAction::DownloadSettings),
            (Binding::ImportSettings, WidgetInput::Text(json)) => {
                Some(PanelAction::ImportSettings { json: json.clone() })
            }
            (_, input) => {
                debug!(control = %control.id, input = ?input, "input does not fit control");
                None
            }
        }
    }
}

fn parameter_action(spec: &ParameterSpec, value: &ControlValue) -> Option<PanelAction> {
    if spec.kind == ParameterKind::Texture {
        return match value {
            ControlValue::File(Some(path)) => Some(PanelAction::LoadTexture {
                key: spec.key.clone(),
                path: PathBuf::from(path),
            }),
            ControlValue::File(None) => Some(PanelAction::ClearTexture {
                key: spec.key.clone(),
            }),
            _ => None,
        };
    }
    match value_from_control(spec, value) {
        Some(value) => Some(PanelAction::SetValue {
            key: spec.key.clone(),
            value,
        }),
        None => {
            debug!(key = %spec.key, value = ?value, "control value does not fit parameter");
            None
        }
    }
}

fn build_schema(generation: u64, store: &ParameterStore, presets: &[Preset]) -> ControlSchema {
    let scene = ControlGroup {
        title: SCENE_GROUP.to_string(),
        controls: vec![
            Control::new(
                SHADER_SELECT,
                "Shader",
                Widget::Select {
                    options: store
                        .catalog()
                        .entries()
                        .into_iter()
                        .map(|entry| SelectOption {
                            label: entry.name,
                            value: entry.id,
                        })
                        .collect(),
                    selected: store.shader_id().to_string(),
                },
                Binding::Shader,
            ),
            Control::new(
                GEOMETRY_SELECT,
                "Geometry",
                Widget::Select {
                    options: GeometryKind::ALL
                        .into_iter()
                        .map(|kind| SelectOption {
                            label: kind.label().to_string(),
                            value: kind.as_str().to_string(),
                        })
                        .collect(),
                    selected: store.geometry().as_str().to_string(),
                },
                Binding::Geometry,
            ),
        ],
    };

    let Some(descriptor) = store.descriptor() else {
        let shader = ControlGroup {
            title: "Shader".to_string(),
            controls: vec![Control::new(
                "shader.missing",
                format!("No shader named '{}'", store.shader_id()),
                Widget::Note,
                Binding::Inert,
            )],
        };
        return ControlSchema {
            generation,
            groups: vec![scene, shader],
        };
    };

    let mut controls = Vec::new();
    for spec in descriptor.params() {
        if is_reserved_uniform(&spec.key) {
            continue;
        }
        let value = if spec.kind == ParameterKind::Texture {
            Some(ControlValue::File(None))
        } else {
            store
                .value(&spec.key)
                .and_then(|value| reflect_value(spec, value))
        };
        controls.push(
            Control::new(
                param_control_id(&spec.key),
                spec.display_label(),
                Widget::Parameter {
                    control: control_for(spec),
                    value,
                },
                Binding::Parameter(spec.clone()),
            )
            .in_folder(spec.folder.as_deref()),
        );
    }

    controls.push(Control::new(RESET, "Reset", Widget::Button, Binding::Reset));

    controls.push(
        Control::new(
            PRESET_SAVE,
            "Save Preset",
            Widget::TextEntry {
                placeholder: "preset name".to_string(),
            },
            Binding::SavePreset,
        )
        .in_folder(Some("Presets")),
    );
    for preset in presets {
        controls.push(
            Control::new(
                format!("{PRESET_APPLY_PREFIX}{}", preset.id),
                preset.name.clone(),
                Widget::Button,
                Binding::ApplyPreset(preset.id.clone()),
            )
            .in_folder(Some("Presets")),
        );
        controls.push(
            Control::new(
                format!("{PRESET_REMOVE_PREFIX}{}", preset.id),
                format!("Delete {}", preset.name),
                Widget::Button,
                Binding::RemovePreset(preset.id.clone()),
            )
            .in_folder(Some("Presets")),
        );
    }

    for (id, label, binding) in [
        (COPY_SOURCE, "Copy Shader Code", Binding::CopySource),
        (DOWNLOAD_SOURCE, "Download Shader", Binding::DownloadSource),
        (DOWNLOAD_SETTINGS, "Download Settings", Binding::DownloadSettings),
    ] {
        controls.push(Control::new(id, label, Widget::Button, binding).in_folder(Some("Export")));
    }
    controls.push(
        Control::new(
            IMPORT_SETTINGS,
            "Import Settings",
            Widget::TextEntry {
                placeholder: "settings JSON".to_string(),
            },
            Binding::ImportSettings,
        )
        .in_folder(Some("Export")),
    );

    ControlSchema {
        generation,
        groups: vec![
            scene,
            ControlGroup {
                title: descriptor.name().to_string(),
                controls,
            },
        ],
    }
}
