//! The interactive session: one store, one pointer tracker, one control
//! panel, one material, the preset table, and the texture decode queue.
//!
//! Everything runs on the frame loop's thread. Surfaces push `ControlEvent`s
//! into a channel (`Playground::event_sender`). The loop drains it with
//! `process_events`, resolving one event at a time against the schema that is
//! current at that point. `frame` then applies finished texture decodes,
//! decays the pointer, rebuilds the control schema when its dependency key
//! moved, and finally synchronizes the material. A value written between two
//! frames is therefore visible on the next frame's uniform push and never
//! half-applied within one.
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use catalog::{Catalog, ParameterValue};
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use labconfig::PointerSettings;
use tracing::{debug, info, warn};

use crate::controls::{
    ControlEvent, ControlPanel, ControlSchema, ControlSurface, PanelAction, WidgetInput,
    GEOMETRY_SELECT,
};
use crate::export::{
    annotated_source, import_settings, settings_file_name, settings_json, shader_file_name,
};
use crate::material::{MaterialFrame, MaterialSynchronizer};
use crate::pointer::PointerTracker;
use crate::presets::{Preset, PresetManager, PresetStorage};
use crate::scene::{Camera, GeometryKind, Viewport};
use crate::store::{ParameterStore, StoreError};
use crate::texture::TextureLoader;

/// Destination for copy and download exports.
pub trait ExportSink {
    fn copy_text(&mut self, text: &str) -> Result<()>;
    /// Writes `contents` under `file_name` and returns where it landed.
    fn save_file(&mut self, file_name: &str, contents: &str) -> Result<PathBuf>;
}

/// Name and description of the active shader for overlays and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub needs_pointer: bool,
    pub fallback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PlaygroundOptions {
    pub initial_shader: Option<String>,
    pub geometry: GeometryKind,
    pub pointer: PointerSettings,
    pub viewport: Option<Viewport>,
}

pub struct Playground<S: PresetStorage> {
    store: ParameterStore,
    tracker: PointerTracker,
    camera: Camera,
    viewport: Viewport,
    panel: ControlPanel,
    material: MaterialSynchronizer,
    presets: PresetManager<S>,
    textures: TextureLoader,
    sender: Sender<ControlEvent>,
    events: Receiver<ControlEvent>,
    deferred: VecDeque<ControlEvent>,
    surface: Box<dyn ControlSurface>,
    sink: Box<dyn ExportSink>,
    started: Instant,
}

impl<S: PresetStorage> Playground<S> {
    pub fn new(
        catalog: Arc<Catalog>,
        options: PlaygroundOptions,
        presets: PresetManager<S>,
        surface: Box<dyn ControlSurface>,
        sink: Box<dyn ExportSink>,
        now: Instant,
    ) -> Self {
        let initial = options
            .initial_shader
            .clone()
            .or_else(|| catalog.first_id().map(str::to_string))
            .unwrap_or_default();
        let viewport = options.viewport.unwrap_or_default();
        let mut camera = Camera::default();
        camera.set_aspect(viewport);
        let (sender, events) = unbounded();

        let mut store = ParameterStore::new(catalog);
        store.set_geometry(options.geometry);

        let mut playground = Self {
            store,
            tracker: PointerTracker::new(options.pointer, now),
            camera,
            viewport,
            panel: ControlPanel::new(),
            material: MaterialSynchronizer::new(),
            presets,
            textures: TextureLoader::new(),
            sender,
            events,
            deferred: VecDeque::new(),
            surface,
            sink,
            started: now,
        };
        playground.select_shader(&initial);
        playground
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn schema(&self) -> &ControlSchema {
        self.panel.schema()
    }

    pub fn presets(&self) -> &PresetManager<S> {
        &self.presets
    }

    pub fn current_presets(&self) -> &[Preset] {
        self.presets.presets_for(self.store.shader_id())
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn textures(&self) -> &TextureLoader {
        &self.textures
    }

    /// Channel surfaces use to deliver control events.
    pub fn event_sender(&self) -> Sender<ControlEvent> {
        self.sender.clone()
    }

    pub fn shader_info(&self) -> ShaderInfo {
        match self.store.descriptor() {
            Some(descriptor) => ShaderInfo {
                id: descriptor.id().to_string(),
                name: descriptor.name().to_string(),
                description: descriptor.description().to_string(),
                needs_pointer: descriptor.needs_pointer(),
                fallback: false,
            },
            None => ShaderInfo {
                id: self.store.shader_id().to_string(),
                name: "Fallback".to_string(),
                description: format!("no shader named '{}'", self.store.shader_id()),
                needs_pointer: false,
                fallback: true,
            },
        }
    }

    pub fn select_shader(&mut self, id: &str) -> bool {
        let found = self.store.select_shader(id);
        self.textures.cancel_stale(self.store.generation());
        let info = self.shader_info();
        if found {
            info!(shader = %info.id, name = %info.name, description = %info.description, "active shader");
        }
        self.refresh_schema();
        found
    }

    pub fn set_value(&mut self, key: &str, value: ParameterValue) -> Result<(), StoreError> {
        self.store.set_value(key, value)
    }

    pub fn set_geometry(&mut self, geometry: GeometryKind) {
        self.store.set_geometry(geometry);
        self.reflect_latched(vec![(
            GEOMETRY_SELECT.to_string(),
            WidgetInput::Choose(geometry.as_str().to_string()),
        )]);
    }

    /// Restores declared defaults in the store and in every widget, and
    /// drops any texture decode still in flight.
    pub fn reset(&mut self) {
        self.panel.begin_update();
        self.textures.cancel_all();
        self.store.reset_to_defaults();
        self.replay_values();
        self.panel.end_update();
        debug!(shader = %self.store.shader_id(), "reset to defaults");
    }

    pub fn save_preset(&mut self, name: &str) -> Option<Preset> {
        match self.presets.save(&self.store, name) {
            Ok(preset) => {
                self.refresh_schema();
                Some(preset)
            }
            Err(err) => {
                warn!(name = %name, error = %err, "preset not saved");
                None
            }
        }
    }

    pub fn apply_preset(&mut self, id: &str) -> bool {
        self.panel.begin_update();
        let applied = match self.presets.apply(id, &mut self.store) {
            Ok(applied) => applied,
            Err(err) => {
                warn!(preset = %id, error = %err, "failed to apply preset");
                false
            }
        };
        if applied {
            self.replay_values();
        }
        self.panel.end_update();
        applied
    }

    pub fn remove_preset(&mut self, id: &str) -> Option<Preset> {
        let removed = self.presets.remove(id);
        self.refresh_schema();
        removed
    }

    pub fn import_settings(&mut self, json: &str) -> bool {
        let applied = import_settings(&mut self.store, json);
        if applied {
            self.replay_values();
        }
        applied
    }

    pub fn copy_source(&mut self) -> bool {
        let Some(descriptor) = self.store.descriptor() else {
            warn!("nothing to copy: no active shader");
            return false;
        };
        let text = annotated_source(descriptor, self.store.values());
        match self.sink.copy_text(&text) {
            Ok(()) => {
                info!(shader = %descriptor.id(), "copied shader source");
                true
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to copy shader source");
                false
            }
        }
    }

    pub fn download_source(&mut self) -> Option<PathBuf> {
        let descriptor = self.store.descriptor()?.clone();
        self.save(&shader_file_name(descriptor.id()), descriptor.fragment_source())
    }

    pub fn download_settings(&mut self) -> Option<PathBuf> {
        let descriptor = self.store.descriptor()?.clone();
        match settings_json(&descriptor, self.store.values(), Utc::now()) {
            Ok(json) => self.save(&settings_file_name(descriptor.id()), &json),
            Err(err) => {
                warn!(error = %err, "failed to serialise settings");
                None
            }
        }
    }

    fn save(&mut self, file_name: &str, contents: &str) -> Option<PathBuf> {
        match self.sink.save_file(file_name, contents) {
            Ok(path) => {
                info!(path = %path.display(), "exported file");
                Some(path)
            }
            Err(err) => {
                warn!(file = %file_name, error = %format!("{err:#}"), "export failed");
                None
            }
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport = Viewport::new(width, height);
        self.camera.set_aspect(self.viewport);
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32, now: Instant) {
        self.tracker
            .handle_move(x, y, self.viewport, &self.camera, now, &mut self.store);
    }

    pub fn pointer_pressed(&mut self) {
        self.tracker.press(&mut self.store);
    }

    pub fn pointer_released(&mut self) {
        self.tracker.release(&mut self.store);
    }

    pub fn pointer_left(&mut self) {
        self.tracker.release(&mut self.store);
    }

    /// Runs one update and returns what the renderer should draw. Queued
    /// control events are not read here; call `process_events` first.
    pub fn frame(&mut self, now: Instant) -> MaterialFrame<'_> {
        self.textures.poll(&mut self.store);
        self.tracker.tick(&mut self.store);
        self.refresh_schema();
        let elapsed = now.saturating_duration_since(self.started).as_secs_f32();
        self.material.update(&self.store, elapsed)
    }

    /// Applies queued control events, including any set aside by a replay.
    ///
    /// Each event is resolved only after the previous one was applied and the
    /// schema refreshed, so an event queued behind a shader switch is checked
    /// against the new schema generation and dropped.
    pub fn process_events(&mut self) {
        while let Some(event) = self.next_event() {
            let Some(action) = self.panel.handle(&event) else {
                continue;
            };
            self.apply(action);
            self.refresh_schema();
        }
    }

    fn next_event(&mut self) -> Option<ControlEvent> {
        self.deferred
            .pop_front()
            .or_else(|| self.events.try_recv().ok())
    }

    pub fn apply(&mut self, action: PanelAction) {
        debug!(action = ?action, "control action");
        match action {
            PanelAction::SelectShader(id) => {
                self.select_shader(&id);
            }
            PanelAction::SelectGeometry(kind) => self.set_geometry(kind),
            PanelAction::SetValue { key, value } => {
                if let Err(err) = self.store.set_value(&key, value) {
                    warn!(key = %key, error = %err, "control write rejected");
                }
            }
            PanelAction::LoadTexture { key, path } => {
                self.textures.request(&key, path, self.store.generation());
            }
            PanelAction::ClearTexture { key } => {
                self.textures.cancel_key(&key);
                if let Err(err) = self.store.set_texture(&key, None) {
                    warn!(key = %key, error = %err, "texture clear rejected");
                }
            }
            PanelAction::Reset => self.reset(),
            PanelAction::SavePreset { name } => {
                self.save_preset(&name);
            }
            PanelAction::ApplyPreset { id } => {
                self.apply_preset(&id);
            }
            PanelAction::RemovePreset { id } => {
                self.remove_preset(&id);
            }
            PanelAction::CopySource => {
                self.copy_source();
            }
            PanelAction::DownloadSource => {
                self.download_source();
            }
            PanelAction::DownloadSettings => {
                self.download_settings();
            }
            PanelAction::ImportSettings { json } => {
                self.import_settings(&json);
            }
        }
    }

    fn refresh_schema(&mut self) {
        let presets = self.presets.presets_for(self.store.shader_id());
        if self.panel.sync(&self.store, presets) {
            self.surface.mount(self.panel.schema());
        }
    }

    /// Pushes store values into the widgets with the latch held.
    fn replay_values(&mut self) {
        let updates = self.panel.reflection(&self.store);
        self.reflect_latched(updates);
    }

    /// Reflects `updates` into the surface with the latch held. Events queued
    /// before the reflection are set aside unresolved; events the surface
    /// emits while reflecting are dropped when they are value echoes and set
    /// aside otherwise.
    fn reflect_latched(&mut self, updates: Vec<(String, WidgetInput)>) {
        self.deferred.extend(self.events.try_iter());
        self.panel.begin_update();
        self.surface
            .reflect(self.panel.schema().generation(), &updates);
        while let Ok(event) = self.events.try_recv() {
            if self.panel.handle(&event).is_some() {
                self.deferred.push_back(event);
            }
        }
        self.panel.end_update();
    }
}
