//! Single source of truth for what the next frame renders.
//!
//! The store owns the active shader (id, descriptor, live value map, and a
//! generation counter) as one `ActiveShader` value that is replaced wholesale
//! on every switch, so no reader can observe a new id paired with the
//! previous shader's values. Textures, the pointer signal, and the geometry
//! kind live beside it with their own setters.
//!
//! Out-of-range numbers are accepted by `set_value`: `min`/`max` only bound
//! the slider a surface renders, they are not a constraint on stored values.
use std::collections::BTreeMap;
use std::sync::Arc;

use catalog::{Catalog, ParameterKind, ParameterValue, ParameterValueMap, ShaderDescriptor};
use glam::Vec2;
use thiserror::Error;
use tracing::{debug, warn};

use crate::scene::GeometryKind;
use crate::texture::TextureHandle;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("no shader is active")]
    NoActiveShader,
    #[error("shader '{shader}' has no parameter '{key}'")]
    UnknownKey { shader: String, key: String },
    #[error("value {value} does not fit parameter '{key}' of kind {kind}")]
    KindMismatch {
        key: String,
        kind: ParameterKind,
        value: ParameterValue,
    },
    #[error("parameter '{0}' is a texture; use set_texture")]
    TextureKey(String),
}

/// Pointer state published by the tracker, in surface uv space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSignal {
    pub u: f32,
    pub v: f32,
    pub velocity_u: f32,
    pub velocity_v: f32,
    pub pressed: bool,
}

impl Default for PointerSignal {
    fn default() -> Self {
        Self {
            u: 0.5,
            v: 0.5,
            velocity_u: 0.0,
            velocity_v: 0.0,
            pressed: false,
        }
    }
}

impl PointerSignal {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.u, self.v)
    }

    pub fn velocity(&self) -> Vec2 {
        Vec2::new(self.velocity_u, self.velocity_v)
    }
}

/// The active shader and its live values, swapped as one unit.
#[derive(Debug, Clone)]
pub struct ActiveShader {
    requested_id: String,
    descriptor: Option<Arc<ShaderDescriptor>>,
    values: ParameterValueMap,
    generation: u64,
}

impl ActiveShader {
    fn empty() -> Self {
        Self {
            requested_id: String::new(),
            descriptor: None,
            values: ParameterValueMap::new(),
            generation: 0,
        }
    }

    /// Id most recently passed to `select_shader`, even when it was unknown.
    pub fn requested_id(&self) -> &str {
        &self.requested_id
    }

    pub fn descriptor(&self) -> Option<&Arc<ShaderDescriptor>> {
        self.descriptor.as_ref()
    }

    pub fn values(&self) -> &ParameterValueMap {
        &self.values
    }

    /// Bumped on every switch; consumers compare it to detect a new program.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when no descriptor backs the active id and the fallback renders.
    pub fn is_fallback(&self) -> bool {
        self.descriptor.is_none()
    }
}

#[derive(Debug)]
pub struct ParameterStore {
    catalog: Arc<Catalog>,
    active: ActiveShader,
    textures: BTreeMap<String, Option<TextureHandle>>,
    pointer: PointerSignal,
    geometry: GeometryKind,
}

impl ParameterStore {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            active: ActiveShader::empty(),
            textures: BTreeMap::new(),
            pointer: PointerSignal::default(),
            geometry: GeometryKind::default(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn active(&self) -> &ActiveShader {
        &self.active
    }

    pub fn shader_id(&self) -> &str {
        self.active.requested_id()
    }

    pub fn descriptor(&self) -> Option<&Arc<ShaderDescriptor>> {
        self.active.descriptor()
    }

    pub fn values(&self) -> &ParameterValueMap {
        self.active.values()
    }

    pub fn value(&self, key: &str) -> Option<&ParameterValue> {
        self.active.values.get(key)
    }

    pub fn generation(&self) -> u64 {
        self.active.generation
    }

    pub fn textures(&self) -> &BTreeMap<String, Option<TextureHandle>> {
        &self.textures
    }

    pub fn texture(&self, key: &str) -> Option<&TextureHandle> {
        self.textures.get(key).and_then(Option::as_ref)
    }

    pub fn pointer(&self) -> PointerSignal {
        self.pointer
    }

    pub fn geometry(&self) -> GeometryKind {
        self.geometry
    }

    /// Switches the active shader and resets its values to the declared
    /// defaults in a single assignment.
    ///
    /// An unknown id still becomes the active id, with no descriptor and an
    /// empty value map, which the synchronizer renders as the fallback.
    /// Returns whether a descriptor was found.
    pub fn select_shader(&mut self, id: &str) -> bool {
        let descriptor = self.catalog.get(id);
        let values = descriptor
            .as_ref()
            .map(|descriptor| descriptor.default_values())
            .unwrap_or_default();
        let found = descriptor.is_some();

        self.active = ActiveShader {
            requested_id: id.to_string(),
            descriptor,
            values,
            generation: self.active.generation + 1,
        };
        self.textures.clear();

        if found {
            debug!(shader = %id, generation = self.active.generation, "selected shader");
        } else {
            warn!(shader = %id, "unknown shader id; rendering fallback");
        }
        found
    }

    /// Writes one value for the active shader.
    ///
    /// Only the key and the value's shape are checked. Numeric bounds are not.
    pub fn set_value(&mut self, key: &str, value: ParameterValue) -> Result<(), StoreError> {
        let descriptor = self.active.descriptor.as_ref().ok_or(StoreError::NoActiveShader)?;
        let spec = descriptor.param(key).ok_or_else(|| StoreError::UnknownKey {
            shader: descriptor.id().to_string(),
            key: key.to_string(),
        })?;
        if spec.kind == ParameterKind::Texture {
            return Err(StoreError::TextureKey(key.to_string()));
        }
        let value = normalize(spec.kind, value).map_err(|value| StoreError::KindMismatch {
            key: key.to_string(),
            kind: spec.kind,
            value,
        })?;
        self.active.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Replaces the whole value map: declared defaults overlaid with every
    /// entry of `snapshot` that names a known, non-texture key of matching
    /// shape. Returns how many entries were taken from the snapshot.
    pub fn replace_values(&mut self, snapshot: &ParameterValueMap) -> Result<usize, StoreError> {
        let descriptor = self.active.descriptor.as_ref().ok_or(StoreError::NoActiveShader)?;
        let mut values = descriptor.default_values();
        let mut applied = 0;
        for (key, value) in snapshot {
            let Some(spec) = descriptor.param(key) else {
                debug!(key = %key, "snapshot key not declared by active shader; skipping");
                continue;
            };
            if spec.kind == ParameterKind::Texture {
                continue;
            }
            match normalize(spec.kind, value.clone()) {
                Ok(value) => {
                    values.insert(key.clone(), value);
                    applied += 1;
                }
                Err(value) => debug!(key = %key, value = %value, "snapshot value has wrong shape; skipping"),
            }
        }
        self.active.values = values;
        Ok(applied)
    }

    /// Stores or clears the texture bound to `key`.
    pub fn set_texture(
        &mut self,
        key: &str,
        handle: Option<TextureHandle>,
    ) -> Result<(), StoreError> {
        let descriptor = self.active.descriptor.as_ref().ok_or(StoreError::NoActiveShader)?;
        match descriptor.param(key) {
            Some(spec) if spec.kind == ParameterKind::Texture => {
                self.textures.insert(key.to_string(), handle);
                Ok(())
            }
            Some(spec) => Err(StoreError::KindMismatch {
                key: key.to_string(),
                kind: spec.kind,
                value: ParameterValue::Empty,
            }),
            None => Err(StoreError::UnknownKey {
                shader: descriptor.id().to_string(),
                key: key.to_string(),
            }),
        }
    }

    pub fn set_pointer_signal(&mut self, signal: PointerSignal) {
        self.pointer = signal;
    }

    /// Re-derives defaults from the active descriptor and unbinds textures.
    pub fn reset_to_defaults(&mut self) {
        self.active.values = self
            .active
            .descriptor
            .as_ref()
            .map(|descriptor| descriptor.default_values())
            .unwrap_or_default();
        self.textures.clear();
    }

    pub fn set_geometry(&mut self, geometry: GeometryKind) {
        if self.geometry != geometry {
            debug!(geometry = %geometry, "geometry changed");
        }
        self.geometry = geometry;
    }
}

/// Accepts values of the declared shape; booleans may arrive as 0/1 numbers.
fn normalize(kind: ParameterKind, value: ParameterValue) -> Result<ParameterValue, ParameterValue> {
    match (kind, value) {
        (ParameterKind::Boolean, ParameterValue::Scalar(number)) => {
            Ok(ParameterValue::Boolean(number != 0.0))
        }
        (kind, value) if value.matches_kind(kind) => Ok(value),
        (_, value) => Err(value),
    }
}
