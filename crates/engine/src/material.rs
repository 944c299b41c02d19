//! Material synchronizer: owns the live program handle and its uniform table.
//!
//! A change of shader generation in the store rebuilds the handle from
//! scratch (new sources, a fresh slot table seeded from declared defaults)
//! and flags it for relinking. Every frame after that, `update` pushes the
//! clock, the pointer signal (for pointer-aware shaders), the value map, and
//! the texture map into the slots, in that order.
//!
//! Keys without a matching slot and values whose shape does not fit their
//! slot are skipped without comment: descriptors and compiled programs are
//! allowed to drift apart.
use catalog::{
    to_uniform, GlslType, ParameterKind, ShaderDescriptor, UniformValue,
    POINTER_POSITION_UNIFORM, POINTER_PRESSED_UNIFORM, POINTER_VELOCITY_UNIFORM, TIME_UNIFORM,
};
use tracing::debug;

use crate::store::{ParameterStore, PointerSignal};
use crate::texture::TextureHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Texture(Option<TextureHandle>),
}

impl SlotValue {
    fn zero(ty: GlslType) -> Self {
        match ty {
            GlslType::Float => SlotValue::Float(0.0),
            GlslType::Int => SlotValue::Int(0),
            GlslType::Bool => SlotValue::Bool(false),
            GlslType::Vec2 => SlotValue::Vec2([0.0; 2]),
            GlslType::Vec3 => SlotValue::Vec3([0.0; 3]),
            GlslType::Vec4 => SlotValue::Vec4([0.0; 4]),
            GlslType::Sampler2D => SlotValue::Texture(None),
        }
    }

    /// Numeric view used when packing; textures have none.
    pub fn as_floats(&self) -> Option<Vec<f32>> {
        match self {
            SlotValue::Float(v) => Some(vec![*v]),
            SlotValue::Int(v) => Some(vec![*v as f32]),
            SlotValue::Bool(v) => Some(vec![if *v { 1.0 } else { 0.0 }]),
            SlotValue::Vec2(v) => Some(v.to_vec()),
            SlotValue::Vec3(v) => Some(v.to_vec()),
            SlotValue::Vec4(v) => Some(v.to_vec()),
            SlotValue::Texture(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformSlot {
    pub name: String,
    pub ty: GlslType,
    pub value: SlotValue,
}

impl UniformSlot {
    /// Writes a coerced payload; returns false when the shapes disagree.
    fn write(&mut self, payload: UniformValue) -> bool {
        self.value = match (self.ty, payload) {
            (GlslType::Float, UniformValue::Float(v)) => SlotValue::Float(v),
            (GlslType::Int, UniformValue::Float(v)) => SlotValue::Int(v.round() as i32),
            (GlslType::Bool, UniformValue::Float(v)) => SlotValue::Bool(v != 0.0),
            (GlslType::Vec2, UniformValue::Vec2(v)) => SlotValue::Vec2(v),
            (GlslType::Vec3, UniformValue::Vec3(v)) => SlotValue::Vec3(v),
            (GlslType::Vec4, UniformValue::Vec3([r, g, b])) => SlotValue::Vec4([r, g, b, 1.0]),
            _ => return false,
        };
        true
    }
}

/// Name to slot table in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformTable {
    slots: Vec<UniformSlot>,
}

impl UniformTable {
    fn from_descriptor(descriptor: &ShaderDescriptor) -> Self {
        let mut table = Self {
            slots: descriptor
                .capabilities()
                .uniforms
                .iter()
                .map(|decl| UniformSlot {
                    name: decl.name.clone(),
                    ty: decl.ty,
                    value: SlotValue::zero(decl.ty),
                })
                .collect(),
        };
        for spec in descriptor.params() {
            if spec.kind == ParameterKind::Texture {
                continue;
            }
            if let Some(payload) = to_uniform(spec.kind, &spec.default) {
                table.write(&spec.key, payload);
            }
        }
        table
    }

    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    pub fn get(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut UniformSlot> {
        self.slots.iter_mut().find(|slot| slot.name == name)
    }

    fn write(&mut self, name: &str, payload: UniformValue) -> bool {
        self.get_mut(name).is_some_and(|slot| slot.write(payload))
    }

    fn bind(&mut self, name: &str, handle: Option<TextureHandle>) -> bool {
        match self.get_mut(name) {
            Some(slot) if slot.ty == GlslType::Sampler2D => {
                slot.value = SlotValue::Texture(handle);
                true
            }
            _ => false,
        }
    }

    /// Sampler slots with their bound texture, in declaration order.
    pub fn textures(&self) -> impl Iterator<Item = (&str, Option<&TextureHandle>)> {
        self.slots.iter().filter_map(|slot| match &slot.value {
            SlotValue::Texture(handle) => Some((slot.name.as_str(), handle.as_ref())),
            _ => None,
        })
    }
}

/// Live program built for one shader generation.
#[derive(Debug, Clone)]
pub struct ProgramHandle {
    shader_id: String,
    generation: u64,
    vertex_source: String,
    fragment_source: String,
    uniforms: UniformTable,
    needs_pointer: bool,
    uses_time: bool,
}

impl ProgramHandle {
    fn build(descriptor: &ShaderDescriptor, generation: u64) -> Self {
        Self {
            shader_id: descriptor.id().to_string(),
            generation,
            vertex_source: descriptor.vertex_source().to_string(),
            fragment_source: descriptor.fragment_source().to_string(),
            uniforms: UniformTable::from_descriptor(descriptor),
            needs_pointer: descriptor.needs_pointer(),
            uses_time: descriptor.capabilities().uses_time,
        }
    }

    pub fn shader_id(&self) -> &str {
        &self.shader_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    pub fn needs_pointer(&self) -> bool {
        self.needs_pointer
    }

    fn push_time(&mut self, seconds: f32) {
        if self.uses_time {
            self.uniforms.write(TIME_UNIFORM, UniformValue::Float(seconds));
        }
    }

    fn push_pointer(&mut self, signal: PointerSignal) {
        if !self.needs_pointer {
            return;
        }
        self.uniforms
            .write(POINTER_POSITION_UNIFORM, UniformValue::Vec2([signal.u, signal.v]));
        self.uniforms.write(
            POINTER_VELOCITY_UNIFORM,
            UniformValue::Vec2([signal.velocity_u, signal.velocity_v]),
        );
        self.uniforms.write(
            POINTER_PRESSED_UNIFORM,
            UniformValue::Float(if signal.pressed { 1.0 } else { 0.0 }),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Rebuilding,
    /// The active id has no descriptor; the flat fallback renders.
    Fallback,
}

/// What the renderer should draw this frame.
#[derive(Debug)]
pub enum MaterialFrame<'a> {
    Program {
        program: &'a ProgramHandle,
        /// True on the first frame after a rebuild; the pipeline must be relinked.
        relink: bool,
    },
    Fallback,
}

#[derive(Debug)]
pub struct MaterialSynchronizer {
    state: SyncState,
    program: Option<ProgramHandle>,
    bound_generation: Option<u64>,
    dirty: bool,
}

impl Default for MaterialSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialSynchronizer {
    pub fn new() -> Self {
        Self {
            state: SyncState::Fallback,
            program: None,
            bound_generation: None,
            dirty: false,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn program(&self) -> Option<&ProgramHandle> {
        self.program.as_ref()
    }

    /// Brings the program in line with the store and pushes this frame's
    /// uniforms. `elapsed` is the animation clock in seconds.
    pub fn update(&mut self, store: &ParameterStore, elapsed: f32) -> MaterialFrame<'_> {
        if self.bound_generation != Some(store.generation()) {
            self.rebuild(store);
        }

        let Some(program) = self.program.as_mut() else {
            return MaterialFrame::Fallback;
        };

        program.push_time(elapsed);
        program.push_pointer(store.pointer());

        if let Some(descriptor) = store.descriptor() {
            for (key, value) in store.values() {
                let Some(spec) = descriptor.param(key) else {
                    continue;
                };
                if spec.kind == ParameterKind::Texture {
                    continue;
                }
                if let Some(payload) = to_uniform(spec.kind, value) {
                    program.uniforms.write(key, payload);
                }
            }

            // keys missing from the texture map unbind, so a reset or clear
            // never leaves the previous image sampled
            for spec in descriptor.params() {
                if spec.kind == ParameterKind::Texture {
                    program.uniforms.bind(&spec.key, store.texture(&spec.key).cloned());
                }
            }
        }

        let relink = std::mem::take(&mut self.dirty);
        MaterialFrame::Program {
            program,
            relink,
        }
    }

    fn rebuild(&mut self, store: &ParameterStore) {
        self.state = SyncState::Rebuilding;
        self.bound_generation = Some(store.generation());
        match store.descriptor() {
            Some(descriptor) => {
                let program = ProgramHandle::build(descriptor, store.generation());
                debug!(
                    shader = %program.shader_id,
                    generation = program.generation,
                    slots = program.uniforms.slots.len(),
                    pointer = program.needs_pointer,
                    "rebuilt program"
                );
                self.program = Some(program);
                self.dirty = true;
                self.state = SyncState::Idle;
            }
            None => {
                debug!(shader = %store.shader_id(), "no descriptor; using fallback material");
                self.program = None;
                self.dirty = false;
                self.state = SyncState::Fallback;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use catalog::{Catalog, ParameterSpec, ParameterValue};

    fn store() -> ParameterStore {
        let mut catalog = Catalog::new();
        catalog.insert(
            ShaderDescriptor::new(
                "lab",
                "Lab",
                "",
                "",
                "uniform float uTime;\n\
                 uniform vec2 uMouse;\n\
                 uniform vec2 uMouseVelocity;\n\
                 uniform float uMouseDown;\n\
                 uniform float uAnimated;\n\
                 uniform bool uFlag;\n\
                 uniform vec3 uColor;\n\
                 uniform sampler2D uTexture;\n",
                vec![
                    ParameterSpec::scalar("uAnimated", 1.0).with_range(0.0, 1.0, Some(1.0)),
                    ParameterSpec::new(
                        "uFlag",
                        ParameterKind::Boolean,
                        ParameterValue::Boolean(true),
                    ),
                    ParameterSpec::new(
                        "uColor",
                        ParameterKind::Color,
                        ParameterValue::Color("#ffffff".into()),
                    ),
                    ParameterSpec::new("uTexture", ParameterKind::Texture, ParameterValue::Empty),
                    ParameterSpec::scalar("uStripped", 3.0),
                ],
            )
            .unwrap(),
        );
        catalog.insert(
            ShaderDescriptor::new("plain", "Plain", "", "", "uniform float uTime;\n", vec![])
                .unwrap(),
        );
        let mut store = ParameterStore::new(Arc::new(catalog));
        store.select_shader("lab");
        store
    }

    fn slot(sync: &MaterialSynchronizer, name: &str) -> SlotValue {
        sync.program().unwrap().uniforms().get(name).unwrap().value.clone()
    }

    #[test]
    fn first_update_rebuilds_and_requests_relink() {
        let store = store();
        let mut sync = MaterialSynchronizer::new();
        match sync.update(&store, 0.0) {
            MaterialFrame::Program { relink, program } => {
                assert!(relink);
                assert_eq!(program.shader_id(), "lab");
                assert!(!program.uniforms().contains("uStripped"));
            }
            MaterialFrame::Fallback => panic!("expected a program"),
        }
        assert_eq!(sync.state(), SyncState::Idle);
        assert!(matches!(
            sync.update(&store, 0.1),
            MaterialFrame::Program { relink: false, .. }
        ));
    }

    #[test]
    fn boolean_surfaced_scalar_writes_one_and_zero() {
        let mut store = store();
        let mut sync = MaterialSynchronizer::new();
        store.set_value("uAnimated", ParameterValue::Scalar(1.0)).unwrap();
        sync.update(&store, 0.0);
        assert_eq!(slot(&sync, "uAnimated"), SlotValue::Float(1.0));

        store.set_value("uAnimated", ParameterValue::Scalar(0.0)).unwrap();
        sync.update(&store, 0.0);
        assert_eq!(slot(&sync, "uAnimated"), SlotValue::Float(0.0));

        store.set_value("uFlag", ParameterValue::Boolean(false)).unwrap();
        sync.update(&store, 0.0);
        assert_eq!(slot(&sync, "uFlag"), SlotValue::Bool(false));
    }

    #[test]
    fn colors_are_written_as_linear_rgb() {
        let mut store = store();
        let mut sync = MaterialSynchronizer::new();
        store
            .set_value("uColor", ParameterValue::Color("#000000".into()))
            .unwrap();
        sync.update(&store, 0.0);
        assert_eq!(slot(&sync, "uColor"), SlotValue::Vec3([0.0; 3]));
    }

    #[test]
    fn time_and_pointer_are_driven_each_frame() {
        let mut store = store();
        let mut sync = MaterialSynchronizer::new();
        store.set_pointer_signal(PointerSignal {
            u: 0.25,
            v: 0.75,
            velocity_u: 1.0,
            velocity_v: -1.0,
            pressed: true,
        });
        sync.update(&store, 2.5);
        assert_eq!(slot(&sync, "uTime"), SlotValue::Float(2.5));
        assert_eq!(slot(&sync, "uMouse"), SlotValue::Vec2([0.25, 0.75]));
        assert_eq!(slot(&sync, "uMouseVelocity"), SlotValue::Vec2([1.0, -1.0]));
        assert_eq!(slot(&sync, "uMouseDown"), SlotValue::Float(1.0));
    }

    #[test]
    fn shader_switch_rebuilds_the_table() {
        let mut store = store();
        let mut sync = MaterialSynchronizer::new();
        sync.update(&store, 0.0);
        store.select_shader("plain");
        assert!(matches!(
            sync.update(&store, 0.0),
            MaterialFrame::Program { relink: true, .. }
        ));
        let program = sync.program().unwrap();
        assert_eq!(program.shader_id(), "plain");
        assert_eq!(program.uniforms().slots().len(), 1);
        assert!(!program.needs_pointer());
    }

    #[test]
    fn unknown_shader_renders_fallback() {
        let mut store = store();
        let mut sync = MaterialSynchronizer::new();
        sync.update(&store, 0.0);
        store.select_shader("does-not-exist");
        assert!(matches!(sync.update(&store, 0.0), MaterialFrame::Fallback));
        assert_eq!(sync.state(), SyncState::Fallback);
        assert!(sync.program().is_none());
    }

    #[test]
    fn textures_start_unbound_and_follow_the_store() {
        let mut store = store();
        let mut sync = MaterialSynchronizer::new();
        sync.update(&store, 0.0);
        assert_eq!(slot(&sync, "uTexture"), SlotValue::Texture(None));

        let image = crate::texture::DecodedImage {
            width: 1,
            height: 1,
            pixels: vec![0, 0, 0, 255],
        };
        let handle = TextureHandle::new(7, "memory", image);
        store.set_texture("uTexture", Some(handle.clone())).unwrap();
        sync.update(&store, 0.0);
        assert_eq!(slot(&sync, "uTexture"), SlotValue::Texture(Some(handle)));
        assert_eq!(
            sync.program().unwrap().uniforms().textures().count(),
            1
        );
    }

    #[test]
    fn reset_unbinds_textures_without_a_rebuild() {
        let mut store = store();
        let mut sync = MaterialSynchronizer::new();
        let image = crate::texture::DecodedImage {
            width: 1,
            height: 1,
            pixels: vec![255, 255, 255, 255],
        };
        store
            .set_texture("uTexture", Some(TextureHandle::new(1, "memory", image)))
            .unwrap();
        sync.update(&store, 0.0);
        assert!(matches!(slot(&sync, "uTexture"), SlotValue::Texture(Some(_))));

        store.reset_to_defaults();
        let relink = match sync.update(&store, 0.0) {
            MaterialFrame::Program { relink, .. } => relink,
            MaterialFrame::Fallback => panic!("expected program"),
        };
        assert!(!relink);
        assert_eq!(slot(&sync, "uTexture"), SlotValue::Texture(None));
    }
}
