//! Uniform synchronization and hot-swap engine.
//!
//! Data flows one way per frame: surfaces and the pointer tracker write into
//! the `ParameterStore`, the `MaterialSynchronizer` reads it and fills the
//! program's uniform table, and the renderer uploads that table. The
//! `Playground` owns one of each and drives them in order.
pub mod controls;
pub mod export;
pub mod material;
pub mod playground;
pub mod pointer;
pub mod presets;
pub mod scene;
pub mod store;
pub mod texture;

pub use controls::{
    param_control_id, Control, ControlEvent, ControlGroup, ControlPanel, ControlSchema,
    ControlSurface, PanelAction, SelectOption, Widget, WidgetInput,
};
pub use export::{
    annotated_source, import_settings, settings_file_name, settings_json, shader_file_name,
    SettingsDocument,
};
pub use material::{
    MaterialFrame, MaterialSynchronizer, ProgramHandle, SlotValue, SyncState, UniformSlot,
    UniformTable,
};
pub use playground::{ExportSink, Playground, PlaygroundOptions, ShaderInfo};
pub use pointer::PointerTracker;
pub use presets::{
    FileStorage, MemoryStorage, Preset, PresetError, PresetManager, PresetStorage, PresetTable,
    PRESET_STORAGE_KEY,
};
pub use scene::{surface_uv, Camera, GeometryKind, Viewport, PLANE_SIZE};
pub use store::{ActiveShader, ParameterStore, PointerSignal, StoreError};
pub use texture::{DecodeToken, DecodedImage, TextureHandle, TextureLoader};
