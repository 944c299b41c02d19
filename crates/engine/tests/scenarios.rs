use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use catalog::{Catalog, ControlValue, ParameterSpec, ParameterValue, ShaderDescriptor};
use engine::{
    param_control_id, ControlEvent, ControlSchema, ControlSurface, ExportSink, MaterialFrame,
    MemoryStorage, ParameterStore, Playground, PlaygroundOptions, PointerTracker, PresetManager,
    SlotValue, WidgetInput,
};
use labconfig::PointerSettings;

struct NullSurface;

impl ControlSurface for NullSurface {
    fn mount(&mut self, _schema: &ControlSchema) {}
    fn reflect(&mut self, _generation: u64, _updates: &[(String, WidgetInput)]) {}
}

struct NullSink;

impl ExportSink for NullSink {
    fn copy_text(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn save_file(&mut self, file_name: &str, _contents: &str) -> Result<PathBuf> {
        Ok(PathBuf::from(file_name))
    }
}

fn grad_catalog() -> Arc<Catalog> {
    let mut catalog = Catalog::with_builtins();
    catalog.insert(
        ShaderDescriptor::new(
            "grad",
            "Grad",
            "",
            "",
            "uniform float angle;\nuniform float uAnimated;\n",
            vec![
                ParameterSpec::scalar("angle", 45.0).with_range(0.0, 360.0, None),
                ParameterSpec::scalar("uAnimated", 0.0).with_range(0.0, 1.0, Some(1.0)),
            ],
        )
        .expect("grad descriptor"),
    );
    Arc::new(catalog)
}

fn playground(initial: &str) -> Playground<MemoryStorage> {
    Playground::new(
        grad_catalog(),
        PlaygroundOptions {
            initial_shader: Some(initial.to_string()),
            ..PlaygroundOptions::default()
        },
        PresetManager::load(MemoryStorage::new()),
        Box::new(NullSurface),
        Box::new(NullSink),
        Instant::now(),
    )
}

fn uniform(playground: &mut Playground<MemoryStorage>, name: &str) -> SlotValue {
    playground.process_events();
    match playground.frame(Instant::now()) {
        MaterialFrame::Program { program, .. } => program
            .uniforms()
            .get(name)
            .map(|slot| slot.value.clone())
            .unwrap_or_else(|| panic!("no slot {name}")),
        MaterialFrame::Fallback => panic!("expected a program"),
    }
}

#[test]
fn every_catalog_shader_selects_to_its_defaults() {
    let catalog = grad_catalog();
    let mut store = ParameterStore::new(catalog.clone());
    for id in catalog.ids() {
        assert!(store.select_shader(id));
        let descriptor = catalog.get(id).unwrap();
        assert_eq!(store.values(), &descriptor.default_values(), "{id}");
        assert_eq!(store.values().len(), descriptor.params().len());
    }
}

#[test]
fn set_then_reset_scenario() {
    let mut playground = playground("grad");
    assert_eq!(
        playground.store().value("angle"),
        Some(&ParameterValue::Scalar(45.0))
    );
    playground
        .set_value("angle", ParameterValue::Scalar(90.0))
        .unwrap();
    assert_eq!(
        playground.store().value("angle"),
        Some(&ParameterValue::Scalar(90.0))
    );
    playground.reset();
    assert_eq!(
        playground.store().value("angle"),
        Some(&ParameterValue::Scalar(45.0))
    );
    let once = playground.store().values().clone();
    playground.reset();
    assert_eq!(&once, playground.store().values());
}

#[test]
fn preset_save_and_apply_scenario() {
    let mut playground = playground("grad");
    playground
        .set_value("angle", ParameterValue::Scalar(200.0))
        .unwrap();
    let preset = playground.save_preset("steep").expect("preset saved");
    assert_eq!(playground.presets().presets_for("grad").len(), 1);
    assert_eq!(preset.shader_id, "grad");

    playground
        .set_value("angle", ParameterValue::Scalar(10.0))
        .unwrap();
    assert!(playground.apply_preset(&preset.id));
    assert_eq!(
        playground.store().value("angle"),
        Some(&ParameterValue::Scalar(200.0))
    );
    assert_eq!(uniform(&mut playground, "angle"), SlotValue::Float(200.0));
}

#[test]
fn unknown_shader_is_renderable() {
    let mut playground = playground("grad");
    assert!(!playground.select_shader("does-not-exist"));
    assert!(playground.shader_info().fallback);
    assert!(matches!(
        playground.frame(Instant::now()),
        MaterialFrame::Fallback
    ));
    assert_eq!(playground.schema().groups().len(), 2);

    assert!(playground.select_shader("grad"));
    assert!(matches!(
        playground.frame(Instant::now()),
        MaterialFrame::Program { relink: true, .. }
    ));
}

#[test]
fn boolean_toggle_reaches_uniform_as_number() {
    let mut playground = playground("grad");
    let generation = playground.schema().generation();
    let sender = playground.event_sender();
    let toggle = |on| {
        ControlEvent::new(
            generation,
            param_control_id("uAnimated"),
            WidgetInput::Value(ControlValue::Toggle(on)),
        )
    };

    sender.send(toggle(true)).unwrap();
    assert_eq!(uniform(&mut playground, "uAnimated"), SlotValue::Float(1.0));
    sender.send(toggle(false)).unwrap();
    assert_eq!(uniform(&mut playground, "uAnimated"), SlotValue::Float(0.0));
}

#[test]
fn pointer_decay_follows_geometric_series() {
    let catalog = grad_catalog();
    let mut store = ParameterStore::new(catalog);
    let start = Instant::now();
    let mut tracker = PointerTracker::new(PointerSettings::default(), start);
    tracker.move_to(glam::Vec2::new(0.7, 0.5), start + Duration::from_millis(100));
    let m = tracker.signal().velocity().length();
    assert!(m > 0.001);

    let steps = 20;
    for _ in 0..steps {
        tracker.tick(&mut store);
    }
    let expected = m * 0.95_f32.powi(steps);
    assert!((store.pointer().velocity().length() - expected).abs() < 1e-4);

    let mut guard = 0;
    while tracker.tick(&mut store) {
        guard += 1;
        assert!(guard < 10_000);
    }
    assert!(tracker.signal().velocity().length() <= 0.001);
}

#[test]
fn ripple_receives_pointer_signal() {
    let mut playground = playground("ripple");
    playground.resize(400.0, 400.0);
    let start = Instant::now();
    playground.pointer_moved(200.0, 200.0, start + Duration::from_millis(16));
    playground.pointer_pressed();
    assert_eq!(uniform(&mut playground, "uMouseDown"), SlotValue::Float(1.0));
    let SlotValue::Vec2([u, v]) = uniform(&mut playground, "uMouse") else {
        panic!("uMouse should be a vec2");
    };
    assert!((u - 0.5).abs() < 1e-3 && (v - 0.5).abs() < 1e-3);
    playground.pointer_left();
    assert_eq!(uniform(&mut playground, "uMouseDown"), SlotValue::Float(0.0));
}
