use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use catalog::{Catalog, ParameterValueMap};
use chrono::Utc;
use engine::{
    settings_json, FileStorage, GeometryKind, Playground, PlaygroundOptions, PresetManager,
    Viewport,
};
use labconfig::LabConfig;
use renderer::{run_window, RendererConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ExportArgs, ExportFormat, PresetsAction, RunArgs};
use crate::console::{self, ConsoleSurface, SharedView};
use crate::paths::AppPaths;
use crate::sink::DesktopSink;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        data = %paths.data_dir().display(),
        cache = %paths.cache_dir().display(),
        "resolved shaderlab paths"
    );
    let config = load_config(cli.run.config.as_deref(), &paths)?;

    match cli.command {
        None => run_preview(cli.run, config, &paths),
        Some(Command::List) => list_shaders(&paths, &mut io::stdout().lock()),
        Some(Command::Export(args)) => export(&args, &config, &paths),
        Some(Command::Presets(presets)) => match presets.action {
            PresetsAction::List { shader } => {
                list_presets(shader.as_deref(), &config, &paths, &mut io::stdout().lock())
            }
            PresetsAction::Remove { id } => remove_preset(&id, &config, &paths),
        },
        Some(Command::Where) => print_paths(&config, &paths, &mut io::stdout().lock()),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Reads `config.toml`; a missing default file yields the built-in defaults,
/// a missing explicit file is an error.
fn load_config(explicit: Option<&Path>, paths: &AppPaths) -> Result<LabConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = paths.config_file();
            if !path.exists() {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(LabConfig::default());
            }
            path
        }
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = LabConfig::from_toml_str(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

fn build_catalog(paths: &AppPaths) -> Catalog {
    let mut catalog = Catalog::with_builtins();
    for root in paths.shader_roots() {
        match catalog.load_dir(&root) {
            Ok(0) => {}
            Ok(count) => {
                tracing::info!(root = %root.display(), count, "loaded shader packs");
            }
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %format!("{err:#}"), "skipping shader directory");
            }
        }
    }
    catalog
}

fn preset_storage(config: &LabConfig, paths: &AppPaths) -> FileStorage {
    match &config.presets.file {
        Some(file) => FileStorage::at_file(file),
        None => FileStorage::in_dir(paths.preset_dir()),
    }
}

fn export_dir(config: &LabConfig, paths: &AppPaths) -> PathBuf {
    config
        .export
        .directory
        .clone()
        .unwrap_or_else(|| paths.default_export_dir())
}

fn renderer_config(args: &RunArgs, config: &LabConfig) -> RendererConfig {
    let mut renderer = RendererConfig::from_lab_config(config);
    if let Some(size) = args.size {
        renderer.surface_size = size;
    }
    if let Some(fps) = args.fps {
        renderer.target_fps = Some(fps).filter(|fps| *fps > 0.0);
    }
    if let Some(antialiasing) = args.antialias {
        renderer.antialiasing = antialiasing;
    }
    if let Some(color_space) = args.color_space {
        renderer.color_space = color_space;
    }
    renderer
}

fn run_preview(args: RunArgs, config: LabConfig, paths: &AppPaths) -> Result<()> {
    let catalog = Arc::new(build_catalog(paths));
    if catalog.is_empty() {
        bail!("no shaders available");
    }
    let renderer_config = renderer_config(&args, &config);
    let (width, height) = renderer_config.surface_size;
    let initial_shader = args.shader.clone().or_else(|| config.scene.shader.clone());
    if let Some(id) = &initial_shader {
        if !catalog.contains(id) {
            tracing::warn!(shader = %id, "unknown shader id; showing the fallback material");
        }
    }
    let options = PlaygroundOptions {
        initial_shader,
        geometry: args
            .geometry
            .or_else(|| config.scene.geometry.map(GeometryKind::from))
            .unwrap_or_default(),
        pointer: config.pointer,
        viewport: Some(Viewport::new(width as f32, height as f32)),
    };

    let view = SharedView::default();
    let surface = ConsoleSurface::new(view.clone(), !args.no_console);
    let sink = DesktopSink::new(export_dir(&config, paths));
    let presets = PresetManager::load(preset_storage(&config, paths));
    let playground = Playground::new(
        catalog,
        options,
        presets,
        Box::new(surface),
        Box::new(sink),
        Instant::now(),
    );
    let sender = playground.event_sender();
    let no_console = args.no_console;

    tracing::info!(
        shader = %playground.store().shader_id(),
        width,
        height,
        "starting shaderlab preview"
    );
    run_window(renderer_config, playground, move |control| {
        if no_console {
            return;
        }
        if let Err(err) = console::spawn(view, sender, control) {
            tracing::warn!(error = %err, "console input unavailable");
        }
    })
}

fn list_shaders(paths: &AppPaths, out: &mut impl Write) -> Result<()> {
    let catalog = build_catalog(paths);
    for entry in catalog.entries() {
        writeln!(out, "{:<16} {:<20} {}", entry.id, entry.name, entry.description)?;
    }
    Ok(())
}

fn export(args: &ExportArgs, config: &LabConfig, paths: &AppPaths) -> Result<()> {
    let catalog = build_catalog(paths);
    let descriptor = catalog
        .get(&args.shader)
        .ok_or_else(|| anyhow!("unknown shader '{}'; see `shaderlab list`", args.shader))?;

    let contents = match args.format {
        ExportFormat::Source => {
            if args.preset.is_some() {
                bail!("--preset only applies to --format settings");
            }
            descriptor.fragment_source().to_string()
        }
        ExportFormat::Settings => {
            let mut values = descriptor.default_values();
            if let Some(id) = &args.preset {
                let presets = PresetManager::load(preset_storage(config, paths));
                let preset = presets
                    .find(id)
                    .ok_or_else(|| anyhow!("no preset with id '{id}'"))?;
                if preset.shader_id != descriptor.id() {
                    bail!(
                        "preset '{id}' belongs to shader '{}', not '{}'",
                        preset.shader_id,
                        descriptor.id()
                    );
                }
                overlay_values(&mut values, &preset.uniform_values);
            }
            settings_json(&descriptor, &values, Utc::now())
                .context("failed to serialise settings")?
        }
    };

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(path, &contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), shader = %descriptor.id(), "exported");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            if !contents.ends_with('\n') {
                writeln!(stdout)?;
            }
        }
    }
    Ok(())
}

/// Copies snapshot entries for keys the defaults already declare.
fn overlay_values(values: &mut ParameterValueMap, snapshot: &ParameterValueMap) {
    for (key, value) in snapshot {
        if let Some(slot) = values.get_mut(key) {
            *slot = value.clone();
        }
    }
}

fn list_presets(
    shader: Option<&str>,
    config: &LabConfig,
    paths: &AppPaths,
    out: &mut impl Write,
) -> Result<()> {
    let presets = PresetManager::load(preset_storage(config, paths));
    let mut printed = 0;
    for (shader_id, list) in presets.table() {
        if shader.is_some_and(|wanted| wanted != shader_id.as_str()) {
            continue;
        }
        for preset in list {
            writeln!(out, "{:<24} {:<16} {}", preset.id, shader_id, preset.name)?;
            printed += 1;
        }
    }
    if printed == 0 {
        writeln!(out, "no presets saved")?;
    }
    Ok(())
}

fn remove_preset(id: &str, config: &LabConfig, paths: &AppPaths) -> Result<()> {
    let mut presets = PresetManager::load(preset_storage(config, paths));
    match presets.remove(id) {
        Some(preset) => {
            tracing::info!(preset = %preset.id, shader = %preset.shader_id, name = %preset.name, "removed preset");
            Ok(())
        }
        None => bail!("no preset with id '{id}'"),
    }
}

fn print_paths(config: &LabConfig, paths: &AppPaths, out: &mut impl Write) -> Result<()> {
    writeln!(out, "config:  {}", paths.config_dir().display())?;
    writeln!(out, "data:    {}", paths.data_dir().display())?;
    writeln!(out, "cache:   {}", paths.cache_dir().display())?;
    for root in paths.shader_roots() {
        writeln!(out, "shaders: {}", root.display())?;
    }
    writeln!(
        out,
        "presets: {}",
        preset_storage(config, paths)
            .path_for(engine::PRESET_STORAGE_KEY)
            .display()
    )?;
    writeln!(out, "exports: {}", export_dir(config, paths).display())?;
    Ok(())
}
