use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use engine::GeometryKind;
use renderer::{Antialiasing, ColorSpaceMode};

#[derive(Parser, Debug)]
#[command(
    name = "shaderlab",
    author,
    version,
    about = "Interactive GLSL shader playground",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Shader id to open first (see `shaderlab list`).
    #[arg(value_name = "SHADER")]
    pub shader: Option<String>,

    /// Mesh to draw the shader on: plane, sphere, torus, or box.
    #[arg(long, value_name = "KIND", value_parser = parse_geometry)]
    pub geometry: Option<GeometryKind>,

    /// Override the window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Optional FPS cap (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<Antialiasing>,

    /// Output color space handling: `auto`, `gamma`, or `linear`.
    #[arg(long, value_name = "MODE", value_parser = parse_color_space)]
    pub color_space: Option<ColorSpaceMode>,

    /// Read configuration from this file instead of `<config>/config.toml`.
    #[arg(long, value_name = "PATH", env = "SHADERLAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not read control commands from stdin.
    #[arg(long)]
    pub no_console: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every shader in the catalog.
    List,
    /// Write a shader's source or default settings to a file or stdout.
    Export(ExportArgs),
    /// Inspect or delete saved presets.
    Presets(PresetsCommand),
    /// Print resolved directories for config, data, cache, and exports.
    Where,
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Shader id to export.
    #[arg(value_name = "SHADER")]
    pub shader: String,

    #[arg(long, value_enum, default_value_t = ExportFormat::Source)]
    pub format: ExportFormat,

    /// Export the values of this preset instead of the declared defaults.
    #[arg(long, value_name = "PRESET_ID")]
    pub preset: Option<String>,

    /// Destination file; stdout when omitted.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Fragment shader source.
    Source,
    /// Settings JSON accepted by the import control.
    Settings,
}

#[derive(Parser, Debug)]
pub struct PresetsCommand {
    #[command(subcommand)]
    pub action: PresetsAction,
}

#[derive(Subcommand, Debug)]
pub enum PresetsAction {
    /// Show saved presets, optionally for a single shader.
    List {
        #[arg(value_name = "SHADER")]
        shader: Option<String>,
    },
    /// Delete a preset by id.
    Remove {
        #[arg(value_name = "PRESET_ID")]
        id: String,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_antialias(value: &str) -> Result<Antialiasing, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("anti-alias mode must not be empty".to_string());
    }
    labconfig::parse_antialias(trimmed)
        .map(Antialiasing::from)
        .map_err(|_| {
            format!("invalid anti-alias mode '{trimmed}'; use auto/off or 2/4/8/16")
        })
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceMode, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("color space must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "auto" => Ok(ColorSpaceMode::Auto),
        "gamma" | "srgb-off" => Ok(ColorSpaceMode::Gamma),
        "linear" | "srgb" => Ok(ColorSpaceMode::Linear),
        other => Err(format!(
            "unknown color space '{other}'; expected auto, gamma, or linear"
        )),
    }
}

pub fn parse_geometry(value: &str) -> Result<GeometryKind, String> {
    value.parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;

    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}
