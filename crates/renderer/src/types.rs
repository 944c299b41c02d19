use labconfig::{AntialiasSetting, ColorSpaceSetting, LabConfig};

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Gamma-encoded swapchain; shader outputs are written as-is.
    #[default]
    Auto,
    /// Treat shader outputs and textures as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and let sRGB swapchains/textures convert.
    Linear,
}

impl From<ColorSpaceSetting> for ColorSpaceMode {
    fn from(value: ColorSpaceSetting) -> Self {
        match value {
            ColorSpaceSetting::Auto => Self::Auto,
            ColorSpaceSetting::Gamma => Self::Gamma,
            ColorSpaceSetting::Linear => Self::Linear,
        }
    }
}

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

impl From<AntialiasSetting> for Antialiasing {
    fn from(value: AntialiasSetting) -> Self {
        match value {
            AntialiasSetting::Auto => Self::Auto,
            AntialiasSetting::Off => Self::Off,
            AntialiasSetting::Samples2 => Self::Samples(2),
            AntialiasSetting::Samples4 => Self::Samples(4),
            AntialiasSetting::Samples8 => Self::Samples(8),
            AntialiasSetting::Samples16 => Self::Samples(16),
        }
    }
}

/// Window and surface options passed to the renderer at start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Initial window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Frame rate cap; None renders on every vblank.
    pub target_fps: Option<f32>,
    pub antialiasing: Antialiasing,
    pub color_space: ColorSpaceMode,
    /// Prefix of the window title; the active shader name is appended.
    pub title: String,
}

impl RendererConfig {
    pub fn from_lab_config(config: &LabConfig) -> Self {
        Self {
            surface_size: (config.window.width, config.window.height),
            target_fps: config.target_fps(),
            antialiasing: config.window.antialias.map(Antialiasing::from).unwrap_or_default(),
            color_space: config
                .window
                .color_space
                .map(ColorSpaceMode::from)
                .unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn window_title(&self, shader_name: &str) -> String {
        if shader_name.is_empty() {
            self.title.clone()
        } else {
            format!("{}: {}", self.title, shader_name)
        }
    }
}

impl Default for RendererConfig {
    /// 1280x720 window, uncapped, automatic MSAA.
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            target_fps: None,
            antialiasing: Antialiasing::default(),
            color_space: ColorSpaceMode::default(),
            title: "shaderlab".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_config_maps_onto_renderer_options() {
        let config = LabConfig::from_toml_str(
            r#"
            version = 1
            [window]
            width = 800
            height = 600
            fps = 30
            antialias = "4"
            color_space = "linear"
            "#,
        )
        .unwrap();
        let renderer = RendererConfig::from_lab_config(&config);
        assert_eq!(renderer.surface_size, (800, 600));
        assert_eq!(renderer.target_fps, Some(30.0));
        assert_eq!(renderer.antialiasing, Antialiasing::Samples(4));
        assert_eq!(renderer.color_space, ColorSpaceMode::Linear);
    }

    #[test]
    fn title_includes_shader_name() {
        let config = RendererConfig::default();
        assert_eq!(config.window_title("Ripple"), "shaderlab: Ripple");
        assert_eq!(config.window_title(""), "shaderlab");
    }
}
