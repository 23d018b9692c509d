// SPDX-License-Identifier: CEPL-1.0
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

use crate::{SHADER_DIR, VALIDATION_LAYERS, WINDOW_HEIGHT, WINDOW_TITLE, WINDOW_WIDTH};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Which of the two programs to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SceneKind {
    /// Fill every swapchain image with a flat colour via a transfer clear.
    Clear,
    /// Render pass + graphics pipeline drawing one hard-coded triangle.
    #[default]
    Triangle,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            width: WINDOW_WIDTH,
            height: WINDOW_HEIGHT,
            title: WINDOW_TITLE.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub scene: SceneKind,
    pub shader_dir: PathBuf,
    pub validation_layers: Vec<String>,
    pub clear_color: Option<[f32; 4]>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            scene: SceneKind::default(),
            shader_dir: PathBuf::from(SHADER_DIR),
            validation_layers: VALIDATION_LAYERS.iter().map(|s| s.to_string()).collect(),
            clear_color: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
}

impl AppConfig {
    pub fn from_toml_str(path: &Path, s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }
}

/// A missing file means "use the defaults"; anything else that goes wrong is an error.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(s) => AppConfig::from_toml_str(path, &s),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(source) => Err(ConfigError::Read {
            path: path.to_owned(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_window_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.window.width, 1024);
        assert_eq!(cfg.window.height, 768);
        assert_eq!(cfg.window.title, "Nirvana");
        assert_eq!(cfg.render.scene, SceneKind::Triangle);
        assert_eq!(cfg.render.shader_dir, PathBuf::from("Shaders"));
        assert_eq!(
            cfg.render.validation_layers[0],
            "VK_LAYER_LUNARG_standard_validation"
        );
        assert!(cfg.render.clear_color.is_none());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let cfg = AppConfig::from_toml_str(
            Path::new("nirvana.toml"),
            r#"
            [render]
            scene = "clear"
            clear_color = [0.25, 0.5, 0.75, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.render.scene, SceneKind::Clear);
        assert_eq!(cfg.render.clear_color, Some([0.25, 0.5, 0.75, 1.0]));
        assert_eq!(cfg.window, WindowCfg::default());
        assert_eq!(cfg.render.shader_dir, PathBuf::from("Shaders"));
    }

    #[test]
    fn unknown_scene_is_a_parse_error() {
        let err = AppConfig::from_toml_str(Path::new("x.toml"), "[render]\nscene = \"cube\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("nirvana-config-that-does-not-exist.toml");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }
}
