// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;

pub use config::{load_config, AppConfig, ConfigError, RenderCfg, SceneKind, WindowCfg};

pub const WINDOW_WIDTH: u32 = 1024;
pub const WINDOW_HEIGHT: u32 = 768;
pub const WINDOW_TITLE: &str = "Nirvana";

/// Layer names tried in order in debug builds; the first one the loader reports is enabled.
pub const VALIDATION_LAYERS: &[&str] = &[
    "VK_LAYER_LUNARG_standard_validation",
    "VK_LAYER_KHRONOS_validation",
];

pub const SHADER_DIR: &str = "Shaders";
pub const VERTEX_SHADER_FILE: &str = "vert.spv";
pub const FRAGMENT_SHADER_FILE: &str = "frag.spv";

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
