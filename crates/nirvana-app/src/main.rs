// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

use nirvana_core::{
    init_tracing, load_config, AppConfig, SceneKind, FRAGMENT_SHADER_FILE, VERTEX_SHADER_FILE,
};
use nirvana_platform::Platform;
use nirvana_render::{RenderSettings, RenderSize, Renderer, Scene};
use nirvana_render_vk::{load_spirv, VkRenderer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config; built-in defaults when the file does not exist
    #[arg(long, default_value = "nirvana.toml")]
    config: PathBuf,

    /// Scene to run, overrides the config file
    #[arg(long, value_enum)]
    scene: Option<CliScene>,

    /// Close the window after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Write the compiled triangle shaders into the shader dir and exit
    #[cfg(feature = "bake-shaders")]
    #[arg(long)]
    bake_shaders: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CliScene {
    Clear,
    Triangle,
}

impl From<CliScene> for SceneKind {
    fn from(s: CliScene) -> Self {
        match s {
            CliScene::Clear => SceneKind::Clear,
            CliScene::Triangle => SceneKind::Triangle,
        }
    }
}

// Shaders are read before any window exists, so a missing file never flashes one.
fn load_scene(kind: SceneKind, shader_dir: &Path) -> Result<Scene> {
    Ok(match kind {
        SceneKind::Clear => Scene::Clear,
        SceneKind::Triangle => Scene::Triangle {
            vertex: load_spirv(&shader_dir.join(VERTEX_SHADER_FILE))?,
            fragment: load_spirv(&shader_dir.join(FRAGMENT_SHADER_FILE))?,
        },
    })
}

fn frame_limit_reached(frames: u64, max_frames: Option<u64>) -> bool {
    max_frames.is_some_and(|max| frames >= max)
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Render,
    Stop(&'static str),
}

// Decided before any GPU work for the frame, so `--max-frames 0` renders nothing.
fn next_step(close_requested: bool, frames: u64, max_frames: Option<u64>) -> Step {
    if close_requested {
        Step::Stop("close requested")
    } else if frame_limit_reached(frames, max_frames) {
        Step::Stop("frame limit reached")
    } else {
        Step::Render
    }
}

#[cfg(feature = "bake-shaders")]
fn bake_shaders(dir: &Path) -> Result<()> {
    const VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/vert.spv"));
    const FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/frag.spv"));

    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    for (name, bytes) in [(VERTEX_SHADER_FILE, VERT), (FRAGMENT_SHADER_FILE, FRAG)] {
        let path = dir.join(name);
        std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        info!("wrote {} ({} bytes)", path.display(), bytes.len());
    }
    Ok(())
}

fn run(cfg: AppConfig, scene_override: Option<CliScene>, max_frames: Option<u64>) -> Result<()> {
    let kind = scene_override.map(SceneKind::from).unwrap_or(cfg.render.scene);
    info!("scene = {kind:?}");
    let scene = load_scene(kind, &cfg.render.shader_dir).context("load shaders")?;

    let mut platform = Platform::init().context("platform init")?;
    platform
        .create_window(cfg.window.width, cfg.window.height, &cfg.window.title)
        .context("create_window")?;

    let settings = RenderSettings {
        size: RenderSize {
            width: cfg.window.width,
            height: cfg.window.height,
        },
        scene,
        debug_layers: cfg.render.validation_layers.clone(),
    };
    let mut renderer = {
        let (dh, wh) = platform.native_handles()?;
        VkRenderer::new(&wh, &dh, settings)?
    };
    if let Some(rgba) = cfg.render.clear_color {
        renderer.set_clear_color(rgba);
    }

    loop {
        platform.poll_events();
        match next_step(platform.should_close(), renderer.frames_rendered(), max_frames) {
            Step::Render => renderer.render()?,
            Step::Stop(why) => {
                info!("{why}");
                break;
            }
        }
    }

    info!("rendered {} frames", renderer.frames_rendered());

    // surface must go before the window it was created for
    drop(renderer);
    platform.destroy_window();
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = load_config(&args.config)?;

    #[cfg(feature = "bake-shaders")]
    if args.bake_shaders {
        return bake_shaders(&cfg.render.shader_dir);
    }

    run(cfg, args.scene, args.max_frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let args = Args::try_parse_from(["nirvana"]).unwrap();
        assert_eq!(args.config, PathBuf::from("nirvana.toml"));
        assert_eq!(args.scene, None);
        assert_eq!(args.max_frames, None);
    }

    #[test]
    fn cli_scene_and_frame_limit() {
        let args =
            Args::try_parse_from(["nirvana", "--scene", "clear", "--max-frames", "10"]).unwrap();
        assert_eq!(args.scene, Some(CliScene::Clear));
        assert_eq!(args.max_frames, Some(10));
        assert!(Args::try_parse_from(["nirvana", "--scene", "cube"]).is_err());
    }

    #[test]
    fn cli_scene_maps_onto_config_scene() {
        assert_eq!(SceneKind::from(CliScene::Clear), SceneKind::Clear);
        assert_eq!(SceneKind::from(CliScene::Triangle), SceneKind::Triangle);
    }

    #[test]
    fn frame_limit() {
        assert!(!frame_limit_reached(1_000_000, None));
        assert!(!frame_limit_reached(2, Some(3)));
        assert!(frame_limit_reached(3, Some(3)));
    }

    #[test]
    fn zero_max_frames_never_renders() {
        assert_eq!(next_step(false, 0, Some(0)), Step::Stop("frame limit reached"));
    }

    #[test]
    fn loop_renders_until_limit_or_close() {
        assert_eq!(next_step(false, 0, None), Step::Render);
        assert_eq!(next_step(false, 2, Some(3)), Step::Render);
        assert_eq!(next_step(false, 3, Some(3)), Step::Stop("frame limit reached"));
        assert_eq!(next_step(true, 0, Some(5)), Step::Stop("close requested"));
    }

    #[test]
    fn clear_scene_needs_no_shaders() {
        let scene = load_scene(SceneKind::Clear, Path::new("/nonexistent")).unwrap();
        assert!(matches!(scene, Scene::Clear));
        assert_eq!(scene.default_clear_color(), [1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn missing_vertex_shader_fails_before_any_window() {
        let dir = std::env::temp_dir().join("nirvana-app-no-shaders");
        let err = load_scene(SceneKind::Triangle, &dir).unwrap_err();
        assert!(err.to_string().contains(VERTEX_SHADER_FILE));
    }
}
