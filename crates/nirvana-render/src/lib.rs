// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

/// What gets drawn every frame.
#[derive(Clone, Debug)]
pub enum Scene {
    /// Transfer-clear the acquired image to the clear colour; no pipeline.
    Clear,
    /// Draw three vertices with the given SPIR-V stages (positions live in the vertex shader).
    Triangle { vertex: Vec<u32>, fragment: Vec<u32> },
}

impl Scene {
    pub fn default_clear_color(&self) -> [f32; 4] {
        match self {
            Scene::Clear => [1.0, 0.0, 1.0, 1.0],
            Scene::Triangle { .. } => [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub size: RenderSize,
    pub scene: Scene,
    /// Debug layers to try, in order of preference. Ignored in release builds.
    pub debug_layers: Vec<String>,
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        settings: RenderSettings,
    ) -> Result<Self>
    where
        Self: Sized;

    fn render(&mut self) -> Result<()>;
    fn set_clear_color(&mut self, rgba: [f32; 4]);
    fn frames_rendered(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_scene_has_its_own_clear_color() {
        assert_eq!(Scene::Clear.default_clear_color(), [1.0, 0.0, 1.0, 1.0]);
        let tri = Scene::Triangle {
            vertex: Vec::new(),
            fragment: Vec::new(),
        };
        assert_eq!(tri.default_clear_color(), [0.0, 0.0, 0.0, 1.0]);
    }
}
