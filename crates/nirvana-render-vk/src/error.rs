// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use std::{io, path::PathBuf};
use thiserror::Error;

use crate::frame::FramePhase;

/// Every way the renderer can fail. None of these are recovered from.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unsupported configuration: {0}")]
    Configuration(String),

    #[error("{what} failed: {result}")]
    Initialization {
        what: &'static str,
        result: vk::Result,
    },

    #[error("no physical device supports graphics, presentation to this surface and swapchains")]
    NoCompatibleDevice,

    #[error("could not load shader {path}: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{stage} failed: {result}")]
    Frame {
        stage: &'static str,
        result: vk::Result,
    },

    #[error("frame step out of order: {from:?} -> {to:?}")]
    FrameOrder { from: FramePhase, to: FramePhase },
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Tags a raw `vk::Result` with the step that produced it.
pub(crate) trait VkResultExt<T> {
    fn init(self, what: &'static str) -> RenderResult<T>;
    fn frame(self, stage: &'static str) -> RenderResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    fn init(self, what: &'static str) -> RenderResult<T> {
        self.map_err(|result| RenderError::Initialization { what, result })
    }

    fn frame(self, stage: &'static str) -> RenderResult<T> {
        self.map_err(|result| RenderError::Frame { stage, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tags_the_failing_step() {
        let r: Result<(), vk::Result> = Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        match r.init("create_render_pass") {
            Err(RenderError::Initialization { what, result }) => {
                assert_eq!(what, "create_render_pass");
                assert_eq!(result, vk::Result::ERROR_OUT_OF_HOST_MEMORY);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn frame_errors_name_the_stage() {
        let r: Result<u32, vk::Result> = Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        let err = r.frame("acquire_next_image").unwrap_err();
        assert!(err.to_string().starts_with("acquire_next_image failed"));
    }
}
