// SPDX-License-Identifier: CEPL-1.0
use ash::util::read_spv;
use ash::vk;
use std::io::{self, Cursor};
use std::{fs, path::Path};
use tracing::debug;

use crate::error::{RenderError, RenderResult, VkResultExt};

pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Reads a SPIR-V binary into words. The byte length must be a multiple of 4
/// and the first word must be the SPIR-V magic number.
pub fn load_spirv(path: &Path) -> RenderResult<Vec<u32>> {
    let shader_err = |source| RenderError::ShaderLoad {
        path: path.to_owned(),
        source,
    };

    let bytes = fs::read(path).map_err(shader_err)?;
    let words = read_spv(&mut Cursor::new(&bytes[..])).map_err(shader_err)?;
    if words.first() != Some(&SPIRV_MAGIC) {
        return Err(shader_err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing SPIR-V magic number",
        )));
    }

    debug!("loaded {} ({} words)", path.display(), words.len());
    Ok(words)
}

pub(crate) unsafe fn create_shader_module(
    device: &ash::Device,
    code: &[u32],
) -> RenderResult<vk::ShaderModule> {
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: std::mem::size_of_val(code),
        ..Default::default()
    };
    device
        .create_shader_module(&ci, None)
        .init("create_shader_module")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "nirvana-shader-{}-{name}",
            std::process::id()
        ));
        fs::write(&path, bytes).unwrap();
        path
    }

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn missing_file_is_a_shader_load_error() {
        let path = std::env::temp_dir().join("nirvana-no-such-dir").join("vert.spv");
        match load_spirv(&path) {
            Err(RenderError::ShaderLoad { path: p, source }) => {
                assert_eq!(p, path);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn valid_blob_loads_as_words() {
        let words = [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
        let path = scratch("valid.spv", &words_to_bytes(&words));
        let loaded = load_spirv(&path).unwrap();
        assert_eq!(loaded, words);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn ragged_length_is_rejected() {
        let mut bytes = words_to_bytes(&[SPIRV_MAGIC, 0x0001_0000]);
        bytes.push(0);
        let path = scratch("ragged.spv", &bytes);
        assert!(matches!(
            load_spirv(&path),
            Err(RenderError::ShaderLoad { .. })
        ));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let path = scratch("glsl.spv", b"#version 450\nvoid m(");
        let err = load_spirv(&path).unwrap_err();
        assert!(err.to_string().contains("magic"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn empty_file_is_rejected() {
        let path = scratch("empty.spv", &[]);
        assert!(load_spirv(&path).is_err());
        let _ = fs::remove_file(path);
    }
}
