// SPDX-License-Identifier: CEPL-1.0
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(feature = "bake-shaders")]
    bake::compile();
}

#[cfg(feature = "bake-shaders")]
mod bake {
    use std::{env, fs, path::PathBuf};

    const STAGES: [(&str, shaderc::ShaderKind, &str); 2] = [
        ("shader.vert", shaderc::ShaderKind::Vertex, "vert.spv"),
        ("shader.frag", shaderc::ShaderKind::Fragment, "frag.spv"),
    ];

    pub fn compile() {
        let out = PathBuf::from(env::var("OUT_DIR").unwrap());
        let src_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap()).join("../../Shaders");

        let comp = shaderc::Compiler::new().unwrap();
        let mut opts = shaderc::CompileOptions::new().unwrap();

        // The renderer asks for a 1.1 instance; 1.0 SPIR-V runs on it.
        opts.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_0 as u32,
        );
        opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

        for (src_name, kind, spv_name) in STAGES {
            let path = src_dir.join(src_name);
            println!("cargo:rerun-if-changed={}", path.display());

            let src = fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
            let spv = comp
                .compile_into_spirv(&src, kind, src_name, "main", Some(&opts))
                .unwrap_or_else(|e| panic!("compile {src_name}: {e}"));
            fs::write(out.join(spv_name), spv.as_binary_u8()).unwrap();
        }
    }
}
