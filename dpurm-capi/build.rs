// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

use std::env;
use std::path::PathBuf;

const COPYRIGHT: &str = "// Copyright 2024 Google LLC\n// SPDX-License-Identifier: MIT";
const HEADER: &str = "dpurm.h";
const INCLUDE_GUARD: &str = "DPURM_H";

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let out_dir = env::var("OUT_DIR").unwrap();
    let out_path = PathBuf::from(out_dir).join(HEADER);

    // exported items already carry the dpurm_ prefix; enum variants get it from their type,
    // e.g. DPURM_LOG_LEVEL_OFF
    let config = cbindgen::Config {
        header: Some(COPYRIGHT.to_owned()),
        include_guard: Some(INCLUDE_GUARD.to_owned()),
        include_version: true,
        sys_includes: vec!["stdbool.h".to_owned(), "stdint.h".to_owned()],
        language: cbindgen::Language::C,
        cpp_compat: true,
        enumeration: cbindgen::EnumConfig {
            rename_variants: cbindgen::RenameRule::QualifiedScreamingSnakeCase,
            ..Default::default()
        },
        ..Default::default()
    };

    cbindgen::Builder::new()
        .with_crate(manifest_dir)
        .with_config(config)
        .generate()
        .expect("failed to generate bindings")
        .write_to_file(out_path);

    println!("cargo:rerun-if-changed=src");
}
