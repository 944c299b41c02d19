use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn shaderlab(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shaderlab"))
        .args(args)
        .env("SHADERLAB_CONFIG_DIR", root.join("config"))
        .env("SHADERLAB_DATA_DIR", root.join("data"))
        .env("SHADERLAB_CACHE_DIR", root.join("cache"))
        .env_remove("SHADERLAB_CONFIG")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run shaderlab")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn list_prints_builtin_shaders_in_catalog_order() {
    let root = TempDir::new().unwrap();
    let output = shaderlab(root.path(), &["list"]);
    assert!(output.status.success(), "{output:?}");

    let listing = stdout(&output);
    let ids: Vec<_> = listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    for id in ["gradient", "ripple", "plasma", "texture-fx", "julia"] {
        assert!(ids.contains(&id), "missing {id} in {listing}");
    }
}

#[test]
fn list_skips_invalid_packs() {
    let root = TempDir::new().unwrap();
    let broken = root.path().join("data/shaders/broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("shader.toml"), "name = \n").unwrap();

    let output = shaderlab(root.path(), &["list"]);
    assert!(output.status.success(), "{output:?}");
    assert!(!stdout(&output).contains("broken"));
}

#[test]
fn export_settings_writes_default_values() {
    let root = TempDir::new().unwrap();
    let target = root.path().join("out/gradient-config.json");
    let output = shaderlab(
        root.path(),
        &[
            "export",
            "gradient",
            "--format",
            "settings",
            "--output",
            target.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "{output:?}");

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(json["shaderId"], "gradient");
    assert_eq!(json["uniformValues"]["uColor1"], "#ff6b6b");
}

#[test]
fn export_of_unknown_shader_fails() {
    let root = TempDir::new().unwrap();
    let output = shaderlab(root.path(), &["export", "does-not-exist"]);
    assert!(!output.status.success());
}

#[test]
fn presets_list_on_fresh_install_is_empty() {
    let root = TempDir::new().unwrap();
    let output = shaderlab(root.path(), &["presets", "list"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout(&output).trim(), "no presets saved");
}
