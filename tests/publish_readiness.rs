// SPDX-License-Identifier: MIT OR Apache-2.0
//! Checks that every publishable workspace member carries the manifest
//! fields and accompanying files `cargo publish` and crates.io expect.

use std::fs;
use std::path::Path;

fn workspace_members() -> Vec<String> {
    let manifest = fs::read_to_string(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"),
    )
    .expect("read workspace Cargo.toml");
    let doc: toml::Value = manifest.parse().expect("parse workspace Cargo.toml");
    doc["workspace"]["members"]
        .as_array()
        .expect("workspace.members")
        .iter()
        .map(|m| m.as_str().expect("member is a string").to_string())
        .collect()
}

#[test]
fn every_member_has_a_readme() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    for member in workspace_members() {
        let readme = root.join(&member).join("README.md");
        assert!(readme.exists(), "{member} is missing README.md");
    }
}

#[test]
fn every_member_inherits_license_and_edition() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    for member in workspace_members() {
        let manifest_path = root.join(&member).join("Cargo.toml");
        let content = fs::read_to_string(&manifest_path)
            .unwrap_or_else(|_| panic!("read {}", manifest_path.display()));
        let doc: toml::Value = content
            .parse()
            .unwrap_or_else(|_| panic!("parse {}", manifest_path.display()));
        let pkg = &doc["package"];

        for field in ["version", "edition", "license"] {
            assert!(
                pkg.get(field).is_some(),
                "{member}: package.{field} must be present (directly or via workspace = true)"
            );
        }
    }
}

#[test]
fn root_package_declares_a_license() {
    let manifest = fs::read_to_string(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"),
    )
    .expect("read workspace Cargo.toml");
    let doc: toml::Value = manifest.parse().expect("parse workspace Cargo.toml");
    assert!(
        doc["workspace"]["package"].get("license").is_some(),
        "workspace.package.license must be set so every inheriting member publishes cleanly"
    );
}
