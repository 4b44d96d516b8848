// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end readiness checks that span the workspace manifest, the
//! generated contract schemas, and the binary entry point.

use std::fs;
use std::path::Path;

#[test]
fn contract_schemas_are_present_and_parse() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    for name in ["odin_config.schema.json", "hel_policy.schema.json"] {
        let path = root.join("contracts/schemas").join(name);
        let content =
            fs::read_to_string(&path).unwrap_or_else(|_| panic!("read {}", path.display()));
        let value: serde_json::Value =
            serde_json::from_str(&content).unwrap_or_else(|_| panic!("parse {}", path.display()));
        assert!(
            value.get("$schema").is_some() || value.get("title").is_some(),
            "{name} does not look like a JSON Schema document"
        );
    }
}

#[test]
fn root_binary_target_exists() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    assert!(
        root.join("src/main.rs").exists(),
        "the root package must carry a src/main.rs binary target"
    );

    let manifest = fs::read_to_string(root.join("Cargo.toml")).expect("read workspace Cargo.toml");
    let doc: toml::Value = manifest.parse().expect("parse workspace Cargo.toml");
    let bins = doc["bin"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert!(
        !bins.is_empty(),
        "Cargo.toml must declare a [[bin]] target for the gateway binary"
    );
}

#[test]
fn readme_files_are_non_empty() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let manifest = fs::read_to_string(root.join("Cargo.toml")).expect("read workspace Cargo.toml");
    let doc: toml::Value = manifest.parse().expect("parse workspace Cargo.toml");
    let members = doc["workspace"]["members"]
        .as_array()
        .expect("workspace.members");

    for member in members {
        let member = member.as_str().expect("member is a string");
        let readme = root.join(member).join("README.md");
        let content =
            fs::read_to_string(&readme).unwrap_or_else(|_| panic!("read {}", readme.display()));
        assert!(
            content.trim().lines().count() >= 2,
            "{member}/README.md should describe the crate, not just a bare title"
        );
    }
}
