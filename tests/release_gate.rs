// SPDX-License-Identifier: MIT OR Apache-2.0
//! Version and dependency-graph gates that must hold before a release tag
//! is cut.

use std::fs;
use std::path::Path;

fn workspace_doc() -> toml::Value {
    let manifest = fs::read_to_string(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"),
    )
    .expect("read workspace Cargo.toml");
    manifest.parse().expect("parse workspace Cargo.toml")
}

fn workspace_members() -> Vec<String> {
    workspace_doc()["workspace"]["members"]
        .as_array()
        .expect("workspace.members")
        .iter()
        .map(|m| m.as_str().expect("member is a string").to_string())
        .collect()
}

#[test]
fn explicit_member_versions_match_the_workspace_version() {
    let doc = workspace_doc();
    let ws_version = doc["workspace"]["package"]["version"]
        .as_str()
        .expect("workspace.package.version");

    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    for member in workspace_members() {
        let manifest_path = root.join(&member).join("Cargo.toml");
        let content = fs::read_to_string(&manifest_path)
            .unwrap_or_else(|_| panic!("read {}", manifest_path.display()));
        let member_doc: toml::Value = content
            .parse()
            .unwrap_or_else(|_| panic!("parse {}", manifest_path.display()));

        if let Some(explicit) = member_doc["package"].get("version").and_then(|v| v.as_str()) {
            assert_eq!(
                explicit, ws_version,
                "{member} pins an explicit version that has drifted from the workspace version"
            );
        }
    }
}

#[test]
fn no_member_path_dependency_escapes_the_workspace_tree() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    for member in workspace_members() {
        let manifest_path = root.join(&member).join("Cargo.toml");
        let content = fs::read_to_string(&manifest_path)
            .unwrap_or_else(|_| panic!("read {}", manifest_path.display()));
        let doc: toml::Value = content
            .parse()
            .unwrap_or_else(|_| panic!("parse {}", manifest_path.display()));

        for table_name in ["dependencies", "dev-dependencies"] {
            let Some(table) = doc.get(table_name).and_then(|t| t.as_table()) else {
                continue;
            };
            for (dep, spec) in table {
                let Some(path) = spec.get("path").and_then(|p| p.as_str()) else {
                    continue;
                };
                let resolved = root.join(&member).join(path);
                assert!(
                    resolved.exists(),
                    "{member}: path dependency {dep} resolves to a nonexistent directory ({path})"
                );
            }
        }
    }
}

#[test]
fn workspace_version_is_not_a_prerelease() {
    let doc = workspace_doc();
    let version = doc["workspace"]["package"]["version"]
        .as_str()
        .expect("workspace.package.version");
    assert!(
        !version.contains('-'),
        "release gate requires a stable semver, got {version}"
    );
}
