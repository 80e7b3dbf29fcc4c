#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;
use tml_build::core::Manifest;
use zip::ZipArchive;

/// Stands in for CMake: records the ABI at configure time and writes the
/// libraries listed in FAKE_CMAKE_LIBS at build time.
const FAKE_CMAKE: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "cmake version 3.22.1"
    exit 0
fi
if [ "$1" = "--build" ]; then
    if [ "$3" = "--target" ]; then
        if [ "$FAKE_CMAKE_FAIL_CLEAN" = "1" ]; then
            exit 3
        fi
        rm -f ./*.so
        exit 0
    fi
    if [ "$FAKE_CMAKE_FAIL_BUILD" = "1" ]; then
        exit 2
    fi
    abi=$(cat abi.txt)
    for lib in ${FAKE_CMAKE_LIBS:-libpkg.so}; do
        case " $FAKE_CMAKE_SKIP " in
            *" $abi:$lib "*) continue ;;
        esac
        echo "$lib for $abi" > "$lib"
    done
    exit 0
fi
for arg in "$@"; do
    case "$arg" in
        -DANDROID_ABI=*) echo "${arg#-DANDROID_ABI=}" > abi.txt ;;
    esac
done
echo "configured" > CMakeCache.txt
exit 0
"#;

/// Written once per test binary so no test executes a file another thread
/// still has open for writing.
fn fake_cmake() -> &'static Path {
    static FAKE: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
    let (_, path) = FAKE.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cmake");
        fs::write(&path, FAKE_CMAKE).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    });
    path
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(manifest: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("CMakeLists.txt"), "add_library(pkg SHARED main.cpp)\n").unwrap();
        fs::write(source.join("package.yaml"), manifest).unwrap();
        fs::write(dir.path().join("tml.toolchain.cmake"), "").unwrap();
        Self { dir }
    }

    fn source(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("package.tbp")
    }

    fn command(&self) -> Command {
        self.command_with_tool(fake_cmake())
    }

    fn command_with_tool(&self, tool: &Path) -> Command {
        let mut cmd = Command::cargo_bin("tml-build").unwrap();
        cmd.arg("--path")
            .arg(self.source())
            .arg("--build-dir")
            .arg(self.dir.path().join("build"))
            .arg("--toolchain")
            .arg(self.dir.path().join("tml.toolchain.cmake"))
            .arg("--cmake")
            .arg(tool)
            .env_remove("FAKE_CMAKE_LIBS")
            .env_remove("FAKE_CMAKE_SKIP")
            .env_remove("FAKE_CMAKE_FAIL_BUILD")
            .env_remove("FAKE_CMAKE_FAIL_CLEAN");
        cmd
    }

    fn command_with_output(&self) -> Command {
        let mut cmd = self.command();
        cmd.arg("--out").arg(self.output());
        cmd
    }
}

fn entry_names(archive: &Path) -> Vec<String> {
    let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

fn packaged_manifest(archive: &Path) -> (Manifest, String) {
    let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut yaml = String::new();
    zip.by_name("package.yaml")
        .unwrap()
        .read_to_string(&mut yaml)
        .unwrap();
    (serde_yaml::from_str(&yaml).unwrap(), yaml)
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("tml-build").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--build-dir"));
}

#[test]
fn test_minimal_package_end_to_end() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\n");

    fixture
        .command_with_output()
        .assert()
        .success()
        .stdout(predicate::str::contains("- Compiling for armeabi-v7a"))
        .stdout(predicate::str::contains("- Compiling for x86"))
        .stdout(predicate::str::contains("- Packaging"));

    let names = entry_names(&fixture.output());
    assert_eq!(names[0], "package.yaml");
    assert!(names.contains(&"native/armeabi-v7a/libpkg.so".to_string()));
    assert!(names.contains(&"native/x86/libpkg.so".to_string()));

    let (manifest, _) = packaged_manifest(&fixture.output());
    let code = manifest.code.unwrap();
    assert_eq!(code.len(), 1);
    assert_eq!(code[0].name, "pkg");
    assert_eq!(code[0].loader, "native");
}

#[test]
fn test_missing_id_fails_without_archive() {
    let fixture = Fixture::new("version: \"1.0\"\n");

    fixture
        .command_with_output()
        .assert()
        .code(1)
        .stdout(predicate::str::contains("No package id specified in package.yaml"));

    assert!(!fixture.output().exists());
}

#[test]
fn test_invalid_version_fails() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0-beta\"\n");

    fixture
        .command_with_output()
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Invalid package version in package.yaml"));

    assert!(!fixture.output().exists());
}

#[test]
fn test_missing_native_build_file_fails() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\n");
    fs::remove_file(fixture.source().join("CMakeLists.txt")).unwrap();

    fixture
        .command_with_output()
        .assert()
        .code(1)
        .stdout(predicate::str::contains("CMakeLists.txt not found in the source directory"));
}

#[test]
fn test_missing_manifest_fails() {
    let fixture = Fixture::new("");
    fs::remove_file(fixture.source().join("package.yaml")).unwrap();

    fixture
        .command_with_output()
        .assert()
        .code(1)
        .stdout(predicate::str::contains("package.yaml not found in the source directory"));
}

#[test]
fn test_unknown_property_is_dropped_with_warning() {
    let fixture = Fixture::new("id: pkg\nversion: 1\nauthor: 7\nwebsite: example.com\n");

    fixture
        .command_with_output()
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Property \"website\" is not recognized in package.yaml",
        ));

    let (manifest, yaml) = packaged_manifest(&fixture.output());
    assert!(!yaml.contains("website"));
    assert_eq!(manifest.version, "1");
    assert_eq!(manifest.author.as_deref(), Some("7"));
}

#[test]
fn test_invalid_code_entry_fails() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\ncode:\n  - path: libpkg.so\n");

    fixture
        .command_with_output()
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Invalid code entry in package.yaml (no loader name or file path)",
        ));
}

#[test]
fn test_library_missing_for_one_architecture_warns() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\n");

    fixture
        .command_with_output()
        .env("FAKE_CMAKE_LIBS", "libpkg.so libarmonly.so")
        .env("FAKE_CMAKE_SKIP", "x86:libarmonly.so")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Library \"libarmonly.so\" is not compiled for the X86 architecture",
        ));

    let names = entry_names(&fixture.output());
    assert!(names.contains(&"native/armeabi-v7a/libarmonly.so".to_string()));
    assert!(!names.contains(&"native/x86/libarmonly.so".to_string()));

    let (manifest, _) = packaged_manifest(&fixture.output());
    let code: Vec<String> = manifest.code.unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(code, vec!["armonly", "pkg"]);
}

#[test]
fn test_declared_code_is_kept() {
    let fixture = Fixture::new(
        "id: pkg\nversion: \"1.0\"\ncode:\n  - loader: native\n    path: core\n",
    );

    fixture.command_with_output().assert().success();

    let (manifest, _) = packaged_manifest(&fixture.output());
    let code = manifest.code.unwrap();
    assert_eq!(code.len(), 1);
    assert_eq!(code[0].name, "core");
    assert_eq!(code[0].loader, "native");
}

#[test]
fn test_output_directory_uses_package_id() {
    let fixture = Fixture::new("id: com.example.pkg\nversion: \"2.0.1\"\n");
    let out_dir = fixture.dir.path().join("dist");
    fs::create_dir_all(&out_dir).unwrap();

    fixture.command().arg("--out").arg(&out_dir).assert().success();

    assert!(out_dir.join("com.example.pkg.tbp").is_file());
}

#[test]
fn test_asset_directories_are_copied() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\n");
    let assets = fixture.source().join("assets").join("gui");
    fs::create_dir_all(&assets).unwrap();
    fs::write(assets.join("button.png"), "png").unwrap();
    let resources = fixture.source().join("resource_pack");
    fs::create_dir_all(&resources).unwrap();
    fs::write(resources.join("manifest.json"), "{}").unwrap();

    fixture.command_with_output().assert().success();

    let names = entry_names(&fixture.output());
    assert!(names.contains(&"assets/gui/button.png".to_string()));
    assert!(names.contains(&"resource_pack/manifest.json".to_string()));
}

#[test]
fn test_compile_failure_is_fatal() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\n");

    fixture
        .command_with_output()
        .env("FAKE_CMAKE_FAIL_BUILD", "1")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Failed to compile"));

    assert!(!fixture.output().exists());
}

#[test]
fn test_missing_build_tool_is_fatal() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\n");

    fixture
        .command_with_tool(&fixture.dir.path().join("no-such-cmake"))
        .arg("--out")
        .arg(fixture.output())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("CMake not found"));
}

#[test]
fn test_missing_toolchain_is_fatal() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\n");
    fs::remove_file(fixture.dir.path().join("tml.toolchain.cmake")).unwrap();

    fixture
        .command_with_output()
        .assert()
        .code(1)
        .stdout(predicate::str::contains("TML CMake toolchain not found"));
}

#[test]
fn test_stale_libraries_are_cleaned_between_runs() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\n");

    fixture
        .command_with_output()
        .env("FAKE_CMAKE_LIBS", "libold.so libpkg.so")
        .assert()
        .success();
    assert!(entry_names(&fixture.output()).contains(&"native/x86/libold.so".to_string()));

    fixture.command_with_output().assert().success();

    let names = entry_names(&fixture.output());
    assert!(!names.iter().any(|name| name.contains("libold.so")));
    assert!(names.contains(&"native/x86/libpkg.so".to_string()));
}

#[test]
fn test_failed_clean_only_warns() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\n");

    fixture.command_with_output().assert().success();

    fixture
        .command_with_output()
        .env("FAKE_CMAKE_FAIL_CLEAN", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Failed to clean stale build outputs"))
        .stdout(predicate::str::contains("- Packaging"));

    assert!(entry_names(&fixture.output()).contains(&"native/x86/libpkg.so".to_string()));
}

#[test]
fn test_relative_build_tool_path() {
    let fixture = Fixture::new("id: pkg\nversion: \"1.0\"\n");
    let tools = fixture.dir.path().join("tools");
    fs::create_dir_all(&tools).unwrap();
    symlink(fake_cmake(), tools.join("cmake")).unwrap();

    fixture
        .command_with_tool(Path::new("./tools/cmake"))
        .current_dir(fixture.dir.path())
        .arg("--out")
        .arg(fixture.output())
        .assert()
        .success();

    let names = entry_names(&fixture.output());
    assert!(names.contains(&"native/armeabi-v7a/libpkg.so".to_string()));
    assert!(names.contains(&"native/x86/libpkg.so".to_string()));
}
