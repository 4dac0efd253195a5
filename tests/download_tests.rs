//! Downloader tests against local sources: a git repository reached via
//! file://, a stand-in registry CLI script, and an unreachable npm URL

#![cfg(unix)]

mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use bundlegate::config::{PipelineConfig, ToolsConfig};
use bundlegate::hash::hash_directory;
use bundlegate::{BundleDownloader, BundleError, BundleReference, DownloadStrategy, Pipeline};
use common::{TestWorkspace, has_program, sample_bundle_files};
use serial_test::serial;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("Failed to run git");
    assert!(status.success(), "git {args:?} failed");
}

/// Repository holding the sample bundle, tagged `v1.0.0`
fn sample_repository(workspace: &TestWorkspace) -> PathBuf {
    let repo = workspace.bundle_dir("repo", "", &sample_bundle_files());
    git(&repo, &["init", "-q"]);
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-q", "-m", "Initial bundle"]);
    git(&repo, &["tag", "v1.0.0"]);
    repo
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        download_timeout_seconds: 60,
        kill_grace_period_millis: 200,
        ..PipelineConfig::default()
    }
}

#[test]
fn test_git_acquire_validates_and_cleans_up() {
    if !has_program("git") {
        eprintln!("git not available, skipping");
        return;
    }
    let workspace = TestWorkspace::new();
    let repo = sample_repository(&workspace);
    let reference = BundleReference::new(file_url(&repo), "v1.0.0").unwrap();
    assert_eq!(reference.strategy(), DownloadStrategy::Git);

    let acquired = Pipeline::new(fast_config()).unwrap().acquire(&reference).unwrap();
    assert_eq!(acquired.inspected().components.len(), 4);

    let downloaded = acquired.downloaded().unwrap();
    let path = downloaded.path().to_path_buf();
    assert_eq!(downloaded.strategy(), DownloadStrategy::Git);
    // `.git/` is left out of the digest
    assert_eq!(downloaded.digest(), hash_directory(&repo).unwrap());
    assert!(path.join("descriptor.yaml").is_file());

    acquired.close().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_git_list_tags() {
    if !has_program("git") {
        eprintln!("git not available, skipping");
        return;
    }
    let workspace = TestWorkspace::new();
    let repo = sample_repository(&workspace);
    let downloader = BundleDownloader::new(fast_config()).unwrap();
    assert_eq!(downloader.list_tags(&file_url(&repo)).unwrap(), vec!["v1.0.0"]);
}

#[test]
fn test_git_unknown_tag_is_a_download_failure() {
    if !has_program("git") {
        eprintln!("git not available, skipping");
        return;
    }
    let workspace = TestWorkspace::new();
    let repo = sample_repository(&workspace);
    let reference = BundleReference::new(file_url(&repo), "v9.9.9").unwrap();
    let err = BundleDownloader::new(fast_config())
        .unwrap()
        .download(&reference)
        .unwrap_err();
    assert!(matches!(err, BundleError::DownloadFailed { .. }));
    assert!(err.to_string().contains("git clone"));
}

#[test]
fn test_dropping_download_removes_directory() {
    if !has_program("git") {
        eprintln!("git not available, skipping");
        return;
    }
    let workspace = TestWorkspace::new();
    let repo = sample_repository(&workspace);
    let reference = BundleReference::new(file_url(&repo), "").unwrap();
    let downloaded = BundleDownloader::new(fast_config())
        .unwrap()
        .download(&reference)
        .unwrap();
    let path = downloaded.path().to_path_buf();
    assert!(path.is_dir());
    drop(downloaded);
    assert!(!path.exists());
}

/// Stand-in registry CLI: the first export fails, later ones pack `fixture`
fn fake_registry(workspace: &TestWorkspace, fixture: &Path) -> PathBuf {
    let state = workspace.path.join("export-attempts");
    let script = format!(
        r#"#!/bin/sh
case "$1" in
  export)
    count=$(cat "{state}" 2>/dev/null || echo 0)
    count=$((count + 1))
    echo "$count" > "{state}"
    if [ "$count" -lt 2 ]; then exit 1; fi
    tar -cf "$3" -C "{fixture}" .
    ;;
  ls)
    echo 1.0.0
    echo 1.1.0
    ;;
  *)
    exit 2
    ;;
esac
"#,
        state = state.display(),
        fixture = fixture.display(),
    );
    let path = workspace.write_file("fake-crane", &script);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn registry_config(registry: &Path, retries: u32) -> PipelineConfig {
    PipelineConfig {
        download_retries: retries,
        tools: ToolsConfig {
            registry: registry.display().to_string(),
            ..ToolsConfig::default()
        },
        ..fast_config()
    }
}

#[test]
#[serial]
fn test_docker_export_is_retried() {
    let workspace = TestWorkspace::new();
    let fixture = workspace.bundle_dir("image-fs", "", &sample_bundle_files());
    let registry = fake_registry(&workspace, &fixture);
    let reference = BundleReference::new("docker://registry.local/acme/demo-bundle", "1.0.0").unwrap();

    let acquired = Pipeline::new(registry_config(&registry, 3))
        .unwrap()
        .acquire(&reference)
        .unwrap();
    assert_eq!(acquired.downloaded().unwrap().strategy(), DownloadStrategy::Docker);
    assert_eq!(acquired.inspected().components.len(), 4);
    assert_eq!(
        std::fs::read_to_string(workspace.path.join("export-attempts"))
            .unwrap()
            .trim(),
        "2"
    );
    acquired.close().unwrap();
}

#[test]
#[serial]
fn test_docker_export_gives_up_after_retries() {
    let workspace = TestWorkspace::new();
    let fixture = workspace.bundle_dir("image-fs", "", &sample_bundle_files());
    let registry = fake_registry(&workspace, &fixture);
    let reference = BundleReference::new("docker://registry.local/acme/demo-bundle", "1.0.0").unwrap();

    let err = BundleDownloader::new(registry_config(&registry, 1))
        .unwrap()
        .download(&reference)
        .unwrap_err();
    assert!(err.to_string().contains("image export"));
}

#[test]
#[serial]
fn test_docker_image_without_descriptor_fails() {
    let workspace = TestWorkspace::new();
    let fixture = workspace.bundle_dir("image-fs", "", &[("readme.md", "not a bundle")]);
    let registry = fake_registry(&workspace, &fixture);
    let reference = BundleReference::new("docker://registry.local/acme/demo-bundle", "1.0.0").unwrap();

    let err = BundleDownloader::new(registry_config(&registry, 3))
        .unwrap()
        .download(&reference)
        .unwrap_err();
    assert!(matches!(err, BundleError::DownloadFailed { .. }));
    assert!(err.to_string().contains("descriptor.yaml"));
}

#[test]
#[serial]
fn test_docker_list_tags() {
    let workspace = TestWorkspace::new();
    let fixture = workspace.bundle_dir("image-fs", "", &sample_bundle_files());
    let registry = fake_registry(&workspace, &fixture);

    let tags = BundleDownloader::new(registry_config(&registry, 3))
        .unwrap()
        .list_tags("docker://registry.local/acme/demo-bundle")
        .unwrap();
    assert_eq!(tags, vec!["1.0.0", "1.1.0"]);
}

#[test]
fn test_docker_invalid_reference_is_not_downloaded() {
    let reference = BundleReference::new("docker://registry.local/", "1.0.0").unwrap();
    let err = BundleDownloader::new(fast_config())
        .unwrap()
        .download(&reference)
        .unwrap_err();
    assert!(matches!(err, BundleError::InvalidImageReference { .. }));
}

#[test]
fn test_npm_unreachable_registry() {
    let reference =
        BundleReference::new("http://127.0.0.1:9/demo/-/demo-1.0.0.tgz", "").unwrap();
    assert_eq!(reference.strategy(), DownloadStrategy::Npm);
    let err = BundleDownloader::new(fast_config())
        .unwrap()
        .download(&reference)
        .unwrap_err();
    assert!(matches!(err, BundleError::DownloadFailed { .. }));
}

/// Serve `body` as JSON to a single request, returning the base URL
fn serve_json_once(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let read = stream.read(&mut buf).unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
    });
    format!("http://{address}")
}

#[test]
fn test_npm_list_tags_reads_package_document() {
    let base = serve_json_once(r#"{"name":"demo","versions":{"1.0.0":{},"1.1.0":{}}}"#);
    let tags = BundleDownloader::new(fast_config())
        .unwrap()
        .list_tags(&format!("{base}/demo/-/demo-1.0.0.tgz"))
        .unwrap();
    assert_eq!(tags, vec!["1.0.0", "1.1.0"]);
}
