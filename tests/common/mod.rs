//! Common test utilities for bundlegate integration tests

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

/// Root descriptor of the sample bundle
pub const BUNDLE_DESCRIPTOR: &str = "\
descriptorVersion: v5
name: demo-bundle
type: standard-bundle
title: Demo bundle
components:
  plugins:
    - plugins/todo-ms.yaml
  widgets:
    - widgets/banner.yaml
  pages:
    - pages/home.yaml
  fragments:
    - fragments/footer.yaml
";

pub const PLUGIN_DESCRIPTOR: &str = "\
descriptorVersion: v5
image: docker.io/acme/todo-ms:1.0.0
dbms: postgresql
healthCheckPath: /api/health
name: todo-ms
deploymentBaseName: todo-ms
securityLevel: strict
environmentVariables:
  - name: LOG_LEVEL
    value: info
";

pub const WIDGET_DESCRIPTOR: &str = "\
descriptorVersion: v5
name: banner
type: widget
titles:
  en: Banner
  it: Banner
customUiPath: banner.ftl
";

pub const PAGE_DESCRIPTOR: &str = "\
code: home
parentCode: homepage
titles:
  en: Home
";

pub const FRAGMENT_DESCRIPTOR: &str = "\
code: footer
guiCode: <footer></footer>
";

/// Files of a complete, valid bundle (paths relative to the bundle root)
#[allow(dead_code)]
pub fn sample_bundle_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("descriptor.yaml", BUNDLE_DESCRIPTOR),
        ("plugins/todo-ms.yaml", PLUGIN_DESCRIPTOR),
        ("widgets/banner.yaml", WIDGET_DESCRIPTOR),
        ("pages/home.yaml", PAGE_DESCRIPTOR),
        ("fragments/footer.yaml", FRAGMENT_DESCRIPTOR),
        ("resources/static/css/app.css", "body { margin: 0; }"),
        ("resources/static/js/app.js", "console.log('demo');"),
        ("resources/logo.svg", "<svg/>"),
    ]
}

/// A scratch area for building bundle fixtures
pub struct TestWorkspace {
    #[allow(dead_code)]
    pub temp: TempDir,
    pub path: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().to_path_buf();
        Self { temp, path }
    }

    /// Write a file in workspace
    pub fn write_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    /// Write `files` under `<workspace>/<name>/<prefix>` and return `<workspace>/<name>`
    #[allow(dead_code)]
    pub fn bundle_dir(&self, name: &str, prefix: &str, files: &[(&str, &str)]) -> PathBuf {
        let root = self.path.join(name);
        std::fs::create_dir_all(&root).expect("Failed to create bundle directory");
        write_files(&root.join(prefix), files);
        root
    }

    /// Build a gzipped tarball with every entry under `prefix`
    #[allow(dead_code)]
    pub fn bundle_tgz(&self, name: &str, prefix: &str, files: &[(&str, &str)]) -> PathBuf {
        let path = self.path.join(name);
        write_tgz(&path, prefix, files);
        path
    }

    /// Build a zip archive with every entry under `prefix`
    #[allow(dead_code)]
    pub fn bundle_zip(&self, name: &str, prefix: &str, files: &[(&str, &str)]) -> PathBuf {
        let path = self.path.join(name);
        write_zip(&path, prefix, files);
        path
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
    }
}

fn entry_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), name)
    }
}

pub fn write_tgz(path: &Path, prefix: &str, files: &[(&str, &str)]) {
    let file = File::create(path).expect("Failed to create tarball");
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, entry_name(prefix, name), content.as_bytes())
            .expect("Failed to append tar entry");
    }
    builder
        .into_inner()
        .expect("Failed to finish tarball")
        .finish()
        .expect("Failed to finish gzip stream");
}

pub fn write_zip(path: &Path, prefix: &str, files: &[(&str, &str)]) {
    let file = File::create(path).expect("Failed to create zip");
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in files {
        writer
            .start_file(entry_name(prefix, name), options)
            .expect("Failed to start zip entry");
        writer
            .write_all(content.as_bytes())
            .expect("Failed to write zip entry");
    }
    writer.finish().expect("Failed to finish zip");
}

/// Whether an executable named `program` can be started
#[allow(dead_code)]
pub fn has_program(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok()
}
