//! Package-registry strategy
//!
//! Fetches an npm-style tarball over HTTP and unpacks it with the
//! conventional `package/` wrapper folder stripped.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info};

use super::{BundleReference, DownloadContext};
use crate::archive::unpack_tar_gz;
use crate::error::{Result, cause_chain, download_failed};
use crate::hash::hash_file;

/// Some registries refuse clients that do not look like a browser
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Path marker separating the package document from its tarballs
const TARBALL_MARKER: &str = "/-/";

fn http_client(timeout: Duration) -> std::result::Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
}

/// Download the tarball and unpack it into the context target
pub(crate) fn download(ctx: &DownloadContext<'_>, reference: &BundleReference) -> Result<()> {
    let label = reference.to_string();
    let url = reference.source_url();
    let failed = |e: &(dyn std::error::Error + 'static)| download_failed(&label, cause_chain(e));

    let client = http_client(ctx.config.download_timeout()).map_err(|e| failed(&e))?;
    let mut response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| failed(&e))?;

    let mut tarball = tempfile::Builder::new()
        .prefix("package-")
        .suffix(".tgz")
        .tempfile_in(ctx.work_dir)
        .map_err(|e| failed(&e))?;
    let bytes = response.copy_to(tarball.as_file_mut()).map_err(|e| failed(&e))?;
    let digest = hash_file(tarball.path())?;
    debug!(url, bytes, digest = %digest, "Fetched tarball");

    ctx.reset_target(true)?;
    let files = unpack_tar_gz(tarball.path(), ctx.target, 1)
        .map_err(|e| download_failed(&label, cause_chain(&e)))?;

    info!(reference = %label, files, "Unpacked package tarball");
    Ok(())
}

/// Published versions from the registry package document
pub(crate) fn list_tags(ctx: &DownloadContext<'_>, url: &str) -> Result<Vec<String>> {
    let failed = |e: &(dyn std::error::Error + 'static)| download_failed(url, cause_chain(e));
    let document_url = package_document_url(url)
        .ok_or_else(|| download_failed(url, "cannot derive the package document URL"))?;

    let client = http_client(ctx.config.download_timeout()).map_err(|e| failed(&e))?;
    let response = client
        .get(&document_url)
        .header(ACCEPT, "application/json")
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| failed(&e))?;
    let document: Value = serde_json::from_reader(response).map_err(|e| failed(&e))?;

    let versions = document_versions(&document);
    debug!(url = %document_url, count = versions.len(), "Listed package versions");
    Ok(versions)
}

/// `<registry>/<pkg>/-/<file>.tgz` → `<registry>/<pkg>`
fn package_document_url(tarball_url: &str) -> Option<String> {
    tarball_url
        .find(TARBALL_MARKER)
        .map(|index| tarball_url[..index].to_string())
        .filter(|base| !base.is_empty())
}

fn document_versions(document: &Value) -> Vec<String> {
    document
        .get("versions")
        .and_then(Value::as_object)
        .map(|versions| versions.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_package_document_url() {
        assert_eq!(
            package_document_url("https://registry.npmjs.org/demo/-/demo-1.0.0.tgz").as_deref(),
            Some("https://registry.npmjs.org/demo")
        );
        assert_eq!(
            package_document_url("https://npm.example.com/@scope/demo/-/demo-2.0.0.tgz").as_deref(),
            Some("https://npm.example.com/@scope/demo")
        );
        assert_eq!(package_document_url("https://example.com/demo.tgz"), None);
    }

    #[test]
    fn test_document_versions() {
        let document = json!({
            "name": "demo",
            "versions": { "1.0.0": {}, "1.1.0": {} }
        });
        assert_eq!(document_versions(&document), vec!["1.0.0", "1.1.0"]);
    }

    #[test]
    fn test_document_without_versions_is_empty() {
        assert!(document_versions(&json!({ "name": "demo" })).is_empty());
    }
}
