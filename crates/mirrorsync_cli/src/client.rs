//! File-backed stand-in for the catalog HTTP API.

use async_trait::async_trait;
use mirrorsync_engine::HttpClient;
use std::path::PathBuf;
use tracing::debug;

/// Serves `GET {base_url}/<path>` from `<root>/<path>.json`.
///
/// Lets the CLI mirror a catalog exported to disk, or a directory that
/// another process keeps up to date.
#[derive(Debug, Clone)]
pub struct StaticDirClient {
    base_url: String,
    root: PathBuf,
}

impl StaticDirClient {
    /// Creates a client serving URLs below `base_url` from `root`.
    pub fn new(base_url: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            root: root.into(),
        }
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, String> {
        let path = url
            .strip_prefix(&self.base_url)
            .ok_or_else(|| format!("{url} is outside {}", self.base_url))?
            .trim_matches('/');

        if path.is_empty() || path.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
            return Err(format!("invalid path in {url}"));
        }
        Ok(self.root.join(format!("{path}.json")))
    }
}

#[async_trait]
impl HttpClient for StaticDirClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, String> {
        let path = self.resolve(url)?;
        debug!(url, path = %path.display(), "serving from directory");
        tokio::fs::read(&path)
            .await
            .map_err(|e| format!("{}: {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn resolves_below_root() {
        let client = StaticDirClient::new("http://localhost:3000/", "/data");
        assert_eq!(
            client.resolve("http://localhost:3000/api/cities").unwrap(),
            Path::new("/data/api/cities.json")
        );
    }

    #[test]
    fn rejects_foreign_and_escaping_urls() {
        let client = StaticDirClient::new("http://localhost:3000", "/data");
        assert!(client.resolve("http://elsewhere/api/cities").is_err());
        assert!(client.resolve("http://localhost:3000/../etc/passwd").is_err());
        assert!(client.resolve("http://localhost:3000/").is_err());
    }

    #[tokio::test]
    async fn reads_file() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("api")).unwrap();
        fs::write(dir.path().join("api/countries.json"), b"[]").unwrap();

        let client = StaticDirClient::new("http://localhost:3000", dir.path());
        let body = client.get("http://localhost:3000/api/countries").await.unwrap();
        assert_eq!(body, b"[]");

        let missing = client.get("http://localhost:3000/api/cities").await;
        assert!(missing.is_err());
    }
}
