//! Source retrieval and GitHub URL plumbing.

use async_trait::async_trait;

use crate::errors::PatrolError;

/// Fetches the raw content of a candidate file. A trait so that worker logic
/// can be tested without the network.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, PatrolError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, PatrolError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PatrolError::Network(format!("GET {} failed: {}", url, e)))?;
        if !resp.status().is_success() {
            return Err(PatrolError::Network(format!(
                "GET {} returned {}",
                url,
                resp.status()
            )));
        }
        resp.text()
            .await
            .map_err(|e| PatrolError::Network(format!("Reading body from {} failed: {}", url, e)))
    }
}

/// Rewrite a `github.com/.../blob/<sha>/...` URL to its raw HEAD counterpart.
pub fn gh_url_to_raw(url: &str) -> String {
    let re = regex::Regex::new(r"blob/[a-fA-F0-9]+").unwrap();
    re.replace(url, "HEAD")
        .replace("github.com", "raw.githubusercontent.com")
}

/// Extract the in-repository file path (leading slash included) from a
/// HEAD-form URL.
pub fn gh_url_to_path(url: &str) -> Result<String, PatrolError> {
    const HEAD: &str = "/HEAD/";
    let idx = url
        .find(HEAD)
        .ok_or_else(|| PatrolError::InvalidValue(format!("no /HEAD/ segment in '{url}'")))?;
    Ok(url[idx + HEAD.len() - 1..].to_string())
}

/// Absolute path of the vulnerable file inside the sandbox checkout.
pub fn exec_path(app_root: &str, raw_url: &str) -> Result<String, PatrolError> {
    Ok(format!("{}{}", app_root, gh_url_to_path(raw_url)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOB_URL: &str =
        "https://github.com/acme/webapp/blob/0a1b2c3d4e5f/src/static/server.js";

    #[test]
    fn test_gh_url_to_raw() {
        assert_eq!(
            gh_url_to_raw(BLOB_URL),
            "https://raw.githubusercontent.com/acme/webapp/HEAD/src/static/server.js"
        );
    }

    #[test]
    fn test_gh_url_to_path() {
        let raw = gh_url_to_raw(BLOB_URL);
        assert_eq!(gh_url_to_path(&raw).unwrap(), "/src/static/server.js");
    }

    #[test]
    fn test_exec_path_prefixes_app_root() {
        let raw = gh_url_to_raw(BLOB_URL);
        assert_eq!(
            exec_path("/usr/src/app", &raw).unwrap(),
            "/usr/src/app/src/static/server.js"
        );
    }

    #[test]
    fn test_non_head_url_rejected() {
        assert!(gh_url_to_path(BLOB_URL).is_err());
    }
}
