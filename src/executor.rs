//! Sends a site request and hands back the raw response.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use indexmap::IndexMap;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    multipart::{Form, Part},
    Client, Url,
};
use thiserror::Error;

use crate::{
    plugins::{run_plugin, PluginError},
    serde_types::{RequestType, SiteConfig},
    sniff::{sniff_mime_type, SniffError},
};

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("invalid request url `{url}`: `{source}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid header `{0}`")]
    InvalidHeader(String),
    #[error("failed to read payload `{path}`: `{source}`")]
    ReadPayload {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sniff error: `{0}`")]
    Sniff(#[from] SniffError),
    #[error("request error: `{0}`")]
    Request(#[from] reqwest::Error),
    #[error("plugin error: `{0}`")]
    Plugin(#[from] PluginError),
    #[error("GET file upload is not supported")]
    GetUpload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorResponse {
    Http {
        body: Vec<u8>,
        status: u16,
        final_url: String,
    },
    PluginOutput {
        body: String,
    },
}

impl ExecutorResponse {
    pub fn body(&self) -> &[u8] {
        match self {
            ExecutorResponse::Http { body, .. } => body,
            ExecutorResponse::PluginOutput { body } => body.as_bytes(),
        }
    }

    /// Where the request ended up after redirects. Plugins have none.
    pub fn final_url(&self) -> Option<&str> {
        match self {
            ExecutorResponse::Http { final_url, .. } => Some(final_url),
            ExecutorResponse::PluginOutput { .. } => None,
        }
    }
}

/// Base name of a payload path.
pub fn payload_filename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse `request_url` and set every argument as a query parameter,
/// replacing parameters of the same name already in the URL.
fn url_with_query(request_url: &str, arguments: &IndexMap<String, String>) -> Result<Url, ExecutorError> {
    let mut url = Url::parse(request_url).map_err(|source| ExecutorError::InvalidUrl {
        url: request_url.to_string(),
        source,
    })?;
    if arguments.is_empty() {
        return Ok(url);
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !arguments.contains_key(name.as_ref()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .extend_pairs(arguments.iter());
    Ok(url)
}

fn header_map(headers: &std::collections::HashMap<String, String>) -> Result<HeaderMap, ExecutorError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ExecutorError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| ExecutorError::InvalidHeader(name.clone()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

async fn read_payload(path: &Path) -> Result<Vec<u8>, ExecutorError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| ExecutorError::ReadPayload {
            path: path.display().to_string(),
            source,
        })
}

/// Runs site requests: HTTP through a shared client, plugins from a
/// directory.
#[derive(Debug, Clone)]
pub struct Executor {
    client: Client,
    plugins_dir: PathBuf,
    plugin_timeout: Duration,
}

impl Executor {
    pub fn new(client: Client, plugins_dir: impl Into<PathBuf>, plugin_timeout: Duration) -> Self {
        Self {
            client,
            plugins_dir: plugins_dir.into(),
            plugin_timeout,
        }
    }

    /// Send the request described by `site`, with an optional file payload.
    ///
    /// `site` must already have its input substituted.
    pub async fn execute(
        &self,
        site: &SiteConfig,
        payload: Option<&Path>,
    ) -> Result<ExecutorResponse, ExecutorError> {
        let builder = match site.request_type {
            RequestType::Plugin => {
                let body = run_plugin(
                    &self.plugins_dir,
                    &site.request_url,
                    &site.arguments,
                    self.plugin_timeout,
                )
                .await?;
                return Ok(ExecutorResponse::PluginOutput { body });
            }
            RequestType::Get => {
                if payload.is_some() {
                    return Err(ExecutorError::GetUpload);
                }
                let url = url_with_query(&site.request_url, &site.arguments)?;
                self.client.get(url)
            }
            RequestType::Put => {
                let url = url_with_query(&site.request_url, &site.arguments)?;
                let builder = self.client.put(url);
                match payload {
                    Some(path) => {
                        let mime_type = sniff_mime_type(path).await?;
                        builder
                            .header(CONTENT_TYPE, mime_type)
                            .body(read_payload(path).await?)
                    }
                    None => builder,
                }
            }
            RequestType::Post => {
                let url = Url::parse(&site.request_url).map_err(|source| ExecutorError::InvalidUrl {
                    url: site.request_url.clone(),
                    source,
                })?;
                let mut form = Form::new();
                if let (Some(field), Some(path)) = (site.file_form_name(), payload) {
                    let mime_type = sniff_mime_type(path).await?;
                    let part = Part::bytes(read_payload(path).await?)
                        .file_name(payload_filename(path))
                        .mime_str(&mime_type)?;
                    form = form.part(field.to_string(), part);
                }
                for (name, value) in &site.arguments {
                    form = form.text(name.clone(), value.clone());
                }
                self.client.post(url).multipart(form)
            }
        };

        let mut builder = builder.headers(header_map(&site.headers)?);
        if let Some((username, password)) = site.basic_auth() {
            builder = builder.basic_auth(username, Some(password));
        }

        debug!("Sending {} request to {}", site.request_type, site.name);
        let response = builder.send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            warn!("{} responded with {}", site.name, status);
        }
        let body = response.bytes().await?.to_vec();
        debug!(
            "Received {} bytes from {} (status {})",
            body.len(),
            final_url,
            status
        );

        Ok(ExecutorResponse::Http {
            body,
            status: status.as_u16(),
            final_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, test_util::spawn_server};
    use serde_json::Value;

    fn executor(plugins_dir: &Path) -> Executor {
        let client = crate::client_builder::build_client(&AppConfig::default()).unwrap();
        Executor::new(client, plugins_dir, Duration::from_secs(10))
    }

    fn site(request_type: RequestType, url: String) -> SiteConfig {
        SiteConfig {
            name: "test".to_string(),
            request_type,
            request_url: url,
            ..Default::default()
        }
    }

    fn echoed(response: &ExecutorResponse) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[test]
    fn test_url_with_query_replaces() {
        let mut arguments = IndexMap::new();
        arguments.insert("a".to_string(), "new value".to_string());
        arguments.insert("c".to_string(), "3".to_string());
        let url = url_with_query("https://x/api?a=old&b=2", &arguments).unwrap();
        assert_eq!(url.as_str(), "https://x/api?b=2&a=new+value&c=3");
        assert!(url_with_query("not a url", &arguments).is_err());
    }

    #[actix_web::test]
    async fn test_get_query() {
        let addr = spawn_server().await;
        let dir = tempfile::tempdir().unwrap();
        let mut site = site(RequestType::Get, format!("http://{addr}/shorten"));
        site.arguments
            .insert("url".to_string(), "https://example.com/a b".to_string());
        site.headers
            .insert("X-Api-Key".to_string(), "secret".to_string());

        let response = executor(dir.path()).execute(&site, None).await.unwrap();
        let echo = echoed(&response);
        assert_eq!(echo["method"], "GET");
        assert_eq!(echo["query"], "url=https%3A%2F%2Fexample.com%2Fa+b");
        assert_eq!(echo["headers"]["x-api-key"], "secret");
        assert_eq!(echo["body"], "");
    }

    #[tokio::test]
    async fn test_get_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hello").unwrap();
        let site = site(RequestType::Get, "http://127.0.0.1:1/".to_string());
        assert!(matches!(
            executor(dir.path()).execute(&site, Some(&file)).await,
            Err(ExecutorError::GetUpload)
        ));
    }

    #[actix_web::test]
    async fn test_post_multipart() {
        let addr = spawn_server().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.txt");
        std::fs::write(&file, "file contents").unwrap();
        let mut site = site(RequestType::Post, format!("http://{addr}/upload"));
        site.file_form_name = Some("file".to_string());
        site.arguments.insert("key".to_string(), "abc".to_string());
        site.username = Some("user".to_string());
        site.password = Some("pass".to_string());

        let response = executor(dir.path())
            .execute(&site, Some(&file))
            .await
            .unwrap();
        let echo = echoed(&response);
        assert_eq!(echo["method"], "POST");
        assert!(echo["headers"]["content-type"]
            .as_str()
            .unwrap()
            .starts_with("multipart/form-data; boundary="));
        assert_eq!(echo["headers"]["authorization"], "Basic dXNlcjpwYXNz");
        let body = echo["body"].as_str().unwrap();
        assert!(body.contains("name=\"file\"; filename=\"note.txt\""));
        assert!(body.contains("text/plain; charset=utf-8"));
        assert!(body.contains("file contents"));
        assert!(body.contains("name=\"key\""));
        assert!(body.contains("abc"));
    }

    #[actix_web::test]
    async fn test_put_raw_body() {
        let addr = spawn_server().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.txt");
        std::fs::write(&file, "raw contents").unwrap();
        let mut site = site(RequestType::Put, format!("http://{addr}/put/note.txt"));
        site.arguments.insert("expire".to_string(), "1d".to_string());
        site.headers
            .insert("Content-Type".to_string(), "application/x-custom".to_string());

        let response = executor(dir.path())
            .execute(&site, Some(&file))
            .await
            .unwrap();
        let echo = echoed(&response);
        assert_eq!(echo["method"], "PUT");
        assert_eq!(echo["query"], "expire=1d");
        assert_eq!(echo["body"], "raw contents");
        assert_eq!(echo["headers"]["content-type"], "application/x-custom");
    }

    #[actix_web::test]
    async fn test_final_url_after_redirect() {
        let addr = spawn_server().await;
        let dir = tempfile::tempdir().unwrap();
        let site = site(RequestType::Get, format!("http://{addr}/redirect"));

        let response = executor(dir.path()).execute(&site, None).await.unwrap();
        assert_eq!(response.body(), b"landed");
        assert_eq!(
            response.final_url(),
            Some(format!("http://{addr}/landed/abc").as_str())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plugin_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("upload.sh");
        std::fs::write(&script, "#!/bin/sh\necho working\necho \"https://x/$1\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let mut site = site(RequestType::Plugin, "upload.sh".to_string());
        site.arguments.insert("_tail".to_string(), "a.png".to_string());

        let response = executor(dir.path()).execute(&site, None).await.unwrap();
        assert_eq!(
            response,
            ExecutorResponse::PluginOutput {
                body: "https://x/a.png".to_string()
            }
        );
        assert_eq!(response.final_url(), None);
    }

    #[test]
    fn test_payload_filename() {
        assert_eq!(payload_filename(Path::new("/tmp/x/shot.png")), "shot.png");
    }
}
