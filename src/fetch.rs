//! Download cache for remote archives and installers.
//!
//! Every fetch lands in the shared download directory and is skipped
//! entirely when the file is already present, which is what makes install
//! strategies cheap to re-run. Data is streamed to a `.part` file and only
//! renamed into place after the size checks out, so an interrupted download
//! is never mistaken for a complete one.

use crate::config::EngineConfig;
use crate::error::{CairnError, Result};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

/// Progress callback: bytes received so far, total from `Content-Length`
/// when the server supplied one.
pub type Progress<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// HTTP(S) fetcher backed by the shared download directory.
pub struct Fetcher {
    client: reqwest::blocking::Client,
}

impl Fetcher {
    /// Create a fetcher, honoring an `HTTP_PROXY`/`http_proxy` override.
    pub fn new() -> Self {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(concat!("cairn/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30));

        if let Some(proxy_url) = proxy_from_env() {
            if let Ok(proxy) = reqwest::Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            } else {
                tracing::warn!(proxy = %proxy_url, "ignoring unparseable proxy override");
            }
        }

        Self {
            // Builder only fails on TLS backend misconfiguration.
            client: builder.build().expect("failed to build HTTP client"),
        }
    }

    /// Download `base + remote` into the download directory as `local`.
    ///
    /// No-op when the file already exists. Progress is reported per read
    /// block. Non-2xx responses, redirect loops, and short bodies all fail
    /// with [`CairnError::Download`], and no final file is left behind.
    pub fn fetch(
        &self,
        base: &str,
        remote: &str,
        local: &str,
        config: &EngineConfig,
        mut progress: Option<Progress<'_>>,
    ) -> Result<PathBuf> {
        let target = config.download_dir.join(local);
        if target.exists() {
            tracing::debug!(file = %target.display(), "already downloaded");
            return Ok(target);
        }
        fs::create_dir_all(&config.download_dir)?;

        let url = join_url(base, remote);
        tracing::info!(%url, "fetching");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| download_error(&url, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CairnError::Download {
                url,
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }

        let total = response.content_length();
        let part = target.with_extension(partial_extension(&target));
        let received = match copy_body(response, &part, total, progress.take()) {
            Ok(received) => received,
            Err(err) => {
                let _ = fs::remove_file(&part);
                return Err(match err {
                    CairnError::Io(io) => CairnError::Download {
                        url,
                        status: None,
                        message: io.to_string(),
                    },
                    other => other,
                });
            }
        };

        if let Some(total) = total {
            if received < total {
                let _ = fs::remove_file(&part);
                return Err(CairnError::Download {
                    url,
                    status: None,
                    message: format!("retrieval incomplete: got {received} of {total} bytes"),
                });
            }
        }

        fs::rename(&part, &target)?;
        Ok(target)
    }

    /// Whether a URL answers with a success status. Transport failures
    /// count as "does not exist".
    pub fn exists(&self, url: &str) -> bool {
        self.client
            .get(url)
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_body(
    mut response: reqwest::blocking::Response,
    part: &std::path::Path,
    total: Option<u64>,
    mut progress: Option<Progress<'_>>,
) -> Result<u64> {
    let mut file = File::create(part)?;
    let mut buffer = [0u8; 8192];
    let mut received: u64 = 0;
    if let Some(report) = progress.as_mut() {
        report(0, total);
    }
    loop {
        let read = response.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])?;
        received += read as u64;
        if let Some(report) = progress.as_mut() {
            report(received, total);
        }
    }
    file.flush()?;
    Ok(received)
}

/// Partial-download extension preserving the original one
/// (`foo.tar.gz` -> `foo.tar.gz.part`).
fn partial_extension(target: &std::path::Path) -> String {
    match target.extension() {
        Some(ext) => format!("{}.part", ext.to_string_lossy()),
        None => "part".to_string(),
    }
}

fn join_url(base: &str, remote: &str) -> String {
    if base.is_empty() {
        remote.to_string()
    } else if base.ends_with('/') || remote.starts_with('/') {
        format!("{base}{remote}")
    } else {
        format!("{base}/{remote}")
    }
}

fn download_error(url: &str, err: &reqwest::Error) -> CairnError {
    CairnError::Download {
        url: url.to_string(),
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

/// Explicit proxy override from the conventional environment variables.
fn proxy_from_env() -> Option<String> {
    std::env::var("HTTP_PROXY")
        .or_else(|_| std::env::var("http_proxy"))
        .ok()
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> EngineConfig {
        EngineConfig::new(temp.path().join("build")).with_download_dir(temp.path().join("dl"))
    }

    #[test]
    fn fetch_writes_file_and_reports_progress() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/widgetlib-2.0.tar.gz");
            then.status(200).body("archive-bytes");
        });

        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let fetcher = Fetcher::new();

        let mut seen = Vec::new();
        let mut progress = |got: u64, total: Option<u64>| seen.push((got, total));
        let path = fetcher
            .fetch(
                &server.base_url(),
                "widgetlib-2.0.tar.gz",
                "widgetlib-2.0.tar.gz",
                &config,
                Some(&mut progress),
            )
            .unwrap();

        mock.assert();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "archive-bytes");
        assert_eq!(seen.last().unwrap().0, 13);
        // No partial file left behind.
        assert!(!path.with_extension("gz.part").exists());
    }

    #[test]
    fn fetch_is_a_noop_when_file_exists() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/cached.tar.gz");
            then.status(200).body("fresh");
        });

        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        std::fs::create_dir_all(&config.download_dir).unwrap();
        std::fs::write(config.download_dir.join("cached.tar.gz"), "stale").unwrap();

        let fetcher = Fetcher::new();
        let path = fetcher
            .fetch(&server.base_url(), "cached.tar.gz", "cached.tar.gz", &config, None)
            .unwrap();

        assert_eq!(mock.hits(), 0);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "stale");
    }

    #[test]
    fn fetch_404_fails_with_status_and_leaves_nothing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.tar.gz");
            then.status(404);
        });

        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let fetcher = Fetcher::new();

        let err = fetcher
            .fetch(&server.base_url(), "missing.tar.gz", "missing.tar.gz", &config, None)
            .unwrap_err();
        match err {
            CairnError::Download { status, .. } => assert_eq!(status, Some(404)),
            other => panic!("expected Download error, got {other:?}"),
        }
        assert!(!config.download_dir.join("missing.tar.gz").exists());
    }

    #[test]
    fn exists_reflects_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/present/");
            then.status(200).body("ok");
        });

        let fetcher = Fetcher::new();
        assert!(fetcher.exists(&format!("{}/present/", server.base_url())));
        assert!(!fetcher.exists(&format!("{}/absent/", server.base_url())));
    }

    #[test]
    fn join_url_inserts_single_slash() {
        assert_eq!(join_url("http://a", "b.tar.gz"), "http://a/b.tar.gz");
        assert_eq!(join_url("http://a/", "b.tar.gz"), "http://a/b.tar.gz");
        assert_eq!(join_url("", "http://a/b"), "http://a/b");
    }
}
