//! Remote archive transport
//!
//! The pipeline only needs "put the body behind this URL into that file".
//! [`HttpTransport`] does it with `reqwest`; tests substitute their own
//! [`Transport`] to observe or fake the transfer.

use crate::config::IngestConfig;
use async_trait::async_trait;
use futures::StreamExt;
use geoflow_common::{PipelineError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Write the complete response body for `url` to `dest`, returning the
    /// number of bytes written
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64>;
}

/// HTTP(S) transport streaming the response body straight to disk
pub struct HttpTransport {
    client: Client,
    show_progress: bool,
}

impl HttpTransport {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            show_progress: config.show_progress,
        })
    }

    fn progress_bar(&self, total: u64, dest: &Path) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        pb.set_message(format!("Downloading {}", name));
        pb
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PipelineError::transport(url.as_str(), e))?;

        if !response.status().is_success() {
            return Err(PipelineError::transport(
                url.as_str(),
                format!("server responded with {}", response.status()),
            ));
        }

        let pb = self.progress_bar(response.content_length().unwrap_or(0), dest);
        let mut file = std::fs::File::create(dest)?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipelineError::transport(url.as_str(), e))?;
            file.write_all(&chunk)?;
            written += chunk.len() as u64;
            pb.set_position(written);
        }
        file.flush()?;

        pb.finish_and_clear();
        debug!(url = %url, path = %dest.display(), bytes = written, "Transfer complete");
        Ok(written)
    }
}
