use crate::network::NetworkBinding;
use crate::range::RangeTask;
use crate::{Config, Error, Result};
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Client whose sockets are bound to `binding`, or the default route when `None`
pub(crate) fn client_for(binding: Option<&NetworkBinding>, connect: Duration) -> Result<Client> {
    let mut builder = Client::builder().connect_timeout(connect);
    if let Some(b) = binding {
        builder = builder.local_address(b.address);
    }
    Ok(builder.build()?)
}

fn net_error(e: reqwest::Error, label: &str) -> Error {
    if e.is_timeout() {
        Error::RangeTimeout {
            label: label.to_string(),
        }
    } else {
        Error::ConnectionError(e)
    }
}

/// Streams single ranges of one resource into part files
#[derive(Debug, Clone)]
pub struct RangeFetcher {
    url: Url,
    total: u64,
    stall: Duration,
    buffer_size: usize,
}

impl RangeFetcher {
    /// # Arguments
    /// * `url` - the resource
    /// * `total` - probed size of the resource
    pub fn new(url: Url, total: u64, config: &Config) -> Self {
        Self {
            url,
            total,
            stall: config.range_timeout,
            buffer_size: config.buffer_size,
        }
    }

    /// Download `task`'s window into its part file, returning the bytes written.
    ///
    /// The part file is truncated first. A 206 is required unless the window is the
    /// whole resource, in which case a plain 200 carries exactly the right bytes.
    /// The body must match the window length exactly. Cancellation is checked
    /// between buffer writes and while waiting on the network.
    #[instrument(skip(self, task, cancel), fields(URL=%self.url, range=?task.range, route=%task.route_label()))]
    pub async fn fetch(&self, task: &RangeTask, cancel: &CancellationToken) -> Result<u64> {
        let label = task.tag();
        let mut output = File::create(&task.path).await?;
        let header = match task.range.header_value() {
            Some(h) => h,
            None => {
                debug!("Empty window, nothing to fetch");
                output.sync_all().await?;
                task.progress.finish();
                return Ok(0);
            }
        };
        let client = client_for(task.binding.as_ref(), self.stall)?;
        let request = client.get(self.url.clone()).header(RANGE, header).send();
        let mut resp = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            sent = timeout(self.stall, request) => sent
                .map_err(|_| Error::RangeTimeout { label: label.clone() })?
                .map_err(|e| net_error(e, &label))?,
        };
        debug!("Response code: {}", resp.status());
        match resp.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::OK if task.range.covers(self.total) => {
                debug!("Full content answers a whole-resource window");
            }
            StatusCode::OK => return Err(Error::RangeIgnored { label }),
            status => return Err(Error::UnexpectedStatus { label, status }),
        }

        let expected = task.range.len;
        let mut received: u64 = 0;
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                read = timeout(self.stall, resp.chunk()) => read
                    .map_err(|_| Error::RangeTimeout { label: label.clone() })?
                    .map_err(|e| net_error(e, &label))?,
            };
            let chunk = match next {
                Some(c) => c,
                None => break,
            };
            if received + chunk.len() as u64 > expected {
                return Err(Error::LengthMismatch {
                    label,
                    expected,
                    received: received + chunk.len() as u64,
                });
            }
            for slice in chunk.chunks(self.buffer_size) {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                output.write_all(slice).await?;
                received += slice.len() as u64;
                task.progress.add(slice.len() as u64);
            }
        }
        if received != expected {
            return Err(Error::LengthMismatch {
                label,
                expected,
                received,
            });
        }
        output.flush().await?;
        output.sync_all().await?;
        task.progress.finish();
        info!("Written {} bytes", received);
        Ok(received)
    }
}
