use crate::{Error, Result};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Url};
use tracing::{debug, instrument};

/// Get the content-length header using a head request
///
/// No retries and no fallback request: a resource without a positive length can't
/// be split, so the caller aborts the job.
///
/// # Example
///
/// ```no_run
/// use dualdl::probe::content_length;
/// use reqwest::{Client, Url};
/// # #[tokio::main]
/// # async fn main() -> Result<(), dualdl::Error> {
/// let url = Url::parse("https://crates.io")?;
/// let length = content_length(&Client::new(), &url).await?;
/// println!("{}", length);
/// # Ok(())
/// # }
/// ```
#[instrument(skip(client, url), fields(URL=%url))]
pub async fn content_length(client: &Client, url: &Url) -> Result<u64> {
    let resp = client.head(url.clone()).send().await?;
    debug!("Response code: {}", resp.status());
    debug!("Received HEAD response: {:?}", resp.headers());
    if !resp.status().is_success() {
        return Err(Error::SizeUnavailable(format!("HEAD returned {}", resp.status())));
    }
    // reqwest reports the body size hint for HEAD, so read the header itself
    let raw = resp
        .headers()
        .get(CONTENT_LENGTH)
        .ok_or_else(|| Error::SizeUnavailable("missing".to_string()))?
        .to_str()
        .map_err(|e| Error::SizeUnavailable(e.to_string()))?;
    let len = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::SizeUnavailable(raw.to_string()))?;
    if len <= 0 {
        return Err(Error::SizeUnavailable(len.to_string()));
    }
    Ok(len as u64)
}
