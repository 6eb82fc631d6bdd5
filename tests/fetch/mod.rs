use crate::{init_logging, start_server};
use dualdl::probe::content_length;
use dualdl::{ByteRange, Config, Error, NetworkBinding, RangeFetcher, RangeTask, Transport, Url};
use reqwest::Client;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const LEN: usize = 40_001;

fn loopback(transport: Transport) -> NetworkBinding {
    NetworkBinding::new(transport, "lo", IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn task(dir: &TempDir, range: ByteRange) -> RangeTask {
    RangeTask::new(1, range, Some(loopback(Transport::Wifi)), dir.path().join("part1.tmp"))
}

#[tokio::test]
async fn probe_reads_length() -> dualdl::Result<()> {
    init_logging();
    let server = start_server(LEN);
    let client = Client::new();
    let len = content_length(&client, &Url::parse(&server.url("file"))?).await?;
    assert_eq!(len, LEN as u64);

    let zero = content_length(&client, &Url::parse(&server.url("empty"))?).await;
    assert!(matches!(zero, Err(Error::SizeUnavailable(_))), "{:?}", zero);

    let missing = content_length(&client, &Url::parse(&server.url("nope"))?).await;
    assert!(matches!(missing, Err(Error::SizeUnavailable(_))), "{:?}", missing);
    Ok(())
}

#[tokio::test]
async fn fetches_second_window() -> dualdl::Result<()> {
    init_logging();
    let server = start_server(LEN);
    let dir = TempDir::new()?;
    let [_, second] = ByteRange::split_in_two(LEN as u64);
    let task = task(&dir, second);
    let fetcher = RangeFetcher::new(Url::parse(&server.url("file"))?, LEN as u64, &Config::default());

    let written = fetcher.fetch(&task, &CancellationToken::new()).await?;
    assert_eq!(written, second.len);
    assert!(task.progress.is_finished());
    assert_eq!(task.progress.downloaded(), second.len);
    assert_eq!(task.percent(), 100.0);
    let on_disk = tokio::fs::read(&task.path).await?;
    assert_eq!(on_disk, server.data[second.start as usize..]);
    Ok(())
}

#[tokio::test]
async fn refetch_truncates_part() -> dualdl::Result<()> {
    let server = start_server(LEN);
    let dir = TempDir::new()?;
    let window = ByteRange::new(0, 10);
    let task = task(&dir, window);
    tokio::fs::write(&task.path, vec![0u8; 1000]).await?;
    let fetcher = RangeFetcher::new(Url::parse(&server.url("file"))?, LEN as u64, &Config::default());

    fetcher.fetch(&task, &CancellationToken::new()).await?;
    assert_eq!(tokio::fs::read(&task.path).await?, server.data[..10]);
    Ok(())
}

#[tokio::test]
async fn whole_resource_accepts_plain_ok() -> dualdl::Result<()> {
    let server = start_server(LEN);
    let dir = TempDir::new()?;
    let task = task(&dir, ByteRange::new(0, LEN as u64));
    let fetcher = RangeFetcher::new(Url::parse(&server.url("ignore"))?, LEN as u64, &Config::default());

    assert_eq!(fetcher.fetch(&task, &CancellationToken::new()).await?, LEN as u64);
    assert_eq!(tokio::fs::read(&task.path).await?, *server.data);
    Ok(())
}

#[tokio::test]
async fn partial_window_rejects_plain_ok() -> dualdl::Result<()> {
    let server = start_server(LEN);
    let dir = TempDir::new()?;
    let [_, second] = ByteRange::split_in_two(LEN as u64);
    let task = task(&dir, second);
    let fetcher = RangeFetcher::new(Url::parse(&server.url("ignore"))?, LEN as u64, &Config::default());

    let res = fetcher.fetch(&task, &CancellationToken::new()).await;
    assert!(matches!(res, Err(Error::RangeIgnored { .. })), "{:?}", res);
    Ok(())
}

#[tokio::test]
async fn server_error_is_unexpected_status() -> dualdl::Result<()> {
    let server = start_server(LEN);
    let dir = TempDir::new()?;
    let [_, second] = ByteRange::split_in_two(LEN as u64);
    let task = task(&dir, second);
    let fetcher = RangeFetcher::new(Url::parse(&server.url("flaky"))?, LEN as u64, &Config::default());

    match fetcher.fetch(&task, &CancellationToken::new()).await {
        Err(Error::UnexpectedStatus { status, .. }) => assert_eq!(status.as_u16(), 500),
        other => panic!("expected a 500, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn short_body_is_length_mismatch() -> dualdl::Result<()> {
    let server = start_server(LEN);
    let dir = TempDir::new()?;
    let [first, _] = ByteRange::split_in_two(LEN as u64);
    let task = task(&dir, first);
    let fetcher = RangeFetcher::new(Url::parse(&server.url("short"))?, LEN as u64, &Config::default());

    match fetcher.fetch(&task, &CancellationToken::new()).await {
        Err(Error::LengthMismatch {
            expected, received, ..
        }) => {
            assert_eq!(expected, first.len);
            assert_eq!(received, first.len - 1);
        }
        other => panic!("expected a length mismatch, got {:?}", other),
    }
    assert!(!task.progress.is_finished());
    Ok(())
}

#[tokio::test]
async fn empty_window_touches_nothing_remote() -> dualdl::Result<()> {
    let dir = TempDir::new()?;
    let [empty, _] = ByteRange::split_in_two(1);
    let task = task(&dir, empty);
    // nothing listens here; an empty window must not connect
    let fetcher = RangeFetcher::new(Url::parse("http://127.0.0.1:9/file")?, 1, &Config::default());

    assert_eq!(fetcher.fetch(&task, &CancellationToken::new()).await?, 0);
    assert!(task.progress.is_finished());
    assert_eq!(tokio::fs::metadata(&task.path).await?.len(), 0);
    Ok(())
}

#[tokio::test]
async fn cancelled_fetch_stops() -> dualdl::Result<()> {
    let server = start_server(LEN);
    let dir = TempDir::new()?;
    let task = task(&dir, ByteRange::new(0, LEN as u64));
    let fetcher = RangeFetcher::new(Url::parse(&server.url("slow"))?, LEN as u64, &Config::default());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let res = fetcher.fetch(&task, &cancel).await;
    assert!(matches!(res, Err(Error::Cancelled)), "{:?}", res);
    assert!(task.progress.downloaded() < LEN as u64);
    Ok(())
}

#[tokio::test]
async fn silent_server_is_range_timeout() -> dualdl::Result<()> {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    // accept and hold every connection without answering
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    let dir = TempDir::new()?;
    let task = task(&dir, ByteRange::new(0, LEN as u64));
    let config = Config {
        range_timeout: Duration::from_millis(300),
        ..Config::default()
    };
    let url = Url::parse(&format!("http://{}/file", addr))?;
    let fetcher = RangeFetcher::new(url, LEN as u64, &config);

    let began = Instant::now();
    let res = fetcher.fetch(&task, &CancellationToken::new()).await;
    let elapsed = began.elapsed();

    assert!(matches!(res, Err(Error::RangeTimeout { .. })), "{:?}", res);
    assert!(elapsed >= Duration::from_millis(250), "took {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
    assert_eq!(task.progress.downloaded(), 0);
    Ok(())
}
