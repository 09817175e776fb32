// Nitpicker - Gallery Browser & Downloader for Mobile
// Copyright (C) 2025 Nitpicker contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! End-to-end download scenarios against a local mock gallery
//!
//! Each test serves file pages and file bodies from a wiremock server. The
//! thumbnail URLs point at the same server, so resolved file URLs do too.

use nitpicker_core::download::LaneLimits;
use nitpicker_core::{
    CoreConfig, Database, DownloadOrchestrator, DownloadStatus, DownloadTask, FileInfo,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const WAIT: Duration = Duration::from_secs(15);

fn config(dir: &Path, limits: LaneLimits) -> CoreConfig {
    CoreConfig {
        image_resolve_permits: limits.image_resolve_permits,
        image_download_workers: limits.image_download_workers,
        progress_interval_ms: 20,
        ..CoreConfig::with_data_dir(dir)
    }
}

fn listed(server: &MockServer, id: &str, ext: &str) -> FileInfo {
    FileInfo::new(
        format!("{}.{}", id, ext),
        "1 KB",
        format!("{}/thumbs/{}.png", server.uri(), id),
        format!("{}/f/{}", server.uri(), id),
    )
}

fn body(id: &str, len: usize) -> Vec<u8> {
    id.bytes().cycle().take(len).collect()
}

async fn serve_page(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/f/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><a class="btn" href="https://get.bunkrr.su/file/{}">Download</a></html>"#,
            id.len()
        )))
        .mount(server)
        .await;
}

async fn serve_file(server: &MockServer, id: &str, ext: &str, data: Vec<u8>, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(format!("/{}.{}", id, ext)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data).set_delay(delay))
        .mount(server)
        .await;
}

async fn wait_for(
    orchestrator: &DownloadOrchestrator,
    id: &str,
    status: DownloadStatus,
) -> DownloadTask {
    let mut feed = orchestrator.store().observe_all();
    let found = tokio::time::timeout(WAIT, async {
        loop {
            if let Some(task) = feed.borrow_and_update().iter().find(|t| t.id == id) {
                if task.status == status {
                    return task.clone();
                }
            }
            if feed.changed().await.is_err() {
                panic!("task store dropped");
            }
        }
    })
    .await;

    match found {
        Ok(task) => task,
        Err(_) => {
            let row = orchestrator.store().get_by_id(id).await.ok().flatten();
            panic!("{} never reached {}; last row: {:?}", id, status, row);
        }
    }
}

/// Block until the server has seen a request for `path`
async fn wait_for_request(server: &MockServer, path: &str) {
    tokio::time::timeout(WAIT, async {
        loop {
            let seen = server
                .received_requests()
                .await
                .unwrap_or_default()
                .iter()
                .any(|request| request.url.path() == path);
            if seen {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no request for {}", path));
}

/// Every snapshot of one task seen until it settles
async fn record_rows(orchestrator: &DownloadOrchestrator, id: &str) -> Vec<(Instant, DownloadTask)> {
    let mut feed = orchestrator.store().observe_all();
    let mut rows = Vec::new();
    let recorded = tokio::time::timeout(WAIT, async {
        loop {
            let row = feed.borrow_and_update().iter().find(|t| t.id == id).cloned();
            if let Some(row) = row {
                let settled = row.status.is_settled();
                rows.push((Instant::now(), row));
                if settled {
                    return;
                }
            }
            if feed.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    assert!(recorded.is_ok(), "{} never settled", id);
    rows
}

/// A pre-resolved task pointing at `file_url`
fn resolved_task(server: &MockServer, id: &str, ext: &str, album: &str, file_url: String) -> DownloadTask {
    let file = listed(server, id, ext);
    let mut task = DownloadTask::pending(
        id.into(),
        file.file_name,
        file.file_type,
        file.page_url,
        file.thumbnail_url,
        album.into(),
    );
    task.download_page_url = "https://get.bunkrr.su/file/9".into();
    task.file_url = file_url;
    task
}

async fn wait_idle(orchestrator: &DownloadOrchestrator) {
    tokio::time::timeout(WAIT, async {
        while orchestrator.active_job_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("jobs did not finish");
}

#[tokio::test]
async fn test_album_with_images_and_video() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;

    let files = vec![
        listed(&server, "img-a", "jpg"),
        listed(&server, "img-b", "png"),
        listed(&server, "img-c", "webp"),
        listed(&server, "movie", "mp4"),
    ];
    for file in &files {
        let id = file.file_name.split('.').next().unwrap_or_default();
        serve_page(&server, id).await;
        serve_file(&server, id, &file.file_type, body(id, 3000), Duration::ZERO).await;
    }

    let orchestrator = DownloadOrchestrator::from_config(&config(dir.path(), LaneLimits::default())).await?;
    let ids = orchestrator.enqueue(&files, "Test").await?;
    assert_eq!(ids, vec!["img-a", "img-b", "img-c", "movie"]);
    assert_eq!(orchestrator.store().list_all().await?.len(), 4);

    let album_dir = dir.path().join("Downloads").join("Test");
    for (id, file) in ids.iter().zip(&files) {
        let task = wait_for(&orchestrator, id, DownloadStatus::Completed).await;
        assert_eq!(task.downloaded_bytes, task.total_bytes);
        assert_eq!(task.total_bytes, 3000);
        assert!(task.error.is_none());

        let stored = task.file_path.expect("completed task has a path");
        let stored = Path::new(&stored);
        assert!(stored.starts_with(&album_dir), "{} outside album", stored.display());
        assert_eq!(stored.extension().and_then(|e| e.to_str()), Some(file.file_type.as_str()));
        assert_eq!(tokio::fs::read(stored).await?, body(id, 3000));
    }

    wait_idle(&orchestrator).await;
    assert!(orchestrator.progress().all_settled());
    assert!(orchestrator
        .progress()
        .current()
        .iter()
        .all(|row| row.progress_percent == 100));
    Ok(())
}

#[tokio::test]
async fn test_resolution_error_then_retry() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;

    Mock::given(method("GET"))
        .and(path("/f/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    serve_page(&server, "flaky").await;
    serve_file(&server, "flaky", "gif", body("flaky", 1200), Duration::ZERO).await;

    let orchestrator = DownloadOrchestrator::from_config(&config(dir.path(), LaneLimits::default())).await?;
    orchestrator
        .enqueue(&[listed(&server, "flaky", "gif")], "Retry")
        .await?;

    let failed = wait_for(&orchestrator, "flaky", DownloadStatus::Error).await;
    let message = failed.error.unwrap_or_default();
    assert!(message.contains("500"), "unexpected message: {}", message);
    assert_eq!(orchestrator.progress().get("flaky").map(|p| p.progress_percent), Some(0));
    wait_idle(&orchestrator).await;

    orchestrator.retry_download("flaky").await?;
    let done = wait_for(&orchestrator, "flaky", DownloadStatus::Completed).await;
    assert_eq!(done.downloaded_bytes, 1200);
    assert!(done.error.is_none());

    let again = orchestrator.retry_download("flaky").await;
    assert!(again.is_err(), "completed tasks cannot be retried");
    Ok(())
}

#[tokio::test]
async fn test_enqueue_is_idempotent() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    serve_page(&server, "once").await;
    serve_file(&server, "once", "jpg", body("once", 500), Duration::from_millis(300)).await;

    let orchestrator = DownloadOrchestrator::from_config(&config(dir.path(), LaneLimits::default())).await?;
    let file = listed(&server, "once", "jpg");

    orchestrator.enqueue(&[file.clone()], "Same").await?;
    orchestrator.enqueue(&[file.clone()], "Same").await?;
    assert!(orchestrator.active_job_count().await <= 1);

    wait_for(&orchestrator, "once", DownloadStatus::Completed).await;
    wait_idle(&orchestrator).await;

    orchestrator.enqueue(&[file], "Same").await?;
    assert_eq!(orchestrator.active_job_count().await, 0);
    assert_eq!(orchestrator.store().list_all().await?.len(), 1);

    let pages = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/f/once")
        .count();
    assert_eq!(pages, 1);
    Ok(())
}

#[tokio::test]
async fn test_resume_from_recorded_offset() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let full = body("resume", 10_000);

    Mock::given(method("GET"))
        .and(path("/resume.mp4"))
        .and(header("range", "bytes=4000-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 4000-9999/10000")
                .set_body_bytes(full[4000..].to_vec()),
        )
        .mount(&server)
        .await;

    let config = config(dir.path(), LaneLimits::default());
    let partial = config.downloads_root.join("Clips").join("resume.mp4");
    tokio::fs::create_dir_all(partial.parent().unwrap_or(dir.path())).await?;
    tokio::fs::write(&partial, &full[..4000]).await?;

    let orchestrator = DownloadOrchestrator::from_config(&config).await?;
    let file = listed(&server, "resume", "mp4");
    let mut task = DownloadTask::pending(
        "resume".into(),
        file.file_name.clone(),
        file.file_type.clone(),
        file.page_url.clone(),
        file.thumbnail_url.clone(),
        "Clips".into(),
    );
    task.download_page_url = "https://get.bunkrr.su/file/6".into();
    task.file_url = format!("{}/resume.mp4?n=resume.mp4", server.uri());
    task.status = DownloadStatus::Downloading;
    task.downloaded_bytes = 4000;
    task.total_bytes = 10_000;
    task.file_path = Some(partial.to_string_lossy().into_owned());
    orchestrator.store().insert_or_replace(&task).await?;

    assert_eq!(orchestrator.recover_interrupted().await?, 1);
    let done = wait_for(&orchestrator, "resume", DownloadStatus::Completed).await;

    assert_eq!(done.downloaded_bytes, 10_000);
    assert_eq!(done.file_path, Some(partial.to_string_lossy().into_owned()));
    assert_eq!(tokio::fs::read(&partial).await?, full);
    Ok(())
}

#[tokio::test]
async fn test_length_mismatch_restarts_from_zero() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let full = body("stale", 5000);
    serve_file(&server, "stale", "mkv", full.clone(), Duration::from_millis(300)).await;

    let config = config(dir.path(), LaneLimits::default());
    let partial = config.downloads_root.join("Clips").join("stale.mkv");
    tokio::fs::create_dir_all(partial.parent().unwrap_or(dir.path())).await?;
    tokio::fs::write(&partial, vec![0u8; 700]).await?;

    let orchestrator = DownloadOrchestrator::from_config(&config).await?;
    let file = listed(&server, "stale", "mkv");
    let mut task = DownloadTask::pending(
        "stale".into(),
        file.file_name.clone(),
        file.file_type.clone(),
        file.page_url.clone(),
        file.thumbnail_url.clone(),
        "Clips".into(),
    );
    task.download_page_url = "https://get.bunkrr.su/file/5".into();
    task.file_url = format!("{}/stale.mkv?n=stale.mkv", server.uri());
    task.status = DownloadStatus::Pending;
    task.downloaded_bytes = 1000;
    task.total_bytes = 5000;
    task.file_path = Some(partial.to_string_lossy().into_owned());
    orchestrator.store().insert_or_replace(&task).await?;

    let recorder = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { record_rows(&orchestrator, "stale").await })
    };
    tokio::task::yield_now().await;
    orchestrator.recover_interrupted().await?;
    let done = wait_for(&orchestrator, "stale", DownloadStatus::Completed).await;
    assert_eq!(done.downloaded_bytes, 5000);
    assert_eq!(tokio::fs::read(&partial).await?, full);

    // progress drops back to 0 and climbs from there
    let seen: Vec<u64> = recorder.await?.into_iter().map(|(_, row)| row.downloaded_bytes).collect();
    let restart = seen.iter().position(|bytes| *bytes == 0);
    let restart = restart.unwrap_or_else(|| panic!("no restart from zero in {:?}", seen));
    assert!(seen[restart..].windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", seen);
    assert_eq!(seen.last(), Some(&5000));

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(!requests.is_empty());
    assert!(requests
        .iter()
        .all(|request| !request.headers.contains_key("range")));
    Ok(())
}

#[tokio::test]
async fn test_other_lane_runs_one_at_a_time() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;

    let mut files = Vec::new();
    for id in ["v1", "v2", "v3"] {
        serve_page(&server, id).await;
        serve_file(&server, id, "mp4", body(id, 800), Duration::from_millis(250)).await;
        files.push(listed(&server, id, "mp4"));
    }

    let orchestrator = DownloadOrchestrator::from_config(&config(dir.path(), LaneLimits::default())).await?;
    orchestrator.enqueue(&files, "Videos").await?;
    assert_eq!(orchestrator.active_job_count().await, 3);

    for id in ["v1", "v2", "v3"] {
        wait_for(&orchestrator, id, DownloadStatus::Completed).await;
    }
    assert_eq!(orchestrator.lane_peaks().other_sections, 1);
    Ok(())
}

#[tokio::test]
async fn test_image_lane_respects_permits() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let limits = LaneLimits {
        image_resolve_permits: 2,
        image_download_workers: 3,
    };

    let mut files = Vec::new();
    for n in 0..8 {
        let id = format!("pic{}", n);
        serve_page(&server, &id).await;
        serve_file(&server, &id, "jpg", body(&id, 400), Duration::from_millis(200)).await;
        files.push(listed(&server, &id, "jpg"));
    }

    let orchestrator = DownloadOrchestrator::from_config(&config(dir.path(), limits)).await?;
    let ids = orchestrator.enqueue(&files, "Pics").await?;
    for id in &ids {
        wait_for(&orchestrator, id, DownloadStatus::Completed).await;
    }

    let peaks = orchestrator.lane_peaks();
    assert!(peaks.image_resolutions >= 1 && peaks.image_resolutions <= 2, "{:?}", peaks);
    assert!(peaks.image_downloads >= 1 && peaks.image_downloads <= 3, "{:?}", peaks);
    assert_eq!(peaks.other_sections, 0);
    Ok(())
}

#[tokio::test]
async fn test_cancel_then_enqueue_again() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let full = body("again", 2000);

    serve_page(&server, "again").await;
    Mock::given(method("GET"))
        .and(path("/again.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(full.clone())
                .set_delay(Duration::from_secs(30)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    serve_file(&server, "again", "mp4", full.clone(), Duration::ZERO).await;

    let orchestrator = DownloadOrchestrator::from_config(&config(dir.path(), LaneLimits::default())).await?;
    let file = listed(&server, "again", "mp4");
    orchestrator.enqueue(&[file.clone()], "Again").await?;
    wait_for(&orchestrator, "again", DownloadStatus::Downloading).await;
    wait_for_request(&server, "/again.mp4").await;

    let started = std::time::Instant::now();
    orchestrator.cancel("again").await?;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!orchestrator.has_job("again").await);

    let cancelled = orchestrator.store().get_by_id("again").await?.expect("row kept");
    assert_eq!(cancelled.status, DownloadStatus::Cancelled);
    assert_eq!(cancelled.error.as_deref(), Some("User cancelled"));

    orchestrator.enqueue(&[file], "Again").await?;
    let done = wait_for(&orchestrator, "again", DownloadStatus::Completed).await;
    assert_eq!(done.downloaded_bytes, 2000);
    assert_eq!(done.created_at, cancelled.created_at);
    assert_eq!(orchestrator.store().list_all().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_interrupted_download_recovers_in_new_process() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let full = body("phoenix", 1500);

    serve_page(&server, "phoenix").await;
    Mock::given(method("GET"))
        .and(path("/phoenix.mkv"))
        .and(header_exists("referer"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(full.clone())
                .set_delay(Duration::from_secs(30)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    serve_file(&server, "phoenix", "mkv", full.clone(), Duration::ZERO).await;

    let config = config(dir.path(), LaneLimits::default());
    {
        let first = DownloadOrchestrator::from_config(&config).await?;
        first
            .enqueue(&[listed(&server, "phoenix", "mkv")], "Recovered")
            .await?;
        wait_for(&first, "phoenix", DownloadStatus::Downloading).await;
        wait_for_request(&server, "/phoenix.mkv").await;
        first.shutdown().await;

        let row = first.store().get_by_id("phoenix").await?.expect("row kept");
        assert_eq!(row.status, DownloadStatus::Downloading);
        first.store().database().clone().close().await?;
    }

    let second = DownloadOrchestrator::start(&config).await?;
    let done = wait_for(&second, "phoenix", DownloadStatus::Completed).await;
    assert_eq!(done.downloaded_bytes, 1500);
    assert_eq!(tokio::fs::read(done.file_path.unwrap_or_default()).await?, full);

    let db = Database::new(&config.database_path).await?;
    assert!(db.quick_check().await?);
    Ok(())
}

#[tokio::test]
async fn test_range_not_satisfiable_on_complete_file() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let full = body("whole", 3000);

    Mock::given(method("GET"))
        .and(path("/whole.mp4"))
        .and(header("range", "bytes=3000-"))
        .respond_with(ResponseTemplate::new(416))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/whole.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(full.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(dir.path(), LaneLimits::default());
    let partial = config.downloads_root.join("Clips").join("whole.mp4");
    tokio::fs::create_dir_all(partial.parent().unwrap_or(dir.path())).await?;
    tokio::fs::write(&partial, &full).await?;

    let orchestrator = DownloadOrchestrator::from_config(&config).await?;
    let mut task = resolved_task(&server, "whole", "mp4", "Clips", format!("{}/whole.mp4", server.uri()));
    task.status = DownloadStatus::Downloading;
    task.downloaded_bytes = 3000;
    task.total_bytes = 3000;
    task.file_path = Some(partial.to_string_lossy().into_owned());
    orchestrator.store().insert_or_replace(&task).await?;

    orchestrator.recover_interrupted().await?;
    let done = wait_for(&orchestrator, "whole", DownloadStatus::Completed).await;
    assert_eq!((done.downloaded_bytes, done.total_bytes), (3000, 3000));
    assert_eq!(tokio::fs::read(&partial).await?, full);

    let gets = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.method.as_str() == "GET")
        .count();
    assert_eq!(gets, 1, "no fresh download after the HEAD");
    Ok(())
}

#[tokio::test]
async fn test_status_moves_forward_through_lifecycle() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;

    Mock::given(method("GET"))
        .and(path("/f/steps"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<a href="https://get.bunkrr.su/file/5">Download</a>"#)
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    serve_file(&server, "steps", "png", body("steps", 900), Duration::from_millis(300)).await;

    let orchestrator = DownloadOrchestrator::from_config(&config(dir.path(), LaneLimits::default())).await?;
    let recorder = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { record_rows(&orchestrator, "steps").await })
    };
    tokio::task::yield_now().await;
    orchestrator.enqueue(&[listed(&server, "steps", "png")], "Steps").await?;

    let mut statuses: Vec<DownloadStatus> = Vec::new();
    for (_, row) in recorder.await? {
        if statuses.last() != Some(&row.status) {
            statuses.push(row.status);
        }
    }

    assert!(
        matches!(statuses.first(), Some(DownloadStatus::Pending) | Some(DownloadStatus::FetchingUrl)),
        "{:?}",
        statuses
    );
    let forward: Vec<DownloadStatus> = statuses
        .into_iter()
        .filter(|status| *status != DownloadStatus::Pending)
        .collect();
    assert_eq!(
        forward,
        vec![
            DownloadStatus::FetchingUrl,
            DownloadStatus::Downloading,
            DownloadStatus::Completed
        ]
    );
    Ok(())
}

/// Serve one file as 20 slices of 1000 bytes, 50 ms apart
async fn dribble_server(data: Vec<u8>) -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            data.len()
        );
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        for slice in data.chunks(1000) {
            if socket.write_all(slice).await.is_err() || socket.flush().await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    Ok(format!("http://{}/slow.mp4", address))
}

#[tokio::test]
async fn test_progress_writes_are_throttled() -> TestResult {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let full = body("slow", 20_000);
    let file_url = dribble_server(full.clone()).await?;

    let config = CoreConfig {
        progress_interval_ms: 300,
        ..config(dir.path(), LaneLimits::default())
    };
    let orchestrator = DownloadOrchestrator::from_config(&config).await?;
    orchestrator
        .store()
        .insert_or_replace(&resolved_task(&server, "slow", "mp4", "Slow", file_url))
        .await?;

    let recorder = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { record_rows(&orchestrator, "slow").await })
    };
    tokio::task::yield_now().await;
    let started = Instant::now();
    orchestrator.recover_interrupted().await?;

    let rows = recorder.await?;
    let elapsed = started.elapsed();
    let last = rows.last().map(|(_, row)| row.clone()).expect("rows recorded");
    assert_eq!(last.status, DownloadStatus::Completed);
    assert_eq!(last.downloaded_bytes, 20_000);

    let mut intermediate: Vec<u64> = rows
        .iter()
        .map(|(_, row)| row.downloaded_bytes)
        .filter(|bytes| *bytes > 0 && *bytes < 20_000)
        .collect();
    intermediate.dedup();

    let allowed = (elapsed.as_millis() / 300) as usize + 1;
    assert!(!intermediate.is_empty(), "no progress seen while streaming");
    assert!(
        intermediate.len() <= allowed,
        "{} progress writes in {:?}: {:?}",
        intermediate.len(),
        elapsed,
        intermediate
    );
    Ok(())
}
