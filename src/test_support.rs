use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::{PatcherError, Result};
use crate::models::{Platform, ProgressEvent, ProgressPhase};
use crate::services::collaborators::{
    ArtifactFetcher, PatchRunner, PatchToolProvider, RuntimeInstaller,
};
use crate::services::events::EventSink;
use crate::utils::paths;

pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("otoshi-{}-test-{}", label, Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp directory");
    dir
}

pub struct CannedServer {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
}

impl CannedServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Answers every request with `head` followed by `body`, after an optional stall.
pub fn serve(head: String, body: Vec<u8>, stall: Option<Duration>) -> CannedServer {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test listener");
    let port = listener.local_addr().expect("local addr").port();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else {
                continue;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let mut request = Vec::new();
            let mut buffer = [0u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                match stream.read(&mut buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(read) => request.extend_from_slice(&buffer[..read]),
                }
            }
            if let Some(stall) = stall {
                thread::sleep(stall);
            }
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        }
    });

    CannedServer {
        url: format!("http://127.0.0.1:{}/artifact.pwr", port),
        hits,
    }
}

pub fn serve_ok(body: Vec<u8>) -> CannedServer {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    serve(head, body, None)
}

/// Body delimited by connection close, so the client never learns the total size.
pub fn serve_unsized(body: Vec<u8>) -> CannedServer {
    let head =
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n"
            .to_string();
    serve(head, body, None)
}

pub fn serve_status(code: u16, reason: &str) -> CannedServer {
    let body = reason.as_bytes().to_vec();
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        code,
        reason,
        body.len()
    );
    serve(head, body, None)
}

/// Writes a fixed payload instead of touching the network.
#[derive(Clone, Default)]
pub struct FakeFetcher {
    pub payload: Vec<u8>,
    pub fail: bool,
    pub truncate: bool,
    pub calls: Arc<AtomicUsize>,
}

impl FakeFetcher {
    pub fn new(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Lands `partial` on disk, then fails the way a dropped connection does.
    pub fn truncating(partial: &[u8]) -> Self {
        Self {
            payload: partial.to_vec(),
            truncate: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        phase: ProgressPhase,
        sink: &dyn EventSink,
    ) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PatcherError::Download(format!("{} -> HTTP 503", url)));
        }
        let total = self.payload.len() as u64;
        sink.progress(ProgressEvent::bytes(phase, 0, Some(total)));
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &self.payload)?;
        if self.truncate {
            sink.progress(ProgressEvent::bytes(phase, total, Some(total * 2)));
            return Err(PatcherError::Download(format!(
                "{} -> stream failed after {} B",
                url, total
            )));
        }
        sink.progress(ProgressEvent::complete(phase, Some(total), Some(total)));
        Ok(dest.to_path_buf())
    }
}

/// Stands in for the patch tool by dropping the game binaries into the target.
#[derive(Clone)]
pub struct FakePatchRunner {
    pub platform: Platform,
    pub write_client: bool,
    pub calls: Arc<AtomicUsize>,
}

impl FakePatchRunner {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            write_client: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PatchRunner for FakePatchRunner {
    async fn apply(
        &self,
        artifact: &Path,
        _tool: &Path,
        staging_dir: &Path,
        target_dir: &Path,
        sink: &dyn EventSink,
    ) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(artifact.exists(), "artifact must land before patching");
        std::fs::create_dir_all(staging_dir)?;
        sink.progress(ProgressEvent::percent(ProgressPhase::Patching, 0));
        let mut binaries = vec![paths::server_binary(target_dir, self.platform)];
        if self.write_client {
            binaries.push(paths::client_binary(target_dir, self.platform));
        }
        for binary in binaries {
            std::fs::create_dir_all(binary.parent().expect("binary parent"))?;
            std::fs::write(&binary, b"binary")?;
        }
        let _ = std::fs::remove_dir_all(staging_dir);
        sink.progress(ProgressEvent::percent(ProgressPhase::Patching, 100));
        Ok(target_dir.to_path_buf())
    }
}

#[derive(Clone)]
pub struct FakeRuntime {
    pub platform: Platform,
    pub succeed: bool,
    pub calls: Arc<AtomicUsize>,
}

impl FakeRuntime {
    pub fn new(platform: Platform, succeed: bool) -> Self {
        Self {
            platform,
            succeed,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuntimeInstaller for FakeRuntime {
    async fn install_runtime(&self, game_root: &Path) -> Result<Option<PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.succeed {
            return Ok(None);
        }
        let runtime = paths::runtime_binary(game_root, self.platform);
        std::fs::create_dir_all(runtime.parent().expect("runtime parent"))?;
        std::fs::write(&runtime, b"java")?;
        Ok(Some(runtime))
    }
}

#[derive(Clone)]
pub struct FakeToolProvider(pub Option<PathBuf>);

#[async_trait]
impl PatchToolProvider for FakeToolProvider {
    async fn ensure_patch_tool(&self) -> Result<Option<PathBuf>> {
        Ok(self.0.clone())
    }
}
