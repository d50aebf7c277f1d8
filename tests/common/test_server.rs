use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

use tempfile::TempDir;

static BUILD_RELEASE: LazyLock<PathBuf> = LazyLock::new(|| {
    let status = Command::new("cargo")
        .args(["build", "--release"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run cargo build");
    assert!(status.success(), "release build failed");

    Path::new(env!("CARGO_MANIFEST_DIR")).join("target/release/taskhive")
});

/// A freshly initialized server on its own database and port. Killed on drop;
/// the temp dir keeps the database alive for the server's lifetime.
pub struct TestServer {
    pub base_url: String,
    pub admin_token: String,
    child: Child,
    _data_dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let binary = BUILD_RELEASE.as_path();
        let data_dir = TempDir::new().expect("create temp dir");

        let init = Command::new(binary)
            .args(["admin", "init", "--non-interactive", "--data-dir"])
            .arg(data_dir.path())
            .output()
            .expect("run admin init");
        assert!(
            init.status.success(),
            "admin init failed: {}",
            String::from_utf8_lossy(&init.stderr)
        );

        let admin_token = std::fs::read_to_string(data_dir.path().join(".admin_token"))
            .expect("read admin token")
            .trim()
            .to_string();

        let port = free_port();
        let base_url = format!("http://127.0.0.1:{port}");

        let child = Command::new(binary)
            .args(["serve", "--host", "127.0.0.1", "--port"])
            .arg(port.to_string())
            .arg("--data-dir")
            .arg(data_dir.path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn server");

        let server = Self {
            base_url,
            admin_token,
            child,
            _data_dir: data_dir,
        };
        server.wait_until_healthy().await;
        server
    }

    async fn wait_until_healthy(&self) {
        let url = format!("{}/health", self.base_url);
        for _ in 0..50 {
            match reqwest::get(&url).await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        panic!("server never became healthy at {url}");
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
