// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `credgate` binary as a subprocess and exercises it
//! over HTTP.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `credgate` binary.
pub fn credgate_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("credgate")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `credgate` process that is killed on drop.
pub struct GateProcess {
    child: Child,
    port: u16,
    admin_secret: String,
    data_dir: tempfile::TempDir,
}

/// Builder for the environment a [`GateProcess`] starts with.
pub struct GateBuilder {
    admin_secret: String,
    factory_key: Option<String>,
    upstream_url: String,
}

impl Default for GateBuilder {
    fn default() -> Self {
        Self {
            admin_secret: "smoke-admin-secret".to_owned(),
            factory_key: None,
            upstream_url: "http://127.0.0.1:9".to_owned(),
        }
    }
}

impl GateBuilder {
    /// Seed a factory key through `FACTORY_API_KEY`.
    pub fn factory_key(mut self, key: &str) -> Self {
        self.factory_key = Some(key.to_owned());
        self
    }

    /// Forward proxied requests to `url`.
    pub fn upstream(mut self, url: &str) -> Self {
        self.upstream_url = url.to_owned();
        self
    }

    pub fn spawn(self) -> anyhow::Result<GateProcess> {
        ensure_crypto();
        let binary = credgate_binary();
        anyhow::ensure!(binary.exists(), "credgate binary not found at {}", binary.display());

        let port = free_port()?;
        let data_dir = tempfile::tempdir()?;

        let mut cmd = Command::new(&binary);
        cmd.args(["--host", "127.0.0.1", "--log-format", "text", "--log-level", "warn"])
            .env("CREDGATE_PORT", port.to_string())
            .env("CREDGATE_ADMIN_SECRET", &self.admin_secret)
            .env("CREDGATE_DATA_DIR", data_dir.path())
            .env("CREDGATE_UPSTREAM_URL", &self.upstream_url)
            // Keep the legacy auth file lookup inside the temp dir.
            .env("HOME", data_dir.path())
            .env_remove("CREDGATE_STORE_PATH")
            .env_remove("CREDGATE_LEGACY_AUTH_FILE")
            .env_remove("DROID_REFRESH_KEY")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match self.factory_key {
            Some(ref key) => cmd.env("FACTORY_API_KEY", key),
            None => cmd.env_remove("FACTORY_API_KEY"),
        };

        let child = cmd.spawn()?;
        Ok(GateProcess { child, port, admin_secret: self.admin_secret, data_dir })
    }
}

impl GateProcess {
    pub fn build() -> GateBuilder {
        GateBuilder::default()
    }

    /// Spawn with the default configuration.
    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn admin_secret(&self) -> &str {
        &self.admin_secret
    }

    /// Directory holding the token store.
    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Poll health until responsive.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("credgate did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for GateProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
