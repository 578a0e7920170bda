// Chrome launcher
// Spawns a dedicated Chrome per platform with remote debugging on an
// ephemeral port, and stops it with SIGTERM then SIGKILL.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::sync::oneshot;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use promptrelay_core::application::constants::{
    BROWSER_LAUNCH_TIMEOUT, BROWSER_STOP_GRACE, BROWSER_STOP_POLL,
};
use promptrelay_core::domain::ServiceTarget;
use promptrelay_core::port::TabHost;
use promptrelay_infra_cdp::{CdpTabHost, DevToolsHttp};

use crate::error::BrowserError;
use crate::launcher::{BrowserInstance, BrowserLauncher};

const DEVTOOLS_BANNER: &str = "DevTools listening on ";

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub executable: PathBuf,
    pub headless: bool,
    pub extra_args: Vec<String>,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            headless: false,
            extra_args: Vec::new(),
        }
    }
}

fn default_executable() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")
    } else if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe")
    } else {
        PathBuf::from("google-chrome")
    }
}

/// `ws://...` from a "DevTools listening on ws://..." stderr line
pub fn parse_devtools_banner(line: &str) -> Option<&str> {
    let rest = line.split_once(DEVTOOLS_BANNER)?.1.trim();
    rest.starts_with("ws://").then_some(rest)
}

/// `ws://127.0.0.1:40123/devtools/browser/x` -> `http://127.0.0.1:40123`
pub fn http_endpoint(ws_url: &str) -> Option<String> {
    let host = ws_url.strip_prefix("ws://")?.split('/').next()?;
    (!host.is_empty()).then(|| format!("http://{}", host))
}

pub struct ChromeLauncher {
    options: ChromeOptions,
}

impl ChromeLauncher {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }

    fn command(&self, target: ServiceTarget, profile_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.options.executable);
        cmd.arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg("--remote-debugging-port=0")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if self.options.headless {
            cmd.arg("--headless=new");
        }
        cmd.args(&self.options.extra_args)
            .arg(target.home_url())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Read stderr until the DevTools banner shows up
async fn wait_for_banner(
    lines: &mut tokio::io::Lines<BufReader<ChildStderr>>,
) -> Result<String, BrowserError> {
    while let Some(line) = lines.next_line().await? {
        if let Some(ws_url) = parse_devtools_banner(&line) {
            return Ok(ws_url.to_string());
        }
        debug!(line = %line, "Browser stderr");
    }
    Err(BrowserError::Launch(
        "browser exited before announcing its DevTools endpoint".to_string(),
    ))
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(
        &self,
        target: ServiceTarget,
        profile_dir: &Path,
    ) -> Result<Arc<dyn BrowserInstance>, BrowserError> {
        info!(
            service = %target,
            executable = %self.options.executable.display(),
            headless = self.options.headless,
            "Launching browser"
        );

        let mut child = self.command(target, profile_dir).spawn().map_err(|e| {
            BrowserError::Launch(format!(
                "{}: {}",
                self.options.executable.display(),
                e
            ))
        })?;
        let pid = child.id();
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BrowserError::Launch("stderr not captured".to_string()))?;
        let mut lines = BufReader::new(stderr).lines();

        let ws_url = match timeout(BROWSER_LAUNCH_TIMEOUT, wait_for_banner(&mut lines)).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(e);
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(BrowserError::Launch(format!(
                    "no DevTools endpoint within {}s",
                    BROWSER_LAUNCH_TIMEOUT.as_secs()
                )));
            }
        };
        let devtools_url = http_endpoint(&ws_url)
            .ok_or_else(|| BrowserError::Launch(format!("malformed DevTools URL {}", ws_url)))?;
        info!(service = %target, pid = ?pid, devtools = %devtools_url, "Browser ready");

        // keep the pipe drained or Chrome blocks on a full stderr
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(service = %target, line = %line, "Browser stderr");
            }
        });

        let exited = Arc::new(AtomicBool::new(false));
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let monitor_exited = Arc::clone(&exited);
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => info!(service = %target, %status, "Browser exited"),
                    Err(e) => warn!(service = %target, error = %e, "Browser wait failed"),
                },
                // fires on an explicit kill and when the instance is dropped
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        warn!(service = %target, error = %e, "Browser kill failed");
                    }
                }
            }
            monitor_exited.store(true, Ordering::SeqCst);
        });

        let http = DevToolsHttp::new(devtools_url.clone());
        Ok(Arc::new(ChromeInstance {
            target,
            pid,
            devtools_url,
            tab_host: Arc::new(CdpTabHost::new(http)),
            exited,
            kill: Mutex::new(Some(kill_tx)),
        }))
    }
}

pub struct ChromeInstance {
    target: ServiceTarget,
    pid: Option<u32>,
    devtools_url: String,
    tab_host: Arc<CdpTabHost>,
    exited: Arc<AtomicBool>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
}

impl ChromeInstance {
    fn force_kill(&self) {
        let sender = self.kill.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }

    async fn wait_exit(&self, grace: std::time::Duration) -> bool {
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            tokio::time::sleep(BROWSER_STOP_POLL).await;
            if self.exited.load(Ordering::SeqCst) {
                return true;
            }
        }
        self.exited.load(Ordering::SeqCst)
    }

    #[cfg(unix)]
    fn terminate(&self) -> Result<bool, BrowserError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) else {
            return Ok(false);
        };
        info!(service = %self.target, pid, "Sending SIGTERM to browser");
        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(BrowserError::Stop(format!("SIGTERM failed: {}", e))),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&self) -> Result<bool, BrowserError> {
        Ok(false)
    }
}

#[async_trait]
impl BrowserInstance for ChromeInstance {
    fn devtools_url(&self) -> &str {
        &self.devtools_url
    }

    fn tab_host(&self) -> Arc<dyn TabHost> {
        Arc::clone(&self.tab_host) as Arc<dyn TabHost>
    }

    fn is_connected(&self) -> bool {
        !self.exited.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        if !self.is_connected() {
            return Ok(());
        }
        self.tab_host.detach_all().await;

        let signalled = self.terminate()?;
        if signalled {
            if self.wait_exit(BROWSER_STOP_GRACE).await {
                info!(service = %self.target, "Browser exited after SIGTERM");
                return Ok(());
            }
            warn!(service = %self.target, "Browser still running, sending SIGKILL");
        }
        self.force_kill();
        if !self.wait_exit(BROWSER_STOP_GRACE).await {
            return Err(BrowserError::Stop(format!(
                "{} browser did not exit",
                self.target
            )));
        }
        Ok(())
    }
}

impl Drop for ChromeInstance {
    fn drop(&mut self) {
        self.force_kill();
    }
}
