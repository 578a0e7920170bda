// Profile directories
// Every platform gets its own user-data-dir under the profile root so logins
// survive restarts. A pid file keeps two browsers off the same directory.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use promptrelay_core::application::constants::PROFILE_LOCK_FILE;
use promptrelay_core::domain::ServiceTarget;

use crate::error::BrowserError;

#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<platform>`
    pub fn dir(&self, target: ServiceTarget) -> PathBuf {
        self.root.join(target.as_str())
    }

    /// Claim the platform's profile for this process
    ///
    /// # Errors
    /// - BrowserError::ProfileInUse if a live process (this one included) holds the lock
    /// - BrowserError::Io if the directory or pid file cannot be written
    pub fn lock(&self, target: ServiceTarget) -> Result<ProfileLock, BrowserError> {
        let dir = self.dir(target);
        fs::create_dir_all(&dir)?;
        let lock_path = dir.join(PROFILE_LOCK_FILE);

        // one retry after clearing a stale lock
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut file) => {
                    write!(file, "{}", std::process::id())?;
                    info!(service = %target, path = %dir.display(), "Profile locked");
                    return Ok(ProfileLock {
                        dir: dir.clone(),
                        lock_path,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let holder = read_pid(&lock_path);
                    match holder {
                        Some(pid) if process_alive(pid) => {
                            return Err(BrowserError::ProfileInUse { path: dir, pid });
                        }
                        _ => {
                            warn!(
                                service = %target,
                                stale_pid = ?holder,
                                "Removing stale profile lock"
                            );
                            fs::remove_file(&lock_path)?;
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BrowserError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("could not claim {}", lock_path.display()),
        )))
    }
}

/// Held for as long as a browser runs on the profile. Dropping it removes the pid file.
#[derive(Debug)]
pub struct ProfileLock {
    dir: PathBuf,
    lock_path: PathBuf,
}

impl ProfileLock {
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for ProfileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.lock_path.display(), error = %e, "Failed to remove profile lock");
            }
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Whether a process with this pid exists
pub(crate) fn process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        // Signal 0 checks existence without delivering anything
        kill(Pid::from_raw(raw), Signal::try_from(0).ok()).is_ok()
    }

    #[cfg(not(unix))]
    {
        false
    }
}
