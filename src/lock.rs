//! Process-wide instance lock
//!
//! Only one orchestrator may poll the upstream transport at a time. The lock is an
//! advisory exclusive lock on a file (`flock(2)` on Unix, `LockFileEx` on Windows)
//! taken without blocking: a second process fails fast with
//! [`Error::LockUnavailable`].
//!
//! The operating system drops the lock when the process dies, however it dies.
//! The lock file itself is removed on [`InstanceLock::release`] or drop; after an
//! unclean kill it stays behind, but the next start can still lock it.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Exclusive lease held for the lifetime of the process
#[derive(Debug)]
pub struct InstanceLock {
    file: Option<File>,
    path: PathBuf,
}

impl InstanceLock {
    /// Try to take the lock at `path` without blocking
    ///
    /// The current PID is written into the file for diagnostics.
    ///
    /// # Errors
    ///
    /// [`Error::LockUnavailable`] if another holder exists, [`Error::Io`] if the
    /// file cannot be created or locked.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        // Do not truncate before locking, the current holder's PID lives in there
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if !try_lock_exclusive(&file)? {
            let holder = read_holder(&mut file);
            tracing::warn!(path = %path.display(), ?holder, "instance lock is held elsewhere");
            return Err(Error::LockUnavailable {
                path: path.to_path_buf(),
                holder,
            });
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        write!(file, "{}", std::process::id())?;
        file.sync_all()?;

        tracing::info!(path = %path.display(), pid = std::process::id(), "instance lock acquired");
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }

    /// Location of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file and release the lock
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        // Remove while still holding the lock so no other process sees it vanish mid-write
        let removed = match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
        unlock(&file);
        drop(file);

        tracing::info!(path = %self.path.display(), "instance lock released");
        removed.map_err(Error::from)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to clean up instance lock");
        }
    }
}

/// PID recorded by the current holder, if the file is readable
fn read_holder(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and stays open for the call
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and stays open for the call
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::windows::io::AsRawHandle;
    use winapi::shared::winerror::ERROR_LOCK_VIOLATION;
    use winapi::um::fileapi::LockFileEx;
    use winapi::um::minwinbase::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, OVERLAPPED};

    // SAFETY: OVERLAPPED is plain data; all-zero means offset 0 without an event
    let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
    // SAFETY: the handle is owned by `file` and `overlapped` outlives the call
    let rc = unsafe {
        LockFileEx(
            file.as_raw_handle() as winapi::um::winnt::HANDLE,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            u32::MAX,
            u32::MAX,
            &mut overlapped,
        )
    };
    if rc != 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(windows)]
fn unlock(file: &File) {
    use std::os::windows::io::AsRawHandle;
    use winapi::um::fileapi::UnlockFileEx;
    use winapi::um::minwinbase::OVERLAPPED;

    // SAFETY: see try_lock_exclusive
    unsafe {
        let mut overlapped: OVERLAPPED = std::mem::zeroed();
        UnlockFileEx(
            file.as_raw_handle() as winapi::um::winnt::HANDLE,
            0,
            u32::MAX,
            u32::MAX,
            &mut overlapped,
        );
    }
}
