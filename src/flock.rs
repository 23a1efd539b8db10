use std::{
    fs::File,
    path::Path,
    time::{Duration, Instant},
};

use fs4::fs_std::FileExt;
use log::debug;
use thiserror::Error;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(300);
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Exclusive advisory lock on the scratch-clone cache, held for the lifetime
/// of the value.
pub struct FileLock {
    _file: File,
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(#[from] std::io::Error);

impl FileLock {
    pub fn new(path: &Path) -> Result<Self, Error> {
        let file = File::create(path)?;
        let deadline = Instant::now() + ACQUIRE_TIMEOUT;
        loop {
            match file.try_lock_exclusive() {
                Ok(_) => return Ok(Self { _file: file }),
                Err(error)
                    if error.raw_os_error() == fs4::lock_contended_error().raw_os_error()
                        && Instant::now() < deadline =>
                {
                    debug!(
                        "Lock on {} is held by another process, retrying",
                        path.display()
                    );
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}
