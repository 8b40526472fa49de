use std::{
    fs::{DirBuilder, File, OpenOptions},
    os::unix::{fs::DirBuilderExt, fs::OpenOptionsExt, io::AsRawFd},
    path::Path,
};

pub fn mkdir(path: impl AsRef<Path>, mode: u32) -> Result<(), std::io::Error> {
    DirBuilder::new().mode(mode).create(path.as_ref())
}

pub struct LockFile(File);

#[derive(snafu::Snafu, Debug)]
pub enum LockFileError {
    #[snafu(context(false), display("Can't create lockfile: {}", source))]
    Create { source: std::io::Error },

    #[snafu(display("Lockfile is already locked"))]
    Locked,
}

fn entire_file_flock(ty: libc::c_short) -> libc::flock {
    libc::flock {
        l_type: ty,
        l_whence: libc::SEEK_SET as libc::c_short,
        l_start: 0,
        l_len: 0,
        // doesn't matter in this context
        l_pid: 0,
    }
}

impl LockFile {
    pub fn lock(path: impl AsRef<Path>) -> Result<Self, LockFileError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .mode(0o600)
            .open(path.as_ref())?;
        let flock = entire_file_flock(libc::F_WRLCK as libc::c_short);

        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLK, &flock) };
        if rc == 0 {
            Ok(Self(file))
        } else {
            let e = std::io::Error::last_os_error();
            // lock conflicts surface as EAGAIN or EACCES depending on the kernel
            match e.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EACCES) => Err(LockFileError::Locked),
                _ => Err(e.into()),
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let flock = entire_file_flock(libc::F_UNLCK as libc::c_short);
        let _ = unsafe { libc::fcntl(self.0.as_raw_fd(), libc::F_SETLK, &flock) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // fcntl locks don't conflict within one process, so only the
    // lock/unlock/relock cycle is checkable here
    #[test]
    fn lock_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.lock");

        let held = LockFile::lock(&path).unwrap();
        drop(held);

        let _again = LockFile::lock(&path).unwrap();
    }
}
