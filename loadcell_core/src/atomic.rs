//! Crash-safe file replacement for the persisted calibration.
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".new");
    path.with_file_name(name)
}

/// Write `bytes` next to `path`, sync, then rename over `path`. Readers see
/// either the old file or the new one, never a partial write. Missing parent
/// directories are created.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    let tmp = staging_path(path);
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
