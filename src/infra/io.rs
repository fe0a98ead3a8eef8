use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Read a whole document. Fiscal XML files are small; no mapping needed.
pub fn read_bytes(path: &Path) -> std::io::Result<Vec<u8>> {
    std::fs::read(path)
}

/// Replace `path` atomically: write a sibling temp file, then persist it
/// over the target. A crash never leaves a half-written document.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file()
        .sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)?;
    Ok(())
}

/// Copy `files` into `out_dir` (created if missing) and return the copies,
/// in the same order. Existing files with the same name are overwritten.
pub fn stage_copies(files: &[PathBuf], out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    files
        .iter()
        .map(|src| {
            let name = src
                .file_name()
                .with_context(|| format!("Input path has no file name: {}", src.display()))?;
            let dst = out_dir.join(name);
            std::fs::copy(src, &dst)
                .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
            Ok(dst)
        })
        .collect()
}
