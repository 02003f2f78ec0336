//! Archive creation for per-target build output.
//!
//! The contents of the source directory are stored at the top level of the
//! archive: a file at `target/linux-x86_64/vince` becomes the entry `vince`,
//! not `linux-x86_64/vince`.

use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::targets::ArchiveFormat;

/// What an [`Entry`] is on disk.
#[derive(Debug)]
enum EntryKind {
    Dir,
    File,
    /// Stored as a link to this target, never followed.
    Symlink(String),
}

/// A file, directory or symlink found under the source directory.
#[derive(Debug)]
struct Entry {
    /// Path on disk.
    path: PathBuf,
    /// `/`-separated path relative to the source directory.
    name: String,
    kind: EntryKind,
}

/// Collect every entry under `dir`, depth-first, sorted by name within each
/// directory so archives are reproducible. Symlinks are recorded as links and
/// not descended into.
fn collect_entries(dir: &Path) -> Result<Vec<Entry>> {
    fn walk(dir: &Path, prefix: &str, out: &mut Vec<Entry>) -> Result<()> {
        let mut children = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
            .collect::<io::Result<Vec<_>>>()
            .with_context(|| format!("Failed to list directory: {}", dir.display()))?;
        children.sort_by_key(|c| c.file_name());

        for child in children {
            let path = child.path();
            let file_name = child.file_name();
            let Some(file_name) = file_name.to_str() else {
                bail!("Non UTF-8 file name in build output: {}", path.display());
            };
            let name = if prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{prefix}/{file_name}")
            };

            let file_type = std::fs::symlink_metadata(&path)
                .with_context(|| format!("Failed to stat {}", path.display()))?
                .file_type();
            if file_type.is_symlink() {
                let target = std::fs::read_link(&path)
                    .with_context(|| format!("Failed to read link {}", path.display()))?;
                let Some(target) = target.to_str() else {
                    bail!("Non UTF-8 link target in build output: {}", path.display());
                };
                let kind = EntryKind::Symlink(target.to_string());
                out.push(Entry { path, name, kind });
            } else if file_type.is_dir() {
                out.push(Entry {
                    path: path.clone(),
                    name: name.clone(),
                    kind: EntryKind::Dir,
                });
                walk(&path, &name, out)?;
            } else {
                out.push(Entry {
                    path,
                    name,
                    kind: EntryKind::File,
                });
            }
        }
        Ok(())
    }

    let mut entries = Vec::new();
    walk(dir, "", &mut entries)?;
    Ok(entries)
}

/// Write the contents of `src_dir` to a gzip-compressed tarball at `dest`.
fn create_tar_gz(src_dir: &Path, dest: &Path) -> Result<()> {
    let entries = collect_entries(src_dir)?;

    let file = File::create(dest)
        .with_context(|| format!("Failed to create archive: {}", dest.display()))?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    for entry in &entries {
        match entry.kind {
            EntryKind::Dir => builder
                .append_dir(&entry.name, &entry.path)
                .with_context(|| format!("Failed to add directory '{}' to archive", entry.name))?,
            EntryKind::File | EntryKind::Symlink(_) => builder
                .append_path_with_name(&entry.path, &entry.name)
                .with_context(|| format!("Failed to add '{}' to archive", entry.name))?,
        }
    }

    let encoder = builder.into_inner().context("Failed to finish tar stream")?;
    encoder.finish().context("Failed to finish gzip stream")?;
    Ok(())
}

#[cfg(unix)]
fn unix_mode(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::symlink_metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    Ok(meta.permissions().mode() & 0o7777)
}

/// Write the contents of `src_dir` to a zip archive at `dest`.
fn create_zip(src_dir: &Path, dest: &Path) -> Result<()> {
    let entries = collect_entries(src_dir)?;

    let file = File::create(dest)
        .with_context(|| format!("Failed to create archive: {}", dest.display()))?;
    let mut writer = zip::ZipWriter::new(file);

    for entry in &entries {
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        #[cfg(unix)]
        let options = options.unix_permissions(unix_mode(&entry.path)?);

        match &entry.kind {
            EntryKind::Dir => writer
                .add_directory(entry.name.as_str(), options)
                .with_context(|| format!("Failed to add directory '{}' to archive", entry.name))?,
            EntryKind::Symlink(target) => writer
                .add_symlink(entry.name.as_str(), target.as_str(), options)
                .with_context(|| format!("Failed to add link '{}' to archive", entry.name))?,
            EntryKind::File => {
                writer
                    .start_file(entry.name.as_str(), options)
                    .with_context(|| format!("Failed to add '{}' to archive", entry.name))?;
                let mut src = File::open(&entry.path)
                    .with_context(|| format!("Failed to open {}", entry.path.display()))?;
                io::copy(&mut src, &mut writer)
                    .with_context(|| format!("Failed to write '{}' to archive", entry.name))?;
            }
        }
    }

    writer.finish().context("Failed to finish zip archive")?;
    Ok(())
}

/// Package the contents of `src_dir` into the archive at `dest`.
///
/// The parent directory of `dest` is created if missing and an existing
/// archive at the same path is overwritten.
pub fn create_archive(src_dir: &Path, dest: &Path, format: ArchiveFormat) -> Result<()> {
    if !src_dir.is_dir() {
        bail!("Archive source is not a directory: {}", src_dir.display());
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    match format {
        ArchiveFormat::Zip => create_zip(src_dir, dest),
        ArchiveFormat::Gztar => create_tar_gz(src_dir, dest),
    }
}
