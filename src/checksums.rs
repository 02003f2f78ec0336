//! SHA256 checksum manifest for produced archives.
//!
//! Written in GNU coreutils format (`<hex>  <file name>`), so the file can be
//! checked with `sha256sum -c` from inside the artifacts directory.

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Filename of the checksums file written next to the archives.
pub const CHECKSUMS_FILENAME: &str = "checksums-sha256.txt";

/// Computes the SHA256 digest of a file and returns it as a lowercase hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file for checksum: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read file for checksum: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Render manifest lines for `archives`, in the given order.
pub fn render_manifest(archives: &[PathBuf]) -> Result<String> {
    let mut out = String::new();
    for path in archives {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            bail!("Archive path has no usable file name: {}", path.display());
        };
        let hash = sha256_file(path)?;
        out.push_str(&format!("{hash}  {name}\n"));
    }
    Ok(out)
}

/// Write `checksums-sha256.txt` into `dir` covering `archives`.
/// Returns the path of the manifest.
pub fn write_manifest(dir: &Path, archives: &[PathBuf]) -> Result<PathBuf> {
    let contents = render_manifest(archives)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    let path = dir.join(CHECKSUMS_FILENAME);
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write checksums file at {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_known_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hello.txt");
        std::fs::write(&path, b"hello\n").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn sha256_missing_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(sha256_file(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn manifest_uses_gnu_format_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let b = tmp.path().join("vince-1.0-b.zip");
        let a = tmp.path().join("vince-1.0-a.tar.gz");
        std::fs::write(&b, b"b").unwrap();
        std::fs::write(&a, b"a").unwrap();

        let manifest = render_manifest(&[b.clone(), a.clone()]).unwrap();
        let lines: Vec<&str> = manifest.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("  vince-1.0-b.zip"));
        assert!(lines[1].ends_with("  vince-1.0-a.tar.gz"));
        let (hash, _) = lines[0].split_once("  ").unwrap();
        assert_eq!(hash, sha256_file(&b).unwrap());
    }

    #[test]
    fn manifest_written_to_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.zip");
        std::fs::write(&a, b"a").unwrap();
        let path = write_manifest(tmp.path(), &[a]).unwrap();
        assert_eq!(path.file_name().unwrap(), CHECKSUMS_FILENAME);
        assert!(std::fs::read_to_string(path).unwrap().ends_with("  a.zip\n"));
    }
}
