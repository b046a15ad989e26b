use crate::error::PipelineError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    /// Sniffs the format from magic bytes, falling back to the file name
    pub fn detect(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|e| open_error(path, e))?;
        let mut magic = Vec::with_capacity(262);
        let read = file
            .take(262)
            .read_to_end(&mut magic)
            .map_err(|e| PipelineError::workspace(path, e))?;

        if read >= 4 && magic[..4] == *b"PK\x03\x04" {
            return Ok(ArchiveFormat::Zip);
        }
        if read >= 2 && magic[..2] == [0x1f, 0x8b] {
            return Ok(ArchiveFormat::TarGz);
        }
        if read >= 262 && &magic[257..262] == b"ustar" {
            return Ok(ArchiveFormat::Tar);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".zip") {
            Ok(ArchiveFormat::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar") {
            Ok(ArchiveFormat::Tar)
        } else {
            Err(PipelineError::workspace(path, "unrecognised archive format"))
        }
    }
}

fn open_error(path: &Path, e: io::Error) -> PipelineError {
    if e.kind() == io::ErrorKind::NotFound {
        PipelineError::NotFound(format!("archive {}", path.display()))
    } else {
        PipelineError::workspace(path, e)
    }
}

/// Unpacks `archive` into `dest`. Entries that would land outside `dest`
/// abort the extraction.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<ArchiveFormat, PipelineError> {
    let format = ArchiveFormat::detect(archive)?;
    debug!(archive = %archive.display(), format = ?format, "Extracting archive");

    let file = File::open(archive).map_err(|e| open_error(archive, e))?;

    let entries = match format {
        ArchiveFormat::Zip => extract_zip(file, archive, dest)?,
        ArchiveFormat::Tar => extract_tar(BufReader::new(file), archive, dest)?,
        ArchiveFormat::TarGz => extract_tar(GzDecoder::new(BufReader::new(file)), archive, dest)?,
    };

    info!(archive = %archive.display(), entries, "Archive extracted");
    Ok(format)
}

fn extract_zip(file: File, archive: &Path, dest: &Path) -> Result<usize, PipelineError> {
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| PipelineError::workspace(archive, format!("invalid zip archive: {}", e)))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| PipelineError::workspace(archive, format!("corrupt zip entry: {}", e)))?;

        let relative = entry.enclosed_name().ok_or_else(|| {
            PipelineError::workspace(
                archive,
                format!("entry '{}' escapes the workspace", entry.name()),
            )
        })?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| PipelineError::workspace(&target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::workspace(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| PipelineError::workspace(&target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| PipelineError::workspace(&target, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777));
        }
    }

    Ok(zip.len())
}

fn extract_tar<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<usize, PipelineError> {
    let mut tar = tar::Archive::new(reader);
    let entries = tar
        .entries()
        .map_err(|e| PipelineError::workspace(archive, format!("invalid tar archive: {}", e)))?;

    let mut count = 0;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| PipelineError::workspace(archive, format!("corrupt tar entry: {}", e)))?;
        let path = entry
            .path()
            .map_err(|e| PipelineError::workspace(archive, e))?
            .into_owned();

        if !is_contained(&path) {
            return Err(PipelineError::workspace(
                archive,
                format!("entry '{}' escapes the workspace", path.display()),
            ));
        }

        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| PipelineError::workspace(dest, e))?;
        if !unpacked {
            return Err(PipelineError::workspace(
                archive,
                format!("entry '{}' escapes the workspace", path.display()),
            ));
        }
        count += 1;
    }

    Ok(count)
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_extract_zip() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("upload.zip");
        write_zip(&archive, &[("main.py", "print('hi')\n"), ("pkg/util.py", "X = 1\n")]);

        let dest = dir.path().join("ws");
        fs::create_dir(&dest).unwrap();
        let format = extract_archive(&archive, &dest).unwrap();

        assert_eq!(format, ArchiveFormat::Zip);
        assert_eq!(fs::read_to_string(dest.join("main.py")).unwrap(), "print('hi')\n");
        assert!(dest.join("pkg/util.py").is_file());
    }

    #[test]
    fn test_zip_traversal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../escape.txt", "nope")]);

        let dest = dir.path().join("ws");
        fs::create_dir(&dest).unwrap();
        let result = extract_archive(&archive, &dest);

        assert!(matches!(result, Err(PipelineError::InvalidWorkspace { .. })));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_extract_tar_gz_by_magic() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("upload.bin");
        write_tar_gz(&archive, &[("app/index.js", "console.log(1)\n")]);

        let dest = dir.path().join("ws");
        fs::create_dir(&dest).unwrap();
        let format = extract_archive(&archive, &dest).unwrap();

        assert_eq!(format, ArchiveFormat::TarGz);
        assert!(dest.join("app/index.js").is_file());
    }

    #[test]
    fn test_missing_archive_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = extract_archive(&dir.path().join("missing.zip"), dir.path());
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }

    #[test]
    fn test_garbage_is_invalid_workspace() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("notes.txt");
        fs::write(&archive, "just text").unwrap();
        let result = extract_archive(&archive, dir.path());
        assert!(matches!(result, Err(PipelineError::InvalidWorkspace { .. })));
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained(Path::new("a/b/c.txt")));
        assert!(is_contained(Path::new("./a")));
        assert!(!is_contained(Path::new("../a")));
        assert!(!is_contained(Path::new("/etc/passwd")));
    }
}
