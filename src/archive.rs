//! Archive extraction with canonical directory normalization.
//!
//! Upstream archives name their internal root folder after the release
//! (`libfoo-1.2.3/`), but downstream build steps reference one fixed,
//! version-independent path. [`unpack`] therefore renames the extracted
//! root to the requested canonical name, and treats an already-present
//! canonical directory as "done" so repeated runs never touch it.

use crate::config::EngineConfig;
use crate::error::{CairnError, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Supported archive formats, detected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    TarGz,
    TarBz2,
    Tar,
    Zip,
}

fn detect_format(archive: &Path) -> Result<Format> {
    let name = archive.file_name().unwrap_or_default().to_string_lossy();
    let lower = name.to_lowercase();
    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        Ok(Format::TarGz)
    } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") {
        Ok(Format::TarBz2)
    } else if lower.ends_with(".tar.z") {
        Err(CairnError::Archive {
            archive: name.to_string(),
            message: "compress(1) archives must be decompressed externally first".into(),
        })
    } else if lower.ends_with(".tar") {
        Ok(Format::Tar)
    } else if lower.ends_with(".zip") {
        Ok(Format::Zip)
    } else {
        Err(CairnError::Archive {
            archive: name.to_string(),
            message: "unrecognized archive extension".into(),
        })
    }
}

/// Unpack an archive beneath the build directory as `canonical` and return
/// the resulting path.
///
/// No-op when `build_dir/<canonical>` already exists. Archives with a
/// single internal root directory are extracted and that root is renamed to
/// the canonical name; archives without one are extracted directly into the
/// canonical directory.
pub fn unpack(archive: &Path, canonical: &str, config: &EngineConfig) -> Result<PathBuf> {
    let target = config.build_dir.join(canonical);
    if target.exists() {
        tracing::debug!(dir = %target.display(), "already unpacked");
        return Ok(target);
    }
    fs::create_dir_all(&config.build_dir)?;

    let format = detect_format(archive)?;
    let root = common_root(archive, format)?;
    tracing::info!(archive = %archive.display(), ?root, "unpacking");

    match root {
        Some(root) => {
            extract_into(archive, format, &config.build_dir)?;
            let extracted = config.build_dir.join(&root);
            if extracted != target {
                fs::rename(&extracted, &target)?;
            }
        }
        None => {
            fs::create_dir_all(&target)?;
            extract_into(archive, format, &target)?;
        }
    }
    Ok(target)
}

fn open_reader(archive: &Path, format: Format) -> Result<Box<dyn Read>> {
    let file = File::open(archive)?;
    Ok(match format {
        Format::TarGz => Box::new(GzDecoder::new(file)),
        Format::TarBz2 => Box::new(BzDecoder::new(file)),
        Format::Tar => Box::new(file),
        Format::Zip => unreachable!("zip handled separately"),
    })
}

/// The single top-level directory shared by every member, if there is one.
fn common_root(archive: &Path, format: Format) -> Result<Option<String>> {
    let members = match format {
        Format::Zip => {
            let file = File::open(archive)?;
            let zip = zip::ZipArchive::new(file).map_err(|e| archive_error(archive, e))?;
            zip.file_names().map(String::from).collect::<Vec<_>>()
        }
        _ => {
            let mut tar = tar::Archive::new(open_reader(archive, format)?);
            let mut members = Vec::new();
            for entry in tar.entries()? {
                let entry = entry?;
                members.push(entry.path()?.to_string_lossy().to_string());
            }
            members
        }
    };

    let mut root: Option<String> = None;
    let mut nested = false;
    for member in &members {
        let path = Path::new(member);
        let mut components = path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)));
        let Some(Component::Normal(first)) = components.next() else {
            continue;
        };
        let first = first.to_string_lossy().to_string();
        match &root {
            None => root = Some(first),
            Some(existing) if *existing == first => {}
            Some(_) => return Ok(None),
        }
        if components.next().is_some() || member.ends_with('/') {
            nested = true;
        }
    }
    // A lone top-level file is not a root directory worth renaming.
    Ok(if nested { root } else { None })
}

fn extract_into(archive: &Path, format: Format, destination: &Path) -> Result<()> {
    match format {
        Format::Zip => {
            let file = File::open(archive)?;
            let mut zip = zip::ZipArchive::new(file).map_err(|e| archive_error(archive, e))?;
            zip.extract(destination)
                .map_err(|e| archive_error(archive, e))
        }
        _ => {
            let mut tar = tar::Archive::new(open_reader(archive, format)?);
            tar.unpack(destination)?;
            Ok(())
        }
    }
}

fn archive_error(archive: &Path, err: impl std::fmt::Display) -> CairnError {
    CairnError::Archive {
        archive: archive.file_name().unwrap_or_default().to_string_lossy().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> EngineConfig {
        EngineConfig::new(temp.path().join("build"))
    }

    /// Build a .tar.gz whose members all live under `root/`.
    fn make_tar_gz(path: &Path, root: &str, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(
                    &mut header,
                    format!("{root}/{name}"),
                    contents.as_bytes(),
                )
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn make_zip(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn unpack_renames_versioned_root_to_canonical() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let archive = temp.path().join("libfoo-2.3.tar.gz");
        make_tar_gz(&archive, "libfoo-2.3", &[("src/foo.c", "int x;"), ("README", "hi")]);

        let dir = unpack(&archive, "libfoo", &config).unwrap();
        assert_eq!(dir, config.build_dir.join("libfoo"));
        assert_eq!(
            std::fs::read_to_string(dir.join("src/foo.c")).unwrap(),
            "int x;"
        );
        assert!(!config.build_dir.join("libfoo-2.3").exists());
    }

    #[test]
    fn unpack_twice_is_a_noop() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let archive = temp.path().join("libfoo-2.3.tar.gz");
        make_tar_gz(&archive, "libfoo-2.3", &[("README", "hi")]);

        let dir = unpack(&archive, "libfoo", &config).unwrap();
        let marker = dir.join("marker-from-first-run");
        std::fs::write(&marker, "kept").unwrap();
        let mtime = std::fs::metadata(&dir).unwrap().modified().unwrap();

        let again = unpack(&archive, "libfoo", &config).unwrap();
        assert_eq!(again, dir);
        assert!(marker.exists());
        assert_eq!(std::fs::metadata(&dir).unwrap().modified().unwrap(), mtime);
    }

    #[test]
    fn unpack_matching_root_needs_no_rename() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let archive = temp.path().join("widget.tar.gz");
        make_tar_gz(&archive, "widget", &[("configure", "#!/bin/sh")]);

        let dir = unpack(&archive, "widget", &config).unwrap();
        assert!(dir.join("configure").is_file());
    }

    #[test]
    fn unpack_rootless_zip_lands_in_canonical_dir() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let archive = temp.path().join("flat.zip");
        make_zip(&archive, &[("a.txt", "a"), ("b.txt", "b")]);

        let dir = unpack(&archive, "flat", &config).unwrap();
        assert_eq!(dir, config.build_dir.join("flat"));
        assert!(dir.join("a.txt").is_file());
        assert!(dir.join("b.txt").is_file());
    }

    #[test]
    fn unpack_zip_with_root_renames() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let archive = temp.path().join("widget-1.0.zip");
        make_zip(&archive, &[("widget-1.0/lib/w.py", "w = 1")]);

        let dir = unpack(&archive, "widget", &config).unwrap();
        assert!(dir.join("lib/w.py").is_file());
        assert!(!config.build_dir.join("widget-1.0").exists());
    }

    #[test]
    fn tar_z_reports_external_decompression() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let archive = temp.path().join("old.tar.Z");
        std::fs::write(&archive, "legacy").unwrap();

        let err = unpack(&archive, "old", &config).unwrap_err();
        match err {
            CairnError::Archive { message, .. } => {
                assert!(message.contains("decompressed externally"))
            }
            other => panic!("expected Archive error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let archive = temp.path().join("blob.rar");
        std::fs::write(&archive, "???").unwrap();

        assert!(matches!(
            unpack(&archive, "blob", &config),
            Err(CairnError::Archive { .. })
        ));
    }
}
