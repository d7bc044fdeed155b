//! Unpack stage: extract the tar, gunzip members into per-member directories
//!
//! GEO `_RAW.tar` archives hold one `.gz` per sample. After this stage
//! `extracted/<id>/GSM123_sample.txt/GSM123_sample.txt` exists for a member
//! named `GSM123_sample.txt.gz`, and neither the archive nor the `.gz` remain.

use crate::config::CleanupPolicy;
use crate::pipeline::{PipelineContext, Stage, StageKind};
use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use geoflow_common::{PipelineError, Result};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Suffix of members that are single-file gzip streams
pub const GZIP_SUFFIX: &str = ".gz";

#[derive(Debug, Default)]
pub struct UnpackStage;

impl UnpackStage {
    pub fn new() -> Self {
        Self
    }

    fn unpack_members(&self, out: &Path, members: &[String], policy: CleanupPolicy) -> Result<()> {
        for name in members {
            let member_path = out.join(name);
            let member_dir = out.join(member_stem(name));
            if !member_dir.exists() {
                std::fs::create_dir_all(&member_dir)?;
            }

            if name.ends_with(GZIP_SUFFIX) {
                decompress_member(&member_path, &member_dir, policy)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for UnpackStage {
    fn kind(&self) -> StageKind {
        StageKind::Unpack
    }

    fn output_path(&self, ctx: &PipelineContext) -> PathBuf {
        ctx.layout().extract_dir(&ctx.dataset)
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<()> {
        let archive = ctx.layout().archive_path(&ctx.dataset);
        let out = self.output_path(ctx);
        let policy = ctx.config.cleanup;
        std::fs::create_dir_all(&out)?;

        info!(dataset = %ctx.dataset, archive = %archive.display(), "Extracting archive");
        let extracted = extract_archive(&archive, &out);
        if policy == CleanupPolicy::Always {
            remove_consumed(&archive)?;
        }

        let outcome = match extracted {
            Ok(members) => {
                info!(dataset = %ctx.dataset, members = members.len(), "Archive extracted");
                self.unpack_members(&out, &members, policy)
            },
            Err(e) => {
                error!(dataset = %ctx.dataset, archive = %archive.display(), error = %e, "Extraction failed");
                Err(e)
            },
        };

        // OnSuccess keeps the archive until every member is unpacked and drops
        // the partial tree, so the next run starts this stage over.
        if policy == CleanupPolicy::OnSuccess {
            match &outcome {
                Ok(()) => remove_consumed(&archive)?,
                Err(_) => discard_partial(&out),
            }
        }

        outcome
    }
}

/// Extract every member of a tar archive under `dest`, returning member names
/// in archive order
///
/// Members whose paths would land outside `dest` are skipped with a warning.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<Vec<String>> {
    let file = File::open(archive)
        .map_err(|e| PipelineError::archive(archive, format!("cannot open archive: {}", e)))?;
    if file.metadata()?.len() == 0 {
        return Err(PipelineError::archive(archive, "archive is empty"));
    }

    let mut tar = tar::Archive::new(BufReader::new(file));
    let entries = tar
        .entries()
        .map_err(|e| PipelineError::archive(archive, format!("cannot read entries: {}", e)))?;

    let mut names = Vec::new();
    for entry in entries {
        let mut entry =
            entry.map_err(|e| PipelineError::archive(archive, format!("corrupt entry: {}", e)))?;
        let name = entry
            .path()
            .map_err(|e| PipelineError::archive(archive, format!("invalid entry path: {}", e)))?
            .to_string_lossy()
            .into_owned();

        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| PipelineError::archive(archive, format!("failed to extract '{}': {}", name, e)))?;
        if !unpacked {
            warn!(member = %name, "Skipping archive member outside the extraction directory");
            continue;
        }

        debug!(member = %name, "Extracted member");
        names.push(name);
    }

    Ok(names)
}

/// Decompress a gzip file into `dest`, returning the decompressed size
pub fn gunzip_file(src: &Path, dest: &Path) -> Result<u64> {
    let input = File::open(src)
        .map_err(|e| PipelineError::archive(src, format!("cannot open gzip member: {}", e)))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(input));
    let mut output = BufWriter::new(File::create(dest)?);

    let bytes = io::copy(&mut decoder, &mut output)
        .map_err(|e| PipelineError::archive(src, format!("decompression failed: {}", e)))?;
    output.flush()?;
    Ok(bytes)
}

/// Member name with its final extension removed: `a/GSM1.txt.gz` -> `a/GSM1.txt`
pub fn member_stem(name: &str) -> PathBuf {
    let path = Path::new(name);
    match (path.parent(), path.file_stem()) {
        (Some(parent), Some(stem)) => parent.join(stem),
        _ => path.to_path_buf(),
    }
}

fn decompress_member(gz_path: &Path, member_dir: &Path, policy: CleanupPolicy) -> Result<()> {
    let Some(stem) = gz_path.file_stem() else {
        return Err(PipelineError::archive(gz_path, "member has no file name"));
    };
    let target = member_dir.join(stem);

    info!(member = %gz_path.display(), target = %target.display(), "Decompressing member");
    let result = gunzip_file(gz_path, &target);

    if policy.removes_source(result.is_ok()) {
        remove_consumed(gz_path)?;
    } else if result.is_err() {
        discard_file(&target);
    }

    match result {
        Ok(bytes) => {
            debug!(target = %target.display(), bytes, "Member decompressed");
            Ok(())
        },
        Err(e) => {
            error!(member = %gz_path.display(), error = %e, "Decompression failed");
            Err(e)
        },
    }
}

/// Remove a half-built output directory so its stage is no longer satisfied
pub(crate) fn discard_partial(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %dir.display(), error = %e, "Failed to remove partial output");
        }
    }
}

/// Remove a half-written file; failures are logged, not returned
pub(crate) fn discard_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial file");
        }
    }
}

fn remove_consumed(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed consumed artifact");
            Ok(())
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn gzip(content: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap()
    }

    fn tar_of(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_member_stem() {
        assert_eq!(member_stem("GSM1_a.txt.gz"), PathBuf::from("GSM1_a.txt"));
        assert_eq!(member_stem("nested/GSM2.txt"), PathBuf::from("nested/GSM2"));
        assert_eq!(member_stem("README"), PathBuf::from("README"));
    }

    #[test]
    fn test_gunzip_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt.gz");
        std::fs::write(&src, gzip(b"[Header]\nx\ty\n")).unwrap();

        let bytes = gunzip_file(&src, &dir.path().join("a.txt")).unwrap();
        assert_eq!(bytes, 13);
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"[Header]\nx\ty\n");
    }

    #[test]
    fn test_gunzip_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("bad.gz");
        std::fs::write(&src, b"definitely not gzip").unwrap();

        let err = gunzip_file(&src, &dir.path().join("bad")).unwrap_err();
        assert!(matches!(err, PipelineError::Archive { .. }));
    }

    #[test]
    fn test_extract_archive_lists_members() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("x.tar");
        let one = gzip(b"1");
        std::fs::write(
            &archive,
            tar_of(&[("one.txt.gz", one.as_slice()), ("two.csv", b"2".as_slice())]),
        )
        .unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        let names = extract_archive(&archive, &out).unwrap();

        assert_eq!(names, vec!["one.txt.gz".to_string(), "two.csv".to_string()]);
        assert!(out.join("one.txt.gz").is_file());
        assert_eq!(std::fs::read(out.join("two.csv")).unwrap(), b"2");
    }

    #[test]
    fn test_extract_empty_archive_fails() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("empty.tar");
        std::fs::write(&archive, b"").unwrap();

        let err = extract_archive(&archive, dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Archive { .. }));
    }

    #[test]
    fn test_discard_is_best_effort() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("half.tar.part");
        std::fs::write(&file, b"abc").unwrap();

        discard_file(&file);
        assert!(!file.exists());
        discard_file(&file);

        // remove_file on a directory fails; the error is logged and swallowed
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        discard_file(&nested);
        assert!(nested.is_dir());
    }

    #[test]
    fn test_failed_decompression_policies() {
        let dir = TempDir::new().unwrap();
        let member_dir = dir.path().join("bad.txt");
        std::fs::create_dir_all(&member_dir).unwrap();

        let gz = dir.path().join("bad.txt.gz");
        std::fs::write(&gz, b"garbage").unwrap();
        assert!(decompress_member(&gz, &member_dir, CleanupPolicy::OnSuccess).is_err());
        assert!(gz.exists(), "source kept when consumption failed");
        assert!(!member_dir.join("bad.txt").exists(), "partial output removed");

        assert!(decompress_member(&gz, &member_dir, CleanupPolicy::Always).is_err());
        assert!(!gz.exists(), "source deleted once consumption was attempted");
    }
}
