//! Segment stage: split section-tagged text files into TSV tables
//!
//! Input is the unpack stage's tree; for every `*.txt` directly inside each
//! member directory, every section becomes
//! `processed/<id>/<member>/<file stem>_<tag>.tsv`. Sections with a reduction
//! rule (only `Probes`) also produce `<member>/Probes_reduced.tsv`.

pub mod sections;
pub mod splitter;
pub mod table;

pub use sections::{reduction_for, KnownSection, ReductionRule};
pub use splitter::{split_sections, Section, SectionSplitter, SectionTag};
pub use table::Table;

use crate::config::CleanupPolicy;
use crate::pipeline::{PipelineContext, Stage, StageKind};
use crate::unpack::discard_partial;
use async_trait::async_trait;
use geoflow_common::{PipelineError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Suffix of files the segmenter reads
pub const TEXT_SUFFIX: &str = ".txt";

/// Suffix of files the segmenter writes
pub const TABLE_SUFFIX: &str = ".tsv";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentStats {
    pub files: usize,
    pub tables: usize,
    pub reduced_tables: usize,
}

#[derive(Debug, Default)]
pub struct SegmentStage;

impl SegmentStage {
    pub fn new() -> Self {
        Self
    }

    fn segment_tree(&self, src_root: &Path, out_root: &Path) -> Result<SegmentStats> {
        let mut stats = SegmentStats::default();

        for member_dir in sorted_children(src_root)?.into_iter().filter(|p| p.is_dir()) {
            let Some(member) = member_dir.file_name() else {
                continue;
            };
            let out_dir = out_root.join(member);

            for file in sorted_children(&member_dir)? {
                if !is_text_file(&file) {
                    continue;
                }

                let written = segment_file(&file, &out_dir).map_err(|e| {
                    error!(file = %file.display(), error = %e, "Failed to segment file");
                    e
                })?;
                stats.files += 1;
                stats.tables += written.tables.len();
                stats.reduced_tables += written.reduced.len();
            }
        }

        Ok(stats)
    }
}

#[async_trait]
impl Stage for SegmentStage {
    fn kind(&self) -> StageKind {
        StageKind::Segment
    }

    fn output_path(&self, ctx: &PipelineContext) -> PathBuf {
        ctx.layout().processed_dir(&ctx.dataset)
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<()> {
        let src_root = ctx.layout().extract_dir(&ctx.dataset);
        let out_root = self.output_path(ctx);

        info!(dataset = %ctx.dataset, source = %src_root.display(), "Segmenting tables");
        match self.segment_tree(&src_root, &out_root) {
            Ok(stats) => {
                std::fs::create_dir_all(&out_root)?;
                info!(
                    dataset = %ctx.dataset,
                    files = stats.files,
                    tables = stats.tables,
                    reduced = stats.reduced_tables,
                    "Segmentation complete"
                );
                Ok(())
            },
            Err(e) => {
                if ctx.config.cleanup == CleanupPolicy::OnSuccess {
                    discard_partial(&out_root);
                }
                Err(e)
            },
        }
    }
}

/// Paths written for one input file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentedFile {
    pub tables: Vec<PathBuf>,
    pub reduced: Vec<PathBuf>,
}

/// Split one text file into tables and write them under `out_dir`
///
/// Every section is parsed before anything is written, so a malformed section
/// leaves no output for the file. Full tables are written before any
/// reduction is attempted.
pub fn segment_file(path: &Path, out_dir: &Path) -> Result<SegmentedFile> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| PipelineError::parse(path.display().to_string(), e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.strip_suffix(TEXT_SUFFIX).unwrap_or(&file_name);

    let mut parsed = Vec::new();
    for section in split_sections(&text) {
        let table = Table::from_tsv(&section.body).map_err(|e| match e {
            PipelineError::Parse { context, message } => PipelineError::parse(
                format!("{} [{}] {}", path.display(), section.tag, context),
                message,
            ),
            other => other,
        })?;
        parsed.push((section.tag, table));
    }

    std::fs::create_dir_all(out_dir)?;
    let mut written = SegmentedFile::default();

    for (tag, table) in &parsed {
        let table_path = out_dir.join(format!("{}_{}{}", stem, tag, TABLE_SUFFIX));
        info!(tag = %tag, rows = table.len(), path = %table_path.display(), "Saving table");
        table.write_tsv(&table_path)?;
        written.tables.push(table_path);

        if let Some(rule) = reduction_for(tag) {
            let reduced = table.drop_columns(rule.dropped_columns, &tag.to_string())?;
            let reduced_path = out_dir.join(rule.file_name());
            info!(tag = %tag, path = %reduced_path.display(), "Saving reduced table");
            reduced.write_tsv(&reduced_path)?;
            written.reduced.push(reduced_path);
        }
    }

    debug!(file = %path.display(), tables = written.tables.len(), "File segmented");
    Ok(written)
}

fn is_text_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(TEXT_SUFFIX))
}

fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    children.sort();
    Ok(children)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ILLUMINA: &str = "[Header]\na\tb\n1\t2\n[Probes]\nID\tDefinition\tProbe_Sequence\tOntology_Component\tOntology_Process\tOntology_Function\tSynonyms\tObsolete_Probe_Id\tArray_Address_Id\nILMN_1\tfoo\tACGT\t\t\t\t\t\t101\n";

    #[test]
    fn test_segment_file_writes_tables_and_reduction() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("GSM1_sample.txt");
        std::fs::write(&src, ILLUMINA).unwrap();
        let out = dir.path().join("out");

        let written = segment_file(&src, &out).unwrap();

        assert_eq!(
            written.tables,
            vec![out.join("GSM1_sample_Header.tsv"), out.join("GSM1_sample_Probes.tsv")]
        );
        assert_eq!(written.reduced, vec![out.join("Probes_reduced.tsv")]);
        assert_eq!(std::fs::read_to_string(out.join("GSM1_sample_Header.tsv")).unwrap(), "a\tb\n1\t2\n");
        assert_eq!(
            std::fs::read_to_string(out.join("Probes_reduced.tsv")).unwrap(),
            "ID\tArray_Address_Id\nILMN_1\t101\n"
        );
    }

    #[test]
    fn test_untagged_file_name() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("plain.txt");
        std::fs::write(&src, "x\ty\n1\t2\n").unwrap();

        let written = segment_file(&src, dir.path()).unwrap();
        assert_eq!(written.tables, vec![dir.path().join("plain_None.tsv")]);
        assert!(written.reduced.is_empty());
    }

    #[test]
    fn test_reduction_requires_columns_but_keeps_main_table() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("s.txt");
        std::fs::write(&src, "[Probes]\nID\tDefinition\n1\tfoo\n").unwrap();

        let err = segment_file(&src, dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
        assert!(dir.path().join("s_Probes.tsv").exists());
        assert!(!dir.path().join("Probes_reduced.tsv").exists());
    }

    #[test]
    fn test_malformed_section_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("bad.txt");
        std::fs::write(&src, "[Header]\na\tb\n1\t2\n[Probes]\nID\n1\t2\t3\n").unwrap();
        let out = dir.path().join("out");

        let err = segment_file(&src, &out).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { ref context, .. } if context.contains("[Probes]")));
        assert!(!out.exists());
    }

    #[test]
    fn test_empty_section_fails_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");

        for (name, text) in [
            ("gap.txt", "[Header]\n[Extra]\na\tb\n1\t2\n"),
            ("trailing.txt", "[Header]\na\tb\n1\t2\n[Extra]\n"),
            ("empty.txt", ""),
        ] {
            let src = dir.path().join(name);
            std::fs::write(&src, text).unwrap();

            let err = segment_file(&src, &out).unwrap_err();
            assert!(matches!(err, PipelineError::Parse { .. }), "{name}: {err}");
            assert!(!out.exists(), "{name} left output behind");
        }
    }

    #[test]
    fn test_only_txt_files_qualify() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::write(dir.path().join("a.txt.gz"), "x").unwrap();
        std::fs::create_dir(dir.path().join("d.txt")).unwrap();

        assert!(is_text_file(&dir.path().join("a.txt")));
        assert!(!is_text_file(&dir.path().join("a.txt.gz")));
        assert!(!is_text_file(&dir.path().join("d.txt")));
    }
}
