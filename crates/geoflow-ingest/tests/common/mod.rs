//! Shared fixtures for geoflow integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use geoflow_common::{DatasetId, PipelineError, Result};
use geoflow_ingest::{CleanupPolicy, IngestConfig, Pipeline, PipelineContext, Transport};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use url::Url;

pub const DATASET: &str = "GSE1";

/// An Illumina-style sample file with a Header and a full Probes section
pub const SAMPLE_TXT: &str = "[Header]\n\
GSGX Version\t1.9.0\n\
Report Date\t2015-01-01\n\
[Probes]\n\
ID\tDefinition\tOntology_Component\tOntology_Process\tOntology_Function\tSynonyms\tObsolete_Probe_Id\tProbe_Sequence\tArray_Address_Id\n\
ILMN_1\tfoo gene\tcc\tbp\tmf\tFOO1\t\tACGT\t101\n\
ILMN_2\tbar gene\tcc\tbp\tmf\tBAR1\t\tTTGA\t102\n\
[Controls]\n\
Array_Address_Id\tReporter_Group_Name\n\
201\thousekeeping\n";

pub fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

pub fn tar_of(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Two gzipped sample files plus one plain member
pub fn series_archive() -> Vec<u8> {
    tar_of(&[
        ("GSM1_sample.txt.gz", gzip(SAMPLE_TXT.as_bytes())),
        ("GSM2_sample.txt.gz", gzip(b"ID_REF\tVALUE\nILMN_1\t8.5\n")),
        ("GSE1_notes.csv", b"note,1\n".to_vec()),
    ])
}

pub enum Behavior {
    Serve(Vec<u8>),
    /// Write the first half of the body, then fail
    Truncate(Vec<u8>),
    Refuse,
}

/// Transport double that records every URL it is asked for
pub struct FakeTransport {
    behavior: Behavior,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64> {
        self.calls.lock().unwrap().push(url.to_string());
        match &self.behavior {
            Behavior::Serve(body) => {
                std::fs::write(dest, body)?;
                Ok(body.len() as u64)
            },
            Behavior::Truncate(body) => {
                std::fs::write(dest, &body[..body.len() / 2])?;
                Err(PipelineError::transport(url.as_str(), "connection reset"))
            },
            Behavior::Refuse => Err(PipelineError::transport(url.as_str(), "connection refused")),
        }
    }
}

pub fn config(dir: &TempDir, cleanup: CleanupPolicy) -> IngestConfig {
    IngestConfig::builder()
        .work_dir(dir.path())
        .cleanup(cleanup)
        .show_progress(false)
        .build()
        .unwrap()
}

pub fn pipeline(dir: &TempDir, cleanup: CleanupPolicy, transport: Arc<FakeTransport>) -> Pipeline {
    let ctx = PipelineContext::new(DatasetId::new(DATASET).unwrap(), config(dir, cleanup));
    Pipeline::new(ctx, transport)
}

pub fn archive_path(dir: &TempDir) -> PathBuf {
    dir.path().join("data").join(format!("{DATASET}_RAW.tar"))
}

pub fn extracted(dir: &TempDir) -> PathBuf {
    dir.path().join("extracted").join(DATASET)
}

pub fn processed(dir: &TempDir) -> PathBuf {
    dir.path().join("processed").join(DATASET)
}

/// Every file under `root` with its contents, sorted by path
pub fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let contents = std::fs::read(&path).unwrap();
                files.push((path, contents));
            }
        }
    }
    files.sort();
    files
}
