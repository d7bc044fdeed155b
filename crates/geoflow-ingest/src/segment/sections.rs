//! Known section kinds and their reduction rules

use super::splitter::SectionTag;

/// Verbose annotation columns dropped from `Probes` tables
pub const PROBES_DROPPED_COLUMNS: &[&str] = &[
    "Definition",
    "Ontology_Component",
    "Ontology_Process",
    "Ontology_Function",
    "Synonyms",
    "Obsolete_Probe_Id",
    "Probe_Sequence",
];

/// A projection written alongside the full table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionRule {
    /// File stem of the reduced table, written as `<stem>.tsv`
    pub output_stem: &'static str,
    pub dropped_columns: &'static [&'static str],
}

impl ReductionRule {
    pub fn file_name(&self) -> String {
        format!("{}.tsv", self.output_stem)
    }
}

/// Section tags with known meaning in Illumina expression files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownSection {
    Header,
    Probes,
    Controls,
}

impl KnownSection {
    pub fn from_tag(tag: &SectionTag) -> Option<Self> {
        match tag.name()? {
            "Header" => Some(KnownSection::Header),
            "Probes" => Some(KnownSection::Probes),
            "Controls" => Some(KnownSection::Controls),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KnownSection::Header => "Header",
            KnownSection::Probes => "Probes",
            KnownSection::Controls => "Controls",
        }
    }

    pub fn reduction(self) -> Option<ReductionRule> {
        match self {
            KnownSection::Probes => Some(ReductionRule {
                output_stem: "Probes_reduced",
                dropped_columns: PROBES_DROPPED_COLUMNS,
            }),
            KnownSection::Header | KnownSection::Controls => None,
        }
    }
}

/// Reduction rule for a tag, if its kind has one
pub fn reduction_for(tag: &SectionTag) -> Option<ReductionRule> {
    KnownSection::from_tag(tag).and_then(KnownSection::reduction)
}
