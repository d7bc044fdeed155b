//! Line-oriented splitter for bracket-tagged multi-table text
//!
//! Illumina sample files (and similar GEO supplementary text) look like:
//!
//! ```text
//! [Header]
//! GSGX Version	1.9.0
//! [Probes]
//! ID	Definition	Probe_Sequence
//! ILMN_1	foo	ACGT
//! ```
//!
//! A line starting with `[` opens a section; every other line belongs to the
//! section currently open. The splitter does not interpret section bodies.

/// Section-open bracket
pub const TAG_OPEN: char = '[';

/// Label of one section, or `Untagged` for content seen before any tag
///
/// `Untagged` renders as `None` in output file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionTag {
    Untagged,
    Named(String),
}

impl SectionTag {
    /// Tag carried by a section-open line: brackets and line terminators are
    /// stripped from both ends
    pub fn from_line(line: &str) -> Self {
        SectionTag::Named(
            line.trim_matches(|c| matches!(c, '[' | ']' | '\r' | '\n'))
                .to_string(),
        )
    }

    /// A tag counts as set only when it has a non-empty name
    pub fn is_set(&self) -> bool {
        matches!(self, SectionTag::Named(name) if !name.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            SectionTag::Named(name) => Some(name),
            SectionTag::Untagged => None,
        }
    }
}

impl std::fmt::Display for SectionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionTag::Named(name) => f.write_str(name),
            SectionTag::Untagged => f.write_str("None"),
        }
    }
}

/// A finalized section: its tag and the raw lines that followed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub tag: SectionTag,
    pub body: String,
}

/// State machine over lines: (current tag, buffered lines)
///
/// A tag line finalizes the buffer only when a tag is already set; otherwise
/// the buffered lines carry over into the next section. [`finish`] always
/// finalizes, so the last section runs to end of input and a file without any
/// tag line still yields one untagged section.
///
/// [`finish`]: SectionSplitter::finish
#[derive(Debug)]
pub struct SectionSplitter {
    current: SectionTag,
    buffer: String,
    sections: Vec<Section>,
}

impl Default for SectionSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionSplitter {
    pub fn new() -> Self {
        Self {
            current: SectionTag::Untagged,
            buffer: String::new(),
            sections: Vec::new(),
        }
    }

    /// Feed one line, including its terminator if it has one
    pub fn feed(&mut self, line: &str) {
        if line.starts_with(TAG_OPEN) {
            if self.current.is_set() {
                self.finalize();
            }
            self.current = SectionTag::from_line(line);
            return;
        }
        self.buffer.push_str(line);
    }

    pub fn finish(mut self) -> Vec<Section> {
        self.finalize();
        self.sections
    }

    fn finalize(&mut self) {
        let body = std::mem::take(&mut self.buffer);
        let tag = self.current.clone();

        // A repeated tag replaces the earlier section in place
        match self.sections.iter_mut().find(|s| s.tag == tag) {
            Some(existing) => existing.body = body,
            None => self.sections.push(Section { tag, body }),
        }
    }
}

/// Split a whole document into sections
pub fn split_sections(text: &str) -> Vec<Section> {
    let mut splitter = SectionSplitter::new();
    for line in text.split_inclusive('\n') {
        splitter.feed(line);
    }
    splitter.finish()
}
