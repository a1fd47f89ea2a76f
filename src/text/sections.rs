//! Marker-delimited section extraction.
//!
//! Stage transcripts carry their structure inline: reasoning is wrapped in
//! `<think>..</think>` and deliverable text in `<answer>..</answer>`. The
//! scanner walks a transcript once, left to right, alternating between
//! looking for a start marker and looking for the end marker that closes it.
//!
//! Matching rules:
//! - markers are matched literally and case-sensitively;
//! - sections never overlap; after a start marker the *next* end marker closes it;
//! - a start marker seen while a section is open is part of that section's content;
//! - a trailing start marker with no end marker is dropped silently;
//! - section content is trimmed of surrounding whitespace.

/// A start/end marker pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionMarkers {
    pub start: &'static str,
    pub end: &'static str,
}

impl SectionMarkers {
    pub const fn new(start: &'static str, end: &'static str) -> Self {
        Self { start, end }
    }
}

/// Deliverable text sections.
pub const ANSWER: SectionMarkers = SectionMarkers::new("<answer>", "</answer>");

/// Reasoning sections.
pub const THINK: SectionMarkers = SectionMarkers::new("<think>", "</think>");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    SeekingStart,
    /// Inside a section whose content begins at the given byte offset.
    SeekingEnd(usize),
    Exhausted,
}

/// Lazy iterator over the trimmed sections of a text.
///
/// The scanner borrows the text and yields sub-slices, so collecting is only
/// needed when the caller wants owned strings. Cloning a scanner restarts
/// nothing; create a new one with [`SectionScanner::new`] to scan again.
#[derive(Debug, Clone)]
pub struct SectionScanner<'a> {
    text: &'a str,
    markers: SectionMarkers,
    cursor: usize,
    state: ScanState,
}

impl<'a> SectionScanner<'a> {
    pub fn new(text: &'a str, markers: SectionMarkers) -> Self {
        let state = if markers.start.is_empty() || markers.end.is_empty() {
            ScanState::Exhausted
        } else {
            ScanState::SeekingStart
        };
        Self {
            text,
            markers,
            cursor: 0,
            state,
        }
    }
}

impl<'a> Iterator for SectionScanner<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                ScanState::Exhausted => return None,
                ScanState::SeekingStart => match self.text[self.cursor..].find(self.markers.start) {
                    Some(offset) => {
                        let content_start = self.cursor + offset + self.markers.start.len();
                        self.cursor = content_start;
                        self.state = ScanState::SeekingEnd(content_start);
                    }
                    None => {
                        self.state = ScanState::Exhausted;
                    }
                },
                ScanState::SeekingEnd(content_start) => {
                    match self.text[self.cursor..].find(self.markers.end) {
                        Some(offset) => {
                            let content_end = self.cursor + offset;
                            self.cursor = content_end + self.markers.end.len();
                            self.state = ScanState::SeekingStart;
                            return Some(self.text[content_start..content_end].trim());
                        }
                        None => {
                            // unclosed trailing section
                            self.state = ScanState::Exhausted;
                        }
                    }
                }
            }
        }
    }
}

/// Extract all sections delimited by `markers`, in order of appearance.
pub fn extract_sections(text: &str, markers: SectionMarkers) -> Vec<String> {
    SectionScanner::new(text, markers)
        .map(str::to_string)
        .collect()
}

/// Count the sections delimited by `markers` without allocating.
pub fn count_sections(text: &str, markers: SectionMarkers) -> usize {
    SectionScanner::new(text, markers).count()
}
