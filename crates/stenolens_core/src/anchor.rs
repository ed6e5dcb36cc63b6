//! Re-anchoring of cached annotations to the current document text.
//!
//! Bindings are located by literal content, not by stored line numbers, so
//! edits elsewhere in a file shift annotations along with their code.

use stenolens_cache::{Annotation, AnnotationBinding, FragmentRecord};

/// Line table over a document.
///
/// Lines end at `\n`; a trailing `\r` is not part of the line. Columns are
/// counted in UTF-16 code units.
#[derive(Debug)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(idx, _)| idx + 1));
        Self { text, line_starts }
    }

    /// Number of lines, counting a trailing empty line.
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Zero-based line containing the byte offset.
    pub fn line_of(&self, offset: usize) -> u32 {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line as u32,
            Err(next) => (next - 1) as u32,
        }
    }

    /// Text of a line without its terminator.
    pub fn line_text(&self, line: u32) -> Option<&'a str> {
        let start = *self.line_starts.get(line as usize)?;
        let end = self
            .line_starts
            .get(line as usize + 1)
            .map_or(self.text.len(), |next| next - 1);
        let raw = &self.text[start..end];
        Some(raw.strip_suffix('\r').unwrap_or(raw))
    }

    /// Length of a line in UTF-16 code units.
    pub fn line_len(&self, line: u32) -> u32 {
        self.line_text(line)
            .map_or(0, |text| text.encode_utf16().count() as u32)
    }

    /// Zero-based UTF-16 column of the byte offset within its line.
    pub fn column_of(&self, offset: usize) -> u32 {
        let start = self.line_starts[self.line_of(offset) as usize];
        self.text[start..offset].encode_utf16().count() as u32
    }
}

/// What an anchored annotation shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationSlot {
    /// Fully materialized annotation.
    Ready(Annotation),
    /// Placeholder resolved on demand from the raw block at this 1-indexed row.
    Deferred { fragment_row: u32 },
}

/// An annotation placed on a line of the current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredAnnotation {
    /// Zero-based line of the match start.
    pub line: u32,
    /// Zero-based UTF-16 column of the match start.
    pub column: u32,
    /// UTF-16 length of the line.
    pub line_end: u32,
    pub slot: AnnotationSlot,
}

impl AnchoredAnnotation {
    /// Returns the annotation if it is materialized.
    pub fn annotation(&self) -> Option<&Annotation> {
        match &self.slot {
            AnnotationSlot::Ready(annotation) => Some(annotation),
            AnnotationSlot::Deferred { .. } => None,
        }
    }
}

/// Byte offsets of every literal occurrence of `needle`. Empty needles never match.
fn occurrences<'t>(text: &'t str, needle: &'t str) -> impl Iterator<Item = usize> + 't {
    let matches = (!needle.is_empty()).then(|| text.match_indices(needle).map(|(idx, _)| idx));
    matches.into_iter().flatten()
}

fn anchored(index: &LineIndex<'_>, offset: usize, slot: AnnotationSlot) -> AnchoredAnnotation {
    let line = index.line_of(offset);
    AnchoredAnnotation {
        line,
        column: index.column_of(offset),
        line_end: index.line_len(line),
        slot,
    }
}

/// Places every binding at each literal occurrence of its bound text.
pub fn reanchor(bindings: &[AnnotationBinding], text: &str) -> Vec<AnchoredAnnotation> {
    let index = LineIndex::new(text);
    let mut anchored_annotations: Vec<AnchoredAnnotation> = bindings
        .iter()
        .flat_map(|binding| {
            let index = &index;
            occurrences(text, &binding.bound_text).map(move |offset| {
                anchored(
                    index,
                    offset,
                    AnnotationSlot::Ready(binding.annotation.clone()),
                )
            })
        })
        .collect();
    sort_by_position(&mut anchored_annotations);
    anchored_annotations
}

/// Places a deferred annotation for each raw block.
///
/// A fragment may appear several times; the occurrence nearest its recorded
/// row wins. Fragments no longer present in the text are skipped.
pub fn anchor_deferred<'b>(
    raw_blocks: impl IntoIterator<Item = &'b FragmentRecord>,
    text: &str,
) -> Vec<AnchoredAnnotation> {
    let index = LineIndex::new(text);
    let mut anchored_annotations: Vec<AnchoredAnnotation> = raw_blocks
        .into_iter()
        .filter_map(|block| {
            let recorded_line = block.start_row.saturating_sub(1);
            let offset = occurrences(text, &block.source_text)
                .min_by_key(|&offset| index.line_of(offset).abs_diff(recorded_line))?;
            Some(anchored(
                &index,
                offset,
                AnnotationSlot::Deferred {
                    fragment_row: block.start_row,
                },
            ))
        })
        .collect();
    sort_by_position(&mut anchored_annotations);
    anchored_annotations
}

fn sort_by_position(annotations: &mut [AnchoredAnnotation]) {
    annotations.sort_by_key(|a| (a.line, a.column));
}
