//! Ownership of a single delimited block inside an otherwise user-owned text file.
//!
//! A block starts at a begin marker and ends at the matching end marker. Content may hold at
//! most one well-formed pair; anything else is reported as [`TextBlockError::MalformedMarkers`]
//! and the input is left untouched.

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TextBlockError {
    #[error("marker block is malformed: expected exactly one begin/end marker pair")]
    MalformedMarkers,
}

/// Byte range of a located block. `end` includes the line terminators that follow the end
/// marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEdit {
    pub content: String,
    pub changed: bool,
}

impl BlockEdit {
    fn unchanged(content: &str) -> Self {
        Self {
            content: content.to_string(),
            changed: false,
        }
    }

    fn changed(content: String) -> Self {
        Self {
            content,
            changed: true,
        }
    }
}

pub fn locate(content: &str, begin: &str, end: &str) -> Result<Option<Span>, TextBlockError> {
    let Some(start) = content.find(begin) else {
        if content.contains(end) {
            return Err(TextBlockError::MalformedMarkers);
        }
        return Ok(None);
    };

    let rest = &content[start + begin.len()..];
    let Some(rel_end) = rest.find(end) else {
        return Err(TextBlockError::MalformedMarkers);
    };

    let inner = &rest[..rel_end];
    let trailing = &rest[rel_end + end.len()..];
    if inner.contains(begin) || trailing.contains(begin) || trailing.contains(end) {
        return Err(TextBlockError::MalformedMarkers);
    }

    let marker_end = start + begin.len() + rel_end + end.len();
    let finish = marker_end + count_line_terminators(&content[marker_end..]);
    Ok(Some(Span {
        start,
        end: finish,
    }))
}

pub fn upsert(
    content: &str,
    begin: &str,
    end: &str,
    block: &str,
) -> Result<BlockEdit, TextBlockError> {
    let block = trim_line_terminators(block);

    if let Some(span) = locate(content, begin, end)? {
        let existing = &content[span.start..span.end];
        if normalize_comparable(existing) == normalize_comparable(block) {
            return Ok(BlockEdit::unchanged(content));
        }

        let existing_block = trim_line_terminators(existing);
        let terminators = match &existing[existing_block.len()..] {
            "" => "\n",
            kept => kept,
        };
        let mut updated = String::with_capacity(content.len() + block.len());
        updated.push_str(&content[..span.start]);
        updated.push_str(block);
        updated.push_str(terminators);
        updated.push_str(&content[span.end..]);
        return Ok(BlockEdit::changed(updated));
    }

    let prefix = trim_line_terminators(content);
    if prefix.is_empty() {
        return Ok(BlockEdit::changed(format!("{block}\n")));
    }
    Ok(BlockEdit::changed(format!("{prefix}\n\n{block}\n")))
}

pub fn remove(content: &str, begin: &str, end: &str) -> Result<BlockEdit, TextBlockError> {
    let Some(span) = locate(content, begin, end)? else {
        return Ok(BlockEdit::unchanged(content));
    };

    let left = trim_line_terminators(&content[..span.start]);
    let right = content[span.end..].trim_start_matches(['\r', '\n']);

    let mut updated = String::with_capacity(content.len());
    updated.push_str(left);
    if !left.is_empty() && !right.is_empty() {
        updated.push('\n');
    }
    updated.push_str(right);
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    Ok(BlockEdit::changed(updated))
}

fn count_line_terminators(value: &str) -> usize {
    value
        .bytes()
        .take_while(|byte| matches!(byte, b'\r' | b'\n'))
        .count()
}

fn trim_line_terminators(value: &str) -> &str {
    value.trim_end_matches(['\r', '\n'])
}

fn normalize_comparable(value: &str) -> String {
    value
        .replace("\r\n", "\n")
        .trim_end_matches('\n')
        .to_string()
}
