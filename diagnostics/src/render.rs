use crate::Diagnostic;
use crate::FileId;
use crate::Label;
use crate::TextRange;
use std::fmt::Write;

/// Provides access to source text for rendering diagnostics.
///
/// Either accessor may return `None`; the renderer then falls back to a
/// placeholder instead of caret-highlighted source lines. Engines that only
/// ever handle precompiled tables typically have no source text at all.
pub trait SourceProvider {
  fn file_name(&self, file: FileId) -> Option<&str>;
  fn file_text(&self, file: FileId) -> Option<&str>;
}

/// Render a diagnostic into a human-readable string with caret highlighting.
///
/// Output shape (one file group per distinct label file, primary first):
///
/// ```text
/// error[CODE]: message
///  --> name:line:col
///   |
/// 1 | source line
///   |    ^^^^ label message
/// = note: ...
/// ```
pub fn render_diagnostic(provider: &dyn SourceProvider, diagnostic: &Diagnostic) -> String {
  let mut output = String::new();
  writeln!(
    output,
    "{}[{}]: {}",
    diagnostic.severity, diagnostic.code, diagnostic.message
  )
  .unwrap();

  let mut labels = Vec::with_capacity(diagnostic.labels.len() + 1);
  labels.push(Label {
    span: diagnostic.primary,
    message: diagnostic.message.clone(),
    is_primary: true,
  });
  labels.extend(diagnostic.labels.iter().cloned());

  for label in &labels {
    render_label(provider, &mut output, label);
  }

  for note in &diagnostic.notes {
    writeln!(output, "= note: {}", note).unwrap();
  }

  output
}

fn render_label(provider: &dyn SourceProvider, output: &mut String, label: &Label) {
  let name = provider.file_name(label.span.file).unwrap_or("<unknown file>");
  let Some(text) = provider.file_text(label.span.file) else {
    writeln!(output, " --> {}:?:?", name).unwrap();
    if !label.message.is_empty() && !label.is_primary {
      writeln!(output, "  = label: {}", label.message).unwrap();
    }
    return;
  };

  let (start, end) = clamp_range(text, label.span.range);
  let lines = LineIndex::new(text);
  let (line, col) = lines.line_and_column(start);
  writeln!(output, " --> {}:{}:{}", name, line, col).unwrap();

  let line_idx = line - 1;
  let (line_start, line_end) = lines.bounds(line_idx);
  let gutter = line.to_string().len().max(1);

  writeln!(output, "{:>width$} |", "", width = gutter).unwrap();
  writeln!(
    output,
    "{:>width$} | {}",
    line,
    &text[line_start..line_end],
    width = gutter
  )
  .unwrap();

  // Underline only the portion of the span on its first line; multi-line
  // spans extend the caret run to the end of that line.
  let underline_start = start - line_start;
  let underline_end = end.min(line_end).max(start) - line_start;
  let marker = if label.is_primary { '^' } else { '-' };
  let mut caret_row = String::new();
  caret_row.push_str(&" ".repeat(underline_start));
  caret_row.push_str(&marker.to_string().repeat((underline_end - underline_start).max(1)));
  if !label.message.is_empty() {
    caret_row.push(' ');
    caret_row.push_str(&label.message);
  }
  writeln!(output, "{:>width$} | {}", "", caret_row, width = gutter).unwrap();
}

fn clamp_range(text: &str, range: TextRange) -> (usize, usize) {
  let clamp = |offset: usize| {
    let mut offset = offset.min(text.len());
    while offset > 0 && !text.is_char_boundary(offset) {
      offset -= 1;
    }
    offset
  };
  let start = clamp(range.start as usize);
  let end = clamp(range.end as usize).max(start);
  (start, end)
}

struct LineIndex {
  starts: Vec<usize>,
  len: usize,
}

impl LineIndex {
  fn new(text: &str) -> Self {
    let mut starts = vec![0];
    for (idx, byte) in text.bytes().enumerate() {
      if byte == b'\n' {
        starts.push(idx + 1);
      }
    }
    Self {
      starts,
      len: text.len(),
    }
  }

  /// 1-based (line, column) for a byte offset.
  fn line_and_column(&self, offset: usize) -> (usize, usize) {
    let line_idx = match self.starts.binary_search(&offset) {
      Ok(idx) => idx,
      Err(idx) => idx - 1,
    };
    (line_idx + 1, offset - self.starts[line_idx] + 1)
  }

  /// Byte bounds of a 0-based line, excluding the trailing newline.
  fn bounds(&self, line_idx: usize) -> (usize, usize) {
    let start = *self.starts.get(line_idx).unwrap_or(&self.len);
    let end = if line_idx + 1 < self.starts.len() {
      self.starts[line_idx + 1].saturating_sub(1)
    } else {
      self.len
    };
    (start, end.max(start))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Span;

  struct OneFile(&'static str);

  impl SourceProvider for OneFile {
    fn file_name(&self, _file: FileId) -> Option<&str> {
      Some("doc.dml")
    }

    fn file_text(&self, _file: FileId) -> Option<&str> {
      Some(self.0)
    }
  }

  #[test]
  fn points_at_later_lines() {
    let source = OneFile("Item {\n  width: true\n}\n");
    let diag = Diagnostic::error("TEST0001", "cannot convert", Span {
      file: FileId(0),
      range: TextRange::new(9, 14),
    });
    let rendered = render_diagnostic(&source, &diag);
    assert!(rendered.contains(" --> doc.dml:2:3"));
    assert!(rendered.contains("2 |   width: true"));
    assert!(rendered.contains("^^^^^ cannot convert"));
  }

  #[test]
  fn zero_width_span_renders_one_caret() {
    let source = OneFile("Item {}");
    let diag = Diagnostic::error("TEST0002", "here", Span {
      file: FileId(0),
      range: TextRange::new(4, 4),
    });
    let rendered = render_diagnostic(&source, &diag);
    assert!(rendered.contains("^ here"));
  }
}
