//! Shared diagnostics model and rendering utilities.
//!
//! The data structures here are intentionally minimal and deterministic so
//! they can be reused across table loading, instantiation, and incubation
//! without pulling in any heavy dependencies.
//!
//! ```
//! use diagnostics::render::{render_diagnostic, SourceProvider};
//! use diagnostics::{Diagnostic, FileId, Span, TextRange};
//!
//! struct SingleFile {
//!   name: String,
//!   text: String,
//! }
//!
//! impl SourceProvider for SingleFile {
//!   fn file_name(&self, _file: FileId) -> Option<&str> {
//!     Some(&self.name)
//!   }
//!
//!   fn file_text(&self, _file: FileId) -> Option<&str> {
//!     Some(&self.text)
//!   }
//! }
//!
//! let file = FileId(0);
//! let provider = SingleFile {
//!   name: "Example.dml".into(),
//!   text: "Item { width: 10 }".into(),
//! };
//! let diag = Diagnostic::error(
//!   "TEST0001",
//!   "an example error",
//!   Span {
//!     file,
//!     range: TextRange::new(7, 12),
//!   },
//! );
//!
//! let rendered = render_diagnostic(&provider, &diag);
//! assert!(rendered.contains("TEST0001"));
//! assert!(rendered.contains("--> Example.dml:1:8"));
//! ```

mod files;
pub mod render;

pub use crate::files::SimpleFiles;

use std::fmt::Display;
use std::fmt::Formatter;

/// A stable identifier for a file (here: a compiled document) in a program.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A byte range in a file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextRange {
  pub start: u32,
  pub end: u32,
}

impl TextRange {
  pub const fn new(start: u32, end: u32) -> Self {
    Self { start, end }
  }

  /// The empty range at offset zero. Compiled tables assembled in memory
  /// (rather than loaded from a document) use this for their spans.
  pub const EMPTY: TextRange = TextRange::new(0, 0);

  pub fn len(&self) -> u32 {
    self.end.saturating_sub(self.start)
  }

  pub fn is_empty(&self) -> bool {
    self.start >= self.end
  }
}

/// A span across a specific file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Span {
  pub file: FileId,
  pub range: TextRange,
}

impl Span {
  pub const fn new(file: FileId, range: TextRange) -> Self {
    Self { file, range }
  }

  /// A span covering nothing in file zero, for synthesized records.
  pub const NONE: Span = Span::new(FileId(0), TextRange::EMPTY);
}

/// Diagnostic severity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Severity {
  Error,
  Warning,
  Note,
  Help,
}

impl Severity {
  pub const fn as_str(&self) -> &'static str {
    match self {
      Severity::Error => "error",
      Severity::Warning => "warning",
      Severity::Note => "note",
      Severity::Help => "help",
    }
  }
}

impl Display for Severity {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A label attached to a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
  pub span: Span,
  pub message: String,
  pub is_primary: bool,
}

impl Label {
  pub fn new(span: Span, message: impl Into<String>, is_primary: bool) -> Self {
    Self {
      span,
      message: message.into(),
      is_primary,
    }
  }

  pub fn primary(span: Span, message: impl Into<String>) -> Self {
    Self::new(span, message, true)
  }

  pub fn secondary(span: Span, message: impl Into<String>) -> Self {
    Self::new(span, message, false)
  }
}

/// A user-facing diagnostic with optional labels and notes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
  pub code: &'static str,
  pub severity: Severity,
  pub message: String,
  pub primary: Span,
  pub labels: Vec<Label>,
  pub notes: Vec<String>,
}

impl Diagnostic {
  pub fn new(
    severity: Severity,
    code: &'static str,
    message: impl Into<String>,
    primary: Span,
  ) -> Self {
    Self {
      code,
      severity,
      message: message.into(),
      primary,
      labels: Vec::new(),
      notes: Vec::new(),
    }
  }

  pub fn error(code: &'static str, message: impl Into<String>, primary: Span) -> Self {
    Self::new(Severity::Error, code, message, primary)
  }

  pub fn warning(code: &'static str, message: impl Into<String>, primary: Span) -> Self {
    Self::new(Severity::Warning, code, message, primary)
  }

  pub fn note(code: &'static str, message: impl Into<String>, primary: Span) -> Self {
    Self::new(Severity::Note, code, message, primary)
  }

  pub fn with_label(mut self, label: Label) -> Self {
    self.labels.push(label);
    self
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    self.notes.push(note.into());
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::render::render_diagnostic;
  use crate::render::SourceProvider;

  struct TestSource {
    name: String,
    text: String,
  }

  impl SourceProvider for TestSource {
    fn file_name(&self, _file: FileId) -> Option<&str> {
      Some(&self.name)
    }

    fn file_text(&self, _file: FileId) -> Option<&str> {
      Some(&self.text)
    }
  }

  #[test]
  fn render_single_line_span() {
    let source = TestSource {
      name: "test.dml".into(),
      text: "Item { w: 1 }".into(),
    };
    let diagnostic = Diagnostic::error("TEST0001", "no such property", Span {
      file: FileId(0),
      range: TextRange::new(7, 8),
    });

    let rendered = render_diagnostic(&source, &diagnostic);
    let expected =
      "error[TEST0001]: no such property\n --> test.dml:1:8\n  |\n1 | Item { w: 1 }\n  |        ^ no such property\n";
    assert_eq!(rendered, expected);
  }

  #[test]
  fn renders_notes_after_carets() {
    let source = TestSource {
      name: "test.dml".into(),
      text: "Item {}".into(),
    };
    let diagnostic = Diagnostic::error("TEST0002", "required property not set", Span {
      file: FileId(0),
      range: TextRange::new(0, 4),
    })
    .with_note("it can also be set through alias \"shortcut\"");

    let rendered = render_diagnostic(&source, &diagnostic);
    assert!(rendered.contains("= note: it can also be set through alias"));
  }

  #[test]
  fn renders_placeholder_for_missing_source() {
    struct NoSource;
    impl SourceProvider for NoSource {
      fn file_name(&self, _file: FileId) -> Option<&str> {
        None
      }

      fn file_text(&self, _file: FileId) -> Option<&str> {
        None
      }
    }

    let diagnostic = Diagnostic::error("TEST0003", "boom", Span::NONE);
    let rendered = render_diagnostic(&NoSource, &diagnostic);
    assert!(rendered.contains("error[TEST0003]: boom"));
    assert!(rendered.contains("<unknown file>"));
  }

  #[test]
  fn secondary_labels_follow_primary() {
    let source = TestSource {
      name: "a.dml".into(),
      text: "abcdef".into(),
    };
    let diagnostic = Diagnostic::warning("TEST0004", "ordering", Span {
      file: FileId(0),
      range: TextRange::new(2, 3),
    })
    .with_label(Label::secondary(
      Span {
        file: FileId(0),
        range: TextRange::new(4, 5),
      },
      "related",
    ));

    let rendered = render_diagnostic(&source, &diagnostic);
    let primary_pos = rendered.find("ordering").unwrap();
    let secondary_pos = rendered.find("related").unwrap();
    assert!(primary_pos < secondary_pos);
  }
}
