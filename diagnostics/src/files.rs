use crate::render::SourceProvider;
use crate::FileId;
use std::sync::Arc;

/// A minimal in-memory store of file names and source text for rendering
/// diagnostics in tests, CLIs, and harnesses without needing a custom
/// [`SourceProvider`] implementation.
///
/// `FileId`s are allocated deterministically in insertion order starting from
/// zero. Source text is stored in `Arc<str>` to make cloning cheap.
#[derive(Clone, Debug, Default)]
pub struct SimpleFiles {
  files: Vec<SimpleFile>,
}

#[derive(Clone, Debug)]
struct SimpleFile {
  name: Arc<str>,
  text: Arc<str>,
}

impl SimpleFiles {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a new file and returns its [`FileId`]. The id is monotonically
  /// increasing and stable for the lifetime of the `SimpleFiles` instance.
  pub fn add(&mut self, name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> FileId {
    assert!(self.files.len() < u32::MAX as usize, "file count overflow");
    let file = FileId(self.files.len() as u32);
    self.files.push(SimpleFile {
      name: name.into(),
      text: text.into(),
    });
    file
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

impl SourceProvider for SimpleFiles {
  fn file_name(&self, file: FileId) -> Option<&str> {
    self.files.get(file.0 as usize).map(|f| f.name.as_ref())
  }

  fn file_text(&self, file: FileId) -> Option<&str> {
    self.files.get(file.0 as usize).map(|f| f.text.as_ref())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ids_are_insertion_ordered() {
    let mut files = SimpleFiles::new();
    let a = files.add("a.dml", "Item {}");
    let b = files.add("b.dml", "Text {}");
    assert_eq!(a, FileId(0));
    assert_eq!(b, FileId(1));
    assert_eq!(files.file_name(b), Some("b.dml"));
    assert_eq!(files.file_text(a), Some("Item {}"));
    assert_eq!(files.file_name(FileId(9)), None);
  }
}
