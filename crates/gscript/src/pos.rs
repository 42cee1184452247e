//! Source positions and the file set that resolves them to line/column.

use std::fmt;

/// An opaque, monotonically increasing offset into a [`FileSet`].
///
/// `Pos(0)` is reserved to mean "no position". Real positions start at 1
/// so that `Option<Pos>` can be represented as a plain `Pos` when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos(pub u32);

impl Pos {
    pub const NONE: Pos = Pos(0);

    pub fn is_valid(self) -> bool {
        self != Pos::NONE
    }
}

/// A resolved position: filename plus 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

/// One registered source file: its name, base offset into the shared
/// [`Pos`] space, byte length, and the offsets of each line break seen
/// so far.
struct File {
    name: String,
    base: u32,
    size: u32,
    /// Offsets (relative to `base`) of the first byte of each line after
    /// the first. Always sorted; appended to as the scanner advances.
    lines: Vec<u32>,
}

impl File {
    fn line_col(&self, offset: u32) -> (u32, u32) {
        match self.lines.binary_search(&offset) {
            Ok(idx) => (idx as u32 + 2, 1),
            Err(0) => (1, offset + 1),
            Err(idx) => (idx as u32 + 1, offset - self.lines[idx - 1] + 1),
        }
    }
}

/// An append-only registry of source files sharing one monotonic [`Pos`]
/// space. Once a file is added, its base offset and size never change,
/// so positions handed out earlier remain valid forever.
#[derive(Default)]
pub struct FileSet {
    files: Vec<File>,
}

/// Handle to a file registered in a [`FileSet`], used to report newlines
/// as the scanner discovers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileId(usize);

impl FileSet {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Registers a new file of `size` bytes and returns its id together
    /// with the `Pos` of its first byte.
    pub fn add_file(&mut self, name: impl Into<String>, size: usize) -> (FileId, Pos) {
        let base = self
            .files
            .last()
            .map_or(1, |f| f.base + f.size + 1);
        self.files.push(File {
            name: name.into(),
            base,
            size: size as u32,
            lines: Vec::new(),
        });
        (FileId(self.files.len() - 1), Pos(base))
    }

    /// Records a line break at the given absolute `Pos`, one past the
    /// newline byte. Must be called in increasing `Pos` order.
    pub fn add_line(&mut self, file: FileId, pos: Pos) {
        let f = &mut self.files[file.0];
        f.lines.push(pos.0 - f.base);
    }

    /// Returns the `Pos` of the first byte of `file`.
    pub fn base(&self, file: FileId) -> Pos {
        Pos(self.files[file.0].base)
    }

    fn file_for(&self, pos: Pos) -> Option<&File> {
        self.files
            .iter()
            .rev()
            .find(|f| pos.0 >= f.base && pos.0 <= f.base + f.size)
    }

    /// Resolves a `Pos` to a human-readable file/line/column. Positions
    /// outside any registered file resolve to `"-"` at line 0 column 0.
    pub fn resolve(&self, pos: Pos) -> Location {
        match self.file_for(pos) {
            Some(f) => {
                let (line, column) = f.line_col(pos.0 - f.base);
                Location {
                    filename: f.name.clone(),
                    line,
                    column,
                }
            }
            None => Location {
                filename: "-".to_string(),
                line: 0,
                column: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_file_resolves_to_line_one() {
        let mut set = FileSet::new();
        let (_, base) = set.add_file("test.gs", 10);
        let loc = set.resolve(Pos(base.0 + 3));
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 4);
    }

    #[test]
    fn newlines_advance_line_number() {
        let mut set = FileSet::new();
        let (id, base) = set.add_file("test.gs", 20);
        set.add_line(id, Pos(base.0 + 5));
        set.add_line(id, Pos(base.0 + 12));
        assert_eq!(set.resolve(Pos(base.0)).line, 1);
        assert_eq!(set.resolve(Pos(base.0 + 5)).line, 2);
        assert_eq!(set.resolve(Pos(base.0 + 12)).line, 3);
    }

    #[test]
    fn two_files_share_the_position_space_without_overlap() {
        let mut set = FileSet::new();
        let (_, base_a) = set.add_file("a.gs", 5);
        let (_, base_b) = set.add_file("b.gs", 5);
        assert!(base_b.0 > base_a.0 + 5);
        assert_eq!(set.resolve(base_a).filename, "a.gs");
        assert_eq!(set.resolve(base_b).filename, "b.gs");
    }
}
