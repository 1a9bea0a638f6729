//! Common abstractions used in the mucgly crates.
//!
//! The main item is the [`FileSystem`] trait, which the preprocessor and the
//! script host use for all file access. Extracting these operations to a
//! trait means they can be mocked out in unit tests: see
//! [`InMemoryFileSystem`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// File system operations the preprocessor may need to perform.
pub trait FileSystem {
    /// Open a file for streaming reads.
    fn open_input(&self, path: &Path) -> io::Result<Box<dyn io::BufRead>>;

    /// Create a file (truncating any existing one) for streaming writes.
    fn create_output(&self, path: &Path) -> io::Result<Box<dyn Write>>;

    /// Read the entire contents of a file into a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

impl<F: FileSystem + ?Sized> FileSystem for Rc<F> {
    fn open_input(&self, path: &Path) -> io::Result<Box<dyn io::BufRead>> {
        (**self).open_input(path)
    }
    fn create_output(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        (**self).create_output(path)
    }
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        (**self).read_to_string(path)
    }
}

/// Implementation of the file system trait that uses the real file system.
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn open_input(&self, path: &Path) -> io::Result<Box<dyn io::BufRead>> {
        let file = std::fs::File::open(path)?;
        Ok(Box::new(io::BufReader::new(file)))
    }
    fn create_output(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        let file = std::fs::File::create(path)?;
        Ok(Box::new(io::BufWriter::new(file)))
    }
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// A byte buffer that can be shared between an output handle and a test.
///
/// Writes append to the buffer; clones observe the same bytes.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> SharedBuffer {
        Default::default()
    }

    /// Return a copy of the bytes written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    /// Return the bytes written so far, lossily decoded as UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory file system for use in unit tests.
///
/// Input files are added up front with [`add_file`](InMemoryFileSystem::add_file).
/// Output files are captured in [`SharedBuffer`]s which the test retrieves
/// with [`output`](InMemoryFileSystem::output) after the code under test has
/// run.
#[derive(Default)]
pub struct InMemoryFileSystem {
    files: HashMap<PathBuf, Vec<u8>>,
    outputs: RefCell<HashMap<PathBuf, SharedBuffer>>,
}

impl InMemoryFileSystem {
    pub fn new() -> InMemoryFileSystem {
        Default::default()
    }

    /// Add an input file to the in-memory file system.
    pub fn add_file<P: Into<PathBuf>, C: Into<Vec<u8>>>(&mut self, path: P, contents: C) {
        self.files.insert(path.into(), contents.into());
    }

    /// Return the buffer backing an output file created by the code under test.
    pub fn output<P: AsRef<Path>>(&self, path: P) -> Option<SharedBuffer> {
        self.outputs.borrow().get(path.as_ref()).cloned()
    }
}

impl FileSystem for InMemoryFileSystem {
    fn open_input(&self, path: &Path) -> io::Result<Box<dyn io::BufRead>> {
        match self.files.get(path) {
            None => Err(io::Error::new(io::ErrorKind::NotFound, "not found")),
            Some(contents) => Ok(Box::new(io::Cursor::new(contents.clone()))),
        }
    }
    fn create_output(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        let buffer = SharedBuffer::new();
        self.outputs
            .borrow_mut()
            .insert(path.to_path_buf(), buffer.clone());
        Ok(Box::new(buffer))
    }
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.files.get(path) {
            None => Err(io::Error::new(io::ErrorKind::NotFound, "not found")),
            Some(contents) => String::from_utf8(contents.clone())
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn in_memory_round_trip() {
        let mut fs = InMemoryFileSystem::new();
        fs.add_file("a.txt", "contents");

        let mut reader = fs.open_input(Path::new("a.txt")).unwrap();
        let mut got = String::new();
        reader.read_line(&mut got).unwrap();
        assert_eq!(got, "contents");

        assert!(fs.open_input(Path::new("missing.txt")).is_err());
    }

    #[test]
    fn in_memory_output_capture() {
        let fs = InMemoryFileSystem::new();
        let mut writer = fs.create_output(Path::new("out.txt")).unwrap();
        writer.write_all(b"hello").unwrap();
        assert_eq!(fs.output("out.txt").unwrap().contents(), b"hello");
        assert!(fs.output("other.txt").is_none());
    }

    #[test]
    fn shared_buffer_clones_observe_writes() {
        let buffer = SharedBuffer::new();
        let mut clone = buffer.clone();
        clone.write_all(b"xyz").unwrap();
        assert_eq!(buffer.to_string_lossy(), "xyz");
    }
}
