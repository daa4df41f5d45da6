//! Thread-safe pool of file descriptors for one physical file.
//!
//! The pool is a textbook bounded resource pool modeled as an arena of
//! descriptors: slots live behind indices in a `Vec`, not behind raw
//! pointers, so the vector can grow under the guard without invalidating
//! tickets already handed out.
//!
//! The non-blocking slot scan mirrors the `try_lock` probe in
//! `node/db/src/rolling/gc.rs`'s garbage collector, generalized from a
//! single advisory lock to a whole pool of them.

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::MultiFileError;

struct Slot {
    file: Option<File>,
}

type SlotGuard = ArcMutexGuard<RawMutex, Slot>;

/// A shared, thread-safe handle to one physical file, lazily opened per
/// concurrent accessor.
pub struct MultiFile {
    path: PathBuf,
    slots: Mutex<Vec<Arc<Mutex<Slot>>>>,
}

/// An opaque ticket binding the caller to one descriptor slot.
///
/// Dropping the ticket is equivalent to the spec's explicit `return`
/// operation: the per-slot lock is released and the slot becomes available
/// to the next `access`.
pub struct Ticket {
    index: usize,
    guard: SlotGuard,
    sentinel: bool,
}

impl MultiFile {
    /// Build a handle over `path` without opening anything yet; the first
    /// physical open happens on the first `access`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MultiFile {
            path: path.into(),
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire a ticket. Walks the slot vector under a short guard, takes
    /// the first slot whose lock can be acquired non-blockingly, and
    /// releases the guard before doing any I/O. Appends a new slot if every
    /// existing one is currently held.
    #[tracing::instrument(level = "trace", skip(self), fields(path = %self.path.display()))]
    pub fn access(&self) -> Ticket {
        let mut slots = self.slots.lock();
        for (index, slot) in slots.iter().enumerate() {
            if let Some(guard) = slot.try_lock_arc() {
                drop(slots);
                trace!(index, "reused free slot");
                return self.bind(index, guard);
            }
        }
        let fresh = Arc::new(Mutex::new(Slot { file: None }));
        let guard = fresh
            .try_lock_arc()
            .expect("a freshly created slot cannot be contended");
        slots.push(fresh);
        let index = slots.len() - 1;
        drop(slots);
        trace!(index, "appended new slot");
        self.bind(index, guard)
    }

    fn bind(&self, index: usize, mut guard: SlotGuard) -> Ticket {
        if guard.file.is_none() {
            match File::open(&self.path) {
                Ok(file) => guard.file = Some(file),
                Err(source) => {
                    debug!(path = %self.path.display(), %source, "failed to open file on first use");
                    return Ticket {
                        index,
                        guard,
                        sentinel: true,
                    };
                }
            }
        }
        Ticket {
            index,
            guard,
            sentinel: false,
        }
    }

    /// Number of descriptor slots allocated so far (bounded by the peak
    /// concurrent `access` count).
    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }
}

impl Ticket {
    /// Index of the slot this ticket is bound to.
    pub fn slot_index(&self) -> usize {
        self.index
    }

    /// A sentinel ticket is returned when the physical file could not be
    /// opened; every I/O operation against it refuses.
    pub fn is_sentinel(&self) -> bool {
        self.sentinel
    }

    fn file_mut(&mut self) -> Result<&mut File, MultiFileError> {
        if self.sentinel {
            return Err(MultiFileError::SentinelTicket);
        }
        Ok(self
            .guard
            .file
            .as_mut()
            .expect("non-sentinel ticket always holds an open file"))
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, MultiFileError> {
        Ok(self.file_mut()?.seek(pos)?)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), MultiFileError> {
        self.file_mut()?.read_exact(buf)?;
        Ok(())
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, MultiFileError> {
        Ok(self.file_mut()?.read(buf)?)
    }

    pub fn tell(&mut self) -> Result<u64, MultiFileError> {
        self.seek(SeekFrom::Current(0))
    }

    pub fn metadata_len(&mut self) -> Result<u64, MultiFileError> {
        Ok(self.file_mut()?.metadata()?.len())
    }

    /// Explicit release, equivalent to dropping the ticket.
    pub fn release(self) {
        drop(self);
    }
}

impl io::Read for Ticket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file_mut()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
            .read(buf)
    }
}

impl io::Seek for Ticket {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file_mut()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
            .seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(contents: &[u8]) -> tempfile::TempPath {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.into_temp_path()
    }

    #[test]
    fn access_opens_lazily_and_reads() {
        let path = fixture(b"hello world");
        let handle = MultiFile::new(&path);
        assert_eq!(handle.slot_count(), 0);

        let mut ticket = handle.access();
        assert!(!ticket.is_sentinel());
        let mut buf = [0u8; 5];
        ticket.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(handle.slot_count(), 1);
    }

    #[test]
    fn concurrent_access_gets_independent_slots() {
        let path = fixture(b"0123456789");
        let handle = MultiFile::new(&path);

        let mut t1 = handle.access();
        let mut t2 = handle.access();
        assert_ne!(t1.slot_index(), t2.slot_index());
        assert_eq!(handle.slot_count(), 2);

        t1.seek(SeekFrom::Start(5)).unwrap();
        let mut buf1 = [0u8; 2];
        t1.read_exact(&mut buf1).unwrap();
        assert_eq!(&buf1, b"56");

        let mut buf2 = [0u8; 2];
        t2.read_exact(&mut buf2).unwrap();
        assert_eq!(&buf2, b"01");
    }

    #[test]
    fn slot_is_reused_after_release() {
        let path = fixture(b"abcdef");
        let handle = MultiFile::new(&path);
        let t1 = handle.access();
        let idx = t1.slot_index();
        t1.release();
        let t2 = handle.access();
        assert_eq!(t2.slot_index(), idx);
        assert_eq!(handle.slot_count(), 1);
    }

    #[test]
    fn missing_file_yields_sentinel_ticket() {
        let handle = MultiFile::new("/nonexistent/path/to/nowhere");
        let mut ticket = handle.access();
        assert!(ticket.is_sentinel());
        let mut buf = [0u8; 1];
        assert!(ticket.read_exact(&mut buf).is_err());
    }
}
