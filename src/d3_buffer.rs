//! Virtual word-addressable stream over an ordered family of files.
//!
//! A `D3Buffer` hides the fact that a d3plot dump is striped across
//! `root`, `root01`, `root02`, … behind one logical word stream; callers
//! address it by word position and never see the underlying files.

use byteorder::{ByteOrder, LittleEndian};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::D3BufferError;
use crate::multi_file::MultiFile;

/// Valid range for the NDIM field, also used to disambiguate word size at
/// open time.
const NDIM_RANGE: std::ops::RangeInclusive<u32> = 2..=7;

pub struct D3Buffer {
    handles: Vec<MultiFile>,
    file_sizes: Vec<u64>,
    word_size: u8,
    cursor: u64,
}

fn family_member_path(root: &Path, index: usize) -> PathBuf {
    let root_str = root.to_string_lossy();
    if index < 100 {
        PathBuf::from(format!("{root_str}{index:02}"))
    } else {
        PathBuf::from(format!("{root_str}{index}"))
    }
}

fn detect_word_size(first: &MultiFile) -> Result<u8, D3BufferError> {
    let mut ticket = first.access();
    if ticket.is_sentinel() {
        return Err(D3BufferError::BrokenFiles);
    }

    ticket.seek(SeekFrom::Start(60))?;
    let mut buf32 = [0u8; 4];
    ticket.read_exact(&mut buf32)?;
    let candidate_32 = LittleEndian::read_u32(&buf32);

    ticket.seek(SeekFrom::Start(120))?;
    let mut buf64 = [0u8; 8];
    ticket.read_exact(&mut buf64)?;
    let candidate_64 = LittleEndian::read_u64(&buf64);
    let candidate_64_fits = u32::try_from(candidate_64).map(|v| NDIM_RANGE.contains(&v));

    let ok32 = NDIM_RANGE.contains(&candidate_32);
    let ok64 = matches!(candidate_64_fits, Ok(true));

    match (ok32, ok64) {
        (true, false) => Ok(4),
        (false, true) => Ok(8),
        _ => Err(D3BufferError::BrokenFiles),
    }
}

impl D3Buffer {
    /// Open the file family rooted at `root`, probing `root01`, `root02`, …
    /// until a member does not exist, then detect the word size.
    #[tracing::instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> Result<D3Buffer, D3BufferError> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(D3BufferError::NoFilesFound(root.to_path_buf()));
        }

        let mut paths = vec![root.to_path_buf()];
        let mut index = 1;
        loop {
            let candidate = family_member_path(root, index);
            if candidate.exists() {
                paths.push(candidate);
                index += 1;
            } else {
                break;
            }
        }

        let mut handles = Vec::with_capacity(paths.len());
        let mut file_sizes = Vec::with_capacity(paths.len());
        for path in &paths {
            file_sizes.push(std::fs::metadata(path)?.len());
            handles.push(MultiFile::new(path));
        }

        let word_size = detect_word_size(&handles[0])?;
        debug!(
            files = handles.len(),
            word_size, "opened d3 buffer file family"
        );

        Ok(D3Buffer {
            handles,
            file_sizes,
            word_size,
            cursor: 0,
        })
    }

    pub fn word_size(&self) -> u8 {
        self.word_size
    }

    pub fn file_count(&self) -> usize {
        self.handles.len()
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn seek_words(&mut self, word_pos: u64) {
        self.cursor = word_pos;
    }

    /// Positioned read of `count` words at word index `word_pos`, leaving
    /// the sequential cursor untouched.
    pub fn read_words_at(&self, word_pos: u64, count: u64) -> Result<Vec<u8>, D3BufferError> {
        let word_size = self.word_size as u64;
        let mut remaining = count * word_size;
        let byte_pos = word_pos * word_size;

        let (mut file_index, mut offset) = self.locate(byte_pos)?;
        let mut out = Vec::with_capacity(remaining as usize);

        while remaining > 0 {
            if file_index >= self.handles.len() {
                return Err(D3BufferError::FileFamilyShort {
                    requested: count,
                    at: word_pos,
                    available: self.total_words(),
                });
            }
            let size = self.file_sizes[file_index];
            let available = size.saturating_sub(offset);
            let take = remaining.min(available);
            if take > 0 {
                let mut ticket = self.handles[file_index].access();
                ticket.seek(SeekFrom::Start(offset))?;
                let mut chunk = vec![0u8; take as usize];
                ticket.read_exact(&mut chunk)?;
                out.extend_from_slice(&chunk);
                remaining -= take;
            }
            file_index += 1;
            offset = 0;
        }

        Ok(out)
    }

    /// Sequential read of `count` words starting at the current cursor;
    /// advances the cursor by `count`.
    pub fn read_words(&mut self, count: u64) -> Result<Vec<u8>, D3BufferError> {
        let bytes = self.read_words_at(self.cursor, count)?;
        self.cursor += count;
        Ok(bytes)
    }

    /// Advance the cursor to the start of the next file in the family.
    /// Fails when the current file is already the last one.
    pub fn advance_to_next_file(&mut self) -> Result<(), D3BufferError> {
        let word_size = self.word_size as u64;
        let target_byte = self.cursor * word_size;
        let (file_index, _) = self.locate(target_byte)?;
        let cur = file_index.min(self.file_sizes.len().saturating_sub(1));
        if cur + 1 >= self.file_sizes.len() {
            return Err(D3BufferError::FileFamilyShort {
                requested: 1,
                at: self.cursor,
                available: self.total_words(),
            });
        }
        let bytes_through_cur: u64 = self.file_sizes[..=cur].iter().sum();
        self.cursor = bytes_through_cur / word_size;
        Ok(())
    }

    fn locate(&self, byte_pos: u64) -> Result<(usize, u64), D3BufferError> {
        let mut remaining = byte_pos;
        for (index, size) in self.file_sizes.iter().enumerate() {
            if remaining < *size {
                return Ok((index, remaining));
            }
            remaining -= size;
        }
        if remaining == 0 {
            return Ok((self.file_sizes.len(), 0));
        }
        Err(D3BufferError::FileFamilyShort {
            requested: 0,
            at: byte_pos / self.word_size as u64,
            available: self.total_words(),
        })
    }

    fn total_words(&self) -> u64 {
        self.file_sizes.iter().sum::<u64>() / self.word_size as u64
    }

    /// Read one signed integer word (4 or 8 bytes depending on precision).
    pub fn read_signed_word(&mut self) -> Result<i64, D3BufferError> {
        let bytes = self.read_words(1)?;
        Ok(decode_signed_word(&bytes, self.word_size))
    }

    /// Read one word and decode it both ways at once: as a signed integer
    /// (a section `ntype` code) and as a float-widened double (the EOF
    /// marker's bit pattern). The d3plot header section reads one word whose
    /// meaning is only known after comparing it against both interpretations.
    pub fn read_signed_word_or_eof_marker(&mut self) -> Result<(i64, f64), D3BufferError> {
        let bytes = self.read_words(1)?;
        Ok((
            decode_signed_word(&bytes, self.word_size),
            decode_double_word(&bytes, self.word_size),
        ))
    }

    /// Read `count` signed integer words.
    pub fn read_signed_words(&mut self, count: u64) -> Result<Vec<i64>, D3BufferError> {
        let bytes = self.read_words(count)?;
        Ok(bytes
            .chunks_exact(self.word_size as usize)
            .map(|chunk| decode_signed_word(chunk, self.word_size))
            .collect())
    }

    /// Read one double, widening from f32 when `word_size == 4`.
    pub fn read_double(&mut self) -> Result<f64, D3BufferError> {
        let bytes = self.read_words(1)?;
        Ok(decode_double_word(&bytes, self.word_size))
    }

    pub fn read_doubles(&mut self, count: u64) -> Result<Vec<f64>, D3BufferError> {
        let bytes = self.read_words(count)?;
        Ok(bytes
            .chunks_exact(self.word_size as usize)
            .map(|chunk| decode_double_word(chunk, self.word_size))
            .collect())
    }

    /// Read `count` words and interpret them as ASCII text.
    pub fn read_ascii(&mut self, count: u64) -> Result<String, D3BufferError> {
        let bytes = self.read_words(count)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// The literal IEEE-754 double `-999999.0` used as an end-of-section
    /// marker. When `word_size == 4` the 32-bit float bit pattern must
    /// re-widen to exactly this value.
    pub fn is_eof_marker(value: f64) -> bool {
        value == -999999.0_f64
    }
}

fn decode_signed_word(bytes: &[u8], word_size: u8) -> i64 {
    if word_size == 4 {
        LittleEndian::read_i32(bytes) as i64
    } else {
        LittleEndian::read_i64(bytes)
    }
}

fn decode_double_word(bytes: &[u8], word_size: u8) -> f64 {
    if word_size == 4 {
        LittleEndian::read_f32(bytes) as f64
    } else {
        LittleEndian::read_f64(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_control_words(path: &Path, word_size: u8, words: &[i64]) {
        let mut file = std::fs::File::create(path).unwrap();
        for &w in words {
            if word_size == 4 {
                file.write_all(&(w as i32).to_le_bytes()).unwrap();
            } else {
                file.write_all(&w.to_le_bytes()).unwrap();
            }
        }
    }

    #[test]
    fn detects_word_size_4_and_reads_sequential_words() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("d3plot");
        let mut words = vec![0i64; 16];
        words[15] = 3; // NDIM
        write_control_words(&root, 4, &words);

        let mut buf = D3Buffer::open(&root).unwrap();
        assert_eq!(buf.word_size(), 4);
        assert_eq!(buf.file_count(), 1);

        buf.seek_words(15);
        assert_eq!(buf.read_signed_word().unwrap(), 3);
    }

    #[test]
    fn detects_word_size_8() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("d3plot");
        let mut words = vec![0i64; 16];
        words[15] = 5;
        write_control_words(&root, 8, &words);

        let buf = D3Buffer::open(&root).unwrap();
        assert_eq!(buf.word_size(), 8);
    }

    #[test]
    fn broken_family_when_neither_candidate_is_valid() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("d3plot");
        let words = vec![999i64; 16];
        write_control_words(&root, 4, &words);

        let err = D3Buffer::open(&root).unwrap_err();
        assert!(matches!(err, D3BufferError::BrokenFiles));
    }

    #[test]
    fn probes_numbered_family_members() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("d3plot");
        let mut words = vec![0i64; 16];
        words[15] = 3;
        write_control_words(&root, 4, &words);
        std::fs::write(dir.path().join("d3plot01"), b"AAAA").unwrap();
        std::fs::write(dir.path().join("d3plot02"), b"BBBB").unwrap();

        let buf = D3Buffer::open(&root).unwrap();
        assert_eq!(buf.file_count(), 3);
    }

    #[test]
    fn reads_cross_file_boundary() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("d3plot");
        let mut words = vec![0i64; 20];
        words[15] = 3;
        write_control_words(&root, 4, &words);

        let second = dir.path().join("d3plot01");
        let mut words2 = vec![0i64; 4];
        words2[0] = 42;
        write_control_words(&second, 4, &words2);

        let mut buf = D3Buffer::open(&root).unwrap();
        buf.seek_words(19);
        let values = buf.read_signed_words(2).unwrap();
        assert_eq!(values, vec![0, 42]);
    }

    #[test]
    fn eof_marker_round_trips_through_f32() {
        let value = -999999.0_f32 as f64;
        assert!(D3Buffer::is_eof_marker(value));
    }
}
