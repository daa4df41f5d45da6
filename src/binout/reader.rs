//! Consume CD/DATA records into the directory; typed and timed random reads.

use byteorder::ReadBytesExt;
use glob::glob;
use rayon::prelude::*;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::directory::{BinoutDirectory, Children, FileEntry};
use super::records::{read_uint_field, Command, Header};
use crate::error::BinoutError;
use crate::multi_file::MultiFile;
use crate::path_view::{join_and_canonicalize, PathView};
use crate::value::{decode_elements, BinoutScalar, ValueType};

/// A parsed (but not yet merged) effect of one file's record stream, kept
/// separate from the shared `BinoutDirectory` so that parsing can run in
/// parallel across files and merge deterministically by
/// `physical_file_index` afterwards.
enum ParsedEntry {
    EnsureFolder(Vec<String>),
    InsertFile(Vec<String>, FileEntry),
}

/// Flattened result of `read_timed`: `num_timesteps` rows of `per_step`
/// values each, laid out row-major.
#[derive(Debug, Clone)]
pub struct TimedSeries<T> {
    pub num_timesteps: usize,
    pub per_step: usize,
    pub values: Vec<T>,
}

/// A binout file family opened as one virtual filesystem.
pub struct Binout {
    directory: BinoutDirectory,
    files: Vec<MultiFile>,
    file_errors: Vec<(PathBuf, String)>,
}

impl Binout {
    /// Open every file matching `pattern` (a glob), parsing each
    /// independently — in parallel, via `rayon` — and merging the results
    /// into one directory in ascending `physical_file_index` order so the
    /// merge is deterministic regardless of completion order.
    #[tracing::instrument(skip_all, fields(pattern))]
    pub fn open(pattern: &str) -> Result<Binout, BinoutError> {
        let mut paths: Vec<PathBuf> = glob(pattern)
            .map_err(|e| BinoutError::NoFilesFound(format!("{pattern}: {e}")))?
            .filter_map(Result::ok)
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(BinoutError::NoFilesFound(pattern.to_string()));
        }

        let mut outcomes: Vec<(usize, Result<Vec<ParsedEntry>, String>)> = paths
            .par_iter()
            .enumerate()
            .map(|(index, path)| (index, parse_one_file(path, index)))
            .collect();
        outcomes.sort_by_key(|(index, _)| *index);

        let mut directory = BinoutDirectory::new();
        let mut file_errors = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                Ok(entries) => merge_entries(&mut directory, entries),
                Err(message) => {
                    debug!(file = %paths[index].display(), %message, "binout file skipped");
                    file_errors.push((paths[index].clone(), message));
                }
            }
        }

        let files = paths.into_iter().map(MultiFile::new).collect();
        Ok(Binout {
            directory,
            files,
            file_errors,
        })
    }

    /// Top-level folder names, in insertion order.
    pub fn root_children(&self) -> Vec<&str> {
        self.directory.roots().iter().map(|f| f.name.as_str()).collect()
    }

    pub fn variable_exists(&self, path: &str) -> bool {
        let elements = PathView::new(path).elements();
        self.directory.get_file(&elements).is_some()
    }

    /// Per-file parse failures recorded during `open`.
    pub fn file_errors(&self) -> &[(PathBuf, String)] {
        &self.file_errors
    }

    pub fn debug_tree(&self) -> String {
        self.directory.debug_tree()
    }

    /// Typed random read of a single variable's payload.
    pub fn read<T: BinoutScalar>(&self, path: &str) -> Result<Vec<T>, BinoutError> {
        let elements = PathView::new(path).elements();
        let entry = self
            .directory
            .get_file(&elements)
            .ok_or(BinoutError::PathNotFound)?;
        if entry.variable_type != T::CODE {
            return Err(BinoutError::TypeMismatch {
                path: path.to_string(),
                actual: entry.variable_type,
                requested: T::CODE,
            });
        }
        let bytes = self.read_raw(entry)?;
        Ok(decode_elements(&bytes))
    }

    /// Read a variable scattered across `d000001, d000002, …` sibling
    /// folders under a common parent.
    pub fn read_timed<T: BinoutScalar>(&self, path: &str) -> Result<TimedSeries<T>, BinoutError> {
        let elements = PathView::new(path).elements();
        if elements.len() < 2 {
            return Err(BinoutError::InvalidPath(path.to_string()));
        }
        let (parent_elements, name) = elements.split_at(elements.len() - 1);
        let variable_name = name[0];

        let parent = self
            .directory
            .folder(parent_elements)
            .ok_or(BinoutError::PathNotFound)?;
        let steps = match &parent.children {
            Children::Folders(sub) => sub,
            _ => return Err(BinoutError::PathNotFound),
        };

        let mut values = Vec::new();
        let mut expected_len: Option<u64> = None;
        let mut count = 0usize;

        for step in steps {
            let file_entry = match &step.children {
                Children::Files(files) => files.iter().find(|f| f.name == variable_name),
                _ => None,
            }
            .ok_or(BinoutError::PathNotFound)?;

            if file_entry.variable_type != T::CODE {
                return Err(BinoutError::TypeMismatch {
                    path: path.to_string(),
                    actual: file_entry.variable_type,
                    requested: T::CODE,
                });
            }
            match expected_len {
                None => expected_len = Some(file_entry.payload_size),
                Some(len) if len == file_entry.payload_size => {}
                Some(_) => {
                    return Err(BinoutError::InconsistentTimesteps {
                        path: path.to_string(),
                    })
                }
            }

            let bytes = self.read_raw(file_entry)?;
            values.extend(decode_elements::<T>(&bytes));
            count += 1;
        }

        let per_step = expected_len
            .map(|len| (len as usize) / T::CODE.size().max(1))
            .unwrap_or(0);
        Ok(TimedSeries {
            num_timesteps: count,
            per_step,
            values,
        })
    }

    fn read_raw(&self, entry: &FileEntry) -> Result<Vec<u8>, BinoutError> {
        let mut ticket = self.files[entry.physical_file_index].access();
        ticket.seek(SeekFrom::Start(entry.file_offset))?;
        let mut buf = vec![0u8; entry.payload_size as usize];
        ticket.read_exact(&mut buf)?;
        Ok(buf)
    }
}

fn merge_entries(directory: &mut BinoutDirectory, entries: Vec<ParsedEntry>) {
    for entry in entries {
        match entry {
            ParsedEntry::EnsureFolder(elements) => {
                let refs: Vec<&str> = elements.iter().map(String::as_str).collect();
                directory.ensure_folder_path(&refs);
            }
            ParsedEntry::InsertFile(parent, file) => {
                let refs: Vec<&str> = parent.iter().map(String::as_str).collect();
                directory.insert_file(&refs, file);
            }
        }
    }
}

/// Read the record-length field by hand so a clean end-of-file (zero bytes
/// available) can be distinguished from a truncated record.
fn try_read_length(
    ticket: &mut crate::multi_file::Ticket,
    width: u8,
) -> std::io::Result<Option<u64>> {
    let mut buf = [0u8; 8];
    let first = ticket.read(&mut buf[0..1])?;
    if first == 0 {
        return Ok(None);
    }
    if width > 1 {
        ticket.read_exact(&mut buf[1..width as usize])?;
    }
    let mut value = 0u64;
    for byte in buf[..width as usize].iter().rev() {
        value = (value << 8) | *byte as u64;
    }
    Ok(Some(value))
}

fn parse_one_file(path: &Path, file_index: usize) -> Result<Vec<ParsedEntry>, String> {
    let handle = MultiFile::new(path);
    let mut ticket = handle.access();
    if ticket.is_sentinel() {
        return Err(format!("{}: could not open file", path.display()));
    }

    let header = Header::read(&mut ticket, path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut entries = Vec::new();
    let mut current_path = String::from("/");

    loop {
        let record_length = match try_read_length(&mut ticket, header.length_field_size) {
            Ok(None) => break,
            Ok(Some(v)) => v,
            Err(e) => return Err(format!("{}: truncated record length: {e}", path.display())),
        };
        let command_code = read_uint_field(&mut ticket, header.command_field_size)
            .map_err(|e| format!("{}: truncated command: {e}", path.display()))?;
        let header_fields = header.length_field_size as u64 + header.command_field_size as u64;
        let payload_len = record_length.saturating_sub(header_fields);

        match Command::from_code(command_code) {
            Command::Cd => {
                let mut buf = vec![0u8; payload_len as usize];
                ticket
                    .read_exact(&mut buf)
                    .map_err(|e| format!("{}: truncated CD payload: {e}", path.display()))?;
                let relative = String::from_utf8_lossy(&buf)
                    .trim_end_matches('\0')
                    .to_string();
                current_path = join_and_canonicalize(&current_path, &relative);
                let elements: Vec<String> = PathView::new(&current_path)
                    .elements()
                    .into_iter()
                    .map(String::from)
                    .collect();
                entries.push(ParsedEntry::EnsureFolder(elements));
            }
            Command::Data => {
                let type_id = read_uint_field(&mut ticket, header.typeid_field_size)
                    .map_err(|e| format!("{}: truncated type id: {e}", path.display()))?;
                let name_len = read_uint_field(&mut ticket, 1)
                    .map_err(|e| format!("{}: truncated name length: {e}", path.display()))?
                    as usize;
                let mut name_buf = vec![0u8; name_len];
                ticket
                    .read_exact(&mut name_buf)
                    .map_err(|e| format!("{}: truncated variable name: {e}", path.display()))?;
                let name = String::from_utf8_lossy(&name_buf).to_string();

                let consumed = header.typeid_field_size as u64 + 1 + name_len as u64;
                let remaining = payload_len.saturating_sub(consumed);
                let offset = ticket
                    .seek(SeekFrom::Current(0))
                    .map_err(|e| format!("{}: tell failed: {e}", path.display()))?;
                ticket
                    .seek(SeekFrom::Current(remaining as i64))
                    .map_err(|e| format!("{}: seek past payload failed: {e}", path.display()))?;

                let parent_elements: Vec<String> = PathView::new(&current_path)
                    .elements()
                    .into_iter()
                    .map(String::from)
                    .collect();
                entries.push(ParsedEntry::InsertFile(
                    parent_elements,
                    FileEntry {
                        name,
                        variable_type: ValueType::from_code(type_id),
                        payload_size: remaining,
                        physical_file_index: file_index,
                        file_offset: offset,
                    },
                ));
            }
            _ => {
                ticket
                    .seek(SeekFrom::Current(payload_len as i64))
                    .map_err(|e| format!("{}: skip failed: {e}", path.display()))?;
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    /// Build a minimal binout file: one CD into `/nodout`, one DATA record
    /// `legend` (i8) under it.
    fn write_sample_binout(path: &Path) {
        let mut file = std::fs::File::create(path).unwrap();
        // header: header_size=8, length=4, offset=8, command=1, typeid=1, little-endian, IEEE
        file.write_all(&[8, 4, 8, 1, 1, 1, 0, 0]).unwrap();

        // CD record: path "/nodout"
        let cd_path = b"/nodout";
        let cd_record_len = 4u32 + 1 + cd_path.len() as u32;
        file.write_all(&cd_record_len.to_le_bytes()).unwrap();
        file.write_all(&[2u8]).unwrap(); // CD command
        file.write_all(cd_path).unwrap();

        // DATA record: variable "legend", type INT8 (1), payload "hi"
        let name = b"legend";
        let payload = b"hi";
        let data_record_len = 4u32 + 1 + 1 + 1 + name.len() as u32 + payload.len() as u32;
        file.write_all(&data_record_len.to_le_bytes()).unwrap();
        file.write_all(&[3u8]).unwrap(); // DATA command
        file.write_all(&[1u8]).unwrap(); // type_id = INT8
        file.write_all(&[name.len() as u8]).unwrap();
        file.write_all(name).unwrap();
        file.write_all(payload).unwrap();
    }

    #[test]
    fn opens_and_reads_a_variable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("binout0000");
        write_sample_binout(&path);

        let pattern = dir.path().join("binout*").to_string_lossy().into_owned();
        let binout = Binout::open(&pattern).unwrap();

        assert_eq!(binout.root_children(), vec!["nodout"]);
        assert!(binout.variable_exists("/nodout/legend"));
        assert!(!binout.variable_exists("/ghost/path"));

        let values: Vec<i8> = binout.read("/nodout/legend").unwrap();
        assert_eq!(values, vec![b'h' as i8, b'i' as i8]);
    }

    #[test]
    fn type_mismatch_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("binout0000");
        write_sample_binout(&path);
        let pattern = dir.path().join("binout*").to_string_lossy().into_owned();
        let binout = Binout::open(&pattern).unwrap();

        let err = binout.read::<i32>("/nodout/legend").unwrap_err();
        assert!(matches!(err, BinoutError::TypeMismatch { .. }));
    }

    #[test]
    fn missing_variable_is_path_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("binout0000");
        write_sample_binout(&path);
        let pattern = dir.path().join("binout*").to_string_lossy().into_owned();
        let binout = Binout::open(&pattern).unwrap();

        let err = binout.read::<i8>("/ghost/path").unwrap_err();
        assert!(matches!(err, BinoutError::PathNotFound));
    }

    #[test]
    fn no_matches_is_open_failed() {
        let err = Binout::open("/no/such/pattern*").unwrap_err();
        assert!(matches!(err, BinoutError::NoFilesFound(_)));
    }
}
