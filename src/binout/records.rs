//! The binout file header and per-record command codes.

use crate::error::BinoutError;
use byteorder::ReadBytesExt;
use std::io::Read;
use std::path::Path;

/// Record command tag, occupying `record_command_field_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Null,
    Cd,
    Data,
    Variable,
    BeginSymbolTable,
    EndSymbolTable,
    SymbolTableOffset,
    Unknown(u64),
}

impl Command {
    pub fn from_code(code: u64) -> Command {
        match code {
            1 => Command::Null,
            2 => Command::Cd,
            3 => Command::Data,
            4 => Command::Variable,
            5 => Command::BeginSymbolTable,
            6 => Command::EndSymbolTable,
            7 => Command::SymbolTableOffset,
            other => Command::Unknown(other),
        }
    }
}

/// The fixed 8-byte header every binout file starts with.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub header_size: u8,
    pub length_field_size: u8,
    pub offset_field_size: u8,
    pub command_field_size: u8,
    pub typeid_field_size: u8,
    pub endianness: u8,
    pub float_format: u8,
    pub unused: u8,
}

impl Header {
    pub fn read(reader: &mut impl Read, file: &Path) -> Result<Header, BinoutError> {
        let mut bytes = [0u8; 8];
        reader.read_exact(&mut bytes).map_err(|e| {
            BinoutError::FormatReject {
                file: file.to_path_buf(),
                reason: format!("could not read 8-byte header: {e}"),
            }
        })?;
        let header = Header {
            header_size: bytes[0],
            length_field_size: bytes[1],
            offset_field_size: bytes[2],
            command_field_size: bytes[3],
            typeid_field_size: bytes[4],
            endianness: bytes[5],
            float_format: bytes[6],
            unused: bytes[7],
        };
        header.validate(file)?;
        Ok(header)
    }

    fn validate(&self, file: &Path) -> Result<(), BinoutError> {
        if self.endianness != 1 {
            return Err(BinoutError::FormatReject {
                file: file.to_path_buf(),
                reason: format!("unsupported endianness code {}", self.endianness),
            });
        }
        if self.float_format != 0 {
            return Err(BinoutError::FormatReject {
                file: file.to_path_buf(),
                reason: format!("unsupported float format code {}", self.float_format),
            });
        }
        for (name, width) in [
            ("record_length_field_size", self.length_field_size),
            ("record_offset_field_size", self.offset_field_size),
            ("record_command_field_size", self.command_field_size),
            ("record_typeid_field_size", self.typeid_field_size),
        ] {
            if width == 0 || width > 8 {
                return Err(BinoutError::FormatReject {
                    file: file.to_path_buf(),
                    reason: format!("{name} out of range: {width}"),
                });
            }
        }
        Ok(())
    }
}

/// Read a little-endian unsigned integer of `width` bytes (1..=8).
pub fn read_uint_field(reader: &mut impl Read, width: u8) -> std::io::Result<u64> {
    reader.read_uint::<byteorder::LittleEndian>(width as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_valid_header() {
        let bytes = [8u8, 4, 8, 1, 1, 1, 0, 0];
        let mut cursor = Cursor::new(bytes);
        let header = Header::read(&mut cursor, Path::new("x")).unwrap();
        assert_eq!(header.length_field_size, 4);
        assert_eq!(header.command_field_size, 1);
    }

    #[test]
    fn rejects_big_endian() {
        let bytes = [8u8, 4, 8, 1, 1, 0, 0, 0];
        let mut cursor = Cursor::new(bytes);
        assert!(Header::read(&mut cursor, Path::new("x")).is_err());
    }

    #[test]
    fn command_codes_map_correctly() {
        assert_eq!(Command::from_code(2), Command::Cd);
        assert_eq!(Command::from_code(3), Command::Data);
        assert!(matches!(Command::from_code(99), Command::Unknown(99)));
    }
}
