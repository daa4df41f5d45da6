//! Mesh geometry, user ID tables and the header section that follow control
//! data.

use crate::d3_buffer::D3Buffer;
use crate::d3plot::control::ControlData;
use crate::error::D3plotError;

/// Connectivity and node coordinates.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    /// `NUMNP` node coordinates.
    pub node_coordinates: Vec<[f64; 3]>,
    /// Eight node indices + one material index per solid, present when
    /// `NEL8 > 0`.
    pub solid_connectivity: Vec<[i64; 9]>,
    /// Two extra node indices per 10-node tetra, present when `NEL8 < 0`.
    pub ten_node_tetra_extra: Vec<[i64; 2]>,
    /// Eight node indices + one material index per thick shell.
    pub thick_shell_connectivity: Vec<[i64; 9]>,
    /// Two nodes, one orientation node, two zeros, one material index.
    pub beam_connectivity: Vec<[i64; 6]>,
    /// Four node indices + one material index per shell.
    pub shell_connectivity: Vec<[i64; 5]>,
}

fn read_connectivity_rows(
    buf: &mut D3Buffer,
    rows: i64,
    width: usize,
) -> Result<Vec<Vec<i64>>, D3plotError> {
    let mut out = Vec::with_capacity(rows.max(0) as usize);
    for _ in 0..rows {
        out.push(buf.read_signed_words(width as u64)?);
    }
    Ok(out)
}

impl Geometry {
    pub fn read(buf: &mut D3Buffer, control: &ControlData) -> Result<Geometry, D3plotError> {
        let mut geometry = Geometry::default();

        let node_words = buf.read_doubles(control.numnp.max(0) as u64 * 3)?;
        geometry.node_coordinates = node_words
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        if control.nel8 > 0 {
            geometry.solid_connectivity = read_connectivity_rows(buf, control.nel8, 9)?
                .into_iter()
                .map(|row| {
                    let mut arr = [0i64; 9];
                    arr.copy_from_slice(&row);
                    arr
                })
                .collect();
        } else if control.nel8 < 0 {
            let n = -control.nel8;
            geometry.ten_node_tetra_extra = read_connectivity_rows(buf, n, 2)?
                .into_iter()
                .map(|row| [row[0], row[1]])
                .collect();
        }

        if control.nelt > 0 {
            geometry.thick_shell_connectivity = read_connectivity_rows(buf, control.nelt, 9)?
                .into_iter()
                .map(|row| {
                    let mut arr = [0i64; 9];
                    arr.copy_from_slice(&row);
                    arr
                })
                .collect();
        }

        if control.nel2 > 0 {
            geometry.beam_connectivity = read_connectivity_rows(buf, control.nel2, 6)?
                .into_iter()
                .map(|row| {
                    let mut arr = [0i64; 6];
                    arr.copy_from_slice(&row);
                    arr
                })
                .collect();
        }

        if control.nel4 > 0 {
            geometry.shell_connectivity = read_connectivity_rows(buf, control.nel4, 5)?
                .into_iter()
                .map(|row| {
                    let mut arr = [0i64; 5];
                    arr.copy_from_slice(&row);
                    arr
                })
                .collect();
        }

        Ok(geometry)
    }
}

/// Extra node connectivity read after the user ID table: a second copy of
/// the 10-node tetra extension when `NEL8 < 0` (this block really is
/// repeated rather than reusing the one already read in the geometry
/// section), the `NEL48` table and, if `EXTRA > 0`, the 20-node solid table.
/// None of these are decoded into typed structures here; they are skipped
/// word-for-word so the buffer cursor lands correctly for what follows.
pub fn skip_extra_node_connectivity(
    buf: &mut D3Buffer,
    control: &ControlData,
) -> Result<(), D3plotError> {
    if control.nel8 < 0 {
        buf.read_words((-control.nel8) as u64 * 2)?;
    }
    if control.nel48 > 0 {
        buf.read_words(control.nel48 as u64 * 5)?;
    }
    if control.extra > 0 && control.nel20 > 0 {
        buf.read_words(control.nel20 as u64 * 13)?;
    }
    Ok(())
}

pub fn skip_adapted_element_parent_list(
    buf: &mut D3Buffer,
    control: &ControlData,
) -> Result<(), D3plotError> {
    if control.nadapt > 0 {
        buf.read_words(control.nadapt as u64 * 2)?;
    }
    Ok(())
}

/// User-supplied node/element/material ID tables.
/// `None` when `NARBS == 0`.
#[derive(Debug, Clone)]
pub struct UserIds {
    pub node_ids: Vec<i64>,
    pub solid_ids: Vec<i64>,
    pub beam_ids: Vec<i64>,
    pub shell_ids: Vec<i64>,
    pub thick_shell_ids: Vec<i64>,
    pub material_order: Vec<i64>,
    pub numrbs: i64,
}

impl UserIds {
    pub fn read(buf: &mut D3Buffer, control: &ControlData) -> Result<Option<UserIds>, D3plotError> {
        if control.narbs == 0 {
            return Ok(None);
        }

        let nsort = buf.read_signed_word()?;
        let nsrh = buf.read_signed_word()?;
        let nsrb = buf.read_signed_word()?;
        let nsrs = buf.read_signed_word()?;
        let nsrt = buf.read_signed_word()?;
        let nsortd = buf.read_signed_word()?;
        let nsrhd = buf.read_signed_word()?;
        let nsrbd = buf.read_signed_word()?;
        let nsrsd = buf.read_signed_word()?;
        let nsrtd = buf.read_signed_word()?;
        let _ = (nsrh, nsrb, nsrs, nsrt);

        let (numrbs, nmmat) = if nsort < 0 {
            let _nsrma = buf.read_signed_word()?;
            let _nsrmu = buf.read_signed_word()?;
            let _nsrmp = buf.read_signed_word()?;
            let _nsrtm = buf.read_signed_word()?;
            let numrbs = buf.read_signed_word()?;
            let nmmat = buf.read_signed_word()?;
            (numrbs, nmmat)
        } else {
            return Err(D3plotError::UnsupportedPositiveNsort(nsort));
        };

        let node_ids = buf.read_signed_words(nsortd.max(0) as u64)?;
        let solid_ids = buf.read_signed_words(nsrhd.max(0) as u64)?;
        let beam_ids = buf.read_signed_words(nsrbd.max(0) as u64)?;
        let shell_ids = buf.read_signed_words(nsrsd.max(0) as u64)?;
        let thick_shell_ids = buf.read_signed_words(nsrtd.max(0) as u64)?;
        let material_order = buf.read_signed_words(nmmat.max(0) as u64)?;
        let _nsrmu_array = buf.read_signed_words(nmmat.max(0) as u64)?;
        let _nsrmp_array = buf.read_signed_words(nmmat.max(0) as u64)?;

        Ok(Some(UserIds {
            node_ids,
            solid_ids,
            beam_ids,
            shell_ids,
            thick_shell_ids,
            material_order,
            numrbs,
        }))
    }
}

/// Typed blocks delimited by `ntype` codes, terminated by the EOF marker.
#[derive(Debug, Clone, Default)]
pub struct HeaderSection {
    pub head: Option<String>,
    pub part_titles: Vec<(i64, String)>,
    pub contact_titles: Vec<(i64, String)>,
    pub keyword_lines: Vec<String>,
}

const NTYPE_PART_PROPERTIES: i64 = 90001;
const NTYPE_HEAD: i64 = 90000;
const NTYPE_CONTACT_TITLES: i64 = 90002;
const NTYPE_KEYWORD_LINES: i64 = 900100;

impl HeaderSection {
    pub fn read(buf: &mut D3Buffer) -> Result<HeaderSection, D3plotError> {
        let mut section = HeaderSection::default();
        loop {
            let (ntype, as_double) = buf.read_signed_word_or_eof_marker()?;
            match ntype {
                NTYPE_PART_PROPERTIES => {
                    let numprop = buf.read_signed_word()?;
                    for _ in 0..numprop {
                        let idp = buf.read_signed_word()?;
                        let title = buf.read_ascii(18)?;
                        section.part_titles.push((idp, title.trim_end().to_string()));
                    }
                }
                NTYPE_HEAD => {
                    section.head = Some(buf.read_ascii(18)?.trim_end().to_string());
                }
                NTYPE_CONTACT_TITLES => {
                    let numcon = buf.read_signed_word()?;
                    for _ in 0..numcon {
                        let idc = buf.read_signed_word()?;
                        let title = buf.read_ascii(18)?;
                        section.contact_titles.push((idc, title.trim_end().to_string()));
                    }
                }
                NTYPE_KEYWORD_LINES => {
                    let nline = buf.read_signed_word()?;
                    for _ in 0..nline {
                        section.keyword_lines.push(buf.read_ascii(20)?.trim_end().to_string());
                    }
                }
                _ => {
                    // Not a recognised block type: the word just read must be
                    // the EOF marker, reinterpreted bit-for-bit as a double
                    // rather than numerically converted.
                    if !D3Buffer::is_eof_marker(as_double) {
                        return Err(D3plotError::TruncatedState);
                    }
                    break;
                }
            }
        }
        Ok(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::d3plot::control;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_words8(path: &std::path::Path, words: &[i64]) {
        let mut file = std::fs::File::create(path).unwrap();
        for &w in words {
            file.write_all(&w.to_le_bytes()).unwrap();
        }
    }

    fn append_doubles8(file: &mut std::fs::File, values: &[f64]) {
        for &v in values {
            file.write_all(&v.to_le_bytes()).unwrap();
        }
    }

    fn append_ascii8(file: &mut std::fs::File, text: &str, words: usize) {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(words * 8, b' ');
        file.write_all(&bytes).unwrap();
    }

    #[test]
    fn reads_shell_geometry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d3plot");
        // control data header: word 15 (index) must hold NDIM == 3.
        let mut words = vec![0i64; 16];
        words[15] = 3;
        write_words8(&path, &words);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        // 2 nodes x 3 coords.
        append_doubles8(&mut file, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        // one shell: 4 node ids + material id.
        let mut shell_words = vec![0u8; 0];
        for w in [1i64, 2, 2, 1, 7] {
            shell_words.extend_from_slice(&w.to_le_bytes());
        }
        file.write_all(&shell_words).unwrap();
        drop(file);

        let mut buf = D3Buffer::open(&path).unwrap();
        buf.seek_words(16);

        let mut control = control::zeroed();
        control.numnp = 2;
        control.nel4 = 1;

        let geometry = Geometry::read(&mut buf, &control).unwrap();
        assert_eq!(geometry.node_coordinates, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        assert_eq!(geometry.shell_connectivity, vec![[1, 2, 2, 1, 7]]);
    }

    #[test]
    fn header_section_stops_at_eof_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d3plot");
        let mut words = vec![0i64; 16];
        words[15] = 3;
        write_words8(&path, &words);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&NTYPE_HEAD.to_le_bytes()).unwrap();
        append_ascii8(&mut file, "RUN TITLE", 18);
        append_doubles8(&mut file, &[-999999.0]);
        drop(file);

        let mut buf = D3Buffer::open(&path).unwrap();
        buf.seek_words(16);

        let section = HeaderSection::read(&mut buf).unwrap();
        assert_eq!(section.head.as_deref(), Some("RUN TITLE"));
        assert!(section.part_titles.is_empty());
    }

    #[test]
    fn user_ids_none_when_narbs_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d3plot");
        let mut words = vec![0i64; 16];
        words[15] = 3;
        write_words8(&path, &words);

        let mut buf = D3Buffer::open(&path).unwrap();
        let mut control = control::zeroed();
        control.narbs = 0;

        assert!(UserIds::read(&mut buf, &control).unwrap().is_none());
    }
}
