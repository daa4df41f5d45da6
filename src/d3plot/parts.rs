//! Per-part element lookup: filtering each connectivity array down to the
//! elements belonging to one material/part.

use crate::d3plot::geometry::{Geometry, UserIds};

/// Element ids of one part, grouped by element family. Ids come from the
/// user-supplied ID table when present, otherwise from the element's
/// 1-based position in its connectivity array (LS-DYNA's Fortran-derived
/// internal numbering starts at 1, not 0).
#[derive(Debug, Clone, Default)]
pub struct Part {
    pub solid_ids: Vec<i64>,
    pub thick_shell_ids: Vec<i64>,
    pub beam_ids: Vec<i64>,
    pub shell_ids: Vec<i64>,
}

fn element_id(user_ids: Option<&[i64]>, position: usize) -> i64 {
    match user_ids {
        Some(ids) if position < ids.len() => ids[position],
        _ => position as i64 + 1,
    }
}

/// Read the elements belonging to `part_index` (0-based). Materials in
/// d3plot ARE parts: the last connectivity word of every element is its
/// 1-based material (part) index.
pub fn read_part(geometry: &Geometry, user_ids: Option<&UserIds>, part_index: usize) -> Part {
    let part_number = part_index as i64 + 1;
    let mut part = Part::default();

    for (position, row) in geometry.solid_connectivity.iter().enumerate() {
        if row[8] == part_number {
            part.solid_ids
                .push(element_id(user_ids.map(|u| u.solid_ids.as_slice()), position));
        }
    }
    for (position, row) in geometry.thick_shell_connectivity.iter().enumerate() {
        if row[8] == part_number {
            part.thick_shell_ids.push(element_id(
                user_ids.map(|u| u.thick_shell_ids.as_slice()),
                position,
            ));
        }
    }
    for (position, row) in geometry.beam_connectivity.iter().enumerate() {
        if row[5] == part_number {
            part.beam_ids
                .push(element_id(user_ids.map(|u| u.beam_ids.as_slice()), position));
        }
    }
    for (position, row) in geometry.shell_connectivity.iter().enumerate() {
        if row[4] == part_number {
            part.shell_ids
                .push(element_id(user_ids.map(|u| u.shell_ids.as_slice()), position));
        }
    }

    part
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_shells_by_material_index() {
        let mut geometry = Geometry::default();
        geometry.shell_connectivity = vec![[1, 2, 3, 4, 1], [5, 6, 7, 8, 2], [9, 10, 11, 12, 1]];

        let part = read_part(&geometry, None, 0);
        assert_eq!(part.shell_ids, vec![1, 3]);

        let part2 = read_part(&geometry, None, 1);
        assert_eq!(part2.shell_ids, vec![2]);
    }

    #[test]
    fn uses_user_ids_when_present() {
        let mut geometry = Geometry::default();
        geometry.shell_connectivity = vec![[1, 2, 3, 4, 1], [5, 6, 7, 8, 1]];
        let user_ids = UserIds {
            node_ids: Vec::new(),
            solid_ids: Vec::new(),
            beam_ids: Vec::new(),
            shell_ids: vec![1001, 1002],
            thick_shell_ids: Vec::new(),
            material_order: Vec::new(),
            numrbs: 0,
        };

        let part = read_part(&geometry, Some(&user_ids), 0);
        assert_eq!(part.shell_ids, vec![1001, 1002]);
    }
}
