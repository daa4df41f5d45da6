//! d3plot mesh/state dump reader.
//!
//! A d3plot dump is read in one fixed sequence: control data, geometry, the
//! user ID table, extra node connectivity, the adapted-element parent
//! list, an EOF marker, the header section, and then states read
//! back-to-back until the EOF marker, advancing across the numbered file
//! family as needed.

pub mod control;
pub mod geometry;
pub mod parts;
pub mod state;

use std::path::Path;

pub use control::ControlData;
pub use geometry::{Geometry, HeaderSection, UserIds};
pub use parts::{read_part, Part};
pub use state::State;

use crate::d3_buffer::D3Buffer;
use crate::error::D3plotError;

/// A fully parsed d3plot file family: control data, mesh geometry, the
/// optional user ID tables, the header section and every state block.
pub struct D3plot {
    control: ControlData,
    geometry: Geometry,
    user_ids: Option<UserIds>,
    header: HeaderSection,
    states: Vec<State>,
}

impl D3plot {
    /// Open and fully decode the d3plot file family rooted at `path`
    /// (`path` itself, plus `path01`, `path02`, … for striped dumps).
    #[tracing::instrument(skip_all, fields(root = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<D3plot, D3plotError> {
        let mut buf = D3Buffer::open(path.as_ref())?;

        let control = ControlData::read(&mut buf)?;
        let geometry = Geometry::read(&mut buf, &control)?;
        let user_ids = UserIds::read(&mut buf, &control)?;
        let numrbs = user_ids.as_ref().map_or(0, |u| u.numrbs);
        geometry::skip_extra_node_connectivity(&mut buf, &control)?;
        geometry::skip_adapted_element_parent_list(&mut buf, &control)?;

        // A plain, exact EOF marker precedes the header section; the
        // header's own ntype loop terminates on a second, separately-placed
        // marker.
        let marker = buf.read_double()?;
        if !D3Buffer::is_eof_marker(marker) {
            return Err(D3plotError::TruncatedState);
        }

        let header = HeaderSection::read(&mut buf)?;
        // Single-file dumps hold the first state right after the header in
        // the same file; only striped multi-file families need the jump.
        if buf.file_count() > 1 {
            buf.advance_to_next_file()?;
        }

        let states = state::read_states(&mut buf, &control, numrbs)?;

        tracing::debug!(states = states.len(), "decoded d3plot file family");

        Ok(D3plot {
            control,
            geometry,
            user_ids,
            header,
            states,
        })
    }

    pub fn control(&self) -> &ControlData {
        &self.control
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn user_ids(&self) -> Option<&UserIds> {
        self.user_ids.as_ref()
    }

    pub fn header(&self) -> &HeaderSection {
        &self.header
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn num_parts(&self) -> usize {
        let numrbs = self.user_ids.as_ref().map_or(0, |u| u.numrbs);
        self.control.total_materials(numrbs).max(0) as usize
    }

    /// Read the elements belonging to the part at `part_index` (0-based,
    /// LS-DYNA's internal numbering is 1-based internally).
    pub fn read_part(&self, part_index: usize) -> Part {
        read_part(&self.geometry, self.user_ids.as_ref(), part_index)
    }
}
