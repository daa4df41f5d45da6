//! Per-state (per-timestep) data: global variables, per-node arrays, element
//! data and the deletion table.

use crate::d3_buffer::D3Buffer;
use crate::d3plot::control::ControlData;
use crate::error::D3plotError;

/// The `nth_digit` helper re-used by the `IT` node-data flag, mirroring
/// `ControlData`'s `IDTDT` digit decoding.
fn nth_digit(value: i64, n: u32) -> i64 {
    (value.unsigned_abs() / 10u64.pow(n)) as i64 % 10
}

/// Global (whole-model) variables for one state.
#[derive(Debug, Clone, Default)]
pub struct GlobalState {
    pub kinetic_energy: f64,
    pub internal_energy: f64,
    pub total_energy: f64,
    pub velocity: [f64; 3],
    /// Per-material arrays, each ordered
    /// `[solids.., beams.., shells.., thick_shells.., rigid_bodies..]` and
    /// sized `NUMMAT8 + NUMMAT2 + NUMMAT4 + NUMMATT + NUMRBS`.
    pub material_internal_energy: Vec<f64>,
    pub material_kinetic_energy: Vec<f64>,
    pub material_x: Vec<f64>,
    pub material_y: Vec<f64>,
    pub material_z: Vec<f64>,
    pub material_mass: Vec<f64>,
    pub material_force: Vec<f64>,
    pub rigid_wall_forces: Vec<f64>,
}

impl GlobalState {
    fn read(buf: &mut D3Buffer, control: &ControlData, numrbs: i64) -> Result<GlobalState, D3plotError> {
        let mut global = GlobalState::default();
        global.kinetic_energy = buf.read_double()?;
        global.internal_energy = buf.read_double()?;
        global.total_energy = buf.read_double()?;
        global.velocity = [buf.read_double()?, buf.read_double()?, buf.read_double()?];

        let total = control.total_materials(numrbs);

        for slot in [
            &mut global.material_internal_energy,
            &mut global.material_kinetic_energy,
            &mut global.material_x,
            &mut global.material_y,
            &mut global.material_z,
            &mut global.material_mass,
            &mut global.material_force,
        ] {
            *slot = buf.read_doubles(total.max(0) as u64)?;
        }

        let consumed = 6 + 7 * total;
        let remaining_rw = control.nglbv - consumed;
        if remaining_rw > 0 {
            global.rigid_wall_forces = buf.read_doubles(remaining_rw as u64)?;
        }

        Ok(global)
    }
}

/// Per-node arrays for one state.
#[derive(Debug, Clone, Default)]
pub struct NodeState {
    /// `it` temperature components per node (0 if `IT` digit 0 is 0).
    pub temperatures: Vec<f64>,
    /// `N` thermal-flux components per node.
    pub thermal_flux: Vec<f64>,
    pub mass_scaling: Vec<f64>,
    pub displacements: Vec<[f64; 3]>,
    pub velocities: Vec<[f64; 3]>,
    pub accelerations: Vec<[f64; 3]>,
    /// Number of temperature components actually stored per node (1, or 3
    /// after the `N == 2` special case rewrites `it`).
    pub temperature_components: usize,
    pub flux_components: usize,
}

impl NodeState {
    fn read(buf: &mut D3Buffer, control: &ControlData) -> Result<NodeState, D3plotError> {
        let mut node = NodeState::default();
        let numnp = control.numnp.max(0) as u64;

        let it_digit = nth_digit(control.it, 0);
        let mut it = it_digit;
        let mut n = if it > 1 { it } else { 0 };
        if n == 2 {
            it = 1;
            n = 3;
        }
        let mass_n = nth_digit(control.it, 1) == 1;
        node.temperature_components = it as usize;
        node.flux_components = n as usize;

        if it > 0 {
            node.temperatures = buf.read_doubles(numnp * it as u64)?;
        }
        if n > 0 {
            node.thermal_flux = buf.read_doubles(numnp * n as u64)?;
        }
        if mass_n {
            node.mass_scaling = buf.read_doubles(numnp)?;
        }
        if control.iu != 0 {
            node.displacements = read_vec3s(buf, numnp)?;
        }
        if control.iv != 0 {
            node.velocities = read_vec3s(buf, numnp)?;
        }
        if control.ia != 0 {
            node.accelerations = read_vec3s(buf, numnp)?;
        }

        Ok(node)
    }
}

fn read_vec3s(buf: &mut D3Buffer, count: u64) -> Result<Vec<[f64; 3]>, D3plotError> {
    let flat = buf.read_doubles(count * 3)?;
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

/// Per-element-family result blocks, each row
/// holding `NV3D`/`NV1D`/`NV2D`/`NV3DT` raw result values.
#[derive(Debug, Clone, Default)]
pub struct ElementState {
    pub solids: Vec<Vec<f64>>,
    pub beams: Vec<Vec<f64>>,
    pub shells: Vec<Vec<f64>>,
    pub thick_shells: Vec<Vec<f64>>,
}

impl ElementState {
    fn read(buf: &mut D3Buffer, control: &ControlData) -> Result<ElementState, D3plotError> {
        let mut elements = ElementState::default();
        for _ in 0..control.nel8.max(0) {
            elements.solids.push(buf.read_doubles(control.nv3d.max(0) as u64)?);
        }
        for _ in 0..control.nel2.max(0) {
            elements.beams.push(buf.read_doubles(control.nv1d.max(0) as u64)?);
        }
        for _ in 0..control.nel4.max(0) {
            elements.shells.push(buf.read_doubles(control.nv2d.max(0) as u64)?);
        }
        for _ in 0..control.nelt.max(0) {
            elements
                .thick_shells
                .push(buf.read_doubles(control.nv3dt.max(0) as u64)?);
        }
        Ok(elements)
    }
}

/// One fully decoded state.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub time: f64,
    pub global: GlobalState,
    pub nodes: NodeState,
    /// `NT3D` thermal values per solid element, outer index is the value
    /// index and inner is the element index (`nt3d`-outer, `nel8`-inner read
    /// order).
    pub thermal_3d: Vec<Vec<f64>>,
    pub elements: ElementState,
    /// Deletion flags; empty when `MDLOPT == 0`.
    pub deletion: Vec<f64>,
}

/// Reads states sequentially until the EOF-marker time value is seen,
/// advancing across file-family boundaries as needed.
pub fn read_states(buf: &mut D3Buffer, control: &ControlData, numrbs: i64) -> Result<Vec<State>, D3plotError> {
    let mut states = Vec::new();

    loop {
        let time = buf.read_double()?;
        if D3Buffer::is_eof_marker(time) {
            if buf.advance_to_next_file().is_err() {
                break;
            }
            continue;
        }

        let global = GlobalState::read(buf, control, numrbs)?;
        let nodes = NodeState::read(buf, control)?;

        let mut thermal_3d = Vec::with_capacity(control.nt3d.max(0) as usize);
        for _ in 0..control.nt3d.max(0) {
            thermal_3d.push(buf.read_doubles(control.nel8.max(0) as u64)?);
        }

        let elements = ElementState::read(buf, control)?;

        let deletion_words = match control.mdlopt {
            0 => 0,
            1 => control.numnp.max(0),
            2 => control.nel8.max(0) + control.nelt.max(0) + control.nel4.max(0) + control.nel2.max(0),
            other => {
                tracing::debug!(mdlopt = other, "invalid MDLOPT");
                return Err(D3plotError::TruncatedState);
            }
        };
        let deletion = if deletion_words > 0 {
            buf.read_doubles(deletion_words as u64)?
        } else {
            Vec::new()
        };

        states.push(State {
            time,
            global,
            nodes,
            thermal_3d,
            elements,
            deletion,
        });
    }

    Ok(states)
}
