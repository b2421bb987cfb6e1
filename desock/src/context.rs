use std::ffi::c_int;

use libc::pollfd;

use crate::gate::AdmissionGate;
use crate::synth::{self, Synthesized, WatchSets};
use crate::table::FdTable;

/// Coordination state shared by every intercepted call of one process.
///
/// Starts with one admission permit, `pending_block` clear and an empty
/// descriptor table. Never reinitialized.
#[derive(Debug, Default)]
pub struct DesockContext {
    gate: AdmissionGate,
    table: FdTable,
}

impl DesockContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn table(&self) -> &FdTable {
        &self.table
    }

    pub fn synthesize_poll(&self, fds: &mut [pollfd]) -> Synthesized {
        synth::synthesize_poll(fds, &self.table, &self.gate)
    }

    pub fn has_desock_fds(&self, n: c_int, sets: &WatchSets<'_>) -> bool {
        synth::has_desock_fds(n, sets, &self.table)
    }

    pub fn synthesize_select(&self, n: c_int, sets: &mut WatchSets<'_>) -> Synthesized {
        synth::synthesize_select(n, sets, &self.table, &self.gate)
    }
}
