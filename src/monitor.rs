//! Run-wide monitor bits shared by the pipelines.

/// Progress is reported every this many epochs.
pub const DISPLAY_EPOCH_INTERVAL: usize = 2000;

/// The two run-wide flags: whether the shared ENU anchor has been set by the
/// first valid GPS fix, and whether this epoch is a display tick.
#[derive(Debug, Default)]
pub struct Monitor {
    pub ecef_ref_set: bool,
    pub display_due: bool,
}

impl Monitor {
    pub fn update(&mut self, epoch: usize) {
        self.display_due = epoch % DISPLAY_EPOCH_INTERVAL == 0;
    }
}
