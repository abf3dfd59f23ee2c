//! GNSS pipeline: places the GPS fix in the shared local frame.

use crate::frames;
use crate::monitor::Monitor;
use crate::navdata::NavData;
use crate::types::{has_nan, GeoFrame};

#[derive(Debug, Default)]
pub struct GnssSystem {
    pub data: GeoFrame,
}

impl GnssSystem {
    /// Convert the conditioned GPS LLH into ECEF and ENU. The first fully
    /// valid ECEF becomes the run-wide ENU anchor; the final LLH is
    /// round-tripped through ENU so it matches what ENU can represent.
    pub fn process(&mut self, nav: &NavData, monitor: &mut Monitor) {
        self.data.llh = nav.gps.values;

        self.data.ecef = frames::llh_to_ecef(&self.data.llh);
        if !monitor.ecef_ref_set && !has_nan(&self.data.ecef) {
            self.data.ecef_ref = self.data.ecef;
            monitor.ecef_ref_set = true;
        }

        self.data.enu = frames::ecef_to_enu(&self.data.llh, &self.data.ecef, &self.data.ecef_ref);
        self.data.ecef = frames::enu_to_ecef(&self.data.llh, &self.data.enu, &self.data.ecef_ref);
        self.data.llh = frames::ecef_to_llh(&self.data.ecef);
    }
}
