//! Output writing: the per-epoch analysis CSV and one KML track per system.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::Vector3;
use serde::Serialize;

use crate::error::NavError;
use crate::types::InsSolution;

pub const OUTPUT_CSV: &str = "output.csv";
pub const OUTPUT_KML_GPS: &str = "kml_gps.kml";
pub const OUTPUT_KML_INS: &str = "kml_irs.kml";
pub const OUTPUT_KML_FUSION: &str = "kml_fusion.kml";

// KML track colors (aabbggrr)
const KML_COLOR_RED: &str = "FF0000FF";
const KML_COLOR_GREEN: &str = "FF00FF00";
const KML_COLOR_BLUE: &str = "FFFF0000";

const RAD2DEG: f64 = 180.0 / std::f64::consts::PI;

/// One output.csv row, all angles and coordinates in degrees.
#[derive(Clone, Debug, Serialize)]
pub struct EpochRecord {
    pub gps_lat: f64,
    pub gps_lon: f64,
    pub ins_lat: f64,
    pub ins_lon: f64,
    pub ins_v: f64,
    pub ins_roll: f64,
    pub ins_pitch: f64,
    pub ins_yaw: f64,
    pub fus_lat: f64,
    pub fus_lon: f64,
    pub fus_v: f64,
    pub fus_roll: f64,
    pub fus_pitch: f64,
    pub fus_yaw: f64,
}

impl EpochRecord {
    pub fn new(gps_llh: &Vector3<f64>, ins: &InsSolution, fusion: &InsSolution) -> Self {
        Self {
            gps_lat: gps_llh.x * RAD2DEG,
            gps_lon: gps_llh.y * RAD2DEG,
            ins_lat: ins.frame.llh.x * RAD2DEG,
            ins_lon: ins.frame.llh.y * RAD2DEG,
            ins_v: ins.v.norm(),
            ins_roll: ins.rpy.x * RAD2DEG,
            ins_pitch: ins.rpy.y * RAD2DEG,
            ins_yaw: ins.rpy.z * RAD2DEG,
            fus_lat: fusion.frame.llh.x * RAD2DEG,
            fus_lon: fusion.frame.llh.y * RAD2DEG,
            fus_v: fusion.v.norm(),
            fus_roll: fusion.rpy.x * RAD2DEG,
            fus_pitch: fusion.rpy.y * RAD2DEG,
            fus_yaw: fusion.rpy.z * RAD2DEG,
        }
    }
}

/// A single KML LineString track being appended to.
struct KmlTrack {
    writer: BufWriter<File>,
    path: String,
}

impl KmlTrack {
    fn create(path: &Path, label: &str, color: &str) -> Result<Self, NavError> {
        let file =
            File::create(path).map_err(|_| NavError::FileOpen(path.display().to_string()))?;
        let mut track = Self {
            writer: BufWriter::new(file),
            path: path.display().to_string(),
        };
        let header = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <kml>\n\
             \x20 <Document>\n\
             \x20   <name>{label}</name>\n\
             \x20   <description>ROUTE</description>\n\
             \x20   <Style id=\"trackLine\">\n\
             \x20     <LineStyle>\n\
             \x20       <color>{color}</color>\n\
             \x20       <width>3</width>\n\
             \x20     </LineStyle>\n\
             \x20   </Style>\n\
             \x20   <Placemark>\n\
             \x20     <name>{label} track</name>\n\
             \x20     <description>LLH</description>\n\
             \x20     <styleUrl>#trackLine</styleUrl>\n\
             \x20     <LineString>\n\
             \x20       <extrude>1</extrude>\n\
             \x20       <tessellate>1</tessellate>\n\
             \x20       <altitudeMode>absolute</altitudeMode>\n\
             \x20       <coordinates>\n"
        );
        track.write(&header)?;
        Ok(track)
    }

    /// KML wants lon,lat ordering, in degrees.
    fn write_point(&mut self, llh: &Vector3<f64>) -> Result<(), NavError> {
        let line = format!(
            "        {},{},{}\n",
            llh.y * RAD2DEG,
            llh.x * RAD2DEG,
            llh.z
        );
        self.write(&line)
    }

    fn write_footer(&mut self) -> Result<(), NavError> {
        self.write(
            "        </coordinates>\n\
             \x20     </LineString>\n\
             \x20   </Placemark>\n\
             \x20 </Document>\n\
             </kml>\n",
        )
    }

    fn write(&mut self, content: &str) -> Result<(), NavError> {
        self.writer
            .write_all(content.as_bytes())
            .map_err(|_| NavError::FileWrite(self.path.clone()))
    }

    fn finish(&mut self) -> Result<(), NavError> {
        self.writer
            .flush()
            .map_err(|_| NavError::FileClose(self.path.clone()))
    }
}

/// The four output files of a run.
pub struct OutputSet {
    csv: BufWriter<File>,
    csv_path: String,
    gps: KmlTrack,
    ins: KmlTrack,
    fusion: KmlTrack,
}

impl OutputSet {
    /// Create the files and write every header.
    pub fn create(dir: &Path) -> Result<Self, NavError> {
        let csv_path = dir.join(OUTPUT_CSV);
        let file = File::create(&csv_path)
            .map_err(|_| NavError::FileOpen(csv_path.display().to_string()))?;
        let mut out = Self {
            csv: BufWriter::new(file),
            csv_path: csv_path.display().to_string(),
            gps: KmlTrack::create(&dir.join(OUTPUT_KML_GPS), "GPS", KML_COLOR_BLUE)?,
            ins: KmlTrack::create(&dir.join(OUTPUT_KML_INS), "INS", KML_COLOR_RED)?,
            fusion: KmlTrack::create(&dir.join(OUTPUT_KML_FUSION), "FUSION", KML_COLOR_GREEN)?,
        };
        out.write_csv(
            "GPS_LAT,GPS_LON,INS_LAT,INS_LON,INS_V,INS_ROLL,INS_PITCH,INS_YAW,\
             FUS_LAT,FUS_LON,FUS_V,FUS_ROLL,FUS_PITCH,FUS_YAW\n"
                .to_string(),
        )?;
        Ok(out)
    }

    /// Append one epoch to the CSV and to each KML track.
    pub fn write_epoch(
        &mut self,
        record: &EpochRecord,
        gps_llh: &Vector3<f64>,
        ins_llh: &Vector3<f64>,
        fusion_llh: &Vector3<f64>,
    ) -> Result<(), NavError> {
        let row = format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            fmt(record.gps_lat),
            fmt(record.gps_lon),
            fmt(record.ins_lat),
            fmt(record.ins_lon),
            fmt(record.ins_v),
            fmt(record.ins_roll),
            fmt(record.ins_pitch),
            fmt(record.ins_yaw),
            fmt(record.fus_lat),
            fmt(record.fus_lon),
            fmt(record.fus_v),
            fmt(record.fus_roll),
            fmt(record.fus_pitch),
            fmt(record.fus_yaw),
        );
        self.write_csv(row)?;

        self.gps.write_point(gps_llh)?;
        self.ins.write_point(ins_llh)?;
        self.fusion.write_point(fusion_llh)?;
        Ok(())
    }

    /// Write the KML footers and flush everything. Only called on clean
    /// termination; an aborted run leaves the tracks unterminated.
    pub fn finish(mut self) -> Result<(), NavError> {
        self.gps.write_footer()?;
        self.ins.write_footer()?;
        self.fusion.write_footer()?;
        self.gps.finish()?;
        self.ins.finish()?;
        self.fusion.finish()?;
        self.csv
            .flush()
            .map_err(|_| NavError::FileClose(self.csv_path.clone()))
    }

    fn write_csv(&mut self, content: String) -> Result<(), NavError> {
        self.csv
            .write_all(content.as_bytes())
            .map_err(|_| NavError::FileWrite(self.csv_path.clone()))
    }
}

/// Ten significant digits, matching the analysis precision of the CSV.
fn fmt(v: f64) -> String {
    format!("{v:.10}")
}
