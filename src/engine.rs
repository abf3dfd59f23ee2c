//! The per-sample orchestrator.
//!
//! Owns the configuration, the monitor bits, the sensor conditioning holder
//! and the three pipelines, and drives them in strict order for every CSV
//! row: NavData → GNSS → INS → Fusion → output. It is also the only place
//! where typed failures terminate the run.

use std::fs::File;
use std::io::Write;

use crate::config::Config;
use crate::error::NavError;
use crate::io::output::EpochRecord;
use crate::io::{CsvInput, OutputSet};
use crate::monitor::Monitor;
use crate::navdata::NavData;
use crate::systems::{FusionSystem, GnssSystem, InsSystem};

pub struct Engine {
    cfg: Config,
    monitor: Monitor,
    navdata: NavData,
    gnss: GnssSystem,
    ins: InsSystem,
    fusion: FusionSystem,
}

impl Engine {
    pub fn new(cfg: Config) -> Result<Self, NavError> {
        let navdata = NavData::new(&cfg);
        let fusion = if cfg.index_mode {
            // Index mode never touches the filter; accept any -K.
            let mut relaxed = cfg.clone();
            relaxed.kf_std = "0,0,0,0,0,0,0,0,0,0,0,0,1,1,1".into();
            FusionSystem::new(&relaxed)?
        } else {
            FusionSystem::new(&cfg)?
        };
        Ok(Self {
            cfg,
            monitor: Monitor::default(),
            navdata,
            gnss: GnssSystem::default(),
            ins: InsSystem::default(),
            fusion,
        })
    }

    /// Run to end of input. Returns the `IdxHandled` kind after writing the
    /// column index file when `--idx` was requested.
    pub fn run(&mut self) -> Result<(), NavError> {
        if self.cfg.index_mode {
            return self.write_index_file();
        }

        let mut input = CsvInput::open(&self.cfg.input)?;
        input.read_header()?;
        let mut output = OutputSet::create(&self.cfg.output_dir)?;

        log::info!("processing starting");
        let mut first = true;
        while let Some(row) = input.next_row(first)? {
            first = false;
            self.process_epoch(&row)?;

            let record = EpochRecord::new(
                &self.gnss.data.llh,
                &self.ins.data,
                &self.fusion.data,
            );
            output.write_epoch(
                &record,
                &self.gnss.data.llh,
                &self.ins.data.frame.llh,
                &self.fusion.data.frame.llh,
            )?;

            if self.monitor.display_due {
                log::info!("processing completed: {}%", input.progress_percent());
            }
        }

        output.finish()?;
        log::info!("processing completed");
        Ok(())
    }

    /// One full epoch over an already tokenized row.
    pub fn process_epoch(&mut self, row: &[f64]) -> Result<(), NavError> {
        // Display throttling is decided on the epoch counter as it stands
        // before this row increments it.
        self.monitor.update(self.navdata.epoch());

        // The previous epoch's INS attitude and filter biases feed the
        // conditioning of this epoch.
        let ins_rpy = self.ins.data.rpy;
        let kf_bias = self
            .cfg
            .feedback_bias
            .then(|| (self.fusion.kf().acc_bias(), self.fusion.kf().gyr_bias()));

        self.navdata.update(row, &self.cfg, &ins_rpy, kf_bias)?;

        self.gnss.process(&self.navdata, &mut self.monitor);
        self.ins
            .process(&self.navdata, &self.cfg, &self.monitor, &self.gnss.data);
        self.fusion.process(
            &self.navdata,
            &self.cfg,
            &self.monitor,
            &self.ins.data,
            &self.gnss.data,
        )
    }

    pub fn gnss(&self) -> &GnssSystem {
        &self.gnss
    }

    pub fn ins(&self) -> &InsSystem {
        &self.ins
    }

    pub fn fusion(&self) -> &FusionSystem {
        &self.fusion
    }

    /// `--idx`: list every CSV column with its 0-based index next to the
    /// input file, then surface `IdxHandled` so the process exits.
    fn write_index_file(&self) -> Result<(), NavError> {
        let mut input = CsvInput::open(&self.cfg.input)?;
        input.read_header()?;

        let stem = self
            .cfg
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = self
            .cfg
            .input
            .with_file_name(format!("{stem}_INDEX.txt"));

        let mut file =
            File::create(&path).map_err(|_| NavError::FileOpen(path.display().to_string()))?;
        let mut content = String::from("Index of Elements:\n");
        for (index, name) in input.headers().iter().enumerate() {
            content.push_str(&format!("INDEX:\t{index}\t-\t{name}\n"));
        }
        file.write_all(content.as_bytes())
            .map_err(|_| NavError::FileWrite(path.display().to_string()))?;

        log::info!("column index written to {}", path.display());
        Err(NavError::IdxHandled)
    }
}
