//! Command line definition and the validated run configuration.
//!
//! Option letters follow the established field-tool convention: capitals for
//! file paths, sampling and CSV column selections, lower case for tuning
//! toggles. The automatic `-h/--help` is disabled because both letters carry
//! navigation meaning; `-?` (or `--help`) requests the usage screen.

use std::path::PathBuf;

use clap::Parser;
use nalgebra::{Matrix3, Vector3};

use crate::error::NavError;
use crate::frames;

#[derive(Parser, Debug)]
#[command(
    name = "nav_fusion",
    about = "GPS + inertial sensor fusion: streams a sensor CSV through GNSS, INS and a 15-state error-state EKF",
    disable_help_flag = true
)]
pub struct Args {
    /// Input CSV file (comma separated, first row holds column names)
    #[arg(short = 'I', value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output directory for output.csv and the three KML tracks
    #[arg(short = 'O', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// 15 comma-separated KF standard deviations:
    /// 3 leading slots, 3 acc bias, 3 acc noise, 3 gyro bias, 3 gyro noise, 3 GPS DOP
    #[arg(short = 'K', value_name = "STD15", allow_hyphen_values = true)]
    pub kf_std: Option<String>,

    /// Sampling rates in Hz as "fs_imu,fs_gps"
    #[arg(short = 'F', value_name = "HZ,HZ", default_value = "100,1")]
    pub sampling: String,

    /// Accelerometer CSV column triplet "x,y,z"
    #[arg(short = 'A', value_name = "COLS", allow_hyphen_values = true)]
    pub acc_cols: Option<String>,

    /// Gyroscope CSV column triplet "x,y,z"
    #[arg(short = 'W', value_name = "COLS", allow_hyphen_values = true)]
    pub gyr_cols: Option<String>,

    /// Magnetometer CSV column triplet "x,y,z"
    #[arg(short = 'M', value_name = "COLS", allow_hyphen_values = true)]
    pub mag_cols: Option<String>,

    /// GPS latitude and longitude CSV columns "lat,lon" (degrees in the file)
    #[arg(short = 'C', value_name = "COLS", allow_hyphen_values = true)]
    pub gps_cols: Option<String>,

    /// GPS height CSV column
    #[arg(short = 'H', value_name = "COL", allow_hyphen_values = true)]
    pub height_col: Option<i64>,

    /// Fixed height in meters when no height column exists
    #[arg(short = 'h', value_name = "METERS", default_value_t = 100.0)]
    pub height_val: f64,

    /// Roll CSV column (derived from the accelerometer when absent)
    #[arg(short = 'R', value_name = "COL", allow_hyphen_values = true)]
    pub roll_col: Option<i64>,

    /// Pitch CSV column (derived from the accelerometer when absent)
    #[arg(short = 'P', value_name = "COL", allow_hyphen_values = true)]
    pub pitch_col: Option<i64>,

    /// Yaw CSV column (derived from the magnetometer when absent; needs -M)
    #[arg(short = 'Y', value_name = "COL", allow_hyphen_values = true)]
    pub yaw_col: Option<i64>,

    /// Accelerometer rest bias "x,y,z", subtracted in the platform frame
    #[arg(short = 'a', value_name = "X,Y,Z", default_value = "0,0,0", allow_hyphen_values = true)]
    pub acc_rest: String,

    /// Gyroscope rest bias "x,y,z", subtracted in the platform frame
    #[arg(short = 'w', value_name = "X,Y,Z", default_value = "0,0,0", allow_hyphen_values = true)]
    pub gyr_rest: String,

    /// Platform-to-body rotation, 9 row-major entries in {-1,0,1}
    #[arg(
        short = 'p',
        value_name = "9 VALUES",
        default_value = "1,0,0,0,1,0,0,0,1",
        allow_hyphen_values = true
    )]
    pub plat2body: String,

    /// Body axis mask "x,y,z" of 0/1 entries
    #[arg(short = 'x', value_name = "X,Y,Z", default_value = "1,0,0")]
    pub body_axes: String,

    /// Attitude angle mask "roll,pitch,yaw" of 0/1 entries
    #[arg(short = 'z', value_name = "R,P,Y", default_value = "0,0,1")]
    pub attitude_axes: String,

    /// Input angles in radians (1) or degrees (0)
    #[arg(short = 'r', value_name = "0|1", default_value_t = 1)]
    pub angles_in_radians: u8,

    /// Align IMU samples to the local horizontal plane before mechanization
    #[arg(short = 'l', value_name = "0|1", default_value_t = 0)]
    pub horizontal_alignment: u8,

    /// Feed estimated accelerometer/gyro biases back into the IMU samples
    #[arg(short = 'f', value_name = "0|1", default_value_t = 0)]
    pub feedback_bias: u8,

    /// Mechanize velocity in the local (ENU) frame instead of the body frame
    #[arg(short = 'm', value_name = "0|1", default_value_t = 0)]
    pub mechanics_local: u8,

    /// Subtract local gravity from the accelerometer samples
    #[arg(short = 'g', value_name = "0|1", default_value_t = 0)]
    pub gravity_correction: u8,

    /// Progress attitude by gyro-driven Euler dynamics after initialization
    #[arg(short = 'y', value_name = "0|1", default_value_t = 1)]
    pub progress_angles: u8,

    /// Markov correlation time (s) for the bias blocks of the transition matrix
    #[arg(short = 't', value_name = "SECONDS", default_value_t = 1.0)]
    pub tau: f64,

    /// GPS-off interval "min,max" in seconds; "-1,-1" disables
    #[arg(short = 'T', value_name = "S,S", default_value = "-1,-1", allow_hyphen_values = true)]
    pub gps_off: String,

    /// Quantization factor Q: samples become trunc(x·Q)/Q
    #[arg(short = 'q', value_name = "FACTOR", default_value_t = 10000.0)]
    pub quant_factor: f64,

    /// Write <input>_INDEX.txt listing every CSV column with its index, then exit
    #[arg(long = "idx")]
    pub index_mode: bool,

    /// Show this help
    #[arg(short = '?', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

/// CSV column selection per input category. `None` marks an absent field,
/// which acts as a feature selector rather than an error.
#[derive(Clone, Debug, Default)]
pub struct Columns {
    pub gps: [Option<usize>; 3], // lat, lon, height
    pub acc: [Option<usize>; 3],
    pub gyr: [Option<usize>; 3],
    pub mag: [Option<usize>; 3],
    pub rpy: [Option<usize>; 3],
    pub hdop: [Option<usize>; 3],
}

/// Immutable run configuration, validated once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub kf_std: String,
    pub fs_imu: f64,
    pub fs_gps: f64,
    pub cols: Columns,
    pub height_val: f64,
    pub acc_rest: Vector3<f64>,
    pub gyr_rest: Vector3<f64>,
    pub plat2body: Matrix3<f64>,
    pub body_selector: Vector3<f64>,
    pub attitude_selector: Vector3<f64>,
    pub angles_in_radians: bool,
    pub horizontal_alignment: bool,
    pub feedback_bias: bool,
    pub mechanics_local: bool,
    pub gravity_correction: bool,
    pub progress_angles: bool,
    pub tau: f64,
    pub gps_off: [i64; 2],
    pub quant_factor: f64,
    pub index_mode: bool,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, NavError> {
        let input = args
            .input
            .ok_or_else(|| NavError::InconsistentInputs("missing input file (-I)".into()))?;

        let (fs_imu, fs_gps) = parse_pair_f64(&args.sampling, "-F")?;
        if fs_imu <= 0.0 || fs_gps <= 0.0 {
            return Err(NavError::OutOfRange("sampling rates must be positive".into()));
        }

        let mut cols = Columns::default();
        if let Some(s) = &args.gps_cols {
            let [lat, lon] = parse_fixed::<2>(s, "-C")?;
            cols.gps[0] = to_col(lat);
            cols.gps[1] = to_col(lon);
        }
        cols.gps[2] = args.height_col.and_then(to_col);
        if let Some(s) = &args.acc_cols {
            cols.acc = parse_fixed::<3>(s, "-A")?.map(to_col);
        }
        if let Some(s) = &args.gyr_cols {
            cols.gyr = parse_fixed::<3>(s, "-W")?.map(to_col);
        }
        if let Some(s) = &args.mag_cols {
            cols.mag = parse_fixed::<3>(s, "-M")?.map(to_col);
        }
        cols.rpy = [
            args.roll_col.and_then(to_col),
            args.pitch_col.and_then(to_col),
            args.yaw_col.and_then(to_col),
        ];

        let output_dir = if args.index_mode {
            args.output_dir.unwrap_or_default()
        } else {
            args.output_dir
                .ok_or_else(|| NavError::InconsistentInputs("missing output directory (-O)".into()))?
        };

        if !args.index_mode {
            if args.kf_std.is_none() {
                return Err(NavError::InconsistentInputs("missing KF noise values (-K)".into()));
            }
            if args.acc_cols.is_none() || args.gyr_cols.is_none() || args.gps_cols.is_none() {
                return Err(NavError::InconsistentInputs(
                    "accelerometer (-A), gyroscope (-W) and GPS (-C) columns are mandatory".into(),
                ));
            }
            if cols.rpy[2].is_none() && args.mag_cols.is_none() {
                return Err(NavError::InconsistentInputs(
                    "yaw column (-Y) or magnetometer columns (-M) required".into(),
                ));
            }
        }

        let acc_rest = Vector3::from(parse_fixed_f64::<3>(&args.acc_rest, "-a")?);
        let gyr_rest = Vector3::from(parse_fixed_f64::<3>(&args.gyr_rest, "-w")?);

        let p2b = parse_fixed_f64::<9>(&args.plat2body, "-p")?;
        for v in p2b {
            check_range(v, -1.0, 1.0, "platform-to-body element")?;
        }
        let plat2body = frames::platform_to_body(&p2b);

        let body = parse_fixed_f64::<3>(&args.body_axes, "-x")?;
        let attitude = parse_fixed_f64::<3>(&args.attitude_axes, "-z")?;
        for v in body.iter().chain(attitude.iter()) {
            check_range(*v, 0.0, 1.0, "selector element")?;
        }

        let gps_off = parse_fixed::<2>(&args.gps_off, "-T")?;

        Ok(Config {
            input,
            output_dir,
            kf_std: args.kf_std.unwrap_or_default(),
            fs_imu,
            fs_gps,
            cols,
            height_val: args.height_val,
            acc_rest,
            gyr_rest,
            plat2body,
            body_selector: Vector3::from(body),
            attitude_selector: Vector3::from(attitude),
            angles_in_radians: check_toggle(args.angles_in_radians, "-r")?,
            horizontal_alignment: check_toggle(args.horizontal_alignment, "-l")?,
            feedback_bias: check_toggle(args.feedback_bias, "-f")?,
            mechanics_local: check_toggle(args.mechanics_local, "-m")?,
            gravity_correction: check_toggle(args.gravity_correction, "-g")?,
            progress_angles: check_toggle(args.progress_angles, "-y")?,
            tau: args.tau,
            gps_off,
            quant_factor: args.quant_factor,
            index_mode: args.index_mode,
        })
    }

    /// IMU sample interval in seconds.
    pub fn dt_imu(&self) -> f64 {
        1.0 / self.fs_imu
    }

    /// True when the GPS-off interval covers the given epoch counter.
    pub fn gps_off_covers(&self, epoch: usize) -> bool {
        if self.gps_off[0] == -1 && self.gps_off[1] == -1 {
            return false;
        }
        let epoch = epoch as f64;
        epoch >= self.gps_off[0] as f64 * self.fs_imu && epoch <= self.gps_off[1] as f64 * self.fs_imu
    }
}

fn to_col(v: i64) -> Option<usize> {
    (v >= 0).then_some(v as usize)
}

fn check_toggle(v: u8, flag: &str) -> Result<bool, NavError> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(NavError::OutOfRange(format!("{flag} expects 0 or 1"))),
    }
}

fn check_range(v: f64, min: f64, max: f64, what: &str) -> Result<(), NavError> {
    if v < min || v > max {
        return Err(NavError::OutOfRange(format!(
            "{what}: value entered out of range"
        )));
    }
    Ok(())
}

fn parse_fixed<const N: usize>(s: &str, flag: &str) -> Result<[i64; N], NavError> {
    let parts: Vec<i64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map(|v| v as i64))
        .collect::<Result<_, _>>()
        .map_err(|_| NavError::InputCount(format!("{flag}: could not parse \"{s}\"")))?;
    parts
        .try_into()
        .map_err(|_| NavError::InputCount(format!("{flag}: expected {N} comma-separated values")))
}

fn parse_fixed_f64<const N: usize>(s: &str, flag: &str) -> Result<[f64; N], NavError> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| NavError::InputCount(format!("{flag}: could not parse \"{s}\"")))?;
    parts
        .try_into()
        .map_err(|_| NavError::InputCount(format!("{flag}: expected {N} comma-separated values")))
}

fn parse_pair_f64(s: &str, flag: &str) -> Result<(f64, f64), NavError> {
    let [a, b] = parse_fixed_f64::<2>(s, flag)?;
    Ok((a, b))
}
