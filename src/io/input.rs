//! Input CSV streaming.
//!
//! The first row names the columns; every later row is parsed into doubles.
//! Fields that fail to parse become NaN and flow into the validity gates
//! instead of aborting the run.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::NavError;

#[derive(Debug)]
pub struct CsvInput {
    reader: BufReader<File>,
    path: PathBuf,
    headers: Vec<String>,
    file_size: u64,
    read_bytes: u64,
}

impl CsvInput {
    pub fn open(path: &Path) -> Result<Self, NavError> {
        let file =
            File::open(path).map_err(|_| NavError::FileOpen(path.display().to_string()))?;
        let file_size = file
            .metadata()
            .map(|m| m.len())
            .map_err(|_| NavError::FileOpen(path.display().to_string()))?;
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            headers: Vec::new(),
            file_size,
            read_bytes: 0,
        })
    }

    /// Read the first row and keep the column names.
    pub fn read_header(&mut self) -> Result<(), NavError> {
        let line = self
            .read_line()?
            .ok_or(NavError::EndOfFile)?;
        if line.trim().is_empty() {
            return Err(NavError::FileRead(self.path.display().to_string()));
        }
        self.headers = line
            .trim_end()
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Next data row as doubles, or `None` at end of input. An empty line is
    /// fatal on the first data row and terminates the stream afterwards.
    pub fn next_row(&mut self, first_data_row: bool) -> Result<Option<Vec<f64>>, NavError> {
        let line = match self.read_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if line.trim().is_empty() {
            log::warn!("empty line found on input CSV file");
            if first_data_row {
                return Err(NavError::FileRead(self.path.display().to_string()));
            }
            return Ok(None);
        }
        let row = line
            .trim_end()
            .split(',')
            .map(|field| field.trim().parse::<f64>().unwrap_or(f64::NAN))
            .collect();
        Ok(Some(row))
    }

    /// Share of the input consumed so far, in percent.
    pub fn progress_percent(&self) -> u32 {
        if self.file_size == 0 {
            return 100;
        }
        ((self.read_bytes as f64 / self.file_size as f64) * 100.0) as u32
    }

    fn read_line(&mut self) -> Result<Option<String>, NavError> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|_| NavError::FileRead(self.path.display().to_string()))?;
        if n == 0 {
            return Ok(None);
        }
        self.read_bytes += n as u64;
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_csv(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn header_then_rows() {
        let path = temp_csv(
            "nav_fusion_input_test.csv",
            "lat,lon,accX\n1.0,2.0,0.5\n3.0,nan,0.25\n",
        );
        let mut input = CsvInput::open(&path).unwrap();
        input.read_header().unwrap();
        assert_eq!(input.headers(), ["lat", "lon", "accX"]);

        let row = input.next_row(true).unwrap().unwrap();
        assert_eq!(row, vec![1.0, 2.0, 0.5]);
        let row = input.next_row(false).unwrap().unwrap();
        assert!(row[1].is_nan());
        assert!(input.next_row(false).unwrap().is_none());
        assert_eq!(input.progress_percent(), 100);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn unparseable_field_becomes_nan() {
        let path = temp_csv("nav_fusion_badfield_test.csv", "a,b\n1.0,oops\n");
        let mut input = CsvInput::open(&path).unwrap();
        input.read_header().unwrap();
        let row = input.next_row(true).unwrap().unwrap();
        assert_eq!(row[0], 1.0);
        assert!(row[1].is_nan());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_open_error() {
        let err = CsvInput::open(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, NavError::FileOpen(_)));
    }

    #[test]
    fn empty_first_data_row_is_fatal() {
        let path = temp_csv("nav_fusion_emptyrow_test.csv", "a,b\n\n1,2\n");
        let mut input = CsvInput::open(&path).unwrap();
        input.read_header().unwrap();
        assert!(matches!(
            input.next_row(true),
            Err(NavError::FileRead(_))
        ));
        std::fs::remove_file(path).ok();
    }
}
