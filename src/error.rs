//! Typed failure kinds for the whole run.
//!
//! Every fallible path in the crate surfaces one of these; the binary is the
//! only place they are translated into a process exit code.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum NavError {
    #[error("help command called")]
    HelpRequested,

    #[error("end of file")]
    EndOfFile,

    #[error("file open error: {0}")]
    FileOpen(String),

    #[error("file close error: {0}")]
    FileClose(String),

    #[error("file write error: {0}")]
    FileWrite(String),

    #[error("file read error: {0}")]
    FileRead(String),

    #[error("out of range value: {0}")]
    OutOfRange(String),

    #[error("error in number of inputs: {0}")]
    InputCount(String),

    #[error("inconsistent input argument: {0}")]
    InconsistentInputs(String),

    #[error("KF noise configuration must hold 15 comma-separated values")]
    KfStdLengthMismatch,

    #[error("column index file written")]
    IdxHandled,

    #[error("error unknown")]
    Unknown,

    #[error("KF innovation covariance is singular")]
    KfUpdateNonInvertible,
}

impl NavError {
    /// Stable process exit code for each kind. 0 is reserved for success.
    pub fn exit_code(&self) -> i32 {
        match self {
            NavError::HelpRequested => 1,
            NavError::EndOfFile => 2,
            NavError::FileOpen(_) => 3,
            NavError::FileClose(_) => 4,
            NavError::FileWrite(_) => 5,
            NavError::FileRead(_) => 6,
            NavError::OutOfRange(_) => 7,
            NavError::InputCount(_) => 8,
            NavError::InconsistentInputs(_) => 9,
            NavError::KfStdLengthMismatch => 10,
            NavError::IdxHandled => 11,
            NavError::Unknown => 12,
            NavError::KfUpdateNonInvertible => 13,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let all = [
            NavError::HelpRequested,
            NavError::EndOfFile,
            NavError::FileOpen(String::new()),
            NavError::FileClose(String::new()),
            NavError::FileWrite(String::new()),
            NavError::FileRead(String::new()),
            NavError::OutOfRange(String::new()),
            NavError::InputCount(String::new()),
            NavError::InconsistentInputs(String::new()),
            NavError::KfStdLengthMismatch,
            NavError::IdxHandled,
            NavError::Unknown,
            NavError::KfUpdateNonInvertible,
        ];
        let mut codes: Vec<i32> = all.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        assert!(codes.iter().all(|&c| c != 0));
    }
}
