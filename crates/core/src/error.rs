use thiserror::Error;

use crate::job::{GridShape, Position};

#[derive(Error, Debug)]
pub enum BatchfieldError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Position {position} out of bounds for grid {shape}")]
    OutOfBounds {
        position: Position,
        shape: GridShape,
    },

    #[error("Incomplete schedule, missing results for: {}", missing.join(", "))]
    IncompleteSchedule { missing: Vec<String> },

    #[error("Duplicate job id: {0}")]
    DuplicateJob(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BatchfieldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_schedule_names_missing_jobs() {
        let err = BatchfieldError::IncompleteSchedule {
            missing: vec!["job-3".into(), "job-7".into()],
        };
        assert_eq!(
            err.to_string(),
            "Incomplete schedule, missing results for: job-3, job-7"
        );
    }

    #[test]
    fn out_of_bounds_mentions_position_and_shape() {
        let err = BatchfieldError::OutOfBounds {
            position: Position::new(10, 0, -1),
            shape: GridShape::new(10, 10, 10),
        };
        let msg = err.to_string();
        assert!(msg.contains("(10, 0, -1)"), "got: {msg}");
        assert!(msg.contains("10x10x10"), "got: {msg}");
    }
}
