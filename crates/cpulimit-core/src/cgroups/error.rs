//! Error types for CFS bandwidth operations

use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::types::Quota;

/// CFS controller errors
///
/// Every variant carries the control file it concerns, so a caller can
/// tell which cgroup misbehaved without re-deriving the path.
#[derive(Debug, Error)]
pub enum CfsError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Content of {} did not have the required parts: {content:?}", path.display())]
    Format { path: PathBuf, content: String },

    #[error("Could not parse {field} of {}: {value:?}", path.display())]
    Parse {
        path: PathBuf,
        field: String,
        value: String,
        /// Set when the digits were valid but did not fit
        #[source]
        source: Option<ParseIntError>,
    },

    #[error("{} did not contain {key}", path.display())]
    KeyNotFound { path: PathBuf, key: String },

    #[error(
        "Cannot set CFS quota of {} (period is {}, parent quota is {parent_quota}) on {}: {source}",
        quota.as_micros(),
        period.as_micros(),
        path.display()
    )]
    LimitRejected {
        path: PathBuf,
        /// Quota that was attempted
        quota: Duration,
        /// Period in effect when the write was attempted
        period: Duration,
        /// Parent's quota, `Quota::Unlimited` when it could not be read
        parent_quota: Quota,
        #[source]
        source: io::Error,
    },
}

impl CfsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The cgroup or its control file does not exist
    pub fn is_not_found(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::NotFound)
    }

    /// Insufficient privileges for the control file
    pub fn is_permission_denied(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::PermissionDenied)
    }

    fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } | Self::LimitRejected { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CfsError::KeyNotFound {
            path: PathBuf::from("/sys/fs/cgroup/ws/cpu.stat"),
            key: "usage_usec".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "/sys/fs/cgroup/ws/cpu.stat did not contain usage_usec"
        );

        let err = CfsError::Format {
            path: PathBuf::from("/sys/fs/cgroup/ws/cpu.max"),
            content: "100000".to_string(),
        };
        assert!(err.to_string().contains("\"100000\""));
    }

    #[test]
    fn test_limit_rejected_display() {
        let err = CfsError::LimitRejected {
            path: PathBuf::from("/sys/fs/cgroup/ws/cpu.max"),
            quota: Duration::from_micros(80_000),
            period: Duration::from_micros(100_000),
            parent_quota: Quota::Limited(Duration::from_micros(50_000)),
            source: io::Error::from(io::ErrorKind::InvalidInput),
        };

        let msg = err.to_string();
        assert!(msg.contains("quota of 80000"));
        assert!(msg.contains("period is 100000"));
        assert!(msg.contains("parent quota is 50000"));
    }

    #[test]
    fn test_io_kind_predicates() {
        let err = CfsError::io(
            "/sys/fs/cgroup/gone/cpu.stat",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert!(!err.is_permission_denied());

        let err = CfsError::io(
            "/sys/fs/cgroup/cpu.max",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(err.is_permission_denied());

        let err = CfsError::KeyNotFound {
            path: PathBuf::from("cpu.stat"),
            key: "nr_throttled".to_string(),
        };
        assert!(!err.is_not_found());
    }
}
