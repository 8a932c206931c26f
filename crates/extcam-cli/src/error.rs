// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments or configuration
    InvalidArgs(String),
    /// Logical device not present or device node inaccessible
    DeviceNotFound(String),
    /// Discovery could not run (device directory unavailable, worker died)
    DiscoveryFailed(String),
    /// General error from the extcam library
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            CliError::DiscoveryFailed(msg) => write!(f, "Discovery failed: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            CliError::InvalidArgs(_) => 2,
            CliError::DeviceNotFound(_) => 3,
            CliError::DiscoveryFailed(_) => 4,
            CliError::General(_) => 1,
        }
    }
}

/// Map extcam::Error to CliError with appropriate exit codes
impl From<extcam::Error> for CliError {
    fn from(err: extcam::Error) -> Self {
        use extcam::Error;

        match err {
            Error::InvalidDeviceName(name) => {
                CliError::InvalidArgs(format!("Invalid device name: {}", name))
            }
            Error::Config(msg) => CliError::InvalidArgs(format!("Invalid configuration: {}", msg)),
            Error::Json(json_err) => {
                CliError::InvalidArgs(format!("Configuration parse error: {}", json_err))
            }

            Error::DeviceNotPresent(name) => CliError::DeviceNotFound(name),
            Error::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::DeviceNotFound(format!("{}", io_err))
            }

            err @ Error::DirectoryUnavailable { .. } => CliError::DiscoveryFailed(err.to_string()),
            Error::Watch(watch_err) => {
                CliError::DiscoveryFailed(format!("Filesystem watch failed: {}", watch_err))
            }
            Error::WorkerPanicked => {
                CliError::DiscoveryFailed("Discovery worker panicked".to_string())
            }

            other => CliError::General(other.to_string()),
        }
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            CliError::InvalidArgs("test".into()).exit_code(),
            ExitCode::from(2)
        );
        assert_eq!(
            CliError::DeviceNotFound("test".into()).exit_code(),
            ExitCode::from(3)
        );
        assert_eq!(
            CliError::DiscoveryFailed("test".into()).exit_code(),
            ExitCode::from(4)
        );
        assert_eq!(
            CliError::General("test".into()).exit_code(),
            ExitCode::from(1)
        );
    }

    #[test]
    fn test_library_error_mapping() {
        let err = CliError::from(extcam::Error::InvalidDeviceName("x".into()));
        assert_eq!(err.code(), 2);

        let err = CliError::from(extcam::Error::DeviceNotPresent("device@3.4/external/7".into()));
        assert_eq!(err.code(), 3);

        let err = CliError::from(extcam::Error::DirectoryUnavailable {
            path: PathBuf::from("/dev"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        });
        assert_eq!(err.code(), 4);

        let err = CliError::from(extcam::Error::NotSupported("legacy device interface"));
        assert_eq!(err.code(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = CliError::DeviceNotFound("device@3.4/external/7".to_string());
        assert_eq!(format!("{}", err), "Device not found: device@3.4/external/7");
    }
}
