//! Neighbor table sources

use super::{DiscoveryError, NeighborSource};
use crate::config::DiscoveryConfig;
use std::io;
use std::process::Command;

/// Runs the platform neighbor-table command (`arp -a` by default)
#[derive(Debug, Clone)]
pub struct CommandSource {
    command: String,
    args: Vec<String>,
}

impl CommandSource {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

impl Default for CommandSource {
    fn default() -> Self {
        Self::from_config(&DiscoveryConfig::default())
    }
}

impl NeighborSource for CommandSource {
    fn read_table(&self) -> Result<String, DiscoveryError> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    DiscoveryError::CommandUnavailable(format!("{} not found", self.command))
                }
                _ => DiscoveryError::CommandUnavailable(format!("{}: {}", self.command, e)),
            })?;

        if !output.status.success() {
            return Err(DiscoveryError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_command_is_unavailable() {
        let source = CommandSource::new("cityguard-no-such-arp-binary", vec![]);
        assert!(matches!(
            source.read_table(),
            Err(DiscoveryError::CommandUnavailable(_))
        ));
    }

    #[test]
    fn test_describe() {
        assert_eq!(CommandSource::default().describe(), "arp -a");
        assert_eq!(CommandSource::new("ip", vec![]).describe(), "ip");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_output_and_failure() {
        let echo = CommandSource::new("echo", vec!["10.0.0.1 aa-bb".to_string()]);
        assert_eq!(echo.read_table().unwrap().trim(), "10.0.0.1 aa-bb");

        let failing = CommandSource::new("false", vec![]);
        assert!(matches!(
            failing.read_table(),
            Err(DiscoveryError::CommandFailed { .. })
        ));
    }
}
