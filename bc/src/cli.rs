//! CLI command definitions and input loading

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::events::{AgentMetadata, DomainEvent};

/// Batcher - correlate stateful events with their indexer responses
#[derive(Parser)]
#[command(
    name = "bc",
    about = "Send stateful events through the batching queue and collect their responses",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send the events of a file and print one response per event
    Send {
        /// YAML or JSON file holding `agent` and `events`
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Per-event deadline in milliseconds (defaults to client.request-timeout-ms)
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Show the module to index routing table
    Indices,
}

/// Input of `bc send`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFile {
    pub agent: AgentMetadata,
    #[serde(default)]
    pub events: Vec<DomainEvent>,
}

impl EventFile {
    /// Read an event file; JSON is accepted as YAML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!(path = %path.as_ref().display(), "EventFile::load: called");
        let content = fs::read_to_string(&path).context("Failed to read event file")?;
        let file: Self = serde_yaml::from_str(&content).context("Failed to parse event file")?;
        debug!(events = file.events.len(), "EventFile::load: parsed");
        Ok(file)
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("batcher")
        .join("logs")
        .join("bc.log");
    debug!(?path, "get_log_path: returning path");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ModuleName;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_parse_send() {
        let cli = Cli::parse_from(["bc", "send", "events.yml", "--timeout-ms", "250"]);
        if let Command::Send { file, timeout_ms } = cli.command {
            assert_eq!(file, PathBuf::from("events.yml"));
            assert_eq!(timeout_ms, Some(250));
        } else {
            panic!("Expected Send command");
        }
    }

    #[test]
    fn test_cli_parse_indices() {
        let cli = Cli::parse_from(["bc", "indices"]);
        assert!(matches!(cli.command, Command::Indices));
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["bc", "indices", "-c", "/path/to/batcher.yml", "-l", "DEBUG"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/batcher.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("DEBUG"));
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["bc"]).is_err());
    }

    #[test]
    fn test_load_yaml_event_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
agent:
  id: "001"
  groups: [default]
events:
  - module: fim
    data:
      file:
        path: /etc/hosts
  - module: inventory
    kind: ports
    data:
      port:
        number: 22
"#
        )
        .unwrap();

        let loaded = EventFile::load(file.path()).unwrap();

        assert_eq!(loaded.agent.id, "001");
        assert_eq!(loaded.events.len(), 2);
        assert_eq!(loaded.events[0].module(), ModuleName::Fim);
        assert_eq!(loaded.events[1].index_name(), "wazuh-states-inventory-ports");
    }

    #[test]
    fn test_load_json_event_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"agent": {{"id": "002"}}, "events": [{{"module": "sca", "data": {{"check": {{"id": 1}}}}}}]}}"#
        )
        .unwrap();

        let loaded = EventFile::load(file.path()).unwrap();

        assert!(loaded.agent.groups.is_empty());
        assert_eq!(loaded.events[0].module(), ModuleName::Sca);
    }

    #[test]
    fn test_load_missing_agent_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "events: []").unwrap();

        assert!(EventFile::load(file.path()).is_err());
    }
}
