//! Agent metadata and stateful event model
//!
//! Only the shape the correlation layer needs lives here: which module an
//! event belongs to, where it is routed, and its raw data object.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw event data as received from the agent
pub type EventData = Map<String, Value>;

/// Operating system details reported by an agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Os {
    pub name: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
}

/// Host details reported by an agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub architecture: Option<String>,
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip: Vec<String>,
    pub os: Option<Os>,
}

/// Identity of the agent that produced an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub id: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub host: Option<Host>,
}

impl AgentMetadata {
    pub fn new(id: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            id: id.into(),
            groups,
            ..Default::default()
        }
    }
}

/// Modules able to send stateful events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleName {
    Fim,
    Inventory,
    Sca,
    Vulnerability,
}

impl ModuleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleName::Fim => "fim",
            ModuleName::Inventory => "inventory",
            ModuleName::Sca => "sca",
            ModuleName::Vulnerability => "vulnerability",
        }
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inventory collectors, each with its own index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InventoryKind {
    Hardware,
    Hotfixes,
    Networks,
    Packages,
    Ports,
    Processes,
    System,
}

impl InventoryKind {
    pub const ALL: [InventoryKind; 7] = [
        InventoryKind::Hardware,
        InventoryKind::Hotfixes,
        InventoryKind::Networks,
        InventoryKind::Packages,
        InventoryKind::Ports,
        InventoryKind::Processes,
        InventoryKind::System,
    ];

    fn index_name(&self) -> &'static str {
        match self {
            InventoryKind::Hardware => "wazuh-states-inventory-hardware",
            InventoryKind::Hotfixes => "wazuh-states-inventory-hotfixes",
            InventoryKind::Networks => "wazuh-states-inventory-networks",
            InventoryKind::Packages => "wazuh-states-inventory-packages",
            InventoryKind::Ports => "wazuh-states-inventory-ports",
            InventoryKind::Processes => "wazuh-states-inventory-processes",
            InventoryKind::System => "wazuh-states-inventory-system",
        }
    }
}

pub const FIM_INDEX: &str = "wazuh-states-fim";
pub const SCA_INDEX: &str = "wazuh-states-sca";
pub const VULNERABILITY_INDEX: &str = "wazuh-states-vulnerabilities";

/// A stateful event, tagged by the module that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "module", rename_all = "kebab-case")]
pub enum DomainEvent {
    Fim { data: EventData },
    Inventory { kind: InventoryKind, data: EventData },
    Sca { data: EventData },
    Vulnerability { data: EventData },
}

impl DomainEvent {
    pub fn module(&self) -> ModuleName {
        match self {
            DomainEvent::Fim { .. } => ModuleName::Fim,
            DomainEvent::Inventory { .. } => ModuleName::Inventory,
            DomainEvent::Sca { .. } => ModuleName::Sca,
            DomainEvent::Vulnerability { .. } => ModuleName::Vulnerability,
        }
    }

    pub fn data(&self) -> &EventData {
        match self {
            DomainEvent::Fim { data }
            | DomainEvent::Inventory { data, .. }
            | DomainEvent::Sca { data }
            | DomainEvent::Vulnerability { data } => data,
        }
    }

    /// Index the event is routed to
    pub fn index_name(&self) -> &'static str {
        match self {
            DomainEvent::Fim { .. } => FIM_INDEX,
            DomainEvent::Inventory { kind, .. } => kind.index_name(),
            DomainEvent::Sca { .. } => SCA_INDEX,
            DomainEvent::Vulnerability { .. } => VULNERABILITY_INDEX,
        }
    }
}

/// Full routing table, `(module[/kind], index)`
pub fn routing_table() -> Vec<(String, &'static str)> {
    let mut table = vec![(ModuleName::Fim.to_string(), FIM_INDEX)];
    for kind in InventoryKind::ALL {
        let label = serde_json::to_value(kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        table.push((format!("{}/{}", ModuleName::Inventory, label), kind.index_name()));
    }
    table.push((ModuleName::Sca.to_string(), SCA_INDEX));
    table.push((ModuleName::Vulnerability.to_string(), VULNERABILITY_INDEX));
    table
}
