//! Topology catalog model
//!
//! The catalog is the compiler's whole input: the set of nodes and the
//! undirected links wiring their interfaces together. It is an explicit
//! value passed into the compiler — there is no process-wide state — so
//! regeneration is a pure function of the catalog and the config artifacts
//! it points at.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::names;

/// A node in the emulated network: one container-to-be with its interfaces
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Raw node name as declared by the emulator (may contain underscores)
    pub name: String,
    /// Container image
    pub image: String,
    /// Interface names; the first entry is the default/management interface
    pub interfaces: Vec<String>,
    /// Whether the node runs the routing daemon with injected config
    #[serde(default)]
    pub is_router: bool,
    /// Path to the BIRD config artifact on disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    /// Management address assigned to the default interface at launch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Node {
    /// Kubernetes-safe form of the node name
    pub fn safe_name(&self) -> String {
        names::sanitize(&self.name)
    }

    /// The default/management interface (first declared)
    pub fn default_interface(&self) -> Option<&str> {
        self.interfaces.first().map(String::as_str)
    }

    /// Validate the node definition
    fn validate(&self) -> std::result::Result<(), String> {
        if self.interfaces.is_empty() {
            return Err(format!("node '{}' has no interfaces", self.name));
        }
        let mut seen = BTreeSet::new();
        for interface in &self.interfaces {
            if !seen.insert(interface.as_str()) {
                return Err(format!(
                    "node '{}' declares interface '{}' twice",
                    self.name, interface
                ));
            }
        }
        Ok(())
    }
}

/// One side of an undirected link
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkEndpoint {
    /// Raw node name (sanitized on emission)
    pub node: String,
    /// Interface name on that node
    pub interface: String,
}

impl LinkEndpoint {
    /// Create an endpoint
    pub fn new(node: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            interface: interface.into(),
        }
    }
}

/// An undirected link between two node interfaces
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Declared link id; forward half-link uids are taken from it
    pub id: u64,
    /// First endpoint
    pub a: LinkEndpoint,
    /// Second endpoint
    pub b: LinkEndpoint,
}

/// The full set of nodes and links to compile
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// Node definitions, in emission order
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Undirected links between node interfaces
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Catalog {
    /// Validate the catalog before compilation.
    ///
    /// Checks sanitized-name collisions across nodes, per-node interface
    /// uniqueness, duplicate link ids, and that no (node, interface) pair is
    /// wired by more than one link endpoint. Link endpoints are NOT checked
    /// against the node set: a link may reference an undeclared node or
    /// interface and still encode deterministically.
    pub fn validate(&self) -> Result<()> {
        names::ensure_unique(self.nodes.iter().map(|n| n.name.as_str()))?;

        for node in &self.nodes {
            node.validate().map_err(Error::invalid_catalog)?;
        }

        let mut ids = BTreeSet::new();
        let mut wired = BTreeSet::new();
        for link in &self.links {
            if !ids.insert(link.id) {
                return Err(Error::DuplicateLinkId { id: link.id });
            }
            for endpoint in [&link.a, &link.b] {
                if !wired.insert((endpoint.node.as_str(), endpoint.interface.as_str())) {
                    return Err(Error::invalid_catalog(format!(
                        "interface '{}' on node '{}' is wired by more than one link",
                        endpoint.interface, endpoint.node
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up a node's management address by raw name
    pub fn address_of(&self, node_name: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.name == node_name)
            .and_then(|n| n.address.as_deref())
    }
}
