//! meshnet Topology custom resource types
//!
//! The meshnet CNI controller consumes a `Topology` resource in which each
//! physical link appears twice, once per side. Field names below are the
//! controller's snake_case wire keys, so no `rename_all` here.

use serde::{Deserialize, Serialize};

use crate::k8s::ObjectMeta;

/// API version of the meshnet Topology resource
pub const API_VERSION: &str = "networkop.co.uk/v1beta1";

/// Resource kind
pub const KIND: &str = "Topology";

/// Metadata name of the generated topology document
pub const TOPOLOGY_NAME: &str = "autogen-topology";

/// meshnet Topology resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: TopologySpec,
}

impl Topology {
    /// Create an empty Topology
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: TopologySpec::default(),
        }
    }
}

/// Topology spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TopologySpec {
    /// Directional half-link records, two per physical link
    pub links: Vec<HalfLink>,
}

/// One directional declaration of a physical link endpoint
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HalfLink {
    /// Unique id within the whole topology
    pub uid: u64,
    /// Sanitized peer pod name
    pub peer_pod: String,
    /// Interface on the local pod
    pub local_intf: String,
    /// Interface on the peer pod
    pub peer_intf: String,
    /// Local endpoint address, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_ip: Option<String>,
    /// Peer endpoint address, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_ip: Option<String>,
}
