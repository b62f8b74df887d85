//! Kubernetes resource types emitted by the compiler
//!
//! Only the manifest schema subset meshgen actually produces: Pod with a
//! single privileged container, ConfigMap, and the multi-interface
//! attachment annotation. Serialization happens once, at the output
//! boundary, through these typed records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Annotation key consumed by the CNI multiplexer for extra interfaces
pub const NETWORKS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/networks";

/// Network-attachment name shared by all meshnet interfaces
pub const MESHNET_NETWORK: &str = "meshnet";

// =============================================================================
// ObjectMeta
// =============================================================================

/// Object metadata for emitted resources.
///
/// No namespace field: manifests are applied into a namespace chosen at
/// apply time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Create new metadata
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: BTreeMap::new(),
        }
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Pod
// =============================================================================

/// Kubernetes Pod
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: PodSpec,
}

impl Pod {
    /// Create a Pod with empty spec
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            metadata: ObjectMeta::new(name),
            spec: PodSpec::default(),
        }
    }
}

/// Pod spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Containers
    pub containers: Vec<Container>,
    /// Volumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

/// Container spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,
    /// Image
    pub image: String,
    /// Image pull policy (Always, IfNotPresent, Never)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    /// Command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Security context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,
    /// Volume mounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

/// Container security context
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    /// Privileged execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
}

impl SecurityContext {
    /// Privileged context — the routing daemon manipulates the network
    /// namespace, so this is not configurable
    pub fn privileged() -> Self {
        Self {
            privileged: Some(true),
        }
    }
}

/// Volume mount within a container
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// Volume name
    pub name: String,
    /// Mount path
    pub mount_path: String,
}

/// Pod volume
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name
    pub name: String,
    /// ConfigMap source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapVolumeSource>,
}

/// ConfigMap volume source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapVolumeSource {
    /// ConfigMap name
    pub name: String,
}

// =============================================================================
// ConfigMap
// =============================================================================

/// Kubernetes ConfigMap
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// String data
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    /// Create a new ConfigMap
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            metadata: ObjectMeta::new(name),
            data: BTreeMap::new(),
        }
    }

    /// Add a data entry
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Network attachment annotation
// =============================================================================

/// One entry in the multi-interface attachment annotation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NetworkAttachment {
    /// Network-attachment-definition name
    pub name: String,
    /// Interface name inside the pod
    pub interface: String,
}

/// Render the attachment annotation value: a JSON list with one meshnet
/// descriptor per interface, in interface order.
pub fn networks_annotation(interfaces: &[String]) -> serde_json::Result<String> {
    let attachments: Vec<NetworkAttachment> = interfaces
        .iter()
        .map(|interface| NetworkAttachment {
            name: MESHNET_NETWORK.to_string(),
            interface: interface.clone(),
        })
        .collect();
    serde_json::to_string(&attachments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn networks_annotation_one_descriptor_per_interface() {
        let value = networks_annotation(&["eth0".to_string(), "eth1".to_string()]).unwrap();
        let parsed: Vec<NetworkAttachment> = serde_json::from_str(&value).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "meshnet");
        assert_eq!(parsed[0].interface, "eth0");
        assert_eq!(parsed[1].interface, "eth1");
    }

    #[test]
    fn networks_annotation_is_plain_json() {
        let value = networks_annotation(&["eth0".to_string()]).unwrap();
        assert_eq!(value, r#"[{"name":"meshnet","interface":"eth0"}]"#);
    }

    #[test]
    fn config_map_builder() {
        let cm = ConfigMap::new("r0-bird-config").with_data("bird.conf", "router id 10.0.0.1;");
        assert_eq!(cm.kind, "ConfigMap");
        assert_eq!(cm.metadata.name, "r0-bird-config");
        assert_eq!(
            cm.data.get("bird.conf").map(String::as_str),
            Some("router id 10.0.0.1;")
        );
    }

    #[test]
    fn pod_serializes_camel_case() {
        let mut pod = Pod::new("r0");
        pod.spec.containers.push(Container {
            name: "r0".to_string(),
            image: "seed-router-local".to_string(),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: None,
            security_context: Some(SecurityContext::privileged()),
            volume_mounts: vec![],
        });
        let yaml = serde_yaml::to_string(&pod).unwrap();
        assert!(yaml.contains("apiVersion: v1"));
        assert!(yaml.contains("imagePullPolicy: IfNotPresent"));
        assert!(yaml.contains("privileged: true"));
        // Empty volume list is omitted entirely
        assert!(!yaml.contains("volumes"));
    }

    #[test]
    fn metadata_annotation_builder() {
        let meta = ObjectMeta::new("r0").with_annotation(NETWORKS_ANNOTATION, "[]");
        assert_eq!(
            meta.annotations.get(NETWORKS_ANNOTATION).map(String::as_str),
            Some("[]")
        );
    }
}
