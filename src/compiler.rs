//! Mesh compiler — catalog to Kubernetes manifests
//!
//! Turns a validated [`Catalog`](crate::model::Catalog) into Pod and
//! ConfigMap manifests plus the meshnet Topology resource. Compilation is a
//! pure function of the catalog and the config artifacts on disk; the only
//! side effect is reading those artifacts.
//!
//! Non-fatal conditions (a router whose config artifact is absent) are
//! returned as structured [`Warning`]s alongside the manifests, so the
//! caller decides how to surface them.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::error::Result;
use crate::k8s::{
    self, ConfigMap, ConfigMapVolumeSource, Container, Pod, SecurityContext, Volume, VolumeMount,
};
use crate::meshnet::{HalfLink, Topology, TOPOLOGY_NAME};
use crate::model::{Catalog, Node};
use crate::names;

/// Mount path for the injected BIRD configuration
pub const BIRD_CONFIG_MOUNT: &str = "/etc/bird";

/// Name suffix for router config ConfigMaps and their volumes
pub const BIRD_CONFIG_SUFFIX: &str = "-bird-config";

/// Data key the daemon reads inside the mounted directory
pub const BIRD_CONFIG_KEY: &str = "bird.conf";

/// Floor for the reverse half-link uid offset.
///
/// Reverse uids were historically encoded as `id + 100`; the floor keeps
/// small link sets byte-compatible with existing deployments while
/// [`reverse_uid_offset`] grows past it for larger id ranges.
pub const MIN_UID_OFFSET: u64 = 100;

// =============================================================================
// Warnings
// =============================================================================

/// Non-fatal condition surfaced alongside the compiled manifests
#[derive(Clone, Debug, PartialEq)]
pub enum Warning {
    /// Router node whose config artifact was absent at generation time.
    /// Its ConfigMap is omitted; its Pod still references the volume.
    MissingConfigArtifact {
        /// Raw node name
        node: String,
        /// Path that was checked
        path: PathBuf,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingConfigArtifact { node, path } => {
                write!(
                    f,
                    "bird config for router '{}' not found at {}; ConfigMap omitted",
                    node,
                    path.display()
                )
            }
        }
    }
}

/// Outcome of compiling one node's ConfigMap
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigMapOutcome {
    /// Router with a present config artifact
    Emitted(ConfigMap),
    /// Router whose config artifact is absent
    Missing(Warning),
    /// Not a router
    Skipped,
}

// =============================================================================
// Compiler
// =============================================================================

/// Output of a full compile: manifests plus structured warnings
#[derive(Clone, Debug)]
pub struct CompiledMesh {
    /// One Pod per catalog node, in catalog order
    pub pods: Vec<Pod>,
    /// ConfigMaps for routers whose config artifact exists
    pub config_maps: Vec<ConfigMap>,
    /// The meshnet Topology over all links
    pub topology: Topology,
    /// Non-fatal conditions encountered during compilation
    pub warnings: Vec<Warning>,
}

/// Compiles a catalog into the three manifest documents
pub struct MeshCompiler;

impl MeshCompiler {
    /// Compile the whole catalog.
    ///
    /// Validation (name collisions, interface uniqueness, duplicate link
    /// ids) runs first, so a hard error is reported before any manifest is
    /// assembled. Per-node compilation is independent; nodes are emitted in
    /// catalog order.
    pub fn compile(catalog: &Catalog) -> Result<CompiledMesh> {
        catalog.validate()?;

        let mut pods = Vec::with_capacity(catalog.nodes.len());
        let mut config_maps = Vec::new();
        let mut warnings = Vec::new();

        for node in &catalog.nodes {
            pods.push(Self::compile_pod(node)?);
            match Self::compile_config_map(node)? {
                ConfigMapOutcome::Emitted(cm) => config_maps.push(cm),
                ConfigMapOutcome::Missing(warning) => warnings.push(warning),
                ConfigMapOutcome::Skipped => {}
            }
        }

        let topology = Self::compile_topology(catalog);

        Ok(CompiledMesh {
            pods,
            config_maps,
            topology,
            warnings,
        })
    }

    /// Compile a node into its Pod manifest.
    ///
    /// The container always runs privileged: the routing daemon manipulates
    /// interface and routing state in the pod's network namespace. The
    /// config volume is present iff the node is a router, whether or not
    /// the ConfigMap it names was emitted; an absent artifact leaves a
    /// dangling reference rather than a silently reshaped pod.
    pub fn compile_pod(node: &Node) -> Result<Pod> {
        let safe_name = node.safe_name();

        let mut pod = Pod::new(&safe_name);
        pod.metadata = pod.metadata.with_annotation(
            k8s::NETWORKS_ANNOTATION,
            k8s::networks_annotation(&node.interfaces)?,
        );

        let mut volume_mounts = Vec::new();
        if node.is_router {
            let volume_name = format!("{safe_name}{BIRD_CONFIG_SUFFIX}");
            volume_mounts.push(VolumeMount {
                name: volume_name.clone(),
                mount_path: BIRD_CONFIG_MOUNT.to_string(),
            });
            pod.spec.volumes.push(Volume {
                name: volume_name.clone(),
                config_map: Some(ConfigMapVolumeSource { name: volume_name }),
            });
        }

        pod.spec.containers.push(Container {
            name: safe_name,
            image: node.image.clone(),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: Some(launch_command(node)),
            security_context: Some(SecurityContext::privileged()),
            volume_mounts,
        });

        Ok(pod)
    }

    /// Compile a router node's config artifact into a ConfigMap.
    ///
    /// Content is copied verbatim, without parsing. An absent artifact is a
    /// warning, not an error: the rest of the catalog still compiles. Read
    /// failures other than absence are fatal.
    pub fn compile_config_map(node: &Node) -> Result<ConfigMapOutcome> {
        if !node.is_router {
            return Ok(ConfigMapOutcome::Skipped);
        }

        let Some(path) = node.config_path.as_ref().filter(|p| p.exists()) else {
            return Ok(ConfigMapOutcome::Missing(Warning::MissingConfigArtifact {
                node: node.name.clone(),
                path: node.config_path.clone().unwrap_or_default(),
            }));
        };

        let content = fs::read_to_string(path)?;
        let name = format!("{}{}", node.safe_name(), BIRD_CONFIG_SUFFIX);
        Ok(ConfigMapOutcome::Emitted(
            ConfigMap::new(name).with_data(BIRD_CONFIG_KEY, content),
        ))
    }

    /// Compile the link set into the meshnet Topology.
    ///
    /// Each undirected link becomes two directional records: the forward
    /// record carries the declared link id, the reverse record carries
    /// `id + offset` with the offset derived from the whole link set (see
    /// [`reverse_uid_offset`]). Peer names are sanitized so they match the
    /// emitted pod names; endpoint addresses are attached when the catalog
    /// knows them.
    pub fn compile_topology(catalog: &Catalog) -> Topology {
        let offset = reverse_uid_offset(catalog);
        let mut topology = Topology::new(TOPOLOGY_NAME);

        let addresses: BTreeMap<&str, &str> = catalog
            .nodes
            .iter()
            .filter_map(|n| n.address.as_deref().map(|a| (n.name.as_str(), a)))
            .collect();

        for link in &catalog.links {
            let a_ip = addresses.get(link.a.node.as_str()).map(|s| s.to_string());
            let b_ip = addresses.get(link.b.node.as_str()).map(|s| s.to_string());

            topology.spec.links.push(HalfLink {
                uid: link.id,
                peer_pod: names::sanitize(&link.b.node),
                local_intf: link.a.interface.clone(),
                peer_intf: link.b.interface.clone(),
                local_ip: a_ip.clone(),
                peer_ip: b_ip.clone(),
            });
            topology.spec.links.push(HalfLink {
                uid: link.id + offset,
                peer_pod: names::sanitize(&link.a.node),
                local_intf: link.b.interface.clone(),
                peer_intf: link.a.interface.clone(),
                local_ip: b_ip,
                peer_ip: a_ip,
            });
        }

        topology
    }
}

/// Offset separating reverse half-link uids from forward ones.
///
/// Derived from the largest declared link id, so the forward and reverse
/// ranges cannot overlap however many links are declared; never below
/// [`MIN_UID_OFFSET`].
fn reverse_uid_offset(catalog: &Catalog) -> u64 {
    catalog
        .links
        .iter()
        .map(|l| l.id + 1)
        .max()
        .unwrap_or(0)
        .max(MIN_UID_OFFSET)
}

/// Build the container launch command.
///
/// Steps run in a fixed order: optional address assignment on the default
/// interface, runtime directory creation, daemon start against the mounted
/// config, keep-alive.
fn launch_command(node: &Node) -> Vec<String> {
    let mut steps = Vec::new();
    if let (Some(address), Some(interface)) = (node.address.as_deref(), node.default_interface()) {
        steps.push(format!("ip addr add {address}/24 dev {interface}"));
    }
    steps.push("mkdir -p /run/bird".to_string());
    steps.push(format!(
        "bird -c {BIRD_CONFIG_MOUNT}/{BIRD_CONFIG_KEY} -s /run/bird/bird.ctl"
    ));
    steps.push("sleep infinity".to_string());

    vec!["sh".to_string(), "-c".to_string(), steps.join(" && ")]
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::model::{Link, LinkEndpoint};

    fn node(name: &str) -> Node {
        Node {
            name: name.to_string(),
            image: "seed-router-local".to_string(),
            interfaces: vec!["eth0".to_string()],
            is_router: false,
            config_path: None,
            address: None,
        }
    }

    fn link(id: u64, a: (&str, &str), b: (&str, &str)) -> Link {
        Link {
            id,
            a: LinkEndpoint::new(a.0, a.1),
            b: LinkEndpoint::new(b.0, b.1),
        }
    }

    // =========================================================================
    // Pod compilation
    // =========================================================================

    #[test]
    fn pod_name_is_sanitized_node_name() {
        let pod = MeshCompiler::compile_pod(&node("rnode_199_router0")).unwrap();
        assert_eq!(pod.metadata.name, "rnode-199-router0");
        assert_eq!(pod.spec.containers[0].name, "rnode-199-router0");
    }

    #[test]
    fn pod_is_always_privileged() {
        let pod = MeshCompiler::compile_pod(&node("host-a")).unwrap();
        let sec = pod.spec.containers[0]
            .security_context
            .as_ref()
            .expect("should have security context");
        assert_eq!(sec.privileged, Some(true));
    }

    #[test]
    fn pod_annotation_lists_interfaces_in_order() {
        let mut n = node("rnode_199_router0");
        n.interfaces = vec!["eth0".to_string(), "eth1".to_string()];
        let pod = MeshCompiler::compile_pod(&n).unwrap();

        let annotation = pod
            .metadata
            .annotations
            .get(k8s::NETWORKS_ANNOTATION)
            .expect("should have networks annotation");
        let parsed: Vec<k8s::NetworkAttachment> = serde_json::from_str(annotation).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].interface, "eth0");
        assert_eq!(parsed[1].interface, "eth1");
    }

    #[test]
    fn router_pod_mounts_config_volume() {
        let mut n = node("rnode_199_router0");
        n.interfaces = vec!["eth0".to_string(), "eth1".to_string()];
        n.is_router = true;

        let pod = MeshCompiler::compile_pod(&n).unwrap();

        assert_eq!(pod.spec.volumes.len(), 1);
        assert_eq!(pod.spec.volumes[0].name, "rnode-199-router0-bird-config");
        assert_eq!(
            pod.spec.volumes[0]
                .config_map
                .as_ref()
                .expect("should reference a ConfigMap")
                .name,
            "rnode-199-router0-bird-config"
        );

        let mounts = &pod.spec.containers[0].volume_mounts;
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mount_path, "/etc/bird");
    }

    #[test]
    fn host_pod_has_no_volumes() {
        let pod = MeshCompiler::compile_pod(&node("host-a")).unwrap();
        assert!(pod.spec.volumes.is_empty());
        assert!(pod.spec.containers[0].volume_mounts.is_empty());
    }

    #[test]
    fn launch_command_order_with_address() {
        let mut n = node("r0");
        n.address = Some("10.105.0.50".to_string());
        let command = launch_command(&n);

        assert_eq!(command[0], "sh");
        assert_eq!(command[1], "-c");
        let script = &command[2];
        let addr = script.find("ip addr add 10.105.0.50/24 dev eth0").unwrap();
        let mkdir = script.find("mkdir -p /run/bird").unwrap();
        let bird = script
            .find("bird -c /etc/bird/bird.conf -s /run/bird/bird.ctl")
            .unwrap();
        let sleep = script.find("sleep infinity").unwrap();
        assert!(addr < mkdir && mkdir < bird && bird < sleep);
    }

    #[test]
    fn launch_command_skips_address_when_absent() {
        let script = &launch_command(&node("r0"))[2];
        assert!(!script.contains("ip addr add"));
        assert!(script.starts_with("mkdir -p /run/bird"));
        assert!(script.ends_with("sleep infinity"));
    }

    // =========================================================================
    // ConfigMap compilation
    // =========================================================================

    #[test]
    fn host_gets_no_config_map() {
        let outcome = MeshCompiler::compile_config_map(&node("host-a")).unwrap();
        assert_eq!(outcome, ConfigMapOutcome::Skipped);
    }

    #[test]
    fn router_config_round_trips_verbatim() {
        let content = "router id 10.0.0.1;\nprotocol bgp {\n  local as 199;\n}\n";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let mut n = node("rnode_199_router0");
        n.is_router = true;
        n.config_path = Some(file.path().to_path_buf());

        let outcome = MeshCompiler::compile_config_map(&n).unwrap();
        let ConfigMapOutcome::Emitted(cm) = outcome else {
            panic!("expected an emitted ConfigMap");
        };
        assert_eq!(cm.metadata.name, "rnode-199-router0-bird-config");
        assert_eq!(cm.data.get("bird.conf").map(String::as_str), Some(content));
    }

    #[test]
    fn missing_artifact_yields_warning_not_error() {
        let mut n = node("rnode_199_router0");
        n.is_router = true;
        n.config_path = Some(PathBuf::from("/nonexistent/bird.conf"));

        let outcome = MeshCompiler::compile_config_map(&n).unwrap();
        let ConfigMapOutcome::Missing(warning) = outcome else {
            panic!("expected a missing-artifact warning");
        };
        assert!(warning.to_string().contains("rnode_199_router0"));
    }

    #[test]
    fn missing_artifact_keeps_pod_volume_reference() {
        // The pod still names the ConfigMap even though none will be emitted
        let mut n = node("r0");
        n.is_router = true;
        n.config_path = Some(PathBuf::from("/nonexistent/bird.conf"));

        let catalog = Catalog {
            nodes: vec![n],
            links: vec![],
        };
        let mesh = MeshCompiler::compile(&catalog).unwrap();

        assert!(mesh.config_maps.is_empty());
        assert_eq!(mesh.warnings.len(), 1);
        assert_eq!(mesh.pods[0].spec.volumes.len(), 1);
        assert_eq!(mesh.pods[0].spec.volumes[0].name, "r0-bird-config");
    }

    // =========================================================================
    // Topology compilation
    // =========================================================================

    #[test]
    fn link_becomes_forward_and_reverse_records() {
        let catalog = Catalog {
            nodes: vec![node("nodeX"), node("nodeY")],
            links: vec![link(1, ("nodeX", "eth0"), ("nodeY", "eth0"))],
        };
        let topology = MeshCompiler::compile_topology(&catalog);

        assert_eq!(topology.spec.links.len(), 2);

        let forward = &topology.spec.links[0];
        assert_eq!(forward.uid, 1);
        assert_eq!(forward.peer_pod, "nodey");
        assert_eq!(forward.local_intf, "eth0");
        assert_eq!(forward.peer_intf, "eth0");

        let reverse = &topology.spec.links[1];
        assert_eq!(reverse.uid, 101);
        assert_eq!(reverse.peer_pod, "nodex");
        assert_eq!(reverse.local_intf, "eth0");
        assert_eq!(reverse.peer_intf, "eth0");
    }

    #[test]
    fn peer_pod_names_are_sanitized() {
        let catalog = Catalog {
            nodes: vec![node("rnode_199_router0"), node("rnode_2_r100")],
            links: vec![link(1, ("rnode_199_router0", "eth0"), ("rnode_2_r100", "eth0"))],
        };
        let topology = MeshCompiler::compile_topology(&catalog);
        assert_eq!(topology.spec.links[0].peer_pod, "rnode-2-r100");
        assert_eq!(topology.spec.links[1].peer_pod, "rnode-199-router0");
    }

    #[test]
    fn uids_distinct_beyond_offset_floor() {
        // 150 links with ids 1..=150: a fixed +100 offset would collide
        // (forward 101..150 vs reverse 101..); the derived offset must not.
        let nodes: Vec<Node> = (0..151).map(|i| node(&format!("n{i}"))).collect();
        let links: Vec<Link> = (1..=150)
            .map(|i| {
                link(
                    i,
                    (&format!("n{}", i - 1), "eth1"),
                    (&format!("n{i}"), "eth1"),
                )
            })
            .collect();
        let catalog = Catalog { nodes, links };

        let topology = MeshCompiler::compile_topology(&catalog);
        assert_eq!(topology.spec.links.len(), 300);

        let mut uids: Vec<u64> = topology.spec.links.iter().map(|l| l.uid).collect();
        uids.sort_unstable();
        uids.dedup();
        assert_eq!(uids.len(), 300);
    }

    #[test]
    fn topology_carries_endpoint_addresses() {
        let mut a = node("a");
        a.address = Some("10.105.0.50".to_string());
        let mut b = node("b");
        b.address = Some("10.105.0.51".to_string());
        let catalog = Catalog {
            nodes: vec![a, b],
            links: vec![link(1, ("a", "eth0"), ("b", "eth0"))],
        };

        let topology = MeshCompiler::compile_topology(&catalog);
        let forward = &topology.spec.links[0];
        assert_eq!(forward.local_ip.as_deref(), Some("10.105.0.50"));
        assert_eq!(forward.peer_ip.as_deref(), Some("10.105.0.51"));
        let reverse = &topology.spec.links[1];
        assert_eq!(reverse.local_ip.as_deref(), Some("10.105.0.51"));
        assert_eq!(reverse.peer_ip.as_deref(), Some("10.105.0.50"));
    }

    #[test]
    fn topology_omits_addresses_when_unknown() {
        let catalog = Catalog {
            nodes: vec![node("a"), node("b")],
            links: vec![link(1, ("a", "eth0"), ("b", "eth0"))],
        };
        let topology = MeshCompiler::compile_topology(&catalog);
        assert!(topology.spec.links[0].local_ip.is_none());
        assert!(topology.spec.links[0].peer_ip.is_none());
    }

    // =========================================================================
    // Full compile
    // =========================================================================

    #[test]
    fn compile_fails_on_name_collision_before_emitting() {
        let catalog = Catalog {
            nodes: vec![node("rnode_1"), node("rnode-1")],
            links: vec![],
        };
        assert!(matches!(
            MeshCompiler::compile(&catalog),
            Err(crate::Error::NameCollision { .. })
        ));
    }

    #[test]
    fn compile_emits_one_pod_per_node_in_order() {
        let catalog = Catalog {
            nodes: vec![node("b"), node("a"), node("c")],
            links: vec![],
        };
        let mesh = MeshCompiler::compile(&catalog).unwrap();
        let names: Vec<&str> = mesh.pods.iter().map(|p| p.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert!(mesh.warnings.is_empty());
    }
}
