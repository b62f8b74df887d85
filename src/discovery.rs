//! Node discovery from an emulator output tree
//!
//! The emulator leaves one directory per node, each with a container build
//! context. Any immediate child directory holding a `Dockerfile` is taken as
//! a node; an `ip.txt` beside it overrides the derived management address
//! and a `bird.conf` marks the node as a router.
//!
//! Links are not declared anywhere in the tree: as each node is discovered
//! it is linked to every previously discovered node, producing a full mesh
//! over the nodes seen so far. Directories are visited in name order so link
//! ids and interface assignment are reproducible across runs.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::model::{Catalog, Link, LinkEndpoint, Node};
use crate::names;

/// Build marker that qualifies a child directory as a node
pub const BUILD_MARKER: &str = "Dockerfile";

/// Per-node address override file
pub const ADDRESS_FILE: &str = "ip.txt";

/// Router config artifact, at a fixed relative path inside the node dir
pub const CONFIG_FILE: &str = "bird.conf";

/// Management interface present on every node; mesh links start at eth1
pub const MGMT_INTERFACE: &str = "eth0";

const ADDRESS_PREFIX: &str = "10.105.0.";
const ADDRESS_POOL: u64 = 200;
const ADDRESS_BASE: u64 = 50;

/// Derive a stable management address from a sanitized node name.
///
/// Last octet = 50 + (first 8 bytes of SHA-256 over the name, big-endian,
/// mod 200), giving 10.105.0.50–249. The algorithm is part of the output
/// contract: the same name must map to the same address on every run and
/// every host.
pub fn derived_address(safe_name: &str) -> String {
    let digest = Sha256::digest(safe_name.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let octet = ADDRESS_BASE + u64::from_be_bytes(prefix) % ADDRESS_POOL;
    format!("{ADDRESS_PREFIX}{octet}")
}

/// Scan an emulator output tree into a catalog.
///
/// Each discovered node starts with only the management interface; every
/// induced link then consumes a fresh `eth{k}` on both endpoints, so no
/// interface is ever wired twice. Link ids are allocated by a counter
/// starting at 1.
pub fn scan(root: &Path) -> Result<Catalog> {
    let mut catalog = Catalog::default();
    let mut next_link_id: u64 = 1;

    let mut node_dirs: Vec<PathBuf> = fs::read_dir(root)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && path.join(BUILD_MARKER).exists())
        .collect();
    node_dirs.sort();

    for dir in node_dirs {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let mut node = read_node(&dir, name)?;
        debug!(node = name, router = node.is_router, "discovered node");

        // Full mesh: wire the new node to every node seen so far
        for peer_index in 0..catalog.nodes.len() {
            let local_intf = format!("eth{}", node.interfaces.len());
            node.interfaces.push(local_intf.clone());

            let peer = &mut catalog.nodes[peer_index];
            let peer_intf = format!("eth{}", peer.interfaces.len());
            peer.interfaces.push(peer_intf.clone());

            catalog.links.push(Link {
                id: next_link_id,
                a: LinkEndpoint::new(&node.name, local_intf),
                b: LinkEndpoint::new(&peer.name, peer_intf),
            });
            next_link_id += 1;
        }

        catalog.nodes.push(node);
    }

    Ok(catalog)
}

/// Read one node definition from its directory
fn read_node(dir: &Path, name: &str) -> Result<Node> {
    let safe_name = names::sanitize(name);

    let address_path = dir.join(ADDRESS_FILE);
    let address = if address_path.exists() {
        fs::read_to_string(&address_path)?.trim().to_string()
    } else {
        derived_address(&safe_name)
    };

    let config_path = dir.join(CONFIG_FILE);
    let is_router = config_path.exists();

    Ok(Node {
        name: name.to_string(),
        image: safe_name,
        interfaces: vec![MGMT_INTERFACE.to_string()],
        is_router,
        config_path: is_router.then_some(config_path),
        address: Some(address),
    })
}
