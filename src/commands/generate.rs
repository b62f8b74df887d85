//! Generate command
//!
//! Scans the input tree, compiles the catalog, and writes the three
//! manifest documents into a `k8s/` directory under the input.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::compiler::{CompiledMesh, MeshCompiler};
use crate::discovery;
use crate::error::Result;

/// Directory created under the input tree for the emitted manifests
pub const OUTPUT_SUBDIR: &str = "k8s";

/// Pod manifest stream
pub const PODS_FILE: &str = "pods.yaml";

/// ConfigMap manifest stream
pub const CONFIGMAPS_FILE: &str = "configmaps.yaml";

/// Topology document
pub const TOPOLOGY_FILE: &str = "topology.yaml";

/// Run discovery, compile, and write manifests.
///
/// Hard errors (name collisions, IO failures) abort before anything is
/// written; missing-config warnings are logged and generation continues.
pub fn run(input: &Path) -> Result<()> {
    let catalog = discovery::scan(input)?;
    let mesh = MeshCompiler::compile(&catalog)?;

    for warning in &mesh.warnings {
        warn!("{warning}");
    }

    let out_dir = input.join(OUTPUT_SUBDIR);
    write_manifests(&out_dir, &mesh)?;

    info!(
        pods = mesh.pods.len(),
        config_maps = mesh.config_maps.len(),
        links = mesh.topology.spec.links.len(),
        "manifests written to {}",
        out_dir.display()
    );
    Ok(())
}

/// Write the three manifest documents into `out_dir`, creating it if absent
pub fn write_manifests(out_dir: &Path, mesh: &CompiledMesh) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    fs::write(out_dir.join(PODS_FILE), to_multi_doc(&mesh.pods)?)?;
    fs::write(out_dir.join(CONFIGMAPS_FILE), to_multi_doc(&mesh.config_maps)?)?;
    fs::write(
        out_dir.join(TOPOLOGY_FILE),
        serde_yaml::to_string(&mesh.topology)?,
    )?;
    Ok(())
}

/// Render a multi-document YAML stream, one document per item
fn to_multi_doc<T: Serialize>(items: &[T]) -> Result<String> {
    let mut documents = Vec::with_capacity(items.len());
    for item in items {
        documents.push(serde_yaml::to_string(item)?);
    }
    Ok(documents.join("---\n"))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::k8s::ConfigMap;

    #[test]
    fn multi_doc_joins_with_separators() {
        let items = vec![
            ConfigMap::new("a").with_data("k", "1"),
            ConfigMap::new("b").with_data("k", "2"),
        ];
        let stream = to_multi_doc(&items).unwrap();

        let documents: Vec<serde_yaml::Value> = serde_yaml::Deserializer::from_str(&stream)
            .map(|doc| serde_yaml::Value::deserialize(doc).unwrap())
            .collect();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0]["metadata"]["name"], "a");
        assert_eq!(documents[1]["metadata"]["name"], "b");
    }

    #[test]
    fn multi_doc_empty_stream() {
        let items: Vec<ConfigMap> = vec![];
        assert_eq!(to_multi_doc(&items).unwrap(), "");
    }
}
