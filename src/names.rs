//! Name normalization for orchestration-safe identifiers
//!
//! Emulator node names may contain characters Kubernetes rejects in resource
//! names (underscores being the common case). Every name that ends up in a
//! manifest — Pod name, ConfigMap name, volume name, annotation-embedded
//! peer name — goes through [`sanitize`] so the same raw name always maps to
//! the same safe name.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Sanitize a raw name into a Kubernetes-safe identifier.
///
/// Lowercases ASCII uppercase and replaces every character outside
/// `[a-z0-9-]` with a hyphen. Idempotent: sanitizing an already-sanitized
/// name returns it unchanged.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '-',
        })
        .collect()
}

/// Ensure no two distinct raw names share a sanitized form.
///
/// Sanitization is lossy, so distinct raw names can map to the same safe
/// name; emitting manifests for both would silently merge two nodes. This is
/// checked before any output is written.
pub fn ensure_unique<'a, I>(names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    for name in names {
        let safe = sanitize(name);
        match seen.get(safe.as_str()) {
            Some(prev) if *prev != name => {
                return Err(Error::NameCollision {
                    first: (*prev).to_string(),
                    second: name.to_string(),
                    sanitized: safe,
                });
            }
            Some(_) => {}
            None => {
                seen.insert(safe, name);
            }
        }
    }
    Ok(())
}
