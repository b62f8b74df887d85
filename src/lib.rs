//! meshgen library
//!
//! Compiles an emulated network topology — nodes with interfaces and the
//! links between them — into Kubernetes Pod and ConfigMap manifests plus a
//! meshnet `Topology` custom resource.
//!
//! The catalog can be declared in-process ([`model::Catalog`]) or derived by
//! scanning an emulator output tree ([`discovery::scan`]); either way,
//! [`compiler::MeshCompiler::compile`] is a pure function of its input and
//! the config artifacts on disk.

pub mod commands;
pub mod compiler;
pub mod discovery;
pub mod error;
pub mod k8s;
pub mod meshnet;
pub mod model;
pub mod names;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::Parser;

/// meshgen - Kubernetes manifests for emulated network topologies
#[derive(Parser, Debug)]
#[command(name = "meshgen")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emulator output directory containing one subdirectory per node
    pub input: PathBuf,
}

impl Cli {
    /// Run the CLI command
    pub fn run(self) -> Result<()> {
        commands::generate::run(&self.input)
    }
}
