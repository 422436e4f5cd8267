//! Command-line interface definitions for the `kiln` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the manual
//! page.

use clap::Parser;

/// Top-level command line interface.
#[derive(Debug, Parser)]
#[command(
    name = "kiln",
    about = "Bake reusable machine images from disposable cloud instances",
    arg_required_else_help = true
)]
pub enum Cli {
    /// Provision an instance, run provisioning, and capture an image.
    #[command(name = "build", about = "Run one end-to-end image build")]
    Build(BuildCommand),
}

/// Arguments for the `build` subcommand.
///
/// Build parameters come from configuration sources (files and the
/// environment); the subcommand itself takes no positional input.
#[derive(Debug, Parser)]
pub struct BuildCommand {}
