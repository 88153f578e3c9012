//! CLI command definitions

use crate::core::config::{HelmSettings, ImageRef};
use clap::{Args, Subcommand};

/// `create` subcommands
#[derive(Debug, Subcommand, Clone)]
pub enum CreateCommand {
    /// Provision every configured cluster and mesh them together
    Clusters,
}

/// `destroy` subcommands
#[derive(Debug, Subcommand, Clone)]
pub enum DestroyCommand {
    /// Destroy every configured cluster
    Clusters,
}

/// `update` subcommands
#[derive(Debug, Subcommand, Clone)]
pub enum UpdateCommand {
    /// Update the mesh components on running clusters
    Mesh(MeshArgs),
}

#[derive(Debug, Args, Clone)]
pub struct MeshArgs {
    /// Engine image (repository:tag)
    #[arg(long, value_parser = parse_image)]
    pub engine: Option<ImageRef>,

    /// Route agent image (repository:tag)
    #[arg(long, value_parser = parse_image)]
    pub routeagent: Option<ImageRef>,

    /// Remove and reinstall the mesh instead of rolling images
    #[arg(long)]
    pub reinstall: bool,
}

impl MeshArgs {
    /// Apply the image overrides on top of the configured ones
    pub fn apply(&self, helm: &mut HelmSettings) {
        if let Some(image) = &self.engine {
            helm.engine.image = image.clone();
        }
        if let Some(image) = &self.routeagent {
            helm.route_agent.image = image.clone();
        }
    }
}

/// Validate the configuration file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse a `repository:tag` image reference
pub fn parse_image(s: &str) -> Result<ImageRef, String> {
    s.parse::<ImageRef>().map_err(|e| e.to_string())
}
