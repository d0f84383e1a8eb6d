use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use cnrm_models::{DescriptorManifest, SqlDatabase, SqlInstance, SqlUser};
use tokio::fs;

use crate::config::WaitConfig;
use crate::groups::GroupRegistry;

/// Wait for Config Connector Cloud SQL resources to become ready.
#[derive(clap::Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct WaitArgs {
    /// Descriptor manifest (YAML or JSON) listing instances, databases and users
    #[arg(short = 'f', long)]
    pub manifest: Option<PathBuf>,

    /// SQLInstance to wait for (repeatable)
    #[arg(long = "instance", value_name = "NAME")]
    pub instances: Vec<String>,

    /// SQLDatabase to wait for, as name@instance (repeatable)
    #[arg(long = "database", value_name = "NAME@INSTANCE")]
    pub databases: Vec<ChildArg>,

    /// SQLUser to wait for, as name@instance (repeatable)
    #[arg(long = "user", value_name = "NAME@INSTANCE")]
    pub users: Vec<ChildArg>,

    /// Namespace holding the resources [env: CNRM_WAIT_K8S_NAMESPACE]
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Overall wait budget in seconds [env: CNRM_WAIT_TIMEOUT_SECS]
    #[arg(short, long)]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors in progress output
    #[arg(long)]
    pub no_color: bool,

    /// Print the dependency groups before waiting
    #[arg(long)]
    pub print_groups: bool,
}

/// A child resource given on the command line as `name@instance`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildArg {
    pub name: String,
    pub instance: String,
}

impl FromStr for ChildArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((name, instance)) if !name.is_empty() && !instance.is_empty() => {
                Ok(Self {
                    name: name.to_string(),
                    instance: instance.to_string(),
                })
            }
            _ => Err(format!("expected NAME@INSTANCE, got '{}'", s)),
        }
    }
}

impl WaitArgs {
    /// Command-line overrides win over environment configuration.
    pub fn apply_overrides(&self, mut cfg: WaitConfig) -> WaitConfig {
        if let Some(ns) = &self.namespace {
            cfg.k8s_namespace = ns.clone();
        }
        if let Some(t) = self.timeout_secs {
            cfg.timeout_secs = t;
        }
        if self.no_color {
            cfg.color = Some(false);
        }
        cfg
    }

    fn inline_manifest(&self) -> DescriptorManifest {
        DescriptorManifest {
            instances: self.instances.iter().map(SqlInstance::new).collect(),
            databases: self
                .databases
                .iter()
                .map(|c| SqlDatabase::new(&c.name, &c.instance))
                .collect(),
            users: self
                .users
                .iter()
                .map(|c| SqlUser::new(&c.name, &c.instance))
                .collect(),
        }
    }

    /// Merge the manifest file (if any) with inline flags.
    pub async fn build_registry(&self) -> Result<GroupRegistry> {
        let mut manifest = match &self.manifest {
            Some(path) => load_manifest(path).await?,
            None => DescriptorManifest::default(),
        };
        manifest.merge(self.inline_manifest());
        if manifest.is_empty() {
            anyhow::bail!(
                "nothing to wait for: pass --manifest or --instance/--database/--user"
            );
        }
        GroupRegistry::from_manifest(&manifest)
            .with_context(|| "Invalid resource descriptors")
    }
}

pub async fn load_manifest(path: &Path) -> Result<DescriptorManifest> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    DescriptorManifest::parse(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))
}
