use serde::{Deserialize, Serialize};

use crate::descriptor::{ResourceDescriptor, SqlDatabase, SqlInstance, SqlUser};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid descriptor manifest: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Declarative list of resources to wait for.
///
/// Accepts YAML or JSON:
///
/// ```yaml
/// instances:
///   - name: test-deployments-mysql-uno
/// databases:
///   - name: td-uno-db
///     instanceName: test-deployments-mysql-uno
/// users:
///   - name: td-uno-user
///     instanceName: test-deployments-mysql-uno
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DescriptorManifest {
    #[serde(default)]
    pub instances: Vec<SqlInstance>,
    #[serde(default)]
    pub databases: Vec<SqlDatabase>,
    #[serde(default)]
    pub users: Vec<SqlUser>,
}

impl DescriptorManifest {
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
            && self.databases.is_empty()
            && self.users.is_empty()
    }

    /// Flatten into descriptors: instances, then databases, then users.
    pub fn descriptors(&self) -> Vec<ResourceDescriptor> {
        let instances = self.instances.iter().cloned().map(Into::into);
        let databases = self.databases.iter().cloned().map(Into::into);
        let users = self.users.iter().cloned().map(Into::into);
        instances.chain(databases).chain(users).collect()
    }

    pub fn merge(&mut self, other: DescriptorManifest) {
        self.instances.extend(other.instances);
        self.databases.extend(other.databases);
        self.users.extend(other.users);
    }
}
