use serde::{Deserialize, Serialize};

/// Config Connector API group serving the Cloud SQL kinds.
pub const SQL_API_GROUP: &str = "sql.cnrm.cloud.google.com";
pub const SQL_API_VERSION: &str = "v1beta1";

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum ResourceKind {
    Instance,
    Database,
    User,
}

impl ResourceKind {
    /// Kind name as registered in the control plane.
    pub fn k8s_kind(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "SQLInstance",
            ResourceKind::Database => "SQLDatabase",
            ResourceKind::User => "SQLUser",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "sqlinstances",
            ResourceKind::Database => "sqldatabases",
            ResourceKind::User => "sqlusers",
        }
    }

    pub fn api_version(&self) -> String {
        format!("{}/{}", SQL_API_GROUP, SQL_API_VERSION)
    }

    pub fn requires_parent(&self) -> bool {
        !matches!(self, ResourceKind::Instance)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Instance => write!(f, "SqlInstance"),
            ResourceKind::Database => write!(f, "SqlDatabase"),
            ResourceKind::User => write!(f, "SqlUser"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SqlInstance {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SqlDatabase {
    pub name: String,
    pub instance_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SqlUser {
    pub name: String,
    pub instance_name: String,
}

impl SqlInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SqlDatabase {
    pub fn new(name: impl Into<String>, instance_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance_name: instance_name.into(),
        }
    }
}

impl SqlUser {
    pub fn new(name: impl Into<String>, instance_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance_name: instance_name.into(),
        }
    }
}

/// Identifies a single watched resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn instance(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Instance, name)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("{kind} descriptor has an empty name")]
    EmptyName { kind: ResourceKind },

    #[error("{kind} {name} must name its parent instance")]
    MissingParent { kind: ResourceKind, name: String },

    #[error("SqlInstance {name} cannot have a parent instance ({parent})")]
    UnexpectedParent { name: String, parent: String },
}

/// Flat description of one resource to wait for.
///
/// `parent_instance` is `None` for instances and names the owning instance
/// for databases and users.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub name: String,
    pub parent_instance: Option<String>,
}

impl ResourceDescriptor {
    pub fn instance(name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Instance,
            name: name.into(),
            parent_instance: None,
        }
    }

    pub fn database(
        name: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            kind: ResourceKind::Database,
            name: name.into(),
            parent_instance: Some(instance.into()),
        }
    }

    pub fn user(name: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::User,
            name: name.into(),
            parent_instance: Some(instance.into()),
        }
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.is_empty() {
            return Err(DescriptorError::EmptyName { kind: self.kind });
        }
        let parent = self.parent_instance.as_deref().filter(|p| !p.is_empty());
        match (self.kind.requires_parent(), parent) {
            (true, None) => Err(DescriptorError::MissingParent {
                kind: self.kind,
                name: self.name.clone(),
            }),
            (false, Some(p)) => Err(DescriptorError::UnexpectedParent {
                name: self.name.clone(),
                parent: p.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Name of the group this descriptor belongs to.
    pub fn group_name(&self) -> &str {
        match self.kind {
            ResourceKind::Instance => &self.name,
            _ => self.parent_instance.as_deref().unwrap_or_default(),
        }
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.kind, self.name.clone())
    }
}

impl From<SqlInstance> for ResourceDescriptor {
    fn from(i: SqlInstance) -> Self {
        Self::instance(i.name)
    }
}

impl From<SqlDatabase> for ResourceDescriptor {
    fn from(d: SqlDatabase) -> Self {
        Self::database(d.name, d.instance_name)
    }
}

impl From<SqlUser> for ResourceDescriptor {
    fn from(u: SqlUser) -> Self {
        Self::user(u.name, u.instance_name)
    }
}
