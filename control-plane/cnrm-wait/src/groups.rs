use std::collections::BTreeMap;
use std::fmt;

use cnrm_models::{
    DescriptorManifest, ResourceDescriptor, ResourceKind, ResourceRef,
    SqlDatabase, SqlInstance, SqlUser,
};

use crate::error::RegistryError;

/// One instance together with the databases and users that depend on it.
///
/// Children are keyed by name, so adding the same name twice is a no-op.
/// The instance may be unset when only children referenced this group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    name: String,
    instance: Option<SqlInstance>,
    databases: BTreeMap<String, SqlDatabase>,
    users: BTreeMap<String, SqlUser>,
}

impl DependencyGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: None,
            databases: BTreeMap::new(),
            users: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> Option<&SqlInstance> {
        self.instance.as_ref()
    }

    pub fn set_instance(&mut self, instance: SqlInstance) {
        if self.instance.is_none() {
            self.instance = Some(instance);
        }
    }

    pub fn add_database(&mut self, database: SqlDatabase) {
        self.databases.entry(database.name.clone()).or_insert(database);
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.databases.contains_key(name)
    }

    pub fn add_user(&mut self, user: SqlUser) {
        self.users.entry(user.name.clone()).or_insert(user);
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.users.contains_key(name)
    }

    pub fn databases(&self) -> impl Iterator<Item = &SqlDatabase> {
        self.databases.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &SqlUser> {
        self.users.values()
    }

    /// The instance this group watches first. Groups created only by
    /// children still wait on the instance they name.
    pub fn instance_ref(&self) -> ResourceRef {
        ResourceRef::instance(self.name.clone())
    }

    /// Databases, then users.
    pub fn children(&self) -> Vec<ResourceRef> {
        let dbs = self
            .databases
            .keys()
            .map(|n| ResourceRef::new(ResourceKind::Database, n.clone()));
        let users = self
            .users
            .keys()
            .map(|n| ResourceRef::new(ResourceKind::User, n.clone()));
        dbs.chain(users).collect()
    }

    pub fn resource_count(&self) -> usize {
        1 + self.databases.len() + self.users.len()
    }
}

impl fmt::Display for DependencyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(i) => writeln!(f, "Instance: {}", i.name)?,
            None => writeln!(f, "Instance: {} (undeclared)", self.name)?,
        }
        writeln!(f, "  Databases:")?;
        for db in self.databases.keys() {
            writeln!(f, "  - {}", db)?;
        }
        writeln!(f, "  Users:")?;
        for user in self.users.keys() {
            writeln!(f, "  - {}", user)?;
        }
        Ok(())
    }
}

/// All dependency groups of one wait, keyed by instance name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupRegistry {
    groups: BTreeMap<String, DependencyGroup>,
    /// Owning group of every database and user; names are unique per kind.
    owners: BTreeMap<ResourceRef, String>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from descriptors in any order; children declared before their
    /// instance create the group early.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = ResourceDescriptor>,
    {
        let mut registry = Self::new();
        for d in descriptors {
            registry.add(d)?;
        }
        Ok(registry)
    }

    pub fn from_manifest(
        manifest: &DescriptorManifest,
    ) -> Result<Self, RegistryError> {
        Self::from_descriptors(manifest.descriptors())
    }

    /// Explicitly create an empty group. Unlike the `add_*` operations this
    /// rejects an existing name.
    pub fn add_group(&mut self, name: &str) -> Result<&mut DependencyGroup, RegistryError> {
        if self.groups.contains_key(name) {
            return Err(RegistryError::DuplicateGroup(name.to_string()));
        }
        Ok(self
            .groups
            .entry(name.to_string())
            .or_insert_with(|| DependencyGroup::new(name)))
    }

    pub fn get_group(&self, name: &str) -> Option<&DependencyGroup> {
        self.groups.get(name)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    fn group_mut(&mut self, name: &str) -> &mut DependencyGroup {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| DependencyGroup::new(name))
    }

    pub fn add_instance(&mut self, instance: SqlInstance) {
        let name = instance.name.clone();
        self.group_mut(&name).set_instance(instance);
    }

    /// Record `resource` as owned by `group`. Re-adding it to the same group
    /// is a no-op; claiming it for a second group is an error.
    fn claim(&mut self, resource: ResourceRef, group: &str) -> Result<(), RegistryError> {
        match self.owners.get(&resource) {
            Some(owner) if owner != group => Err(RegistryError::DuplicateResource {
                kind: resource.kind,
                name: resource.name,
                groups: (owner.clone(), group.to_string()),
            }),
            Some(_) => Ok(()),
            None => {
                self.owners.insert(resource, group.to_string());
                Ok(())
            }
        }
    }

    pub fn add_database(&mut self, database: SqlDatabase) -> Result<(), RegistryError> {
        let group = database.instance_name.clone();
        self.claim(
            ResourceRef::new(ResourceKind::Database, database.name.clone()),
            &group,
        )?;
        self.group_mut(&group).add_database(database);
        Ok(())
    }

    pub fn add_user(&mut self, user: SqlUser) -> Result<(), RegistryError> {
        let group = user.instance_name.clone();
        self.claim(ResourceRef::new(ResourceKind::User, user.name.clone()), &group)?;
        self.group_mut(&group).add_user(user);
        Ok(())
    }

    pub fn add(&mut self, descriptor: ResourceDescriptor) -> Result<(), RegistryError> {
        descriptor.validate()?;
        let group = descriptor.group_name().to_string();
        let ResourceRef { kind, name } = descriptor.resource_ref();
        match kind {
            ResourceKind::Instance => {
                self.add_instance(SqlInstance::new(name));
                Ok(())
            }
            ResourceKind::Database => self.add_database(SqlDatabase::new(name, group)),
            ResourceKind::User => self.add_user(SqlUser::new(name, group)),
        }
    }

    pub fn into_groups(self) -> impl Iterator<Item = DependencyGroup> {
        self.groups.into_values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Instances (declared or implied) plus all children.
    pub fn resource_count(&self) -> usize {
        self.groups.values().map(DependencyGroup::resource_count).sum()
    }
}

impl fmt::Display for GroupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in self.groups.values() {
            write!(f, "{}", group)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    use super::*;

    const UNO: &str = "test-deployments-mysql-uno";
    const DOS: &str = "test-deployments-mysql-dos";
    const TRES: &str = "test-deployments-mysql-tres";

    fn fixture() -> Vec<ResourceDescriptor> {
        vec![
            ResourceDescriptor::instance(UNO),
            ResourceDescriptor::instance(DOS),
            ResourceDescriptor::instance(TRES),
            ResourceDescriptor::database("td-uno-db", UNO),
            ResourceDescriptor::database("td-dos-db", DOS),
            ResourceDescriptor::database("td-tres-db", TRES),
            ResourceDescriptor::user("td-uno-user", UNO),
            ResourceDescriptor::user("td-dos-user", DOS),
            ResourceDescriptor::user("td-tres-user", TRES),
        ]
    }

    #[test]
    fn duplicate_group_names_collapse() {
        let mut registry = GroupRegistry::new();
        for name in [UNO, DOS, TRES, UNO, DOS, TRES] {
            registry.add_instance(SqlInstance::new(name));
        }
        assert_eq!(registry.len(), 3);
        assert!(registry.has_group(DOS));
    }

    #[test]
    fn add_group_rejects_existing_name() {
        let mut registry = GroupRegistry::new();
        registry.add_group(UNO).unwrap();
        assert!(matches!(
            registry.add_group(UNO),
            Err(RegistryError::DuplicateGroup(n)) if n == UNO
        ));
    }

    #[test]
    fn repeated_children_are_deduplicated() {
        let mut registry = GroupRegistry::new();
        registry.add_instance(SqlInstance::new(UNO));
        for _ in 0..3 {
            registry
                .add_database(SqlDatabase::new("td-uno-db", UNO))
                .unwrap();
            registry.add_user(SqlUser::new("td-uno-user", UNO)).unwrap();
        }
        let group = registry.get_group(UNO).unwrap();
        assert_eq!(group.databases().count(), 1);
        assert_eq!(group.users().count(), 1);
        assert!(group.has_database("td-uno-db"));
        assert!(group.has_user("td-uno-user"));
        assert_eq!(registry.resource_count(), 3);
    }

    #[test]
    fn child_name_cannot_belong_to_two_instances() {
        let mut registry = GroupRegistry::from_descriptors(vec![
            ResourceDescriptor::instance(UNO),
            ResourceDescriptor::instance(DOS),
            ResourceDescriptor::database("shared", UNO),
        ])
        .unwrap();

        let err = registry
            .add(ResourceDescriptor::database("shared", DOS))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateResource { kind: ResourceKind::Database, ref name, ref groups }
                if name == "shared" && groups == &(UNO.to_string(), DOS.to_string())
        ));
        assert!(!registry.get_group(DOS).unwrap().has_database("shared"));
        assert_eq!(registry.resource_count(), 3);

        // Same name under another kind is a different resource.
        registry.add(ResourceDescriptor::user("shared", DOS)).unwrap();
        assert!(matches!(
            registry.add_user(SqlUser::new("shared", UNO)),
            Err(RegistryError::DuplicateResource { kind: ResourceKind::User, .. })
        ));
    }

    #[test]
    fn children_before_instance_share_one_group() {
        let registry = GroupRegistry::from_descriptors(vec![
            ResourceDescriptor::user("td-uno-user", UNO),
            ResourceDescriptor::database("td-uno-db", UNO),
            ResourceDescriptor::instance(UNO),
        ])
        .unwrap();
        assert_eq!(registry.len(), 1);
        let group = registry.get_group(UNO).unwrap();
        assert_eq!(group.instance(), Some(&SqlInstance::new(UNO)));
        assert_eq!(
            group.children(),
            vec![
                ResourceRef::new(ResourceKind::Database, "td-uno-db"),
                ResourceRef::new(ResourceKind::User, "td-uno-user"),
            ]
        );
    }

    #[test]
    fn undeclared_parent_creates_shell_group() {
        let registry = GroupRegistry::from_descriptors(vec![
            ResourceDescriptor::database("orphan-db", "missing"),
        ])
        .unwrap();
        let group = registry.get_group("missing").unwrap();
        assert!(group.instance().is_none());
        assert_eq!(group.instance_ref(), ResourceRef::instance("missing"));
        assert_eq!(registry.resource_count(), 2);
    }

    #[test]
    fn registry_is_independent_of_insertion_order() {
        let expected = GroupRegistry::from_descriptors(fixture()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut shuffled = fixture();
            shuffled.shuffle(&mut rng);
            let registry = GroupRegistry::from_descriptors(shuffled).unwrap();
            assert_eq!(registry, expected);
        }
        assert_eq!(expected.resource_count(), 9);
    }

    #[test]
    fn invalid_descriptor_is_rejected() {
        let err = GroupRegistry::from_descriptors(vec![ResourceDescriptor {
            kind: ResourceKind::Database,
            name: "db".into(),
            parent_instance: None,
        }])
        .unwrap_err();
        assert!(matches!(err, RegistryError::Descriptor(_)));
    }

    #[test]
    fn display_lists_groups_as_tree() {
        let registry = GroupRegistry::from_descriptors(vec![
            ResourceDescriptor::instance(UNO),
            ResourceDescriptor::database("td-uno-db", UNO),
            ResourceDescriptor::user("td-uno-user", UNO),
        ])
        .unwrap();
        assert_eq!(
            registry.to_string(),
            format!(
                "Instance: {UNO}\n  Databases:\n  - td-uno-db\n  Users:\n  - td-uno-user\n"
            )
        );
    }
}
