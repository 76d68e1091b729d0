use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use thiserror::Error;

const EMBEDDED_PERMISSIONS: &str = include_str!("permission.yml");

/// A named meeting capability, `collection.name`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permission(&'static str);

impl Permission {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub mod perms {
    use super::Permission;

    pub const ASSIGNMENT_CAN_MANAGE: Permission = Permission::new("assignment.can_manage");
    pub const ASSIGNMENT_CAN_NOMINATE_OTHER: Permission = Permission::new("assignment.can_nominate_other");
    pub const ASSIGNMENT_CAN_NOMINATE_SELF: Permission = Permission::new("assignment.can_nominate_self");
    pub const ASSIGNMENT_CAN_SEE: Permission = Permission::new("assignment.can_see");
    pub const MEETING_CAN_MANAGE_SETTINGS: Permission = Permission::new("meeting.can_manage_settings");
    pub const MEETING_CAN_SEE_FRONTPAGE: Permission = Permission::new("meeting.can_see_frontpage");
    pub const POLL_CAN_MANAGE: Permission = Permission::new("poll.can_manage");
    pub const PROJECTOR_CAN_MANAGE: Permission = Permission::new("projector.can_manage");
    pub const PROJECTOR_CAN_SEE: Permission = Permission::new("projector.can_see");
    pub const USER_CAN_MANAGE: Permission = Permission::new("user.can_manage");
    pub const USER_CAN_SEE_EXTRA_DATA: Permission = Permission::new("user.can_see_extra_data");
    pub const USER_CAN_SEE: Permission = Permission::new("user.can_see");
    pub const USER_CAN_CHANGE_OWN_PASSWORD: Permission = Permission::new("user.can_change_own_password");

    pub const ALL: &[Permission] = &[
        ASSIGNMENT_CAN_MANAGE,
        ASSIGNMENT_CAN_NOMINATE_OTHER,
        ASSIGNMENT_CAN_NOMINATE_SELF,
        ASSIGNMENT_CAN_SEE,
        MEETING_CAN_MANAGE_SETTINGS,
        MEETING_CAN_SEE_FRONTPAGE,
        POLL_CAN_MANAGE,
        PROJECTOR_CAN_MANAGE,
        PROJECTOR_CAN_SEE,
        USER_CAN_MANAGE,
        USER_CAN_SEE_EXTRA_DATA,
        USER_CAN_SEE,
        USER_CAN_CHANGE_OWN_PASSWORD,
    ];
}

#[derive(Debug, Error)]
pub enum PermissionCatalogError {
    #[error("Permission catalog is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Permission catalog lists no permissions for collection {0}")]
    EmptyCollection(String),

    #[error("Permission {0} is used but not defined in the catalog")]
    Undefined(String),
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct PermissionLevel(BTreeMap<String, Option<PermissionLevel>>);

/// The permission tree, flattened to a parents map
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    parents: HashMap<String, Vec<String>>,
    // collection -> nested tree lines for display
    tree: BTreeMap<String, Vec<(usize, String)>>,
}

impl PermissionCatalog {
    /// Load the catalog compiled into the binary and check the known constants
    pub fn embedded() -> Result<Self, PermissionCatalogError> {
        let catalog = Self::from_yaml(EMBEDDED_PERMISSIONS)?;
        catalog.verify(perms::ALL)?;
        Ok(catalog)
    }

    pub fn from_yaml(source: &str) -> Result<Self, PermissionCatalogError> {
        let collections: BTreeMap<String, Option<PermissionLevel>> = serde_yaml::from_str(source)?;
        let mut catalog = Self {
            parents: HashMap::new(),
            tree: BTreeMap::new(),
        };

        for (collection, level) in collections {
            let Some(level) = level else {
                return Err(PermissionCatalogError::EmptyCollection(collection));
            };
            let mut lines = Vec::new();
            catalog.walk(&collection, None, &level, 0, &mut lines);
            catalog.tree.insert(collection, lines);
        }

        tracing::debug!("Loaded {} permissions", catalog.parents.len());
        Ok(catalog)
    }

    fn walk(
        &mut self,
        collection: &str,
        parent: Option<&str>,
        level: &PermissionLevel,
        depth: usize,
        lines: &mut Vec<(usize, String)>,
    ) {
        for (name, children) in &level.0 {
            let permission = format!("{}.{}", collection, name);
            let parents = self.parents.entry(permission.clone()).or_default();
            if let Some(parent) = parent {
                if !parents.iter().any(|p| p == parent) {
                    parents.push(parent.to_string());
                }
            }
            lines.push((depth, permission.clone()));
            if let Some(children) = children {
                self.walk(collection, Some(permission.as_str()), children, depth + 1, lines);
            }
        }
    }

    pub fn verify(&self, permissions: &[Permission]) -> Result<(), PermissionCatalogError> {
        match permissions.iter().find(|p| !self.contains(p.as_str())) {
            Some(missing) => Err(PermissionCatalogError::Undefined(missing.to_string())),
            None => Ok(()),
        }
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.parents.contains_key(permission)
    }

    /// True if `required` or any permission implying it is in `granted`
    pub fn is_granted(&self, granted: &HashSet<String>, required: Permission) -> bool {
        let mut pending = vec![required.as_str().to_string()];
        let mut seen = BTreeSet::new();
        while let Some(permission) = pending.pop() {
            if granted.contains(&permission) {
                return true;
            }
            if let Some(parents) = self.parents.get(&permission) {
                for parent in parents {
                    if seen.insert(parent.clone()) {
                        pending.push(parent.clone());
                    }
                }
            }
            seen.insert(permission);
        }
        false
    }

    /// Indented rendering of the tree, one line per permission
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (collection, lines) in &self.tree {
            out.push_str(collection);
            out.push('\n');
            for (depth, permission) in lines {
                out.push_str(&"  ".repeat(depth + 1));
                out.push_str(permission);
                out.push('\n');
            }
        }
        out
    }
}
