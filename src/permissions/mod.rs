pub mod catalog;
pub mod gate;

pub use catalog::{perms, Permission, PermissionCatalog, PermissionCatalogError};
pub use gate::{MeetingScope, OrganisationManagementLevel, PermissionGate, PermissionRequirement};
