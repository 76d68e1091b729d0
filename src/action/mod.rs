pub mod base;
pub mod context;
pub mod countdown;
pub mod error;
pub mod executor;
pub mod registry;
pub mod relations;
pub mod schema;

pub use base::{fqid_field, id_field, Action, ActionKind, Instance};
pub use context::ActionContext;
pub use countdown::{CountdownCommand, CountdownControl, ProjectorCountdownControl};
pub use error::{ActionError, ActionResult};
pub use executor::{ActionExecutor, ActionRequest, ActionResults, RetryPolicy};
pub use registry::{ActionRegistry, RegisteredAction, RegistryError};
pub use schema::{DefaultSchema, SchemaError, SchemaValidator};
