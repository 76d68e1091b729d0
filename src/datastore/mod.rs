pub mod error;
pub mod filter;
pub mod http;
pub mod interface;
pub mod memory;
pub mod view;

pub use error::{DatastoreError, DatastoreResult};
pub use filter::{Filter, FilterOp};
pub use http::HttpDatastore;
pub use interface::{Datastore, FilterResult, Position, Versioned, WriteOperation, WriteRequest};
pub use memory::MemoryDatastore;
pub use view::DatastoreView;
