pub mod json;
pub mod response;

pub use json::{parse_json, require_json};
pub use response::{ApiResponse, ApiResult};
