mod bulk_import;
mod data_type;
mod request;
mod response;
mod value;

pub use bulk_import::*;
pub use data_type::*;
pub(crate) use request::*;
pub(crate) use response::{ErrorBody, LoadResponse, QueryResponse, SchemaField};
pub use response::{Progress, QueryStats};
pub use value::*;
