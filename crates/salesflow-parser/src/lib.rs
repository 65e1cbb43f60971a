pub mod errors;
pub mod model;
mod reader;
pub mod schema;

pub use errors::ParserError;
pub use model::Record;
pub use reader::{read_records, RecordReader};
pub use schema::{FieldSpec, FieldType, SALES_COLUMNS, SALES_SCHEMA};
