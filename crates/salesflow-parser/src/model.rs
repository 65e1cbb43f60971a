use csv::ByteRecord;
use serde::{Deserialize, Serialize};

use crate::schema::{parse_optional_f64, parse_optional_i32, parse_optional_string};

/// One typed sales row. Every field is nullable; a value that does not parse as its declared
/// type is stored as `None` rather than rejecting the row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub customer_id: Option<i32>,
    pub customer_name: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub purchase_amount: Option<f64>,
    pub region: Option<String>,
}

impl Record {
    /// Builds a record from a row whose field count already matches the schema. A field that
    /// is not valid UTF-8 is treated like any other unparseable value.
    pub(crate) fn from_row(row: &ByteRecord) -> Self {
        let field = |idx: usize| row.get(idx).and_then(|raw| std::str::from_utf8(raw).ok());
        Self {
            customer_id: field(0).and_then(parse_optional_i32),
            customer_name: field(1).and_then(parse_optional_string),
            product_id: field(2).and_then(parse_optional_string),
            product_name: field(3).and_then(parse_optional_string),
            purchase_amount: field(4).and_then(parse_optional_f64),
            region: field(5).and_then(parse_optional_string),
        }
    }
}
