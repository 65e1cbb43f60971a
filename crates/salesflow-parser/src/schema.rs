//! The fixed column layout of the sales source and the permissive per-type parsers used to
//! fill a [`Record`](crate::Record) from raw text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    String,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl FieldSpec {
    const fn nullable(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: true,
        }
    }
}

pub const SALES_SCHEMA: [FieldSpec; 6] = [
    FieldSpec::nullable("customer_id", FieldType::Integer),
    FieldSpec::nullable("customer_name", FieldType::String),
    FieldSpec::nullable("product_id", FieldType::String),
    FieldSpec::nullable("product_name", FieldType::String),
    FieldSpec::nullable("purchase_amount", FieldType::Double),
    FieldSpec::nullable("region", FieldType::String),
];

pub const SALES_COLUMNS: [&str; 6] = [
    "customer_id",
    "customer_name",
    "product_id",
    "product_name",
    "purchase_amount",
    "region",
];

/// Empty or malformed input yields `None`, as does anything outside the 32-bit range.
pub fn parse_optional_i32(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i32>().ok()
}

pub fn parse_optional_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Strings are kept verbatim; only the empty string is treated as missing.
pub fn parse_optional_string(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_and_column_names_agree() {
        let names: Vec<&str> = SALES_SCHEMA.iter().map(|field| field.name).collect();
        assert_eq!(names, SALES_COLUMNS);
        assert!(SALES_SCHEMA.iter().all(|field| field.nullable));
    }

    #[test]
    fn integers_parse_permissively() {
        assert_eq!(parse_optional_i32("42"), Some(42));
        assert_eq!(parse_optional_i32(" 7 "), Some(7));
        assert_eq!(parse_optional_i32(""), None);
        assert_eq!(parse_optional_i32("12.5"), None);
        assert_eq!(parse_optional_i32("abc"), None);
        assert_eq!(parse_optional_i32("3000000000"), None);
    }

    #[test]
    fn doubles_parse_permissively() {
        assert_eq!(parse_optional_f64("600.25"), Some(600.25));
        assert_eq!(parse_optional_f64(" 1e3 "), Some(1000.0));
        assert_eq!(parse_optional_f64("-5"), Some(-5.0));
        assert_eq!(parse_optional_f64(""), None);
        assert_eq!(parse_optional_f64("n/a"), None);
        assert!(parse_optional_f64("NaN").is_some_and(f64::is_nan));
    }

    #[test]
    fn strings_keep_whitespace() {
        assert_eq!(parse_optional_string("  Ada "), Some("  Ada ".to_string()));
        assert_eq!(parse_optional_string(""), None);
    }
}
