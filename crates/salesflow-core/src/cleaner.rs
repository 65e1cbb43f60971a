use crate::types::{CleanedRecord, Record};

/// Drops records without a positive purchase amount, then trims the customer name and
/// uppercases the region. Null names and regions pass through untouched.
pub fn clean(record: Record) -> Option<CleanedRecord> {
    let purchase_amount = record.purchase_amount.filter(|amount| *amount > 0.0)?;

    Some(CleanedRecord {
        customer_id: record.customer_id,
        customer_name: record.customer_name.map(|name| name.trim().to_string()),
        product_id: record.product_id,
        product_name: record.product_name,
        purchase_amount,
        region: record.region.map(|region| region.to_uppercase()),
    })
}

pub fn clean_all<I>(records: I) -> impl Iterator<Item = CleanedRecord>
where
    I: IntoIterator<Item = Record>,
{
    records.into_iter().filter_map(clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(amount: Option<f64>, name: Option<&str>, region: Option<&str>) -> Record {
        Record {
            customer_id: Some(7),
            customer_name: name.map(str::to_string),
            product_id: Some("P1".into()),
            product_name: Some("Widget".into()),
            purchase_amount: amount,
            region: region.map(str::to_string),
        }
    }

    #[test]
    fn drops_missing_zero_and_negative_amounts() {
        assert!(clean(record(None, Some("a"), Some("us"))).is_none());
        assert!(clean(record(Some(0.0), Some("a"), Some("us"))).is_none());
        assert!(clean(record(Some(-3.5), Some("a"), Some("us"))).is_none());
        assert!(clean(record(Some(f64::NAN), Some("a"), Some("us"))).is_none());
        assert!(clean(record(Some(0.01), Some("a"), Some("us"))).is_some());
    }

    #[test]
    fn normalizes_name_and_region() {
        let cleaned = clean(record(Some(12.0), Some("  Ada Lovelace\t"), Some("eMeA")))
            .expect("record should survive cleaning");
        assert_eq!(cleaned.customer_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(cleaned.region.as_deref(), Some("EMEA"));
        assert_eq!(cleaned.purchase_amount, 12.0);
        assert_eq!(cleaned.customer_id, Some(7));
        assert_eq!(cleaned.product_id.as_deref(), Some("P1"));
    }

    #[test]
    fn null_name_and_region_stay_null() {
        let cleaned = clean(record(Some(5.0), None, None)).expect("record should survive");
        assert_eq!(cleaned.customer_name, None);
        assert_eq!(cleaned.region, None);
    }

    #[test]
    fn clean_all_never_grows_the_input() {
        let input = vec![
            record(Some(10.0), Some(" x "), Some("us")),
            record(Some(0.0), Some("y"), Some("us")),
            record(None, Some("z"), Some("eu")),
            record(Some(900.0), Some("w"), Some("eu")),
        ];
        let cleaned: Vec<CleanedRecord> = clean_all(input.clone()).collect();
        assert!(cleaned.len() <= input.len());
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned.iter().all(|r| r.purchase_amount > 0.0));
        assert!(cleaned.iter().all(|r| {
            r.customer_name
                .as_deref()
                .map_or(true, |name| name == name.trim())
        }));
    }
}
