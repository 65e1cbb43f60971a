use crate::types::{ClassifiedRecord, CleanedRecord, CustomerTier};

/// Amounts strictly above this are `Premium`.
pub const PREMIUM_THRESHOLD: f64 = 1000.0;
/// Amounts strictly above this (and not above [`PREMIUM_THRESHOLD`]) are `Gold`.
pub const GOLD_THRESHOLD: f64 = 500.0;

pub fn classify_amount(purchase_amount: f64) -> CustomerTier {
    if purchase_amount > PREMIUM_THRESHOLD {
        CustomerTier::Premium
    } else if purchase_amount > GOLD_THRESHOLD {
        CustomerTier::Gold
    } else {
        CustomerTier::Standard
    }
}

pub fn classify(record: CleanedRecord) -> ClassifiedRecord {
    let customer_tier = classify_amount(record.purchase_amount);
    ClassifiedRecord {
        record,
        customer_tier,
    }
}

pub fn classify_all<I>(records: I) -> impl Iterator<Item = ClassifiedRecord>
where
    I: IntoIterator<Item = CleanedRecord>,
{
    records.into_iter().map(classify)
}
