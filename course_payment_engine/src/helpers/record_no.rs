use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

/// The human-readable prefixes used for generated record numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordNoPrefix {
    Cart,
    Purchase,
    Payout,
}

impl RecordNoPrefix {
    fn as_str(&self) -> &'static str {
        match self {
            RecordNoPrefix::Cart => "CART",
            RecordNoPrefix::Purchase => "PURCHASE",
            RecordNoPrefix::Payout => "PAYOUT",
        }
    }
}

/// Generates a unique human-readable record number of the form `{PREFIX}_{RANDOM6}{YYYYMMDD}`,
/// e.g. `CART_X4K9ZQ20250825`.
pub fn generate_record_no(prefix: RecordNoPrefix) -> String {
    let unique: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(6).map(|c| (c as char).to_ascii_uppercase()).collect();
    let yyyymmdd = Utc::now().format("%Y%m%d");
    format!("{}_{unique}{yyyymmdd}", prefix.as_str())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_no_format() {
        let no = generate_record_no(RecordNoPrefix::Purchase);
        let (prefix, rest) = no.split_once('_').expect("record no must contain an underscore");
        assert_eq!(prefix, "PURCHASE");
        assert_eq!(rest.len(), 6 + 8);
        assert!(rest.chars().all(|c| c.is_ascii_alphanumeric()));
        let date = &rest[6..];
        assert!(date.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn record_nos_are_unique_enough() {
        let a = generate_record_no(RecordNoPrefix::Cart);
        let b = generate_record_no(RecordNoPrefix::Cart);
        assert_ne!(a, b);
    }
}
