mod record_no;

pub use record_no::{generate_record_no, RecordNoPrefix};
