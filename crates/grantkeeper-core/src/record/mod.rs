mod amount;
mod fields;
mod types;

pub use amount::{ParsedAmount, is_currency_amount, parse_amount};
pub use fields::{RawFields, fields_from_json, parse_date, parse_timestamp};
pub use types::{Record, RecordStatus};
