pub mod categories;
pub mod codes;

pub use categories::{CategoryAssignment, CategoryTable, RangeOverlap};
pub use codes::{extract_codes, parse_code, ExtractedCodes};
