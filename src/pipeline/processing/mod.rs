// Pipeline processing: typing, cleaning and merging staged rows

pub mod cleaner;
pub mod merge;
pub mod normalize;

pub use cleaner::{CleanOutcome, RecordCleaner};
pub use merge::{IdempotentMerge, MergeReport};
pub use normalize::{normalize_currency, MalformedCurrencyError};
