pub mod dkim_record;
pub mod domain_selector_pair;

pub use dkim_record::{DkimRecordEntity, DkimRecordRepository};
pub use domain_selector_pair::{DomainSelectorPairEntity, DomainSelectorPairRepository};
