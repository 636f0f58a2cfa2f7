mod m20251016_create_dkim_record;
mod m20251016_create_domain_selector_pair;

pub use m20251016_create_dkim_record::M20251016CreateDkimRecordMigration;
pub use m20251016_create_domain_selector_pair::M20251016CreateDomainSelectorPairMigration;
