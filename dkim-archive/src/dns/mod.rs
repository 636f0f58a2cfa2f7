//! Resolving the DKIM key a domain publishes for a selector.

mod dkim_txt;
mod fetcher;
mod hickory_fetcher;
#[cfg(any(test, feature = "testing"))]
mod static_fetcher;

pub use dkim_txt::{is_dkim_key, join_txt_chunks, select_dkim_value};
pub use fetcher::{dkim_dns_name, DkimDnsRecord, DkimRecordFetcher, FetchError};
pub use hickory_fetcher::HickoryDkimFetcher;
#[cfg(any(test, feature = "testing"))]
pub use static_fetcher::StaticDkimFetcher;
