use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hickory_resolver::error::ResolveError;

/// A DKIM key as currently published in DNS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DkimDnsRecord {
    /// Raw TXT content, character-strings concatenated.
    pub value: String,
    /// When the value was observed.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Domain or selector cannot form a DNS name.
    #[error("invalid DKIM name {0:?}")]
    InvalidName(String),
    /// The resolver failed for another reason than the name not existing.
    #[error("DNS lookup of {name} failed: {source}")]
    Resolve {
        name: String,
        #[source]
        source: ResolveError,
    },
}

/// Looks up the DKIM key published for a domain and selector.
#[async_trait]
pub trait DkimRecordFetcher: Send + Sync + 'static {
    /// `Ok(None)` when nothing DKIM shaped is published.
    async fn fetch(&self, domain: &str, selector: &str)
        -> Result<Option<DkimDnsRecord>, FetchError>;
}

/// `<selector>._domainkey.<domain>.` as a fully qualified name.
pub fn dkim_dns_name(domain: &str, selector: &str) -> Result<String, FetchError> {
    let domain = domain.trim().trim_end_matches('.');
    let selector = selector.trim().trim_matches('.');
    if domain.is_empty() || selector.is_empty() {
        return Err(FetchError::InvalidName(format!(
            "{selector}._domainkey.{domain}"
        )));
    }
    Ok(format!("{selector}._domainkey.{domain}."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dkim_dns_name() {
        assert_eq!(
            dkim_dns_name("example.com", "google").unwrap(),
            "google._domainkey.example.com."
        );
        assert_eq!(
            dkim_dns_name("example.com.", " s1 ").unwrap(),
            "s1._domainkey.example.com."
        );
        assert!(matches!(
            dkim_dns_name("", "s1"),
            Err(FetchError::InvalidName(_))
        ));
        assert!(matches!(
            dkim_dns_name("example.com", ""),
            Err(FetchError::InvalidName(_))
        ));
    }
}
