use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hickory_resolver::{
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    proto::op::ResponseCode,
    system_conf, TokioAsyncResolver,
};

use super::dkim_txt::{join_txt_chunks, select_dkim_value};
use super::fetcher::{dkim_dns_name, DkimDnsRecord, DkimRecordFetcher, FetchError};
use crate::config::DnsToml;

/// Fetches DKIM keys with TXT lookups through a tokio based resolver.
#[derive(Clone)]
pub struct HickoryDkimFetcher {
    resolver: TokioAsyncResolver,
}

impl std::fmt::Debug for HickoryDkimFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HickoryDkimFetcher")
    }
}

impl HickoryDkimFetcher {
    /// Build the resolver from the `[dns]` config section.
    ///
    /// Without custom nameservers the system configuration is read,
    /// which fails when it is missing or unreadable.
    pub fn from_config(config: &DnsToml) -> Result<Self, ResolveError> {
        let (resolver_config, mut opts) = if config.nameservers.is_empty() {
            system_conf::read_system_conf()?
        } else {
            (custom_resolver_config(config), ResolverOpts::default())
        };
        opts.timeout = Duration::from_millis(config.timeout_ms);
        opts.attempts = config.attempts;
        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        })
    }
}

fn custom_resolver_config(config: &DnsToml) -> ResolverConfig {
    let mut group = NameServerConfigGroup::new();
    for socket in &config.nameservers {
        group.merge(NameServerConfigGroup::from_ips_clear(
            &[socket.ip()],
            socket.port(),
            true,
        ));
    }
    ResolverConfig::from_parts(None, vec![], group)
}

/// NXDOMAIN or an empty NOERROR answer.
///
/// The resolver reports SERVFAIL, REFUSED and friends as `NoRecordsFound` too,
/// those stay errors so the pair is retried.
fn is_nothing_published(error: &ResolveError) -> bool {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            matches!(response_code, ResponseCode::NXDomain | ResponseCode::NoError)
        }
        _ => false,
    }
}

#[async_trait]
impl DkimRecordFetcher for HickoryDkimFetcher {
    async fn fetch(
        &self,
        domain: &str,
        selector: &str,
    ) -> Result<Option<DkimDnsRecord>, FetchError> {
        let name = dkim_dns_name(domain, selector)?;
        let timestamp = Utc::now();
        let lookup = match self.resolver.txt_lookup(name.as_str()).await {
            Ok(lookup) => lookup,
            Err(e) if is_nothing_published(&e) => {
                tracing::debug!("No TXT records at {name}");
                return Ok(None);
            }
            Err(e) => return Err(FetchError::Resolve { name, source: e }),
        };

        let values = lookup.iter().map(|txt| join_txt_chunks(txt.txt_data()));
        let value = match select_dkim_value(values) {
            Some(value) => value,
            None => {
                tracing::debug!("TXT records at {name} do not contain a DKIM key");
                return Ok(None);
            }
        };
        Ok(Some(DkimDnsRecord { value, timestamp }))
    }
}
