use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

pub const DEFAULT_LISTEN_SOCKET: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 6290));

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/dkim_archive";

/// Pairs refreshed more recently than this are not selected by the batch update.
pub const STALENESS_THRESHOLD: Duration = Duration::from_secs(60 * 60 * 24);

/// Environment variable holding the bearer secret of the batch update endpoint.
pub const SECRET_TOKEN_ENV: &str = "CRON_SECRET";

/// Environment variable holding the number of pairs refreshed per invocation.
pub const BATCH_LIMIT_ENV: &str = "BATCH_UPDATE_NUM_RECORDS";

/// Largest batch limit, postgres binds `LIMIT` as a signed 64 bit integer.
pub const MAX_BATCH_LIMIT: u64 = i64::MAX as u64;

pub const DEFAULT_DNS_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DNS_ATTEMPTS: usize = 2;
