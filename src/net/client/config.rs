//! Configuration of the query engine.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use core::cmp;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

//------------ Configuration Constants ----------------------------------------

/// Configuration limits for the network timeout.
const NETWORK_TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_millis(1500),
    Duration::from_millis(1),
    Duration::from_secs(3600),
);

/// Configuration limits for the EDNS buffer size.
const EDNS_BUFSIZE: DefMinMax<u16> = DefMinMax::new(1232, 512, 65535);

/// Default maximum number of idle connections per server.
const DEF_MAX_IDLE_PER_HOST: usize = 10;

/// Default maximum number of idle connections overall.
const DEF_MAX_IDLE_TOTAL: usize = 100;

/// Default time an idle connection is kept.
const DEF_MAX_IDLE_TIME: Duration = Duration::from_secs(10);

//------------ DnssecMode -----------------------------------------------------

/// How the resolver deals with DNSSEC.
///
/// The query engine only cares whether DNSSEC is switched off entirely.
/// In all other modes, it asks for DNSSEC records by setting the DO bit and,
/// for recursive queries, for unchecked data via the CD bit.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum DnssecMode {
    /// DNSSEC is not used at all.
    Off,

    /// DNSSEC records are requested but not validated.
    ProcessNoValidate,

    /// DNSSEC records are requested and validated when asked for.
    #[default]
    Process,

    /// Validation failures are logged.
    LogFail,

    /// Validation failures lead to failing answers.
    Validate,
}

//------------ Config ---------------------------------------------------------

/// Configuration for sending queries.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct Config {
    /// Time to wait for a response or connection.
    #[cfg_attr(feature = "serde", serde(with = "network_timeout_ms"))]
    network_timeout: Duration,

    /// The EDNS UDP payload size.
    #[cfg_attr(feature = "serde", serde(with = "edns_bufsize"))]
    edns_bufsize: u16,

    /// The DNSSEC mode.
    dnssec: DnssecMode,

    /// Whether to use TLS for port 853.
    dot_to_port_853: bool,

    /// Whether to pad queries sent over TLS.
    padding_outgoing: bool,

    /// Whether to drop responses without a matching client subnet.
    ecs_hardening: bool,

    /// Whether to log broken responses prominently.
    log_common_errors: bool,

    /// Local address for IPv4 sockets.
    local_v4: Ipv4Addr,

    /// Local address for IPv6 sockets.
    local_v6: Ipv6Addr,

    /// Configuration of the TCP connection pool.
    pool: PoolConfig,
}

impl Config {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the network timeout.
    ///
    /// This is the maximum time to wait for a response to a query. It is
    /// also used as the timeout for establishing a TCP connection.
    pub fn network_timeout(&self) -> Duration {
        self.network_timeout
    }

    /// Sets the network timeout.
    ///
    /// If this value is too small or too large, it will be caped.
    pub fn set_network_timeout(&mut self, value: Duration) {
        self.network_timeout = NETWORK_TIMEOUT.limit(value)
    }

    /// Returns the EDNS buffer size.
    ///
    /// This is the UDP payload size announced in queries and the size of
    /// the buffer for receiving responses. It also limits the size of
    /// padded queries.
    pub fn edns_bufsize(&self) -> u16 {
        self.edns_bufsize
    }

    /// Sets the EDNS buffer size.
    ///
    /// If this value is too small, it will be caped.
    pub fn set_edns_bufsize(&mut self, value: u16) {
        self.edns_bufsize = EDNS_BUFSIZE.limit(value)
    }

    /// Returns the DNSSEC mode.
    pub fn dnssec(&self) -> DnssecMode {
        self.dnssec
    }

    /// Sets the DNSSEC mode.
    pub fn set_dnssec(&mut self, value: DnssecMode) {
        self.dnssec = value
    }

    /// Returns whether TCP queries to port 853 use TLS.
    pub fn dot_to_port_853(&self) -> bool {
        self.dot_to_port_853
    }

    /// Sets whether TCP queries to port 853 use TLS.
    pub fn set_dot_to_port_853(&mut self, value: bool) {
        self.dot_to_port_853 = value
    }

    /// Returns whether queries over TLS are padded.
    pub fn padding_outgoing(&self) -> bool {
        self.padding_outgoing
    }

    /// Sets whether queries over TLS are padded.
    pub fn set_padding_outgoing(&mut self, value: bool) {
        self.padding_outgoing = value
    }

    /// Returns whether client subnet hardening is enabled.
    ///
    /// If enabled, a UDP response to a query with a client subnet option
    /// is only accepted if it contains a client subnet option with the
    /// same source.
    pub fn ecs_hardening(&self) -> bool {
        self.ecs_hardening
    }

    /// Sets whether client subnet hardening is enabled.
    pub fn set_ecs_hardening(&mut self, value: bool) {
        self.ecs_hardening = value
    }

    /// Returns whether broken responses are logged at info level.
    ///
    /// Otherwise they are logged at debug level.
    pub fn log_common_errors(&self) -> bool {
        self.log_common_errors
    }

    /// Sets whether broken responses are logged at info level.
    pub fn set_log_common_errors(&mut self, value: bool) {
        self.log_common_errors = value
    }

    /// Returns the local address for IPv4 sockets.
    pub fn local_v4(&self) -> Ipv4Addr {
        self.local_v4
    }

    /// Sets the local address for IPv4 sockets.
    pub fn set_local_v4(&mut self, value: Ipv4Addr) {
        self.local_v4 = value
    }

    /// Returns the local address for IPv6 sockets.
    pub fn local_v6(&self) -> Ipv6Addr {
        self.local_v6
    }

    /// Sets the local address for IPv6 sockets.
    pub fn set_local_v6(&mut self, value: Ipv6Addr) {
        self.local_v6 = value
    }

    /// Returns the connection pool configuration.
    pub fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    /// Returns a mutable reference to the connection pool configuration.
    pub fn pool_mut(&mut self) -> &mut PoolConfig {
        &mut self.pool
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_timeout: NETWORK_TIMEOUT.default(),
            edns_bufsize: EDNS_BUFSIZE.default(),
            dnssec: DnssecMode::default(),
            dot_to_port_853: true,
            padding_outgoing: true,
            ecs_hardening: false,
            log_common_errors: false,
            local_v4: Ipv4Addr::UNSPECIFIED,
            local_v6: Ipv6Addr::UNSPECIFIED,
            pool: PoolConfig::default(),
        }
    }
}

//------------ PoolConfig -----------------------------------------------------

/// Configuration for the pool of idle TCP connections.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct PoolConfig {
    /// Maximum number of idle connections per server.
    max_idle_per_host: usize,

    /// Maximum number of idle connections overall.
    max_idle_total: usize,

    /// How long an idle connection is kept.
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    max_idle_time: Duration,

    /// Maximum number of queries per connection, zero for no limit.
    max_queries: u64,
}

impl PoolConfig {
    /// Creates a new pool config with default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the maximum number of idle connections per server.
    pub fn max_idle_per_host(&self) -> usize {
        self.max_idle_per_host
    }

    /// Sets the maximum number of idle connections per server.
    pub fn set_max_idle_per_host(&mut self, value: usize) {
        self.max_idle_per_host = value
    }

    /// Returns the maximum number of idle connections overall.
    pub fn max_idle_total(&self) -> usize {
        self.max_idle_total
    }

    /// Sets the maximum number of idle connections overall.
    pub fn set_max_idle_total(&mut self, value: usize) {
        self.max_idle_total = value
    }

    /// Returns how long an idle connection is kept.
    pub fn max_idle_time(&self) -> Duration {
        self.max_idle_time
    }

    /// Sets how long an idle connection is kept.
    pub fn set_max_idle_time(&mut self, value: Duration) {
        self.max_idle_time = value
    }

    /// Returns the maximum number of queries sent over a connection.
    ///
    /// A value of zero means there is no limit.
    pub fn max_queries(&self) -> u64 {
        self.max_queries
    }

    /// Sets the maximum number of queries sent over a connection.
    pub fn set_max_queries(&mut self, value: u64) {
        self.max_queries = value
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: DEF_MAX_IDLE_PER_HOST,
            max_idle_total: DEF_MAX_IDLE_TOTAL,
            max_idle_time: DEF_MAX_IDLE_TIME,
            max_queries: 0,
        }
    }
}

//------------ DefMinMax -----------------------------------------------------

/// A default value together with the range of permitted values.
#[derive(Clone, Copy)]
struct DefMinMax<T> {
    /// The default value.
    def: T,

    /// The minimum value.
    min: T,

    /// The maximum value.
    max: T,
}

impl<T> DefMinMax<T> {
    /// Creates a new value.
    const fn new(def: T, min: T, max: T) -> Self {
        Self { def, min, max }
    }

    /// Returns the default value.
    fn default(self) -> T {
        self.def
    }

    /// Limits `value` to the permitted range.
    fn limit(self, value: T) -> T
    where
        T: Ord,
    {
        cmp::max(self.min, cmp::min(self.max, value))
    }
}

//------------ Serde Helpers --------------------------------------------------

/// Serializing durations as milliseconds.
#[cfg(feature = "serde")]
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as its milliseconds.
    pub fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    /// Deserializes a duration from milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serializing the network timeout in milliseconds, applying its limits.
#[cfg(feature = "serde")]
mod network_timeout_ms {
    use super::NETWORK_TIMEOUT;
    use serde::{Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes the timeout as its milliseconds.
    pub fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        super::duration_ms::serialize(value, serializer)
    }

    /// Deserializes the timeout from milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        super::duration_ms::deserialize(deserializer)
            .map(|value| NETWORK_TIMEOUT.limit(value))
    }
}

/// Serializing the EDNS buffer size, applying its limits.
#[cfg(feature = "serde")]
mod edns_bufsize {
    use super::EDNS_BUFSIZE;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes the buffer size.
    pub fn serialize<S: Serializer>(
        value: &u16,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(*value)
    }

    /// Deserializes the buffer size.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<u16, D::Error> {
        u16::deserialize(deserializer).map(|value| EDNS_BUFSIZE.limit(value))
    }
}

//============ Testing =======================================================
