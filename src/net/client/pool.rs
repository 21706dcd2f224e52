//! A pool of idle TCP connections.
//!
//! Setting up a TCP connection, let alone a TLS connection, is expensive.
//! Connections that have successfully produced a response are therefore
//! not closed but kept in a [`ConnectionPool`] for later queries to the
//! same server.
//!
//! The pool hands out connections for exclusive use: [`acquire`] moves a
//! connection out of the pool. After use, the connection is either put
//! back via [`release`] or, if the exchange failed, closed via
//! [`discard`].
//!
//! [`acquire`]: ConnectionPool::acquire
//! [`release`]: ConnectionPool::release
//! [`discard`]: ConnectionPool::discard

use super::config::PoolConfig;
use super::protocol::AsyncStream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use tokio::time::Instant;
use tracing::trace;

//------------ PooledConnection ----------------------------------------------

/// A stream connection to a name server that can be reused.
pub struct PooledConnection {
    /// The actual stream.
    stream: Box<dyn AsyncStream>,

    /// Whether the stream is protected by TLS.
    tls: bool,

    /// The number of queries sent over the connection.
    queries: u64,

    /// When the connection was last put into the pool.
    idle_since: Instant,
}

impl PooledConnection {
    /// Creates a new connection from a freshly established stream.
    pub fn new(stream: Box<dyn AsyncStream>, tls: bool) -> Self {
        PooledConnection {
            stream,
            tls,
            queries: 0,
            idle_since: Instant::now(),
        }
    }

    /// Returns a mutable reference to the stream.
    pub fn stream_mut(&mut self) -> &mut dyn AsyncStream {
        self.stream.as_mut()
    }

    /// Returns the local address of the connection if known.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.stream.local_addr()
    }

    /// Returns whether the connection is protected by TLS.
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Returns the number of queries sent over the connection.
    pub fn queries(&self) -> u64 {
        self.queries
    }

    /// Records that a query is sent over the connection.
    pub fn count_query(&mut self) {
        self.queries += 1
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("local_addr", &self.local_addr())
            .field("tls", &self.tls)
            .field("queries", &self.queries)
            .field("idle_since", &self.idle_since)
            .finish()
    }
}

//------------ ConnectionPool ------------------------------------------------

/// The pool of idle connections.
///
/// Connections are kept per server address in a stack so that the most
/// recently used connection is handed out first. The pool can be shared
/// between tasks.
#[derive(Debug)]
pub struct ConnectionPool {
    /// The configuration.
    config: PoolConfig,

    /// The idle connections.
    idle: Mutex<Idle>,
}

/// The idle connections of a pool.
#[derive(Debug, Default)]
struct Idle {
    /// The connections per server.
    hosts: HashMap<SocketAddr, Vec<PooledConnection>>,

    /// The number of connections in `hosts`.
    total: usize,
}

impl ConnectionPool {
    /// Creates a new, empty pool.
    pub fn new(config: PoolConfig) -> Self {
        ConnectionPool {
            config,
            idle: Default::default(),
        }
    }

    /// Takes an idle connection to `addr` out of the pool.
    ///
    /// Only connections that match the `tls` requirement are considered.
    /// Connections that have been idle too long or have the wrong
    /// protection are closed along the way.
    pub fn acquire(
        &self,
        addr: SocketAddr,
        tls: bool,
    ) -> Option<PooledConnection> {
        let max_idle_time = self.config.max_idle_time();
        let mut idle = self.idle.lock();
        let Idle { hosts, total } = &mut *idle;
        let stack = hosts.get_mut(&addr)?;
        let mut res = None;
        while let Some(conn) = stack.pop() {
            *total -= 1;
            if conn.tls != tls {
                trace!(%addr, "closing pooled connection with wrong protection");
                continue;
            }
            if conn.idle_since.elapsed() > max_idle_time {
                trace!(%addr, "closing expired pooled connection");
                continue;
            }
            res = Some(conn);
            break;
        }
        if stack.is_empty() {
            hosts.remove(&addr);
        }
        res
    }

    /// Returns a connection to the pool after a successful exchange.
    ///
    /// The connection is closed instead if it has reached the maximum
    /// number of queries or if the pool is full.
    pub fn release(&self, addr: SocketAddr, mut conn: PooledConnection) {
        let max_queries = self.config.max_queries();
        if max_queries > 0 && conn.queries >= max_queries {
            trace!(%addr, "closing connection with too many queries");
            return;
        }
        let mut idle = self.idle.lock();
        if idle.total >= self.config.max_idle_total() {
            trace!(%addr, "pool full, closing connection");
            return;
        }
        let max_per_host = self.config.max_idle_per_host();
        let stack = idle.hosts.entry(addr).or_default();
        if stack.len() >= max_per_host {
            if stack.is_empty() {
                idle.hosts.remove(&addr);
            }
            trace!(%addr, "pool full for host, closing connection");
            return;
        }
        conn.idle_since = Instant::now();
        stack.push(conn);
        idle.total += 1;
    }

    /// Closes a connection that failed.
    pub fn discard(&self, conn: PooledConnection) {
        trace!(local = ?conn.local_addr(), "discarding connection");
        drop(conn)
    }

    /// Closes all connections that have been idle for too long.
    pub fn cleanup(&self) {
        let max_idle_time = self.config.max_idle_time();
        let mut idle = self.idle.lock();
        let Idle { hosts, total } = &mut *idle;
        hosts.retain(|_, stack| {
            let before = stack.len();
            stack.retain(|conn| conn.idle_since.elapsed() <= max_idle_time);
            *total -= before - stack.len();
            !stack.is_empty()
        });
    }

    /// Returns the number of idle connections.
    pub fn len(&self) -> usize {
        self.idle.lock().total
    }

    /// Returns whether there are no idle connections.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of idle connections to `addr`.
    pub fn len_for(&self, addr: SocketAddr) -> usize {
        self.idle.lock().hosts.get(&addr).map(Vec::len).unwrap_or(0)
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

//============ Testing =======================================================
