//! ## netsight-core::store
//! **Concurrent aggregate of connection and interface counters**
//!
//! Capture sessions write through [`TrafficSink`] once per tick; readers take
//! owned snapshots through [`TrafficReader`]. Every operation is a short
//! critical section over a single `RwLock`, so a reader never observes a
//! half-merged connection and never holds the lock while doing I/O.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::model::{Connection, ConnectionKey, Filter, InterfaceStats, TrafficSnapshot};

/// Connections seen within this window are reported as active.
pub const DEFAULT_ACTIVE_WINDOW: Duration = Duration::from_secs(5);

/// Write capability handed to capture sessions.
pub trait TrafficSink: Send + Sync {
    fn update_connection(&self, conn: Connection);
    fn update_interface(&self, stats: InterfaceStats);
}

/// Read capability handed to snapshot consumers.
pub trait TrafficReader: Send + Sync {
    fn snapshot(&self) -> TrafficSnapshot;
    fn filtered_connections(&self, filter: &Filter) -> Vec<Connection>;
}

#[derive(Default)]
struct Tables {
    connections: HashMap<ConnectionKey, Connection>,
    interfaces: HashMap<String, InterfaceStats>,
    current_interface: Option<String>,
}

impl Tables {
    fn current(&self) -> Option<&InterfaceStats> {
        self.current_interface
            .as_ref()
            .and_then(|name| self.interfaces.get(name))
    }
}

pub struct AggregateStore {
    tables: RwLock<Tables>,
    active_window: chrono::Duration,
}

impl Default for AggregateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::with_active_window(DEFAULT_ACTIVE_WINDOW)
    }

    pub fn with_active_window(window: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            active_window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::seconds(5)),
        }
    }

    /// Upserts a connection by key.
    ///
    /// On merge `bytes`, `packets` and `last_seen` keep the larger of the
    /// stored and incoming values (sessions only ever emit growing counters,
    /// so this is the incoming value in practice) while `bytes_per_sec`
    /// becomes the mean of the stored and incoming rates. The cumulative
    /// fields are therefore insensitive to update order; the smoothed rate
    /// is not.
    pub fn update_connection(&self, conn: Connection) {
        let mut tables = self.tables.write();
        match tables.connections.get_mut(&conn.key) {
            Some(existing) => {
                existing.bytes_per_sec = (existing.bytes_per_sec + conn.bytes_per_sec) / 2;
                existing.bytes = existing.bytes.max(conn.bytes);
                existing.packets = existing.packets.max(conn.packets);
                existing.last_seen = existing.last_seen.max(conn.last_seen);
            }
            None => {
                tables.connections.insert(conn.key, conn);
            }
        }
    }

    /// Replaces the stats for `stats.interface` and marks it current.
    pub fn update_interface(&self, stats: InterfaceStats) {
        let mut tables = self.tables.write();
        tables.current_interface = Some(stats.interface.clone());
        tables.interfaces.insert(stats.interface.clone(), stats);
    }

    pub fn snapshot(&self) -> TrafficSnapshot {
        self.snapshot_at(Utc::now())
    }

    /// Snapshot relative to an explicit clock reading.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> TrafficSnapshot {
        let tables = self.tables.read();
        let connections = tables
            .connections
            .values()
            .filter(|conn| self.is_active(conn, now))
            .cloned()
            .collect();

        TrafficSnapshot {
            timestamp: now,
            interface: tables.current().cloned(),
            connections,
        }
    }

    pub fn filtered_connections(&self, filter: &Filter) -> Vec<Connection> {
        self.filtered_connections_at(filter, Utc::now())
    }

    pub fn filtered_connections_at(&self, filter: &Filter, now: DateTime<Utc>) -> Vec<Connection> {
        let tables = self.tables.read();
        tables
            .connections
            .values()
            .filter(|conn| self.is_active(conn, now) && filter.matches(conn))
            .cloned()
            .collect()
    }

    /// Drops every connection and interface entry in one step.
    pub fn clear(&self) {
        let mut tables = self.tables.write();
        let dropped = tables.connections.len();
        *tables = Tables::default();
        debug!(dropped, "Aggregate store cleared");
    }

    /// Number of stored connections, active or not.
    pub fn connection_count(&self) -> usize {
        self.tables.read().connections.len()
    }

    fn is_active(&self, conn: &Connection, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(conn.last_seen) < self.active_window
    }
}

impl TrafficSink for AggregateStore {
    fn update_connection(&self, conn: Connection) {
        AggregateStore::update_connection(self, conn)
    }

    fn update_interface(&self, stats: InterfaceStats) {
        AggregateStore::update_interface(self, stats)
    }
}

impl TrafficReader for AggregateStore {
    fn snapshot(&self) -> TrafficSnapshot {
        AggregateStore::snapshot(self)
    }

    fn filtered_connections(&self, filter: &Filter) -> Vec<Connection> {
        AggregateStore::filtered_connections(self, filter)
    }
}
