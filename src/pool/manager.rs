//! Bounded connection pool.
//!
//! Two crossbeam channels carry the pool state:
//!
//! - `idle` holds connections ready for reuse, with their timestamps
//! - `permits` holds one token per connection that may still be opened
//!
//! `idle + permits + checked out == max_size` at all times. Acquisition takes
//! an idle connection when one is queued, otherwise spends a permit to open a
//! new one, otherwise waits on both channels until `connection_timeout`.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};

use crate::error::TideError;
use crate::executor::Connection;
use crate::pool::config::PoolConfig;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Opens connections for a [`ConnectionPool`].
pub trait ConnectionManager: Send + Sync + 'static {
    type Connection: Connection + 'static;

    fn connect(&self) -> Result<Self::Connection, TideError>;
}

struct Slot<C> {
    conn: C,
    created_at: Instant,
    idle_since: Instant,
}

impl<C> Slot<C> {
    fn new(conn: C) -> Self {
        let now = Instant::now();
        Self {
            conn,
            created_at: now,
            idle_since: now,
        }
    }
}

enum Checkout<C> {
    Idle(Slot<C>),
    Permit,
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub idle: usize,
    /// Connections that can still be opened without exceeding `max_size`
    pub unopened: usize,
}

pub struct ConnectionPool<M: ConnectionManager> {
    manager: M,
    config: PoolConfig,
    idle_tx: Sender<Slot<M::Connection>>,
    idle_rx: Receiver<Slot<M::Connection>>,
    permit_tx: Sender<()>,
    permit_rx: Receiver<()>,
    closed: AtomicBool,
}

impl<M: ConnectionManager> ConnectionPool<M> {
    /// Create a pool. No connection is opened until the first `acquire`
    /// (or `warm_up`).
    pub fn new(manager: M, config: PoolConfig) -> Self {
        let capacity = config.max_size.max(1) as usize;
        let (idle_tx, idle_rx) = bounded(capacity);
        let (permit_tx, permit_rx) = bounded(capacity);
        for _ in 0..capacity {
            // Capacity matches the loop bound and the receiver is alive
            let _ = permit_tx.try_send(());
        }
        Self {
            manager,
            config,
            idle_tx,
            idle_rx,
            permit_tx,
            permit_rx,
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn state(&self) -> PoolState {
        PoolState {
            idle: self.idle_rx.len(),
            unopened: self.permit_rx.len(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Open up to `min_idle` connections ahead of demand.
    pub fn warm_up(&self) -> Result<(), TideError> {
        let target = self.config.min_idle.min(self.config.max_size) as usize;
        while self.idle_rx.len() < target {
            if self.permit_rx.try_recv().is_err() {
                break;
            }
            let slot = self.open()?;
            if let Err(rejected) = self.idle_tx.try_send(slot) {
                drop(rejected.into_inner());
                self.return_permit();
                break;
            }
        }
        log::debug!("connection pool warmed up with {} idle connections", self.idle_rx.len());
        Ok(())
    }

    /// Borrow a connection, waiting up to `connection_timeout`.
    ///
    /// # Errors
    ///
    /// `TideError::Resource` when the pool is closed, the wait times out, or
    /// a new connection cannot be opened.
    pub fn acquire(&self) -> Result<PooledConnection<'_, M>, TideError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::acquire_connection_span().entered();

        let start = Instant::now();
        let deadline = start + self.config.connection_timeout;

        loop {
            if self.is_closed() {
                return Err(TideError::resource("connection pool is closed"));
            }

            let checkout = self.next_checkout(deadline)?;
            let slot = match checkout {
                Checkout::Idle(slot) => match self.revalidate(slot) {
                    Some(slot) => slot,
                    None => self.open()?,
                },
                Checkout::Permit => self.open()?,
            };

            if self.is_closed() {
                drop(slot);
                self.return_permit();
                continue;
            }

            #[cfg(feature = "metrics")]
            METRICS.record_connection_wait(start.elapsed());

            return Ok(PooledConnection {
                pool: self,
                slot: Some(slot),
            });
        }
    }

    fn next_checkout(&self, deadline: Instant) -> Result<Checkout<M::Connection>, TideError> {
        // Reuse beats opening
        match self.idle_rx.try_recv() {
            Ok(slot) => return Ok(Checkout::Idle(slot)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }
        if self.permit_rx.try_recv().is_ok() {
            return Ok(Checkout::Permit);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        select! {
            recv(self.idle_rx) -> slot => slot.map(Checkout::Idle).map_err(|_| closed_channel()),
            recv(self.permit_rx) -> permit => permit.map(|_| Checkout::Permit).map_err(|_| closed_channel()),
            default(remaining) => Err(TideError::resource(format!(
                "timed out after {:?} waiting for a connection (max {} connections)",
                self.config.connection_timeout, self.config.max_size
            ))),
        }
    }

    /// Keep a slot pulled from the idle queue only if it is still fit for use.
    /// A rejected slot's connection is dropped; its permit stays with the caller.
    fn revalidate(&self, mut slot: Slot<M::Connection>) -> Option<Slot<M::Connection>> {
        let now = Instant::now();
        let too_old = self
            .config
            .max_lifetime
            .is_some_and(|max| now.duration_since(slot.created_at) >= max);
        let idle_too_long = self
            .config
            .idle_timeout
            .is_some_and(|max| now.duration_since(slot.idle_since) >= max);
        if too_old || idle_too_long {
            log::debug!("retiring pooled connection (expired)");
            return None;
        }
        if now.duration_since(slot.idle_since) >= self.config.validation_interval && !slot.conn.is_valid() {
            log::warn!("pooled connection failed validation; reconnecting");
            return None;
        }
        Some(slot)
    }

    /// Open a connection against an already-taken permit.
    fn open(&self) -> Result<Slot<M::Connection>, TideError> {
        match self.manager.connect() {
            Ok(conn) => Ok(Slot::new(conn)),
            Err(err) => {
                self.return_permit();
                log::error!("failed to open connection: {err}");
                Err(TideError::resource(format!("could not open connection: {err}")))
            }
        }
    }

    fn return_permit(&self) {
        let _ = self.permit_tx.try_send(());
    }

    fn release(&self, mut slot: Slot<M::Connection>) {
        if !slot.conn.auto_commit() {
            log::warn!("connection returned with auto-commit disabled; rolling back");
            let restored = slot
                .conn
                .rollback()
                .and_then(|()| slot.conn.set_auto_commit(true));
            if let Err(err) = restored {
                log::error!("discarding connection that could not be reset: {err}");
                drop(slot);
                self.return_permit();
                return;
            }
        }

        if self.is_closed() {
            drop(slot);
            self.return_permit();
            return;
        }

        slot.idle_since = Instant::now();
        if let Err(rejected) = self.idle_tx.try_send(slot) {
            drop(rejected.into_inner());
            self.return_permit();
        }
    }

    /// Close every idle connection and refuse further acquisitions.
    ///
    /// Connections currently checked out are closed when they are returned.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut closed = 0usize;
        while let Ok(slot) = self.idle_rx.try_recv() {
            drop(slot);
            self.return_permit();
            closed += 1;
        }
        log::info!("connection pool closed ({closed} idle connections released)");
    }
}

fn closed_channel() -> TideError {
    TideError::resource("connection pool channel disconnected")
}

/// A connection on loan from the pool; returned on drop.
///
/// An open transaction left behind is rolled back before reuse.
pub struct PooledConnection<'a, M: ConnectionManager> {
    pool: &'a ConnectionPool<M>,
    slot: Option<Slot<M::Connection>>,
}

impl<M: ConnectionManager> PooledConnection<'_, M> {
    /// Age of the underlying connection
    pub fn age(&self) -> Duration {
        self.slot
            .as_ref()
            .map(|slot| slot.created_at.elapsed())
            .unwrap_or_default()
    }
}

impl<M: ConnectionManager> Deref for PooledConnection<'_, M> {
    type Target = M::Connection;

    fn deref(&self) -> &M::Connection {
        &self.slot.as_ref().expect("connection already returned to the pool").conn
    }
}

impl<M: ConnectionManager> DerefMut for PooledConnection<'_, M> {
    fn deref_mut(&mut self) -> &mut M::Connection {
        &mut self.slot.as_mut().expect("connection already returned to the pool").conn
    }
}

impl<M: ConnectionManager> Drop for PooledConnection<'_, M> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.release(slot);
        }
    }
}
