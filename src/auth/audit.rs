// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Login Audit Queue
//!
//! The login path records audit events through an [`AuditSink`], which
//! only ever does a non-blocking `try_send` into a bounded channel. A full
//! or closed queue drops the event with a warning; the login itself is
//! never delayed or failed by auditing.
//!
//! An [`AuditWriter`] drains the queue into a [`LoginAuditLog`] in the
//! background.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. On cancellation the writer
//! flushes whatever is already queued before returning.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::storage::{LoginAuditEvent, LoginAuditLog};

/// Create a connected sink/writer pair.
pub fn audit_channel(capacity: usize, log: Arc<dyn LoginAuditLog>) -> (AuditSink, AuditWriter) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (AuditSink { tx }, AuditWriter { rx, log })
}

/// Fire-and-forget handle used by the protocol.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<LoginAuditEvent>,
}

impl AuditSink {
    pub fn record(&self, event: LoginAuditEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    event_id = %event.event_id,
                    address = %event.address,
                    "Audit queue full, dropping login audit event"
                );
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    event_id = %event.event_id,
                    "Audit writer stopped, dropping login audit event"
                );
            }
        }
    }
}

/// Background task persisting queued audit events.
pub struct AuditWriter {
    rx: mpsc::Receiver<LoginAuditEvent>,
    log: Arc<dyn LoginAuditLog>,
}

impl AuditWriter {
    /// Run until the token is cancelled or every sink is dropped.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(writer.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Login audit writer starting");

        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.write(event).await,
                    None => {
                        info!("Login audit queue closed");
                        return;
                    }
                },
                _ = shutdown.cancelled() => {
                    let flushed = self.flush_pending().await;
                    info!(flushed, "Login audit writer shutting down");
                    return;
                }
            }
        }
    }

    /// Persist everything currently queued without waiting for more.
    pub async fn flush_pending(&mut self) -> usize {
        let mut flushed = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.write(event).await;
            flushed += 1;
        }
        flushed
    }

    async fn write(&self, event: LoginAuditEvent) {
        let log = self.log.clone();
        let event_id = event.event_id.clone();
        match tokio::task::spawn_blocking(move || log.append(&event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(%event_id, error = %e, "Failed to persist login audit event"),
            Err(e) => warn!(%event_id, error = %e, "Login audit write task failed"),
        }
    }
}
