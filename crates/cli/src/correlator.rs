// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response correlation.
//!
//! Every outgoing request registers a one-shot waiter under a fresh id. An
//! incoming line whose integer `id` matches a waiter resolves it; that path
//! takes priority over notification dispatch. Waiters leave the map exactly
//! once: on a matching response, on a write failure, or when the session is
//! torn down.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::RuntimeError;
use crate::wire::{IncomingMessage, RequestId};

/// First id allocated in every session.
pub const FIRST_REQUEST_ID: RequestId = 100;

/// Outcome delivered to a request waiter.
pub type Reply = Result<Value, RuntimeError>;

#[derive(Debug)]
struct Waiter {
    method: String,
    sender: oneshot::Sender<Reply>,
}

/// Pending request table for one session.
#[derive(Debug)]
pub struct PendingRequests {
    next_id: RequestId,
    waiters: HashMap<RequestId, Waiter>,
}

/// Where an incoming message was routed.
#[derive(Debug)]
pub enum Route {
    /// Settled the waiter registered under `id`.
    Resolved { id: RequestId, method: String },
    /// Not a response to anything pending, but shaped like a notification.
    Notification(IncomingMessage),
    /// Neither: unmatched response ids and stray objects end up here.
    Ignored,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            next_id: FIRST_REQUEST_ID,
            waiters: HashMap::new(),
        }
    }

    /// Allocate the next id and register a waiter for it.
    pub fn register(&mut self, method: &str) -> (RequestId, oneshot::Receiver<Reply>) {
        let id = self.next_id;
        self.next_id += 1;
        let (sender, receiver) = oneshot::channel();
        self.waiters.insert(
            id,
            Waiter {
                method: method.to_string(),
                sender,
            },
        );
        (id, receiver)
    }

    /// Settle and remove the waiter for `id`. Returns false if none was pending.
    pub fn resolve(&mut self, id: RequestId, reply: Reply) -> bool {
        match self.waiters.remove(&id) {
            Some(waiter) => {
                // The caller may have stopped waiting; that is not an error here.
                let _ = waiter.sender.send(reply);
                true
            }
            None => false,
        }
    }

    /// Remove a waiter without settling it (the caller already has the error).
    pub fn forget(&mut self, id: RequestId) -> bool {
        self.waiters.remove(&id).is_some()
    }

    /// Fail and remove every waiter. Returns how many were drained.
    pub fn fail_all(&mut self, error: &RuntimeError) -> usize {
        let drained = self.waiters.len();
        for (_, waiter) in self.waiters.drain() {
            let _ = waiter.sender.send(Err(error.clone()));
        }
        drained
    }

    /// Route one decoded line: responses to pending ids first, then notifications.
    pub fn route(&mut self, message: IncomingMessage) -> Route {
        if let Some(id) = message.id() {
            if let Some(waiter) = self.waiters.remove(&id) {
                let reply = message.into_response().map_err(RuntimeError::from);
                let _ = waiter.sender.send(reply);
                return Route::Resolved {
                    id,
                    method: waiter.method,
                };
            }
        }
        if message.as_notification().is_some() {
            Route::Notification(message)
        } else {
            Route::Ignored
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: RequestId) -> bool {
        self.waiters.contains_key(&id)
    }

    /// The id the next request will get.
    #[cfg(test)]
    pub(crate) fn peek_next_id(&self) -> RequestId {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "correlator_tests.rs"]
mod tests;
