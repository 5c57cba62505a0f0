// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request-scoped state shared between an adapter and the handler it wraps.

use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::client::ApiToolkit;
use crate::reporting::ErrorRecord;

/// Cloneable handle over the errors reported during one exchange.
///
/// Clones share the same list.  The lock is never held across an await.
#[derive(Debug, Clone, Default)]
pub struct ErrorList {
    inner: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ErrorRecord>> {
        // A panicking reporter must not lose the records of everyone else.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a record, keeping report order.
    pub fn push(&self, record: ErrorRecord) {
        self.lock().push(record);
    }

    /// Copy of the current records.
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.lock().clone()
    }

    /// Drain the list.
    pub fn take(&self) -> Vec<ErrorRecord> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// The bag an adapter places in the request extensions.
///
/// Handlers use it to report errors against the exchange and to link
/// outgoing calls back to it.
#[derive(Debug, Clone)]
pub struct RequestScope {
    msg_id: Uuid,
    errors: ErrorList,
    client: Option<ApiToolkit>,
}

impl RequestScope {
    /// A scope with a fresh message id and no client.
    pub fn new() -> Self {
        Self::with_msg_id(Uuid::new_v4())
    }

    pub fn with_msg_id(msg_id: Uuid) -> Self {
        Self {
            msg_id,
            errors: ErrorList::new(),
            client: None,
        }
    }

    /// Attach the client that owns this exchange.
    pub fn with_client(mut self, client: ApiToolkit) -> Self {
        self.client = Some(client);
        self
    }

    pub fn msg_id(&self) -> Uuid {
        self.msg_id
    }

    pub fn error_list(&self) -> &ErrorList {
        &self.errors
    }

    pub fn client(&self) -> Option<&ApiToolkit> {
        self.client.as_ref()
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything a [`RequestScope`] can be looked up from.
pub trait ScopedContext {
    fn request_scope(&self) -> Option<&RequestScope>;
}

impl ScopedContext for RequestScope {
    fn request_scope(&self) -> Option<&RequestScope> {
        Some(self)
    }
}

impl ScopedContext for Option<&RequestScope> {
    fn request_scope(&self) -> Option<&RequestScope> {
        *self
    }
}

impl ScopedContext for http::Extensions {
    fn request_scope(&self) -> Option<&RequestScope> {
        self.get::<RequestScope>()
    }
}

impl<B> ScopedContext for http::Request<B> {
    fn request_scope(&self) -> Option<&RequestScope> {
        self.extensions().get::<RequestScope>()
    }
}
