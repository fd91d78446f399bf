// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Ownership of native handles.
//!
//! Two lifetimes are supported:
//!
//! - [ResourceScope]: a stack of handles disposed in reverse acquisition
//!   order when the scope ends, whether it ends normally, through an error
//!   returned with `?`, or through a panic.
//! - [SharedHandle]: a reference counted handle disposed when its last
//!   reference is dropped. Used for results and chunks that outlive the call
//!   that created them. A shared handle keeps its parent alive, so a chunk
//!   is always disposed before the result it came from.
//!
//! Disposers are plain functions of the raw address. Views built on top of
//! a handle reference the handle, never the other way round.

use std::ptr::null_mut;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::engine::{Disposer, RawHandle};
use crate::error::{Error, Result, Status};

/// A native address together with the function that releases it.
pub struct NativeHandle {
    address: RawHandle,
    kind: &'static str,
    disposer: Disposer,
}

impl NativeHandle {
    /// # Safety
    ///
    /// `disposer` must be the destroy call matching the object at `address`.
    pub unsafe fn new(address: RawHandle, kind: &'static str, disposer: Disposer) -> Self {
        Self {
            address,
            kind,
            disposer,
        }
    }

    pub fn address(&self) -> RawHandle {
        self.address
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    fn dispose(self) {
        trace!(kind = self.kind, address = ?self.address, "disposing native handle");
        // SAFETY: `self` is consumed, so the disposer runs once per handle.
        unsafe { (self.disposer)(self.address) };
    }
}

impl std::fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("address", &self.address)
            .finish()
    }
}

/// Runs `create` with an empty output slot and wraps whatever it wrote.
///
/// A filled slot is disposed right away when `create` fails, so native
/// objects that must be destroyed even after a failed call never leak.
fn create_handle<F>(kind: &'static str, disposer: Disposer, create: F) -> Result<NativeHandle>
where
    F: FnOnce(&mut RawHandle) -> Result<()>,
{
    let mut address: RawHandle = null_mut();
    let outcome = create(&mut address);
    if address.is_null() {
        outcome?;
        return Err(Error::with_message_and_status(
            format!("Native call produced no {kind} handle"),
            Status::NativeCallFailure,
        ));
    }
    // SAFETY: the caller pairs `disposer` with the object `create` produced.
    let handle = unsafe { NativeHandle::new(address, kind, disposer) };
    match outcome {
        Ok(()) => {
            trace!(kind, ?address, "acquired native handle");
            Ok(handle)
        }
        Err(error) => {
            handle.dispose();
            Err(error)
        }
    }
}

/// Index of a handle within its [ResourceScope].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(usize);

#[derive(Debug)]
enum Entry {
    Live(NativeHandle),
    Consumed(&'static str),
}

/// A lexical owner of native handles.
#[derive(Debug)]
pub struct ResourceScope {
    label: &'static str,
    depth: usize,
    entries: Vec<Entry>,
    disposed: usize,
}

impl ResourceScope {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            depth: 0,
            entries: Vec::new(),
            disposed: 0,
        }
    }

    /// Acquires a handle through `create`, which receives the output slot to
    /// fill. See [SharedHandle::acquire] for the failure semantics.
    pub fn acquire<F>(&mut self, kind: &'static str, disposer: Disposer, create: F) -> Result<HandleId>
    where
        F: FnOnce(&mut RawHandle) -> Result<()>,
    {
        let handle = create_handle(kind, disposer, create)?;
        self.entries.push(Entry::Live(handle));
        Ok(HandleId(self.entries.len() - 1))
    }

    /// The address of a live handle.
    pub fn address(&self, id: HandleId) -> Result<RawHandle> {
        match self.entries.get(id.0) {
            Some(Entry::Live(handle)) => Ok(handle.address()),
            Some(Entry::Consumed(kind)) => Err(Error::disposal_violation(
                kind,
                &format!("#{} used after disposal in scope '{}'", id.0, self.label),
            )),
            None => Err(Error::with_message_and_status(
                format!("Unknown handle #{} in scope '{}'", id.0, self.label),
                Status::InvalidArguments,
            )),
        }
    }

    /// Disposes one handle ahead of scope exit.
    ///
    /// Returns `false` when the handle was already disposed; the disposer
    /// never runs twice.
    pub fn dispose(&mut self, id: HandleId) -> bool {
        let Some(entry) = self.entries.get_mut(id.0) else {
            return false;
        };
        match entry {
            Entry::Live(handle) => {
                let kind = handle.kind();
                if let Entry::Live(handle) = std::mem::replace(entry, Entry::Consumed(kind)) {
                    handle.dispose();
                    self.disposed += 1;
                }
                true
            }
            Entry::Consumed(kind) => {
                warn!(kind = *kind, scope = self.label, "handle disposed twice, ignoring");
                false
            }
        }
    }

    /// Runs `f` with a child scope. Everything the child acquired is
    /// disposed before this returns, whatever `f` returned.
    pub fn nested<T, F>(&mut self, label: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut ResourceScope) -> Result<T>,
    {
        let mut child = ResourceScope {
            label,
            depth: self.depth + 1,
            entries: Vec::new(),
            disposed: 0,
        };
        let outcome = f(&mut child);
        drop(child);
        outcome
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of handles acquired so far.
    pub fn acquired(&self) -> usize {
        self.entries.len()
    }

    /// Number of handles already disposed.
    pub fn disposed(&self) -> usize {
        self.disposed
    }

    /// Number of handles still waiting for disposal.
    pub fn live(&self) -> usize {
        self.acquired() - self.disposed()
    }

    /// Ends the scope now. Same as dropping it.
    pub fn close(self) {}
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        if self.live() > 0 {
            trace!(scope = self.label, depth = self.depth, live = self.live(), "closing scope");
        }
        for entry in self.entries.iter_mut().rev() {
            if let Entry::Live(handle) = entry {
                let kind = handle.kind();
                if let Entry::Live(handle) = std::mem::replace(entry, Entry::Consumed(kind)) {
                    handle.dispose();
                    self.disposed += 1;
                }
            }
        }
    }
}

struct SharedEntry {
    handle: Option<NativeHandle>,
    // Dropped after `handle` is disposed, see `Drop for SharedEntry`.
    parent: Option<SharedHandle>,
}

impl Drop for SharedEntry {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.dispose();
        }
    }
}

// SAFETY: the engine allows a handle to be released from any thread once no
// other thread uses it, which the reference count guarantees.
unsafe impl Send for SharedEntry {}
// SAFETY: shared access only reads the address; all reads of the memory
// behind it go through read-only views.
unsafe impl Sync for SharedEntry {}

/// A reference counted native handle.
///
/// The handle is disposed when the last clone is dropped. There is no
/// ordering guarantee with respect to unrelated handles; use
/// [SharedHandle::dispose_now] or a [ResourceScope] for deterministic
/// release.
#[derive(Clone)]
pub struct SharedHandle {
    inner: Arc<SharedEntry>,
}

impl SharedHandle {
    /// Acquires a handle through `create`, which receives the output slot.
    ///
    /// If `create` fails after writing an address into the slot, that
    /// address is disposed before the error is returned. This covers engine
    /// calls that allocate their output before failing, and calls such as
    /// query and appender creation whose output must be destroyed even on
    /// failure. `create` must therefore read any error text it needs from the
    /// handle before returning.
    pub fn acquire<F>(
        kind: &'static str,
        disposer: Disposer,
        parent: Option<&SharedHandle>,
        create: F,
    ) -> Result<Self>
    where
        F: FnOnce(&mut RawHandle) -> Result<()>,
    {
        let handle = create_handle(kind, disposer, create)?;
        Ok(Self {
            inner: Arc::new(SharedEntry {
                handle: Some(handle),
                parent: parent.cloned(),
            }),
        })
    }

    pub fn address(&self) -> RawHandle {
        self.inner
            .handle
            .as_ref()
            .map(NativeHandle::address)
            .unwrap_or(null_mut())
    }

    pub fn kind(&self) -> &'static str {
        self.inner
            .handle
            .as_ref()
            .map(NativeHandle::kind)
            .unwrap_or("released")
    }

    pub fn parent(&self) -> Option<&SharedHandle> {
        self.inner.parent.as_ref()
    }

    /// Number of live references, views included.
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Disposes the handle immediately.
    ///
    /// Fails with [Status::ResourceDisposalViolation] if views or other
    /// clones still reference the handle; nothing is released in that case.
    pub fn dispose_now(self) -> Result<()> {
        let kind = self.kind();
        match Arc::try_unwrap(self.inner) {
            Ok(entry) => {
                drop(entry);
                Ok(())
            }
            Err(inner) => Err(Error::disposal_violation(
                kind,
                &format!(
                    "disposed while {} other references are alive",
                    Arc::strong_count(&inner) - 1
                ),
            )),
        }
    }
}

impl std::fmt::Debug for SharedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedHandle")
            .field("kind", &self.kind())
            .field("address", &self.address())
            .field("references", &self.reference_count())
            .finish()
    }
}
