//! The thread-registration protocol.
//!
//! The core offers this as an *optional* helper: it operates on a
//! caller-supplied pointer-to-pointer to a [`MapNode`], which a caller is
//! free to park in thread-local storage (see the module-level doc example
//! below). [`register_into`]/[`unregister_from`] are the literal ABI —
//! unsafe free functions mirroring what a C caller would link against.
//! [`Registration`] is the safe wrapper everything else in this crate uses.
//!
//! ```rust,ignore
//! use std::cell::Cell;
//! use mcdb::registration::{register_into, unregister_from};
//! use mcdb::flags::RegisterFlags;
//! use mcdb::node::MapNode;
//! thread_local! {
//!     static CURRENT: Cell<*mut MapNode> = Cell::new(std::ptr::null_mut());
//! }
//! // A caller wiring the raw ABI into TLS would, on each lookup, load the
//! // cell, `register_into` it if it differs from the handle's newest node,
//! // perform lookups, then `unregister_from` before the thread exits.
//! ```

use std::sync::atomic::Ordering;

use crate::flags::RegisterFlags;
use crate::map::{self, Handle};
use crate::node::MapNode;

/// Registers `*slot` against the newest node reachable from its current
/// value, incrementing that node's reference count and rewriting `*slot` to
/// point there. If `flags` contains [`RegisterFlags::USE_DECR`]
/// this instead delegates to [`unregister_from`].
///
/// # Safety
///
/// `*slot` must be a non-null pointer into a chain whose nodes are all still
/// live (none has been freed). The caller must not dereference any node this
/// call walks past and releases no reference on.
pub unsafe fn register_into(slot: &mut *mut MapNode, flags: RegisterFlags) {
    if flags.contains(RegisterFlags::USE_DECR) {
        unregister_from(slot, flags);
        return;
    }
    let newest = map::newest(*slot);
    unsafe {
        (*newest).refcnt.fetch_add(1, Ordering::AcqRel);
    }
    *slot = newest;
}

/// Releases the reference `*slot` holds. If the node's refcount reaches
/// zero and it has been superseded (has a non-null `next`), it is unmapped
/// and freed — unless `flags` contains [`RegisterFlags::MUNMAP_SKIP`], in
/// which case the caller has taken responsibility for the region itself.
///
/// # Safety
///
/// `*slot` must be a non-null pointer to a node this caller holds a
/// registered reference against. After this call the caller must not
/// dereference the old value of `*slot`.
pub unsafe fn unregister_from(slot: &mut *mut MapNode, flags: RegisterFlags) {
    let node = *slot;
    unsafe {
        let prev = (*node).refcnt.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev >= 1, "unregister_from: refcount underflow");
    }
    if !flags.contains(RegisterFlags::MUNMAP_SKIP) {
        try_retire(node);
    }
}

/// Frees `node` iff its refcount is zero and it has a successor — the
/// head of the chain is never freed this way. Safe to call speculatively —
/// most calls will find one or both conditions false and do nothing.
///
/// The `retired` flag resolves the race between a reader's `unregister`
/// and a concurrent `reopen`, which can both observe "refcount zero and
/// superseded" for the same node. Only the caller that wins the `swap`
/// actually frees it.
pub(crate) fn try_retire(node: *mut MapNode) {
    unsafe {
        let n = &*node;
        if n.refcnt.load(Ordering::Acquire) != 0 {
            return;
        }
        if n.next.load(Ordering::Acquire).is_null() {
            return;
        }
        if n.retired.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(Box::from_raw(node));
    }
}

/// A safe, RAII registration against one [`Handle`]'s version chain.
///
/// Bound to `'h` (the handle's lifetime) rather than to any particular
/// [`MapNode`], since a registration can move itself onto a newer node via
/// [`Registration::refresh`]. Dropping a `Registration` releases its
/// reference, unmapping the node if it was the last reader and it has since
/// been superseded.
pub struct Registration<'h> {
    handle: &'h Handle,
    node: *mut MapNode,
}

impl<'h> Registration<'h> {
    /// Registers against the newest node of `handle`'s chain.
    pub fn new(handle: &'h Handle) -> Registration<'h> {
        let mut ptr = handle.root_ptr();
        unsafe {
            register_into(&mut ptr, RegisterFlags::USE_INCR);
        }
        Registration { handle, node: ptr }
    }

    /// The node this registration currently holds a reference against.
    pub fn node(&self) -> &MapNode {
        unsafe { &*self.node }
    }

    /// A cursor bound to this registration's current node. The ordering
    /// guarantee that a `find_next` already in progress keeps observing its
    /// bound map until the cursor is discarded holds because the returned
    /// cursor borrows `self` — calling
    /// [`Registration::refresh`] while a cursor from an earlier call is
    /// still alive is a borrow-check error, not a runtime race.
    pub fn cursor(&self) -> crate::cursor::Cursor<'_> {
        crate::cursor::Cursor::new(self.node())
    }

    /// Catches this registration up to the handle's current state, as a
    /// reader should do before (or between) lookups to pick up a stale map.
    ///
    /// Two independent conditions are checked, cheapest first:
    ///
    /// 1. Has this registration's node already been superseded by a refresh
    ///    some *other* reader installed? If so, this call just walks the
    ///    existing chain onto the newest node — no syscall needed.
    /// 2. Otherwise, is this registration on the chain's newest node, and
    ///    has the file on disk itself changed? If so, this call installs the
    ///    new version (racing other readers if need be) before moving onto
    ///    it.
    ///
    /// Returns whether this registration moved to a different node. `false`
    /// covers both "already current" and "reopen failed" — the reader just
    /// keeps using its current, still-valid map.
    pub fn refresh(&mut self) -> crate::error::Result<bool> {
        let already_superseded = unsafe { !(*self.node).next.load(Ordering::Acquire).is_null() };
        if !already_superseded {
            if !self.handle.refresh_check() {
                return Ok(false);
            }
            let published = self.handle.reopen()?;
            // `reopen` returning false means either this call lost the
            // publish race to a concurrent refresh (in which case some
            // *other* successor now hangs off `self.node` and there is
            // still something to move onto) or the replacement file
            // genuinely failed to open/map (in which case nothing changed
            // at all). Re-check `self.node`'s own successor rather than
            // trusting `published` alone, since either failure mode
            // reports the same `false`.
            let superseded_after_call =
                unsafe { !(*self.node).next.load(Ordering::Acquire).is_null() };
            if !published && !superseded_after_call {
                return Ok(false);
            }
        }
        self.reregister();
        Ok(true)
    }

    fn reregister(&mut self) {
        let mut new_ptr = self.node;
        unsafe {
            register_into(&mut new_ptr, RegisterFlags::USE_INCR);
        }
        let old_ptr = std::mem::replace(&mut self.node, new_ptr);
        let mut old_ptr = old_ptr;
        unsafe {
            unregister_from(&mut old_ptr, RegisterFlags::USE_DECR);
        }
    }
}

impl<'h> Drop for Registration<'h> {
    fn drop(&mut self) {
        let mut ptr = self.node;
        unsafe {
            unregister_from(&mut ptr, RegisterFlags::USE_DECR);
        }
    }
}
