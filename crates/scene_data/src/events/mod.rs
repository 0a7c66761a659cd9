//! Synchronous event channels
//!
//! Key principles:
//! - The emitter owns the channel ([`Signal`]) and its ordered callback list
//! - Emission is immediate: every callback runs on the calling thread, in
//!   connection order, before [`Signal::emit`] returns
//! - [`Signal::connect`] returns a [`Connection`]; dropping it unregisters the
//!   callback
//!
//! Emission walks a snapshot of the callback list, so callbacks may connect,
//! disconnect or re-emit while an emission is in progress. A callback connected
//! during an emission is first called by the next one; a callback disconnected
//! during an emission is not called again.

use slotmap::{DefaultKey, SlotMap};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;

struct CallbackList<T: ?Sized> {
    slots: SlotMap<DefaultKey, Callback<T>>,
    order: Vec<DefaultKey>,
}

struct SignalInner<T: ?Sized> {
    callbacks: RefCell<CallbackList<T>>,
}

/// Type-erased view of a signal used by [`Connection`]
trait Disconnect {
    fn disconnect(&self, key: DefaultKey);
    fn contains(&self, key: DefaultKey) -> bool;
}

impl<T: ?Sized> Disconnect for SignalInner<T> {
    fn disconnect(&self, key: DefaultKey) {
        let mut callbacks = self.callbacks.borrow_mut();
        if callbacks.slots.remove(key).is_some() {
            callbacks.order.retain(|k| *k != key);
        }
    }

    fn contains(&self, key: DefaultKey) -> bool {
        self.callbacks.borrow().slots.contains_key(key)
    }
}

/// Event channel with an ordered list of callbacks
///
/// Cloning a signal yields another handle to the same channel.
pub struct Signal<T: ?Sized + 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: ?Sized + 'static> Signal<T> {
    /// Create a channel with no callbacks
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SignalInner {
                callbacks: RefCell::new(CallbackList {
                    slots: SlotMap::new(),
                    order: Vec::new(),
                }),
            }),
        }
    }

    /// Register a callback, called after every callback connected before it
    pub fn connect<F>(&self, callback: F) -> Connection
    where
        F: Fn(&T) + 'static,
    {
        let key = {
            let mut callbacks = self.inner.callbacks.borrow_mut();
            let key = callbacks.slots.insert(Rc::new(callback));
            callbacks.order.push(key);
            key
        };

        let signal: Weak<dyn Disconnect> = Rc::downgrade(&self.inner) as Weak<dyn Disconnect>;
        Connection { signal, key }
    }

    /// Call every connected callback with `args`
    pub fn emit(&self, args: &T) {
        let snapshot: Vec<(DefaultKey, Callback<T>)> = {
            let callbacks = self.inner.callbacks.borrow();
            callbacks
                .order
                .iter()
                .filter_map(|key| callbacks.slots.get(*key).map(|cb| (*key, Rc::clone(cb))))
                .collect()
        };

        for (key, callback) in snapshot {
            if self.inner.contains(key) {
                callback(args);
            }
        }
    }

    /// Number of connected callbacks
    pub fn num_callbacks(&self) -> usize {
        self.inner.callbacks.borrow().order.len()
    }

    /// Whether no callback is connected
    pub fn is_empty(&self) -> bool {
        self.num_callbacks() == 0
    }
}

impl<T: ?Sized + 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("callbacks", &self.num_callbacks())
            .finish()
    }
}

/// Subscription handle returned by [`Signal::connect`]
///
/// Dropping the handle unregisters the callback. A connection that outlives its
/// signal is inert.
#[must_use = "dropping a Connection immediately disconnects its callback"]
pub struct Connection {
    signal: Weak<dyn Disconnect>,
    key: DefaultKey,
}

impl Connection {
    /// Whether the callback is still registered on a live signal
    pub fn is_connected(&self) -> bool {
        self.signal
            .upgrade()
            .is_some_and(|signal| signal.contains(self.key))
    }

    /// Unregister the callback now
    pub fn disconnect(self) {
        drop(self);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.disconnect(self.key);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .finish()
    }
}
