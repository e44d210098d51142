use super::event::Event;
use super::poller::Poller;
use crate::error::Result;
use crate::runtime::Runtime;
use crate::utils::Slab;

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::Duration;

/// Callback invoked by the event loop when a registered descriptor becomes
/// readable.
///
/// Returning `false` asks the loop to stop monitoring the descriptor.
pub trait FileHandler {
    /// Handles a readability notification.
    fn read_notify(&self, rt: &Runtime) -> bool;
}

/// Handle to a registration, returned by [`EventLoop::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(pub(crate) usize);

/// A registered descriptor and the handler to call for it.
struct Registration {
    fd: RawFd,
    handler: Rc<dyn FileHandler>,
}

/// Single-threaded readiness event loop.
///
/// The loop owns a platform poller and a slab of registrations whose indices
/// are the poller tokens. Every method takes `&self`: handlers run inline in
/// [`turn`](Self::turn) and are free to register, deregister or forget
/// descriptors, including their own, while the turn is in progress.
pub struct EventLoop {
    /// Platform poller (epoll or poll).
    poller: Poller,

    /// Registered descriptors indexed by token.
    registrations: RefCell<Slab<Registration>>,

    /// Buffer reused between turns.
    events: RefCell<Vec<Event>>,
}

impl EventLoop {
    /// Creates an event loop collecting at most `capacity` events per turn.
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        Ok(Self {
            poller: Poller::new(capacity)?,
            registrations: RefCell::new(Slab::new(capacity)),
            events: RefCell::new(Vec::with_capacity(capacity)),
        })
    }

    /// Starts monitoring `fd` for readability.
    ///
    /// The descriptor stays registered until [`deregister`](Self::deregister)
    /// or [`forget`](Self::forget) is called, or until `handler` returns
    /// `false` from a notification.
    pub fn register(&self, fd: RawFd, handler: Rc<dyn FileHandler>) -> Result<Token> {
        let token = self
            .registrations
            .borrow_mut()
            .insert(Registration { fd, handler });

        if let Err(err) = self.poller.register(fd, token) {
            self.registrations.borrow_mut().remove(token);
            return Err(err.into());
        }

        tracing::trace!(message = "event loop: registered", fd, token);
        Ok(Token(token))
    }

    /// Stops monitoring the descriptor behind `token`.
    ///
    /// Returns `false` if the token was not registered. Kernel-side failures
    /// (descriptor already closed) are logged and otherwise ignored.
    pub fn deregister(&self, token: Token) -> bool {
        let Some(registration) = self.registrations.borrow_mut().remove(token.0) else {
            return false;
        };

        if let Err(err) = self.poller.deregister(registration.fd) {
            tracing::debug!(
                message = "event loop: poller deregistration failed",
                fd = registration.fd,
                token = token.0,
                error = %err
            );
        }

        tracing::trace!(message = "event loop: deregistered", fd = registration.fd, token = token.0);
        true
    }

    /// Drops the registration without issuing a syscall.
    ///
    /// Used when the descriptor is already closed: the kernel has removed it
    /// from the interest list, and its number may have been reused.
    pub fn forget(&self, token: Token) -> bool {
        let Some(registration) = self.registrations.borrow_mut().remove(token.0) else {
            return false;
        };

        self.poller.forget(registration.fd, token.0);

        tracing::trace!(message = "event loop: forgotten", fd = registration.fd, token = token.0);
        true
    }

    /// Returns `true` if `token` is currently registered.
    pub fn is_registered(&self, token: Token) -> bool {
        self.registrations.borrow().contains(token.0)
    }

    /// Descriptor registered under `token`.
    pub fn fd(&self, token: Token) -> Option<RawFd> {
        self.registrations.borrow().get(token.0).map(|r| r.fd)
    }

    /// Number of active registrations.
    pub fn len(&self) -> usize {
        self.registrations.borrow().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs one poll cycle.
    ///
    /// Blocks for at most `timeout` (forever if `None`), then invokes the
    /// handler of every readable registration once. Events whose token was
    /// deregistered earlier in the same turn are skipped. Returns the number
    /// of handlers invoked.
    pub(crate) fn turn(&self, rt: &Runtime, timeout: Option<Duration>) -> Result<usize> {
        let mut events = self.events.take();

        if let Err(err) = self.poller.poll(&mut events, timeout) {
            self.events.replace(events);
            return Err(err.into());
        }

        let mut dispatched = 0;

        for event in events.iter().filter(|e| e.readable) {
            let handler = match self.registrations.borrow().get(event.token) {
                Some(registration) => Rc::clone(&registration.handler),
                None => {
                    tracing::trace!(message = "event loop: stale event", token = event.token);
                    continue;
                }
            };

            dispatched += 1;

            if !handler.read_notify(rt) {
                self.remove_if_current(event.token, &handler);
            }
        }

        self.events.replace(events);
        Ok(dispatched)
    }

    /// Deregisters `token` only if it still belongs to `handler`.
    ///
    /// The handler may already have removed itself, and the slot may have
    /// been handed to someone else in the meantime.
    fn remove_if_current(&self, token: usize, handler: &Rc<dyn FileHandler>) {
        let current = self
            .registrations
            .borrow()
            .get(token)
            .is_some_and(|r| std::ptr::addr_eq(Rc::as_ptr(&r.handler), Rc::as_ptr(handler)));

        if current {
            self.deregister(Token(token));
        }
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registrations = self.registrations.borrow();
        let fds: Vec<_> = registrations.iter().map(|(t, r)| (t, r.fd)).collect();

        f.debug_struct("EventLoop")
            .field("registrations", &fds)
            .finish()
    }
}
