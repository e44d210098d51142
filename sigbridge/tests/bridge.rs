use pretty_assertions::assert_eq;
use sigbridge::reactor::FileHandler;
use sigbridge::{
    BridgePhase, Error, LogicalHandler, Notification, Runtime, RuntimeBuilder, SocketHandle,
    SocketId,
};

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

type Log = Rc<RefCell<Vec<(&'static str, u64)>>>;

/// Records every notification it receives under its name.
struct Recorder {
    name: &'static str,
    log: Log,
    keep: bool,
}

impl Recorder {
    fn new(name: &'static str, log: &Log) -> Rc<Self> {
        Rc::new(Self {
            name,
            log: Rc::clone(log),
            keep: true,
        })
    }

    fn stopping(name: &'static str, log: &Log) -> Rc<Self> {
        Rc::new(Self {
            name,
            log: Rc::clone(log),
            keep: false,
        })
    }
}

impl LogicalHandler for Recorder {
    fn handle_readiness(&self, _rt: &Runtime, notification: &Notification) -> bool {
        self.log.borrow_mut().push((self.name, notification.units));
        self.keep
    }
}

fn runtime() -> Runtime {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();

    RuntimeBuilder::new().build().unwrap()
}

fn poll(rt: &Runtime) -> usize {
    rt.turn(Some(Duration::from_millis(50))).unwrap()
}

#[test]
fn test_get_or_create_is_idempotent() {
    let rt = runtime();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();

    let first = rt
        .get_or_create_bridge(Recorder::new("h1", &log), &socket)
        .unwrap();
    let second = rt
        .get_or_create_bridge(Recorder::new("other", &log), &socket)
        .unwrap();

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(rt.event_loop().len(), 1);
    assert_eq!(rt.bridges().len(), 1);
    assert_eq!(first.phase(), BridgePhase::Bound);

    // The second initial handler is ignored.
    socket.signaller().signal();
    assert_eq!(poll(&rt), 1);
    assert_eq!(*log.borrow(), vec![("h1", 1)]);
}

#[test]
fn test_three_units_before_poll_yield_one_dispatch() {
    let rt = runtime();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();
    rt.get_or_create_bridge(Recorder::new("h", &log), &socket)
        .unwrap();

    let signaller = socket.signaller();
    for _ in 0..3 {
        assert!(signaller.signal());
    }

    assert_eq!(poll(&rt), 1);
    assert_eq!(*log.borrow(), vec![("h", 3)]);

    // Drained: no further wakeup.
    assert_eq!(rt.turn(Some(Duration::ZERO)).unwrap(), 0);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_retarget_is_observed_by_next_notify() {
    let rt = runtime();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();
    let bridge = rt
        .get_or_create_bridge(Recorder::new("h1", &log), &socket)
        .unwrap();

    socket.signaller().signal();
    poll(&rt);

    bridge
        .set_current_handler(Recorder::new("h2", &log))
        .unwrap();

    socket.signaller().signal();
    poll(&rt);
    socket.signaller().signal();
    poll(&rt);

    assert_eq!(*log.borrow(), vec![("h1", 1), ("h2", 1), ("h2", 1)]);
    assert_eq!(rt.event_loop().len(), 1);
}

/// Handshake handler that hands the socket over to `next` on first contact.
struct Handshake {
    log: Log,
    next: RefCell<Option<Rc<dyn LogicalHandler>>>,
}

impl LogicalHandler for Handshake {
    fn handle_readiness(&self, rt: &Runtime, notification: &Notification) -> bool {
        self.log.borrow_mut().push(("handshake", notification.units));

        if let Some(next) = self.next.borrow_mut().take() {
            rt.bridge(notification.socket)
                .expect("bridge is live during dispatch")
                .set_current_handler(next)
                .unwrap();
        }

        true
    }
}

#[test]
fn test_handler_can_retarget_from_inside_dispatch() {
    let rt = runtime();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();

    let steady: Rc<dyn LogicalHandler> = Recorder::new("steady", &log);
    let handshake = Rc::new(Handshake {
        log: Rc::clone(&log),
        next: RefCell::new(Some(steady)),
    });

    rt.get_or_create_bridge(handshake, &socket).unwrap();

    for _ in 0..3 {
        socket.signaller().signal();
        poll(&rt);
    }

    assert_eq!(
        *log.borrow(),
        vec![("handshake", 1), ("steady", 1), ("steady", 1)]
    );
}

#[test]
fn test_teardown_suppresses_pending_signal() {
    let rt = runtime();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();
    let bridge = rt
        .get_or_create_bridge(Recorder::new("h", &log), &socket)
        .unwrap();

    socket.signaller().signal();
    assert!(rt.teardown(socket.id()));
    assert!(!rt.teardown(socket.id()));

    assert_eq!(rt.turn(Some(Duration::from_millis(10))).unwrap(), 0);
    assert!(log.borrow().is_empty());
    assert!(rt.event_loop().is_empty());
    assert!(rt.bridge(socket.id()).is_none());
    assert!(bridge.is_torn_down());
    assert_eq!(bridge.token(), None);
    assert!(bridge.current_handler().is_none());

    // A stale invocation is a no-op that asks to stop monitoring.
    assert!(!bridge.read_notify(&rt));
    assert!(log.borrow().is_empty());

    let err = bridge
        .set_current_handler(Recorder::new("late", &log))
        .unwrap_err();
    assert!(matches!(err, Error::TornDown(id) if id == socket.id()));
}

#[test]
fn test_spurious_wakeup_skips_handler() {
    let rt = runtime();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();
    let bridge = rt
        .get_or_create_bridge(Recorder::new("h", &log), &socket)
        .unwrap();

    assert!(bridge.read_notify(&rt));
    assert!(log.borrow().is_empty());
    assert_eq!(bridge.phase(), BridgePhase::Bound);
}

#[test]
fn test_false_verdict_tears_bridge_down() {
    let rt = runtime();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();
    let bridge = rt
        .get_or_create_bridge(Recorder::stopping("h", &log), &socket)
        .unwrap();

    socket.signaller().signal();
    assert_eq!(poll(&rt), 1);

    assert!(bridge.is_torn_down());
    assert!(rt.bridges().is_empty());
    assert!(rt.event_loop().is_empty());

    socket.signaller().signal();
    assert_eq!(rt.turn(Some(Duration::ZERO)).unwrap(), 0);
    assert_eq!(*log.borrow(), vec![("h", 1)]);

    // A fresh bridge can be created for the socket afterwards.
    let again = rt
        .get_or_create_bridge(Recorder::new("h2", &log), &socket)
        .unwrap();
    assert!(!Rc::ptr_eq(&bridge, &again));
    assert_eq!(poll(&rt), 1);
    assert_eq!(log.borrow().last(), Some(&("h2", 1)));
}

/// Tears down a peer socket's bridge when notified.
struct Closer {
    peer: SocketId,
    log: Log,
}

impl LogicalHandler for Closer {
    fn handle_readiness(&self, rt: &Runtime, _notification: &Notification) -> bool {
        self.log.borrow_mut().push(("closer", 1));
        rt.teardown(self.peer);
        true
    }
}

#[test]
fn test_teardown_during_turn_drops_peer_event() {
    let rt = runtime();
    let log = Log::default();
    let a = SocketHandle::new().unwrap();
    let b = SocketHandle::new().unwrap();

    let closer_a = Rc::new(Closer {
        peer: b.id(),
        log: Rc::clone(&log),
    });
    let closer_b = Rc::new(Closer {
        peer: a.id(),
        log: Rc::clone(&log),
    });

    rt.get_or_create_bridge(closer_a, &a).unwrap();
    rt.get_or_create_bridge(closer_b, &b).unwrap();

    a.signaller().signal();
    b.signaller().signal();

    // Give both descriptors a chance to be reported in the same turn.
    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(poll(&rt), 1);

    assert_eq!(log.borrow().len(), 1);
    assert_eq!(rt.bridges().len(), 1);
    assert_eq!(rt.event_loop().len(), 1);
}

/// Looks up another socket's bridge from two call sites in one dispatch.
struct Spawner {
    target: SocketHandle,
    log: Log,
}

impl LogicalHandler for Spawner {
    fn handle_readiness(&self, rt: &Runtime, _notification: &Notification) -> bool {
        let first = rt
            .get_or_create_bridge(Recorder::new("first", &self.log), &self.target)
            .unwrap();
        let second = rt
            .get_or_create_bridge(Recorder::new("second", &self.log), &self.target)
            .unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        true
    }
}

#[test]
fn test_concurrent_lookups_in_one_turn_register_once() {
    let rt = runtime();
    let log = Log::default();
    let trigger = SocketHandle::new().unwrap();
    let target = SocketHandle::new().unwrap();
    let target_id = target.id();
    let target_signaller = target.signaller();

    let spawner = Rc::new(Spawner {
        target,
        log: Rc::clone(&log),
    });
    rt.get_or_create_bridge(spawner, &trigger).unwrap();

    trigger.signaller().signal();
    assert_eq!(poll(&rt), 1);

    assert_eq!(rt.event_loop().len(), 2);
    assert!(rt.bridges().contains(target_id));

    target_signaller.signal();
    assert_eq!(poll(&rt), 1);
    assert_eq!(*log.borrow(), vec![("first", 1)]);
}

#[test]
fn test_close_socket_deregisters_then_closes() {
    let rt = runtime();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();
    let signaller = socket.signaller();
    rt.get_or_create_bridge(Recorder::new("h", &log), &socket)
        .unwrap();

    rt.close_socket(socket);

    assert!(rt.bridges().is_empty());
    assert!(rt.event_loop().is_empty());
    assert!(!signaller.signal());
}

#[test]
fn test_closed_socket_cannot_get_a_bridge() {
    let rt = runtime();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();
    let channel = std::sync::Arc::clone(sigbridge::SignalSource::signal_channel(&socket));
    channel.close();

    let err = rt
        .get_or_create_bridge(Recorder::new("h", &log), &socket)
        .unwrap_err();

    assert!(matches!(err, Error::ChannelClosed(id) if id == socket.id()));
    assert!(rt.event_loop().is_empty());
}

#[test]
fn test_purge_orphans_removes_dropped_sockets() {
    let rt = runtime();
    let log = Log::default();
    let kept = SocketHandle::new().unwrap();
    let dropped = SocketHandle::new().unwrap();

    rt.get_or_create_bridge(Recorder::new("kept", &log), &kept)
        .unwrap();
    let orphan = rt
        .get_or_create_bridge(Recorder::new("dropped", &log), &dropped)
        .unwrap();

    drop(dropped);

    assert!(orphan.is_orphaned());
    assert_eq!(rt.bridges().purge_orphans(rt.event_loop()), 1);
    assert_eq!(rt.bridges().ids(), vec![kept.id()]);
    assert_eq!(rt.event_loop().len(), 1);
}

#[test]
fn test_reused_identity_replaces_orphaned_bridge() {
    let rt = runtime();
    let log = Log::default();
    let id = SocketId::from_raw(7);

    let first = SocketHandle::with_id(id).unwrap();
    let stale = rt
        .get_or_create_bridge(Recorder::new("old", &log), &first)
        .unwrap();
    drop(first);

    let second = SocketHandle::with_id(id).unwrap();
    let bridge = rt
        .get_or_create_bridge(Recorder::new("new", &log), &second)
        .unwrap();

    assert!(!Rc::ptr_eq(&stale, &bridge));
    assert_eq!(stale.phase(), BridgePhase::TornDown);
    assert_eq!(bridge.phase(), BridgePhase::Bound);
    assert_eq!(rt.bridges().len(), 1);
    assert_eq!(rt.event_loop().len(), 1);

    assert!(second.signaller().signal());
    assert_eq!(poll(&rt), 1);
    assert_eq!(*log.borrow(), vec![("new", 1)]);
}

#[test]
fn test_turn_drops_bridges_of_dropped_sockets() {
    let rt = runtime();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();
    let id = socket.id();

    rt.get_or_create_bridge(Recorder::new("h", &log), &socket)
        .unwrap();
    socket.signaller().signal();
    drop(socket);

    assert_eq!(rt.turn(Some(Duration::ZERO)).unwrap(), 0);
    assert!(!rt.bridges().contains(id));
    assert!(rt.event_loop().is_empty());
    assert!(log.borrow().is_empty());
}

#[test]
fn test_run_returns_after_only_socket_is_dropped() {
    let rt = RuntimeBuilder::new()
        .poll_timeout(Some(Duration::from_millis(10)))
        .build()
        .unwrap();
    let log = Log::default();
    let socket = SocketHandle::new().unwrap();

    rt.get_or_create_bridge(Recorder::new("h", &log), &socket)
        .unwrap();
    drop(socket);

    assert_eq!(rt.run().unwrap(), 0);
    assert!(rt.bridges().is_empty());
    assert!(rt.event_loop().is_empty());
}

#[test]
fn test_closure_handlers_and_stop() {
    let rt = RuntimeBuilder::new()
        .poll_timeout(Some(Duration::from_millis(20)))
        .build()
        .unwrap();
    let socket = SocketHandle::new().unwrap();

    let handler = Rc::new(|rt: &Runtime, n: &Notification| {
        assert_eq!(n.units, 1);
        rt.stop();
        true
    });
    rt.get_or_create_bridge(handler, &socket).unwrap();

    socket.signaller().signal();
    assert_eq!(rt.run().unwrap(), 1);
    assert_eq!(rt.bridges().len(), 1);
}
