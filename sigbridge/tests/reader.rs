use pretty_assertions::assert_eq;
use sigbridge::reader::{FrameDecoder, Inbox, ReaderExit, ReaderThread};
use sigbridge::{LogicalHandler, Notification, Runtime, RuntimeBuilder};

use std::cell::RefCell;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::{Duration, Instant};

type Frames = Rc<RefCell<Vec<(&'static str, Vec<u8>)>>>;

/// Drains the inbox and stops monitoring once the reader has finished.
struct Collector {
    name: &'static str,
    inbox: Inbox<Vec<u8>>,
    frames: Frames,
}

impl LogicalHandler for Collector {
    fn handle_readiness(&self, _rt: &Runtime, _notification: &Notification) -> bool {
        for frame in self.inbox.drain() {
            self.frames.borrow_mut().push((self.name, frame));
        }

        !self.inbox.is_closed()
    }
}

/// Accepts the first frame as a greeting, then hands over to `steady`.
struct Greeter {
    inbox: Inbox<Vec<u8>>,
    frames: Frames,
    steady: RefCell<Option<Rc<dyn LogicalHandler>>>,
}

impl LogicalHandler for Greeter {
    fn handle_readiness(&self, rt: &Runtime, notification: &Notification) -> bool {
        let Some(greeting) = self.inbox.pop() else {
            return true;
        };
        self.frames.borrow_mut().push(("greeter", greeting));

        if let Some(steady) = self.steady.borrow_mut().take() {
            rt.bridge(notification.socket)
                .unwrap()
                .set_current_handler(steady)
                .unwrap();
        }

        true
    }
}

fn write_frames(stream: &mut UnixStream, frames: &[&[u8]]) {
    for frame in frames {
        stream.write_all(&FrameDecoder::encode(frame).unwrap()).unwrap();
    }
}

/// Turns the runtime until `done` holds or two seconds pass.
fn drive(rt: &Runtime, done: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);

    while !done() && Instant::now() < deadline {
        rt.turn(Some(Duration::from_millis(20))).unwrap();
    }
}

#[test]
fn test_frames_reach_handler_in_order() {
    let rt = RuntimeBuilder::new().build().unwrap();
    let (mut writer, reader) = UnixStream::pair().unwrap();
    let (socket, inbox, thread) = ReaderThread::spawn(reader, FrameDecoder::new()).unwrap();
    assert_eq!(thread.socket_id(), socket.id());

    let frames = Frames::default();
    rt.get_or_create_bridge(
        Rc::new(Collector {
            name: "collector",
            inbox: inbox.clone(),
            frames: Rc::clone(&frames),
        }),
        &socket,
    )
    .unwrap();

    write_frames(&mut writer, &[b"one", b"two", b"three"]);

    // Let the reader decode and signal all three before the loop polls.
    let deadline = Instant::now() + Duration::from_secs(2);
    while inbox.len() < 3 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    std::thread::sleep(Duration::from_millis(20));

    assert_eq!(rt.turn(Some(Duration::from_millis(100))).unwrap(), 1);

    let payloads: Vec<_> = frames.borrow().iter().map(|(_, f)| f.clone()).collect();
    assert_eq!(payloads, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);

    // Everything drained: the next turn sees no wakeup.
    assert_eq!(rt.turn(Some(Duration::from_millis(20))).unwrap(), 0);

    drop(writer);
    drive(&rt, || rt.bridges().is_empty());

    assert!(rt.bridges().is_empty());
    assert!(rt.event_loop().is_empty());
    assert!(inbox.is_closed());
    assert!(matches!(thread.join(), ReaderExit::Eof));
}

#[test]
fn test_handshake_then_steady_state() {
    let rt = RuntimeBuilder::new().build().unwrap();
    let (mut writer, reader) = UnixStream::pair().unwrap();
    let (socket, inbox, thread) = ReaderThread::spawn(reader, FrameDecoder::new()).unwrap();

    let frames = Frames::default();
    let steady: Rc<dyn LogicalHandler> = Rc::new(Collector {
        name: "steady",
        inbox: inbox.clone(),
        frames: Rc::clone(&frames),
    });
    let greeter = Rc::new(Greeter {
        inbox: inbox.clone(),
        frames: Rc::clone(&frames),
        steady: RefCell::new(Some(steady)),
    });
    rt.get_or_create_bridge(greeter, &socket).unwrap();

    write_frames(&mut writer, &[b"HELLO"]);
    drive(&rt, || frames.borrow().len() == 1);

    write_frames(&mut writer, &[b"a", b"b"]);
    drive(&rt, || frames.borrow().len() == 3);

    assert_eq!(
        *frames.borrow(),
        vec![
            ("greeter", b"HELLO".to_vec()),
            ("steady", b"a".to_vec()),
            ("steady", b"b".to_vec()),
        ]
    );

    drop(writer);
    drive(&rt, || rt.bridges().is_empty());
    assert!(matches!(thread.join(), ReaderExit::Eof));
}

#[test]
fn test_reader_stops_after_socket_closed() {
    let rt = RuntimeBuilder::new().build().unwrap();
    let (mut writer, reader) = UnixStream::pair().unwrap();
    let (socket, inbox, thread) = ReaderThread::spawn(reader, FrameDecoder::new()).unwrap();

    let frames = Frames::default();
    rt.get_or_create_bridge(
        Rc::new(Collector {
            name: "collector",
            inbox: inbox.clone(),
            frames: Rc::clone(&frames),
        }),
        &socket,
    )
    .unwrap();

    rt.close_socket(socket);
    assert!(rt.event_loop().is_empty());

    // The reader decodes this frame, fails to signal and exits.
    write_frames(&mut writer, &[b"late"]);

    assert!(matches!(thread.join(), ReaderExit::Closed));
    assert!(inbox.is_closed());
    assert_eq!(inbox.drain(), vec![b"late".to_vec()]);
    assert!(frames.borrow().is_empty());
}

#[test]
fn test_oversized_frame_fails_reader() {
    let rt = RuntimeBuilder::new().build().unwrap();
    let (mut writer, reader) = UnixStream::pair().unwrap();
    let (socket, inbox, thread) =
        ReaderThread::spawn(reader, FrameDecoder::with_max_len(4)).unwrap();

    let frames = Frames::default();
    rt.get_or_create_bridge(
        Rc::new(Collector {
            name: "collector",
            inbox: inbox.clone(),
            frames: Rc::clone(&frames),
        }),
        &socket,
    )
    .unwrap();

    write_frames(&mut writer, &[b"ok", b"too long"]);
    drive(&rt, || rt.bridges().is_empty());

    assert_eq!(*frames.borrow(), vec![("collector", b"ok".to_vec())]);
    assert!(matches!(
        thread.join(),
        ReaderExit::Failed(sigbridge::Error::FrameTooLarge { len: 8, max: 4 })
    ));
}
