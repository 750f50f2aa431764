//! Receive loop and rate sampler
//!
//! Both run on their own threads while a session is PLAYING and are governed
//! by a stop channel: dropping the sender wakes any wait immediately, and
//! `stop` joins the thread, so once it returns no iteration is in flight and
//! none will start.

use crate::config::SessionConfig;
use crate::pipeline::{FrameSink, Pipeline};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rtsp_io::{DataSocket, SocketError, Timer};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// State shared between the control plane and the workers
pub(crate) struct Shared {
    pub(crate) pipeline: Mutex<Pipeline>,
    pub(crate) sink: Mutex<Box<dyn FrameSink>>,
}

impl Shared {
    pub(crate) fn new(pipeline: Pipeline, sink: Box<dyn FrameSink>) -> Self {
        Shared {
            pipeline: Mutex::new(pipeline),
            sink: Mutex::new(sink),
        }
    }
}

/// Outcome of one receive-loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Poll {
    Continue,
    Finished,
}

/// A cancellable background thread
struct Worker {
    name: &'static str,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn<F>(name: &'static str, body: F) -> io::Result<Self>
    where
        F: FnOnce(Receiver<()>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel::bounded(0);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop_rx))?;

        Ok(Worker {
            name,
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Signal the worker and wait for it to exit
    fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(worker = self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Running receive loop plus rate sampler for one PLAYING period
pub(crate) struct StreamReceiver {
    receive_loop: Worker,
    sampler: Worker,
}

impl StreamReceiver {
    pub(crate) fn start(
        socket: Arc<DataSocket>,
        shared: Arc<Shared>,
        config: &SessionConfig,
    ) -> io::Result<Self> {
        let loop_shared = Arc::clone(&shared);
        let min_interval = config.min_poll_interval;
        let max_datagram = config.max_datagram_size;
        let receive_loop = Worker::spawn("rtsp-receive", move |stop| {
            run_receive_loop(&socket, &loop_shared, &stop, min_interval, max_datagram)
        })?;

        let sample_interval = config.sample_interval;
        let sampler = Worker::spawn("rtsp-rate-sampler", move |stop| {
            run_rate_sampler(&shared, &stop, sample_interval)
        })?;

        debug!("receive loop started");
        Ok(StreamReceiver {
            receive_loop,
            sampler,
        })
    }

    /// Whether the receive loop is still reading (it exits on its own when
    /// the stream goes idle)
    pub(crate) fn is_receiving(&self) -> bool {
        self.receive_loop.is_running()
    }

    /// Stop both workers; blocks until they have exited
    pub(crate) fn stop(mut self) {
        self.receive_loop.stop();
        self.sampler.stop();
        debug!("receive loop stopped");
    }
}

fn run_receive_loop(
    socket: &DataSocket,
    shared: &Shared,
    stop: &Receiver<()>,
    min_interval: Duration,
    max_datagram: usize,
) {
    let mut buf = vec![0u8; max_datagram];
    let mut pacer = Timer::new(min_interval);

    loop {
        pacer.reset();
        if poll_once(socket, shared, &mut buf) == Poll::Finished {
            return;
        }

        match stop.recv_timeout(pacer.time_until_expiration()) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn poll_once(socket: &DataSocket, shared: &Shared, buf: &mut [u8]) -> Poll {
    let received = socket.recv(buf);
    on_receive(received, buf, shared)
}

/// Act on one read result; transient failures keep the loop going
fn on_receive(received: Result<usize, SocketError>, buf: &[u8], shared: &Shared) -> Poll {
    match received {
        Ok(n) => {
            let released = shared.pipeline.lock().on_datagram(&buf[..n]);
            if let Some(frame) = released {
                shared.sink.lock().on_frame(frame);
            }
            Poll::Continue
        }
        Err(SocketError::Timeout) => {
            let (frames, report) = shared.pipeline.lock().finish();
            let mut sink = shared.sink.lock();
            for frame in frames {
                sink.on_frame(frame);
            }
            sink.on_stream_end(&report);
            Poll::Finished
        }
        Err(e) => {
            warn!(error = %e, "data socket read failed");
            Poll::Continue
        }
    }
}

fn run_rate_sampler(shared: &Shared, stop: &Receiver<()>, interval: Duration) {
    let mut timer = Timer::new(interval);

    loop {
        match stop.recv_timeout(timer.time_until_expiration()) {
            Err(RecvTimeoutError::Timeout) => {
                if timer.try_fire() {
                    shared.pipeline.lock().sample_rate();
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
