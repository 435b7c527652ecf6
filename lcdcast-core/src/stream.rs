use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::StreamConfig;
use crate::encode::encode_batch_into;
use crate::format::ChangeRecord;
use crate::handoff::ChangeReceiver;
use crate::stats::StreamStats;

/// Outbound datagram sink. Each call is one datagram.
pub trait Transport: Send {
    fn send_datagram(&mut self, payload: &[u8]) -> io::Result<()>;
}

/// Sends datagrams from an ephemeral local port to a fixed display address.
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral socket of the same address family as `target`.
    pub fn new(target: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Transport for UdpTransport {
    fn send_datagram(&mut self, payload: &[u8]) -> io::Result<()> {
        self.socket.send_to(payload, self.target).map(|_| ())
    }
}

/// Why batch collection ended for a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collect {
    /// The batch reached `max_block_size`.
    Full,
    /// `max_frame_time` ran out while records were still arriving.
    OutOfTime,
    /// Nothing arrived for a whole `pipe_timeout`.
    Underflow,
    /// The differ has gone away and the queue is drained.
    Closed,
}

/// What happened during one batch-and-send cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub records: usize,
    pub collect: Collect,
    pub sent: bool,
    pub elapsed: Duration,
}

/// Batches change records into datagrams and paces them to the refresh rate.
pub struct UpdateStreamer<T: Transport> {
    transport: T,
    pipe_timeout: Duration,
    max_frame_time: Duration,
    max_block_size: usize,
    period: Duration,
    verbose: bool,
    stats: Arc<StreamStats>,
    batch: Vec<ChangeRecord>,
    payload: String,
}

impl<T: Transport> UpdateStreamer<T> {
    pub fn new(transport: T, config: &StreamConfig, stats: Arc<StreamStats>) -> Self {
        Self {
            transport,
            pipe_timeout: config.pipe_timeout,
            max_frame_time: config.max_frame_time,
            max_block_size: config.max_block_size,
            period: config.cycle_period(),
            verbose: config.verbose,
            stats,
            batch: Vec::with_capacity(config.max_block_size),
            payload: String::new(),
        }
    }

    /// Collect one batch starting at `started`, bounded by size and time.
    ///
    /// A timed-out pop is an underflow only when nothing has arrived for a
    /// whole `pipe_timeout`; a budget that expires mid-trickle is `OutOfTime`.
    fn collect(&mut self, queue: &ChangeReceiver, started: Instant) -> Collect {
        self.batch.clear();
        let mut last_arrival = started;
        loop {
            if self.batch.len() >= self.max_block_size {
                return Collect::Full;
            }
            let remaining = self.max_frame_time.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Collect::OutOfTime;
            }
            let wait = remaining.min(self.pipe_timeout);
            match queue.recv_timeout(wait) {
                Ok(rec) => {
                    self.batch.push(rec);
                    last_arrival = Instant::now();
                }
                Err(RecvTimeoutError::Timeout) if last_arrival.elapsed() >= self.pipe_timeout => {
                    return Collect::Underflow
                }
                Err(RecvTimeoutError::Timeout) => return Collect::OutOfTime,
                Err(RecvTimeoutError::Disconnected) => return Collect::Closed,
            }
        }
    }

    /// Collect, serialize and transmit one batch. Does not sleep.
    ///
    /// An underflow still transmits (possibly an empty datagram). Once the
    /// queue is closed only a non-empty remainder is sent.
    pub fn run_cycle(&mut self, queue: &ChangeReceiver, started: Instant) -> CycleReport {
        let collect = self.collect(queue, started);

        if collect == Collect::Underflow {
            self.stats.record_underflow();
            if self.verbose {
                warn!(records = self.batch.len(), "change queue underflow");
            }
        }

        let sent = if collect == Collect::Closed && self.batch.is_empty() {
            false
        } else {
            encode_batch_into(&self.batch, &mut self.payload);
            match self.transport.send_datagram(self.payload.as_bytes()) {
                Ok(()) => {
                    self.stats.record_batch_sent();
                    true
                }
                Err(e) => {
                    self.stats.record_send_failure();
                    warn!(error = %e, records = self.batch.len(), "dropping batch, send failed");
                    false
                }
            }
        };

        CycleReport {
            records: self.batch.len(),
            collect,
            sent,
            elapsed: started.elapsed(),
        }
    }

    /// Streamer worker: run cycles until `stop` is set or the queue closes,
    /// sleeping off whatever is left of each `1 / refresh_rate` period.
    pub fn run(mut self, queue: ChangeReceiver, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            let started = Instant::now();
            let report = self.run_cycle(&queue, started);
            if report.collect == Collect::Closed {
                debug!("change queue closed, streamer exiting");
                break;
            }
            if let Some(rest) = self.period.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::format::Rgb565;
    use crate::handoff::change_queue;

    /// Records every datagram with the time it was sent.
    #[derive(Clone, Default)]
    pub(crate) struct Capture(pub Arc<Mutex<Vec<(Instant, String)>>>);

    impl Capture {
        pub(crate) fn payloads(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
        }
    }

    impl Transport for Capture {
        fn send_datagram(&mut self, payload: &[u8]) -> io::Result<()> {
            let text = String::from_utf8(payload.to_vec()).unwrap();
            self.0.lock().unwrap().push((Instant::now(), text));
            Ok(())
        }
    }

    struct Broken;

    impl Transport for Broken {
        fn send_datagram(&mut self, _: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "no display"))
        }
    }

    fn config() -> StreamConfig {
        StreamConfig {
            pipe_timeout: Duration::from_millis(20),
            max_frame_time: Duration::from_millis(50),
            max_block_size: 3,
            verbose: true,
            ..Default::default()
        }
    }

    #[test]
    fn batch_is_capped_at_block_size() {
        let (tx, rx) = change_queue();
        for x in 0..7 {
            tx.send(ChangeRecord::new(x, 0, Rgb565(x))).unwrap();
        }
        let capture = Capture::default();
        let mut streamer = UpdateStreamer::new(capture.clone(), &config(), Arc::default());

        let report = streamer.run_cycle(&rx, Instant::now());
        assert_eq!(report.collect, Collect::Full);
        assert_eq!(report.records, 3);
        streamer.run_cycle(&rx, Instant::now());
        let report = streamer.run_cycle(&rx, Instant::now());
        assert_eq!(report.records, 1);
        assert_eq!(report.collect, Collect::Underflow);

        assert_eq!(
            capture.payloads(),
            vec!["0.0.0#1.0.1#2.0.2", "3.0.3#4.0.4#5.0.5", "6.0.6"]
        );
    }

    #[test]
    fn underflow_sends_empty_datagram() {
        let (_tx, rx) = change_queue();
        let capture = Capture::default();
        let stats = Arc::new(StreamStats::default());
        let mut streamer = UpdateStreamer::new(capture.clone(), &config(), stats.clone());

        let report = streamer.run_cycle(&rx, Instant::now());
        assert_eq!(report.collect, Collect::Underflow);
        assert!(report.sent);
        assert_eq!(capture.payloads(), vec![String::new()]);
        assert_eq!(stats.snapshot().underflows, 1);
        assert_eq!(stats.snapshot().batches_sent, 1);
    }

    #[test]
    fn collection_never_exceeds_frame_time() {
        let (tx, rx) = change_queue();
        let config = StreamConfig {
            pipe_timeout: Duration::from_millis(200),
            max_frame_time: Duration::from_millis(40),
            max_block_size: 1000,
            ..Default::default()
        };
        let feeder = thread::spawn(move || {
            for i in 0..50u16 {
                if tx.send(ChangeRecord::new(i, 0, Rgb565(i))).is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(5));
            }
        });
        let stats = Arc::new(StreamStats::default());
        let mut streamer = UpdateStreamer::new(Capture::default(), &config, stats.clone());
        let report = streamer.run_cycle(&rx, Instant::now());
        assert_eq!(report.collect, Collect::OutOfTime);
        assert_eq!(stats.snapshot().underflows, 0);
        assert!(report.records > 0);
        assert!(report.elapsed < Duration::from_millis(40) + Duration::from_millis(30));
        drop(rx);
        feeder.join().unwrap();
    }

    #[test]
    fn steady_trickle_is_not_an_underflow() {
        let (tx, rx) = change_queue();
        // default 100ms pipe timeout and frame budget, one record every 30ms
        let config = StreamConfig::default();
        let feeder = thread::spawn(move || {
            for i in 0..40u16 {
                if tx.send(ChangeRecord::new(i % 160, 0, Rgb565(i))).is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(30));
            }
        });
        let stats = Arc::new(StreamStats::default());
        let mut streamer = UpdateStreamer::new(Capture::default(), &config, stats.clone());

        for _ in 0..5 {
            let report = streamer.run_cycle(&rx, Instant::now());
            assert_eq!(report.collect, Collect::OutOfTime);
            assert!(report.records > 0);
        }
        assert_eq!(stats.snapshot().underflows, 0);
        drop(rx);
        feeder.join().unwrap();
    }

    #[test]
    fn idle_queue_underflows_with_default_timeouts() {
        let (_tx, rx) = change_queue();
        let stats = Arc::new(StreamStats::default());
        let capture = Capture::default();
        let mut streamer = UpdateStreamer::new(capture.clone(), &StreamConfig::default(), stats.clone());

        let report = streamer.run_cycle(&rx, Instant::now());
        assert_eq!(report.collect, Collect::Underflow);
        assert_eq!(stats.snapshot().underflows, 1);
        assert_eq!(capture.payloads(), vec![String::new()]);
    }

    #[test]
    fn send_failure_is_counted_not_fatal() {
        let (tx, rx) = change_queue();
        tx.send(ChangeRecord::new(1, 2, Rgb565(3))).unwrap();
        let stats = Arc::new(StreamStats::default());
        let mut streamer = UpdateStreamer::new(Broken, &config(), stats.clone());

        let report = streamer.run_cycle(&rx, Instant::now());
        assert!(!report.sent);
        let report = streamer.run_cycle(&rx, Instant::now());
        assert!(!report.sent);
        assert_eq!(stats.snapshot().send_failures, 2);
    }

    #[test]
    fn run_paces_cycles_and_exits_when_queue_closes() {
        let (tx, rx) = change_queue();
        let config = StreamConfig {
            refresh_rate: 20,
            max_block_size: 2,
            ..config()
        };
        for x in 0..6 {
            tx.send(ChangeRecord::new(x, 0, Rgb565(0))).unwrap();
        }
        drop(tx);

        let capture = Capture::default();
        let streamer = UpdateStreamer::new(capture.clone(), &config, Arc::default());
        streamer.run(rx, &AtomicBool::new(false));

        let sent = capture.0.lock().unwrap().clone();
        assert_eq!(sent.len(), 3);
        for pair in sent.windows(2) {
            let gap = pair[1].0 - pair[0].0;
            assert!(gap >= Duration::from_millis(45), "gap {gap:?} shorter than period");
        }
    }
}
