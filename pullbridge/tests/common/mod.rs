// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! A counting mock of a native media engine.
//!
//! Buffers live in a table inside [`MockApi`] with explicit reference counts,
//! so tests can assert that every reference taken was given back exactly once.
//! [`MockSink`] plays a script of pulls and then does what its [`Tail`] says.
//! It can also be held in a stopped state, where it behaves like an appsink
//! before its pipeline is started.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use pullbridge::{
    CapsParser, DefaultCapsParser, FormatDescriptor, MapMode, NativeBufferApi, SampleSource,
};

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

/// Initializes logging (respects `RUST_LOG`).
pub fn setup_logging() {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });
}

pub const BGRA_CAPS: &str = "video/x-raw,format=BGRA,width=320,height=240";
pub const BGRA_FRAME_SIZE: usize = 320 * 240 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockBuffer(usize);

#[derive(Debug)]
pub struct MockMapInfo {
    data: *mut u8,
    len: usize,
}

#[derive(Debug)]
struct Record {
    data: Vec<u8>,
    references: usize,
    pts: Option<Duration>,
    dts: Option<Duration>,
    duration: Option<Duration>,
}

/// Buffer table with call counters.
#[derive(Default)]
pub struct MockApi {
    buffers: Mutex<Vec<Record>>,
    refs: AtomicUsize,
    unrefs: AtomicUsize,
    maps: AtomicUsize,
    unmaps: AtomicUsize,
    over_released: AtomicUsize,
    fail_maps: AtomicBool,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a buffer holding one reference owned by the caller.
    pub fn create(&self, data: Vec<u8>, pts: Option<Duration>) -> MockBuffer {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.push(Record {
            data,
            references: 1,
            pts,
            dts: pts,
            duration: Some(Duration::from_millis(33)),
        });
        MockBuffer(buffers.len() - 1)
    }

    pub fn references(&self, buffer: MockBuffer) -> usize {
        self.buffers.lock().unwrap()[buffer.0].references
    }

    /// References still held on any buffer.
    pub fn live_references(&self) -> usize {
        self.buffers
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.references)
            .sum()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn unrefs(&self) -> usize {
        self.unrefs.load(Ordering::SeqCst)
    }

    pub fn maps(&self) -> usize {
        self.maps.load(Ordering::SeqCst)
    }

    pub fn unmaps(&self) -> usize {
        self.unmaps.load(Ordering::SeqCst)
    }

    /// Unrefs issued on a buffer that had no reference left.
    pub fn over_released(&self) -> usize {
        self.over_released.load(Ordering::SeqCst)
    }

    pub fn set_fail_maps(&self, fail: bool) {
        self.fail_maps.store(fail, Ordering::SeqCst);
    }

    pub fn contents(&self, buffer: MockBuffer) -> Vec<u8> {
        self.buffers.lock().unwrap()[buffer.0].data.clone()
    }
}

unsafe impl NativeBufferApi for MockApi {
    type Buffer = MockBuffer;
    type MapInfo = MockMapInfo;

    unsafe fn buffer_ref(&self, buffer: MockBuffer) {
        self.refs.fetch_add(1, Ordering::SeqCst);
        self.buffers.lock().unwrap()[buffer.0].references += 1;
    }

    unsafe fn buffer_unref(&self, buffer: MockBuffer) {
        self.unrefs.fetch_add(1, Ordering::SeqCst);
        let mut buffers = self.buffers.lock().unwrap();
        let record = &mut buffers[buffer.0];
        if record.references == 0 {
            self.over_released.fetch_add(1, Ordering::SeqCst);
        } else {
            record.references -= 1;
        }
    }

    unsafe fn buffer_size(&self, buffer: MockBuffer) -> usize {
        self.buffers.lock().unwrap()[buffer.0].data.len()
    }

    unsafe fn buffer_is_writable(&self, buffer: MockBuffer) -> bool {
        self.buffers.lock().unwrap()[buffer.0].references == 1
    }

    unsafe fn buffer_map(&self, buffer: MockBuffer, _mode: MapMode) -> Option<MockMapInfo> {
        if self.fail_maps.load(Ordering::SeqCst) {
            return None;
        }
        let mut buffers = self.buffers.lock().unwrap();
        let record = &mut buffers[buffer.0];
        self.maps.fetch_add(1, Ordering::SeqCst);
        Some(MockMapInfo {
            data: record.data.as_mut_ptr(),
            len: record.data.len(),
        })
    }

    unsafe fn buffer_unmap(&self, _buffer: MockBuffer, _info: MockMapInfo) {
        self.unmaps.fetch_add(1, Ordering::SeqCst);
    }

    fn map_info_slice(info: &MockMapInfo) -> (*mut u8, usize) {
        (info.data, info.len)
    }

    unsafe fn buffer_pts(&self, buffer: MockBuffer) -> Option<Duration> {
        self.buffers.lock().unwrap()[buffer.0].pts
    }

    unsafe fn buffer_dts(&self, buffer: MockBuffer) -> Option<Duration> {
        self.buffers.lock().unwrap()[buffer.0].dts
    }

    unsafe fn buffer_duration(&self, buffer: MockBuffer) -> Option<Duration> {
        self.buffers.lock().unwrap()[buffer.0].duration
    }

    fn buffer_new(&self, size: usize) -> Option<MockBuffer> {
        Some(self.create(vec![0; size], None))
    }
}

/// An owned mock sample; dropping it gives back the sample's reference.
pub struct MockSample {
    api: Arc<MockApi>,
    buffer: MockBuffer,
    caps: Option<String>,
}

impl Drop for MockSample {
    fn drop(&mut self) {
        unsafe { self.api.buffer_unref(self.buffer) };
    }
}

/// One scripted pull.
#[derive(Debug, Clone)]
pub enum Step {
    /// A sample of `size` bytes, every byte set to the sample's sequence number.
    Sample { size: usize, caps: Option<String> },
    /// A pull that times out.
    Empty,
}

impl Step {
    pub fn frame(size: usize, caps: &str) -> Self {
        Step::Sample {
            size,
            caps: Some(caps.to_owned()),
        }
    }

    pub fn bare(size: usize) -> Self {
        Step::Sample { size, caps: None }
    }
}

/// What the sink does once its script is exhausted.
#[derive(Debug, Clone)]
pub enum Tail {
    /// Reports end-of-stream.
    Eos,
    /// Times out forever without reaching end-of-stream.
    Starve,
    /// Returns nothing immediately, ignoring the timeout, and never reaches
    /// end-of-stream.
    Idle,
    /// Produces this step forever.
    Repeat(Step),
}

/// Counters shared between a sink and the test that moved it into a pump.
#[derive(Debug, Default)]
pub struct SinkStats {
    pulls: AtomicUsize,
    eos_checks: AtomicUsize,
    last_call: Mutex<Option<Instant>>,
    pull_thread: Mutex<Option<String>>,
}

impl SinkStats {
    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn eos_checks(&self) -> usize {
        self.eos_checks.load(Ordering::SeqCst)
    }

    /// When the last pull or end-of-stream query returned.
    pub fn last_call(&self) -> Option<Instant> {
        *self.last_call.lock().unwrap()
    }

    /// Name of the thread that made the most recent pull.
    pub fn pull_thread(&self) -> Option<String> {
        self.pull_thread.lock().unwrap().clone()
    }

    fn touch(&self) {
        *self.last_call.lock().unwrap() = Some(Instant::now());
    }
}

pub struct MockSink {
    api: Arc<MockApi>,
    script: VecDeque<Step>,
    tail: Tail,
    sequence: u8,
    stats: Arc<SinkStats>,
    running: Option<Arc<AtomicBool>>,
}

impl MockSink {
    pub fn new(api: Arc<MockApi>, script: Vec<Step>, tail: Tail) -> Self {
        Self {
            api,
            script: script.into(),
            tail,
            sequence: 0,
            stats: Arc::new(SinkStats::default()),
            running: None,
        }
    }

    /// Holds the sink stopped until the returned flag is set: pulls return
    /// nothing at once and end-of-stream is reported, as a stopped appsink does.
    pub fn stopped(mut self) -> (Self, Arc<AtomicBool>) {
        let running = Arc::new(AtomicBool::new(false));
        self.running = Some(running.clone());
        (self, running)
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_none_or(|running| running.load(Ordering::SeqCst))
    }

    pub fn stats(&self) -> Arc<SinkStats> {
        self.stats.clone()
    }

    fn produce(&mut self, step: Step, timeout: Duration) -> Option<MockSample> {
        match step {
            Step::Sample { size, caps } => {
                let sequence = self.sequence;
                self.sequence = self.sequence.wrapping_add(1);
                let pts = Duration::from_millis(u64::from(sequence) * 33);
                let buffer = self.api.create(vec![sequence; size], Some(pts));
                Some(MockSample {
                    api: self.api.clone(),
                    buffer,
                    caps,
                })
            }
            Step::Empty => {
                thread::sleep(timeout.min(Duration::from_millis(5)));
                None
            }
        }
    }
}

impl SampleSource for MockSink {
    type Api = MockApi;
    type Sample = MockSample;

    fn api(&self) -> &Arc<MockApi> {
        &self.api
    }

    fn try_pull_sample(&mut self, timeout: Duration) -> Option<MockSample> {
        self.stats.pulls.fetch_add(1, Ordering::SeqCst);
        *self.stats.pull_thread.lock().unwrap() = thread::current().name().map(str::to_owned);
        if !self.is_running() {
            self.stats.touch();
            return None;
        }
        let step = match self.script.pop_front() {
            Some(step) => Some(step),
            None => match &self.tail {
                Tail::Eos => None,
                Tail::Starve => {
                    thread::sleep(timeout);
                    None
                }
                Tail::Idle => None,
                Tail::Repeat(step) => Some(step.clone()),
            },
        };
        let sample = step.and_then(|step| self.produce(step, timeout));
        self.stats.touch();
        sample
    }

    fn is_eos(&self) -> bool {
        self.stats.eos_checks.fetch_add(1, Ordering::SeqCst);
        self.stats.touch();
        !self.is_running() || (self.script.is_empty() && matches!(self.tail, Tail::Eos))
    }

    fn is_started(&self) -> bool {
        self.is_running()
    }

    fn sample_buffer(&self, sample: &MockSample) -> Option<MockBuffer> {
        Some(sample.buffer)
    }

    fn sample_caps(&self, sample: &MockSample) -> Option<String> {
        sample.caps.clone()
    }
}

/// A caps parser that counts its invocations.
#[derive(Debug, Default)]
pub struct CountingParser {
    calls: Arc<AtomicUsize>,
}

impl CountingParser {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl CapsParser for CountingParser {
    fn parse(&self, caps: &str) -> FormatDescriptor {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DefaultCapsParser.parse(caps)
    }
}
