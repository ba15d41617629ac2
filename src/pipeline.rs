//! Drives pages from the dump through admission and normalization into a sink.
//!
//! Two modes produce identical output, in dump order:
//!
//! - **sequential** (`workers == 0`): pull a page, build its record, hand it to the
//!   sink, repeat.
//! - **staged** (`workers > 0`): the parser runs on its own thread and feeds a pool of
//!   workers through a bounded queue. For every page the parser also enqueues a
//!   result slot into a second bounded queue, which the publishing thread drains in
//!   order, so output order is the dump order and the number of pages in flight is
//!   bounded.
//!
//! In both modes the sink runs on a thread of its own behind a bounded queue.
//!
//! A [`ShutdownSignal`] stops either mode between pages. No partially built record
//! is ever published, and a sink that stops accepting records can't keep a
//! cancelled run from returning.

use std::{
    io::BufRead,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError},
        Arc, Mutex, PoisonError,
    },
    thread,
    time::Duration,
};

use compact_str::CompactString;

use crate::{
    admission::{AdmissionFilter, RejectReason},
    dump_parser::{DumpParser, Page, ParsingError, SiteInfo},
    record::{NormalizedRecord, RecordAssembler, RecordSink, SinkError, DEFAULT_RECORD_TYPE},
    url_builder::{InvalidBaseUrl, UrlBuilder},
};

// how often blocked stages look at the shutdown signal
const POLL_INTERVAL: Duration = Duration::from_millis(5);
// how long a cancelled run waits for the sink to drain before abandoning it
const SINK_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Cooperative cancellation flag, shared by cloning.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Number of normalization workers; 0 runs everything on the calling thread.
    pub workers: usize,
    /// Capacity of each queue between stages.
    pub queue_capacity: usize,
    /// Stop after reading this many pages.
    pub max_pages: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_pages: None,
        }
    }
}

/// What happened to the pages of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_read: usize,
    pub published: usize,
    pub special_titles: usize,
    pub without_revisions: usize,
    pub invalid_timestamps: usize,
    pub redirects: usize,
    pub cancelled: bool,
}

impl RunSummary {
    fn record_rejection(&mut self, reason: &RejectReason, title: &str) {
        match reason {
            RejectReason::SpecialTitle => {
                self.special_titles += 1;
                tracing::debug!(message = "Skipping page with special title", title);
            }
            RejectReason::NoRevisions => {
                self.without_revisions += 1;
                tracing::debug!(message = "Skipping page without revisions", title);
            }
            RejectReason::InvalidTimestamp(timestamp) => {
                self.invalid_timestamps += 1;
                tracing::warn!(
                    message = "Rejecting page with invalid revision timestamp",
                    title,
                    timestamp = timestamp.as_str()
                );
            }
            RejectReason::Redirect => {
                self.redirects += 1;
                tracing::debug!(message = "Skipping redirect page", title);
            }
        }
    }

    pub fn rejected(&self) -> usize {
        self.special_titles + self.without_revisions + self.invalid_timestamps + self.redirects
    }

    fn log(&self) {
        tracing::info!(
            message = "Finished processing dump",
            pages_read = self.pages_read,
            published = self.published,
            special_titles = self.special_titles,
            without_revisions = self.without_revisions,
            invalid_timestamps = self.invalid_timestamps,
            redirects = self.redirects,
            cancelled = self.cancelled
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid site info")]
    InvalidBaseUrl(#[from] InvalidBaseUrl),
    #[error("dump stream failed after {} pages", .summary.pages_read)]
    Stream {
        #[source]
        source: ParsingError,
        summary: RunSummary,
    },
    #[error("sink failed after {} records", .summary.published)]
    Sink {
        #[source]
        source: SinkError,
        summary: RunSummary,
    },
    #[error("failed to spawn pipeline thread")]
    Spawn(#[from] std::io::Error),
    #[error("a pipeline thread panicked")]
    WorkerPanicked,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    filter: AdmissionFilter,
    record_type: String,
    options: PipelineOptions,
    shutdown: ShutdownSignal,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(AdmissionFilter::default(), DEFAULT_RECORD_TYPE, PipelineOptions::default())
    }
}

impl Pipeline {
    pub fn new(filter: AdmissionFilter, record_type: &str, options: PipelineOptions) -> Self {
        Self {
            filter,
            record_type: record_type.to_string(),
            options,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Use an externally owned signal, e.g. one wired to the host's shutdown hook.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    fn assembler(&self, site_info: &SiteInfo) -> Result<RecordAssembler, PipelineError> {
        let urls = UrlBuilder::new(&site_info.base)?;
        Ok(RecordAssembler::new(
            self.filter.clone(),
            urls,
            &self.record_type,
        ))
    }

    fn page_limit(&self) -> usize {
        self.options.max_pages.unwrap_or(usize::MAX)
    }

    /// Process the whole dump in the configured mode.
    pub fn run<R, S>(&self, parser: DumpParser<R>, sink: S) -> Result<RunSummary, PipelineError>
    where
        R: BufRead + Send,
        S: RecordSink + 'static,
    {
        if self.options.workers == 0 {
            self.run_sequential(parser, sink)
        } else {
            self.run_staged(parser, sink)
        }
    }

    /// The reference loop: one page at a time on the calling thread.
    ///
    /// Only the sink runs on a thread of its own, so that a sink which stops
    /// accepting records can't keep a cancelled run from returning.
    pub fn run_sequential<R, S>(
        &self,
        mut parser: DumpParser<R>,
        sink: S,
    ) -> Result<RunSummary, PipelineError>
    where
        R: BufRead,
        S: RecordSink + 'static,
    {
        let assembler = self.assembler(parser.site_info())?;
        let sink = SinkThread::spawn(sink, self.options.queue_capacity.max(1))?;
        let mut summary = RunSummary::default();

        let published = self.publish_sequentially(&mut parser, &assembler, &sink, &mut summary);
        self.conclude(published, sink, summary)
    }

    fn publish_sequentially<R: BufRead>(
        &self,
        parser: &mut DumpParser<R>,
        assembler: &RecordAssembler,
        sink: &SinkThread,
        summary: &mut RunSummary,
    ) -> Result<(), Failure> {
        let mut scratch_buffers = (String::new(), String::new());

        loop {
            if summary.pages_read >= self.page_limit() {
                return Ok(());
            }
            if self.shutdown.is_cancelled() {
                break;
            }

            let page = match parser.next() {
                Some(Ok(page)) => page,
                Some(Err(e)) => return Err(Failure::Stream(e)),
                None => return Ok(()),
            };
            summary.pages_read += 1;

            match assembler.assemble(&page, (&mut scratch_buffers.0, &mut scratch_buffers.1)) {
                Ok(record) => match sink.hand_over(record, &self.shutdown) {
                    Handover::Accepted => {
                        summary.published += 1;
                        tracing::trace!(message = "Record published", title = page.title.as_str());
                    }
                    Handover::Cancelled => break,
                    Handover::Closed => return Err(Failure::SinkClosed),
                },
                Err(reason) => summary.record_rejection(&reason, &page.title),
            }
        }

        tracing::warn!(message = "Shutdown requested, stopping", pages_read = summary.pages_read);
        summary.cancelled = true;
        Ok(())
    }

    /// Parser, workers and sink on separate threads, connected by bounded queues.
    pub fn run_staged<R, S>(&self, parser: DumpParser<R>, sink: S) -> Result<RunSummary, PipelineError>
    where
        R: BufRead + Send,
        S: RecordSink + 'static,
    {
        let assembler = self.assembler(parser.site_info())?;
        let capacity = self.options.queue_capacity.max(1);
        let worker_count = self.options.workers.max(1);

        let (job_tx, job_rx) = mpsc::sync_channel::<Job>(capacity);
        let job_rx = Mutex::new(job_rx);
        let (slot_tx, slot_rx) = mpsc::sync_channel::<Slot>(capacity);

        let sink = SinkThread::spawn(sink, capacity)?;
        let mut summary = RunSummary::default();

        let published = thread::scope(|scope| {
            let reader = thread::Builder::new()
                .name("wikinorm-reader".to_string())
                .spawn_scoped(scope, || {
                    read_pages(parser, job_tx, slot_tx, self.page_limit(), &self.shutdown)
                })?;

            let mut workers = Vec::with_capacity(worker_count);
            for index in 0..worker_count {
                let worker = thread::Builder::new()
                    .name(format!("wikinorm-worker-{index}"))
                    .spawn_scoped(scope, || process_pages(&job_rx, &assembler))?;
                workers.push(worker);
            }

            let published = self.publish_in_order(slot_rx, &sink, &mut summary);

            let mut panicked = reader.join().is_err();
            for worker in workers {
                panicked |= worker.join().is_err();
            }
            if panicked {
                return Err(Failure::Panicked);
            }
            published
        });

        self.conclude(published, sink, summary)
    }

    // waits for the sink and turns the outcome of a run into its result
    fn conclude(
        &self,
        published: Result<(), Failure>,
        sink: SinkThread,
        summary: RunSummary,
    ) -> Result<RunSummary, PipelineError> {
        let finished = sink.finish(summary.cancelled);
        match (published, finished) {
            (Err(Failure::Stream(source)), _) => {
                tracing::error!(message = "Dump stream failed", error = %source, pages_read = summary.pages_read);
                Err(PipelineError::Stream { source, summary })
            }
            (Err(Failure::Spawn(e)), _) => Err(PipelineError::Spawn(e)),
            (Err(Failure::Panicked), _) | (_, Err(Failure::Panicked)) => {
                Err(PipelineError::WorkerPanicked)
            }
            (Err(Failure::SinkClosed), Err(Failure::Sink(source)))
            | (Ok(()), Err(Failure::Sink(source))) => Err(PipelineError::Sink { source, summary }),
            (Err(Failure::SinkClosed), _) => Err(PipelineError::Sink {
                source: SinkError::Closed,
                summary,
            }),
            (Err(Failure::Sink(source)), _) => Err(PipelineError::Sink { source, summary }),
            (Ok(()), _) => {
                summary.log();
                Ok(summary)
            }
        }
    }

    fn wait<T>(&self, rx: &Receiver<T>) -> Waited<T> {
        loop {
            if self.shutdown.is_cancelled() {
                return Waited::Cancelled;
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(item) => return Waited::Item(item),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Waited::Closed,
            }
        }
    }

    // consumes `slots` so that returning early closes the queue and stops the reader
    fn publish_in_order(
        &self,
        slots: Receiver<Slot>,
        sink: &SinkThread,
        summary: &mut RunSummary,
    ) -> Result<(), Failure> {
        loop {
            let slot = match self.wait(&slots) {
                Waited::Item(slot) => slot,
                Waited::Closed => return Ok(()),
                Waited::Cancelled => break,
            };

            let processed = match slot {
                Slot::Failed(e) => return Err(Failure::Stream(e)),
                Slot::Pending(result) => match self.wait(&result) {
                    Waited::Item(processed) => processed,
                    // the worker dropped the slot without filling it
                    Waited::Closed => return Err(Failure::Panicked),
                    Waited::Cancelled => break,
                },
            };
            summary.pages_read += 1;

            match processed.record {
                Ok(record) => match sink.hand_over(record, &self.shutdown) {
                    Handover::Accepted => {
                        summary.published += 1;
                        tracing::trace!(message = "Record published", title = processed.title.as_str());
                    }
                    Handover::Cancelled => break,
                    Handover::Closed => return Err(Failure::SinkClosed),
                },
                Err(reason) => summary.record_rejection(&reason, &processed.title),
            }
        }

        tracing::warn!(message = "Shutdown requested, stopping", pages_read = summary.pages_read);
        summary.cancelled = true;
        Ok(())
    }
}

struct Job {
    page: Page,
    result: SyncSender<Processed>,
}

struct Processed {
    title: CompactString,
    record: Result<NormalizedRecord, RejectReason>,
}

enum Slot {
    Pending(Receiver<Processed>),
    Failed(ParsingError),
}

enum Waited<T> {
    Item(T),
    Closed,
    Cancelled,
}

enum Handover {
    Accepted,
    Cancelled,
    Closed,
}

enum Failure {
    Stream(ParsingError),
    Sink(SinkError),
    SinkClosed,
    Spawn(std::io::Error),
    Panicked,
}

impl From<std::io::Error> for Failure {
    fn from(e: std::io::Error) -> Self {
        Failure::Spawn(e)
    }
}

fn read_pages<R: BufRead>(
    mut parser: DumpParser<R>,
    jobs: SyncSender<Job>,
    slots: SyncSender<Slot>,
    limit: usize,
    shutdown: &ShutdownSignal,
) {
    let mut pages_read = 0;
    while pages_read < limit && !shutdown.is_cancelled() {
        match parser.next() {
            Some(Ok(page)) => {
                pages_read += 1;
                let (result_tx, result_rx) = mpsc::sync_channel(1);
                // either send fails only once the publisher has stopped
                if slots.send(Slot::Pending(result_rx)).is_err() {
                    break;
                }
                if jobs
                    .send(Job {
                        page,
                        result: result_tx,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Some(Err(e)) => {
                let _ = slots.send(Slot::Failed(e));
                break;
            }
            None => break,
        }
    }
    tracing::debug!(message = "Reader finished", pages_read);
}

fn process_pages(jobs: &Mutex<Receiver<Job>>, assembler: &RecordAssembler) {
    let mut scratch_buffers = (String::new(), String::new());

    loop {
        let job = jobs.lock().unwrap_or_else(PoisonError::into_inner).recv();
        let Ok(Job { page, result }) = job else {
            // the reader is done
            return;
        };

        let record = assembler.assemble(&page, (&mut scratch_buffers.0, &mut scratch_buffers.1));
        // the publisher is gone after a shutdown, the result is simply dropped then
        let _ = result.send(Processed {
            title: page.title,
            record,
        });
    }
}

struct SinkThread {
    records: SyncSender<NormalizedRecord>,
    // disconnects when the sink thread exits
    exited: Receiver<()>,
    handle: thread::JoinHandle<Result<(), SinkError>>,
}

impl SinkThread {
    fn spawn<S: RecordSink + 'static>(mut sink: S, capacity: usize) -> Result<Self, PipelineError> {
        let (records, rx) = mpsc::sync_channel::<NormalizedRecord>(capacity);
        let (exit_guard, exited) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("wikinorm-sink".to_string())
            .spawn(move || {
                let _exit_guard = exit_guard;
                for record in rx {
                    sink.publish(record)?;
                }
                sink.flush()
            })?;

        Ok(Self {
            records,
            exited,
            handle,
        })
    }

    fn hand_over(&self, mut record: NormalizedRecord, shutdown: &ShutdownSignal) -> Handover {
        loop {
            match self.records.try_send(record) {
                Ok(()) => return Handover::Accepted,
                Err(TrySendError::Full(returned)) => {
                    if shutdown.is_cancelled() {
                        return Handover::Cancelled;
                    }
                    record = returned;
                    thread::sleep(POLL_INTERVAL);
                }
                Err(TrySendError::Disconnected(_)) => return Handover::Closed,
            }
        }
    }

    fn finish(self, cancelled: bool) -> Result<(), Failure> {
        drop(self.records);

        if cancelled {
            match self.exited.recv_timeout(SINK_SHUTDOWN_GRACE) {
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!("Sink did not finish after shutdown, abandoning it");
                    return Ok(());
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            }
        }

        match self.handle.join() {
            Ok(result) => result.map_err(Failure::Sink),
            Err(_) => Err(Failure::Panicked),
        }
    }
}
