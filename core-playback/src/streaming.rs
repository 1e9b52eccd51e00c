//! # Streaming Session
//!
//! Wires the pieces of one playback session together and runs it to
//! completion on the calling thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ stream-producer      │  Read source ──► RingBuffer::write_from
//! │ (own thread)         │
//! └──────────┬───────────┘
//!            │ compressed bytes
//!            ▼
//! ┌──────────────────────┐
//! │ SharedRingBuffer     │  Arc<parking_lot::Mutex<RingBuffer>>
//! └──────────┬───────────┘
//!            │ FeedAdapter::fill
//!            ▼
//! ┌──────────────────────┐
//! │ DecoderEngine::run   │  (calling thread)
//! └──────────┬───────────┘
//!            │ OutputPipeline::write_frame
//!            ▼
//! ┌──────────────────────┐
//! │ AudioSink            │  PCM, format changes, start_playback
//! └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{StreamingConfig, StreamingService};
//!
//! let service = StreamingService::new(StreamingConfig::for_bitrate(192));
//! let cancel = service.cancel_flag();
//!
//! // Another thread may call `cancel.cancel()` at any time
//! let report = service.run(socket, engine, sink)?;
//! println!("{:?} after {:?}", report.outcome, report.elapsed);
//! ```

use crate::config::{StreamingConfig, StreamingState, StreamingStats};
use crate::engine::{DecodeCallbacks, DecoderEngine, Flow, FrameError, PcmFrame, StreamView};
use crate::error::{PlaybackError, Result};
use crate::feed::FeedAdapter;
use crate::output::OutputPipeline;
use crate::producer::{self, Producer, ProducerStatus};
use crate::ring_buffer::RingBuffer;
use bridge_traits::{AudioSink, NoopObserver, StreamObserver};
use core_runtime::config::CoreConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Cooperative cancellation flag shared by every part of a session.
///
/// Clones observe the same flag. Setting it is the only way to stop a
/// session from the outside.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag before a new session.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionOutcome {
    /// The source reached end of stream and the decoder drained the ring.
    EndOfStream,
    /// The cancel flag was set.
    Cancelled,
}

/// Summary of a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub stats: StreamingStats,
    pub elapsed: Duration,
}

/// Runs streaming sessions.
///
/// One service runs at most one session at a time; `run` blocks the
/// calling thread. [`cancel_flag`](Self::cancel_flag), [`state`](Self::state)
/// and [`stats`](Self::stats) may be used from other threads meanwhile.
pub struct StreamingService {
    config: StreamingConfig,
    observer: Arc<dyn StreamObserver>,
    cancel: CancelFlag,
    state: Mutex<StreamingState>,
    stats: Mutex<StreamingStats>,
}

impl StreamingService {
    pub fn new(config: StreamingConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NoopObserver),
            cancel: CancelFlag::new(),
            state: Mutex::new(StreamingState::Idle),
            stats: Mutex::new(StreamingStats::default()),
        }
    }

    /// Build a service from host capabilities.
    ///
    /// Returns the service together with the host's audio sink, ready to be
    /// passed to [`run`](Self::run).
    pub fn from_core_config(
        config: StreamingConfig,
        core: CoreConfig,
    ) -> Result<(Self, Box<dyn AudioSink>)> {
        config.validate()?;
        let (sink, observer) = core.into_parts();
        Ok((Self::new(config).with_observer(observer), sink))
    }

    pub fn with_observer(mut self, observer: Arc<dyn StreamObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Flag that stops the running (or next) session when set.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Get the current streaming state.
    pub fn state(&self) -> StreamingState {
        *self.state.lock()
    }

    /// Get the statistics of the last finished session.
    pub fn stats(&self) -> StreamingStats {
        self.stats.lock().clone()
    }

    /// Run one session: stream `source` through `engine` into `sink`.
    ///
    /// The producer reads `source` on its own thread; the engine runs on the
    /// calling thread. The call returns once the stream ended, the cancel
    /// flag was set, or a fatal error occurred.
    ///
    /// The cancel flag is cleared on entry, so a flag set before the call
    /// does not affect this session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The configuration is invalid, `max_chunk_bytes` is below the
    ///   engine's minimum input, or the ring cannot be allocated
    /// - The source fails or the wait bound is exhausted
    /// - The sink rejects a call or a frame cannot be written
    /// - The engine itself fails
    ///
    /// Errors raised after cancellation are logged and reported as
    /// [`SessionOutcome::Cancelled`] instead.
    ///
    /// A producer still blocked in `source.read` is given
    /// `producer_join_timeout` to exit and is then left behind, so a silent
    /// source never keeps `run` from returning.
    #[instrument(skip_all, fields(ring_capacity = self.config.ring_capacity))]
    pub fn run<R, E, S>(&self, source: R, mut engine: E, sink: S) -> Result<SessionReport>
    where
        R: Read + Send + 'static,
        E: DecoderEngine,
        S: AudioSink,
    {
        self.config.validate()?;
        self.config.validate_for_engine(engine.min_input_bytes())?;
        self.cancel.reset();
        *self.stats.lock() = StreamingStats::default();
        *self.state.lock() = StreamingState::Buffering;

        info!("Starting streaming session");
        let started = Instant::now();
        let result = self.run_session(source, &mut engine, sink);
        let elapsed = started.elapsed();

        match result {
            Ok(stats) => {
                let outcome = if self.cancel.is_cancelled() {
                    *self.state.lock() = StreamingState::Cancelled;
                    SessionOutcome::Cancelled
                } else {
                    *self.state.lock() = StreamingState::Completed;
                    SessionOutcome::EndOfStream
                };
                info!(
                    ?outcome,
                    frames = stats.frames_decoded,
                    bytes = stats.bytes_received,
                    "Streaming session finished in {:.2}s",
                    elapsed.as_secs_f64()
                );
                Ok(SessionReport {
                    outcome,
                    stats,
                    elapsed,
                })
            }
            Err(e) if self.cancel.is_cancelled() => {
                debug!(error = %e, "Error after cancellation ignored");
                *self.state.lock() = StreamingState::Cancelled;
                Ok(SessionReport {
                    outcome: SessionOutcome::Cancelled,
                    stats: self.stats(),
                    elapsed,
                })
            }
            Err(e) => {
                error!(error = %e, "Streaming session failed");
                *self.state.lock() = StreamingState::Failed;
                self.observer.on_stream_error(&e.to_string());
                Err(e)
            }
        }
    }

    fn run_session<R, E, S>(&self, source: R, engine: &mut E, sink: S) -> Result<StreamingStats>
    where
        R: Read + Send + 'static,
        E: DecoderEngine,
        S: AudioSink,
    {
        let config = &self.config;
        let ring = RingBuffer::shared(config.ring_capacity)?;
        let output = OutputPipeline::new(sink, self.cancel.clone(), config.start_threshold_percent)?;

        let status = Arc::new(ProducerStatus::new());
        let feed = FeedAdapter::new(
            ring.clone(),
            status.clone(),
            self.cancel.clone(),
            self.observer.clone(),
        )
        .with_max_chunk(config.max_chunk_bytes)
        .with_poll_interval(config.poll_interval)
        .with_max_wait_polls(config.max_wait_polls);

        let handle = producer::spawn(
            Producer::new(
                ring,
                status.clone(),
                self.cancel.clone(),
                config.producer_chunk_bytes,
                config.poll_interval,
            ),
            source,
        )?;

        let mut callbacks = SessionCallbacks {
            feed,
            output,
            state: &self.state,
            frame_errors: 0,
            decoder_sync_losses: 0,
            fatal: None,
        };
        let engine_result = engine.run(&mut callbacks);

        status.request_shutdown();
        let joined = producer::join_within(
            handle,
            config.producer_join_timeout,
            config.poll_interval,
        );

        let stats = callbacks.collect_stats(status.bytes_received());
        *self.stats.lock() = stats.clone();

        match joined {
            Ok(true) => {}
            Ok(false) => debug!("Session ends with producer still reading"),
            Err(_) => {
                return Err(PlaybackError::Internal(
                    "producer thread panicked".to_string(),
                ))
            }
        }
        if let Some(fatal) = callbacks.fatal {
            return Err(fatal);
        }
        engine_result?;

        Ok(stats)
    }
}

/// The callbacks handed to the engine for one session.
struct SessionCallbacks<'a, S: AudioSink> {
    feed: FeedAdapter,
    output: OutputPipeline<S>,
    state: &'a Mutex<StreamingState>,
    frame_errors: u64,
    decoder_sync_losses: u64,
    /// First fatal error; the session result.
    fatal: Option<PlaybackError>,
}

impl<S: AudioSink> SessionCallbacks<'_, S> {
    fn stop_with(&mut self, err: PlaybackError) -> Flow {
        warn!(error = %err, "Stopping decoder");
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        Flow::Stop
    }

    fn collect_stats(&self, bytes_received: u64) -> StreamingStats {
        let feed = self.feed.stats();
        let output = self.output.stats();
        StreamingStats {
            bytes_received,
            frames_decoded: output.frames_written,
            frame_errors: self.frame_errors,
            sync_losses: feed.sync_losses + self.decoder_sync_losses,
            realignments: feed.realignments,
            starvation_waits: feed.starvation_waits,
            pcm_bytes_written: output.pcm_bytes_written,
            short_writes: output.short_writes,
            playback_started: self.output.playback_start().is_playing(),
        }
    }
}

impl<S: AudioSink> DecodeCallbacks for SessionCallbacks<'_, S> {
    fn input(&mut self, view: &mut StreamView) -> Flow {
        match self.feed.fill(view) {
            Ok(flow) => flow,
            Err(e) => self.stop_with(e),
        }
    }

    fn output(&mut self, frame: &PcmFrame<'_>) -> Flow {
        let was_playing = self.output.playback_start().is_playing();
        match self.output.write_frame(frame) {
            Ok(flow) => {
                if !was_playing && self.output.playback_start().is_playing() {
                    *self.state.lock() = StreamingState::Playing;
                }
                flow
            }
            Err(e) => self.stop_with(e),
        }
    }

    fn error(&mut self, error: &FrameError, view: &StreamView) -> Flow {
        match error {
            FrameError::LostSync { .. } => self.decoder_sync_losses += 1,
            _ => self.frame_errors += 1,
        }
        warn!(
            error = %error,
            offset = view.start + view.consumed(),
            "Recoverable decode error"
        );
        Flow::Continue
    }
}
