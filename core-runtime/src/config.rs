//! # Core Configuration Module
//!
//! Bundles the host capabilities a streaming session needs.
//!
//! ## Overview
//!
//! The builder collects the platform bridges and enforces fail-fast
//! validation: a session cannot be configured without somewhere to send PCM.
//!
//! ## Required Dependencies
//!
//! - `AudioSink` - Receives decoded 16-bit PCM and starts playback
//!
//! ## Optional Dependencies
//!
//! - `StreamObserver` - Buffering and failure notifications (default: no-op)
//! - `LoggingConfig` - Installed by [`CoreConfig::init_logging`] when present
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .audio_sink(Box::new(MySink::open()?))
//!     .observer(Arc::new(MyUiObserver::new()))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Fails: no AudioSink was provided
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing audio sink");
//! ```

use crate::error::{Error, Result};
use crate::logging::{self, LoggingConfig};
use bridge_traits::{AudioSink, NoopObserver, StreamObserver};
use std::sync::Arc;

/// Capabilities for one streaming session.
///
/// Not `Clone`: the audio sink is owned and handed to the decoding thread.
pub struct CoreConfig {
    /// Destination for decoded PCM (required)
    pub audio_sink: Box<dyn AudioSink>,

    /// Buffering / failure listener
    pub observer: Arc<dyn StreamObserver>,

    /// Logging setup, if the host wants the core to install a subscriber
    pub logging: Option<LoggingConfig>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("audio_sink", &"AudioSink { ... }")
            .field("observer", &"StreamObserver { ... }")
            .field("logging", &self.logging)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks that the sink can report a usable buffer size.
    ///
    /// A zero-byte playback buffer would make the start threshold unreachable
    /// in a meaningful way, so it is rejected up front.
    pub fn validate(&self) -> Result<()> {
        let capacity = self.audio_sink.buffer_capacity_bytes().map_err(|e| {
            Error::CapabilityMissing {
                capability: "AudioSink".to_string(),
                message: format!("Sink could not report its buffer capacity: {}", e),
            }
        })?;

        if capacity == 0 {
            return Err(Error::Config(
                "AudioSink reported a zero-byte playback buffer".to_string(),
            ));
        }

        Ok(())
    }

    /// Install the configured logging subscriber, if any.
    ///
    /// Returns `Ok(false)` when no logging config was supplied.
    pub fn init_logging(&self) -> Result<bool> {
        match &self.logging {
            Some(config) => logging::init_logging(config.clone()).map(|_| true),
            None => Ok(false),
        }
    }

    /// Split into the sink (moved to the decoding thread) and the observer.
    pub fn into_parts(self) -> (Box<dyn AudioSink>, Arc<dyn StreamObserver>) {
        (self.audio_sink, self.observer)
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    audio_sink: Option<Box<dyn AudioSink>>,
    observer: Option<Arc<dyn StreamObserver>>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the audio sink that receives decoded PCM.
    pub fn audio_sink(mut self, sink: Box<dyn AudioSink>) -> Self {
        self.audio_sink = Some(sink);
        self
    }

    /// Sets the stream observer.
    pub fn observer(mut self, observer: Arc<dyn StreamObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Sets the logging configuration.
    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no audio sink was provided or the
    ///   sink cannot report its buffer size
    /// - [`Error::Config`] when the sink reports a zero-byte buffer
    pub fn build(self) -> Result<CoreConfig> {
        let audio_sink = self.audio_sink.ok_or_else(|| Error::CapabilityMissing {
            capability: "AudioSink".to_string(),
            message: "An audio sink is required. Use .audio_sink() to provide one \
                      (bridge-desktop ships WavFileSink)."
                .to_string(),
        })?;

        let config = CoreConfig {
            audio_sink,
            observer: self.observer.unwrap_or_else(|| Arc::new(NoopObserver)),
            logging: self.logging,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::LogLevel;

    struct FixedSink {
        capacity: Option<usize>,
    }

    impl AudioSink for FixedSink {
        fn notify_format_changed(&mut self, _: u32, _: u16) -> BridgeResult<()> {
            Ok(())
        }

        fn write_samples(&mut self, samples: &[i16]) -> BridgeResult<usize> {
            Ok(samples.len() * 2)
        }

        fn start_playback(&mut self) -> BridgeResult<()> {
            Ok(())
        }

        fn buffer_capacity_bytes(&self) -> BridgeResult<usize> {
            self.capacity
                .ok_or_else(|| BridgeError::NotAvailable("device closed".to_string()))
        }
    }

    #[test]
    fn test_builder_requires_audio_sink() {
        let result = CoreConfig::builder().build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "AudioSink")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_with_sink_defaults_observer() {
        let config = CoreConfig::builder()
            .audio_sink(Box::new(FixedSink {
                capacity: Some(4096),
            }))
            .build()
            .unwrap();

        assert!(config.logging.is_none());
        assert_eq!(config.audio_sink.buffer_capacity_bytes().unwrap(), 4096);
        config.observer.on_buffering(true);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let result = CoreConfig::builder()
            .audio_sink(Box::new(FixedSink { capacity: Some(0) }))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unreadable_capacity() {
        let result = CoreConfig::builder()
            .audio_sink(Box::new(FixedSink { capacity: None }))
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("device closed"));
    }

    #[test]
    fn test_init_logging_without_config_is_noop() {
        let config = CoreConfig::builder()
            .audio_sink(Box::new(FixedSink {
                capacity: Some(1024),
            }))
            .build()
            .unwrap();

        assert!(!config.init_logging().unwrap());
    }

    #[test]
    fn test_into_parts_keeps_logging_out() {
        let config = CoreConfig::builder()
            .audio_sink(Box::new(FixedSink {
                capacity: Some(1024),
            }))
            .logging(LoggingConfig::default().with_level(LogLevel::Debug))
            .build()
            .unwrap();

        assert!(format!("{:?}", config).contains("Debug"));
        let (sink, _observer) = config.into_parts();
        assert_eq!(sink.buffer_capacity_bytes().unwrap(), 1024);
    }
}
