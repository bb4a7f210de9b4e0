use super::{
    AudioBackend, AudioError, ConnectionState, SinkTarget, VolumeReading, FALLBACK_VOLUME,
};
use crate::timing::TtlCache;
use log::{debug, info, warn};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Timing policy for an [`AudioSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a volume reading is served from cache
    pub cache_ttl: Duration,
    /// Budget for the connection handshake
    pub init_timeout: Duration,
    /// Budget for resolving the default sink
    pub server_info_timeout: Duration,
    /// Budget for the sink volume query
    pub volume_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(2),
            init_timeout: Duration::from_millis(2000),
            server_info_timeout: Duration::from_millis(500),
            volume_timeout: Duration::from_millis(400),
        }
    }
}

struct SessionInner<B> {
    backend: B,
    state: ConnectionState,
    default_sink: Option<String>,
    cache: TtlCache<String>,
    last_error: Option<AudioError>,
}

/// Persistent connection to the audio service with a cached volume reading.
///
/// All operations run under one exclusive section, so at most one request is
/// in flight against the service at any time; concurrent callers queue up.
/// Nothing here returns an error to the caller: every failure turns into
/// `"0%"` and the next poll tries again.
pub struct AudioSession<B: AudioBackend> {
    config: SessionConfig,
    inner: Mutex<SessionInner<B>>,
}

impl<B: AudioBackend> AudioSession<B> {
    /// Create a disconnected session; nothing is opened until first use
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(SessionInner {
                backend,
                state: ConnectionState::Disconnected,
                default_sink: None,
                cache: TtlCache::new(config.cache_ttl),
                last_error: None,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current output volume as `"NN%"`.
    ///
    /// Served from cache while the last reading is younger than the TTL.
    /// Otherwise connects if needed, refreshes the default sink and queries
    /// its volume, each step under its own timeout.
    pub fn volume(&self) -> String {
        let mut inner = self.lock();

        if let Some(cached) = inner.cache.fresh() {
            if !cached.is_empty() {
                return cached;
            }
        }

        if let Err(e) = inner.ensure_ready(&self.config) {
            inner.note_error(e);
            // Not cached: the next poll retries right away
            return FALLBACK_VOLUME.to_string();
        }

        if let Err(e) = inner.refresh_default_sink(&self.config) {
            inner.invalidate(e);
            return FALLBACK_VOLUME.to_string();
        }

        let sink = inner.default_sink.clone();
        let target = match sink.as_deref() {
            Some(name) => SinkTarget::Named(name),
            None => SinkTarget::First,
        };

        let volume = match inner
            .backend
            .sink_volume(target, self.config.volume_timeout)
        {
            Ok(VolumeReading::NoSink) => {
                debug!("🔇 No sink reported a volume");
                FALLBACK_VOLUME.to_string()
            }
            Ok(reading) => {
                inner.last_error = None;
                reading.to_display()
            }
            Err(e @ AudioError::OperationTimeout(_)) => {
                inner.note_error(e);
                FALLBACK_VOLUME.to_string()
            }
            Err(e) => {
                inner.invalidate(e);
                return FALLBACK_VOLUME.to_string();
            }
        };

        inner.cache.store(volume.clone());
        volume
    }

    /// Connect if not connected yet
    pub fn ensure_ready(&self) -> Result<(), AudioError> {
        self.lock().ensure_ready(&self.config)
    }

    /// Ask the service for its default sink; `None` if it did not answer in
    /// time or the session is not connected
    pub fn refresh_default_sink(&self) -> Option<String> {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Ready {
            return None;
        }
        if let Err(e) = inner.refresh_default_sink(&self.config) {
            inner.invalidate(e);
        }
        inner.default_sink.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Default sink resolved by the last refresh
    pub fn default_sink(&self) -> Option<String> {
        self.lock().default_sink.clone()
    }

    /// Cached reading, if still fresh
    pub fn cached(&self) -> Option<String> {
        self.lock().cache.fresh()
    }

    /// Disconnect and release all service resources. Safe to call repeatedly
    /// and on a session that never connected.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Disconnected {
            info!("🔌 Closing audio session");
            inner.backend.disconnect();
            inner.state = ConnectionState::Disconnected;
        }
        inner.default_sink = None;
        inner.cache.clear();
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner<B>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: AudioBackend> Drop for AudioSession<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<B: AudioBackend> SessionInner<B> {
    fn ensure_ready(&mut self, config: &SessionConfig) -> Result<(), AudioError> {
        if self.state == ConnectionState::Ready {
            return Ok(());
        }

        debug!("🔌 Connecting to audio service");
        self.state = ConnectionState::Connecting;

        match self.backend.connect(config.init_timeout) {
            Ok(()) => {
                self.state = ConnectionState::Ready;
                self.last_error = None;
                info!("✅ Connected to audio service");
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                self.backend.disconnect();
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    fn refresh_default_sink(&mut self, config: &SessionConfig) -> Result<(), AudioError> {
        self.default_sink = None;
        let name = self.backend.default_sink(config.server_info_timeout)?;
        match &name {
            Some(name) => debug!("🔊 Default sink: {}", name),
            None => debug!("🔊 Default sink unknown, falling back to first sink"),
        }
        self.default_sink = name.filter(|n| !n.is_empty());
        Ok(())
    }

    /// Drop the connection so the next call starts from scratch
    fn invalidate(&mut self, error: AudioError) {
        warn!("⚠️ {}; resetting audio session", error);
        self.backend.disconnect();
        self.state = ConnectionState::Disconnected;
        self.default_sink = None;
        self.last_error = Some(error);
    }

    /// Log a failure once per distinct error instead of once per poll
    fn note_error(&mut self, error: AudioError) {
        if self.last_error.as_ref() == Some(&error) {
            debug!("{}", error);
        } else {
            warn!("⚠️ {}", error);
            self.last_error = Some(error);
        }
    }
}
