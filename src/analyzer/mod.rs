use crate::config::AppConfig;
use crate::error::ScpiError;
use crate::scpi::ScpiSession;
use std::time::Duration;

pub mod measure;
pub mod params;
pub mod screen;
pub mod trace;

pub use measure::obw_span_hz;
pub use trace::DEFAULT_TRACE;

/// High-level client for a Keysight MXA-class spectrum analyzer driven
/// over its raw-socket SCPI channel.
///
/// Owns the single [`ScpiSession`] and layers typed parameter control,
/// measurement sequences, binary trace acquisition and screenshot
/// retrieval on top of it. One instrument, one session, one caller at a
/// time; all operations block for at most the configured channel timeout.
///
/// # Examples
///
/// ```no_run
/// use rusty_span::SpectrumAnalyzer;
///
/// let mut analyzer = SpectrumAnalyzer::new("192.168.1.75:5025");
/// analyzer.connect()?;
/// analyzer.set_center_frequency(1.0e9)?;
/// let trace = analyzer.fetch_trace(rusty_span::DEFAULT_TRACE)?;
/// analyzer.disconnect();
/// # Ok::<(), rusty_span::ScpiError>(())
/// ```
pub struct SpectrumAnalyzer {
    session: ScpiSession,
    settle: Duration,
    screen_settle: Duration,
    measure_timeout: Duration,
    transfer_timeout: Duration,
    transfer_chunk: usize,
    default_sweep_points: usize,
    remote_dirs: Vec<String>,
}

impl SpectrumAnalyzer {
    /// Create a disconnected analyzer for the given `host:port` endpoint
    /// with default settings. Call [`connect`](Self::connect) before use.
    pub fn new(address: &str) -> Self {
        let mut config = AppConfig::default();
        config.instrument.address = address.to_string();
        Self::from_config(&config)
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            session: ScpiSession::from_config(&config.instrument),
            settle: Duration::from_millis(config.instrument.settle_ms),
            screen_settle: Duration::from_millis(config.screenshot.settle_ms),
            measure_timeout: Duration::from_millis(config.transfer.measure_timeout_ms),
            transfer_timeout: Duration::from_millis(config.transfer.file_timeout_ms),
            transfer_chunk: config.transfer.chunk_size,
            default_sweep_points: config.instrument.default_sweep_points,
            remote_dirs: config.screenshot.remote_dirs.clone(),
        }
    }

    pub fn builder() -> SpectrumAnalyzerBuilder {
        SpectrumAnalyzerBuilder::default()
    }

    /// Open the session. On failure the analyzer remains disconnected.
    pub fn connect(&mut self) -> Result<(), ScpiError> {
        self.session.connect()
    }

    /// Best-effort close; never raises.
    pub fn disconnect(&mut self) {
        self.session.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Standard identification query (`*IDN?`).
    pub fn identify(&mut self) -> Result<String, ScpiError> {
        self.session.query("*IDN?")
    }

    /// Raw access to the command/query channel, for SCPI not covered by
    /// the typed surface.
    pub fn session(&mut self) -> &mut ScpiSession {
        &mut self.session
    }

    pub(crate) fn ensure_connected(&self) -> Result<(), ScpiError> {
        if self.session.is_connected() {
            Ok(())
        } else {
            Err(ScpiError::NotConnected)
        }
    }
}

/// Builder for [`SpectrumAnalyzer`] instances with custom settings.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use rusty_span::SpectrumAnalyzer;
///
/// let mut analyzer = SpectrumAnalyzer::builder()
///     .address("10.0.0.12:5025")
///     .timeout(Duration::from_secs(10))
///     .build();
/// analyzer.connect()?;
/// # Ok::<(), rusty_span::ScpiError>(())
/// ```
#[derive(Default)]
pub struct SpectrumAnalyzerBuilder {
    config: AppConfig,
}

impl SpectrumAnalyzerBuilder {
    pub fn address(mut self, address: &str) -> Self {
        self.config.instrument.address = address.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.instrument.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.instrument.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.config.instrument.settle_ms = settle.as_millis() as u64;
        self
    }

    /// Replace the candidate remote directories for screenshot retrieval.
    pub fn remote_dirs(mut self, dirs: Vec<String>) -> Self {
        self.config.screenshot.remote_dirs = dirs;
        self
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SpectrumAnalyzer {
        SpectrumAnalyzer::from_config(&self.config)
    }
}
