pub mod analyzer;
pub mod config;
pub mod error;
pub mod scpi;
pub mod types;

pub use analyzer::measure::{obw_span_hz, DEFAULT_OBW_SPAN_HZ};
pub use analyzer::trace::{frequency_axis, DEFAULT_TRACE};
pub use analyzer::{SpectrumAnalyzer, SpectrumAnalyzerBuilder};
pub use config::{
    load_config, load_config_or_default, AppConfig, InstrumentConfig, LoggingConfig,
    ScreenshotConfig, TransferConfig,
};
pub use error::ScpiError;
pub use scpi::{ScpiSession, TcpTransport, Transport, DEFAULT_CHUNK_SIZE};
pub use types::{Reading, ScreenCapture, Trace, Unit};
