use super::SpectrumAnalyzer;
use crate::error::ScpiError;
use crate::scpi::block;
use crate::types::Trace;
use log::{debug, warn};

/// Trace register fetched when the caller does not name one.
pub const DEFAULT_TRACE: &str = "TRACE1";

/// Reconstruct the frequency axis for `n` samples spread evenly across
/// `span_hz` around `center_hz`. The axis is derived, not transmitted:
/// `freq[i] = center - span/2 + i * span/(n-1)`.
pub fn frequency_axis(center_hz: f64, span_hz: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![center_hz],
        _ => {
            let start = center_hz - span_hz / 2.0;
            let step = span_hz / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * step).collect()
        }
    }
}

impl SpectrumAnalyzer {
    /// Fetch the named trace as binary data and pair it with the
    /// reconstructed frequency axis.
    ///
    /// The sample count actually decoded wins over the instrument's
    /// advisory `SWE:POIN?` report, which can be stale. Fails with
    /// [`ScpiError::NoData`] when the instrument returns an empty block.
    pub fn fetch_trace(&mut self, trace_name: &str) -> Result<Trace, ScpiError> {
        self.ensure_connected()?;

        // Some firmware states are already in the right format, so a
        // failure here is not fatal.
        for cmd in [":FORM REAL,32", ":FORM:BORD SWAP"] {
            if let Err(e) = self.session.send(cmd) {
                warn!("trace: format setup `{cmd}` failed: {e}");
            }
        }

        let declared_points = self.sweep_points();

        let payload = self
            .session
            .query_block(&format!("TRAC:DATA? {trace_name}"))?;
        let amplitudes_dbm = block::samples_f32_le(&payload);
        if amplitudes_dbm.is_empty() {
            return Err(ScpiError::NoData(format!(
                "trace {trace_name} returned no samples"
            )));
        }

        let n = amplitudes_dbm.len();
        if n != declared_points {
            debug!("trace: decoded {n} samples, instrument declared {declared_points}; trusting decode");
        }

        let center_hz = self
            .get_center_frequency()
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);
        let span_hz = self
            .get_span()
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(1.0);

        Ok(Trace {
            frequencies_hz: frequency_axis(center_hz, span_hz, n),
            amplitudes_dbm,
        })
    }

    /// Configured sweep point count, falling back to the default when the
    /// query fails or the response does not parse. The instrument reports
    /// the count as a float string (`"1001.0"`).
    fn sweep_points(&mut self) -> usize {
        match self.session.query("SWE:POIN?") {
            Ok(text) => match text.parse::<f64>() {
                Ok(points) => points as usize,
                Err(_) => {
                    warn!(
                        "trace: unparsable sweep point count {text:?}, using {}",
                        self.default_sweep_points
                    );
                    self.default_sweep_points
                }
            },
            Err(e) => {
                warn!(
                    "trace: sweep point query failed ({e}), using {}",
                    self.default_sweep_points
                );
                self.default_sweep_points
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::rig::{analyzer_with_script, disconnected_analyzer};
    use crate::scpi::testing::{ex, ieee_block, Reply};

    fn sample_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn axis_reconstruction_matches_linear_interpolation() {
        let axis = frequency_axis(1.0e9, 2.0e6, 5);
        assert_eq!(axis, vec![0.999e9, 0.9995e9, 1.0e9, 1.0005e9, 1.001e9]);
    }

    #[test]
    fn axis_degenerate_counts() {
        assert!(frequency_axis(1.0e9, 1.0e6, 0).is_empty());
        assert_eq!(frequency_axis(1.0e9, 1.0e6, 1), vec![1.0e9]);
    }

    #[test]
    fn fetch_trace_pairs_axis_with_samples() {
        let samples = [-10.0f32, -20.0, -30.0, -40.0, -50.0];
        let (mut analyzer, _state) = analyzer_with_script(vec![
            ex(":FORM REAL,32", Reply::None),
            ex(":FORM:BORD SWAP", Reply::None),
            ex("SWE:POIN?", Reply::Line("5".to_string())),
            ex(
                "TRAC:DATA? TRACE1",
                Reply::Bytes(ieee_block(&sample_bytes(&samples))),
            ),
            ex("FREQ:CENT?", Reply::Line("1.00000000E+09".to_string())),
            ex("FREQ:SPAN?", Reply::Line("2.00000000E+06".to_string())),
        ]);
        let trace = analyzer.fetch_trace(DEFAULT_TRACE).unwrap();
        assert_eq!(trace.amplitudes_dbm, samples);
        assert_eq!(
            trace.frequencies_hz,
            vec![0.999e9, 0.9995e9, 1.0e9, 1.0005e9, 1.001e9]
        );
    }

    #[test]
    fn decoded_count_wins_over_declared_point_count() {
        let samples = [-1.0f32, -2.0, -3.0];
        let (mut analyzer, _state) = analyzer_with_script(vec![
            ex(":FORM REAL,32", Reply::None),
            ex(":FORM:BORD SWAP", Reply::None),
            ex("SWE:POIN?", Reply::Line("1001.0".to_string())),
            ex(
                "TRAC:DATA? TRACE1",
                Reply::Bytes(ieee_block(&sample_bytes(&samples))),
            ),
            ex("FREQ:CENT?", Reply::Line("5.0E+08".to_string())),
            ex("FREQ:SPAN?", Reply::Line("1.0E+06".to_string())),
        ]);
        let trace = analyzer.fetch_trace(DEFAULT_TRACE).unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.frequencies_hz.len(), 3);
    }

    #[test]
    fn unavailable_readbacks_fall_back_to_defaults() {
        // Point query, center and span all time out; only the data block
        // answers. Axis defaults to 0 Hz center, 1 Hz span.
        let samples = [-1.0f32, -2.0];
        let (mut analyzer, _state) = analyzer_with_script(vec![
            ex(":FORM REAL,32", Reply::None),
            ex(":FORM:BORD SWAP", Reply::None),
            ex("SWE:POIN?", Reply::ReadError(std::io::ErrorKind::TimedOut)),
            ex(
                "TRAC:DATA? TRACE1",
                Reply::Bytes(ieee_block(&sample_bytes(&samples))),
            ),
            ex("FREQ:CENT?", Reply::ReadError(std::io::ErrorKind::TimedOut)),
            ex("FREQ:SPAN?", Reply::ReadError(std::io::ErrorKind::TimedOut)),
        ]);
        let trace = analyzer.fetch_trace(DEFAULT_TRACE).unwrap();
        assert_eq!(trace.frequencies_hz, vec![-0.5, 0.5]);
    }

    #[test]
    fn empty_block_is_no_data() {
        let (mut analyzer, _state) = analyzer_with_script(vec![
            ex(":FORM REAL,32", Reply::None),
            ex(":FORM:BORD SWAP", Reply::None),
            ex("SWE:POIN?", Reply::Line("1001".to_string())),
            ex("TRAC:DATA? TRACE1", Reply::Bytes(ieee_block(&[]))),
        ]);
        assert!(matches!(
            analyzer.fetch_trace(DEFAULT_TRACE),
            Err(ScpiError::NoData(_))
        ));
    }

    #[test]
    fn fetch_trace_requires_a_connection() {
        let mut analyzer = disconnected_analyzer();
        assert!(matches!(
            analyzer.fetch_trace(DEFAULT_TRACE),
            Err(ScpiError::NotConnected)
        ));
    }
}
