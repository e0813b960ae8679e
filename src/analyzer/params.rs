use super::SpectrumAnalyzer;
use crate::error::ScpiError;

/// Typed setters and getters for the core acquisition parameters.
///
/// Setters format the SCPI command with value and unit; getters return the
/// instrument's raw text so callers decide how to interpret it. No physical
/// range validation happens here: range constraints belong to the caller,
/// not the protocol core.
impl SpectrumAnalyzer {
    pub fn set_center_frequency(&mut self, freq_hz: f64) -> Result<(), ScpiError> {
        self.session.send(&format!("FREQ:CENT {freq_hz} Hz"))
    }

    pub fn get_center_frequency(&mut self) -> Result<String, ScpiError> {
        self.session.query("FREQ:CENT?")
    }

    pub fn set_span(&mut self, span_hz: f64) -> Result<(), ScpiError> {
        self.session.send(&format!("FREQ:SPAN {span_hz} Hz"))
    }

    pub fn get_span(&mut self) -> Result<String, ScpiError> {
        self.session.query("FREQ:SPAN?")
    }

    /// Set the resolution bandwidth.
    pub fn set_rbw(&mut self, rbw_hz: f64) -> Result<(), ScpiError> {
        self.session.send(&format!("BAND {rbw_hz} Hz"))
    }

    pub fn get_rbw(&mut self) -> Result<String, ScpiError> {
        self.session.query("BAND?")
    }

    /// Set the reference level of the display trace.
    pub fn set_ref_level(&mut self, ref_dbm: f64) -> Result<(), ScpiError> {
        self.session
            .send(&format!("DISP:WIND:TRACE:Y:SCAL:RLEV {ref_dbm} dBm"))
    }

    pub fn get_ref_level(&mut self) -> Result<String, ScpiError> {
        self.session.query("DISP:WIND:TRACE:Y:SCAL:RLEV?")
    }

    /// Switch the instrument into the swept spectrum analyzer measurement
    /// mode.
    pub fn select_spectrum_analyzer_mode(&mut self) -> Result<(), ScpiError> {
        self.session.send(":CONF:SAN")
    }

    /// Put the active trace into averaging mode.
    pub fn set_trace_average(&mut self) -> Result<(), ScpiError> {
        self.session.send(":TRAC:TYPE AVER")
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::rig::{analyzer_with_script, disconnected_analyzer};
    use crate::error::ScpiError;
    use crate::scpi::testing::{ex, Reply};

    #[test]
    fn setters_format_value_and_unit() {
        let (mut analyzer, state) = analyzer_with_script(vec![
            ex("FREQ:CENT 1000000000 Hz", Reply::None),
            ex("FREQ:SPAN 2000000 Hz", Reply::None),
            ex("BAND 1000 Hz", Reply::None),
            ex("DISP:WIND:TRACE:Y:SCAL:RLEV -10 dBm", Reply::None),
        ]);
        analyzer.set_center_frequency(1.0e9).unwrap();
        analyzer.set_span(2.0e6).unwrap();
        analyzer.set_rbw(1.0e3).unwrap();
        analyzer.set_ref_level(-10.0).unwrap();
        assert_eq!(state.borrow().writes.len(), 4);
    }

    #[test]
    fn getters_return_raw_text() {
        let (mut analyzer, _state) = analyzer_with_script(vec![ex(
            "FREQ:CENT?",
            Reply::Line("1.00000000E+09".to_string()),
        )]);
        assert_eq!(analyzer.get_center_frequency().unwrap(), "1.00000000E+09");
    }

    #[test]
    fn mode_and_trace_type_commands() {
        let (mut analyzer, state) = analyzer_with_script(vec![
            ex(":CONF:SAN", Reply::None),
            ex(":TRAC:TYPE AVER", Reply::None),
            ex("*IDN?", Reply::Line("Keysight Technologies,N9020B,MY12345678,A.25.07".to_string())),
        ]);
        analyzer.select_spectrum_analyzer_mode().unwrap();
        analyzer.set_trace_average().unwrap();
        assert!(analyzer.identify().unwrap().starts_with("Keysight"));
        assert_eq!(
            state.borrow().writes,
            vec![":CONF:SAN", ":TRAC:TYPE AVER", "*IDN?"]
        );
    }

    #[test]
    fn parameter_access_fails_fast_when_disconnected() {
        let mut analyzer = disconnected_analyzer();
        assert!(matches!(
            analyzer.set_span(1.0e6),
            Err(ScpiError::NotConnected)
        ));
        assert!(matches!(
            analyzer.get_rbw(),
            Err(ScpiError::NotConnected)
        ));
    }
}
