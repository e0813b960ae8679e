//! Screenshot retrieval.
//!
//! Instrument filesystems differ per deployment: the preferred screen
//! folder may not exist, drives may be remapped, and the store command
//! reports nothing useful when it writes nowhere. Retrieval therefore
//! walks an ordered list of candidate remote directories, verifies the
//! stored file through a directory listing, and streams the first file it
//! can confirm back through the block decoder. Remote cleanup is a
//! separate call because the caller decides when it is done with the file.

use super::SpectrumAnalyzer;
use crate::error::ScpiError;
use crate::types::ScreenCapture;
use chrono::Local;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// What one candidate directory produced.
enum Attempt {
    /// File transferred and written locally.
    Captured(ScreenCapture),
    /// Listing succeeded and the file was not there; try the next one.
    NotStored,
}

impl SpectrumAnalyzer {
    /// Capture the instrument screen and transfer it to a local PNG file.
    ///
    /// Walks the configured candidate remote directories in order and
    /// returns at the first one that yields a locally written file. When
    /// `local_path` is `None` a timestamped name in the working directory
    /// is used. Fails with [`ScpiError::NoFile`] carrying the last
    /// observed error once every candidate is exhausted.
    ///
    /// The remote copy is left in place; pass the returned remote path to
    /// [`delete_remote_file`](Self::delete_remote_file) to clean it up.
    pub fn capture_screen(
        &mut self,
        local_path: Option<&Path>,
    ) -> Result<ScreenCapture, ScpiError> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        self.capture_screen_stamped(local_path, &stamp)
    }

    fn capture_screen_stamped(
        &mut self,
        local_path: Option<&Path>,
        stamp: &str,
    ) -> Result<ScreenCapture, ScpiError> {
        self.ensure_connected()?;

        let local_path: PathBuf = match local_path {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(format!("screenshot_{stamp}.png")),
        };
        let remote_name = format!("Screenshot_{stamp}.PNG");

        let candidates = self.remote_dirs.clone();
        let mut last_error: Option<String> = None;
        for dir in &candidates {
            match self.try_candidate(dir, &remote_name, &local_path) {
                Ok(Attempt::Captured(capture)) => return Ok(capture),
                Ok(Attempt::NotStored) => {
                    info!("capture: {remote_name} not present in {dir}, trying next candidate");
                }
                Err(e) => {
                    warn!("capture: candidate {dir} failed: {e}");
                    last_error = Some(e.to_string());
                }
            }
        }

        warn!("capture: all candidate directories exhausted");
        Err(ScpiError::NoFile { last_error })
    }

    /// Store, verify and transfer through one candidate directory.
    fn try_candidate(
        &mut self,
        dir: &str,
        remote_name: &str,
        local_path: &Path,
    ) -> Result<Attempt, ScpiError> {
        let remote_path = format!("{}\\{}", dir.trim_end_matches('\\'), remote_name);
        info!("capture: trying {remote_path}");

        self.session
            .send(&format!(":MMEM:STOR:SCR \"{remote_path}\""))?;
        self.session.query_opc_sync()?;
        // The instrument keeps writing after OPC reports complete.
        if !self.screen_settle.is_zero() {
            std::thread::sleep(self.screen_settle);
        }

        match self.session.query(&format!(":MMEM:CAT? \"{dir}\"")) {
            Ok(listing) if !listing.contains(remote_name) => return Ok(Attempt::NotStored),
            Ok(_) => {}
            // Inconclusive: the file may well be there, so attempt the
            // transfer anyway rather than discarding a good candidate.
            Err(e) => warn!("capture: directory listing failed ({e}), attempting transfer"),
        }

        let transfer_timeout = self.transfer_timeout;
        let transfer_chunk = self.transfer_chunk;
        let data = self
            .session
            .with_limits(Some(transfer_timeout), Some(transfer_chunk), |session| {
                session.query_block(&format!(":MMEM:DATA? \"{remote_path}\""))
            })?;

        info!(
            "capture: writing {} bytes to {}",
            data.len(),
            local_path.display()
        );
        std::fs::write(local_path, &data)
            .map_err(|e| ScpiError::io(format!("writing {}", local_path.display()), e))?;

        Ok(Attempt::Captured(ScreenCapture {
            local_path: local_path.to_path_buf(),
            remote_path,
        }))
    }

    /// Delete a remote file left behind by a capture. Takes the exact
    /// remote path a prior capture returned. Reports success as `true`;
    /// failures (including deleting a path that is already gone) are
    /// logged and reported as `false`, never raised.
    pub fn delete_remote_file(&mut self, remote_path: &str) -> bool {
        let result = self
            .session
            .send(&format!(":MMEM:DEL \"{remote_path}\""))
            .and_then(|_| self.session.query_opc_sync());
        match result {
            Ok(()) => {
                info!("deleted remote file {remote_path}");
                true
            }
            Err(e) => {
                warn!("failed to delete remote file {remote_path}: {e}");
                false
            }
        }
    }
}
