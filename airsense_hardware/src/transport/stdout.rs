use std::io::Write;

use airsense_traits::{BoxError, PublishChannel};

use crate::error::HwError;

/// Writes each payload as one line on stdout (JSON lines). Always connected.
#[derive(Debug, Default)]
pub struct StdoutChannel;

impl PublishChannel for StdoutChannel {
    fn connect(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn publish(&mut self, _topic: &str, payload: &[u8]) -> Result<(), BoxError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        out.write_all(payload)
            .and_then(|_| out.write_all(b"\n"))
            .and_then(|_| out.flush())
            .map_err(|e| Box::new(HwError::Io(e)) as BoxError)
    }

    fn is_connected(&self) -> bool {
        true
    }
}
