use std::path::Path;

use crate::error::{HwError, Result};

/// Retry `op` while it reports `HwError::Timeout`, up to `max_retries` extra
/// attempts. Any other error is returned immediately.
pub fn retry_on_timeout<T>(max_retries: u32, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempts = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(HwError::Timeout) if attempts < max_retries => {
                attempts += 1;
                tracing::warn!(retries = attempts, "sensor timeout, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read a single integer attribute from sysfs (e.g. `in_voltage0_raw`).
///
/// Kernel drivers report a stalled bus as `ETIMEDOUT` and a failed CRC as
/// `EIO`; both are mapped to typed errors so callers can retry.
pub fn read_sysfs_int(path: &Path) -> Result<i64> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.raw_os_error() == Some(110) => return Err(HwError::Timeout),
        Err(e) if e.raw_os_error() == Some(5) => return Err(HwError::Checksum),
        Err(e) => return Err(HwError::Io(e)),
    };
    parse_int(&text)
}

pub(crate) fn parse_int(text: &str) -> Result<i64> {
    let t = text.trim();
    t.parse::<i64>().map_err(|_| HwError::Parse(t.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_trims_newline() {
        assert_eq!(parse_int("2048\n").unwrap(), 2048);
        assert!(matches!(parse_int("abc"), Err(HwError::Parse(_))));
    }

    #[test]
    fn retry_gives_up_after_budget() {
        let mut calls = 0;
        let r: Result<()> = retry_on_timeout(2, || {
            calls += 1;
            Err(HwError::Timeout)
        });
        assert!(matches!(r, Err(HwError::Timeout)));
        assert_eq!(calls, 3);
    }

    #[test]
    fn retry_does_not_repeat_other_errors() {
        let mut calls = 0;
        let r: Result<()> = retry_on_timeout(5, || {
            calls += 1;
            Err(HwError::Checksum)
        });
        assert!(matches!(r, Err(HwError::Checksum)));
        assert_eq!(calls, 1);
    }
}
