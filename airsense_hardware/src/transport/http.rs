use std::time::Duration;

use airsense_traits::{BoxError, RequestSink};
use tracing::debug;

use crate::error::HwError;

/// Blocking HTTP POST sink. Non-2xx responses are returned as status codes,
/// only connection-level failures become errors.
pub struct HttpSink {
    agent: ureq::Agent,
}

impl HttpSink {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl RequestSink for HttpSink {
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        payload: &[u8],
    ) -> Result<u16, BoxError> {
        let mut req = self.agent.post(url);
        for (name, value) in headers {
            req = req.set(name, value);
        }
        match req.send_bytes(payload) {
            Ok(resp) => {
                debug!(url, status = resp.status(), "webhook delivered");
                Ok(resp.status())
            }
            Err(ureq::Error::Status(code, _)) => Ok(code),
            Err(e) => Err(Box::new(HwError::Transport(format!("POST {url}: {e}")))),
        }
    }
}
