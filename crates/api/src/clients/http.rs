use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;

use super::ClientError;

/// Lazily built `reqwest::Client` shared by every outbound adapter.
///
/// Cloning shares the same connection pool. The client is built on first use
/// and dropped with the last clone.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<OnceCell<reqwest::Client>>,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(OnceCell::new()),
            timeout,
        }
    }

    pub fn get(&self) -> Result<&reqwest::Client, ClientError> {
        self.inner.get_or_try_init(|| {
            reqwest::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(ClientError::from)
        })
    }
}

/// Turn a non-success response into `ClientError::Api`.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Api {
        service,
        status: status.as_u16(),
        body,
    })
}
