use std::time::{Duration, Instant};

use crate::error::Result;
use crate::store::records::Check;

use super::types::Outcome;

/// Performs the network probe for a check.
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    /// Build the shared client. Redirects are not followed: a 3xx is
    /// reported as its literal status code and judged against the check's
    /// success codes like any other.
    pub fn new() -> Result<Self> {
        let client =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build()?;
        Ok(Self { client })
    }

    /// One probe attempt, never retried within a tick.
    ///
    /// The first of three terminal events decides the outcome: a response,
    /// a transport failure, or the per-check timeout. Failures are folded
    /// into the outcome as data, never raised to the caller.
    pub async fn probe(&self, check: &Check) -> Outcome {
        let target = format!("{}://{}", check.protocol, check.url);
        let started = Instant::now();

        let request = self
            .client
            .request(check.method.as_reqwest(), &target)
            .timeout(Duration::from_secs(check.timeout_seconds));

        match request.send().await {
            Ok(response) => Outcome::response(
                response.status().as_u16(),
                started.elapsed().as_millis() as u64,
            ),
            Err(err) if err.is_timeout() => Outcome::timeout(),
            Err(err) => Outcome::failure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::monitoring::types::CheckState;
    use crate::store::records::{HttpMethod, Protocol};

    fn local_check(port: u16, timeout_seconds: u64) -> Check {
        Check {
            id: "a".repeat(20),
            phone: "01234567890".into(),
            protocol: Protocol::Http,
            url: format!("127.0.0.1:{port}"),
            method: HttpMethod::Get,
            success_codes: vec![200],
            timeout_seconds,
            state: CheckState::Down,
            last_checked: 0,
        }
    }

    /// Answer one connection with a canned status line and close it.
    async fn serve_once(listener: TcpListener, status_line: &'static str) {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response =
                format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            let _ = socket.write_all(response.as_bytes()).await;
        }
    }

    #[tokio::test]
    async fn response_status_is_captured() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_once(listener, "200 OK"));

        let outcome = Prober::new().unwrap().probe(&local_check(port, 3)).await;
        assert_eq!(outcome.response_code, Some(200));
        assert!(outcome.error.is_none());
        assert!(outcome.latency_ms.is_some());
    }

    #[tokio::test]
    async fn redirects_are_reported_literally() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = "HTTP/1.1 301 Moved Permanently\r\nlocation: http://example.com/\r\ncontent-length: 0\r\n\r\n";
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        let outcome = Prober::new().unwrap().probe(&local_check(port, 3)).await;
        assert_eq!(outcome.response_code, Some(301));
    }

    #[tokio::test]
    async fn silent_target_times_out_within_the_configured_ceiling() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept and then hold the connection open without responding.
        tokio::spawn(async move {
            if let Ok((_socket, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });

        let started = Instant::now();
        let outcome = Prober::new().unwrap().probe(&local_check(port, 1)).await;

        assert_eq!(outcome.error.as_deref(), Some("timeout"));
        assert!(outcome.response_code.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error_not_a_timeout() {
        // Bind then drop, so the port is very likely unoccupied.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = Prober::new().unwrap().probe(&local_check(port, 2)).await;
        assert!(outcome.error.is_some());
        assert_ne!(outcome.error.as_deref(), Some("timeout"));
        assert!(outcome.response_code.is_none());
    }
}
