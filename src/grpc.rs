//! Backend channel construction and stream aggregation.
//!
//! Every inbound HTTP request turns into exactly one streaming RPC: open the
//! call under a fresh deadline, drain the stream into domain records in
//! arrival order, and map open failures to a typed error the handler can
//! translate to a status code. No retries; one failed attempt is terminal for
//! that request.

use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tokio_stream::StreamExt;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Response, Status, Streaming};
use tracing::warn;

use crate::proto::brewery_service_client::BreweryServiceClient;
use crate::proto::{Brewery, Filter};
use crate::records::BreweryRecord;

/// Failure to complete a dispatch call.
///
/// Only failures to *open* the stream abort a request; a mid-stream error is
/// drained leniently and the partial aggregate is served.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("backend unavailable: {0}")]
    Unavailable(Status),

    #[error("backend deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("backend error: {0}")]
    Backend(Status),
}

impl DispatchError {
    fn from_open_status(status: Status, budget: Duration) -> Self {
        match status.code() {
            Code::Unavailable => Self::Unavailable(status),
            Code::DeadlineExceeded | Code::Cancelled => Self::DeadlineExceeded(budget),
            _ => Self::Backend(status),
        }
    }
}

/// Open a lazily-connected plaintext channel to the backend.
///
/// The dial is non-blocking: the gateway keeps serving (and reporting health)
/// while the backend is down, and connection failures surface per call as
/// [`DispatchError::Unavailable`].
pub fn open_channel(addr: &str) -> Result<Channel, tonic::transport::Error> {
    Ok(Endpoint::from_shared(format!("http://{}", addr))?.connect_lazy())
}

/// Client-side dispatcher over the brewery catalog's streaming interface.
///
/// Holds the shared channel and the per-request deadline budget. Cloning is
/// cheap; clones share the underlying connection.
#[derive(Debug, Clone)]
pub struct BreweryDispatch {
    client: BreweryServiceClient<Channel>,
    request_timeout: Duration,
}

impl BreweryDispatch {
    pub fn new(channel: Channel, request_timeout: Duration) -> Self {
        Self {
            client: BreweryServiceClient::new(channel),
            request_timeout,
        }
    }

    /// Catalog listing for the given filter, in stream order.
    pub async fn list(&self, filter: Filter) -> Result<Vec<BreweryRecord>, DispatchError> {
        let deadline = Instant::now() + self.request_timeout;
        let mut client = self.client.clone();
        self.aggregate(client.list_breweries(Request::new(filter)), deadline)
            .await
    }

    /// Catalog search for the given filter, in stream order.
    pub async fn search(&self, filter: Filter) -> Result<Vec<BreweryRecord>, DispatchError> {
        let deadline = Instant::now() + self.request_timeout;
        let mut client = self.client.clone();
        self.aggregate(client.search_breweries(Request::new(filter)), deadline)
            .await
    }

    /// Open the call and drain the stream, all under one deadline.
    async fn aggregate<F>(
        &self,
        open: F,
        deadline: Instant,
    ) -> Result<Vec<BreweryRecord>, DispatchError>
    where
        F: Future<Output = Result<Response<Streaming<Brewery>>, Status>>,
    {
        let stream = match timeout_at(deadline, open).await {
            Ok(Ok(response)) => response.into_inner(),
            Ok(Err(status)) => {
                return Err(DispatchError::from_open_status(status, self.request_timeout))
            }
            Err(_) => return Err(DispatchError::DeadlineExceeded(self.request_timeout)),
        };
        Ok(drain(stream, deadline).await)
    }
}

/// Drain a streaming response into records, in arrival order.
///
/// Lenient mid-stream policy: an error item is logged and draining continues
/// with whatever was already received (a tonic stream is terminal after an
/// error, so the following poll ends it). Deadline expiry mid-drain is
/// handled the same way.
async fn drain(mut stream: Streaming<Brewery>, deadline: Instant) -> Vec<BreweryRecord> {
    let mut records = Vec::new();
    loop {
        match timeout_at(deadline, stream.next()).await {
            Ok(Some(Ok(brewery))) => records.push(BreweryRecord::from(brewery)),
            Ok(Some(Err(status))) => {
                warn!(error = %status, received = records.len(), "stream error mid-drain");
            }
            Ok(None) => break,
            Err(_) => {
                warn!(received = records.len(), "deadline elapsed mid-drain");
                break;
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_status_mapping() {
        let budget = Duration::from_secs(10);

        let err =
            DispatchError::from_open_status(Status::unavailable("connection refused"), budget);
        assert!(matches!(err, DispatchError::Unavailable(_)));

        let err = DispatchError::from_open_status(Status::deadline_exceeded("too slow"), budget);
        assert!(matches!(err, DispatchError::DeadlineExceeded(_)));

        let err = DispatchError::from_open_status(Status::cancelled("gave up"), budget);
        assert!(matches!(err, DispatchError::DeadlineExceeded(_)));

        let err = DispatchError::from_open_status(Status::internal("boom"), budget);
        assert!(matches!(err, DispatchError::Backend(_)));
    }

    #[test]
    fn test_open_channel_rejects_bad_address() {
        assert!(open_channel("not a host:port\u{0}").is_err());
    }

    #[test]
    fn test_error_display_carries_cause() {
        let err = DispatchError::Unavailable(Status::unavailable("connection refused"));
        let text = err.to_string();
        assert!(text.contains("unavailable"));
        assert!(text.contains("connection refused"));
    }
}
