//! Graceful-shutdown behavior over real sockets.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_stream::Stream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use brewdispatch::gateway::{router, AppState};
use brewdispatch::grpc::{open_channel, BreweryDispatch};
use brewdispatch::health::HealthState;
use brewdispatch::lifecycle::{serve, ServeError, Shutdown};
use brewdispatch::proto::brewery_service_server::{BreweryService, BreweryServiceServer};
use brewdispatch::proto::{Brewery, Filter};

type BreweryStream = Pin<Box<dyn Stream<Item = Result<Brewery, Status>> + Send>>;

/// Mock catalog that emits `count` items, pausing between each, so a request
/// can be held in flight across a shutdown trigger.
#[derive(Clone)]
struct SlowCatalog {
    count: usize,
    emit_delay: Duration,
}

impl SlowCatalog {
    fn stream(&self) -> BreweryStream {
        let count = self.count;
        let delay = self.emit_delay;
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tokio::spawn(async move {
            for id in 0..count {
                tokio::time::sleep(delay).await;
                let brewery = Brewery {
                    id: id as i64,
                    name: format!("brewery-{id}"),
                    ..Default::default()
                };
                if tx.send(Ok(brewery)).await.is_err() {
                    return;
                }
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }
}

#[tonic::async_trait]
impl BreweryService for SlowCatalog {
    type ListBreweriesStream = BreweryStream;

    async fn list_breweries(
        &self,
        _request: Request<Filter>,
    ) -> Result<Response<Self::ListBreweriesStream>, Status> {
        Ok(Response::new(self.stream()))
    }

    type SearchBreweriesStream = BreweryStream;

    async fn search_breweries(
        &self,
        _request: Request<Filter>,
    ) -> Result<Response<Self::SearchBreweriesStream>, Status> {
        Ok(Response::new(self.stream()))
    }
}

async fn start_backend(mock: SlowCatalog) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder()
            .add_service(BreweryServiceServer::new(mock))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .ok();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("127.0.0.1:{}", addr.port())
}

async fn start_gateway(
    backend_addr: &str,
    grace: Duration,
) -> (
    std::net::SocketAddr,
    Arc<HealthState>,
    Shutdown,
    tokio::task::JoinHandle<Result<(), ServeError>>,
) {
    let channel = open_channel(backend_addr).unwrap();
    let dispatch = BreweryDispatch::new(channel, Duration::from_secs(10));
    let health = Arc::new(HealthState::new());
    let app = router(
        AppState {
            dispatch,
            health: health.clone(),
        },
        &["*".to_string()],
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(serve(
        listener,
        app,
        health.clone(),
        shutdown.clone(),
        grace,
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, health, shutdown, handle)
}

#[tokio::test]
async fn test_inflight_request_completes_after_interrupt() {
    let backend = start_backend(SlowCatalog {
        count: 3,
        emit_delay: Duration::from_millis(150),
    })
    .await;
    let (addr, health, shutdown, handle) = start_gateway(&backend, Duration::from_secs(5)).await;
    assert!(health.uptime().is_some());

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            format!("GET /breweries HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n")
                .as_bytes(),
        )
        .await
        .unwrap();

    // Request is mid-stream when the shutdown lands.
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.trigger();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
    assert!(response.contains("brewery-2"), "got: {response}");
    assert!(health.is_draining());

    assert!(handle.await.unwrap().is_ok());

    // Listener is closed; new connections are refused.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_drain_deadline_exceeded_is_fatal() {
    let backend = start_backend(SlowCatalog {
        count: 50,
        emit_delay: Duration::from_millis(100),
    })
    .await;
    let (addr, _health, shutdown, handle) =
        start_gateway(&backend, Duration::from_millis(300)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            format!("GET /breweries HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n")
                .as_bytes(),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.trigger();

    // The streamed response outlives the grace period while the client is
    // still connected, so the drain must give up rather than hang.
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(ServeError::ShutdownTimeout)));

    drop(stream);
}
