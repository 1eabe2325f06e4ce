use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};
use tracing::{info, instrument};

use crate::error::StartupError;
use crate::publish::proto::aggregator_service_server::{AggregatorService, AggregatorServiceServer};
use crate::publish::proto::{BookUpdate, SubscribeRequest};
use crate::publish::publisher::{ChannelSubscriber, Publisher, SubscriberId};

/// `SubscribeBook` handler: each call registers one channel-backed subscriber.
#[derive(Clone)]
pub struct BookStreamService {
    publisher: Arc<Publisher>,
    buffer: usize,
}

impl BookStreamService {
    pub fn new(publisher: Arc<Publisher>, buffer: usize) -> Self {
        Self { publisher, buffer: buffer.max(1) }
    }

    pub fn into_server(self) -> AggregatorServiceServer<Self> {
        AggregatorServiceServer::new(self)
    }
}

#[async_trait::async_trait]
impl AggregatorService for BookStreamService {
    type SubscribeBookStream = SubscriptionStream;

    #[instrument(skip_all, fields(peer = ?request.remote_addr()))]
    async fn subscribe_book(
        &self,
        request: Request<SubscribeRequest>,
    ) -> Result<Response<Self::SubscribeBookStream>, Status> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.publisher.subscribe(Arc::new(ChannelSubscriber::new(tx)));
        info!(subscriber = id, "client subscribed");
        let guard = SubscriptionGuard { publisher: Arc::clone(&self.publisher), id };
        Ok(Response::new(SubscriptionStream { rx, _guard: guard }))
    }
}

/// Unregisters the subscriber when tonic drops the response stream,
/// i.e. when the client cancels or disconnects.
struct SubscriptionGuard {
    publisher: Arc<Publisher>,
    id: SubscriberId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.publisher.unsubscribe(self.id);
    }
}

pub struct SubscriptionStream {
    rx: mpsc::Receiver<Result<BookUpdate, Status>>,
    _guard: SubscriptionGuard,
}

impl Stream for SubscriptionStream {
    type Item = Result<BookUpdate, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener, StartupError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })
}

/// Serve `service` on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, service: BookStreamService, shutdown: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send,
{
    let local = listener.local_addr().ok();
    info!(addr = ?local, "grpc publisher listening");
    tonic::transport::Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;
    info!("grpc publisher stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn dropping_the_stream_unsubscribes() {
        let publisher = Arc::new(Publisher::new());
        let service = BookStreamService::new(Arc::clone(&publisher), 4);

        let response = service.subscribe_book(Request::new(SubscribeRequest {})).await.unwrap();
        assert_eq!(publisher.len(), 1);

        drop(response);
        assert!(publisher.is_empty());
    }

    #[tokio::test]
    async fn stream_yields_broadcast_updates() {
        use crate::market_data::unified_book::BookUpdateMessage;

        let publisher = Arc::new(Publisher::new());
        let service = BookStreamService::new(Arc::clone(&publisher), 4);
        let mut stream = service
            .subscribe_book(Request::new(SubscribeRequest {}))
            .await
            .unwrap()
            .into_inner();

        publisher.broadcast(&BookUpdateMessage { timestamp_ms: 9, bids: vec![], asks: vec![] });
        let update = stream.next().await.unwrap().unwrap();
        assert_eq!(update.timestamp_ms, 9);
    }

    #[test]
    fn service_is_routed_under_the_proto_package() {
        use tonic::server::NamedService;
        assert_eq!(<AggregatorServiceServer<BookStreamService> as NamedService>::NAME, "aggregator.AggregatorService");
    }

    #[tokio::test]
    async fn bind_reports_address_in_use() {
        let held = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = held.local_addr().unwrap();
        match bind(addr).await {
            Err(StartupError::Bind { addr: failed, .. }) => assert_eq!(failed, addr),
            other => panic!("expected bind failure, got {:?}", other.map(|_| ())),
        }
    }
}
