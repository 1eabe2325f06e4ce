// Router wires adapters -> venue books -> aggregator -> publisher
use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use crate::config::{ConnectorSettings, Settings};
use crate::market_data::adapters::{enabled_adapters, VenueAdapter};
use crate::market_data::aggregator::Aggregator;
use crate::market_data::connector::VenueConnector;
use crate::market_data::venue_book::VenueBook;
use crate::publish::Publisher;

/// Everything between the venue sockets and the gRPC publisher.
pub struct Pipeline {
    publisher: Arc<Publisher>,
    connectors: Vec<VenueConnector>,
}

impl Pipeline {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_adapters(enabled_adapters(settings), settings.connector.clone(), settings.book.depth)
    }

    /// One venue book and connector per adapter, all feeding one aggregator.
    pub fn with_adapters(adapters: Vec<Arc<dyn VenueAdapter>>, connector: ConnectorSettings, depth: usize) -> Self {
        let publisher = Arc::new(Publisher::new());
        let books: Vec<_> = adapters.iter().map(|a| VenueBook::shared(a.venue(), a.tick_size())).collect();
        let aggregator = Arc::new(Aggregator::new(books.clone(), Arc::clone(&publisher), depth));

        let connectors = adapters
            .into_iter()
            .zip(books)
            .map(|(adapter, book)| VenueConnector::new(adapter, book, aggregator.clone(), connector.clone()))
            .collect();

        Self { publisher, connectors }
    }

    pub fn publisher(&self) -> Arc<Publisher> {
        Arc::clone(&self.publisher)
    }

    pub fn connectors(&self) -> &[VenueConnector] {
        &self.connectors
    }

    pub fn start(&self) {
        for connector in &self.connectors {
            connector.start();
        }
        let venues: Vec<_> = self.connectors.iter().map(|c| c.venue()).collect();
        info!(?venues, "market data pipeline started");
    }

    /// Stops every connector concurrently.
    pub async fn stop(&self) {
        join_all(self.connectors.iter().map(|c| c.stop())).await;
        info!("market data pipeline stopped");
    }
}
