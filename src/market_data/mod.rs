// Market data module entrypoint
pub mod adapters;      // venue-specific endpoints, payloads, and frame parsing
pub mod aggregator;    // merges venue books and hands updates to the publisher
pub mod connector;     // websocket session, heartbeat, reconnect
pub mod normaliser;    // converts strings -> decimals on the tick grid
pub mod router;        // wires everything together
pub mod unified_book;  // consolidated cross-venue book
pub mod venue_book;    // per-venue local book
