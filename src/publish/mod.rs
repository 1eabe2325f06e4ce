// Outbound side: subscriber registry and the gRPC streaming surface.
pub mod proto;      // wire messages + service glue
pub mod publisher;  // fan-out with dead-subscriber pruning
pub mod server;     // SubscribeBook handler and listener

pub use publisher::{Publisher, Subscriber, SubscriberId};
pub use server::BookStreamService;
