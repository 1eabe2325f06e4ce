//! Wire types and gRPC server/client for `aggregator.AggregatorService`,
//! generated from `proto/aggregator.proto` at build time.

tonic::include_proto!("aggregator");
