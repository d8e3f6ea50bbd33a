//! End-to-end ingestion tests with local providers and stores.

mod ingest_flow;
