//! Behavioural tests for the engine, the staleness reconciler and the
//! service, run against `MemoryStore` and recording fakes.
