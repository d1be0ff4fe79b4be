//! No library surface of its own; this crate exists to hold the
//! workspace's cross-crate conformance tests under `tests/`.
