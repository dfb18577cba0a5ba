//! End-to-end tests for ECUWatch live under `tests/`; this crate has no
//! library code of its own.
