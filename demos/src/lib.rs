//! Runnable demos for `stream-branching` live under `examples/`.
