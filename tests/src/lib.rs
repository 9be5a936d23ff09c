//! Integration tests for `stream-branching` live under `tests/`.
