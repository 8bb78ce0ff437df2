//! Integration test helpers: an in-process session provider and launcher node.

pub mod harness;
