//! Integration test modules

mod concurrency;
mod jobs;
mod lifecycle;
mod node_id;
mod reaper;
mod replay;
