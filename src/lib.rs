pub mod cli;
pub mod config;
pub mod drain;
pub mod ingest;
pub mod queue;
pub mod record;
pub mod remote;
pub mod storage;
pub mod web;
