use anyhow::Result;
use futures::future::BoxFuture;
use std::collections::HashMap;

use crate::collectors::query::QueryExecutor;
use crate::collectors::sample::SampleSink;

#[macro_use]
mod register_macro;

pub trait Collector {
    /// Unique key, also the suffix of the `--collector.<name>` flag.
    fn name(&self) -> &'static str;

    fn help(&self) -> &'static str;

    /// Oldest server version the collector supports, `major * 10000 + minor * 100 + patch`.
    fn min_version(&self) -> i32;

    /// Run the collector's queries and push samples into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails on every dialect variant or a
    /// structured value (transaction set, log file name) cannot be parsed.
    /// Samples already emitted stay in the sink.
    fn collect<'a>(&'a self, db: &'a dyn QueryExecutor, sink: &'a SampleSink) -> BoxFuture<'a, Result<()>>;

    fn enabled_by_default(&self) -> bool {
        false
    }
}

pub mod gtid;
pub mod parse;
pub mod query;
pub mod sample;
pub mod scraper;
pub mod util;

register_collectors! {
    global_status => GlobalStatusCollector,
    master_status => MasterStatusCollector,
    slave_status => SlaveStatusCollector,
    user => UserCollector,
}

pub mod config;
pub mod registry;
