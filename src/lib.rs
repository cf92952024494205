pub mod cli;
pub mod collectors;
pub mod exporter;

pub mod built_info {
    #![allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Version string shown by `--version` and on the landing page.
#[must_use]
pub fn version() -> String {
    built_info::GIT_COMMIT_HASH_SHORT.map_or_else(
        || built_info::PKG_VERSION.to_string(),
        |hash| format!("{} - {hash}", built_info::PKG_VERSION),
    )
}
