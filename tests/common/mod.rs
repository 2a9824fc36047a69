//! Common test utilities for mpme integration tests

#[allow(dead_code)]
pub mod fakes;

#[allow(unused_imports)]
pub use fakes::*;

use mpme::Config;
use mpme::config::RetryConfig;
use std::path::Path;

/// Config writing into `download_dir`, with immediate retries and no self-update
#[allow(dead_code)]
pub fn test_config(download_dir: &Path, max_attempts: u32) -> Config {
    let mut config = Config::default();
    config.download.download_dir = download_dir.to_path_buf();
    config.download.update_downloader = false;
    config.retry = RetryConfig::immediate(max_attempts);
    config
}
