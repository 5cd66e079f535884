// Feedwatch: watch public account feeds and notify on new posts
//
// This is the library root. Each module corresponds to a major subsystem
// of the monitor: page sessions, feed collection, dedup, dispatch.

pub mod config;
pub mod feed;
pub mod monitor;
pub mod notify;
pub mod observe;
pub mod output;
pub mod session;
pub mod status;
pub mod store;
