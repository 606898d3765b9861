pub mod cache;
pub mod detect;
pub mod document;
pub mod extract;
pub mod fetch;
pub mod identity;
pub mod listing;
pub mod notify;
pub mod pipeline;
pub mod rank;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod urls;
