//! Live lead feed consumer.
//!
//! [`LiveFeed`] keeps a dashboard's lead list current. It prefers a push
//! subscription and drops to a fixed-interval pull loop when the subscription
//! fails, until an operator asks it to go live again.

pub mod consumer;
pub mod error;
pub mod http;
pub mod source;

pub use consumer::{FeedState, FeedStatus, LiveFeed, POLL_INTERVAL, SUBSCRIBE_TIMEOUT};
pub use error::FeedError;
pub use http::HttpLeadFeed;
pub use source::{apply_change, ChangeStream, FeedEvent, LeadFeedSource};
