//! Integration tests: the full fetch → evaluate → persist → notify cycle
//! against an in-memory feed, notifier and store.

mod mock_feed;
mod pipeline;
