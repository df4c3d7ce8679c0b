//! StoryQA turns a user story plus a crawled website structure into
//! executable UI test cases, runs them in a Chrome session, and produces an
//! HTML report.
//!
//! Generation (analyst, matcher, generator) is pure and synchronous;
//! crawling and execution drive a headless Chrome session; the server module
//! exposes the whole pipeline as a small JSON API with an inline UI.

pub mod analyst;
pub mod config;
pub mod executor;
pub mod explorer;
pub mod generator;
pub mod matcher;
pub mod report;
pub mod rules;
pub mod server;
pub mod session;
pub mod types;
