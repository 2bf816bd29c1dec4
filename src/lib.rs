//! # QRW - Search Query Rewriting Engine
//!
//! QRW rewrites queries written in a small boolean search language
//! (`field:value` filters combined with AND/OR, plus a literal, regexp or
//! structural pattern) before they are executed or archived as the query of
//! a recurring insight series.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`query`] - Query tree, parser and printer
//! - [`rewrite`] - Defaults, repository scoping, insight annotation,
//!   single-repository analysis and pattern replacement
//! - [`error`] - The error taxonomy shared by every rewrite
//! - [`config`] - CLI configuration
//!
//! ## Quick Start
//!
//! ```
//! use qrw::query::{BasicQuery, Parameter};
//! use qrw::rewrite::{multi_repo_query, with_defaults};
//!
//! let defaults = vec![Parameter::new("archived", "no"), Parameter::new("fork", "no")];
//!
//! let query = with_defaults(&BasicQuery::from("repo:myrepo testquery"), &defaults).unwrap();
//! assert_eq!(query.as_str(), "archived:no fork:no repo:myrepo testquery");
//!
//! let scoped =
//!     multi_repo_query(&BasicQuery::from("testquery"), &["repo1", "repo2"], &defaults).unwrap();
//! assert_eq!(
//!     scoped.as_str(),
//!     "archived:no fork:no count:99999999 testquery repo:^(repo1|repo2)$"
//! );
//! ```
//!
//! ## Concurrency
//!
//! Every operation parses its own tree, transforms it and renders the result.
//! Nothing is cached or shared between calls, so any operation may be called
//! from many threads at once without coordination.

pub mod config;
pub mod error;
pub mod query;
pub mod rewrite;

pub use error::{Result, RewriteError};
