//! Query rewrites used to scope, normalize and archive insight queries.
//!
//! ## Modules
//!
//! - [`defaults`] - Merge default parameters without overriding the user
//! - [`repos`] - Restrict a query to an explicit set of repositories
//! - [`insight`] - Turn the pattern into an `output.extra` compute directive
//! - [`single_repo`] - Decide whether a query targets exactly one repository
//! - [`replacer`] - Swap the pattern of a compound query for a new value
//!
//! Every function here is pure: it parses its own tree, transforms it and
//! renders the result, so all of them can be called from any number of
//! threads at once.

pub mod defaults;
pub mod insight;
pub mod replacer;
pub mod repos;
pub mod single_repo;

pub use defaults::{code_insights_query_defaults, global_query, with_defaults};
pub use insight::{compute_insight_command_query, Dimension};
pub use replacer::PatternReplacer;
pub use repos::{escape_repo_name, multi_repo_query, single_repo_query, COUNT_UNLIMITED};
pub use single_repo::is_single_repo_query;
