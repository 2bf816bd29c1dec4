#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qrw::query::{BasicQuery, SearchKind};
use qrw::rewrite::{
    code_insights_query_defaults, compute_insight_command_query, is_single_repo_query,
    multi_repo_query, with_defaults, Dimension, PatternReplacer,
};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    query: &'a str,
    repos: Vec<&'a str>,
    value: &'a str,
    all_repos: bool,
}

fuzz_target!(|input: Input| {
    // Rewrites return errors on bad input; they must not panic
    let query = BasicQuery::from(input.query);
    let defaults = code_insights_query_defaults(input.all_repos);

    if let Ok(once) = with_defaults(&query, &defaults) {
        let twice = with_defaults(&once, &defaults).ok();
        assert_eq!(twice.as_ref(), Some(&once));
    }
    if let Ok(scoped) = multi_repo_query(&query, &input.repos, &defaults) {
        assert_parses(&scoped);
    }
    let _ = is_single_repo_query(&query);
    if let Ok(annotated) = compute_insight_command_query(&query, Dimension::Repo) {
        assert_parses(&annotated);
    }
    if let Ok(replacer) = PatternReplacer::new(&query, SearchKind::Standard) {
        if let Ok(replaced) = replacer.replace(input.value) {
            assert_parses(&replaced);
        }
    }
});

fn assert_parses(query: &BasicQuery) {
    if let Err(e) = query.parse(SearchKind::Standard) {
        panic!("rewritten query {query:?} does not parse: {e}");
    }
}
