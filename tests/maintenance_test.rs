//! Rebuilding, clearing and garbage-collecting the index.

mod common;

use assert2::check;
use common::{TestLibrary, library};
use fulltext_mcp::{BatchMode, Extent, IndexState, LinkMode};
use rstest::rstest;

fn index_all(library: &TestLibrary, ids: &[fulltext_mcp::ItemId]) {
    let report = library
        .fulltext
        .index_items(ids, Extent::Configured, BatchMode::Continue)
        .unwrap();
    check!(report.failed.is_empty());
}

#[rstest]
fn test_purge_keeps_words_still_in_use(library: TestLibrary) {
    let first = library.add_text(1, "alpha beta");
    let second = library.add_text(2, "beta gamma");
    index_all(&library, &[first, second]);

    library.fulltext.clear_item_words(first, false).unwrap();
    let deleted = library.fulltext.purge_unused_words().unwrap();

    check!(deleted == Some(1));
    check!(library.fulltext.store().dictionary().unwrap() == ["beta", "gamma"]);
    check!(library.fulltext.store().item_words(second).unwrap() == ["beta", "gamma"]);
}

#[rstest]
fn test_dictionary_after_purge_is_union_of_item_words(library: TestLibrary) {
    let ids = [
        library.add_text(1, "one two three"),
        library.add_text(2, "three four"),
        library.add_text(3, "five six one"),
    ];
    index_all(&library, &ids);
    library.fulltext.index_string("seven", None, ids[2]).unwrap();
    library.fulltext.purge_unused_words().unwrap();

    let store = library.fulltext.store();
    let mut union: Vec<String> = ids
        .iter()
        .flat_map(|&id| store.item_words(id).unwrap())
        .collect();
    union.sort();
    union.dedup();

    check!(store.dictionary().unwrap() == union);
    check!(union == ["four", "one", "seven", "three", "two"]);
}

#[rstest]
fn test_purge_only_runs_when_needed(library: TestLibrary) {
    let id = library.add_text(1, "words here");
    index_all(&library, &[id]);

    check!(library.fulltext.purge_unused_words().unwrap() == None);

    library.fulltext.clear_item_words(id, false).unwrap();
    check!(library.fulltext.purge_unused_words().unwrap() == Some(2));
    check!(library.fulltext.purge_unused_words().unwrap() == None);
}

#[rstest]
fn test_rebuild_picks_up_changed_files(library: TestLibrary) {
    let id = library.add_text(1, "original content");
    index_all(&library, &[id]);

    let path = library.fulltext.layout().item_dir(id).join("document.txt");
    std::fs::write(&path, "revised content").unwrap();
    let report = library.fulltext.rebuild_index(false).unwrap();

    check!(report.indexed == [id]);
    check!(library.fulltext.store().item_words(id).unwrap() == ["content", "revised"]);
}

#[rstest]
fn test_rebuild_unindexed_only(library: TestLibrary) {
    let indexed = library.add_text(1, "already indexed");
    let fresh = library.add_text(2, "never indexed");
    let url = library.add_attachment(3, LinkMode::LinkedUrl, None, None, "bookmark", "");
    index_all(&library, &[indexed]);

    let report = library.fulltext.rebuild_index(true).unwrap();

    check!(report.indexed == [fresh]);
    check!(report.skipped.is_empty());
    check!(library.fulltext.get_indexed_state(fresh).unwrap() == IndexState::Indexed);
    check!(library.fulltext.get_indexed_state(url).unwrap() == IndexState::Unindexed);
}

#[rstest]
fn test_clear_index_removes_everything(library: TestLibrary) {
    let first = library.add_text(1, "alpha beta");
    let second = library.add_text(2, "gamma");
    index_all(&library, &[first, second]);

    let cleared = library.fulltext.clear_index(false).unwrap();

    check!(cleared.records == 2);
    let store = library.fulltext.store();
    check!(store.record_ids().unwrap().is_empty());
    check!(store.dictionary().unwrap().is_empty());
    check!(!store.purge_needed().unwrap());
    check!(library.fulltext.get_indexed_state(first).unwrap() == IndexState::Unindexed);

    let stats = library.fulltext.index_stats().unwrap();
    check!(stats.unindexed == 2);
    check!(stats.words == 0);
}

#[rstest]
fn test_clear_index_can_keep_linked_urls(library: TestLibrary) {
    let file = library.add_text(1, "file words");
    let url = library.add_attachment(2, LinkMode::LinkedUrl, None, None, "bookmark", "");
    index_all(&library, &[file]);
    library.fulltext.index_string("url words", None, url).unwrap();

    let cleared = library.fulltext.clear_index(true).unwrap();

    check!(cleared.records == 1);
    let store = library.fulltext.store();
    check!(store.record_ids().unwrap() == [url]);
    check!(store.dictionary().unwrap() == ["url", "words"]);
}
