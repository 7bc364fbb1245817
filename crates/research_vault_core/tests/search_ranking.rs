use chrono::{DateTime, Duration, TimeZone, Utc};
use research_vault_core::model::record::format_timestamp;
use research_vault_core::{
    CollectionRepository, KnowledgeBase, MemoryCollection, NewRecord, ReadFailurePolicy, Record,
    RecordKind, Scope, SearchQuery,
};
use uuid::Uuid;

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 20, 16, 0, 0).unwrap()
}

fn aged(draft: NewRecord, age_days: i64) -> Record {
    draft
        .into_record(Uuid::new_v4(), fixed_now() - Duration::days(age_days))
        .unwrap()
}

fn seeded_kb(
    notes: Vec<Record>,
    articles: Vec<Record>,
    research: Vec<Record>,
) -> KnowledgeBase<MemoryCollection> {
    KnowledgeBase::with_repositories(
        MemoryCollection::with_records(RecordKind::Note, notes),
        MemoryCollection::with_records(RecordKind::Article, articles),
        MemoryCollection::with_records(RecordKind::Research, research),
        ReadFailurePolicy::Degrade,
    )
    .unwrap()
    .with_clock(fixed_now)
}

fn empty_kb() -> KnowledgeBase<MemoryCollection> {
    seeded_kb(Vec::new(), Vec::new(), Vec::new())
}

#[test]
fn title_match_on_fresh_record_scores_three_and_a_half() {
    let note = aged(
        NewRecord::note("Apple earnings beat", "iPhone sales up"),
        1,
    );
    let kb = seeded_kb(vec![note], Vec::new(), Vec::new());

    let hits = kb.search(&SearchQuery::new("Apple")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].relevance_score, 3.5);
    assert_eq!(hits[0].collection, RecordKind::Note);
}

#[test]
fn ticker_filter_and_query_text_must_both_hold() {
    let kb = empty_kb();
    let note_id = kb
        .add_note("Apple Q4", "strong quarter", &["earnings"], &["AAPL"])
        .unwrap();
    let mut article = NewRecord::article("Tech Outlook", "https://example.com/outlook")
        .with_tickers(["AAPL", "MSFT"]);
    article.summary = Some("sector trends".to_string());
    kb.add(article).unwrap();

    let hits = kb
        .search(&SearchQuery::new("Apple").ticker("aapl"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.id, note_id);
}

#[test]
fn unmatched_tag_filter_excludes_everything() {
    let kb = empty_kb();
    kb.add_note("x marks the spot", "x", &["maps"], &[]).unwrap();

    let hits = kb
        .search(&SearchQuery::new("x").tags(["nonexistent-tag"]))
        .unwrap();
    assert!(hits.is_empty());

    let hits = kb.search(&SearchQuery::new("x").tags(["MAPS"])).unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn hits_sort_by_score_with_summary_outweighing_content() {
    let in_title = aged(NewRecord::note("Rates outlook", "nothing here"), 200);
    let in_content = aged(NewRecord::research("Macro memo", "rates are rising"), 200);
    let in_summary = aged(
        NewRecord::article("Bond note", "https://example.com/bonds").with_summary("rates path"),
        200,
    );
    let ids = [in_title.id, in_summary.id, in_content.id];
    let kb = seeded_kb(vec![in_title], vec![in_summary], vec![in_content]);

    let hits = kb.search(&SearchQuery::new("rates")).unwrap();
    let ordered = hits.iter().map(|hit| hit.record.id).collect::<Vec<_>>();
    let scores = hits
        .iter()
        .map(|hit| hit.relevance_score)
        .collect::<Vec<_>>();
    assert_eq!(ordered, ids);
    assert_eq!(scores, vec![3.0, 1.5, 1.0]);
}

#[test]
fn recency_bonus_breaks_text_ties() {
    let old = aged(NewRecord::note("Nvidia supply", "c"), 120);
    let mid = aged(NewRecord::note("Nvidia demand", "c"), 60);
    let fresh = aged(NewRecord::note("Nvidia margins", "c"), 3);
    let expected = [fresh.id, mid.id, old.id];
    let kb = seeded_kb(vec![old, mid, fresh], Vec::new(), Vec::new());

    let hits = kb.search(&SearchQuery::new("nvidia")).unwrap();
    let ordered = hits.iter().map(|hit| hit.record.id).collect::<Vec<_>>();
    assert_eq!(ordered, expected);
    assert_eq!(hits[0].relevance_score, 3.5);
    assert_eq!(hits[1].relevance_score, 3.2);
    assert_eq!(hits[2].relevance_score, 3.0);
}

#[test]
fn malformed_created_at_is_scored_without_bonus() {
    let mut broken = aged(NewRecord::note("Copper thesis", "c"), 1);
    broken.created_at = "last tuesday".to_string();
    let kb = seeded_kb(vec![broken], Vec::new(), Vec::new());

    let hits = kb.search(&SearchQuery::new("copper")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].relevance_score, 3.0);
}

#[test]
fn filter_only_match_keeps_zero_text_score_and_sorts_last() {
    let strong = aged(NewRecord::note("Energy", "energy"), 400);
    let weak = aged(NewRecord::note("Utilities", "grid").with_tickers(["NEE"]), 400);
    let strong_id = strong.id;
    let weak_id = weak.id;
    let kb = seeded_kb(vec![weak, strong], Vec::new(), Vec::new());

    let hits = kb.search(&SearchQuery::new("")).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|hit| hit.relevance_score == 0.0));

    let hits = kb.search(&SearchQuery::new("").ticker("NEE")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.id, weak_id);
    assert_eq!(hits[0].relevance_score, 0.0);

    let hits = kb.search(&SearchQuery::new("energy")).unwrap();
    assert_eq!(hits[0].record.id, strong_id);
}

#[test]
fn scope_limits_searched_collections() {
    let kb = empty_kb();
    kb.add_note("Gold", "c", &[], &[]).unwrap();
    let research_id = kb.add_research("Gold miners", "c", None, &[], &[]).unwrap();

    let hits = kb
        .search(&SearchQuery::new("gold").scope(RecordKind::Research))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.id, research_id);

    let hits = kb
        .search(&SearchQuery::new("gold").scope(Scope::All))
        .unwrap();
    assert_eq!(hits.len(), 2);
}

#[test]
fn repeated_searches_are_identical() {
    let kb = empty_kb();
    for idx in 0..12 {
        kb.add_note(&format!("q item {idx}"), "q", &[], &[]).unwrap();
    }
    kb.add_research("q", "q q", None, &[], &[]).unwrap();

    let first = kb.search(&SearchQuery::new("q")).unwrap();
    let second = kb.search(&SearchQuery::new("q")).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 13);
}

#[test]
fn search_hits_do_not_alias_stored_records() {
    let notes = MemoryCollection::new(RecordKind::Note);
    let kb = KnowledgeBase::with_repositories(
        notes,
        MemoryCollection::new(RecordKind::Article),
        MemoryCollection::new(RecordKind::Research),
        ReadFailurePolicy::Degrade,
    )
    .unwrap();
    kb.add_note("Silver", "c", &[], &[]).unwrap();

    let mut hits = kb.search(&SearchQuery::new("silver")).unwrap();
    hits[0].record.title = "changed".to_string();
    let again = kb.search(&SearchQuery::new("silver")).unwrap();
    assert_eq!(again[0].record.title, "Silver");
}

#[test]
fn seeded_timestamps_survive_memory_round_trip() {
    let record = aged(NewRecord::note("t", "c"), 10);
    let repo = MemoryCollection::with_records(RecordKind::Note, vec![record.clone()]);
    let loaded = repo.load().unwrap();
    assert_eq!(
        loaded[0].created_at,
        format_timestamp(fixed_now() - Duration::days(10))
    );
}

#[test]
fn single_space_query_only_hits_text_containing_a_space() {
    let kb = empty_kb();
    kb.add_note("Gold", "bullion", &[], &[]).unwrap();
    assert!(kb.search(&SearchQuery::new(" ")).unwrap().is_empty());

    let spaced = kb.add_note("Gold bars", "bullion", &[], &[]).unwrap();
    let hits = kb.search(&SearchQuery::new(" ")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.id, spaced);
}
