use chrono::{Duration, TimeZone, Utc};
use research_vault_core::model::record::format_timestamp;
use research_vault_core::{NewRecord, Record, RecordKind, RecordPatch, RecordValidationError};
use serde_json::{json, Value};
use uuid::Uuid;

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap()
}

fn sample_note() -> Record {
    NewRecord::note("Apple Q4", "strong quarter")
        .with_tags(["earnings", "Tech"])
        .with_tickers(["aapl"])
        .into_record(Uuid::new_v4(), fixed_now())
        .unwrap()
}

#[test]
fn note_requires_title_and_content() {
    assert_eq!(
        NewRecord::note("", "body").validate(),
        Err(RecordValidationError::EmptyTitle)
    );
    assert_eq!(
        NewRecord::note("title", "").validate(),
        Err(RecordValidationError::MissingContent(RecordKind::Note))
    );
    assert_eq!(
        NewRecord::research("title", "").validate(),
        Err(RecordValidationError::MissingContent(RecordKind::Research))
    );
}

#[test]
fn article_requires_url_but_not_content() {
    assert_eq!(
        NewRecord::article("Outlook", "").validate(),
        Err(RecordValidationError::MissingUrl)
    );
    assert!(NewRecord::article("Outlook", "https://example.com/a")
        .validate()
        .is_ok());
}

#[test]
fn whitespace_only_title_and_content_are_kept_verbatim() {
    let record = NewRecord::note(" ", "  ")
        .into_record(Uuid::new_v4(), fixed_now())
        .unwrap();
    assert_eq!(record.title, " ");
    assert_eq!(record.content.as_deref(), Some("  "));
}

#[test]
fn index_and_futures_symbols_are_accepted() {
    let record = NewRecord::note("Macro view", "broad market")
        .with_tickers(["^gspc", "GC=F", "brk.b"])
        .into_record(Uuid::new_v4(), fixed_now())
        .unwrap();
    assert_eq!(record.related_tickers, vec!["^GSPC", "GC=F", "BRK.B"]);
}

#[test]
fn into_record_assigns_system_fields_and_normalizes_sets() {
    let id = Uuid::new_v4();
    let record = NewRecord::note("  Apple Q4 ", " strong quarter ")
        .with_tags(["earnings", "Earnings", " "])
        .with_tickers(["aapl", "AAPL", "msft"])
        .into_record(id, fixed_now())
        .unwrap();

    assert_eq!(record.id, id);
    assert_eq!(record.kind, RecordKind::Note);
    assert_eq!(record.title, "  Apple Q4 ");
    assert_eq!(record.content.as_deref(), Some(" strong quarter "));
    assert_eq!(record.tags, vec!["earnings"]);
    assert_eq!(record.related_tickers, vec!["AAPL", "MSFT"]);
    assert_eq!(record.created_at, record.updated_at);
    assert_eq!(record.created_at_utc(), Some(fixed_now()));
}

#[test]
fn fields_outside_the_kind_are_dropped() {
    let note = NewRecord::note("t", "c")
        .with_summary("ignored")
        .with_source("ignored")
        .into_record(Uuid::new_v4(), fixed_now())
        .unwrap();
    assert_eq!(note.url, None);
    assert_eq!(note.summary, None);
    assert_eq!(note.source, None);

    let research = NewRecord::research("t", "c")
        .with_source("10-K filing")
        .with_summary("ignored")
        .into_record(Uuid::new_v4(), fixed_now())
        .unwrap();
    assert_eq!(research.source.as_deref(), Some("10-K filing"));
    assert_eq!(research.summary, None);
}

#[test]
fn serialized_record_carries_every_field_with_nulls() {
    let value = serde_json::to_value(sample_note()).unwrap();
    let object = value.as_object().unwrap();
    for key in [
        "id",
        "kind",
        "title",
        "content",
        "url",
        "summary",
        "source",
        "tags",
        "related_tickers",
        "created_at",
        "updated_at",
    ] {
        assert!(object.contains_key(key), "missing key `{key}`");
    }
    assert_eq!(object["kind"], json!("note"));
    assert_eq!(object["url"], Value::Null);
    assert_eq!(object["related_tickers"], json!(["AAPL"]));
}

#[test]
fn legacy_type_field_and_naive_timestamps_are_accepted() {
    let raw = json!({
        "id": "6f1c2b9a-3d4e-4f50-9a61-7b8c9d0e1f23",
        "type": "article",
        "title": "Tech Sector Outlook 2024",
        "url": "https://example.com/tech-outlook-2024",
        "summary": "sector trends",
        "content": null,
        "tags": ["technology"],
        "related_tickers": ["AAPL", "MSFT"],
        "created_at": "2024-01-15T08:00:00.123456",
        "updated_at": "2024-01-15T08:00:00.123456"
    });
    let record: Record = serde_json::from_value(raw).unwrap();
    assert_eq!(record.kind, RecordKind::Article);
    assert_eq!(record.source, None);
    assert!(record.created_at_utc().is_some());
}

#[test]
fn patch_changes_only_listed_fields_and_updated_at() {
    let original = sample_note();
    let mut patched = original.clone();
    let later = fixed_now() + Duration::hours(2);

    patched
        .apply_patch(RecordPatch::new().tags(["x"]), later)
        .unwrap();

    assert_eq!(patched.tags, vec!["x"]);
    assert_eq!(patched.updated_at, format_timestamp(later));
    assert_eq!(patched.id, original.id);
    assert_eq!(patched.kind, original.kind);
    assert_eq!(patched.title, original.title);
    assert_eq!(patched.content, original.content);
    assert_eq!(patched.related_tickers, original.related_tickers);
    assert_eq!(patched.created_at, original.created_at);
}

#[test]
fn patch_slots_outside_the_kind_are_ignored() {
    let mut note = sample_note();
    note.apply_patch(
        RecordPatch::new()
            .url("https://example.com")
            .summary("s")
            .source("src"),
        fixed_now(),
    )
    .unwrap();
    assert_eq!(note.url, None);
    assert_eq!(note.summary, None);
    assert_eq!(note.source, None);
}

#[test]
fn invalid_patch_leaves_record_untouched() {
    let original = sample_note();
    let mut target = original.clone();
    let err = target
        .apply_patch(RecordPatch::new().title("").tags(["new"]), fixed_now())
        .unwrap_err();
    assert_eq!(err, RecordValidationError::EmptyTitle);
    assert_eq!(target, original);
}

#[test]
fn updated_at_never_precedes_created_at() {
    let mut record = sample_note();
    let earlier = fixed_now() - Duration::days(1);
    record
        .apply_patch(RecordPatch::new().content("rewritten"), earlier)
        .unwrap();
    assert_eq!(record.updated_at, record.created_at);
    assert!(record.updated_at_utc() >= record.created_at_utc());
}

#[test]
fn tag_patch_succeeds_on_legacy_record_with_index_ticker() {
    let raw = json!({
        "id": "0b7e9d4c-1a2b-4c3d-8e9f-a0b1c2d3e4f5",
        "type": "note",
        "title": "S&P view",
        "content": "broad market",
        "tags": [],
        "related_tickers": ["^GSPC"],
        "created_at": "2024-02-01T10:00:00",
        "updated_at": "2024-02-01T10:00:00"
    });
    let mut record: Record = serde_json::from_value(raw).unwrap();
    record
        .apply_patch(RecordPatch::new().tags(["x"]), fixed_now())
        .unwrap();
    assert_eq!(record.tags, vec!["x"]);
    assert_eq!(record.related_tickers, vec!["^GSPC"]);
}
