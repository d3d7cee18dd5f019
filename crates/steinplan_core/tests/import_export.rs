use chrono::{NaiveDate, Utc};
use serde_json::json;
use steinplan_core::db::open_db_in_memory;
use steinplan_core::{
    canonical_default, export_file_name, import_file, import_json, merge_batch, serialize_records,
    write_export, write_export_today, ExportError, FlushStatus, ImportError, ImportOutcome,
    PayloadReader, Record, RecordStore, SqliteBlobStore,
};

fn named(id: &str, name: &str) -> Record {
    let mut record = canonical_default().with_id(id);
    record.set("formatBezeichnung", name).unwrap();
    record
}

#[test]
fn export_then_import_into_empty_store_reproduces_collection() {
    let source_conn = open_db_in_memory().unwrap();
    let mut source = RecordStore::open(SqliteBlobStore::new(&source_conn));
    let mut with_images = named("1", "F100");
    with_images.add_image("data:image/png;base64,AAAA");
    with_images.set_single_image("data:image/jpeg;base64,BBBB");
    source.upsert(with_images).unwrap();
    source.upsert(named("2", "T8 MW")).unwrap();

    let document = serialize_records(source.all()).unwrap();

    let target_conn = open_db_in_memory().unwrap();
    let mut target = RecordStore::open(SqliteBlobStore::new(&target_conn));
    let outcome = import_json(&mut target, &document).unwrap();

    assert_eq!(
        outcome,
        ImportOutcome::Imported {
            imported: 2,
            skipped: 0,
            flush: FlushStatus::Flushed,
        }
    );
    assert_eq!(target.all(), source.all());
}

#[test]
fn import_never_overwrites_existing_records() {
    let conn = open_db_in_memory().unwrap();
    let mut store = RecordStore::open(SqliteBlobStore::new(&conn));
    store.upsert(named("A", "original")).unwrap();
    let before = serde_json::to_string(store.get("A").unwrap()).unwrap();

    let batch = json!([
        { "id": "A", "formatBezeichnung": "changed" },
        { "id": "B", "formatBezeichnung": "new" }
    ]);
    let outcome = merge_batch(&mut store, &batch).unwrap();

    assert_eq!(
        outcome,
        ImportOutcome::Imported {
            imported: 1,
            skipped: 1,
            flush: FlushStatus::Flushed,
        }
    );
    assert_eq!(serde_json::to_string(store.get("A").unwrap()).unwrap(), before);
    assert_eq!(store.get("B").unwrap().display_name(), "new");

    let ids: Vec<&str> = store.all().iter().map(|r| r.id().as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
}

#[test]
fn import_reconciles_partial_elements() {
    let conn = open_db_in_memory().unwrap();
    let mut store = RecordStore::open(SqliteBlobStore::new(&conn));

    import_json(&mut store, r#"[{"id": "p", "material": "Ton", "extra": 1}]"#).unwrap();

    let record = store.get("p").unwrap();
    assert_eq!(record.get("material"), Some("Ton"));
    assert_eq!(record.get("drahtnachzug"), Some("Aus"));
    assert!(record.to_json().get("extra").is_none());
}

#[test]
fn import_skips_elements_without_id_and_batch_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let mut store = RecordStore::open(SqliteBlobStore::new(&conn));

    let batch = json!([
        { "formatBezeichnung": "no id" },
        { "id": "", "formatBezeichnung": "empty id" },
        { "id": "x", "formatBezeichnung": "first" },
        { "id": "x", "formatBezeichnung": "second" },
        "not a record"
    ]);
    let outcome = merge_batch(&mut store, &batch).unwrap();

    assert_eq!(
        outcome,
        ImportOutcome::Imported {
            imported: 1,
            skipped: 4,
            flush: FlushStatus::Flushed,
        }
    );
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("x").unwrap().display_name(), "first");
}

#[test]
fn import_of_known_records_reports_nothing_new() {
    let conn = open_db_in_memory().unwrap();
    let mut store = RecordStore::open(SqliteBlobStore::new(&conn));
    store.upsert(named("A", "original")).unwrap();

    let outcome = import_json(&mut store, r#"[{"id": "A"}, {}]"#).unwrap();
    assert_eq!(outcome, ImportOutcome::NothingNew { skipped: 2 });

    let empty = import_json(&mut store, "[]").unwrap();
    assert_eq!(empty, ImportOutcome::NothingNew { skipped: 0 });
    assert_eq!(store.len(), 1);
}

#[test]
fn import_rejects_non_array_documents_without_mutation() {
    let conn = open_db_in_memory().unwrap();
    let mut store = RecordStore::open(SqliteBlobStore::new(&conn));
    store.upsert(named("A", "original")).unwrap();

    let err = import_json(&mut store, r#"{"id": "B"}"#).unwrap_err();
    assert!(matches!(err, ImportError::NotAnArray { found: "object" }));
    assert_eq!(
        err.to_string(),
        "import file must be an array of records, found object"
    );

    assert!(matches!(
        import_json(&mut store, "not json at all"),
        Err(ImportError::InvalidJson(_))
    ));
    assert_eq!(store.len(), 1);
}

#[test]
fn import_file_reads_through_payload_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.json");
    std::fs::write(&path, r#"[{"id": "f1", "formatBezeichnung": "from file"}]"#).unwrap();

    let conn = open_db_in_memory().unwrap();
    let mut store = RecordStore::open(SqliteBlobStore::new(&conn));
    let reader = PayloadReader::new();

    let outcome = import_file(&mut store, &reader, &path).unwrap();
    assert!(matches!(outcome, ImportOutcome::Imported { imported: 1, .. }));
    assert_eq!(store.get("f1").unwrap().display_name(), "from file");

    let missing = import_file(&mut store, &reader, dir.path().join("missing.json"));
    assert!(matches!(missing, Err(ImportError::Unreadable(_))));
}

#[test]
fn write_export_creates_dated_file() {
    let dir = tempfile::tempdir().unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 11, 2).unwrap();
    let records = vec![named("1", "F100"), named("2", "T8 MW")];

    let path = write_export(&records, dir.path(), date).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "steinplan-export-2024-11-02.json"
    );

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains('\n'));
    let parsed: Vec<Record> = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, records);
}

#[test]
fn write_export_today_names_file_for_utc_date() {
    let dir = tempfile::tempdir().unwrap();

    let before = Utc::now().date_naive();
    let path = write_export_today(&[named("1", "F100")], dir.path()).unwrap();
    let after = Utc::now().date_naive();

    let name = path.file_name().unwrap().to_str().unwrap().to_string();
    assert!(
        name == export_file_name(before) || name == export_file_name(after),
        "unexpected export name {name}"
    );
}

#[test]
fn write_export_refuses_empty_collection() {
    let dir = tempfile::tempdir().unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 11, 2).unwrap();

    let err = write_export(&[], dir.path(), date).unwrap_err();
    assert!(matches!(err, ExportError::NothingToExport));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn write_export_into_missing_directory_fails_with_io() {
    let dir = tempfile::tempdir().unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 11, 2).unwrap();

    let err = write_export(&[named("1", "F100")], dir.path().join("absent"), date).unwrap_err();
    assert!(matches!(err, ExportError::Io { .. }));
}
