use steinplan_core::{ImagePayload, InputSlot, PayloadError, PayloadReader};

#[test]
fn read_text_returns_file_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("import.json");
    std::fs::write(&path, "[]").unwrap();

    let reader = PayloadReader::new();
    assert_eq!(reader.read_text(InputSlot::Import, &path).unwrap(), "[]");
    assert!(!reader.is_busy(InputSlot::Import));
}

#[test]
fn read_text_rejects_binary_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.json");
    std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

    let reader = PayloadReader::new();
    assert!(matches!(
        reader.read_text(InputSlot::Import, &path),
        Err(PayloadError::NotText { .. })
    ));
    assert!(!reader.is_busy(InputSlot::Import));
}

#[test]
fn read_image_encodes_bytes_with_inferred_mime_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Mundstueck.PNG");
    let bytes = [0x89, b'P', b'N', b'G', 0x0d, 0x0a];
    std::fs::write(&path, bytes).unwrap();

    let reader = PayloadReader::new();
    let payload = reader.read_image(InputSlot::SingleImage, &path).unwrap();
    assert_eq!(payload.mime_type, "image/png");
    assert_eq!(payload.decode().unwrap(), bytes.to_vec());

    let url = payload.to_data_url();
    assert_eq!(ImagePayload::from_data_url(&url), Some(payload));
}

#[test]
fn missing_file_reports_io_and_releases_slot() {
    let dir = tempfile::tempdir().unwrap();
    let reader = PayloadReader::new();

    let err = reader
        .read_image(InputSlot::Attachment, dir.path().join("absent.jpg"))
        .unwrap_err();
    assert!(matches!(err, PayloadError::Io { .. }));
    assert!(err.to_string().contains("absent.jpg"));
    assert!(!reader.is_busy(InputSlot::Attachment));
}

#[test]
fn busy_slot_rejects_reads_but_other_slots_proceed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.jpg");
    std::fs::write(&path, b"jpeg").unwrap();

    let reader = PayloadReader::new();
    let picker_open = reader.try_acquire(InputSlot::Scan).unwrap();

    assert!(matches!(
        reader.read_image(InputSlot::Scan, &path),
        Err(PayloadError::InFlight(InputSlot::Scan))
    ));
    assert!(reader.read_image(InputSlot::Attachment, &path).is_ok());

    drop(picker_open);
    assert!(reader.read_image(InputSlot::Scan, &path).is_ok());
}
