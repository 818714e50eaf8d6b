//! Input file loading tests

use std::fs;
use voxbatch::input::{self, InputFormat};
use voxbatch::VoxError;

#[test]
fn test_load_text_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phrases.txt");
    fs::write(&path, "Hello world\n\nПривіт світ\n").unwrap();

    let items = input::load(&path, None, "text").unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].text, "Hello world");
    assert!(items[1].is_blank());
    assert_eq!(items[2].index, 2);
}

#[test]
fn test_load_json_with_custom_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    fs::write(
        &path,
        r#"[{"sentence": "First", "speed": 1.5}, {"sentence": "Second", "language": "de"}]"#,
    )
    .unwrap();

    let items = input::load(&path, None, "sentence").unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].overrides.speed, Some(1.5));
    assert_eq!(items[1].overrides.language.as_deref(), Some("de"));
}

#[test]
fn test_explicit_format_overrides_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.dat");
    fs::write(&path, "text,speed\nHi,2\n").unwrap();

    let items = input::load(&path, Some(InputFormat::Csv), "text").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].text, "Hi");
    assert_eq!(items[0].overrides.speed, Some(2.0));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = input::load(&dir.path().join("nope.csv"), None, "text");
    assert!(matches!(result, Err(VoxError::Input(_))));
}
