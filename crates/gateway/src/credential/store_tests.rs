// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn record(id: &ScopeSetId) -> CredentialRecord {
    let mut raw = serde_json::Map::new();
    raw.insert("token_type".to_owned(), serde_json::json!("Bearer"));
    raw.insert("nested".to_owned(), serde_json::json!({"a": [1, 2, {"b": null}]}));
    CredentialRecord {
        scope_set_id: id.clone(),
        access_token: "ya29.token".to_owned(),
        expires_at: Some(1_900_000_000),
        refresh_token: Some("1//refresh".to_owned()),
        scopes: vec!["https://www.googleapis.com/auth/documents.readonly".to_owned()],
        raw,
    }
}

#[test]
fn load_missing_is_none() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = FileCredentialStore::open(dir.path())?;
    assert_eq!(store.load(&ScopeSetId::new("docs")?)?, None);
    Ok(())
}

#[test]
fn save_then_load_round_trips_exactly() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = FileCredentialStore::open(dir.path())?;
    let id = ScopeSetId::new("docs")?;
    let rec = record(&id);

    store.save(&id, &rec)?;

    assert_eq!(store.load(&id)?, Some(rec));
    assert!(dir.path().join("docs.json").exists());
    Ok(())
}

#[test]
fn save_overwrites_and_leaves_no_temp_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = FileCredentialStore::open(dir.path())?;
    let id = ScopeSetId::new("drive")?;
    let mut rec = record(&id);

    store.save(&id, &rec)?;
    rec.access_token = "ya29.second".to_owned();
    rec.refresh_token = None;
    store.save(&id, &rec)?;

    assert_eq!(store.load(&id)?, Some(rec));
    let names: Vec<String> = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["drive.json"]);
    Ok(())
}

#[test]
fn scope_sets_are_stored_separately() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = FileCredentialStore::open(dir.path())?;
    let docs = ScopeSetId::new("docs")?;
    let drive = ScopeSetId::new("drive")?;

    store.save(&docs, &record(&docs))?;

    assert!(store.load(&docs)?.is_some());
    assert_eq!(store.load(&drive)?, None);
    Ok(())
}

#[yare::parameterized(
    truncated = { b"{\"scope_set_id\": \"docs\", \"access_tok" },
    not_json  = { b"\x00\x01garbage" },
    empty     = { b"" },
    wrong_set = { b"{\"scope_set_id\": \"drive\", \"access_token\": \"x\"}" },
)]
fn unreadable_bytes_are_corrupt(bytes: &[u8]) {
    let outcome = (|| -> anyhow::Result<bool> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("docs.json"), bytes)?;
        let store = FileCredentialStore::open(dir.path())?;
        Ok(matches!(store.load(&ScopeSetId::new("docs")?), Err(StoreError::Corrupt { .. })))
    })();
    assert!(matches!(outcome, Ok(true)), "{outcome:?}");
}

#[test]
fn open_creates_nested_directory() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let nested = dir.path().join("state").join("credentials");
    let store = FileCredentialStore::open(&nested)?;
    assert!(nested.is_dir());
    let id = ScopeSetId::new("docs")?;
    store.save(&id, &record(&id))?;
    assert!(nested.join("docs.json").is_file());
    Ok(())
}

#[test]
fn write_atomic_replaces_file_and_syncs_its_directory() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("drive.json");

    write_atomic(&path, b"first")?;
    write_atomic(&path, b"second")?;
    sync_parent_dir(&path)?;

    assert_eq!(std::fs::read(&path)?, b"second");
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
    Ok(())
}

#[test]
fn write_atomic_into_missing_directory_fails_cleanly() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gone").join("docs.json");

    assert!(write_atomic(&path, b"x").is_err());
    assert!(!path.exists());
    Ok(())
}
