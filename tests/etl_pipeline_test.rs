//! Integration tests for loading, encoding, cleaning and storing datasets.

use std::fs;
use std::path::Path;

use relief::dataset::*;
use relief::error::{ReliefError, Result};

const CATEGORY_NAMES: [&str; 36] = [
    "related",
    "request",
    "offer",
    "aid_related",
    "medical_help",
    "medical_products",
    "search_and_rescue",
    "security",
    "military",
    "child_alone",
    "water",
    "food",
    "shelter",
    "clothing",
    "money",
    "missing_people",
    "refugees",
    "death",
    "other_aid",
    "infrastructure_related",
    "transport",
    "buildings",
    "electricity",
    "tools",
    "hospitals",
    "shops",
    "aid_centers",
    "other_infrastructure",
    "weather_related",
    "floods",
    "storm",
    "fire",
    "earthquake",
    "cold",
    "other_weather",
    "direct_report",
];

/// Packed category string with the given categories set to `value`.
fn packed(positive: &[(&str, i64)]) -> String {
    CATEGORY_NAMES
        .iter()
        .map(|name| {
            let value = positive
                .iter()
                .find(|(n, _)| n == name)
                .map_or(0, |(_, v)| *v);
            format!("{name}-{value}")
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn write_sources(dir: &Path, messages: &[(i64, &str, &str)], categories: &[(i64, String)]) {
    let mut m = String::from("id,message,original,genre\n");
    for (id, text, genre) in messages {
        m.push_str(&format!("{id},\"{text}\",,{genre}\n"));
    }
    let mut c = String::from("id,categories\n");
    for (id, cats) in categories {
        c.push_str(&format!("{id},{cats}\n"));
    }
    fs::write(dir.join("messages.csv"), m).unwrap();
    fs::write(dir.join("categories.csv"), c).unwrap();
}

fn load(dir: &Path) -> Result<LabeledDataset> {
    let raw = DataLoader::new().load(dir.join("messages.csv"), dir.join("categories.csv"))?;
    LabelEncoder::new().process(&raw)
}

#[test]
fn test_water_request_scenario() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_sources(
        dir.path(),
        &[(1, "Water is needed", "direct")],
        &[(1, packed(&[("related", 1), ("request", 1), ("water", 1)]))],
    );

    let dataset = load(dir.path())?;
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.spec().len(), 36);

    let row = &dataset.rows()[0];
    assert_eq!(row.message.genre, Genre::Direct);
    for (index, name) in dataset.spec().iter().enumerate() {
        let expected = u8::from(matches!(name, "related" | "request" | "water"));
        assert_eq!(row.labels.get(index), Some(expected), "category {name}");
    }
    Ok(())
}

#[test]
fn test_related_two_is_remapped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_sources(
        dir.path(),
        &[(1, "Is the road open", "social")],
        &[(1, packed(&[("related", 2)]))],
    );

    let dataset = load(dir.path())?;
    let related = dataset.spec().index_of("related").unwrap();
    assert_eq!(dataset.rows()[0].labels.get(related), Some(1));
    assert_eq!(LabelVector::normalize_value(2)?, LabelVector::normalize_value(1)?);
    Ok(())
}

#[test]
fn test_duplicates_dropped_and_clean_is_idempotent() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cats = packed(&[("related", 1), ("food", 1)]);
    write_sources(
        dir.path(),
        &[
            (1, "We need food", "direct"),
            (2, "We need food", "direct"),
            (3, "We need food", "news"),
        ],
        &[(1, cats.clone()), (2, cats.clone()), (3, cats)],
    );

    let dataset = load(dir.path())?;
    assert_eq!(dataset.len(), 2);

    let again = LabelEncoder::new().clean(dataset.clone())?;
    assert_eq!(again, dataset);
    Ok(())
}

#[test]
fn test_every_row_is_binary_and_full_width() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_sources(
        dir.path(),
        &[
            (1, "Storm damaged houses", "news"),
            (2, "Need medicine", "direct"),
            (3, "Earthquake again", "social"),
        ],
        &[
            (1, packed(&[("related", 2), ("storm", 1), ("buildings", 1)])),
            (2, packed(&[("related", 1), ("medical_help", 1)])),
            (3, packed(&[("earthquake", 1)])),
        ],
    );

    let dataset = load(dir.path())?;
    for row in dataset.rows() {
        assert_eq!(row.labels.len(), 36);
        assert!(row.labels.values().iter().all(|&v| v <= 1));
    }
    Ok(())
}

#[test]
fn test_ordering_mismatch_in_later_row() {
    let dir = tempfile::tempdir().unwrap();
    let swapped = packed(&[]).replacen("related-0;request-0", "request-0;related-0", 1);
    write_sources(
        dir.path(),
        &[(1, "first", "direct"), (2, "second", "direct")],
        &[(1, packed(&[])), (2, swapped)],
    );

    assert!(matches!(load(dir.path()), Err(ReliefError::SchemaMismatch(_))));
}

#[test]
fn test_missing_category_row_under_left_join() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(
        dir.path(),
        &[(1, "first", "direct"), (2, "orphan", "direct")],
        &[(1, packed(&[]))],
    );

    assert!(matches!(load(dir.path()), Err(ReliefError::MissingKey(_))));

    let raw = DataLoader::new()
        .with_policy(JoinPolicy::Inner)
        .load(dir.path().join("messages.csv"), dir.path().join("categories.csv"))
        .unwrap();
    assert_eq!(LabelEncoder::new().process(&raw).unwrap().len(), 1);
}

#[test]
fn test_unreadable_source_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = DataLoader::new().load(dir.path().join("nope.csv"), dir.path().join("nope2.csv"));
    assert!(matches!(result, Err(ReliefError::Io(_))));
}

#[test]
fn test_store_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_sources(
        dir.path(),
        &[
            (1, "Water is needed", "direct"),
            (2, "Roads are flooded", "news"),
            (3, "Roads are flooded", "news"),
            (4, "Tents for families", "social"),
        ],
        &[
            (1, packed(&[("related", 1), ("water", 1)])),
            (2, packed(&[("related", 2), ("floods", 1)])),
            (3, packed(&[("related", 2), ("floods", 1)])),
            (4, packed(&[("shelter", 1)])),
        ],
    );
    let cleaned = load(dir.path())?;

    let store = DatasetStore::new(dir.path().join("relief.db"));
    assert_eq!(store.save(&cleaned)?, 3);
    let reloaded = store.load()?;
    assert_eq!(LabelEncoder::new().clean(reloaded)?, cleaned);

    // Saving again replaces the table.
    store.save(&cleaned)?;
    assert_eq!(store.load()?.len(), 3);

    let summary = DatasetSummary::from_dataset(&cleaned);
    assert_eq!(summary.total_messages, 3);
    assert_eq!(summary.category_count("related"), Some(2));
    assert_eq!(summary.categories[0].name, "related");
    Ok(())
}
