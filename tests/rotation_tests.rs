use chrono::{TimeZone, Utc};
use logspool::record::{Record, RecordFormat};
use logspool::storage::rotating::backup_path;
use logspool::storage::{RotatingWriter, RotationPolicy, RotationUnit};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const MB: u64 = 1024 * 1024;

fn generation_of(path: &Path) -> Vec<char> {
    let text = fs::read_to_string(path).unwrap();
    let mut gens: Vec<char> = text
        .lines()
        .map(|line| {
            line.split_once("] ")
                .and_then(|(_, content)| content.chars().next())
                .unwrap()
        })
        .collect();
    gens.dedup();
    gens
}

/// Append 64KB records tagged with `tag` until the active file is at least 1MB
async fn fill_generation(writer: &RotatingWriter, tag: char) {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let path = writer.active_path_at(now);
    let payload = "x".repeat(64 * 1024);

    let mut i = 0;
    loop {
        let record = Record::with_timestamp(now, format!("{}-{:03}-{}", tag, i, payload));
        writer.append_at(&[record], now).await.unwrap();
        i += 1;
        if fs::metadata(&path).unwrap().len() >= MB {
            break;
        }
    }
}

#[tokio::test]
async fn test_one_megabyte_two_backups_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let writer = RotatingWriter::new(
        temp_dir.path(),
        RotationPolicy {
            max_size_bytes: MB,
            backup_count: 2,
            unit: RotationUnit::Daily,
        },
        RecordFormat::Plain,
    )
    .unwrap();

    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let active = writer.active_path_at(now);
    assert!(active.ends_with("2024-03-01.log"));

    fill_generation(&writer, 'A').await;
    assert!(!backup_path(&active, 1).exists());

    // First rotation: .1 holds the full generation, active holds only the new record
    let report = writer
        .append_at(&[Record::with_timestamp(now, "B-first")], now)
        .await
        .unwrap();
    assert!(report.rotated);
    assert_eq!(generation_of(&backup_path(&active, 1)), vec!['A']);
    assert!(fs::metadata(backup_path(&active, 1)).unwrap().len() >= MB);
    assert_eq!(
        fs::read_to_string(&active).unwrap(),
        "[2024-03-01T12:00:00.000000Z] B-first\n"
    );

    fill_generation(&writer, 'B').await;
    fill_generation(&writer, 'C').await;
    assert_eq!(generation_of(&backup_path(&active, 2)), vec!['A']);
    assert_eq!(generation_of(&backup_path(&active, 1)), vec!['B']);
    assert_eq!(generation_of(&active), vec!['C']);

    // Third and fourth rotations push the oldest generations off the chain
    fill_generation(&writer, 'D').await;
    assert_eq!(generation_of(&backup_path(&active, 2)), vec!['B']);
    fill_generation(&writer, 'E').await;

    assert_eq!(generation_of(&backup_path(&active, 2)), vec!['C']);
    assert_eq!(generation_of(&backup_path(&active, 1)), vec!['D']);
    assert_eq!(generation_of(&active), vec!['E']);
    assert!(!backup_path(&active, 3).exists());
    assert_eq!(writer.stats().rotations, 4);

    let files = fs::read_dir(temp_dir.path()).unwrap().count();
    assert_eq!(files, 3);
}

#[tokio::test]
async fn test_appends_below_threshold_never_rotate() {
    let temp_dir = TempDir::new().unwrap();
    let writer = RotatingWriter::new(
        temp_dir.path(),
        RotationPolicy {
            max_size_bytes: MB,
            backup_count: 2,
            unit: RotationUnit::Hourly,
        },
        RecordFormat::Json,
    )
    .unwrap();

    let now = Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap();
    for i in 0..200 {
        let report = writer
            .append_at(&[Record::with_timestamp(now, format!("line {}", i))], now)
            .await
            .unwrap();
        assert!(!report.rotated);
    }

    let active = writer.active_path_at(now);
    assert!(active.ends_with("2024-03-01-07.log"));
    assert!(!backup_path(&active, 1).exists());
    assert_eq!(fs::read_to_string(&active).unwrap().lines().count(), 200);
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
}
