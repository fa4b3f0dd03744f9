// File sink rotation and retention observed through the facade.

use logpump::{Config, Level, Logger, RotatePolicy};
use std::fs;
use std::path::Path;

fn rotating_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.file.enabled = true;
    config.file.path = dir.join("app.log").to_string_lossy().into_owned();
    config.file.rotate_policy = RotatePolicy::Size;
    config.file.max_size_mb = 1;
    config.file.max_files = 3;
    config
}

fn log_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .flatten()
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .filter(|n| n.starts_with("app") && n.ends_with(".log"))
        .collect();
    names.sort();
    names
}

#[test]
fn size_rotation_with_retention() {
    let dir = tempfile::tempdir().unwrap();
    let logger = Logger::new(rotating_config(dir.path())).unwrap();

    assert_eq!(logger.rotation_count(), Some(0));
    assert_eq!(
        logger.current_log_path().unwrap(),
        dir.path().join("app.log")
    );

    // ~6 MiB of payload forces at least five rotations at 1 MiB
    let payload = "r".repeat(3000);
    for i in 0..2100u32 {
        logger.log(Level::Info, "rot.rs", i, format_args!("{}", payload));
    }
    logger.flush();
    logger.shutdown();

    assert!(logger.rotation_count().unwrap() >= 5);

    // retention keeps at most max_files files, live file included
    let files = log_files(dir.path());
    assert!(!files.is_empty());
    assert!(files.len() <= 3, "retention exceeded: {:?}", files);

    // the live file moved off the base name after the first rotation
    let live = logger.current_log_path().unwrap();
    assert_ne!(live, dir.path().join("app.log"));
    assert!(live.exists());
}

#[test]
fn rotation_never_tears_a_record() {
    let dir = tempfile::tempdir().unwrap();
    let logger = Logger::new(rotating_config(dir.path())).unwrap();

    let payload = "s".repeat(2500);
    for i in 0..1500u32 {
        logger.log(Level::Info, "rot.rs", i, format_args!("{}", payload));
    }
    logger.shutdown();

    // every surviving line is a complete record ending with the payload
    let mut total_lines = 0;
    for name in log_files(dir.path()) {
        let content = fs::read_to_string(dir.path().join(&name)).unwrap();
        for line in content.lines() {
            assert!(line.ends_with(&payload), "torn record in {}", name);
            total_lines += 1;
        }
    }
    assert!(total_lines > 0);
}

#[test]
fn no_rotation_under_policy_none() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = rotating_config(dir.path());
    config.file.rotate_policy = RotatePolicy::None;
    let logger = Logger::new(config).unwrap();

    let payload = "n".repeat(3000);
    for i in 0..700u32 {
        logger.log(Level::Info, "rot.rs", i, format_args!("{}", payload));
    }
    logger.shutdown();

    assert_eq!(logger.rotation_count(), Some(0));
    assert_eq!(log_files(dir.path()), vec!["app.log".to_string()]);
}
