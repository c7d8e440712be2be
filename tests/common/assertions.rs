//! Custom assertions for integration tests

use media_fetch::Event;
use std::path::Path;
use tokio::sync::broadcast::Receiver;

/// Drain every event currently buffered in `events`
pub fn drain_events(events: &mut Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Assert that `dir` holds no files at any depth
pub fn assert_no_files_left(dir: &Path) {
    if !dir.exists() {
        return;
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                panic!("staged file survived its request: {}", path.display());
            }
        }
    }
}
