//! PathTable implementation
//!
//! HashMap keyed by path, wrapped in a RwLock.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDateTime;
use parking_lot::RwLock;

use super::PathEntry;

/// In-memory table of visited paths
pub struct PathTable {
    data: RwLock<HashMap<String, NaiveDateTime>>,
}

impl PathTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace the visit time for `path` (write lock)
    ///
    /// Returns `true` if the path was not tracked before.
    pub fn upsert(&self, path: String, last_visited: NaiveDateTime) -> bool {
        self.data.write().insert(path, last_visited).is_none()
    }

    /// Last visit time for `path` (read lock)
    pub fn get(&self, path: &str) -> Option<NaiveDateTime> {
        self.data.read().get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Snapshot of every entry, most recent first
    pub fn by_recency(&self) -> Vec<PathEntry> {
        let mut entries: Vec<PathEntry> = {
            let data = self.data.read();
            data.iter()
                .map(|(path, ts)| PathEntry::new(path.clone(), *ts))
                .collect()
        };
        entries.sort_by(recency_order);
        entries
    }
}

impl Default for PathTable {
    fn default() -> Self {
        Self::new()
    }
}

fn recency_order(a: &PathEntry, b: &PathEntry) -> Ordering {
    b.last_visited
        .cmp(&a.last_visited)
        .then_with(|| a.path.cmp(&b.path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::thread;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_new_table_is_empty() {
        let table = PathTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(table.by_recency().is_empty());
    }

    #[test]
    fn test_upsert_replaces_timestamp() {
        let table = PathTable::new();

        assert!(table.upsert("/a/b".to_string(), at(9, 0, 0)));
        assert!(!table.upsert("/a/b".to_string(), at(10, 0, 0)));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("/a/b"), Some(at(10, 0, 0)));
    }

    #[test]
    fn test_older_write_still_wins_if_last() {
        // Last write wins, even if it carries an earlier timestamp
        let table = PathTable::new();
        table.upsert("/a".to_string(), at(10, 0, 0));
        table.upsert("/a".to_string(), at(8, 0, 0));
        assert_eq!(table.get("/a"), Some(at(8, 0, 0)));
    }

    #[test]
    fn test_by_recency_orders_newest_first() {
        let table = PathTable::new();
        table.upsert("/a".to_string(), at(9, 0, 0));
        table.upsert("/b".to_string(), at(9, 0, 1));
        table.upsert("/c".to_string(), at(9, 0, 2));

        let paths: Vec<String> = table.by_recency().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["/c", "/b", "/a"]);
    }

    #[test]
    fn test_equal_timestamps_fall_back_to_path_order() {
        let table = PathTable::new();
        table.upsert("/zeta".to_string(), at(12, 0, 0));
        table.upsert("/alpha".to_string(), at(12, 0, 0));
        table.upsert("/mid".to_string(), at(12, 0, 0));
        table.upsert("/newest".to_string(), at(12, 0, 1));

        let paths: Vec<String> = table.by_recency().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["/newest", "/alpha", "/mid", "/zeta"]);
    }

    #[test]
    fn test_concurrent_upserts_of_distinct_paths() {
        let table = Arc::new(PathTable::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for i in 0..50 {
                        table.upsert(format!("/t{}/d{}", t, i), at(1, 0, 0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.len(), 400);
    }
}
