// Per-round bookkeeping: split collected items into new and already-seen,
// then merge every source's new items into one newest-first queue.

use crate::feed::Item;
use crate::store::SeenStore;

/// Split `items` by whether their id is in `store`. New ids are added to the
/// store as they are found, so an id repeated within one round (or across
/// two sources) is new only the first time.
pub fn partition_new(items: Vec<Item>, store: &mut SeenStore) -> (Vec<Item>, Vec<Item>) {
    let mut fresh = Vec::new();
    let mut seen = Vec::new();
    for item in items {
        if store.add(item.id()) {
            fresh.push(item);
        } else {
            seen.push(item);
        }
    }
    (fresh, seen)
}

/// Concatenate per-source batches in target order and sort newest first.
/// The sort is stable: equal timestamps keep their concatenated order.
pub fn aggregate(batches: Vec<Vec<Item>>) -> Vec<Item> {
    let mut queue: Vec<Item> = batches.into_iter().flatten().collect();
    queue.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn item(id: &str, source: &str, hour: u32) -> Item {
        let url = format!("https://x.com/{source}/status/{id}");
        Item::new(id, "t", &url, source, at(hour)).unwrap()
    }

    #[test]
    fn partition_marks_repeats_as_seen() {
        let mut store: SeenStore = ["100"].into_iter().collect();
        let (fresh, seen) = partition_new(
            vec![item("101", "a", 9), item("100", "a", 8), item("101", "b", 7)],
            &mut store,
        );
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id(), "101");
        assert_eq!(seen.len(), 2);
        assert!(store.contains("101"));
    }

    #[test]
    fn aggregate_is_newest_first_and_stable() {
        let queue = aggregate(vec![
            vec![item("1", "a", 5), item("2", "a", 9)],
            vec![item("3", "b", 9), item("4", "b", 7)],
        ]);
        let ids: Vec<_> = queue.iter().map(Item::id).collect();
        assert_eq!(ids, vec!["2", "3", "4", "1"]);
    }

    #[test]
    fn aggregate_of_nothing_is_empty() {
        assert!(aggregate(vec![vec![], vec![]]).is_empty());
    }
}
