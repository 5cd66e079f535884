// Time-window filter: keep only items at or after the cutoff.

use chrono::{Duration, NaiveDateTime};

use super::Item;

/// Oldest instant still considered in-window: `now - days_limit`. A window
/// reaching past the calendar keeps everything.
pub fn cutoff(now: NaiveDateTime, days_limit: i64) -> NaiveDateTime {
    Duration::try_days(days_limit.max(0))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(NaiveDateTime::MIN)
}

pub fn in_window(item: &Item, cutoff: NaiveDateTime) -> bool {
    item.timestamp() >= cutoff
}

/// Drop items older than `cutoff`, preserving order.
pub fn filter_window(items: Vec<Item>, cutoff: NaiveDateTime) -> Vec<Item> {
    items
        .into_iter()
        .filter(|item| in_window(item, cutoff))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn item(id: &str, ts: NaiveDateTime) -> Item {
        Item::new(id, "", format!("https://x.com/a/status/{id}"), "a", ts).unwrap()
    }

    #[test]
    fn boundary_item_is_kept() {
        let now = at(10, 12);
        let cut = cutoff(now, 3);
        assert_eq!(cut, at(7, 12));
        let kept = filter_window(
            vec![item("1", at(7, 12)), item("2", at(7, 11)), item("3", at(9, 0))],
            cut,
        );
        let ids: Vec<&str> = kept.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn order_is_preserved() {
        let cut = at(1, 0);
        let kept = filter_window(
            vec![item("b", at(3, 0)), item("a", at(5, 0)), item("c", at(2, 0))],
            cut,
        );
        let ids: Vec<&str> = kept.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn window_past_the_calendar_keeps_everything() {
        let now = at(10, 12);
        assert_eq!(cutoff(now, 1_000_000_000), NaiveDateTime::MIN);
        assert_eq!(cutoff(now, i64::MAX), NaiveDateTime::MIN);
        assert_eq!(filter_window(vec![item("1", at(1, 0))], cutoff(now, i64::MAX)).len(), 1);
    }
}
