//! Offset-based pages over all readings, newest first.

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::models::Reading;
use crate::queries::ReadingQuery;
use crate::store::Store;

/// A requested page window. Both values are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Create a request, raising zero values to 1.
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Number of rows before the first row of this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// One page of rows plus the totals it was computed against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total_records: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Convert every row, keeping the window and totals.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            rows: self.rows.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total_records: self.total_records,
            total_pages: self.total_pages,
        }
    }
}

/// Number of pages needed for `total_records` rows; zero when empty.
pub fn total_pages(total_records: u64, limit: u64) -> u64 {
    total_records.div_ceil(limit.max(1))
}

impl Store {
    /// Fetch one page of readings, newest first.
    ///
    /// The count and the window are read in the same transaction, so the
    /// totals always describe the rows returned. A page past the end is
    /// empty, not an error.
    pub fn get_page(&self, request: &PageRequest) -> Result<Page<Reading>> {
        let tx = self.conn.unchecked_transaction()?;

        let total_records = self.count_readings(None)?;
        let query = ReadingQuery::new()
            .limit(request.limit)
            .offset(request.offset());
        let rows = self.query_readings(&query)?;

        tx.commit()?;

        debug!(
            "Page {} (limit {}): {} rows of {}",
            request.page,
            request.limit,
            rows.len(),
            total_records
        );

        Ok(Page {
            rows,
            page: request.page,
            limit: request.limit,
            total_records,
            total_pages: total_pages(total_records, request.limit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewReading;
    use time::Duration;
    use time::macros::datetime;

    fn seeded_store(count: i64) -> Store {
        let store = Store::open_in_memory().unwrap();
        let start = datetime!(2024-01-01 00:00:00 UTC);
        for i in 0..count {
            let reading = NewReading::new("A", i as f64, start + Duration::seconds(i));
            store.insert_reading(&reading).unwrap();
        }
        store
    }

    #[test]
    fn test_page_request_clamps_to_one() {
        let request = PageRequest::new(0, 0);
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, 1);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_page_request_offset_saturates() {
        let request = PageRequest::new(u64::MAX, u64::MAX);
        assert_eq!(request.offset(), u64::MAX);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(3, 2), 2);
    }

    #[test]
    fn test_empty_store_has_no_pages() {
        let store = Store::open_in_memory().unwrap();
        let page = store.get_page(&PageRequest::new(1, 10)).unwrap();

        assert!(page.rows.is_empty());
        assert_eq!(page.total_records, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn test_first_page_is_newest() {
        let store = seeded_store(25);
        let page = store.get_page(&PageRequest::new(1, 10)).unwrap();

        assert_eq!(page.rows.len(), 10);
        assert_eq!(page.rows[0].lux, 24.0);
        assert_eq!(page.rows[9].lux, 15.0);
        assert_eq!(page.total_records, 25);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_last_page_is_partial() {
        let store = seeded_store(25);
        let page = store.get_page(&PageRequest::new(3, 10)).unwrap();

        let lux: Vec<f64> = page.rows.iter().map(|r| r.lux).collect();
        assert_eq!(lux, vec![4.0, 3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let store = seeded_store(5);
        let page = store.get_page(&PageRequest::new(4, 2)).unwrap();

        assert!(page.rows.is_empty());
        assert_eq!(page.page, 4);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_insert_then_first_page_shows_it() {
        let store = seeded_store(3);
        let id = store
            .insert_reading(&NewReading::new("B", 99.0, datetime!(2030-01-01 00:00:00 UTC)))
            .unwrap();

        let page = store.get_page(&PageRequest::new(1, 10)).unwrap();
        assert_eq!(page.rows[0].id, id);
    }

    #[test]
    fn test_same_second_readings_page_by_id() {
        let store = Store::open_in_memory().unwrap();
        let at = datetime!(2024-01-01 00:00:00 UTC);
        let first = store.insert_reading(&NewReading::new("A", 1.0, at)).unwrap();
        let second = store.insert_reading(&NewReading::new("A", 2.0, at)).unwrap();

        let page1 = store.get_page(&PageRequest::new(1, 1)).unwrap();
        let page2 = store.get_page(&PageRequest::new(2, 1)).unwrap();
        assert_eq!(page1.rows[0].id, second);
        assert_eq!(page2.rows[0].id, first);
    }

    #[test]
    fn test_page_map_keeps_totals() {
        let store = seeded_store(3);
        let page = store.get_page(&PageRequest::new(1, 2)).unwrap();
        let ids = page.map(|r| r.id);

        assert_eq!(ids.rows.len(), 2);
        assert_eq!(ids.total_records, 3);
        assert_eq!(ids.total_pages, 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn total_pages_is_ceiling(total in 0u64..1_000_000, limit in 1u64..10_000) {
                let pages = total_pages(total, limit);
                prop_assert!(pages * limit >= total);
                if total > 0 {
                    prop_assert!((pages - 1) * limit < total);
                } else {
                    prop_assert_eq!(pages, 0);
                }
            }

            #[test]
            fn pages_partition_the_dataset(count in 0i64..40, limit in 1u64..12) {
                let store = seeded_store(count);
                let first = store.get_page(&PageRequest::new(1, limit)).unwrap();
                let pages = first.total_pages;

                let mut seen = Vec::new();
                for page in 1..=pages + 1 {
                    let result = store.get_page(&PageRequest::new(page, limit)).unwrap();
                    prop_assert!(result.rows.len() as u64 <= limit);
                    if page > pages {
                        prop_assert!(result.rows.is_empty());
                    }
                    seen.extend(result.rows.iter().map(|r| (r.recorded_at, r.id)));
                }

                prop_assert_eq!(seen.len() as i64, count);
                // Strictly descending across page boundaries
                prop_assert!(seen.windows(2).all(|w| w[0] > w[1]));
            }
        }
    }
}
