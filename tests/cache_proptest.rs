// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! Property-based tests: drive the cache with random scrolls, responses and
//! structural edits against a model table, and check it never disagrees
//! with the table it mirrors.

use proptest::prelude::*;
use rowcache::cache::RangeCache;
use rowcache::fetch::FetchQueue;
use rowcache::key::KeyOf;
use rowcache::notify::ChangeLog;

// =============================================================================
// Test helpers
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
struct Row {
    id: u64,
    label: String,
}

struct ById;

impl KeyOf<Row> for ById {
    type Key = u64;

    fn key_of(&self, row: &Row) -> u64 {
        return row.id;
    }
}

type Cache = RangeCache<Row, ById, FetchQueue, ChangeLog>;

/// The remote end as the cache should see it.
struct Table {
    rows: Vec<Row>,
    next_id: u64,
    /// The rows as they were when the fetch in flight was issued.
    snapshot: Vec<Row>,
    issued: usize,
}

impl Table {
    fn new(len: usize) -> Table {
        let mut table = Table { rows: Vec::new(), next_id: 0, snapshot: Vec::new(), issued: 0 };
        table.insert(0, len);
        return table;
    }

    fn insert(&mut self, at: usize, count: usize) {
        let fresh: Vec<Row> = (0..count)
            .map(|offset| {
                let id = self.next_id + offset as u64;
                Row { id, label: format!("row {}", id) }
            })
            .collect();
        self.next_id += count as u64;
        self.rows.splice(at..at, fresh);
    }

    fn slice(&self, start: usize, end: usize) -> Vec<Row> {
        let end = end.min(self.rows.len());
        let start = start.min(end);
        return self.rows[start..end].to_vec();
    }

    /// Answer a fetch the way the remote end saw the table when the fetch
    /// was issued, even if rows moved since.
    fn answer(&self, start: usize, end: usize) -> Vec<Row> {
        let end = end.min(self.snapshot.len());
        let start = start.min(end);
        return self.snapshot[start..end].to_vec();
    }

    /// Remember the table whenever the cache issues a new fetch.
    fn track(&mut self, cache: &Cache) {
        if cache.fetcher().issued() != self.issued {
            self.issued = cache.fetcher().issued();
            self.snapshot = self.rows.clone();
        }
    }
}

/// Random operation on the cache and table
#[derive(Clone, Debug)]
enum CacheOp {
    Ensure { start_pct: f64, count: usize },
    RunPending,
    Respond,
    Fail,
    Insert { pos_pct: f64, count: usize },
    Remove { pos_pct: f64, count: usize },
    Push { start_pct: f64, count: usize },
}

fn arbitrary_cache_op() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        3 => (0.0..=1.1f64, 0usize..30).prop_map(|(start_pct, count)| CacheOp::Ensure { start_pct, count }),
        4 => Just(CacheOp::RunPending),
        4 => Just(CacheOp::Respond),
        1 => Just(CacheOp::Fail),
        2 => (0.0..=1.0f64, 1usize..6).prop_map(|(pos_pct, count)| CacheOp::Insert { pos_pct, count }),
        2 => (0.0..=1.0f64, 1usize..6).prop_map(|(pos_pct, count)| CacheOp::Remove { pos_pct, count }),
        1 => (0.0..=1.0f64, 1usize..20).prop_map(|(start_pct, count)| CacheOp::Push { start_pct, count }),
    ]
}

fn at_pct(pct: f64, len: usize) -> usize {
    return ((pct * len as f64) as usize).min(len);
}

fn apply_op(cache: &mut Cache, table: &mut Table, op: &CacheOp) {
    let len = table.rows.len();
    match op {
        CacheOp::Ensure { start_pct, count } => {
            let start = (start_pct * len as f64) as usize;
            cache.ensure_availability(start, *count);
        }
        CacheOp::RunPending => {
            cache.run_pending();
        }
        CacheOp::Respond => {
            if let Some(request) = cache.fetcher_mut().pop() {
                let rows = table.answer(request.range.start(), request.range.end());
                cache.on_response(request, rows, len).unwrap();
            }
        }
        CacheOp::Fail => {
            if let Some(request) = cache.fetcher_mut().pop() {
                cache.on_fetch_failed(request);
            }
        }
        CacheOp::Insert { pos_pct, count } => {
            let at = at_pct(*pos_pct, len);
            table.insert(at, *count);
            cache.insert_row_data(at, *count);
        }
        CacheOp::Remove { pos_pct, count } => {
            if len == 0 {
                return;
            }
            let at = at_pct(*pos_pct, len - 1);
            let count = (*count).min(len - at);
            table.rows.drain(at..at + count);
            cache.remove_row_data(at, count);
        }
        CacheOp::Push { start_pct, count } => {
            // The remote end only pushes once it has told the cache the size.
            if cache.size().is_none() {
                return;
            }
            let start = at_pct(*start_pct, len);
            let rows = table.slice(start, start + count);
            cache.set_row_data(start, rows).unwrap();
        }
    }
}

fn assert_mirrors(cache: &Cache, table: &Table) -> Result<(), TestCaseError> {
    if let Err(violation) = cache.check_invariants() {
        return Err(TestCaseError::fail(format!("{}: {:?}", violation, cache)));
    }
    if let Some(size) = cache.size() {
        prop_assert_eq!(size, table.rows.len());
    }

    let cached = cache.cached_range();
    prop_assert_eq!(cache.rows().count(), cached.len(), "hole in {}", cached);
    for (index, row) in cache.rows() {
        prop_assert_eq!(Some(row), table.rows.get(index), "row {} differs", index);
        prop_assert_eq!(cache.index_of(row), Some(index));
    }

    prop_assert!(cache.fetcher().len() <= 1, "more than one fetch in flight");
    prop_assert_eq!(cache.is_waiting_for_data(), !cache.fetcher().is_empty());
    return Ok(());
}

fn new_cache() -> Cache {
    return RangeCache::new(ById, FetchQueue::new(), ChangeLog::new());
}

// =============================================================================
// Consistency properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// After every operation the cache holds a hole-free block whose rows
    /// match the table at the same indices.
    #[test]
    fn cache_mirrors_table(
        initial in 0usize..300,
        ops in prop::collection::vec(arbitrary_cache_op(), 1..80),
    ) {
        let mut table = Table::new(initial);
        let mut cache = new_cache();

        for op in &ops {
            apply_op(&mut cache, &mut table, op);
            table.track(&cache);
            assert_mirrors(&cache, &table)?;
        }
    }

    /// Once the remote end answers everything, the requested window is
    /// fully cached.
    #[test]
    fn settled_cache_covers_request(
        initial in 1usize..300,
        ops in prop::collection::vec(arbitrary_cache_op(), 0..40),
        start_pct in 0.0..1.0f64,
        count in 1usize..30,
    ) {
        let mut table = Table::new(initial);
        let mut cache = new_cache();
        for op in &ops {
            apply_op(&mut cache, &mut table, op);
            table.track(&cache);
        }

        let len = table.rows.len();
        let start = at_pct(start_pct, len);
        let count = count.min(len - start);
        cache.ensure_availability(start, count);

        // A failed fetch waits for the next trigger; answer whatever is left.
        cache.fetcher_mut().set_enabled(true);
        if let Some(request) = cache.fetcher_mut().pop() {
            let rows = table.answer(request.range.start(), request.range.end());
            cache.on_response(request, rows, len).unwrap();
        }
        for _ in 0..16 {
            let ran = cache.run_pending();
            match cache.fetcher_mut().pop() {
                Some(request) => {
                    // Nothing moves from here on.
                    let rows = table.slice(request.range.start(), request.range.end());
                    cache.on_response(request, rows, len).unwrap();
                }
                None if !ran => break,
                None => {}
            }
        }

        assert_mirrors(&cache, &table)?;
        for index in start..start + count {
            prop_assert_eq!(cache.get_row(index), table.rows.get(index), "index {} missing", index);
        }
    }

    /// Any number of requests before the host runs the check cost at most
    /// one fetch.
    #[test]
    fn bursts_collapse_into_one_fetch(
        requests in prop::collection::vec((0usize..500, 0usize..50), 1..20),
    ) {
        let mut cache = new_cache();
        for (first, count) in &requests {
            cache.ensure_availability(*first, *count);
        }
        cache.run_pending();
        prop_assert!(cache.fetcher().issued() <= 1);
        prop_assert!(!cache.run_pending());
    }
}
