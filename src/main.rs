// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! Replays a scroll session against an in-memory remote table and prints
//! what the cache fetched and what it told the consumer.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rowcache::cache::RangeCache;
use rowcache::fetch::FetchQueue;
use rowcache::key::KeyOf;
use rowcache::notify::ChangeLog;
use rowcache::strategy::AdaptiveCacheStrategy;
use rowcache::strategy::AdaptiveConfig;

#[derive(Parser, Debug)]
#[command(name = "rowcache", about = "Simulate a scrolling consumer over a remote row table")]
struct Args {
    /// Rows in the remote table.
    #[arg(long, default_value_t = 10_000)]
    rows: usize,

    /// Rows visible at once.
    #[arg(long, default_value_t = 40)]
    viewport: usize,

    /// Rows scrolled per step.
    #[arg(long, default_value_t = 25)]
    step: usize,

    /// Number of scroll steps.
    #[arg(long, default_value_t = 200)]
    steps: usize,

    /// Insert a row at the top of the viewport every N steps (0 disables).
    #[arg(long, default_value_t = 17)]
    insert_every: usize,

    /// Default log filter, overridden by RUST_LOG.
    #[arg(long, env = "ROWCACHE_LOG", default_value = "info")]
    log_level: String,
}

#[derive(Clone, Debug)]
struct Row {
    id: u64,
    label: String,
}

struct RowId;

impl KeyOf<Row> for RowId {
    type Key = u64;

    fn key_of(&self, row: &Row) -> u64 {
        return row.id;
    }
}

/// The remote end: a table the demo mutates and answers fetches from.
struct Table {
    rows: Vec<Row>,
    next_id: u64,
}

impl Table {
    fn new(len: usize) -> Table {
        let rows = (0..len as u64)
            .map(|id| Row { id, label: format!("row {}", id) })
            .collect();
        return Table { rows, next_id: len as u64 };
    }

    fn insert(&mut self, index: usize) {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.insert(index, Row { id, label: format!("inserted {}", id) });
    }
}

type Cache = RangeCache<Row, RowId, FetchQueue, ChangeLog>;

/// Answer every queued fetch, as if the round trips completed this turn.
fn serve(cache: &mut Cache, table: &Table) -> usize {
    let mut served = 0;
    while let Some(request) = cache.fetcher_mut().pop() {
        let end = request.range.end().min(table.rows.len());
        let start = request.range.start().min(end);
        let rows = table.rows[start..end].to_vec();
        if let Err(err) = cache.on_response(request, rows, table.rows.len()) {
            tracing::error!(%err, "response rejected");
        }
        served += 1;
        cache.run_pending();
    }
    return served;
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let strategy = match AdaptiveCacheStrategy::new(AdaptiveConfig::default()) {
        Ok(strategy) => strategy,
        Err(err) => {
            eprintln!("invalid strategy config: {}", err);
            std::process::exit(2);
        }
    };

    let mut table = Table::new(args.rows);
    let mut cache = Cache::with_strategy(RowId, FetchQueue::new(), ChangeLog::new(), Box::new(strategy));

    let mut top = 0;
    let mut fetches = 0;
    for step in 0..args.steps {
        if args.insert_every > 0 && step > 0 && step % args.insert_every == 0 {
            table.insert(top);
            cache.insert_row_data(top, 1);
        }

        cache.ensure_availability(top, args.viewport);
        cache.run_pending();
        fetches += serve(&mut cache, &table);

        let visible = cache.rows().filter(|(i, _)| *i >= top && *i < top + args.viewport).count();
        if let Some(first) = cache.get_row(top) {
            tracing::info!(step, top, visible, first = %first.label, cached = %cache.cached_range(), "scrolled");
        }

        top = (top + args.step).min(table.rows.len().saturating_sub(args.viewport));
    }

    let events = cache.notifier_mut().take();
    println!(
        "{} steps, {} fetches, {} notifications, final cache {}",
        args.steps,
        fetches,
        events.len(),
        cache.cached_range(),
    );
}
