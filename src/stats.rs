use itertools::Itertools;
use std::io::Write;
use std::rc::Rc;
use tracing::{error, info};

use crate::bus::{Event, EventBus, Subscription, Topic};
use crate::store::{Snippet, SnippetId, SnippetStore};
use crate::util::{minutes, round2};

/// Persists practice counters whenever a session completes
#[derive(Debug)]
pub struct StatsRecorder {
    subscription: Subscription,
}

impl StatsRecorder {
    pub fn attach<S: SnippetStore + ?Sized + 'static>(store: Rc<S>, bus: &EventBus) -> Self {
        let subscription = bus.subscribe(Topic::Completed, move |event| {
            let Event::Completed { id, elapsed_ms } = *event else {
                return;
            };
            match store.record_completion(id, elapsed_ms) {
                Ok(snippet) => info!(
                    id,
                    elapsed_ms,
                    test_count = snippet.test_count,
                    total_ms = snippet.elapsed,
                    "completion recorded"
                ),
                Err(e) => error!(id, elapsed_ms, error = %e, "failed to record completion"),
            }
        });

        Self { subscription }
    }

    pub fn detach(self) {
        self.subscription.cancel();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub id: SnippetId,
    pub title: String,
    pub count: u32,
    pub elapsed_ms: u64,
}

impl SummaryRow {
    pub fn minutes(&self) -> f64 {
        round2(minutes(self.elapsed_ms))
    }
}

/// Totals across every snippet plus one row per snippet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub total_tests: u64,
    pub total_elapsed_ms: u64,
    pub rows: Vec<SummaryRow>,
}

impl Summary {
    pub fn from_snippets(snippets: &[Snippet]) -> Self {
        let rows: Vec<SummaryRow> = snippets
            .iter()
            .sorted_by_key(|s| s.id)
            .map(|s| SummaryRow {
                id: s.id,
                title: s.title.clone(),
                count: s.test_count,
                elapsed_ms: s.elapsed,
            })
            .collect();

        Self {
            total_tests: rows.iter().map(|r| u64::from(r.count)).sum(),
            total_elapsed_ms: rows.iter().map(|r| r.elapsed_ms).sum(),
            rows,
        }
    }

    pub fn total_minutes(&self) -> f64 {
        round2(minutes(self.total_elapsed_ms))
    }
}

/// Write the per-snippet rows as CSV with a header line
pub fn write_csv<W: Write>(summary: &Summary, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["id", "title", "count", "minutes"])?;
    for row in &summary.rows {
        wtr.write_record([
            row.id.to_string(),
            row.title.clone(),
            row.count.to_string(),
            format!("{:.2}", row.minutes()),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn snippet(id: SnippetId, title: &str, count: u32, elapsed: u64) -> Snippet {
        Snippet {
            id,
            title: title.to_string(),
            code: "code".to_string(),
            test_count: count,
            elapsed,
        }
    }

    #[test]
    fn recorder_counts_completions() {
        let store = Rc::new(SqliteStore::open_in_memory().unwrap());
        let id = store.create(&Snippet::new("dfs", "visit(n)")).unwrap();
        let bus = EventBus::new();
        let _recorder = StatsRecorder::attach(Rc::clone(&store), &bus);

        bus.publish(Event::Completed { id, elapsed_ms: 1_500 });
        bus.publish(Event::Completed { id, elapsed_ms: 500 });

        let stored = store.get(id).unwrap().unwrap();
        assert_eq!(stored.test_count, 2);
        assert_eq!(stored.elapsed, 2_000);
    }

    #[test]
    fn recorder_survives_unknown_snippet() {
        let store = Rc::new(SqliteStore::open_in_memory().unwrap());
        let bus = EventBus::new();
        let _recorder = StatsRecorder::attach(Rc::clone(&store), &bus);

        assert_eq!(bus.publish(Event::Completed { id: 404, elapsed_ms: 500 }), 1);
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn detached_recorder_stops_counting() {
        let store = Rc::new(SqliteStore::open_in_memory().unwrap());
        let id = store.create(&Snippet::new("bfs", "queue.pop()")).unwrap();
        let bus = EventBus::new();
        StatsRecorder::attach(Rc::clone(&store), &bus).detach();

        bus.publish(Event::Completed { id, elapsed_ms: 500 });
        assert_eq!(store.get(id).unwrap().unwrap().test_count, 0);
        assert_eq!(bus.subscriber_count(Topic::Completed), 0);
    }

    #[test]
    fn summary_totals() {
        let summary = Summary::from_snippets(&[
            snippet(2, "b", 3, 90_000),
            snippet(1, "a", 1, 30_000),
        ]);

        assert_eq!(summary.total_tests, 4);
        assert_eq!(summary.total_elapsed_ms, 120_000);
        assert_eq!(summary.total_minutes(), 2.0);
        assert_eq!(summary.rows[0].id, 1);
        assert_eq!(summary.rows[1].minutes(), 1.5);
    }

    #[test]
    fn empty_summary() {
        let summary = Summary::from_snippets(&[]);
        assert_eq!(summary, Summary::default());
        assert_eq!(summary.total_minutes(), 0.0);
    }

    #[test]
    fn csv_output() {
        let summary = Summary::from_snippets(&[snippet(1, "union, find", 2, 45_000)]);
        let mut out = Vec::new();
        write_csv(&summary, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id,title,count,minutes\n1,\"union, find\",2,0.75\n");
    }
}
