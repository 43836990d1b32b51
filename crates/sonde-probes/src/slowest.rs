use std::sync::{Arc, Mutex};

use sonde_core::{FinalizeFn, Summary, SummaryBuilder};
use tracing::debug;

/// Summary builder subscribing to `wall_time_ms` broadcasts and rendering
/// the slowest test locations at run end, one right-aligned entry per
/// test.
pub fn slowest_tests(limit: usize) -> SummaryBuilder {
    SummaryBuilder::new(move |stream, summary| {
        summary.title("slowest tests");
        let seen: Arc<Mutex<Vec<(String, f64)>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            stream.subscribe(move |broadcast| {
                if broadcast.metric != "wall_time_ms" {
                    return;
                }
                match broadcast.value.as_f64() {
                    Some(elapsed) => seen
                        .lock()
                        .expect("slowest samples lock")
                        .push((broadcast.location.clone(), elapsed)),
                    None => debug!(location = %broadcast.location, "ignoring non-numeric wall time"),
                }
            });
        }
        Ok(Some(Box::new(move |summary: &mut Summary| {
            let mut rows = seen.lock().expect("slowest samples lock").clone();
            rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            rows.truncate(limit);
            for (location, elapsed) in rows {
                summary.entry(location, format!("{elapsed:.1} ms"));
            }
            Ok(())
        }) as FinalizeFn))
    })
}
