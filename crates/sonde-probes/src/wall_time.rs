use std::time::Instant;

use sonde_core::{Handler, SortOrder};

/// Two-phase probe measuring the test body's wall time and emitting it as
/// a `wall_time_ms` metric (rendered slowest-first at run end).
pub fn wall_time() -> Handler {
    Handler::two_phase(
        |_reporter| Ok(Instant::now()),
        |started: Instant, reporter| {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            reporter
                .metric()
                .name("wall_time_ms")
                .sort(SortOrder::Desc)
                .format("{} ms")
                .observe(elapsed_ms)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonde_core::TestItem;

    #[test]
    fn emits_one_wall_time_metric_on_exit() {
        let item = TestItem::new("tests/a.rs", "t1", "pkg.mod");
        let mut probe = wall_time().invoke(item.reporter("wall_time")).unwrap();
        probe.enter().unwrap();
        probe.exit().unwrap();

        let metrics = item.metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name, "wall_time_ms");
        assert_eq!(metrics[0].sort, Some(SortOrder::Desc));
        assert!(metrics[0].value.as_f64().unwrap() >= 0.0);
    }
}
