use super::GLOBAL_LABELS;
use metrics::describe_counter;

/// Counter names used across the update pipeline. The descriptions are
/// registered right after the recorder is installed, so the counters are
/// documented even before the first increment.
pub(crate) const TG_UPDATES_TOTAL: &str = "tg_updates_total";
pub(crate) const TG_UPDATES_SKIPPED_TOTAL: &str = "tg_updates_skipped_total";
pub(crate) const TG_UPDATES_SHADOW_BANNED_TOTAL: &str = "tg_updates_shadow_banned_total";
pub(crate) const USER_ACTIVITY_TOTAL: &str = "user_activity_total";

pub fn init_metrics() {
    let mut builder = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], 2000));

    for (key, value) in GLOBAL_LABELS {
        builder = builder.add_global_label(*key, *value);
    }

    builder
        .install()
        .expect("BUG: failed to initialize the metrics listener");

    describe_counter!(TG_UPDATES_TOTAL, "Number of updates received from Telegram");
    describe_counter!(
        TG_UPDATES_SKIPPED_TOTAL,
        "Number of updates that no handler matched"
    );
    describe_counter!(
        TG_UPDATES_SHADOW_BANNED_TOTAL,
        "Number of updates dropped because the sender is banned"
    );
    describe_counter!(
        USER_ACTIVITY_TOTAL,
        "Number of updates attributed to a known sender"
    );
}
