use std::sync::LazyLock;

use prometheus::*;

static METRIC_QUERY_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "sole_query_count",
        "count of footprint queries",
        &["model", "status"]
    )
    .unwrap()
});

static METRIC_QUERY_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "sole_query_duration",
        "duration of the per-image query in seconds",
        &["model"]
    )
    .unwrap()
});

static METRIC_QUERY_TOP_SCORE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "sole_query_top_score",
        "best similarity score of the per-image query",
        &["model"],
        (-10..=10).map(|x| x as f64 / 10.0).collect()
    )
    .unwrap()
});

static METRIC_INGEST_RECORDS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "sole_ingest_records",
        "count of ingested records by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// 记录一次查询的结果与耗时
pub fn observe_query(model: &str, ok: bool, duration_secs: f64) {
    let status = if ok { "ok" } else { "error" };
    METRIC_QUERY_COUNT.with_label_values(&[model, status]).inc();
    METRIC_QUERY_DURATION.with_label_values(&[model]).observe(duration_secs);
}

/// 记录一次查询的最佳相似度
pub fn observe_top_score(model: &str, score: f64) {
    METRIC_QUERY_TOP_SCORE.with_label_values(&[model]).observe(score);
}

/// 记录一次摄取的写入统计
pub fn observe_ingest(inserted: usize, skipped: usize, failed: usize) {
    METRIC_INGEST_RECORDS.with_label_values(&["inserted"]).inc_by(inserted as u64);
    METRIC_INGEST_RECORDS.with_label_values(&["skipped"]).inc_by(skipped as u64);
    METRIC_INGEST_RECORDS.with_label_values(&["failed"]).inc_by(failed as u64);
}

/// prometheus 文本格式的指标快照
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
