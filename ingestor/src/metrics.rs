use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_messages_total",
        "Total messages received from Kafka"
    ))
    .unwrap();
    pub static ref INSERTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_inserted_total",
        "Total documents inserted into MongoDB"
    ))
    .unwrap();
    pub static ref MALFORMED_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_malformed_messages_total",
        "Total messages skipped because the payload could not be decoded"
    ))
    .unwrap();
    pub static ref EMPTY_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_empty_messages_total",
        "Total messages skipped because the payload was empty"
    ))
    .unwrap();
    pub static ref STORE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_store_failures_total",
        "Total inserts that failed; the reading is dropped"
    ))
    .unwrap();
    pub static ref CONNECT_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            "ingestor_connect_failures_total",
            "Failed connection attempts by target"
        ),
        &["target"]
    )
    .unwrap();
    pub static ref RESTARTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_restarts_total",
        "Times the worker was restarted after a crash"
    ))
    .unwrap();
    pub static ref INSERT_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ingestor_insert_latency_seconds",
            "Time taken to insert one document into MongoDB"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INSERTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MALFORMED_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EMPTY_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONNECT_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESTARTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INSERT_LATENCY_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
