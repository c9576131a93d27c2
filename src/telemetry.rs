use crate::scoring::Decision;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    scoring_duration: Histogram<u64>,
    decision_counter: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        // TODO: deprecated crate to be replaced with an OLTP exporter
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .unwrap();

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("presence_gate");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        // Buckets cover whole-burst scoring, not single-frame inference.
        let boundaries = generate_boundaries((50, 250, 1000, 5000, 10000));

        let scoring_duration = meter
            .u64_histogram("scoring_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of presence scoring in milliseconds")
            .build();

        let decision_counter = meter
            .u64_counter("decisions_total")
            .with_description("Verification decisions by outcome")
            .build();

        Metrics {
            request_counter,
            scoring_duration,
            decision_counter,
            registry,
        }
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_scoring_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.scoring_duration.record(duration_ms, &attributes);
    }

    pub fn record_decision(&self, decision: Decision) {
        let attributes = vec![KeyValue::new("decision", decision.as_str())];
        self.decision_counter.add(1, &attributes);
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 25;
    let middle_step: usize = 50;
    let end_step: usize = 250;
    let tail_step: usize = 1000;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let parts = (100, 200, 400, 1000, 3000);
        let get = generate_boundaries(parts);
        let expected = vec![
            100.0, 125.0, 150.0, 175.0, 200.0, 250.0, 300.0, 350.0, 400.0, 650.0, 900.0, 1000.0,
            2000.0, 3000.0,
        ];

        assert_eq!(get, expected);
    }
}
