use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const ROUTES: [&str; 4] = [
    "New York, USA",
    "Chennai, India",
    "Bengaluru, India",
    "London, UK",
];

pub const DEVICE_IDS: RangeInclusive<u32> = 1150..=1158;
pub const BATTERY_RANGE: RangeInclusive<f64> = 2.0..=5.0;
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 10.0..=40.0;

/// One sensor reading as it travels over the topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    pub battery_level: f64,
    pub temperature: f64,
    pub route_from: String,
    pub route_to: String,
    pub timestamp: DateTime<Utc>,
}

/// Synthesizes readings for the fixed device fleet and route list.
pub struct ReadingGenerator<R> {
    rng: R,
    skipped_routes: u64,
}

impl<R: Rng> ReadingGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            skipped_routes: 0,
        }
    }

    /// Number of draws discarded because origin and destination matched.
    pub fn skipped_routes(&self) -> u64 {
        self.skipped_routes
    }

    pub fn next_reading(&mut self) -> Reading {
        let (route_from, route_to) = loop {
            let from = self.pick_route();
            let to = self.pick_route();
            if from != to {
                break (from, to);
            }
            self.skipped_routes += 1;
        };

        Reading {
            device_id: format!("D{}", self.rng.gen_range(DEVICE_IDS)),
            battery_level: round_to(self.rng.gen_range(BATTERY_RANGE), 2),
            temperature: round_to(self.rng.gen_range(TEMPERATURE_RANGE), 1),
            route_from: route_from.to_string(),
            route_to: route_to.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn pick_route(&mut self) -> &'static str {
        ROUTES[self.rng.gen_range(0..ROUTES.len())]
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
