//! Pipeline meters on top of the OpenTelemetry metrics API.
//!
//! Marks go to whatever meter provider the process installed globally; with
//! none installed they are dropped.

use opentelemetry::global;
use opentelemetry::metrics::Counter;

use crate::traits::Meter;

/// Instrumentation scope of every docingest instrument.
pub const METER_NAME: &str = "docingest";

/// Marked once per message whose timestamp had to be replaced.
pub const INVALID_TIMESTAMPS: &str = "messages.invalid-timestamps";

pub fn meter(name: &'static str) -> opentelemetry::metrics::Meter {
    global::meter(name)
}

/// Counts messages written with a replaced timestamp.
#[derive(Clone)]
pub struct InvalidTimestampMeter {
    counter: Counter<u64>,
}

impl Default for InvalidTimestampMeter {
    fn default() -> Self {
        let counter = meter(METER_NAME)
            .u64_counter(INVALID_TIMESTAMPS)
            .with_description("the number of messages whose timestamp was replaced")
            .build();
        Self { counter }
    }
}

impl Meter for InvalidTimestampMeter {
    fn mark(&self) {
        self.counter.add(1, &[]);
    }
}

/// Meter that drops every mark.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMeter;

impl Meter for NoopMeter {
    fn mark(&self) {}
}
