use {
    chrono::{DateTime, Utc},
    serde::Serialize,
};

#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub step: String,
    pub detail: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// Ordered diagnostic steps of one request. Owned by the invocation and
/// returned with its response, success or failure.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Trace {
    steps: Vec<TraceStep>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: impl Into<String>, detail: serde_json::Value) {
        let step = step.into();
        tracing::debug!(step = %step, %detail, "trace");
        self.steps.push(TraceStep {
            step,
            detail,
            at: Utc::now(),
        });
    }

    pub fn contains(&self, step: &str) -> bool {
        self.steps.iter().any(|s| s.step == step)
    }
}
