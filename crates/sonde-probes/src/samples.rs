use sonde_core::{ProbeError, ProbeResult};

/// Numeric sample accumulator for probes that reduce what they observed
/// at exit time. Reductions over zero samples fail with an
/// empty-reduction error, which probe teardown downgrades to a warning.
#[derive(Debug, Clone, Default)]
pub struct Samples {
    context: String,
    values: Vec<f64>,
}

impl Samples {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> ProbeResult<f64> {
        self.reduce("min", |acc, v| acc.min(v))
    }

    pub fn max(&self) -> ProbeResult<f64> {
        self.reduce("max", |acc, v| acc.max(v))
    }

    pub fn mean(&self) -> ProbeResult<f64> {
        if self.values.is_empty() {
            return Err(self.empty("mean"));
        }
        Ok(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    fn reduce(&self, op: &str, fold: impl Fn(f64, f64) -> f64) -> ProbeResult<f64> {
        let mut iter = self.values.iter().copied();
        let first = iter.next().ok_or_else(|| self.empty(op))?;
        Ok(iter.fold(first, fold))
    }

    fn empty(&self, op: &str) -> ProbeError {
        ProbeError::empty_reduction(format!("{} over '{}'", op, self.context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reductions_over_samples() {
        let mut samples = Samples::new("latency");
        for v in [3.0, 1.0, 2.0] {
            samples.push(v);
        }
        assert_eq!(samples.min().unwrap(), 1.0);
        assert_eq!(samples.max().unwrap(), 3.0);
        assert_eq!(samples.mean().unwrap(), 2.0);
    }

    #[test]
    fn empty_reductions_are_recoverable_errors() {
        let samples = Samples::new("latency");
        let err = samples.min().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "reduction over an empty sample set: min over 'latency'"
        );
    }
}
