use std::time::Duration;

/// Delay inserted between sequential calls to stay under the API rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// No delay. Meant for tests and for callers that pace themselves.
    #[default]
    None,
    /// The same delay after every call.
    Fixed(Duration),
    /// `base * 2^step`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Pacing {
    pub fn fixed_secs(secs: u64) -> Self {
        Pacing::Fixed(Duration::from_secs(secs))
    }

    /// Delay to apply after the `step`-th call (zero based).
    pub fn delay(&self, step: usize) -> Duration {
        match *self {
            Pacing::None => Duration::ZERO,
            Pacing::Fixed(delay) => delay,
            Pacing::Exponential { base, max } => {
                let shift = step.min(16) as u32;
                base.saturating_mul(1u32 << shift).min(max)
            }
        }
    }

    pub async fn pause(&self, step: usize) {
        let delay = self.delay(step);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
