use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound of the risk scale shared with donor risk profiles.
pub const MAX_RISK_SCORE: u32 = 100;

/// Pattern families the threat detector can flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThreatIndicator {
    SqlInjection,
    Xss,
    SuspiciousAgent,
}

impl ThreatIndicator {
    /// Contribution of this family to the risk score.
    ///
    /// SQL injection threatens stored data directly; agent matching is a
    /// weak signal that monitoring tools trip as well.
    pub fn weight(self) -> u32 {
        match self {
            ThreatIndicator::SqlInjection => 40,
            ThreatIndicator::Xss => 30,
            ThreatIndicator::SuspiciousAgent => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThreatIndicator::SqlInjection => "sql-injection",
            ThreatIndicator::Xss => "xss",
            ThreatIndicator::SuspiciousAgent => "suspicious-agent",
        }
    }
}

impl std::fmt::Display for ThreatIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request threat assessment. Computed fresh for every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatAssessment {
    indicators: BTreeSet<ThreatIndicator>,
    risk_score: u32,
}

impl ThreatAssessment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a matched family. A family contributes its weight once.
    pub fn record(&mut self, indicator: ThreatIndicator) {
        if self.indicators.insert(indicator) {
            self.risk_score = (self.risk_score + indicator.weight()).min(MAX_RISK_SCORE);
        }
    }

    pub fn indicators(&self) -> &BTreeSet<ThreatIndicator> {
        &self.indicators
    }

    pub fn has(&self, indicator: ThreatIndicator) -> bool {
        self.indicators.contains(&indicator)
    }

    pub fn risk_score(&self) -> u32 {
        self.risk_score
    }

    pub fn is_clean(&self) -> bool {
        self.indicators.is_empty()
    }

    pub fn should_block(&self, threshold: u32) -> bool {
        self.risk_score >= threshold
    }
}
