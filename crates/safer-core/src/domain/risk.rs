//! Risk levels and classifier response interpretation.

use serde::{Deserialize, Serialize};

/// Discrete risk level reported by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    /// The response did not end with a recognized level.
    Unknown,
}

impl RiskLevel {
    /// Recognize a level token (case-insensitive). `UNKNOWN` is never a token.
    pub fn from_token(token: &str) -> Option<RiskLevel> {
        match token.to_uppercase().as_str() {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Unknown => "UNKNOWN",
        }
    }

    /// Whether this level drives the alarm. Only MEDIUM and HIGH do.
    pub fn warrants_alarm(&self) -> bool {
        matches!(self, RiskLevel::Medium | RiskLevel::High)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpreted classifier response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub narrative: String,
    pub risk_level: RiskLevel,
}

impl ClassificationResult {
    /// Interpret a raw classifier response.
    ///
    /// The last whitespace-delimited token, uppercased, is the risk level when
    /// it is LOW, MEDIUM or HIGH; the narrative is then the text before it.
    /// Otherwise the level is `Unknown` and the whole response is kept.
    pub fn parse(response: &str) -> ClassificationResult {
        let text = response.trim();

        if let Some(token) = text.split_whitespace().last() {
            if let Some(level) = RiskLevel::from_token(token) {
                let narrative = text[..text.len() - token.len()].trim_end();
                return ClassificationResult {
                    narrative: narrative.to_string(),
                    risk_level: level,
                };
            }
        }

        ClassificationResult {
            narrative: text.to_string(),
            risk_level: RiskLevel::Unknown,
        }
    }

    pub fn warrants_alarm(&self) -> bool {
        self.risk_level.warrants_alarm()
    }
}
