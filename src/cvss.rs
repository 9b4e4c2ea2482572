//! CVSS 3.1 base-score engine.
//!
//! Pure and stateless; the scoring worker feeds it from verification results.
//! Only the scope-unchanged branch is reached in production; the changed
//! branch is kept for completeness of the formula.
//! Reference: https://www.first.org/cvss/v3.1/specification-document

use crate::errors::PatrolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackVector {
    Network,
    Adjacent,
    Local,
    Physical,
}

impl AttackVector {
    fn weight(&self) -> f64 {
        match self {
            AttackVector::Network => 0.85,
            AttackVector::Adjacent => 0.62,
            AttackVector::Local => 0.55,
            AttackVector::Physical => 0.2,
        }
    }

    fn letter(&self) -> &'static str {
        match self {
            AttackVector::Network => "N",
            AttackVector::Adjacent => "A",
            AttackVector::Local => "L",
            AttackVector::Physical => "P",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackComplexity {
    Low,
    High,
}

impl AttackComplexity {
    fn weight(&self) -> f64 {
        match self {
            AttackComplexity::Low => 0.77,
            AttackComplexity::High => 0.44,
        }
    }

    fn letter(&self) -> &'static str {
        match self {
            AttackComplexity::Low => "L",
            AttackComplexity::High => "H",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegesRequired {
    None,
    Low,
    High,
}

impl PrivilegesRequired {
    fn weight(&self) -> f64 {
        match self {
            PrivilegesRequired::None => 0.85,
            PrivilegesRequired::Low => 0.62,
            PrivilegesRequired::High => 0.27,
        }
    }

    fn letter(&self) -> &'static str {
        match self {
            PrivilegesRequired::None => "N",
            PrivilegesRequired::Low => "L",
            PrivilegesRequired::High => "H",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInteraction {
    None,
    Required,
}

impl UserInteraction {
    fn weight(&self) -> f64 {
        match self {
            UserInteraction::None => 0.85,
            UserInteraction::Required => 0.62,
        }
    }

    fn letter(&self) -> &'static str {
        match self {
            UserInteraction::None => "N",
            UserInteraction::Required => "R",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Unchanged,
    Changed,
}

impl Scope {
    fn letter(&self) -> &'static str {
        match self {
            Scope::Unchanged => "U",
            Scope::Changed => "C",
        }
    }
}

/// Impact level shared by the C/I/A metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Impact {
    None,
    Low,
    High,
}

impl Impact {
    fn weight(&self) -> f64 {
        match self {
            Impact::None => 0.0,
            Impact::Low => 0.22,
            Impact::High => 0.56,
        }
    }

    fn letter(&self) -> &'static str {
        match self {
            Impact::None => "N",
            Impact::Low => "L",
            Impact::High => "H",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "None",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    /// Step function over the rounded base score.
    pub fn from_score(score: f64) -> Severity {
        if score == 0.0 {
            Severity::None
        } else if score <= 3.9 {
            Severity::Low
        } else if score <= 6.9 {
            Severity::Medium
        } else if score <= 8.9 {
            Severity::High
        } else {
            Severity::Critical
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incrementally-built metric selection. All eight metrics must be set
/// before a score or vector string can be derived.
#[derive(Debug, Clone, Default)]
pub struct Cvss {
    pub av: Option<AttackVector>,
    pub ac: Option<AttackComplexity>,
    pub pr: Option<PrivilegesRequired>,
    pub ui: Option<UserInteraction>,
    pub scope: Option<Scope>,
    pub c: Option<Impact>,
    pub i: Option<Impact>,
    pub a: Option<Impact>,
}

struct Metrics {
    av: AttackVector,
    ac: AttackComplexity,
    pr: PrivilegesRequired,
    ui: UserInteraction,
    scope: Scope,
    c: Impact,
    i: Impact,
    a: Impact,
}

impl Cvss {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_complete(&self) -> Result<Metrics, PatrolError> {
        let missing = |name: &str| PatrolError::IncompleteMetrics(format!("{name} is unset"));
        Ok(Metrics {
            av: self.av.ok_or_else(|| missing("AV"))?,
            ac: self.ac.ok_or_else(|| missing("AC"))?,
            pr: self.pr.ok_or_else(|| missing("PR"))?,
            ui: self.ui.ok_or_else(|| missing("UI"))?,
            scope: self.scope.ok_or_else(|| missing("S"))?,
            c: self.c.ok_or_else(|| missing("C"))?,
            i: self.i.ok_or_else(|| missing("I"))?,
            a: self.a.ok_or_else(|| missing("A"))?,
        })
    }

    /// Ordered AV/AC/PR/UI/S/C/I/A vector string.
    pub fn vector_string(&self) -> Result<String, PatrolError> {
        let m = self.require_complete()?;
        Ok(format!(
            "CVSS:3.1/AV:{}/AC:{}/PR:{}/UI:{}/S:{}/C:{}/I:{}/A:{}",
            m.av.letter(),
            m.ac.letter(),
            m.pr.letter(),
            m.ui.letter(),
            m.scope.letter(),
            m.c.letter(),
            m.i.letter(),
            m.a.letter()
        ))
    }

    /// Base score rounded to one decimal. Zero-impact selections score
    /// exactly 0 regardless of exploitability.
    pub fn base_score(&self) -> Result<f64, PatrolError> {
        let m = self.require_complete()?;

        let impact_subscore =
            1.0 - (1.0 - m.c.weight()) * (1.0 - m.i.weight()) * (1.0 - m.a.weight());

        if impact_subscore <= 0.0 {
            return Ok(0.0);
        }

        let impact = match m.scope {
            Scope::Unchanged => 6.42 * impact_subscore,
            Scope::Changed => {
                7.52 * (impact_subscore - 0.029) - 3.25 * (impact_subscore - 0.02).powi(15)
            }
        };

        let exploitability =
            8.22 * m.av.weight() * m.ac.weight() * m.pr.weight() * m.ui.weight();

        let raw = match m.scope {
            Scope::Unchanged => (impact + exploitability).min(10.0),
            Scope::Changed => (1.08 * (impact + exploitability)).min(10.0),
        };
        Ok((raw * 10.0).round() / 10.0)
    }

    pub fn severity(&self) -> Result<Severity, PatrolError> {
        Ok(Severity::from_score(self.base_score()?))
    }
}
