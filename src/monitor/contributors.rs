use super::reference::ranges_for;
use super::types::{RiskContributor, VitalKind, VitalSnapshot};

/// Ceiling for a single vital, so one extreme reading cannot dominate.
pub const MAX_SINGLE_CONTRIBUTION: f64 = 30.0;

/// Ceiling for the contributor list as a whole.
pub const MAX_TOTAL_CONTRIBUTION: f64 = 100.0;

pub const MAX_CONTRIBUTORS: usize = 4;

/// Vitals that feed the breakdown, in tie-break order.
const TRACKED: [(VitalKind, &str); 4] = [
    (VitalKind::HeartRate, "HR"),
    (VitalKind::Temperature, "Temp"),
    (VitalKind::OxygenSaturation, "SpO2"),
    (VitalKind::SystolicBp, "SysBP"),
];

/// Per-vital deviation from normal, as a percentage of the violated bound.
pub fn compute_contributors(snapshot: &VitalSnapshot) -> Vec<RiskContributor> {
    let mut contributors: Vec<RiskContributor> = TRACKED
        .iter()
        .filter_map(|(kind, short)| deviation(*kind, short, snapshot.get(*kind)))
        .collect();

    // Stable sort keeps check order for equal contributions.
    contributors.sort_by(|a, b| b.contribution_percent.total_cmp(&a.contribution_percent));
    contributors.truncate(MAX_CONTRIBUTORS);

    for c in &mut contributors {
        c.contribution_percent = c.contribution_percent.clamp(0.0, MAX_TOTAL_CONTRIBUTION);
    }
    contributors
}

/// Sum of contributions, clamped to 100.
pub fn total_contribution(contributors: &[RiskContributor]) -> f64 {
    contributors
        .iter()
        .map(|c| c.contribution_percent)
        .sum::<f64>()
        .clamp(0.0, MAX_TOTAL_CONTRIBUTION)
}

fn deviation(kind: VitalKind, short: &str, value: f64) -> Option<RiskContributor> {
    let range = ranges_for(kind);

    let (direction, raw) = if value < range.normal_low {
        ("Low", (range.normal_low - value) / range.normal_low * 100.0)
    } else if value > range.normal_high {
        ("High", (value - range.normal_high) / range.normal_high * 100.0)
    } else {
        return None;
    };

    Some(RiskContributor {
        vital: kind,
        label: format!("{direction} {short}"),
        contribution_percent: raw.clamp(0.0, MAX_SINGLE_CONTRIBUTION),
    })
}
