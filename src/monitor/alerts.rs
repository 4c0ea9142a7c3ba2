use super::types::{AlertKind, AlertSeverity, VitalAlert, VitalKind, VitalSnapshot};

#[derive(Debug, Clone, Copy)]
enum Comparison {
    Above,
    Below,
}

/// A fixed clinical threshold.
struct AlertRule {
    kind: AlertKind,
    vital: VitalKind,
    comparison: Comparison,
    threshold: f64,
    severity: AlertSeverity,
}

impl AlertRule {
    fn fires(&self, value: f64) -> bool {
        match self.comparison {
            Comparison::Above => value > self.threshold,
            Comparison::Below => value < self.threshold,
        }
    }
}

/// Evaluated top to bottom; output order matches.
const RULES: [AlertRule; 6] = [
    AlertRule {
        kind: AlertKind::Tachycardia,
        vital: VitalKind::HeartRate,
        comparison: Comparison::Above,
        threshold: 110.0,
        severity: AlertSeverity::Warning,
    },
    AlertRule {
        kind: AlertKind::Bradycardia,
        vital: VitalKind::HeartRate,
        comparison: Comparison::Below,
        threshold: 60.0,
        severity: AlertSeverity::Warning,
    },
    AlertRule {
        kind: AlertKind::LowOxygen,
        vital: VitalKind::OxygenSaturation,
        comparison: Comparison::Below,
        threshold: 94.0,
        severity: AlertSeverity::Critical,
    },
    AlertRule {
        kind: AlertKind::Fever,
        vital: VitalKind::Temperature,
        comparison: Comparison::Above,
        threshold: 38.0,
        severity: AlertSeverity::Warning,
    },
    AlertRule {
        kind: AlertKind::Hypertension,
        vital: VitalKind::SystolicBp,
        comparison: Comparison::Above,
        threshold: 150.0,
        severity: AlertSeverity::Warning,
    },
    AlertRule {
        kind: AlertKind::Hypotension,
        vital: VitalKind::SystolicBp,
        comparison: Comparison::Below,
        threshold: 90.0,
        severity: AlertSeverity::Critical,
    },
];

/// Evaluate every threshold rule against the snapshot.
pub fn generate_alerts(snapshot: &VitalSnapshot) -> Vec<VitalAlert> {
    RULES
        .iter()
        .filter_map(|rule| {
            let value = snapshot.get(rule.vital);
            rule.fires(value).then(|| VitalAlert {
                kind: rule.kind,
                vital: rule.vital,
                severity: rule.severity,
                message: alert_message(rule, value),
            })
        })
        .collect()
}

fn alert_message(rule: &AlertRule, value: f64) -> String {
    let unit = rule.vital.unit();
    let reading = format_value(value);
    let threshold = format_value(rule.threshold);
    match rule.kind {
        AlertKind::Tachycardia => {
            format!("Tachycardia: heart rate {reading} {unit} is above {threshold} {unit}.")
        }
        AlertKind::Bradycardia => {
            format!("Bradycardia: heart rate {reading} {unit} is below {threshold} {unit}.")
        }
        AlertKind::LowOxygen => format!(
            "Critical low oxygen: saturation {reading}{unit} is below {threshold}{unit}."
        ),
        AlertKind::Fever => {
            format!("Fever: temperature {reading}{unit} is above {threshold}{unit}.")
        }
        AlertKind::Hypertension => format!(
            "Hypertension: systolic pressure {reading} {unit} is above {threshold} {unit}."
        ),
        AlertKind::Hypotension => format!(
            "Critical hypotension: systolic pressure {reading} {unit} is below {threshold} {unit}."
        ),
    }
}

/// Whole numbers print without a decimal; others keep one place.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}
