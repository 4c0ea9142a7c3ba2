use serde::Serialize;

use super::types::{RangeBand, VitalKind};

/// Clinical bounds for one vital.
///
/// `normal_*` is the expected adult post-op range; `danger_*` is the wider
/// band outside of which a reading needs urgent review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceRange {
    pub normal_low: f64,
    pub normal_high: f64,
    pub danger_low: f64,
    pub danger_high: f64,
}

impl ReferenceRange {
    const fn new(normal_low: f64, normal_high: f64, danger_low: f64, danger_high: f64) -> Self {
        Self {
            normal_low,
            normal_high,
            danger_low,
            danger_high,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.normal_low && value <= self.normal_high
    }

    pub fn band(&self, value: f64) -> RangeBand {
        if self.contains(value) {
            RangeBand::Normal
        } else if value < self.danger_low || value > self.danger_high {
            RangeBand::Danger
        } else {
            RangeBand::Abnormal
        }
    }
}

const HEART_RATE: ReferenceRange = ReferenceRange::new(60.0, 100.0, 40.0, 130.0);
const RESPIRATORY_RATE: ReferenceRange = ReferenceRange::new(12.0, 20.0, 8.0, 30.0);
const TEMPERATURE: ReferenceRange = ReferenceRange::new(36.1, 37.5, 35.0, 39.5);
const OXYGEN_SATURATION: ReferenceRange = ReferenceRange::new(95.0, 100.0, 90.0, 100.0);
const SYSTOLIC_BP: ReferenceRange = ReferenceRange::new(90.0, 140.0, 80.0, 180.0);
const DIASTOLIC_BP: ReferenceRange = ReferenceRange::new(60.0, 90.0, 50.0, 110.0);
const BODY_MASS_INDEX: ReferenceRange = ReferenceRange::new(18.5, 24.9, 16.0, 40.0);
const MEAN_ARTERIAL_PRESSURE: ReferenceRange = ReferenceRange::new(70.0, 100.0, 60.0, 110.0);

/// Reference range for a vital. Total over [`VitalKind`].
pub fn ranges_for(kind: VitalKind) -> ReferenceRange {
    match kind {
        VitalKind::HeartRate => HEART_RATE,
        VitalKind::RespiratoryRate => RESPIRATORY_RATE,
        VitalKind::Temperature => TEMPERATURE,
        VitalKind::OxygenSaturation => OXYGEN_SATURATION,
        VitalKind::SystolicBp => SYSTOLIC_BP,
        VitalKind::DiastolicBp => DIASTOLIC_BP,
        VitalKind::BodyMassIndex => BODY_MASS_INDEX,
        VitalKind::MeanArterialPressure => MEAN_ARTERIAL_PRESSURE,
    }
}

/// Physiologically plausible input envelope, used to clamp values from
/// callers that bypass the dashboard sliders.
pub fn input_bounds(kind: VitalKind) -> (f64, f64) {
    match kind {
        VitalKind::HeartRate => (20.0, 250.0),
        VitalKind::RespiratoryRate => (4.0, 60.0),
        VitalKind::Temperature => (30.0, 45.0),
        VitalKind::OxygenSaturation => (50.0, 100.0),
        VitalKind::SystolicBp => (50.0, 260.0),
        VitalKind::DiastolicBp => (30.0, 160.0),
        VitalKind::BodyMassIndex => (10.0, 70.0),
        VitalKind::MeanArterialPressure => (30.0, 190.0),
    }
}
