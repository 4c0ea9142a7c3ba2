use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::reference::{input_bounds, ranges_for};
use super::MonitorError;

// ---------------------------------------------------------------------------
// VitalKind
// ---------------------------------------------------------------------------

/// One of the eight tracked physiological measurements.
///
/// Declaration order is the positional feature order expected by the
/// scoring service and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalKind {
    HeartRate,
    RespiratoryRate,
    Temperature,
    OxygenSaturation,
    SystolicBp,
    DiastolicBp,
    BodyMassIndex,
    MeanArterialPressure,
}

impl VitalKind {
    /// All kinds, in feature-vector order.
    pub const ALL: [VitalKind; 8] = [
        Self::HeartRate,
        Self::RespiratoryRate,
        Self::Temperature,
        Self::OxygenSaturation,
        Self::SystolicBp,
        Self::DiastolicBp,
        Self::BodyMassIndex,
        Self::MeanArterialPressure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeartRate => "heart_rate",
            Self::RespiratoryRate => "respiratory_rate",
            Self::Temperature => "temperature",
            Self::OxygenSaturation => "oxygen_saturation",
            Self::SystolicBp => "systolic_bp",
            Self::DiastolicBp => "diastolic_bp",
            Self::BodyMassIndex => "body_mass_index",
            Self::MeanArterialPressure => "mean_arterial_pressure",
        }
    }

    /// Display label used by the dashboard cards.
    pub fn label(&self) -> &'static str {
        match self {
            Self::HeartRate => "Heart Rate",
            Self::RespiratoryRate => "Respiratory",
            Self::Temperature => "Body Temp",
            Self::OxygenSaturation => "Oxygen",
            Self::SystolicBp => "Sys BP",
            Self::DiastolicBp => "Dia BP",
            Self::BodyMassIndex => "BMI",
            Self::MeanArterialPressure => "MAP",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::HeartRate => "bpm",
            Self::RespiratoryRate => "rpm",
            Self::Temperature => "°C",
            Self::OxygenSaturation => "%",
            Self::SystolicBp | Self::DiastolicBp | Self::MeanArterialPressure => "mmHg",
            Self::BodyMassIndex => "kg/m²",
        }
    }
}

impl fmt::Display for VitalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VitalKind {
    type Err = MonitorError;

    /// Accepts canonical names and the short input-surface aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let kind = match normalized.as_str() {
            "heart_rate" | "hr" => Self::HeartRate,
            "respiratory_rate" | "resp" | "rr" => Self::RespiratoryRate,
            "temperature" | "temp" => Self::Temperature,
            "oxygen_saturation" | "spo2" | "oxygen" => Self::OxygenSaturation,
            "systolic_bp" | "sysbp" | "sys_bp" => Self::SystolicBp,
            "diastolic_bp" | "diabp" | "dia_bp" => Self::DiastolicBp,
            "body_mass_index" | "bmi" => Self::BodyMassIndex,
            "mean_arterial_pressure" | "map" => Self::MeanArterialPressure,
            _ => return Err(MonitorError::UnknownVitalKind(s.trim().to_string())),
        };
        Ok(kind)
    }
}

// ---------------------------------------------------------------------------
// VitalReading & VitalSnapshot
// ---------------------------------------------------------------------------

/// A single observation with its unit and reference band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VitalReading {
    pub kind: VitalKind,
    pub label: &'static str,
    pub value: f64,
    pub unit: &'static str,
    pub band: RangeBand,
}

/// Point-in-time bundle of all eight vitals.
///
/// Snapshots are values: a change event produces a new snapshot through
/// [`VitalSnapshot::with_reading`] and the previous one is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalSnapshot {
    pub heart_rate: f64,
    pub respiratory_rate: f64,
    pub temperature: f64,
    pub oxygen_saturation: f64,
    pub systolic_bp: f64,
    pub diastolic_bp: f64,
    pub body_mass_index: f64,
    pub mean_arterial_pressure: f64,
}

impl Default for VitalSnapshot {
    fn default() -> Self {
        Self::baseline()
    }
}

impl VitalSnapshot {
    /// Resting post-op patient the dashboard starts from.
    pub fn baseline() -> Self {
        Self {
            heart_rate: 82.0,
            respiratory_rate: 16.0,
            temperature: 36.6,
            oxygen_saturation: 98.0,
            systolic_bp: 120.0,
            diastolic_bp: 80.0,
            body_mass_index: 22.5,
            mean_arterial_pressure: 93.0,
        }
    }

    pub fn get(&self, kind: VitalKind) -> f64 {
        match kind {
            VitalKind::HeartRate => self.heart_rate,
            VitalKind::RespiratoryRate => self.respiratory_rate,
            VitalKind::Temperature => self.temperature,
            VitalKind::OxygenSaturation => self.oxygen_saturation,
            VitalKind::SystolicBp => self.systolic_bp,
            VitalKind::DiastolicBp => self.diastolic_bp,
            VitalKind::BodyMassIndex => self.body_mass_index,
            VitalKind::MeanArterialPressure => self.mean_arterial_pressure,
        }
    }

    pub fn reading(&self, kind: VitalKind) -> VitalReading {
        let value = self.get(kind);
        VitalReading {
            kind,
            label: kind.label(),
            value,
            unit: kind.unit(),
            band: ranges_for(kind).band(value),
        }
    }

    pub fn readings(&self) -> Vec<VitalReading> {
        VitalKind::ALL.iter().map(|k| self.reading(*k)).collect()
    }

    /// New snapshot with one vital replaced.
    ///
    /// Non-finite values are rejected; finite values are clamped into the
    /// plausible input envelope for the vital.
    pub fn with_reading(&self, kind: VitalKind, value: f64) -> Result<Self, MonitorError> {
        if !value.is_finite() {
            return Err(MonitorError::NonFiniteReading { kind, value });
        }
        let (low, high) = input_bounds(kind);
        let value = value.clamp(low, high);

        let mut next = *self;
        match kind {
            VitalKind::HeartRate => next.heart_rate = value,
            VitalKind::RespiratoryRate => next.respiratory_rate = value,
            VitalKind::Temperature => next.temperature = value,
            VitalKind::OxygenSaturation => next.oxygen_saturation = value,
            VitalKind::SystolicBp => next.systolic_bp = value,
            VitalKind::DiastolicBp => next.diastolic_bp = value,
            VitalKind::BodyMassIndex => next.body_mass_index = value,
            VitalKind::MeanArterialPressure => next.mean_arterial_pressure = value,
        }
        Ok(next)
    }

    /// Copy of this snapshot with every vital run through [`Self::with_reading`].
    pub fn sanitized(&self) -> Result<Self, MonitorError> {
        VitalKind::ALL
            .iter()
            .try_fold(*self, |acc, kind| acc.with_reading(*kind, self.get(*kind)))
    }

    /// Positional feature vector sent to the scoring service.
    pub fn feature_vector(&self) -> [f64; 8] {
        VitalKind::ALL.map(|kind| self.get(kind))
    }
}

// ---------------------------------------------------------------------------
// Reference bands
// ---------------------------------------------------------------------------

/// Where a reading falls relative to its reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBand {
    Normal,
    Abnormal,
    Danger,
}

// ---------------------------------------------------------------------------
// Risk contributors
// ---------------------------------------------------------------------------

/// Locally computed share of risk attributed to one out-of-range vital.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskContributor {
    pub vital: VitalKind,
    pub label: String,
    pub contribution_percent: f64,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Tachycardia,
    Bradycardia,
    LowOxygen,
    Fever,
    Hypertension,
    Hypotension,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tachycardia => "tachycardia",
            Self::Bradycardia => "bradycardia",
            Self::LowOxygen => "low_oxygen",
            Self::Fever => "fever",
            Self::Hypertension => "hypertension",
            Self::Hypotension => "hypotension",
        }
    }
}

/// Critical alerts need immediate attention; warnings are surfaced inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// One threshold violation for the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalAlert {
    pub kind: AlertKind,
    pub vital: VitalKind,
    pub severity: AlertSeverity,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// Server-assigned risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiskStatus {
    #[default]
    Stable,
    High,
}

impl RiskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "Stable",
            Self::High => "High",
        }
    }

    /// Assessment line shown next to the model probability.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Stable => "Vitals stable. Recovery on track.",
            Self::High => "Warning: Pattern matches high-risk readmission.",
        }
    }
}

impl FromStr for RiskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Stable" => Ok(Self::Stable),
            "High" => Ok(Self::High),
            other => Err(other.to_string()),
        }
    }
}

/// A validated response from the scoring service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredictionResult {
    pub risk_score: u8,
    pub status: RiskStatus,
}

impl PredictionResult {
    pub const MAX_RISK_SCORE: u8 = 100;

    /// Recovery score plotted on the trend chart.
    pub fn recovery_score(&self) -> u8 {
        Self::MAX_RISK_SCORE.saturating_sub(self.risk_score)
    }
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub sequence_index: u64,
    pub score: u8,
}

// ---------------------------------------------------------------------------
// ViewSnapshot
// ---------------------------------------------------------------------------

/// Everything the display layer renders, reconciled for one generation.
///
/// Replaced wholesale on every change; never patched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    /// Generation of the vital change this view was reconciled for.
    pub generation: u64,
    pub vitals: VitalSnapshot,
    pub readings: Vec<VitalReading>,
    pub risk_score: u8,
    pub status: RiskStatus,
    pub assessment: &'static str,
    pub risk_contributors: Vec<RiskContributor>,
    /// Sum of contributors, clamped to 100. Informational only.
    pub local_deviation_percent: f64,
    pub alerts: Vec<VitalAlert>,
    pub trend: Vec<TrendPoint>,
    /// Generation whose prediction produced `risk_score`/`status`, if any.
    pub prediction_generation: Option<u64>,
    pub prediction_received_at: Option<NaiveDateTime>,
}

impl ViewSnapshot {
    /// True when the displayed score belongs to an older vital snapshot.
    pub fn prediction_is_stale(&self) -> bool {
        self.prediction_generation != Some(self.generation)
    }

    pub fn has_critical_alert(&self) -> bool {
        self.alerts
            .iter()
            .any(|a| a.severity == AlertSeverity::Critical)
    }
}
