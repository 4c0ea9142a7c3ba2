pub mod types;
pub mod reference;
pub mod contributors;
pub mod alerts;
pub mod trend;
pub mod prediction;
pub mod engine;

pub use types::*;
pub use reference::*;
pub use contributors::*;
pub use alerts::*;
pub use trend::*;
pub use prediction::*;
pub use engine::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Unknown vital kind: {0}")]
    UnknownVitalKind(String),

    #[error("Reading for {kind} is not a finite number: {value}")]
    NonFiniteReading { kind: VitalKind, value: f64 },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Engine must run inside a Tokio runtime")]
    NoRuntime,
}

/// Parse one change event: `<kind> <value>` or `<kind>=<value>`.
pub fn parse_change(line: &str) -> Result<(VitalKind, f64), MonitorError> {
    let line = line.trim();
    let (kind, value) = line
        .split_once('=')
        .or_else(|| line.split_once(char::is_whitespace))
        .ok_or_else(|| MonitorError::MalformedInput(line.to_string()))?;

    let kind: VitalKind = kind.trim().parse()?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| MonitorError::MalformedInput(line.to_string()))?;
    Ok((kind, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_change_accepts_both_forms() {
        assert_eq!(parse_change("hr 115").unwrap(), (VitalKind::HeartRate, 115.0));
        assert_eq!(parse_change("temp=38.2").unwrap(), (VitalKind::Temperature, 38.2));
        assert_eq!(
            parse_change("  sysBP =  95 ").unwrap(),
            (VitalKind::SystolicBp, 95.0)
        );
    }

    #[test]
    fn parse_change_rejects_unknown_kind() {
        assert!(matches!(
            parse_change("glucose 5.4"),
            Err(MonitorError::UnknownVitalKind(_))
        ));
    }

    #[test]
    fn parse_change_rejects_missing_or_bad_value() {
        assert!(matches!(parse_change("hr"), Err(MonitorError::MalformedInput(_))));
        assert!(matches!(parse_change("hr fast"), Err(MonitorError::MalformedInput(_))));
    }

    #[test]
    fn error_messages_are_readable() {
        let err = MonitorError::NonFiniteReading {
            kind: VitalKind::Temperature,
            value: f64::NAN,
        };
        assert_eq!(err.to_string(), "Reading for temperature is not a finite number: NaN");
    }
}
