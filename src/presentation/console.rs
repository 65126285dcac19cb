//! Console presenter
//!
//! Renders session outcomes and stream events for a terminal. Measurements go
//! to stdout, one line each, as text or JSON; everything else is logged.

use crate::domain::profiles::ServiceKind;
use crate::domain::record::{FieldValue, MeasurementRecord, Quantity, SensorLocation};
use crate::infrastructure::bluetooth::notification::StreamEvent;
use crate::infrastructure::bluetooth::session::SessionOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One JSON output line
#[derive(Serialize)]
struct RecordLine<'a> {
    service: ServiceKind,
    received_at: DateTime<Utc>,
    #[serde(flatten)]
    record: &'a MeasurementRecord,
}

pub struct ConsolePresenter {
    kind: ServiceKind,
    format: OutputFormat,
}

impl ConsolePresenter {
    pub fn new(kind: ServiceKind, format: OutputFormat) -> Self {
        Self { kind, format }
    }

    /// Log the outcome of a session start. Returns whether it is ready.
    pub fn show_outcome(&self, outcome: &SessionOutcome, location: Option<SensorLocation>) -> bool {
        match outcome {
            SessionOutcome::Ready(capabilities) => {
                if capabilities.is_reported() {
                    info!("{} ready, features: {:?}", self.kind, capabilities.advertised());
                } else {
                    info!("{} ready", self.kind);
                }
                if let Some(location) = location {
                    info!("Sensor location: {:?}", location);
                }
                true
            }
            SessionOutcome::CriticalError(e) => {
                let readable = e.readable();
                error!("{}: {} ({})", readable.title, readable.message, e);
                false
            }
        }
    }

    /// Render one stream event. Returns false once the stream is over.
    pub fn show_event(&self, event: &StreamEvent) -> anyhow::Result<bool> {
        match event {
            StreamEvent::Record(record) => {
                println!("{}", self.render(record)?);
                Ok(true)
            }
            StreamEvent::DecodeFailure(failure) => {
                warn!(
                    "Skipped measurement {:02X?}: {}",
                    failure.payload, failure.error
                );
                Ok(true)
            }
            StreamEvent::Faulted(fault) => {
                error!("{} session ended: {}", self.kind, fault);
                Ok(false)
            }
        }
    }

    fn render(&self, record: &MeasurementRecord) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Text => Ok(format_record(record)),
            OutputFormat::Json => serde_json::to_string(&RecordLine {
                service: self.kind,
                received_at: Utc::now(),
                record,
            }),
        }
    }
}

/// `field: value` pairs in payload order
pub fn format_record(record: &MeasurementRecord) -> String {
    let mut parts: Vec<String> = record
        .fields
        .iter()
        .map(|(field, value)| format!("{}: {}", field, format_value(value)))
        .collect();
    if !record.unadvertised.is_empty() {
        let fields: Vec<_> = record.unadvertised.iter().map(|f| f.to_string()).collect();
        parts.push(format!("(not advertised: {})", fields.join(", ")));
    }
    parts.join(", ")
}

pub fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Quantity(quantity) => format_quantity(quantity),
        FieldValue::Status(true) => "yes".to_string(),
        FieldValue::Status(false) => "no".to_string(),
        FieldValue::Intervals(intervals) => {
            let items: Vec<_> = intervals.iter().map(|q| format!("{:.3}", q)).collect();
            format!("[{}]", items.join(", "))
        }
        FieldValue::Timestamp(Some(at)) => at.to_string(),
        FieldValue::Timestamp(None) => "unknown".to_string(),
        FieldValue::Code(code) => format!("{:#04x}", code),
    }
}

fn format_quantity(quantity: &Quantity) -> String {
    if quantity.value.fract() == 0.0 {
        quantity.to_string()
    } else {
        format!("{:.2}", quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{MeasurementField, Unit};

    fn record() -> MeasurementRecord {
        MeasurementRecord {
            fields: vec![
                (
                    MeasurementField::HeartRate,
                    FieldValue::Quantity(Quantity::new(72.0, Unit::BeatsPerMinute)),
                ),
                (
                    MeasurementField::RrIntervals,
                    FieldValue::Intervals(vec![Quantity::new(833.0 / 1024.0, Unit::Seconds)]),
                ),
                (MeasurementField::SensorContactDetected, FieldValue::Status(true)),
            ],
            unadvertised: Vec::new(),
        }
    }

    #[test]
    fn test_format_record() {
        assert_eq!(
            format_record(&record()),
            "heart rate: 72 bpm, RR-intervals: [0.813 s], sensor contact detected: yes"
        );
    }

    #[test]
    fn test_format_fractional_quantity() {
        let speed = FieldValue::Quantity(Quantity::new(3.01171875, Unit::MetersPerSecond));
        assert_eq!(format_value(&speed), "3.01 m/s");
        assert_eq!(format_value(&FieldValue::Timestamp(None)), "unknown");
        assert_eq!(format_value(&FieldValue::Code(2)), "0x02");
    }

    #[test]
    fn test_unadvertised_fields_are_listed() {
        let mut record = record();
        record.unadvertised.push(MeasurementField::RrIntervals);
        assert!(format_record(&record).ends_with("(not advertised: RR-intervals)"));
    }

    #[test]
    fn test_json_line() {
        let presenter = ConsolePresenter::new(ServiceKind::HeartRate, OutputFormat::Json);
        let line = presenter.render(&record()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["service"], "heart-rate");
        assert!(value["fields"].is_array());
        assert!(value["received_at"].is_string());
    }
}
