//! Mode 01 PID table: response identifier → byte count and conversion.
//!
//! Extending the decoder to a new parameter means adding a row here and a
//! variant to [`Measurement`].

use crate::types::Measurement;

/// One supported PID.
#[derive(Debug, Clone, Copy)]
pub struct PidSpec {
    /// Response identifier, e.g. `"410C"`.
    pub id: &'static str,
    /// Data bytes a well-formed response carries.
    pub min_bytes: usize,
    /// Conversion from the first two data bytes (A, B).
    pub decode: fn(u8, u8) -> Measurement,
}

fn engine_rpm(a: u8, b: u8) -> Measurement {
    Measurement::EngineRpm((u32::from(a) * 256 + u32::from(b)) / 4)
}

fn vehicle_speed(a: u8, _b: u8) -> Measurement {
    Measurement::VehicleSpeedKmh(a)
}

fn coolant_temp(a: u8, _b: u8) -> Measurement {
    Measurement::CoolantTempC(i16::from(a) - 40)
}

/// Every PID the decoder understands.
pub static PID_TABLE: &[PidSpec] = &[
    PidSpec {
        id: "410C",
        min_bytes: 2,
        decode: engine_rpm,
    },
    PidSpec {
        id: "410D",
        min_bytes: 1,
        decode: vehicle_speed,
    },
    PidSpec {
        id: "4105",
        min_bytes: 1,
        decode: coolant_temp,
    },
];

/// Find the table entry for a response identifier.
pub fn lookup(id: &str) -> Option<&'static PidSpec> {
    PID_TABLE.iter().find(|spec| spec.id == id)
}
