//! Origin of a position fix.

/// Sensor that produced a position (OpenSky `position_source` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    AdsB,
    Asterix,
    Mlat,
    Flarm,
}

impl PositionSource {
    /// Map the upstream integer code; unknown codes count as ADS-B.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => PositionSource::Asterix,
            2 => PositionSource::Mlat,
            3 => PositionSource::Flarm,
            _ => PositionSource::AdsB,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PositionSource::AdsB => "ADS-B",
            PositionSource::Asterix => "ASTERIX",
            PositionSource::Mlat => "MLAT",
            PositionSource::Flarm => "FLARM",
        }
    }
}
