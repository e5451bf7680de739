//! Where "my location" comes from.

use skycast_core::LocationConfig;

use crate::types::{Coordinates, LocationError};

pub trait LocationProvider: Send + Sync {
    fn locate(&self) -> Result<Coordinates, LocationError>;
}

/// Location pinned in config or on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation {
    coordinates: Option<Coordinates>,
}

impl FixedLocation {
    pub fn new(coordinates: Option<Coordinates>) -> Self {
        Self { coordinates }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        Self::new(
            config
                .coordinates()
                .map(|(lat, lon)| Coordinates::new(lat, lon)),
        )
    }
}

impl LocationProvider for FixedLocation {
    fn locate(&self) -> Result<Coordinates, LocationError> {
        let coords = self.coordinates.ok_or(LocationError::Unavailable)?;
        if !(-90.0..=90.0).contains(&coords.lat) || !(-180.0..=180.0).contains(&coords.lon) {
            return Err(LocationError::Other(format!(
                "Invalid coordinates: {}, {}",
                coords.lat, coords.lon
            )));
        }
        Ok(coords)
    }
}
