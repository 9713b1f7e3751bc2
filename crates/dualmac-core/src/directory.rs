//! Node/address directory
//!
//! Maps every installed station to its pair of radio addresses and its
//! position. The directory is filled during topology setup and shared
//! read-only afterwards.

use std::collections::HashMap;
use std::fmt;

use dualmac_frame::MacAddress;
use serde::{Deserialize, Serialize};

use crate::error::MacError;

/// Unique identifier for a simulated station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationId(pub u32);

impl StationId {
    /// Get the raw id value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sta{}", self.0)
    }
}

/// Which of a station's two radios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Radio {
    /// Carries RTS and CTS
    Control,
    /// Carries DATA and ACK
    Data,
}

impl Radio {
    pub const ALL: [Radio; 2] = [Radio::Control, Radio::Data];

    pub fn name(&self) -> &'static str {
        match self {
            Radio::Control => "control",
            Radio::Data => "data",
        }
    }
}

impl fmt::Display for Radio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cartesian position in metres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in metres
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// The two addresses every station owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StationAddresses {
    pub control: MacAddress,
    pub data: MacAddress,
}

impl StationAddresses {
    /// Addresses for the station with the given id.
    ///
    /// The control radio is always installed first, so it receives the even
    /// allocation index and the data radio the following odd one.
    pub fn allocate(id: StationId) -> Self {
        Self {
            control: MacAddress::allocate(id.0 * 2),
            data: MacAddress::allocate(id.0 * 2 + 1),
        }
    }

    /// Address of the given radio
    pub fn of(&self, radio: Radio) -> MacAddress {
        match radio {
            Radio::Control => self.control,
            Radio::Data => self.data,
        }
    }
}

/// Directory record for one station
#[derive(Debug, Clone)]
pub struct StationEntry {
    pub id: StationId,
    pub addresses: StationAddresses,
    pub position: Position,
}

/// Address and position lookup for all installed stations
#[derive(Debug, Clone, Default)]
pub struct Directory {
    stations: Vec<StationEntry>,
    by_address: HashMap<MacAddress, (StationId, Radio)>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a station at `position` and allocate its addresses
    pub fn add_station(&mut self, position: Position) -> StationId {
        let id = StationId(self.stations.len() as u32);
        let addresses = StationAddresses::allocate(id);

        self.by_address.insert(addresses.control, (id, Radio::Control));
        self.by_address.insert(addresses.data, (id, Radio::Data));
        self.stations.push(StationEntry {
            id,
            addresses,
            position,
        });
        id
    }

    /// Number of installed stations
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Iterate over all stations in installation order
    pub fn stations(&self) -> impl Iterator<Item = &StationEntry> {
        self.stations.iter()
    }

    pub fn entry(&self, id: StationId) -> Result<&StationEntry, MacError> {
        self.stations
            .get(id.0 as usize)
            .ok_or(MacError::UnknownStation(id))
    }

    /// Find the station and radio owning `address`
    pub fn resolve(&self, address: MacAddress) -> Result<(StationId, Radio), MacError> {
        self.by_address
            .get(&address)
            .copied()
            .ok_or(MacError::UnknownAddress(address))
    }

    /// Translate either radio address of a station to its control address
    pub fn to_control(&self, address: MacAddress) -> Result<MacAddress, MacError> {
        let (id, _) = self.resolve(address)?;
        Ok(self.entry(id)?.addresses.control)
    }

    /// Translate either radio address of a station to its data address
    pub fn to_data(&self, address: MacAddress) -> Result<MacAddress, MacError> {
        let (id, _) = self.resolve(address)?;
        Ok(self.entry(id)?.addresses.data)
    }

    /// Distance in metres between two stations
    pub fn distance(&self, a: StationId, b: StationId) -> Result<f64, MacError> {
        Ok(self.entry(a)?.position.distance_to(&self.entry(b)?.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_stations() -> Directory {
        let mut dir = Directory::new();
        dir.add_station(Position::new(0.0, 0.0, 0.0));
        dir.add_station(Position::new(3.0, 4.0, 0.0));
        dir.add_station(Position::new(0.0, 0.0, 2.0));
        dir
    }

    #[test]
    fn test_control_addresses_allocated_first() {
        let dir = three_stations();
        let entry = dir.entry(StationId(1)).unwrap();
        assert_eq!(entry.addresses.control, MacAddress::allocate(2));
        assert_eq!(entry.addresses.data, MacAddress::allocate(3));
    }

    #[test]
    fn test_resolve_both_radios() {
        let dir = three_stations();
        let addrs = StationAddresses::allocate(StationId(2));
        assert_eq!(dir.resolve(addrs.control).unwrap(), (StationId(2), Radio::Control));
        assert_eq!(dir.resolve(addrs.data).unwrap(), (StationId(2), Radio::Data));
    }

    #[test]
    fn test_translation_is_idempotent() {
        let dir = three_stations();
        let addrs = StationAddresses::allocate(StationId(0));
        assert_eq!(dir.to_control(addrs.data).unwrap(), addrs.control);
        assert_eq!(dir.to_control(addrs.control).unwrap(), addrs.control);
        assert_eq!(dir.to_data(addrs.control).unwrap(), addrs.data);
        assert_eq!(dir.to_data(addrs.data).unwrap(), addrs.data);
    }

    #[test]
    fn test_unknown_address() {
        let dir = three_stations();
        let stranger = MacAddress::allocate(99);
        assert_eq!(dir.resolve(stranger), Err(MacError::UnknownAddress(stranger)));
        assert!(dir.to_control(MacAddress::BROADCAST).is_err());
    }

    #[test]
    fn test_distance_is_three_dimensional() {
        let dir = three_stations();
        assert_eq!(dir.distance(StationId(0), StationId(1)).unwrap(), 5.0);
        assert_eq!(dir.distance(StationId(0), StationId(2)).unwrap(), 2.0);
        assert!(dir.distance(StationId(0), StationId(9)).is_err());
    }
}
