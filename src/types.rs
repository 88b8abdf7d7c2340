use core::fmt;

#[cfg(feature = "defmt")]
use defmt::Format;

/// Pressure at mean sea level of the international standard atmosphere, in hPa
pub const STANDARD_SEA_LEVEL_HPA: f64 = 1013.25;

// Barometric formula constants (international standard atmosphere, troposphere).
const ISA_ALTITUDE_SCALE_M: f64 = 44_330.0;
const ISA_EXPONENT: f64 = 5.255;

// Magnus coefficients (a, b in °C): over water, and over ice below freezing.
const MAGNUS_WATER: (f64, f64) = (17.62, 243.12);
const MAGNUS_ICE: (f64, f64) = (22.46, 272.62);

/// Illuminance measured by the light sensor
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Illumination {
    /// lux
    pub lux: f64,
}
impl Illumination {
    /// Whether `other` is different enough from `self` to count as a new reading
    pub fn differs_from(&self, other: &Illumination) -> bool {
        libm::fabs(self.lux - other.lux) > f64::EPSILON
    }
}
impl fmt::Display for Illumination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} lx", self.lux)
    }
}

/// Pressure and temperature from the barometer
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BarometricReading {
    /// station pressure in hPa
    pub pressure_hpa: f64,
    /// degrees centigrade
    pub temperature_c: f64,
}
impl BarometricReading {
    /// Pressure reduced to sea level, for a station `altitude_m` metres above it
    pub fn sea_level_pressure(&self, altitude_m: f64) -> f64 {
        to_sea_level_pressure(self.pressure_hpa, altitude_m)
    }

    /// Altitude in metres, given the current pressure at sea level
    pub fn altitude(&self, sea_level_hpa: f64) -> f64 {
        to_altitude(self.pressure_hpa, sea_level_hpa)
    }
}
impl fmt::Display for BarometricReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} hPa, {:.1} °C", self.pressure_hpa, self.temperature_c)
    }
}

/// Sea-level equivalent of `pressure_hpa` measured `altitude_m` metres above sea level
pub fn to_sea_level_pressure(pressure_hpa: f64, altitude_m: f64) -> f64 {
    pressure_hpa / libm::pow(1.0 - altitude_m / ISA_ALTITUDE_SCALE_M, ISA_EXPONENT)
}

/// Altitude in metres at which `pressure_hpa` is measured when sea level sits at `sea_level_hpa`
pub fn to_altitude(pressure_hpa: f64, sea_level_hpa: f64) -> f64 {
    ISA_ALTITUDE_SCALE_M * (1.0 - libm::pow(pressure_hpa / sea_level_hpa, 1.0 / ISA_EXPONENT))
}

/// Temperature and relative humidity from the hygrometer
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativeHumidity {
    /// degrees centigrade
    pub temperature_c: f64,
    /// relative humidity in percent
    pub humidity_pct: f64,
}
impl RelativeHumidity {
    /// Dew point in degrees centigrade
    pub fn dew_point(&self) -> f64 {
        dew_point(self.temperature_c, self.humidity_pct)
    }
}
impl fmt::Display for RelativeHumidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} %RH, {:.1} °C", self.humidity_pct, self.temperature_c)
    }
}

/// Magnus-form dew point for `temperature_c` and `humidity_pct`.
///
/// Below 0 °C the coefficients for saturation over ice are used.
pub fn dew_point(temperature_c: f64, humidity_pct: f64) -> f64 {
    let (a, b) = if temperature_c < 0.0 { MAGNUS_ICE } else { MAGNUS_WATER };
    let gamma = libm::log(humidity_pct / 100.0) + a * temperature_c / (b + temperature_c);
    b * gamma / (a - gamma)
}

/// Magnetic flux density along the three sensor axes
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MagneticField {
    /// µT
    pub x: f64,
    /// µT
    pub y: f64,
    /// µT
    pub z: f64,
}
impl MagneticField {
    /// Total field strength in µT
    pub fn magnitude(&self) -> f64 {
        libm::sqrt(self.x * self.x + self.y * self.y + self.z * self.z)
    }

    /// Heading in degrees clockwise from the X axis, assuming the sensor lies flat
    pub fn heading_degrees(&self) -> f64 {
        let heading = libm::atan2(self.y, self.x).to_degrees();
        if heading < 0.0 { heading + 360.0 } else { heading }
    }
}
impl fmt::Display for MagneticField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={:.2} µT, y={:.2} µT, z={:.2} µT", self.x, self.y, self.z)
    }
}
