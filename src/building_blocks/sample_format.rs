use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// the sample formats a session can run with.
/// the choice decides the device format as well as the
/// binary layout of the capture dumps.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    Int16,
    Int24,
    Int32,
    Float32,
    #[default]
    Float64,
}

impl SampleFormat {
    pub const ALL: [SampleFormat; 5] = [
        SampleFormat::Int16,
        SampleFormat::Int24,
        SampleFormat::Int32,
        SampleFormat::Float32,
        SampleFormat::Float64,
    ];

    /// bytes per sample in a dump file
    pub fn width(&self) -> usize {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Int24 => 3,
            SampleFormat::Int32 => 4,
            SampleFormat::Float32 => 4,
            SampleFormat::Float64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::Int16 => "int16",
            SampleFormat::Int24 => "int24",
            SampleFormat::Int32 => "int32",
            SampleFormat::Float32 => "float32",
            SampleFormat::Float64 => "float64",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown sample format '{0}' (expected one of int16, int24, int32, float32, float64)")]
pub struct UnknownSampleFormat(pub String);

impl FromStr for SampleFormat {
    type Err = UnknownSampleFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SampleFormat::ALL
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| UnknownSampleFormat(s.to_string()))
    }
}

/// 24 bit signed integer, kept sign-extended in an i32
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct I24(i32);

impl I24 {
    pub const MIN: i32 = -(1 << 23);
    pub const MAX: i32 = (1 << 23) - 1;

    /// values outside of the 24 bit range are clamped
    pub fn new(value: i32) -> Self {
        I24(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

/// A sample as it travels through a session: one interleaved scalar
/// of the selected format. The convolution works on f64, everything
/// else (passthrough, capture, dump) stays in the native type.
pub trait Sample: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const FORMAT: SampleFormat;

    /// normalized value, integers are scaled by 2^(bits - 1)
    fn to_f64(self) -> f64;

    /// rounds and saturates for integer formats, no clipping for floats
    fn from_f64(value: f64) -> Self;

    /// little-endian encoding, `out` is exactly `FORMAT.width()` bytes
    fn write_le(self, out: &mut [u8]);

    /// `bytes` is exactly `FORMAT.width()` bytes
    fn read_le(bytes: &[u8]) -> Self;
}

fn to_int(value: f64, scale: f64, min: f64, max: f64) -> f64 {
    (value * scale).round().clamp(min, max)
}

impl Sample for i16 {
    const FORMAT: SampleFormat = SampleFormat::Int16;

    fn to_f64(self) -> f64 {
        self as f64 / 32768.0
    }

    fn from_f64(value: f64) -> Self {
        to_int(value, 32768.0, i16::MIN as f64, i16::MAX as f64) as i16
    }

    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }
}

impl Sample for I24 {
    const FORMAT: SampleFormat = SampleFormat::Int24;

    fn to_f64(self) -> f64 {
        self.0 as f64 / 8_388_608.0
    }

    fn from_f64(value: f64) -> Self {
        I24(to_int(value, 8_388_608.0, I24::MIN as f64, I24::MAX as f64) as i32)
    }

    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.0.to_le_bytes()[..3]);
    }

    fn read_le(bytes: &[u8]) -> Self {
        // sign extend from bit 23
        I24(i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8)
    }
}

impl Sample for i32 {
    const FORMAT: SampleFormat = SampleFormat::Int32;

    fn to_f64(self) -> f64 {
        self as f64 / 2_147_483_648.0
    }

    fn from_f64(value: f64) -> Self {
        to_int(value, 2_147_483_648.0, i32::MIN as f64, i32::MAX as f64) as i32
    }

    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Sample for f32 {
    const FORMAT: SampleFormat = SampleFormat::Float32;

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Sample for f64 {
    const FORMAT: SampleFormat = SampleFormat::Float64;

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        f64::from_le_bytes(raw)
    }
}

// TEST TEST TEST
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format_names() {
        for format in SampleFormat::ALL {
            assert_eq!(format.name().parse::<SampleFormat>(), Ok(format));
        }
        assert_eq!("FLOAT32".parse::<SampleFormat>(), Ok(SampleFormat::Float32));
        assert!("int8".parse::<SampleFormat>().is_err());
    }

    #[test]
    fn test_unknown_format_error() {
        let err = "int8".parse::<SampleFormat>().unwrap_err();
        assert_eq!(err, UnknownSampleFormat("int8".to_string()));
        assert_eq!(
            err.to_string(),
            "unknown sample format 'int8' (expected one of int16, int24, int32, float32, float64)"
        );
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_i24_sign_extension() {
        let mut raw = [0u8; 3];
        I24::new(-2).write_le(&mut raw);
        assert_eq!(raw, [0xfe, 0xff, 0xff]);
        assert_eq!(I24::read_le(&raw).get(), -2);

        I24::new(I24::MAX).write_le(&mut raw);
        assert_eq!(I24::read_le(&raw).get(), I24::MAX);
        assert_eq!(I24::new(i32::MIN).get(), I24::MIN);
    }

    #[test]
    fn test_integer_conversion_saturates() {
        assert_eq!(i16::from_f64(1.5), i16::MAX);
        assert_eq!(i16::from_f64(-1.5), i16::MIN);
        assert_eq!(i16::from_f64(0.5), 16384);
        assert_eq!(i32::from_f64(-1.0), i32::MIN);
        assert_eq!(I24::from_f64(2.0).get(), I24::MAX);
    }

    #[test]
    fn test_float_conversion_does_not_clip() {
        assert_approx_eq::assert_approx_eq!(f32::from_f64(3.5), 3.5_f32, 0.00001);
        assert_eq!(f64::from_f64(-7.25), -7.25);
    }

    #[test]
    fn test_integer_round_trip_through_f64() {
        for v in [i16::MIN, -1, 0, 1, 12345, i16::MAX] {
            assert_eq!(i16::from_f64(v.to_f64()), v);
        }
        for v in [i32::MIN, -1, 0, 1, 123_456_789, i32::MAX] {
            assert_eq!(i32::from_f64(v.to_f64()), v);
        }
    }
}
