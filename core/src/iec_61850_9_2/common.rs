use serde::{Deserialize, Serialize};
use std::fmt;

/// SV EtherType per IEC 61850-9-2.
pub const SV_ETHER_TYPE: u16 = 0x88BA;
/// 802.1Q VLAN tag protocol identifier.
pub const VLAN_TPID: u16 = 0x8100;
/// Lowest APPID assigned to sampled values.
pub const APP_ID_MIN: u16 = 0x4000;
/// Highest APPID assigned to sampled values.
pub const APP_ID_MAX: u16 = 0x7FFF;
pub const DEFAULT_APP_ID: u16 = 0x4000;
pub const DEFAULT_SMP_RATE: u16 = 4000;
/// Fixed dataset width: Ia, Ib, Ic, In, Va, Vb, Vc, Vn.
pub const VALUES_PER_ASDU: usize = 8;
pub const MAX_ASDUS_PER_MESSAGE: u8 = 8;
/// svID wire field width (null-padded).
pub const SV_ID_FIELD_LEN: usize = 64;

/// Represents errors that can occur during SV frame parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    TooShort,
    NotSv,
    InvalidHeader,
    InvalidPayload,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::TooShort => write!(f, "Frame too short"),
            ParseError::NotSv => write!(f, "Not a sampled-values frame"),
            ParseError::InvalidHeader => write!(f, "Invalid SV header"),
            ParseError::InvalidPayload => write!(f, "Invalid SV payload"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Configuration errors, fatal at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidMac(String),
    InvalidDefinition(&'static str),
    InvalidSettings(&'static str),
    NoInterface,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::InvalidMac(s) => write!(f, "Invalid MAC address: {}", s),
            ConfigError::InvalidDefinition(s) => write!(f, "Invalid definition: {}", s),
            ConfigError::InvalidSettings(s) => write!(f, "Invalid settings: {}", s),
            ConfigError::NoInterface => write!(f, "No suitable Ethernet interface found"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Clock synchronization source of a sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmpSynch {
    None,
    Local,
    Global,
}

impl SmpSynch {
    /// Decodes the wire octet. Out-of-range values are reported as `None`
    /// so callers can log and coerce.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(SmpSynch::None),
            1 => Some(SmpSynch::Local),
            2 => Some(SmpSynch::Global),
            _ => None,
        }
    }

    pub fn to_raw(self) -> u8 {
        match self {
            SmpSynch::None => 0,
            SmpSynch::Local => 1,
            SmpSynch::Global => 2,
        }
    }
}

impl Default for SmpSynch {
    fn default() -> Self {
        SmpSynch::None
    }
}

impl fmt::Display for SmpSynch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmpSynch::None => write!(f, "none"),
            SmpSynch::Local => write!(f, "local"),
            SmpSynch::Global => write!(f, "global"),
        }
    }
}

/// Wire representation chosen for every sample value of a control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SvDataType {
    Int32,
    UInt32,
    Float32,
}

impl Default for SvDataType {
    fn default() -> Self {
        SvDataType::Int32
    }
}

impl fmt::Display for SvDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvDataType::Int32 => write!(f, "INT32"),
            SvDataType::UInt32 => write!(f, "UINT32"),
            SvDataType::Float32 => write!(f, "FLOAT32"),
        }
    }
}

/// Number of samples per nominal power-system period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplesPerPeriod {
    Spp80,
    Spp256,
}

impl SamplesPerPeriod {
    pub fn count(self) -> u16 {
        match self {
            SamplesPerPeriod::Spp80 => 80,
            SamplesPerPeriod::Spp256 => 256,
        }
    }
}

impl Default for SamplesPerPeriod {
    fn default() -> Self {
        SamplesPerPeriod::Spp80
    }
}

/// Nominal signal frequency of the sampled system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalFrequency {
    Freq16_7Hz,
    Freq25Hz,
    Freq50Hz,
    Freq60Hz,
}

impl SignalFrequency {
    pub fn hertz(self) -> f64 {
        match self {
            SignalFrequency::Freq16_7Hz => 16.7,
            SignalFrequency::Freq25Hz => 25.0,
            SignalFrequency::Freq50Hz => 50.0,
            SignalFrequency::Freq60Hz => 60.0,
        }
    }
}

impl Default for SignalFrequency {
    fn default() -> Self {
        SignalFrequency::Freq50Hz
    }
}

/// Validity field of a quality descriptor (2 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    Good,
    Invalid,
    Reserved,
    Questionable,
}

impl Validity {
    pub fn from_raw(raw: u32) -> Self {
        match raw & 0x3 {
            0 => Validity::Good,
            1 => Validity::Invalid,
            2 => Validity::Reserved,
            _ => Validity::Questionable,
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Validity::Good => 0,
            Validity::Invalid => 1,
            Validity::Reserved => 2,
            Validity::Questionable => 3,
        }
    }
}

impl Default for Validity {
    fn default() -> Self {
        Validity::Good
    }
}

/// IEC 61850 quality descriptor, packed into 32 bits on the wire.
///
/// Bits 0-1 hold the validity, bits 2-13 the individual detail flags,
/// the remainder is reserved and must be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quality {
    pub validity: Validity,
    pub overflow: bool,
    pub out_of_range: bool,
    pub bad_reference: bool,
    pub oscillatory: bool,
    pub failure: bool,
    pub old_data: bool,
    pub inconsistent: bool,
    pub inaccurate: bool,
    pub source: bool,
    pub test: bool,
    pub operator_blocked: bool,
    pub derived: bool,
}

const Q_OVERFLOW: u32 = 1 << 2;
const Q_OUT_OF_RANGE: u32 = 1 << 3;
const Q_BAD_REFERENCE: u32 = 1 << 4;
const Q_OSCILLATORY: u32 = 1 << 5;
const Q_FAILURE: u32 = 1 << 6;
const Q_OLD_DATA: u32 = 1 << 7;
const Q_INCONSISTENT: u32 = 1 << 8;
const Q_INACCURATE: u32 = 1 << 9;
const Q_SOURCE: u32 = 1 << 10;
const Q_TEST: u32 = 1 << 11;
const Q_OPERATOR_BLOCKED: u32 = 1 << 12;
const Q_DERIVED: u32 = 1 << 13;

impl Quality {
    /// Good quality, all detail flags clear.
    pub fn good() -> Self {
        Quality::default()
    }

    pub fn from_raw(raw: u32) -> Self {
        Quality {
            validity: Validity::from_raw(raw),
            overflow: raw & Q_OVERFLOW != 0,
            out_of_range: raw & Q_OUT_OF_RANGE != 0,
            bad_reference: raw & Q_BAD_REFERENCE != 0,
            oscillatory: raw & Q_OSCILLATORY != 0,
            failure: raw & Q_FAILURE != 0,
            old_data: raw & Q_OLD_DATA != 0,
            inconsistent: raw & Q_INCONSISTENT != 0,
            inaccurate: raw & Q_INACCURATE != 0,
            source: raw & Q_SOURCE != 0,
            test: raw & Q_TEST != 0,
            operator_blocked: raw & Q_OPERATOR_BLOCKED != 0,
            derived: raw & Q_DERIVED != 0,
        }
    }

    pub fn to_raw(self) -> u32 {
        let mut raw = self.validity.to_raw();
        if self.overflow {
            raw |= Q_OVERFLOW;
        }
        if self.out_of_range {
            raw |= Q_OUT_OF_RANGE;
        }
        if self.bad_reference {
            raw |= Q_BAD_REFERENCE;
        }
        if self.oscillatory {
            raw |= Q_OSCILLATORY;
        }
        if self.failure {
            raw |= Q_FAILURE;
        }
        if self.old_data {
            raw |= Q_OLD_DATA;
        }
        if self.inconsistent {
            raw |= Q_INCONSISTENT;
        }
        if self.inaccurate {
            raw |= Q_INACCURATE;
        }
        if self.source {
            raw |= Q_SOURCE;
        }
        if self.test {
            raw |= Q_TEST;
        }
        if self.operator_blocked {
            raw |= Q_OPERATOR_BLOCKED;
        }
        if self.derived {
            raw |= Q_DERIVED;
        }
        raw
    }

    pub fn is_good(self) -> bool {
        self.validity == Validity::Good
    }
}

/// One sampled measurement value as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SampleValue {
    Int32(i32),
    UInt32(u32),
    Float32(f32),
}

impl SampleValue {
    pub fn data_type(self) -> SvDataType {
        match self {
            SampleValue::Int32(_) => SvDataType::Int32,
            SampleValue::UInt32(_) => SvDataType::UInt32,
            SampleValue::Float32(_) => SvDataType::Float32,
        }
    }
}

/// An analog value together with its quality descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalogValue {
    pub value: SampleValue,
    pub quality: Quality,
}

impl AnalogValue {
    pub fn int32(value: i32) -> Self {
        AnalogValue {
            value: SampleValue::Int32(value),
            quality: Quality::good(),
        }
    }

    pub fn uint32(value: u32) -> Self {
        AnalogValue {
            value: SampleValue::UInt32(value),
            quality: Quality::good(),
        }
    }

    pub fn float32(value: f32) -> Self {
        AnalogValue {
            value: SampleValue::Float32(value),
            quality: Quality::good(),
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Total conversion to a scaled integer; floats are truncated.
    pub fn scaled_int(&self) -> i32 {
        match self.value {
            SampleValue::Int32(v) => v,
            SampleValue::UInt32(v) => v as i32,
            SampleValue::Float32(v) => v as i32,
        }
    }

    /// Total conversion to a float; integers are widened.
    pub fn as_float(&self) -> f32 {
        match self.value {
            SampleValue::Int32(v) => v as f32,
            SampleValue::UInt32(v) => v as f32,
            SampleValue::Float32(v) => v,
        }
    }
}
