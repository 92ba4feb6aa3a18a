// IEC 61850-9-2 sampled-values frame encoder and decoder.
//
// Layout (offsets relative to the EtherType when a VLAN tag is present):
//   dst MAC (6) | src MAC (6) | [TPID 0x8100 (2) | TCI (2)] |
//   EtherType 0x88BA (2) | APPID (2) | Length (2) | Reserved1 (2) |
//   Reserved2 (2) | numASDUs (1) | ASDUs...
// Each ASDU:
//   svID (64, null-padded) | smpCnt (2) | confRev (4) | smpSynch (1) |
//   [gmIdentity (8), global synch only] | 8 x (value (4) + quality (4)) |
//   timestamp (8, PTP TAI)
// The Length field counts the bytes that follow it. Bit 15 of Reserved1
// carries the simulate flag.

use crate::iec_61850_9_2::buffer::{BufferReader, BufferWriter};
use crate::iec_61850_9_2::common::{
    AnalogValue, ParseError, Quality, SampleValue, SmpSynch, SvDataType, APP_ID_MAX, APP_ID_MIN,
    MAX_ASDUS_PER_MESSAGE, SV_ETHER_TYPE, SV_ID_FIELD_LEN, VALUES_PER_ASDU, VLAN_TPID,
};
use crate::iec_61850_9_2::mac::MacAddress;
use crate::iec_61850_9_2::ptp::PtpTimestamp;

use log::warn;

/// Minimum parseable frame: Ethernet header plus the SV header start.
pub const MIN_SV_FRAME_SIZE: usize = 14 + 8;

/// 802.1Q tag carried in front of the EtherType when the control block
/// assigns a nonzero VLAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    /// Priority code point, 0-7.
    pub priority: u8,
    /// VLAN identifier, 12 bits.
    pub id: u16,
}

impl VlanTag {
    pub fn to_tci(self) -> u16 {
        ((self.priority as u16) << 13) | (self.id & 0x0FFF)
    }

    pub fn from_tci(tci: u16) -> Self {
        VlanTag {
            priority: ((tci >> 13) & 0x07) as u8,
            id: tci & 0x0FFF,
        }
    }
}

/// One Application Service Data Unit: a fixed set of eight measurements
/// (Ia, Ib, Ic, In, Va, Vb, Vc, Vn by convention) with stream bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Asdu {
    pub sv_id: String,
    pub smp_cnt: u16,
    pub conf_rev: u32,
    pub smp_synch: SmpSynch,
    pub data_set: Vec<AnalogValue>,
    pub gm_identity: Option<[u8; 8]>,
    pub timestamp: PtpTimestamp,
    /// Set by the parser when the frame carried no timestamp and the wall
    /// clock was substituted.
    pub timestamp_substituted: bool,
}

impl Asdu {
    pub fn new(sv_id: impl Into<String>) -> Self {
        Asdu {
            sv_id: sv_id.into(),
            smp_cnt: 0,
            conf_rev: 1,
            smp_synch: SmpSynch::None,
            data_set: Vec::new(),
            gm_identity: None,
            timestamp: PtpTimestamp::default(),
            timestamp_substituted: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.sv_id.len() >= 2
            && self.data_set.len() == VALUES_PER_ASDU
            && (self.smp_synch == SmpSynch::Global) == self.gm_identity.is_some()
    }
}

/// A complete sampled-values Ethernet frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SvMessage {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub vlan: Option<VlanTag>,
    pub app_id: u16,
    pub simulate: bool,
    pub asdus: Vec<Asdu>,
}

impl SvMessage {
    pub fn is_valid(&self) -> bool {
        (APP_ID_MIN..=APP_ID_MAX).contains(&self.app_id)
            && !self.asdus.is_empty()
            && self.asdus.len() <= MAX_ASDUS_PER_MESSAGE as usize
            && self.asdus.iter().all(Asdu::is_valid)
    }

    /// Serializes the frame. `data_type` fixes the wire representation of
    /// every sample value, coercing mixed inputs the way the owning
    /// control block declares them.
    pub fn to_hex(&self, data_type: SvDataType) -> Vec<u8> {
        let mut writer = BufferWriter::with_capacity(1500);

        writer.write_bytes(self.destination.as_bytes());
        writer.write_bytes(self.source.as_bytes());

        if let Some(vlan) = self.vlan {
            writer.write_u16(VLAN_TPID);
            writer.write_u16(vlan.to_tci());
        }

        writer.write_u16(SV_ETHER_TYPE);
        writer.write_u16(self.app_id);

        let length_pos = writer.reserve(2);

        // Reserved1 carries the simulate flag in bit 15, Reserved2 is zero.
        writer.write_u16(if self.simulate { 0x8000 } else { 0 });
        writer.write_u16(0);

        writer.write_u8(self.asdus.len() as u8);

        for asdu in &self.asdus {
            writer.write_fixed_string(&asdu.sv_id, SV_ID_FIELD_LEN);
            writer.write_u16(asdu.smp_cnt);
            writer.write_u32(asdu.conf_rev);
            writer.write_u8(asdu.smp_synch.to_raw());

            if asdu.smp_synch == SmpSynch::Global {
                writer.write_bytes(&asdu.gm_identity.unwrap_or_default());
            }

            for analog in &asdu.data_set {
                match data_type {
                    SvDataType::Int32 => writer.write_i32(analog.scaled_int()),
                    SvDataType::UInt32 => writer.write_u32(analog.scaled_int() as u32),
                    SvDataType::Float32 => writer.write_f32(analog.as_float()),
                }
                writer.write_u32(analog.quality.to_raw());
            }

            writer.write_bytes(&asdu.timestamp.to_tai());
        }

        let length = (writer.len() - length_pos - 2) as u16;
        // The position came from reserve(), it is always inside the buffer.
        let _ = writer.write_u16_at(length_pos, length);

        writer.into_vec()
    }

    /// Parses a received Ethernet frame. `data_type` selects how the four
    /// value bytes of each sample are interpreted.
    pub fn from_hex(bytes: &[u8], data_type: SvDataType) -> Result<Self, ParseError> {
        if bytes.len() < MIN_SV_FRAME_SIZE {
            return Err(ParseError::TooShort);
        }

        let mut reader = BufferReader::new(bytes);

        let mut dst = [0u8; 6];
        dst.copy_from_slice(reader.read_bytes(6));
        let mut src = [0u8; 6];
        src.copy_from_slice(reader.read_bytes(6));

        let mut ether_type = reader.read_u16();
        let mut vlan = None;
        if ether_type == VLAN_TPID {
            vlan = Some(VlanTag::from_tci(reader.read_u16()));
            ether_type = reader.read_u16();
        }

        if ether_type != SV_ETHER_TYPE {
            return Err(ParseError::NotSv);
        }

        let app_id = reader.read_u16();
        if !(APP_ID_MIN..=APP_ID_MAX).contains(&app_id) {
            warn!("APPID {:#06x} outside the SV range", app_id);
        }

        let _length = reader.read_u16();
        let reserved1 = reader.read_u16();
        let simulate = reserved1 & 0x8000 != 0;
        reader.skip(2);

        let num_asdus = reader.read_u8();
        if num_asdus == 0 || num_asdus > MAX_ASDUS_PER_MESSAGE {
            return Err(ParseError::InvalidHeader);
        }

        let mut asdus = Vec::with_capacity(num_asdus as usize);
        for _ in 0..num_asdus {
            asdus.push(parse_asdu(&mut reader, data_type)?);
        }

        Ok(SvMessage {
            destination: MacAddress::new(dst),
            source: MacAddress::new(src),
            vlan,
            app_id,
            simulate,
            asdus,
        })
    }

    /// Reads the APPID out of a frame without parsing the payload, so a
    /// subscriber can look up the owning control block first.
    pub fn peek_app_id(bytes: &[u8]) -> Option<u16> {
        if bytes.len() < MIN_SV_FRAME_SIZE {
            return None;
        }
        let mut reader = BufferReader::new(bytes);
        reader.skip(12);
        let mut ether_type = reader.read_u16();
        if ether_type == VLAN_TPID {
            reader.skip(2);
            ether_type = reader.read_u16();
        }
        if ether_type != SV_ETHER_TYPE {
            return None;
        }
        Some(reader.read_u16())
    }
}

fn parse_asdu(reader: &mut BufferReader, data_type: SvDataType) -> Result<Asdu, ParseError> {
    let mut sv_id = reader.read_fixed_string(SV_ID_FIELD_LEN);
    while sv_id.ends_with(' ') {
        sv_id.pop();
    }

    let smp_cnt = reader.read_u16();
    let conf_rev = reader.read_u32();

    let synch_raw = reader.read_u8();
    let smp_synch = match SmpSynch::from_raw(synch_raw) {
        Some(synch) => synch,
        None => {
            warn!("Invalid smpSynch value {}, coercing to none", synch_raw);
            SmpSynch::None
        }
    };

    let gm_identity = if smp_synch == SmpSynch::Global {
        let raw = reader.read_bytes(8);
        let mut identity = [0u8; 8];
        identity[..raw.len()].copy_from_slice(raw);
        Some(identity)
    } else {
        None
    };

    let mut data_set = Vec::with_capacity(VALUES_PER_ASDU);
    while data_set.len() < VALUES_PER_ASDU && reader.remaining() >= 8 {
        let value = match data_type {
            SvDataType::Int32 => SampleValue::Int32(reader.read_i32()),
            SvDataType::UInt32 => SampleValue::UInt32(reader.read_u32()),
            SvDataType::Float32 => SampleValue::Float32(reader.read_f32()),
        };
        let quality = Quality::from_raw(reader.read_u32());
        data_set.push(AnalogValue { value, quality });
    }

    let (timestamp, timestamp_substituted) = if reader.remaining() >= 8 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(reader.read_bytes(8));
        match PtpTimestamp::from_tai(&raw) {
            Some(ts) => (ts, false),
            None => {
                warn!("Unrepresentable timestamp fraction, substituting wall clock");
                (PtpTimestamp::now(), true)
            }
        }
    } else {
        warn!("Timestamp missing, substituting wall clock");
        (PtpTimestamp::now(), true)
    };

    let asdu = Asdu {
        sv_id,
        smp_cnt,
        conf_rev,
        smp_synch,
        data_set,
        gm_identity,
        timestamp,
        timestamp_substituted,
    };

    if asdu.sv_id.len() < 2 || asdu.data_set.len() != VALUES_PER_ASDU {
        return Err(ParseError::InvalidPayload);
    }

    Ok(asdu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iec_61850_9_2::common::Validity;

    fn sample_message() -> SvMessage {
        let mut asdu = Asdu::new("SV01");
        asdu.smp_cnt = 42;
        asdu.conf_rev = 7;
        asdu.smp_synch = SmpSynch::Local;
        asdu.data_set = (0..8).map(|i| AnalogValue::int32(i * 100 - 250)).collect();
        asdu.timestamp = PtpTimestamp::new(1_700_000_000, 250_000_000);

        SvMessage {
            destination: MacAddress::new([0x01, 0x0C, 0xCD, 0x04, 0x00, 0x01]),
            source: MacAddress::new([0x00, 0x1A, 0xB6, 0x03, 0x2F, 0x1C]),
            vlan: None,
            app_id: 0x4000,
            simulate: false,
            asdus: vec![asdu],
        }
    }

    #[test]
    fn test_roundtrip_int32() {
        let message = sample_message();
        let bytes = message.to_hex(SvDataType::Int32);
        let parsed = SvMessage::from_hex(&bytes, SvDataType::Int32).unwrap();

        assert_eq!(parsed.destination, message.destination);
        assert_eq!(parsed.source, message.source);
        assert_eq!(parsed.app_id, 0x4000);
        assert!(!parsed.simulate);
        assert_eq!(parsed.asdus.len(), 1);

        let asdu = &parsed.asdus[0];
        assert_eq!(asdu.sv_id, "SV01");
        assert_eq!(asdu.smp_cnt, 42);
        assert_eq!(asdu.conf_rev, 7);
        assert_eq!(asdu.smp_synch, SmpSynch::Local);
        assert_eq!(asdu.data_set, message.asdus[0].data_set);
        assert!(!asdu.timestamp_substituted);
        // TAI fraction conversion is exact to within a nanosecond.
        assert_eq!(asdu.timestamp.seconds(), 1_700_000_000);
        assert!((asdu.timestamp.nanoseconds() as i64 - 250_000_000).abs() <= 1);
    }

    #[test]
    fn test_roundtrip_float32() {
        let mut message = sample_message();
        message.asdus[0].data_set = (0..8)
            .map(|i| AnalogValue::float32(i as f32 * 1.5 - 2.25))
            .collect();
        let bytes = message.to_hex(SvDataType::Float32);
        let parsed = SvMessage::from_hex(&bytes, SvDataType::Float32).unwrap();
        assert_eq!(parsed.asdus[0].data_set, message.asdus[0].data_set);
    }

    #[test]
    fn test_roundtrip_with_vlan_and_simulate() {
        let mut message = sample_message();
        message.vlan = Some(VlanTag {
            priority: 4,
            id: 100,
        });
        message.simulate = true;

        let bytes = message.to_hex(SvDataType::Int32);
        // TPID and TCI at offset 12, EtherType moved to 16.
        assert_eq!(&bytes[12..16], &[0x81, 0x00, 0x80, 0x64]);
        assert_eq!(&bytes[16..18], &[0x88, 0xBA]);
        // Simulate bit sits in Reserved1 behind APPID and Length.
        assert_eq!(bytes[22] & 0x80, 0x80);

        let parsed = SvMessage::from_hex(&bytes, SvDataType::Int32).unwrap();
        assert_eq!(
            parsed.vlan,
            Some(VlanTag {
                priority: 4,
                id: 100
            })
        );
        assert!(parsed.simulate);
        assert_eq!(parsed.asdus[0].sv_id, "SV01");
    }

    #[test]
    fn test_roundtrip_global_synch_gm_identity() {
        let mut message = sample_message();
        message.asdus[0].smp_synch = SmpSynch::Global;
        message.asdus[0].gm_identity = Some([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11]);

        let bytes = message.to_hex(SvDataType::Int32);
        let parsed = SvMessage::from_hex(&bytes, SvDataType::Int32).unwrap();
        assert_eq!(parsed.asdus[0].smp_synch, SmpSynch::Global);
        assert_eq!(parsed.asdus[0].gm_identity, message.asdus[0].gm_identity);
        assert!(parsed.asdus[0].is_valid());
    }

    #[test]
    fn test_roundtrip_multiple_asdus() {
        let mut message = sample_message();
        let mut second = message.asdus[0].clone();
        second.sv_id = "SV02".to_string();
        second.smp_cnt = 43;
        message.asdus.push(second);

        let bytes = message.to_hex(SvDataType::Int32);
        let parsed = SvMessage::from_hex(&bytes, SvDataType::Int32).unwrap();
        assert_eq!(parsed.asdus.len(), 2);
        assert_eq!(parsed.asdus[0].sv_id, "SV01");
        assert_eq!(parsed.asdus[1].sv_id, "SV02");
        assert_eq!(parsed.asdus[1].smp_cnt, 43);
    }

    #[test]
    fn test_length_field_counts_trailing_bytes() {
        let message = sample_message();
        let bytes = message.to_hex(SvDataType::Int32);
        let length = u16::from_be_bytes([bytes[16], bytes[17]]) as usize;
        assert_eq!(length, bytes.len() - 18);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(
            SvMessage::from_hex(&[0u8; 21], SvDataType::Int32),
            Err(ParseError::TooShort)
        );
    }

    #[test]
    fn test_not_sv_ether_type() {
        let mut bytes = sample_message().to_hex(SvDataType::Int32);
        bytes[12] = 0x08;
        bytes[13] = 0x00; // IPv4
        assert_eq!(
            SvMessage::from_hex(&bytes, SvDataType::Int32),
            Err(ParseError::NotSv)
        );
    }

    #[test]
    fn test_invalid_num_asdus() {
        let mut bytes = sample_message().to_hex(SvDataType::Int32);
        bytes[22] = 0; // numASDUs offset without VLAN
        assert_eq!(
            SvMessage::from_hex(&bytes, SvDataType::Int32),
            Err(ParseError::InvalidHeader)
        );
        bytes[22] = 9;
        assert_eq!(
            SvMessage::from_hex(&bytes, SvDataType::Int32),
            Err(ParseError::InvalidHeader)
        );
    }

    #[test]
    fn test_truncated_dataset_is_invalid_payload() {
        let bytes = sample_message().to_hex(SvDataType::Int32);
        // Cut into the fifth sample pair.
        let truncated = &bytes[..bytes.len() - 40];
        assert_eq!(
            SvMessage::from_hex(truncated, SvDataType::Int32),
            Err(ParseError::InvalidPayload)
        );
    }

    #[test]
    fn test_missing_timestamp_substitutes_wall_clock() {
        let bytes = sample_message().to_hex(SvDataType::Int32);
        let truncated = &bytes[..bytes.len() - 8];
        let parsed = SvMessage::from_hex(truncated, SvDataType::Int32).unwrap();
        assert!(parsed.asdus[0].timestamp_substituted);
        assert!(parsed.asdus[0].timestamp.seconds() > 0);
    }

    #[test]
    fn test_out_of_range_smp_synch_coerced() {
        let mut bytes = sample_message().to_hex(SvDataType::Int32);
        // smpSynch is one past svID(64) + smpCnt(2) + confRev(4).
        bytes[23 + 64 + 2 + 4] = 7;
        let parsed = SvMessage::from_hex(&bytes, SvDataType::Int32).unwrap();
        assert_eq!(parsed.asdus[0].smp_synch, SmpSynch::None);
    }

    #[test]
    fn test_sv_id_trailing_spaces_trimmed() {
        let mut message = sample_message();
        message.asdus[0].sv_id = "SV01   ".to_string();
        let bytes = message.to_hex(SvDataType::Int32);
        let parsed = SvMessage::from_hex(&bytes, SvDataType::Int32).unwrap();
        assert_eq!(parsed.asdus[0].sv_id, "SV01");
    }

    #[test]
    fn test_quality_survives_roundtrip() {
        let mut message = sample_message();
        let mut quality = Quality::good();
        quality.validity = Validity::Questionable;
        quality.test = true;
        quality.derived = true;
        message.asdus[0].data_set[3].quality = quality;

        let bytes = message.to_hex(SvDataType::Int32);
        let parsed = SvMessage::from_hex(&bytes, SvDataType::Int32).unwrap();
        assert_eq!(parsed.asdus[0].data_set[3].quality, quality);
    }

    #[test]
    fn test_peek_app_id() {
        let mut message = sample_message();
        message.app_id = 0x4ABC;
        let bytes = message.to_hex(SvDataType::Int32);
        assert_eq!(SvMessage::peek_app_id(&bytes), Some(0x4ABC));

        message.vlan = Some(VlanTag { priority: 2, id: 5 });
        let tagged = message.to_hex(SvDataType::Int32);
        assert_eq!(SvMessage::peek_app_id(&tagged), Some(0x4ABC));

        assert_eq!(SvMessage::peek_app_id(&[0u8; 4]), None);
    }

    #[test]
    fn test_message_validation() {
        let mut message = sample_message();
        assert!(message.is_valid());

        message.app_id = 0x3FFF;
        assert!(!message.is_valid());
        message.app_id = 0x4000;

        message.asdus[0].sv_id = "S".to_string();
        assert!(!message.is_valid());
        message.asdus[0].sv_id = "SV01".to_string();

        message.asdus[0].data_set.pop();
        assert!(!message.is_valid());
    }
}
