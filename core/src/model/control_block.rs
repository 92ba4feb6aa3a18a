use crate::iec_61850_9_2::common::{
    SamplesPerPeriod, SignalFrequency, SmpSynch, SvDataType, DEFAULT_APP_ID, DEFAULT_SMP_RATE,
};
use crate::iec_61850_9_2::mac::MacAddress;

use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU16, Ordering};

/// Default scale factor for current channels: wire units of 1 mA.
pub const CURRENT_SCALING_DEFAULT: i32 = 1000;
/// Default scale factor for voltage channels: wire units of 10 mV.
pub const VOLTAGE_SCALING_DEFAULT: i32 = 100;

/// The transport-facing subset of a control block, snapshotted for the
/// encoder so the publish path never touches the model tree. Every field
/// here is consumed by `send_asdu`: the header fields directly, and
/// `conf_rev` stamped onto the outgoing ASDU as the authoritative value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub dest_mac: MacAddress,
    pub app_id: u16,
    pub vlan_id: u16,
    pub user_priority: u8,
    pub simulate: bool,
    pub conf_rev: u32,
    pub data_type: SvDataType,
}

/// Per-publication configuration container (SVCB). Configured before the
/// publisher starts, read-only afterwards; only the sample counter mutates
/// at runtime.
#[derive(Debug)]
pub struct SampledValueControlBlock {
    name: String,
    multicast_address: String,
    app_id: u16,
    smp_rate: u16,
    data_set: String,
    conf_rev: u32,
    smp_synch: SmpSynch,
    vlan_id: u16,
    user_priority: u8,
    simulate: bool,
    samples_per_period: SamplesPerPeriod,
    signal_frequency: SignalFrequency,
    gm_identity: Option<[u8; 8]>,
    data_type: SvDataType,
    current_scaling: i32,
    voltage_scaling: i32,
    smp_cnt: AtomicU16,
}

impl SampledValueControlBlock {
    pub fn new(name: impl Into<String>) -> Self {
        SampledValueControlBlock {
            name: name.into(),
            multicast_address: String::new(),
            app_id: DEFAULT_APP_ID,
            smp_rate: DEFAULT_SMP_RATE,
            data_set: String::new(),
            conf_rev: 1,
            smp_synch: SmpSynch::None,
            vlan_id: 0,
            user_priority: 4,
            simulate: false,
            samples_per_period: SamplesPerPeriod::default(),
            signal_frequency: SignalFrequency::default(),
            gm_identity: None,
            data_type: SvDataType::default(),
            current_scaling: CURRENT_SCALING_DEFAULT,
            voltage_scaling: VOLTAGE_SCALING_DEFAULT,
            smp_cnt: AtomicU16::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_multicast_address(&mut self, address: impl Into<String>) {
        self.multicast_address = address.into();
    }

    pub fn multicast_address(&self) -> &str {
        &self.multicast_address
    }

    pub fn set_app_id(&mut self, app_id: u16) {
        self.app_id = app_id;
    }

    pub fn app_id(&self) -> u16 {
        self.app_id
    }

    pub fn set_smp_rate(&mut self, rate: u16) {
        self.smp_rate = rate;
    }

    pub fn smp_rate(&self) -> u16 {
        self.smp_rate
    }

    pub fn set_data_set(&mut self, data_set: impl Into<String>) {
        self.data_set = data_set.into();
    }

    pub fn data_set(&self) -> &str {
        &self.data_set
    }

    pub fn set_conf_rev(&mut self, revision: u32) {
        self.conf_rev = revision;
    }

    pub fn conf_rev(&self) -> u32 {
        self.conf_rev
    }

    pub fn set_smp_synch(&mut self, synch: SmpSynch) {
        self.smp_synch = synch;
    }

    pub fn smp_synch(&self) -> SmpSynch {
        self.smp_synch
    }

    pub fn set_vlan_id(&mut self, vlan_id: u16) {
        self.vlan_id = vlan_id & 0x0FFF;
    }

    pub fn vlan_id(&self) -> u16 {
        self.vlan_id
    }

    /// Sets the 802.1p priority code point. Values above 7 are ignored.
    pub fn set_user_priority(&mut self, priority: u8) {
        if priority <= 7 {
            self.user_priority = priority;
        }
    }

    pub fn user_priority(&self) -> u8 {
        self.user_priority
    }

    pub fn set_simulate(&mut self, simulate: bool) {
        self.simulate = simulate;
    }

    pub fn simulate(&self) -> bool {
        self.simulate
    }

    pub fn set_samples_per_period(&mut self, spp: SamplesPerPeriod) {
        self.samples_per_period = spp;
    }

    pub fn samples_per_period(&self) -> SamplesPerPeriod {
        self.samples_per_period
    }

    pub fn set_signal_frequency(&mut self, freq: SignalFrequency) {
        self.signal_frequency = freq;
    }

    pub fn signal_frequency(&self) -> SignalFrequency {
        self.signal_frequency
    }

    pub fn set_grandmaster_identity(&mut self, identity: [u8; 8]) {
        self.gm_identity = Some(identity);
    }

    pub fn grandmaster_identity(&self) -> Option<[u8; 8]> {
        self.gm_identity
    }

    pub fn clear_grandmaster_identity(&mut self) {
        self.gm_identity = None;
    }

    pub fn set_data_type(&mut self, data_type: SvDataType) {
        self.data_type = data_type;
    }

    pub fn data_type(&self) -> SvDataType {
        self.data_type
    }

    pub fn set_current_scaling(&mut self, factor: i32) {
        self.current_scaling = factor;
    }

    pub fn current_scaling(&self) -> i32 {
        self.current_scaling
    }

    pub fn set_voltage_scaling(&mut self, factor: i32) {
        self.voltage_scaling = factor;
    }

    pub fn voltage_scaling(&self) -> i32 {
        self.voltage_scaling
    }

    /// Hands out the next sample counter value, wrapping at 2^16. Each
    /// control block counts independently so publishers in one process
    /// never interleave their sequences.
    pub fn next_smp_cnt(&self) -> u16 {
        self.smp_cnt.fetch_add(1, Ordering::Relaxed)
    }

    /// Snapshots the fields the transport needs.
    pub fn to_publisher_config(&self) -> PublisherConfig {
        let dest_mac = if self.multicast_address.is_empty() {
            MacAddress::default()
        } else {
            MacAddress::try_parse(&self.multicast_address).unwrap_or_else(|| {
                warn!(
                    "Unparseable multicast address '{}' on {}",
                    self.multicast_address, self.name
                );
                MacAddress::default()
            })
        };

        PublisherConfig {
            dest_mac,
            app_id: self.app_id,
            vlan_id: self.vlan_id,
            user_priority: self.user_priority,
            simulate: self.simulate,
            conf_rev: self.conf_rev,
            data_type: self.data_type,
        }
    }
}
