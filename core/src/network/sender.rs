use crate::iec_61850_9_2::frames::{Asdu, SvMessage, VlanTag};
use crate::iec_61850_9_2::mac::MacAddress;
use crate::model::PublisherConfig;
use crate::network::{ifreq_for, open_raw_socket};

use log::{debug, error};
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};

/// Raw-socket frame transmitter bound to one interface. Owns its file
/// descriptor; not clonable, movable once.
#[derive(Debug)]
pub struct EthernetSender {
    interface: String,
    fd: OwnedFd,
    if_index: i32,
    source_mac: MacAddress,
}

impl EthernetSender {
    /// Opens and binds the raw socket. Fails on missing privilege or an
    /// unknown interface.
    pub fn create(interface: &str) -> io::Result<Self> {
        let (fd, if_index) = open_raw_socket(interface)?;
        let source_mac = hardware_address(&fd, interface);
        Ok(EthernetSender {
            interface: interface.to_string(),
            fd,
            if_index,
            source_mac,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// MAC of the bound interface; zero when the HWADDR ioctl failed.
    pub fn source_mac(&self) -> MacAddress {
        self.source_mac
    }

    /// Transmits one frame. Zero-length frames are ignored; a partial
    /// write is logged but not treated as an error.
    pub fn send_frame(&self, data: &[u8], dest_mac: &MacAddress) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_ifindex = self.if_index;
        addr.sll_halen = MacAddress::LENGTH as u8;
        addr.sll_addr[..6].copy_from_slice(dest_mac.as_bytes());

        let sent = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                data.as_ptr() as *const libc::c_void,
                data.len(),
                0,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };

        if sent < 0 {
            let err = io::Error::last_os_error();
            error!("Send failed on {}: {}", self.interface, err);
            return Err(err);
        }
        if sent as usize != data.len() {
            error!("Partial send: sent {} of {} bytes", sent, data.len());
        } else {
            debug!("Sent frame of {} bytes", sent);
        }
        Ok(())
    }

    /// Encodes one ASDU under the control block's publisher configuration
    /// and transmits it to the block's multicast address. The control
    /// block's `conf_rev` is authoritative and overwrites whatever the
    /// caller put on the ASDU.
    pub fn send_asdu(&self, config: &PublisherConfig, asdu: &Asdu) -> io::Result<()> {
        let vlan = if config.vlan_id > 0 {
            Some(VlanTag {
                priority: config.user_priority,
                id: config.vlan_id,
            })
        } else {
            None
        };

        let mut asdu = asdu.clone();
        asdu.conf_rev = config.conf_rev;

        let message = SvMessage {
            destination: config.dest_mac,
            source: self.source_mac,
            vlan,
            app_id: config.app_id,
            simulate: config.simulate,
            asdus: vec![asdu],
        };

        let bytes = message.to_hex(config.data_type);
        self.send_frame(&bytes, &config.dest_mac)
    }
}

fn hardware_address(fd: &OwnedFd, interface: &str) -> MacAddress {
    let mut ifr = ifreq_for(interface);
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), libc::SIOCGIFHWADDR as _, &mut ifr) };
    if rc < 0 {
        error!(
            "Failed to read MAC of {}: {}",
            interface,
            io::Error::last_os_error()
        );
        return MacAddress::default();
    }
    let sa_data = unsafe { ifr.ifr_ifru.ifru_hwaddr.sa_data };
    let mut mac = [0u8; 6];
    for (dst, &src) in mac.iter_mut().zip(sa_data[..6].iter()) {
        *dst = src as u8;
    }
    MacAddress::new(mac)
}
