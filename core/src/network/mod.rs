//! Raw Layer-2 Ethernet transport: AF_PACKET sockets bound to a named
//! interface. Requires CAP_NET_RAW.

mod interfaces;
mod receiver;
mod sender;

pub use interfaces::first_up_ethernet_interface;
pub use receiver::EthernetReceiver;
pub use sender::EthernetSender;

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// Opens a raw packet socket for all EtherTypes and binds it to the named
/// interface. Returns the owned descriptor and the interface index.
pub(crate) fn open_raw_socket(interface: &str) -> io::Result<(OwnedFd, i32)> {
    let protocol = (libc::ETH_P_ALL as u16).to_be() as i32;
    let raw_fd = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, protocol) };
    if raw_fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };

    let if_index = interface_index(&fd, interface)?;

    let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as u16;
    addr.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
    addr.sll_ifindex = if_index;

    let rc = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok((fd, if_index))
}

/// Builds an `ifreq` carrying the interface name, truncated to IFNAMSIZ-1.
pub(crate) fn ifreq_for(interface: &str) -> libc::ifreq {
    let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
    let name = interface.as_bytes();
    let copy_len = name.len().min(libc::IFNAMSIZ - 1);
    for (dst, &src) in ifr.ifr_name.iter_mut().zip(name[..copy_len].iter()) {
        *dst = src as libc::c_char;
    }
    ifr
}

pub(crate) fn interface_index(fd: &OwnedFd, interface: &str) -> io::Result<i32> {
    let mut ifr = ifreq_for(interface);
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), libc::SIOCGIFINDEX as _, &mut ifr) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { ifr.ifr_ifru.ifru_ifindex })
}
