use log::error;
use std::ffi::CStr;
use std::io;

/// Returns the name of the first Layer-2 interface that is up and not the
/// loopback, or `None` when no such interface exists.
pub fn first_up_ethernet_interface() -> Option<String> {
    let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut ifaddrs) } != 0 {
        error!("getifaddrs failed: {}", io::Error::last_os_error());
        return None;
    }

    let mut found = None;
    let mut cursor = ifaddrs;
    while !cursor.is_null() {
        let ifa = unsafe { &*cursor };
        cursor = ifa.ifa_next;

        if ifa.ifa_addr.is_null() {
            continue;
        }
        let family = unsafe { (*ifa.ifa_addr).sa_family };
        if family != libc::AF_PACKET as libc::sa_family_t {
            continue;
        }

        let flags = ifa.ifa_flags;
        if flags & libc::IFF_LOOPBACK as libc::c_uint != 0 {
            continue;
        }
        if flags & libc::IFF_UP as libc::c_uint == 0 {
            continue;
        }

        let name = unsafe { CStr::from_ptr(ifa.ifa_name) };
        if let Ok(name) = name.to_str() {
            found = Some(name.to_string());
            break;
        }
    }

    unsafe { libc::freeifaddrs(ifaddrs) };
    found
}
