use crate::network::{ifreq_for, open_raw_socket};

use log::{error, info, warn};
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const RECV_BUFFER_SIZE: usize = 1500;
/// Poll interval for the stop flag while no traffic arrives.
const RECV_TIMEOUT: Duration = Duration::from_millis(200);

/// Raw-socket frame receiver with promiscuous reception and an optional
/// background receive loop. Owns its file descriptor; not clonable.
#[derive(Debug)]
pub struct EthernetReceiver {
    interface: String,
    fd: Arc<OwnedFd>,
    running: Arc<AtomicBool>,
    receive_thread: Option<thread::JoinHandle<()>>,
}

impl EthernetReceiver {
    /// Opens and binds the raw socket, then enables promiscuous mode on
    /// the interface (failure to do so is logged, not fatal).
    pub fn create(interface: &str) -> io::Result<Self> {
        let (fd, _if_index) = open_raw_socket(interface)?;
        enable_promiscuous(&fd, interface);
        set_receive_timeout(&fd, RECV_TIMEOUT)?;
        Ok(EthernetReceiver {
            interface: interface.to_string(),
            fd: Arc::new(fd),
            running: Arc::new(AtomicBool::new(false)),
            receive_thread: None,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Blocking single-frame receive. Returns `WouldBlock` after the
    /// receive timeout elapses without traffic.
    pub fn recv_frame(&self, buffer: &mut [u8]) -> io::Result<usize> {
        let received = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                0,
            )
        };
        if received < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(received as usize)
    }

    /// Spawns the receive loop. Every complete Ethernet frame is handed
    /// to `handler`; would-block timeouts are swallowed and other receive
    /// errors are logged and retried.
    pub fn start<F>(&mut self, mut handler: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Receiver on {} already running", self.interface);
            return;
        }

        let fd = Arc::clone(&self.fd);
        let running = Arc::clone(&self.running);
        let interface = self.interface.clone();

        self.receive_thread = Some(thread::spawn(move || {
            let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
            info!("Receive loop started on {}", interface);

            while running.load(Ordering::SeqCst) {
                let received = unsafe {
                    libc::recv(
                        fd.as_raw_fd(),
                        buffer.as_mut_ptr() as *mut libc::c_void,
                        buffer.len(),
                        0,
                    )
                };

                if received < 0 {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::WouldBlock {
                        error!("Receive error on {}: {}", interface, err);
                    }
                    continue;
                }

                let len = received as usize;
                if len < 14 {
                    warn!("Frame too short: {} bytes", len);
                    continue;
                }

                handler(&buffer[..len]);
            }

            info!("Receive loop stopped on {}", interface);
        }));
    }

    /// Flips the stop flag and joins the receive loop.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.receive_thread.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for EthernetReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn enable_promiscuous(fd: &OwnedFd, interface: &str) {
    let mut ifr = ifreq_for(interface);
    if unsafe { libc::ioctl(fd.as_raw_fd(), libc::SIOCGIFFLAGS as _, &mut ifr) } < 0 {
        error!(
            "Failed to read flags of {}: {}",
            interface,
            io::Error::last_os_error()
        );
        return;
    }
    unsafe {
        ifr.ifr_ifru.ifru_flags |= libc::IFF_PROMISC as libc::c_short;
    }
    if unsafe { libc::ioctl(fd.as_raw_fd(), libc::SIOCSIFFLAGS as _, &mut ifr) } < 0 {
        error!(
            "Failed to enable promiscuous mode on {}: {}",
            interface,
            io::Error::last_os_error()
        );
    }
}

fn set_receive_timeout(fd: &OwnedFd, timeout: Duration) -> io::Result<()> {
    let tv = libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    };
    let rc = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_RCVTIMEO,
            &tv as *const libc::timeval as *const libc::c_void,
            std::mem::size_of::<libc::timeval>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
