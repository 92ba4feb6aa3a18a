use crate::iec_61850_9_2::common::{AnalogValue, ConfigError, SmpSynch, VALUES_PER_ASDU};
use crate::iec_61850_9_2::frames::Asdu;
use crate::iec_61850_9_2::ptp::PtpTimestamp;
use crate::model::control_block::SampledValueControlBlock;
use crate::model::ied::IedModel;
use crate::network::{first_up_ethernet_interface, EthernetSender};

use log::{error, info};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Cadence of the background publisher thread. The thread exists to carry
/// future timer-driven emission; today it only observes the stop flag.
const CADENCE_INTERVAL: Duration = Duration::from_millis(100);

/// Sampled-values publisher: owns the model view, the raw-socket sender
/// and the cadence thread.
#[derive(Debug)]
pub struct IedServer {
    model: Arc<IedModel>,
    interface: String,
    sender: Option<EthernetSender>,
    running: Arc<AtomicBool>,
    cadence_thread: Option<thread::JoinHandle<()>>,
}

impl IedServer {
    /// Creates a publisher for the model. An empty interface name selects
    /// the first up, non-loopback Ethernet interface.
    pub fn create(model: Arc<IedModel>, interface: &str) -> Result<Self, ConfigError> {
        let interface = if interface.is_empty() {
            first_up_ethernet_interface().ok_or(ConfigError::NoInterface)?
        } else {
            interface.to_string()
        };
        Ok(IedServer {
            model,
            interface,
            sender: None,
            running: Arc::new(AtomicBool::new(false)),
            cadence_thread: None,
        })
    }

    pub fn model(&self) -> &Arc<IedModel> {
        &self.model
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Opens the sender if needed and spawns the cadence thread. Transport
    /// construction failures propagate.
    pub fn start(&mut self) -> io::Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.sender.is_none() {
            self.sender = Some(EthernetSender::create(&self.interface)?);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        self.cadence_thread = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                thread::sleep(CADENCE_INTERVAL);
            }
        }));

        info!("Publisher started on {}", self.interface);
        Ok(())
    }

    /// Clears the running flag and joins the cadence thread.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.cadence_thread.take() {
            let _ = handle.join();
        }
        info!("Publisher stopped on {}", self.interface);
    }

    /// Emits one frame for the control block, synchronously. Validation
    /// and send failures are logged and swallowed so the caller's sampling
    /// loop stays on cadence.
    pub fn update_sampled_value(
        &self,
        svcb: &SampledValueControlBlock,
        values: Vec<AnalogValue>,
    ) {
        if values.len() != VALUES_PER_ASDU {
            error!(
                "Invalid number of values for ASDU: {}, expected {}",
                values.len(),
                VALUES_PER_ASDU
            );
            return;
        }

        let sender = match &self.sender {
            Some(sender) => sender,
            None => {
                error!("Sender not initialized, call start() first");
                return;
            }
        };

        // conf_rev is stamped by the sender from the publisher config.
        let mut asdu = Asdu::new(svcb.name());
        asdu.smp_cnt = svcb.next_smp_cnt();
        asdu.data_set = values;
        asdu.timestamp = PtpTimestamp::now();

        // No PTP clock discipline is wired in, so a globally-synchronized
        // block downgrades to local synchronization.
        asdu.smp_synch = match svcb.smp_synch() {
            SmpSynch::Global => {
                info!("Global synchronization not available, defaulting to local");
                SmpSynch::Local
            }
            synch => synch,
        };

        if !asdu.is_valid() {
            error!("ASDU for {} failed validation, dropping", svcb.name());
            return;
        }

        let config = svcb.to_publisher_config();
        if config.dest_mac.is_zero() {
            error!("Control block {} has no multicast address", svcb.name());
            return;
        }

        if let Err(err) = sender.send_asdu(&config, &asdu) {
            error!("Failed to send ASDU for {}: {}", svcb.name(), err);
        }
    }
}

impl Drop for IedServer {
    fn drop(&mut self) {
        self.stop();
    }
}
