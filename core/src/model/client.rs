use crate::iec_61850_9_2::common::{ConfigError, ParseError};
use crate::iec_61850_9_2::frames::{Asdu, SvMessage};
use crate::iec_61850_9_2::mac::MacAddress;
use crate::model::ied::IedModel;
use crate::network::{first_up_ethernet_interface, EthernetReceiver};

use log::{debug, error, info, warn};
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

/// Sampled-values subscriber: receives frames on one interface, parses
/// them and dispatches ASDUs to a callback. The receive loop must never be
/// blocked by the callback.
#[derive(Debug)]
pub struct IedClient {
    model: Arc<IedModel>,
    interface: String,
    receiver: Option<EthernetReceiver>,
    received: Arc<Mutex<Vec<Asdu>>>,
}

impl IedClient {
    /// Creates a subscriber for the model. An empty interface name selects
    /// the first up, non-loopback Ethernet interface.
    pub fn create(model: Arc<IedModel>, interface: &str) -> Result<Self, ConfigError> {
        let interface = if interface.is_empty() {
            first_up_ethernet_interface().ok_or(ConfigError::NoInterface)?
        } else {
            interface.to_string()
        };
        Ok(IedClient {
            model,
            interface,
            receiver: None,
            received: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn model(&self) -> &Arc<IedModel> {
        &self.model
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Starts receiving with the default callback, which collects ASDUs
    /// into the internal vector for `receive_sampled_values`.
    pub fn start(&mut self) -> io::Result<()> {
        let received = Arc::clone(&self.received);
        self.start_with_callback(move |asdu| {
            info!(
                "Received ASDU: {} with {} values",
                asdu.sv_id,
                asdu.data_set.len()
            );
            received.lock().unwrap().push(asdu);
        })
    }

    /// Starts receiving and hands every parsed ASDU to `callback`, with
    /// ownership. A panicking callback is contained; the loop survives.
    pub fn start_with_callback<F>(&mut self, mut callback: F) -> io::Result<()>
    where
        F: FnMut(Asdu) + Send + 'static,
    {
        if self.receiver.is_none() {
            self.receiver = Some(EthernetReceiver::create(&self.interface)?);
        }

        let model = Arc::clone(&self.model);
        let receiver = self.receiver.as_mut().unwrap();

        receiver.start(move |frame| {
            let mut dst = [0u8; 6];
            dst.copy_from_slice(&frame[..6]);
            let ether_type = u16::from_be_bytes([frame[12], frame[13]]);
            debug!(
                "RX frame: dst={} etherType={:#06x} len={}",
                MacAddress::new(dst),
                ether_type,
                frame.len()
            );

            // The wire carries no value-type marker; the matching control
            // block in the local model decides how the samples read.
            let data_type = SvMessage::peek_app_id(frame)
                .and_then(|app_id| model.control_block_by_app_id(app_id))
                .map(|svcb| svcb.data_type())
                .unwrap_or_default();

            match SvMessage::from_hex(frame, data_type) {
                Ok(message) => {
                    for asdu in message.asdus {
                        let outcome =
                            std::panic::catch_unwind(AssertUnwindSafe(|| callback(asdu)));
                        if outcome.is_err() {
                            error!("Subscriber callback panicked, frame dropped");
                        }
                    }
                }
                Err(ParseError::NotSv) => {}
                Err(err) => warn!("Dropping frame: {}", err),
            }
        });

        Ok(())
    }

    /// Drains and returns everything the default callback collected.
    pub fn receive_sampled_values(&self) -> Vec<Asdu> {
        std::mem::take(&mut *self.received.lock().unwrap())
    }

    /// Stops the receive loop and joins its thread.
    pub fn stop(&mut self) {
        if let Some(receiver) = &mut self.receiver {
            receiver.stop();
        }
    }
}

impl Drop for IedClient {
    fn drop(&mut self) {
        self.stop();
    }
}
