//! Scripted in-memory serial ports for driving `GpsLink` in tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use gpslink_core::{PortDescriptor, PortEvent, PortFactory, PortHandle, StateUpdate, TransportError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";
pub const GGA_MOVED: &str = "$GPGGA,123520,4807.040,N,01131.002,E,1,09,0.8,545.6,M,46.9,M,,*42\r\n";
pub const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";
pub const GSV: &str = "$GPGSV,2,1,08,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45*75\r\n";

#[derive(Default)]
struct Script {
    opens: Vec<(String, u32)>,
    closes: Vec<(String, u32)>,
    senders: Vec<mpsc::Sender<PortEvent>>,
    handles: Vec<Arc<AtomicBool>>,
    failures_left: usize,
    responders: HashMap<u32, Vec<Bytes>>,
    ports: Option<Vec<PortDescriptor>>,
}

/// Records every open and close; ports at a configured baud rate emit
/// their scripted chunks as soon as they are opened.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    script: Arc<Mutex<Script>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ports opened at `baud_rate` immediately emit `chunks`
    pub fn respond_at(&self, baud_rate: u32, chunks: &[&str]) -> &Self {
        self.script.lock().unwrap().responders.insert(
            baud_rate,
            chunks.iter().map(|c| Bytes::copy_from_slice(c.as_bytes())).collect(),
        );
        self
    }

    /// The next `count` opens fail with `PortNotFound`
    pub fn fail_next_opens(&self, count: usize) -> &Self {
        self.script.lock().unwrap().failures_left = count;
        self
    }

    pub fn set_ports(&self, ports: Option<Vec<PortDescriptor>>) {
        self.script.lock().unwrap().ports = ports;
    }

    /// Every open attempt, failed ones included
    pub fn opens(&self) -> Vec<(String, u32)> {
        self.script.lock().unwrap().opens.clone()
    }

    pub fn open_count(&self) -> usize {
        self.script.lock().unwrap().opens.len()
    }

    pub fn closes(&self) -> Vec<(String, u32)> {
        self.script.lock().unwrap().closes.clone()
    }

    /// Event sender of the `index`-th successful open
    pub fn port(&self, index: usize) -> mpsc::Sender<PortEvent> {
        self.script.lock().unwrap().senders[index].clone()
    }

    /// Whether the `index`-th successful open is still open
    pub fn is_open(&self, index: usize) -> bool {
        self.script.lock().unwrap().handles[index].load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortFactory for ScriptedFactory {
    async fn open(
        &self,
        path: &str,
        baud_rate: u32,
        events: mpsc::Sender<PortEvent>,
    ) -> Result<Box<dyn PortHandle>, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.opens.push((path.to_string(), baud_rate));

        if script.failures_left > 0 {
            script.failures_left -= 1;
            return Err(TransportError::PortNotFound(path.to_string()));
        }

        if let Some(chunks) = script.responders.get(&baud_rate) {
            for chunk in chunks {
                events.try_send(PortEvent::Data(chunk.clone())).unwrap();
            }
        }

        let open = Arc::new(AtomicBool::new(true));
        script.senders.push(events);
        script.handles.push(open.clone());

        Ok(Box::new(ScriptedHandle {
            path: path.to_string(),
            baud_rate,
            open,
            script: self.script.clone(),
        }))
    }

    fn list(&self) -> Result<Vec<PortDescriptor>, TransportError> {
        self.script
            .lock()
            .unwrap()
            .ports
            .clone()
            .ok_or_else(|| TransportError::Discovery("enumeration unavailable".to_string()))
    }
}

struct ScriptedHandle {
    path: String,
    baud_rate: u32,
    open: Arc<AtomicBool>,
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl PortHandle for ScriptedHandle {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .closes
            .push((self.path.clone(), self.baud_rate));
        Ok(())
    }

    fn connection_info(&self) -> String {
        format!("scripted {} @ {}", self.path, self.baud_rate)
    }
}

/// Receive updates until `channel` is published, returning its value
pub async fn next_value_of(
    updates: &mut mpsc::UnboundedReceiver<StateUpdate>,
    channel: &str,
) -> gpslink_core::ChannelValue {
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let update = updates.recv().await.expect("sink closed");
            if update.channel == channel {
                return update.value;
            }
        }
    })
    .await
    .expect("timed out waiting for update")
}
