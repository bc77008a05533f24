//! Behringer X-Touch Extender driver
//!
//! Opens the extender's MIDI ports, hands inbound messages to the async
//! side through a channel, and writes outbound frames from a dedicated
//! thread so a slow or unplugged device never stalls the router.

pub mod fader_curve;
pub mod fader_touch;
pub mod surface;

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

pub use surface::{MidiSink, Surface, IDLE_LCD_COLOR};

use crate::config::SurfaceConfig;
use crate::midi::format_hex;

/// Frames queued for the writer thread before new ones are dropped
pub const OUTPUT_QUEUE_CAPACITY: usize = 1024;

/// Inbound messages buffered between the MIDI callback and the router
const INPUT_QUEUE_CAPACITY: usize = 1000;

/// Raw MIDI message from the extender
#[derive(Debug, Clone)]
pub struct XTouchEvent {
    pub timestamp: Instant,
    pub raw_data: Vec<u8>,
}

/// Sink side of the writer thread
#[derive(Clone)]
pub struct WriterSink {
    tx: Sender<Vec<u8>>,
}

impl MidiSink for WriterSink {
    fn send(&self, data: Vec<u8>) {
        match self.tx.try_send(data) {
            Ok(()) => {}
            Err(TrySendError::Full(data)) => {
                warn!("MIDI output queue full, dropping {}", format_hex(&data));
            }
            Err(TrySendError::Disconnected(_)) => {
                trace!("MIDI writer stopped, frame discarded");
            }
        }
    }
}

/// Background thread owning the output connection
struct OutputWriter {
    sink: WriterSink,
    thread: JoinHandle<()>,
}

impl OutputWriter {
    fn spawn(mut conn: MidiOutputConnection) -> Result<Self> {
        let (tx, rx): (Sender<Vec<u8>>, Receiver<Vec<u8>>) = channel::bounded(OUTPUT_QUEUE_CAPACITY);

        let thread = std::thread::Builder::new()
            .name("xtouch-writer".to_string())
            .spawn(move || {
                let mut failing = false;
                for data in rx.iter() {
                    match conn.send(&data) {
                        Ok(()) => {
                            if failing {
                                info!("X-Touch output recovered");
                                failing = false;
                            }
                        }
                        Err(e) if !failing => {
                            warn!("Failed to send to X-Touch ({}), discarding output until it recovers", e);
                            failing = true;
                        }
                        Err(e) => trace!("X-Touch write failed: {}", e),
                    }
                }
                conn.close();
                debug!("X-Touch writer finished");
            })
            .context("Failed to spawn MIDI writer thread")?;

        Ok(Self {
            sink: WriterSink { tx },
            thread,
        })
    }

    /// Stop accepting frames and wait until everything queued is written
    ///
    /// Blocks until every other [`WriterSink`] clone is gone as well.
    fn close(self) {
        drop(self.sink);
        if self.thread.join().is_err() {
            warn!("MIDI writer thread panicked");
        }
    }
}

/// X-Touch Extender driver for hardware communication
pub struct XTouchDriver {
    /// MIDI input connection
    input_conn: Option<MidiInputConnection<()>>,

    /// Output writer thread
    writer: Option<OutputWriter>,

    /// Event sender for incoming MIDI
    event_tx: mpsc::Sender<XTouchEvent>,

    /// Event receiver
    event_rx: Option<mpsc::Receiver<XTouchEvent>>,

    /// Substring matched against port names
    device_signature: String,

    /// Which of the matching ports to open
    device_index: usize,
}

impl XTouchDriver {
    /// Create a new, unconnected driver
    pub fn new(config: &SurfaceConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);

        Self {
            input_conn: None,
            writer: None,
            event_tx,
            event_rx: Some(event_rx),
            device_signature: config.device_signature.clone(),
            device_index: config.device_index,
        }
    }

    /// Connect to the extender's MIDI ports
    pub fn connect(&mut self) -> Result<()> {
        info!(
            "Connecting to X-Touch - signature: '{}', index: {}",
            self.device_signature, self.device_index
        );

        // Input
        let midi_in = MidiInput::new("XTouch-OBS-Input").context("Failed to create MIDI input")?;
        let in_ports = midi_in.ports();
        let in_names: Vec<String> = in_ports
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_default())
            .collect();
        debug!("Found {} MIDI input ports", in_names.len());

        let in_idx = discovery::select_port(&in_names, &self.device_signature, self.device_index)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Input port #{} matching '{}' not found",
                    self.device_index,
                    self.device_signature
                )
            })?;
        info!("Opening IN port at idx {}: {}", in_idx, in_names[in_idx]);

        let event_tx = self.event_tx.clone();
        let input_conn = midi_in
            .connect(
                &in_ports[in_idx],
                "XTouch-OBS",
                move |_timestamp, data, _| {
                    let event = XTouchEvent {
                        timestamp: Instant::now(),
                        raw_data: data.to_vec(),
                    };
                    // Never block the MIDI callback thread
                    if event_tx.try_send(event).is_err() {
                        debug!("Dropped X-Touch input: {}", format_hex(data));
                    }
                },
                (),
            )
            .map_err(|e| anyhow::anyhow!("Failed to connect to input port: {}", e))?;

        // Output
        let midi_out = MidiOutput::new("XTouch-OBS-Output").context("Failed to create MIDI output")?;
        let out_ports = midi_out.ports();
        let out_names: Vec<String> = out_ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_default())
            .collect();

        let out_idx = discovery::select_port(&out_names, &self.device_signature, self.device_index)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Output port #{} matching '{}' not found",
                    self.device_index,
                    self.device_signature
                )
            })?;
        info!("Opening OUT port at idx {}: {}", out_idx, out_names[out_idx]);

        let output_conn = midi_out
            .connect(&out_ports[out_idx], "XTouch-OBS")
            .map_err(|e| anyhow::anyhow!("Failed to connect to output port: {}", e))?;

        self.input_conn = Some(input_conn);
        self.writer = Some(OutputWriter::spawn(output_conn)?);

        info!("X-Touch connected successfully");
        Ok(())
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.input_conn.is_some() && self.writer.is_some()
    }

    /// Sink feeding the writer thread
    pub fn sink(&self) -> Option<Arc<dyn MidiSink>> {
        self.writer
            .as_ref()
            .map(|w| Arc::new(w.sink.clone()) as Arc<dyn MidiSink>)
    }

    /// Take the event receiver (for the router to consume)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<XTouchEvent>> {
        self.event_rx.take()
    }

    /// Stop listening to the surface; output stays open
    pub fn close_input(&mut self) {
        if let Some(conn) = self.input_conn.take() {
            conn.close();
            debug!("X-Touch input closed");
        }
    }

    /// Close both ports, writing out everything still queued
    pub async fn disconnect(&mut self) {
        self.close_input();
        if let Some(writer) = self.writer.take() {
            if tokio::task::spawn_blocking(move || writer.close()).await.is_err() {
                warn!("MIDI writer shutdown task failed");
            }
        }
        info!("X-Touch disconnected");
    }
}

/// Port discovery utilities
pub mod discovery {
    use super::*;

    /// Information about a MIDI port
    #[derive(Debug, Clone)]
    pub struct PortInfo {
        pub index: usize,
        pub name: String,
        pub is_virtual: bool,
    }

    /// Index of the `nth` port whose name contains `signature` (case-insensitive)
    pub fn select_port(names: &[String], signature: &str, nth: usize) -> Option<usize> {
        let signature = signature.to_lowercase();
        names
            .iter()
            .enumerate()
            .filter(|(_, name)| name.to_lowercase().contains(&signature))
            .map(|(index, _)| index)
            .nth(nth)
    }

    fn is_virtual(name: &str) -> bool {
        name.contains("Virtual") || name.contains("loopMIDI") || name.contains("IAC")
    }

    /// Discover input ports
    pub fn discover_input_ports() -> Result<Vec<PortInfo>> {
        let midi_in = MidiInput::new("XTouch-OBS-Discovery")?;

        let mut port_infos = Vec::new();
        for (index, port) in midi_in.ports().iter().enumerate() {
            if let Ok(name) = midi_in.port_name(port) {
                port_infos.push(PortInfo {
                    index,
                    is_virtual: is_virtual(&name),
                    name,
                });
            }
        }

        Ok(port_infos)
    }

    /// Discover output ports
    pub fn discover_output_ports() -> Result<Vec<PortInfo>> {
        let midi_out = MidiOutput::new("XTouch-OBS-Discovery")?;

        let mut port_infos = Vec::new();
        for (index, port) in midi_out.ports().iter().enumerate() {
            if let Ok(name) = midi_out.port_name(port) {
                port_infos.push(PortInfo {
                    index,
                    is_virtual: is_virtual(&name),
                    name,
                });
            }
        }

        Ok(port_infos)
    }

    /// Print every port, highlighting the ones the configured signature picks
    pub fn print_ports(signature: &str, nth: usize) {
        use colored::*;

        println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

        let sections = [
            ("Input Ports:", discover_input_ports()),
            ("Output Ports:", discover_output_ports()),
        ];

        for (title, ports) in sections {
            println!("\n{}", title.bold());
            let ports = match ports {
                Ok(ports) => ports,
                Err(e) => {
                    println!("  {}", format!("Failed to enumerate: {}", e).red());
                    continue;
                }
            };
            if ports.is_empty() {
                println!("  {}", "No ports found".dimmed());
                continue;
            }

            let names: Vec<String> = ports.iter().map(|p| p.name.clone()).collect();
            let selected = select_port(&names, signature, nth);

            for port in &ports {
                let marker = if port.is_virtual {
                    "[VIRTUAL]".yellow()
                } else {
                    "[PHYSICAL]".green()
                };
                let pick = if selected == Some(port.index) {
                    " <= selected".bright_green().bold()
                } else {
                    "".normal()
                };
                println!("  {} {} | {}{}", marker, port.index, port.name, pick);
            }
        }
        println!();
    }
}
