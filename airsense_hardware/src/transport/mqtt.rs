//! MQTT session transport.
//!
//! `rumqttc` needs its event loop polled continuously; a worker thread owns
//! the `Connection` and reports session state over a channel. A reported
//! failure marks the session dead, and the next `connect()` builds a fresh
//! client. The worker never touches pipeline state.

use std::cell::Cell;
use std::time::Duration;

use airsense_traits::{BoxError, PublishChannel};
use crossbeam_channel as xch;
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use tracing::{debug, info, warn};

use crate::error::HwError;

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub server: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
}

enum SessionEvent {
    Up,
    Down(String),
}

pub struct MqttChannel {
    settings: MqttSettings,
    client: Option<Client>,
    events: Option<xch::Receiver<SessionEvent>>,
    connected: Cell<bool>,
}

impl MqttChannel {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            client: None,
            events: None,
            connected: Cell::new(false),
        }
    }

    fn drain_events(&self) {
        if let Some(rx) = &self.events {
            for ev in rx.try_iter() {
                match ev {
                    SessionEvent::Up => self.connected.set(true),
                    SessionEvent::Down(reason) => {
                        warn!(%reason, "mqtt session dropped");
                        self.connected.set(false);
                    }
                }
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = client.disconnect();
        }
        self.events = None;
        self.connected.set(false);
    }
}

impl PublishChannel for MqttChannel {
    fn connect(&mut self) -> Result<(), BoxError> {
        self.teardown();

        let s = &self.settings;
        let mut opts = MqttOptions::new(s.client_id.clone(), s.server.clone(), s.port);
        opts.set_keep_alive(s.keep_alive);
        if let Some(user) = &s.username {
            opts.set_credentials(user.clone(), s.password.clone().unwrap_or_default());
        }

        let (client, mut connection) = Client::new(opts, 16);
        let (tx, rx) = xch::bounded(8);
        std::thread::spawn(move || {
            for notification in connection.iter() {
                match notification {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        if tx.send(SessionEvent::Up).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = tx.send(SessionEvent::Down(e.to_string()));
                        break;
                    }
                }
            }
            debug!("mqtt worker exiting");
        });

        let first = rx.recv_timeout(s.connect_timeout);
        self.client = Some(client);
        self.events = Some(rx);
        match first {
            Ok(SessionEvent::Up) => {
                self.connected.set(true);
                info!(server = %s.server, port = s.port, "connected to MQTT broker");
                Ok(())
            }
            Ok(SessionEvent::Down(reason)) => {
                self.teardown();
                Err(Box::new(HwError::Transport(reason)))
            }
            Err(_) => {
                self.teardown();
                Err(Box::new(HwError::Timeout))
            }
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BoxError> {
        self.drain_events();
        if !self.connected.get() {
            return Err(Box::new(HwError::Transport("session not connected".into())));
        }
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| HwError::Transport("no client".into()))?;
        client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .map_err(|e| {
                self.connected.set(false);
                Box::new(HwError::Transport(e.to_string())) as BoxError
            })
    }

    fn is_connected(&self) -> bool {
        self.drain_events();
        self.connected.get()
    }
}

impl Drop for MqttChannel {
    fn drop(&mut self) {
        self.teardown();
    }
}
