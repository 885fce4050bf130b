// Copyright 2024 The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Broadcast channel for lifecycle events.
//!
//! Components subscribe for their own receiver; every published event
//! is delivered to all current subscribers in publish order.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::devices::chip::ChipIdentifier;
use crate::devices::device::DeviceIdentifier;
use netsim_model::{ChipKind, RadioStats};

/// Event messages shared across components in a loosely coupled
/// manner.
#[derive(Clone, Debug)]
pub enum Event {
    DeviceAdded { id: DeviceIdentifier, name: String, builtin: bool },
    DeviceRemoved { id: DeviceIdentifier, name: String, builtin: bool },
    DevicePatched { id: DeviceIdentifier, name: String },
    DeviceReset,
    ChipAdded { chip_id: ChipIdentifier, chip_kind: ChipKind, device_name: String, builtin: bool },
    ChipRemoved {
        chip_id: ChipIdentifier,
        device_id: DeviceIdentifier,
        remaining_nonbuiltin_devices: usize,
        radio_stats: Vec<RadioStats>,
    },
    ShutDown { reason: String },
}

/// Multi-producer, multi-consumer broadcast built on `std::sync::mpsc`.
///
/// Subscribe before publishing or messages will be missed.
pub struct Events {
    subscribers: Mutex<Vec<Sender<Event>>>,
}

impl Events {
    pub fn new() -> Arc<Events> {
        Arc::new(Events { subscribers: Mutex::new(Vec::new()) })
    }

    /// Returns a receiver that sees every event published after this
    /// call, in publish order.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = channel::<Event>();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Sends the event to all subscribers, dropping any whose receiver
    /// has disconnected.
    pub fn publish(&self, event: Event) {
        log::info!("{event:?}");
        self.subscribers.lock().unwrap().retain(|subscriber| subscriber.send(event.clone()).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_subscribe_and_publish() {
        let events = Events::new();
        let rx = events.subscribe();
        let handle = thread::spawn(move || match rx.recv() {
            Ok(Event::DeviceAdded { id, name, builtin: false }) => {
                assert_eq!(id, DeviceIdentifier(123));
                assert_eq!(name, "device-123");
            }
            event => panic!("unexpected event {event:?}"),
        });
        events.publish(Event::DeviceAdded {
            id: DeviceIdentifier(123),
            name: "device-123".into(),
            builtin: false,
        });
        handle.join().unwrap();
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let events = Events::new();
        let receivers: Vec<_> = (0..10).map(|_| events.subscribe()).collect();
        events.publish(Event::DeviceReset);
        for rx in receivers {
            assert!(matches!(rx.recv(), Ok(Event::DeviceReset)));
        }
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let events = Events::new();
        let rx = events.subscribe();
        assert_eq!(events.subscribers.lock().unwrap().len(), 1);
        drop(rx);
        events.publish(Event::DeviceReset);
        assert_eq!(events.subscribers.lock().unwrap().len(), 0);
    }

    #[test]
    fn test_events_are_ordered_per_subscriber() {
        let events = Events::new();
        let rx = events.subscribe();
        for i in 0..5u32 {
            events.publish(Event::DevicePatched {
                id: DeviceIdentifier(i),
                name: format!("device-{i}"),
            });
        }
        for i in 0..5u32 {
            match rx.recv() {
                Ok(Event::DevicePatched { id, .. }) => assert_eq!(id, DeviceIdentifier(i)),
                event => panic!("unexpected event {event:?}"),
            }
        }
    }
}
