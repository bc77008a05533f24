//! OBS events to the replica and the owning strip

use std::time::Instant;
use tracing::{debug, trace};

use super::Router;
use crate::midi;
use crate::obs::{InputCatalog, MeterReading, MixerEvent, RemoteInput};

impl Router {
    /// Apply a remote change
    ///
    /// The replica is updated for every input; only the strip bound to the
    /// event's input is touched.
    pub fn handle_remote(&mut self, event: &MixerEvent, now: Instant) {
        self.catalog.apply(event);
        self.track_hydration(event);

        if let MixerEvent::VolumeMeters(readings) = event {
            self.render_meters(readings);
            return;
        }

        let Some(uuid) = event.uuid() else {
            return;
        };
        let Some(num) = self.owner_of(uuid) else {
            trace!("No strip bound to '{}', event only cached", uuid);
            return;
        };

        self.strips[num as usize].apply_remote(event, now, &mut self.surface, &self.catalog);
        self.reindex_strip(num);
        self.publish_layout();
    }

    fn render_meters(&mut self, readings: &[MeterReading]) {
        for reading in readings {
            let Some(num) = self.owner_of(&reading.uuid) else {
                continue;
            };
            if let Some(db) = midi::average_peak_db(&reading.levels) {
                self.surface.set_meter(num, db);
            }
        }
    }

    /// Keep the hydrating set in line with events that overtake a hydration
    fn track_hydration(&mut self, event: &MixerEvent) {
        match event {
            MixerEvent::Created { uuid, name } => {
                self.hydrating.insert(uuid.clone(), name.clone());
            }
            MixerEvent::NameChanged { uuid, name } => {
                if let Some(pending) = self.hydrating.get_mut(uuid) {
                    *pending = name.clone();
                }
            }
            MixerEvent::Removed { uuid } => {
                if self.hydrating.remove(uuid).is_some() {
                    debug!("Input '{}' removed while hydrating", uuid);
                }
            }
            _ => {}
        }
    }

    /// A newly created input finished hydrating
    ///
    /// Dropped if the input was removed in the meantime; a rename that
    /// arrived during hydration wins over the hydrated name.
    pub fn input_hydrated(&mut self, mut input: RemoteInput) {
        let Some(name) = self.hydrating.remove(&input.uuid) else {
            debug!("Input '{}' is gone, dropping its hydration", input.uuid);
            return;
        };
        input.name = name;
        debug!("Input '{}' added (audio: {})", input.name, input.supports_audio);
        self.catalog.insert(input);
    }

    /// Forget a created input whose hydration failed
    pub fn hydration_failed(&mut self, uuid: &str) {
        self.hydrating.remove(uuid);
    }

    /// Swap in a freshly hydrated replica (after a reconnect)
    ///
    /// Strips bound to inputs that no longer exist are released, every
    /// strip is redrawn.
    pub fn replace_catalog(&mut self, catalog: InputCatalog) {
        self.catalog = catalog;

        for num in 0..self.strips.len() as u8 {
            let vanished = self.strips[num as usize]
                .bound_uuid()
                .is_some_and(|uuid| !self.catalog.contains(uuid));
            if vanished {
                self.strips[num as usize].reset(&mut self.surface);
                self.reindex_strip(num);
            }
        }

        self.render_all();
        self.publish_layout();
    }
}
