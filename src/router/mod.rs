//! Router module - the device coordinator
//!
//! The [`Router`] owns the strips, the OBS input replica and the reverse
//! index from input uuid to owning strip. It is a plain synchronous state
//! machine; [`actor`] wraps it in a task so that hardware input, OBS events
//! and the reconciliation tick are applied one at a time.
//!
//! - [`dispatch`]: decoded surface messages to strips, SELECT flow
//! - [`feedback`]: OBS events to the replica and the owning strip
//! - [`refresh`]: fader reconciliation, full redraws, teardown

pub mod actor;
mod dispatch;
mod feedback;
mod refresh;

#[cfg(test)]
mod tests;

pub use actor::{subscribe_events, RouterActor, RouterCommand, RouterHandle, RECONCILE_INTERVAL};

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::obs::InputCatalog;
use crate::state::{LayoutSnapshot, PersistenceActorHandle, StripConfig};
use crate::strip::menu::{MAX_COLOR, MIN_COLOR};
use crate::strip::ChannelStrip;
use crate::xtouch::{Surface, IDLE_LCD_COLOR};

/// Device coordinator
pub struct Router {
    strips: Vec<ChannelStrip>,
    /// uuid -> index of the Active strip bound to it
    bound: HashMap<String, u8>,
    catalog: InputCatalog,
    /// Created inputs still hydrating, uuid -> latest name
    hydrating: HashMap<String, String>,
    surface: Surface,
    persistence: Option<PersistenceActorHandle>,
    /// Last layout handed to persistence
    published: Vec<StripConfig>,
}

impl Router {
    pub fn new(strip_count: u8, surface: Surface, catalog: InputCatalog) -> Self {
        info!("Router created with {} strips", strip_count);
        let strips: Vec<ChannelStrip> = (0..strip_count).map(ChannelStrip::new).collect();
        let published = strips.iter().map(ChannelStrip::layout).collect();

        let mut router = Self {
            strips,
            bound: HashMap::new(),
            catalog,
            hydrating: HashMap::new(),
            surface,
            persistence: None,
            published,
        };
        router.render_all();
        router
    }

    /// Publish layout changes to the persistence actor
    pub fn with_persistence(mut self, persistence: PersistenceActorHandle) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn strip_count(&self) -> usize {
        self.strips.len()
    }

    pub fn strip(&self, num: u8) -> Option<&ChannelStrip> {
        self.strips.get(num as usize)
    }

    pub fn catalog(&self) -> &InputCatalog {
        &self.catalog
    }

    /// Strip currently bound to `uuid`
    pub fn owner_of(&self, uuid: &str) -> Option<u8> {
        self.bound.get(uuid).copied()
    }

    /// Current layout of all strips
    pub fn layout(&self) -> LayoutSnapshot {
        LayoutSnapshot::new(self.strips.iter().map(ChannelStrip::layout).collect())
    }

    /// Bring the bound index in line with one strip's state
    ///
    /// Must run after every transition of that strip.
    fn reindex_strip(&mut self, num: u8) {
        self.bound.retain(|_, owner| *owner != num);

        let Some(uuid) = self.strips[num as usize].bound_uuid().map(str::to_string) else {
            return;
        };

        if let Some(previous) = self.bound.insert(uuid.clone(), num) {
            warn!(
                "Strip {} and strip {} both bound to '{}', releasing strip {}",
                previous, num, uuid, previous
            );
            self.strips[previous as usize].reset(&mut self.surface);
        }
    }

    /// Bind `num` to `uuid`, evicting the current owner first
    fn bind(&mut self, num: u8, uuid: &str, lcd_color: u8) {
        if let Some(owner) = self.owner_of(uuid) {
            if owner != num {
                info!("Strip {} takes '{}' over from strip {}", num, uuid, owner);
                self.strips[owner as usize].reset(&mut self.surface);
                self.reindex_strip(owner);
            }
        }

        self.strips[num as usize].bind(uuid, lcd_color, &mut self.surface, &self.catalog);
        self.reindex_strip(num);
    }

    /// Apply a persisted layout; bindings to unknown inputs are dropped
    pub fn apply_layout(&mut self, layout: &LayoutSnapshot) {
        if layout.strips.len() > self.strips.len() {
            debug!(
                "Layout has {} strips, ignoring the last {}",
                layout.strips.len(),
                layout.strips.len() - self.strips.len()
            );
        }

        for num in 0..self.strips.len() as u8 {
            let config = layout.strip(num as usize);
            match config.input_uuid {
                Some(uuid) if self.catalog.contains(&uuid) => {
                    let lcd_color = if (MIN_COLOR..=MAX_COLOR).contains(&config.lcd_color) {
                        config.lcd_color
                    } else {
                        warn!(
                            "Strip {}: saved colour {} out of range, using {}",
                            num, config.lcd_color, IDLE_LCD_COLOR
                        );
                        IDLE_LCD_COLOR
                    };
                    self.bind(num, &uuid, lcd_color);
                }
                Some(uuid) => {
                    info!("Strip {}: saved input '{}' not found, leaving idle", num, uuid);
                    self.strips[num as usize].reset(&mut self.surface);
                    self.reindex_strip(num);
                }
                None => {
                    self.strips[num as usize].reset(&mut self.surface);
                    self.reindex_strip(num);
                }
            }
        }

        self.publish_layout();
    }

    /// Send the layout to persistence if it changed since the last send
    fn publish_layout(&mut self) {
        let strips: Vec<StripConfig> = self.strips.iter().map(ChannelStrip::layout).collect();
        if strips == self.published {
            return;
        }
        self.published = strips.clone();

        if let Some(persistence) = &self.persistence {
            debug!("Layout changed, saving");
            persistence.try_save_snapshot(LayoutSnapshot::new(strips));
        }
    }
}
