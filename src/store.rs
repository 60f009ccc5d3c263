//! Sprite deduplication stores and the colour registry
//!
//! A [`SpriteStore`] accumulates the visually distinct sprites seen in one
//! input file. Once a store confirms its dominant colour it either becomes the
//! canonical store for that colour (registered in the [`Registry`]) or merges
//! itself into the existing canonical store via a forward link, after which
//! every submission is redirected.
//!
//! Locking discipline: the in-flight set and the confirmed sequence are
//! guarded by two separate mutexes so the expensive pixel comparison never
//! runs under either. A store never waits on another store; forwarding is a
//! direct synchronous call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::color::ThemeColor;
use crate::detect;
#[cfg(debug_assertions)]
use crate::diag::SectionTracker;
use crate::sprite::{DistinctSprite, SpriteCrop, TileRect};

/// A colour-complete store holds exactly this many distinct sprites.
pub const SPRITES_PER_THEME: usize = 33;

/// State guarded by the store's sequence lock.
struct StoreInner {
    sprites: Vec<Arc<DistinctSprite>>,
    color: Option<ThemeColor>,
    green_hits: u32,
    complete: bool,
    forward: Option<Arc<SpriteStore>>,
}

/// Per-input-file accumulator of visually distinct sprite tiles.
pub struct SpriteStore {
    name: String,
    target: usize,
    inner: Mutex<StoreInner>,
    /// Crops currently being compared, guarded separately from `inner` so
    /// concurrent additions of different sprites are not serialized.
    in_flight: Mutex<Vec<SpriteCrop>>,
    #[cfg(debug_assertions)]
    tracker: Option<Arc<SectionTracker>>,
}

/// Outcome of claiming a colour slot in the registry.
pub enum Claim {
    /// The slot was empty; the claiming store is now canonical.
    Canonical,
    /// The slot was taken; merge into this store instead.
    ForwardTo(Arc<SpriteStore>),
}

impl SpriteStore {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_target(name, SPRITES_PER_THEME)
    }

    /// Store with a non-default completion target, for tests.
    pub(crate) fn with_target(name: impl Into<String>, target: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            target,
            inner: Mutex::new(StoreInner {
                sprites: Vec::new(),
                color: None,
                green_hits: 0,
                complete: false,
                forward: None,
            }),
            in_flight: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            tracker: None,
        })
    }

    /// Store with an injected critical-section tracker. Debug builds only.
    #[cfg(debug_assertions)]
    pub fn with_tracker(
        name: impl Into<String>,
        target: usize,
        tracker: Arc<SectionTracker>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            target,
            inner: Mutex::new(StoreInner {
                sprites: Vec::new(),
                color: None,
                green_hits: 0,
                complete: false,
                forward: None,
            }),
            in_flight: Mutex::new(Vec::new()),
            tracker: Some(tracker),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Confirmed dominant colour, if committed.
    pub fn color(&self) -> Option<ThemeColor> {
        self.inner.lock().unwrap().color
    }

    /// True once the sequence (or the forward target's) reached the target
    /// count. Monotone: never reverts to false.
    pub fn is_complete(&self) -> bool {
        self.inner.lock().unwrap().complete
    }

    /// Number of confirmed sprites currently held by this store itself.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The canonical store this one merged into, if any.
    pub fn forward_target(&self) -> Option<Arc<SpriteStore>> {
        self.inner.lock().unwrap().forward.clone()
    }

    /// Cheap snapshot of the confirmed sequence (Arc clones only).
    pub fn sprites_snapshot(&self) -> Vec<Arc<DistinctSprite>> {
        self.inner.lock().unwrap().sprites.clone()
    }

    /// One-line progress description for log output.
    pub fn describe(&self) -> String {
        let inner = self.inner.lock().unwrap();
        let color = inner.color.map(|c| c.name()).unwrap_or("unk");
        let progress = if inner.complete {
            "complete".to_string()
        } else {
            inner.sprites.len().to_string()
        };
        let mut s = format!("{}[{}, {}]", self.name, color, progress);
        if let Some(target) = &inner.forward {
            s += &format!(" -> {}", target.name);
        }
        s
    }

    /// Submit a crop; returns true if it was newly distinct.
    ///
    /// Forwarded stores delegate to their target. Otherwise the crop passes
    /// in-flight duplicate suppression, the unlocked comparison against every
    /// confirmed sprite, and on success is materialized and appended. The
    /// first additions also drive colour detection and, once a colour is
    /// committed, registration or merging via `registry`.
    pub fn try_add(self: &Arc<Self>, crop: &SpriteCrop, registry: &Registry) -> bool {
        // Forwarded: redirect, mirroring the target's completion
        if let Some(target) = self.forward_target() {
            let added = target.try_add(crop, registry);
            if target.is_complete() {
                self.inner.lock().unwrap().complete = true;
            }
            return added;
        }

        if self.is_complete() {
            return false;
        }

        // An identical crop already being processed means this submission
        // can't be new; report that without waiting for the other to finish
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            self.section_enter("in_flight");
            let already_working = in_flight.iter().any(|c| c.same_pixels_as_crop(crop));
            if !already_working {
                in_flight.push(crop.clone());
            }
            self.section_leave("in_flight");
            if already_working {
                if crop.probe {
                    println!("{} identical crop already in flight", crop);
                }
                return false;
            }
        }

        // Compare against every confirmed sprite with no lock held
        let snapshot = self.sprites_snapshot();
        if snapshot.iter().any(|s| crop.same_pixels_as(s)) {
            self.remove_in_flight(crop);
            if crop.probe {
                println!("{} matches a confirmed sprite", crop);
            }
            return false;
        }

        // Newly distinct: materialize and append. The append happens before
        // the in-flight entry is released, which is what keeps the sequence
        // free of pixel-equal pairs under any interleaving.
        let sprite = Arc::new(crop.materialize());
        let appended = {
            let mut inner = self.inner.lock().unwrap();
            self.section_enter("sequence");
            let appended = if inner.complete {
                false
            } else {
                inner.sprites.push(Arc::clone(&sprite));
                if inner.sprites.len() >= self.target {
                    inner.complete = true;
                }
                true
            };
            self.section_leave("sequence");
            appended
        };
        self.remove_in_flight(crop);
        if !appended {
            return false;
        }
        if crop.probe {
            println!("{} is distinct sprite #{}", crop, self.len());
        }

        // Colour still unknown: try single-sprite detection on the new sprite
        if self.color().is_none() {
            let detected =
                detect::detect_dominant(sprite.image(), TileRect::of(sprite.image()), "");
            if let Some(color) = detected {
                self.commit_color(color, registry);
            }
        }
        true
    }

    /// Commit a detected colour, registering as canonical or merging into the
    /// existing canonical store for that colour.
    fn commit_color(self: &Arc<Self>, color: ThemeColor, registry: &Registry) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.color.is_some() {
                return;
            }
            // Two distinct in-game elements both read as green, so green
            // needs a third independent detection before it is trusted
            if color == ThemeColor::Green && inner.green_hits < 2 {
                inner.green_hits += 1;
                return;
            }
            inner.color = Some(color);
        }
        match registry.claim(color, self) {
            Claim::Canonical => {
                println!("{} is sink for dominant colour {}", self.describe(), color);
            }
            Claim::ForwardTo(target) => {
                println!("{} forwarding to {}", self.describe(), target.describe());
                let drained = {
                    let mut inner = self.inner.lock().unwrap();
                    inner.forward = Some(Arc::clone(&target));
                    std::mem::take(&mut inner.sprites)
                };
                for sprite in &drained {
                    if target.is_complete() {
                        break;
                    }
                    target.try_add(&sprite.as_crop(), registry);
                }
                if target.is_complete() {
                    self.inner.lock().unwrap().complete = true;
                }
            }
        }
    }

    fn remove_in_flight(&self, crop: &SpriteCrop) {
        let mut in_flight = self.in_flight.lock().unwrap();
        self.section_enter("in_flight");
        if let Some(pos) = in_flight
            .iter()
            .position(|c| Arc::ptr_eq(&c.image, &crop.image) && c.rect == crop.rect)
        {
            in_flight.swap_remove(pos);
        }
        self.section_leave("in_flight");
    }

    #[cfg(debug_assertions)]
    fn section_enter(&self, section: &str) {
        if let Some(tracker) = &self.tracker {
            tracker.enter(&format!("{}.{}", self.name, section));
        }
    }

    #[cfg(not(debug_assertions))]
    fn section_enter(&self, _section: &str) {}

    #[cfg(debug_assertions)]
    fn section_leave(&self, section: &str) {
        if let Some(tracker) = &self.tracker {
            tracker.leave(&format!("{}.{}", self.name, section));
        }
    }

    #[cfg(not(debug_assertions))]
    fn section_leave(&self, _section: &str) {}
}

/// Mapping from confirmed colour to the canonical store for that colour.
///
/// Each slot is set exactly once, by whichever store first commits the
/// colour; the registry is read and mutated only under its own lock.
#[derive(Default)]
pub struct Registry {
    slots: Mutex<HashMap<ThemeColor, Arc<SpriteStore>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `color`. First claimant becomes canonical; later
    /// claimants are told which store to merge into.
    pub fn claim(&self, color: ThemeColor, store: &Arc<SpriteStore>) -> Claim {
        let mut slots = self.slots.lock().unwrap();
        match slots.get(&color) {
            // A store re-claiming its own slot stays canonical
            Some(canonical) if Arc::ptr_eq(canonical, store) => Claim::Canonical,
            Some(canonical) => Claim::ForwardTo(Arc::clone(canonical)),
            None => {
                slots.insert(color, Arc::clone(store));
                Claim::Canonical
            }
        }
    }

    /// Canonical store for a colour, if one has claimed it.
    pub fn canonical(&self, color: ThemeColor) -> Option<Arc<SpriteStore>> {
        self.slots.lock().unwrap().get(&color).cloned()
    }

    /// All canonical stores, ordered by positional colour index.
    pub fn canonical_stores(&self) -> Vec<(ThemeColor, Arc<SpriteStore>)> {
        let slots = self.slots.lock().unwrap();
        let mut stores: Vec<_> = slots.iter().map(|(c, s)| (*c, Arc::clone(s))).collect();
        stores.sort_by_key(|(c, _)| c.index());
        stores
    }

    /// Number of canonical stores whose sprite set is complete.
    pub fn complete_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_complete())
            .count()
    }
}
