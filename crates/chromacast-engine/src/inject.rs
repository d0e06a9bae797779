#![forbid(unsafe_code)]

//! Style injection: materialize a resolved color as the highest-precedence
//! presentation rules, replacing any previously injected rule atomically.
//!
//! # One-fragment rule
//!
//! The injector owns exactly one fragment, identified by a stable id. Every
//! apply removes the previous fragment by that id before inserting the new
//! one — fragments are replaced, never accumulated. A failed removal is
//! logged and **does not block the insert**: the replacement lands later in
//! the cascade and still wins, which is the correct degraded outcome.
//!
//! # Late-stylesheet race
//!
//! Some stylesheets load asynchronously after first paint and could
//! re-assert defaults. Each apply arms a one-shot re-apply latch; the host
//! drains it after a short delay via [`StyleInjector::reapply`].
//!
//! # Paint-path reads
//!
//! The applied snapshot sits in an `arc-swap` slot so the render side can
//! read it wait-free on every frame while applies swap it atomically.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use thiserror::Error;
use tracing::{debug, warn};

use chromacast_core::CascadeSnapshot;

/// Failure reported by a [`StyleTarget`]. Removal failures are always
/// tolerated; they degrade to a cascade-ordering win instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("style target: {0}")]
pub struct TargetError(pub String);

/// Seam to whatever holds injected fragments: a document head, a terminal
/// palette shim, a test recorder.
pub trait StyleTarget {
    /// Append a fragment. Later fragments win over earlier ones.
    fn insert(&mut self, id: &str, css: &str);

    /// Remove every fragment with `id`. Returns whether any was present.
    fn remove(&mut self, id: &str) -> Result<bool, TargetError>;
}

/// Recording [`StyleTarget`] for tests and headless hosts, with removal
/// failure injection.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    fragments: Vec<(String, String)>,
    fail_removals: bool,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_removals(&mut self, fail: bool) {
        self.fail_removals = fail;
    }

    /// All fragments, in cascade order.
    pub fn fragments(&self) -> &[(String, String)] {
        &self.fragments
    }

    pub fn count_of(&self, id: &str) -> usize {
        self.fragments.iter().filter(|(fid, _)| fid == id).count()
    }

    /// The fragment that currently wins the cascade for `id`.
    pub fn winning(&self, id: &str) -> Option<&str> {
        self.fragments
            .iter()
            .rev()
            .find(|(fid, _)| fid == id)
            .map(|(_, css)| css.as_str())
    }
}

impl StyleTarget for RecordingTarget {
    fn insert(&mut self, id: &str, css: &str) {
        self.fragments.push((id.to_string(), css.to_string()));
    }

    fn remove(&mut self, id: &str) -> Result<bool, TargetError> {
        if self.fail_removals {
            return Err(TargetError("injected removal failure".into()));
        }
        let before = self.fragments.len();
        self.fragments.retain(|(fid, _)| fid != id);
        Ok(self.fragments.len() != before)
    }
}

/// The injection engine. Idempotent and callable from every entry point
/// (initial resolution, user edit, preset switch) without inconsistent
/// intermediate paint states.
#[derive(Debug)]
pub struct StyleInjector {
    fragment_id: String,
    admin_skin_class: String,
    applied: ArcSwap<Option<CascadeSnapshot>>,
    reapply_armed: AtomicBool,
}

impl Default for StyleInjector {
    fn default() -> Self {
        Self::new("chromacast-brand-overrides", "admin-skin")
    }
}

impl StyleInjector {
    pub fn new(fragment_id: impl Into<String>, admin_skin_class: impl Into<String>) -> Self {
        Self {
            fragment_id: fragment_id.into(),
            admin_skin_class: admin_skin_class.into(),
            applied: ArcSwap::from_pointee(None),
            reapply_armed: AtomicBool::new(false),
        }
    }

    /// The snapshot the paint path should be showing right now. Wait-free.
    pub fn applied(&self) -> Option<CascadeSnapshot> {
        **self.applied.load()
    }

    /// Replace the injected fragment with one for `snap`.
    pub fn apply(&self, target: &mut dyn StyleTarget, snap: &CascadeSnapshot) {
        match target.remove(&self.fragment_id) {
            Ok(removed) => {
                if removed {
                    debug!(id = %self.fragment_id, "removed previous style fragment");
                }
            }
            Err(err) => {
                warn!(id = %self.fragment_id, %err, "failed to remove previous style fragment; inserting replacement anyway");
            }
        }
        target.insert(&self.fragment_id, &self.compose(snap));
        self.applied.store(Arc::new(Some(*snap)));
        self.reapply_armed.store(true, Ordering::Release);
    }

    /// One-shot re-apply against late-loading stylesheets. The host calls
    /// this after a short delay; it is a no-op unless an apply armed it.
    pub fn reapply(&self, target: &mut dyn StyleTarget) -> bool {
        if !self.reapply_armed.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(snap) = self.applied() {
            self.apply(target, &snap);
            // apply() re-arms the latch; a reapply must not schedule another.
            self.reapply_armed.store(false, Ordering::Release);
            return true;
        }
        false
    }

    /// Whether a delayed re-apply is pending.
    pub fn needs_reapply(&self) -> bool {
        self.reapply_armed.load(Ordering::Acquire)
    }

    fn compose(&self, snap: &CascadeSnapshot) -> String {
        let skin = &self.admin_skin_class;
        let mut css = format!(
            ":root, :root *, :root.dark, :root.dark *, .{skin}, .{skin} * {{\n  \
             --brand-h: {h} !important;\n  \
             --brand-s: {s}% !important;\n  \
             --brand-l: {l}% !important;\n  \
             --primary: hsl(var(--brand-h) var(--brand-s) var(--brand-l)) !important;\n",
            h = snap.primary.hue(),
            s = snap.primary.saturation(),
            l = snap.primary.lightness(),
        );
        if let Some(accent) = snap.accent {
            css.push_str(&format!(
                "  --accent-h: {h} !important;\n  \
                 --accent-s: {s}% !important;\n  \
                 --accent-l: {l}% !important;\n  \
                 --accent: hsl(var(--accent-h) var(--accent-s) var(--accent-l)) !important;\n",
                h = accent.hue(),
                s = accent.saturation(),
                l = accent.lightness(),
            ));
        }
        css.push('}');
        css
    }
}
