//! Scroll depth milestones
//!
//! Raw scroll signals are coalesced with a trailing timer so a burst of
//! scroll events produces a single sample. Each sample computes the depth
//! percentage, updates the running maximum and emits one `scroll_depth`
//! event per threshold crossed for the first time, in ascending order.

use crate::config::{PageConfig, ScrollConfig};
use crate::host::{EventSink, Scheduler, TimerId};
use crate::signal::ScrollSnapshot;
use crate::types::{format_event_time, Milestone, Properties, SCROLL_DEPTH};
use serde_json::json;
use std::collections::BTreeSet;

/// Page-wide scroll state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollState {
    /// Deepest percentage seen so far
    pub max_depth: u8,
    /// Thresholds already reported; only ever grows
    pub tracked_thresholds: BTreeSet<u8>,
    /// Time and offset of the previous sample, for speed estimation
    pub last_sample: Option<(u64, f64)>,
}

/// Monotonic scroll milestone tracker
pub struct ScrollTracker {
    config: ScrollConfig,
    page: PageConfig,
    state: ScrollState,
    pending: Option<(TimerId, ScrollSnapshot)>,
}

/// Depth percentage of the viewport bottom, clamped to 0..=100
pub fn depth_percentage(snapshot: &ScrollSnapshot) -> Option<u8> {
    let height = snapshot.document_height_px;
    if !height.is_finite() || height <= 0.0 {
        return None;
    }
    let ratio = (snapshot.offset_px + snapshot.viewport_height_px) / height;
    let percentage = (ratio * 100.0).round();
    if percentage.is_nan() {
        return None;
    }
    Some(percentage.clamp(0.0, 100.0) as u8)
}

impl ScrollTracker {
    pub fn new(config: ScrollConfig, page: PageConfig) -> Self {
        Self {
            config,
            page,
            state: ScrollState::default(),
            pending: None,
        }
    }

    /// Feed a raw scroll signal; only the last one per window is sampled
    pub fn observe_signal(&mut self, snapshot: ScrollSnapshot, scheduler: &mut dyn Scheduler) {
        if let Some((timer, _)) = self.pending.take() {
            scheduler.cancel(timer);
        }
        let timer = scheduler.schedule(self.config.coalesce_ms);
        self.pending = Some((timer, snapshot));
    }

    /// Deliver a fired timer. Returns false if the timer is not ours.
    pub fn on_timer(&mut self, timer: TimerId, scheduler: &dyn Scheduler, sink: &mut dyn EventSink) -> bool {
        match self.pending {
            Some((pending, snapshot)) if pending == timer => {
                self.pending = None;
                self.sample(&snapshot, scheduler, sink);
                true
            }
            _ => false,
        }
    }

    /// Process one sample and return the thresholds it newly crossed
    pub fn sample(&mut self, snapshot: &ScrollSnapshot, scheduler: &dyn Scheduler, sink: &mut dyn EventSink) -> Vec<u8> {
        let Some(percentage) = depth_percentage(snapshot) else {
            log::trace!("Scroll sample without a usable document height, ignoring");
            return Vec::new();
        };
        sink.mark_activity();

        let now = scheduler.now_ms();
        let speed = self.update_speed(now, snapshot.offset_px);
        self.state.max_depth = self.state.max_depth.max(percentage);

        let mut crossed = Vec::new();
        for &threshold in &self.config.thresholds {
            if percentage < threshold || !self.state.tracked_thresholds.insert(threshold) {
                continue;
            }
            crossed.push(threshold);
            self.emit(threshold, snapshot, speed, now, sink);
            if threshold == 100 {
                sink.record_milestone(Milestone::FullScroll);
            }
        }

        if !crossed.is_empty() {
            log::debug!("Scroll depth {}% crossed {:?}", percentage, crossed);
        }
        crossed
    }

    pub fn state(&self) -> &ScrollState {
        &self.state
    }

    // Pixels per second since the previous sample; 0 on the first one.
    fn update_speed(&mut self, now: u64, offset: f64) -> u64 {
        let speed = match self.state.last_sample {
            Some((last_time, last_offset)) => {
                let elapsed = now.saturating_sub(last_time);
                if elapsed > 0 {
                    ((offset - last_offset).abs() / elapsed as f64 * 1000.0).round() as u64
                } else {
                    0
                }
            }
            None => 0,
        };
        self.state.last_sample = Some((now, offset));
        speed
    }

    fn emit(&self, threshold: u8, snapshot: &ScrollSnapshot, speed: u64, now: u64, sink: &mut dyn EventSink) {
        let mut props = Properties::new();
        props.insert("scroll_depth_percentage".into(), json!(threshold));
        props.insert("scroll_depth_pixels".into(), json!(snapshot.offset_px.round() as i64));
        props.insert(
            "page_total_height_pixels".into(),
            json!(snapshot.document_height_px.round() as i64),
        );
        if let Some(title) = &self.page.title {
            props.insert("page_name".into(), json!(title));
        }
        if let Some(url) = &self.page.url {
            props.insert("page_url".into(), json!(url));
        }
        props.insert("scroll_direction".into(), json!("vertical"));
        props.insert("max_scroll_depth".into(), json!(self.state.max_depth));
        props.insert("scroll_speed".into(), json!(speed));
        props.insert("scroll_time".into(), json!(format_event_time(now)));
        sink.emit(SCROLL_DEPTH, props);
    }
}
