//! Replay output: emitted events and a run summary

use crate::config::OutputFormat;
use anyhow::Result;
use interaction_tracker::{AnalyticsEvent, Milestone, RecordingSink};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

/// Aggregate view of one replay
#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    pub records: usize,
    pub events_by_name: BTreeMap<String, usize>,
    pub milestones: Vec<Milestone>,
    pub activity_marks: usize,
    pub completed_embeds: Vec<String>,
}

impl Summary {
    pub fn from_sink(records: usize, sink: &RecordingSink, completed_embeds: Vec<String>) -> Self {
        let mut events_by_name = BTreeMap::new();
        for event in &sink.events {
            *events_by_name.entry(event.name.clone()).or_insert(0) += 1;
        }
        Self {
            records,
            events_by_name,
            milestones: sink.milestones.clone(),
            activity_marks: sink.activity_marks,
            completed_embeds,
        }
    }

    pub fn total_events(&self) -> usize {
        self.events_by_name.values().sum()
    }
}

/// Plain-text rendering for the terminal
impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════")?;
        writeln!(f, "  Replay Summary")?;
        writeln!(f, "═══════════════════════════════════════════════")?;
        writeln!(f, "  Signals replayed: {}", self.records)?;
        writeln!(f, "  Events emitted:   {}", self.total_events())?;
        for (name, count) in &self.events_by_name {
            writeln!(f, "    {:<20} {}", name, count)?;
        }
        writeln!(f, "  Activity marks:   {}", self.activity_marks)?;
        if !self.milestones.is_empty() {
            writeln!(f, "  Milestones:       {:?}", self.milestones)?;
        }
        if self.completed_embeds.is_empty() {
            writeln!(f, "  Completed embeds: none")
        } else {
            writeln!(f, "  Completed embeds: {}", self.completed_embeds.join(", "))
        }
    }
}

/// Write events in the configured format
pub fn write_events<W: Write>(writer: &mut W, events: &[AnalyticsEvent], format: OutputFormat) -> Result<()> {
    for event in events {
        match format {
            OutputFormat::Jsonl => serde_json::to_writer(&mut *writer, event)?,
            OutputFormat::Pretty => serde_json::to_writer_pretty(&mut *writer, event)?,
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
