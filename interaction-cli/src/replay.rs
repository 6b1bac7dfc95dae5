//! Trace replay against a virtual clock

use anyhow::{Context, Result};
use interaction_tracker::{
    read_trace, InteractionEngine, RecordingSink, SignalRecord, TrackerConfig, VirtualClock,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Result of replaying one trace
#[derive(Debug)]
pub struct ReplayOutcome {
    pub records: usize,
    pub sink: RecordingSink,
    /// Ids of embeds whose completion latch fired
    pub completed_embeds: Vec<String>,
}

/// Load a JSONL trace from disk
pub fn load_trace(path: &Path) -> Result<Vec<SignalRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open trace file: {:?}", path))?;
    let records = read_trace(BufReader::new(file))
        .with_context(|| format!("Failed to read trace file: {:?}", path))?;
    log::info!("Loaded {} signals from {:?}", records.len(), path);
    Ok(records)
}

/// Replay `records` with their offsets shifted onto `start_ms`
pub fn replay(config: &TrackerConfig, mut records: Vec<SignalRecord>, start_ms: u64) -> Result<ReplayOutcome> {
    for record in &mut records {
        record.at_ms = record.at_ms.saturating_add(start_ms);
    }

    let mut engine = InteractionEngine::new(
        config.clone(),
        VirtualClock::starting_at(start_ms),
        RecordingSink::new(),
    )
    .context("Failed to create interaction engine")?;

    engine.replay(&records);

    let completed_embeds = config
        .embeds
        .iter()
        .filter(|embed| engine.embed(&embed.id).is_some_and(|d| d.is_completed()))
        .map(|embed| embed.id.clone())
        .collect::<Vec<_>>();

    let (_, sink) = engine.into_parts();
    log::debug!("Replay produced {} events", sink.events.len());

    Ok(ReplayOutcome {
        records: records.len(),
        sink,
        completed_embeds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use interaction_tracker::{EmbedConfig, FORM_SUBMIT};
    use std::io::Write;

    const TRACE: &str = r#"
# data voucher page
{"at_ms": 0, "signal": {"kind": "frame_load", "embed": "salesmap"}}
{"at_ms": 10, "signal": {"kind": "scroll", "snapshot": {"offset_px": 0.0, "viewport_height_px": 500.0, "document_height_px": 1000.0}}}
{"at_ms": 2500, "signal": {"kind": "message", "origin": "https://salesmap.kr", "payload": "{\"type\":\"form_submitted\"}"}}
{"at_ms": 2600, "signal": {"kind": "frame_load", "embed": "salesmap"}}
"#;

    fn config() -> TrackerConfig {
        TrackerConfig::new().add_embed(EmbedConfig::new("salesmap", "salesmap.kr"))
    }

    #[test]
    fn test_replay_trace_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TRACE.as_bytes()).unwrap();

        let records = load_trace(file.path()).unwrap();
        assert_eq!(records.len(), 4);

        let outcome = replay(&config(), records, 1_700_000_000_000).unwrap();
        assert_eq!(outcome.records, 4);
        assert_eq!(outcome.sink.count(FORM_SUBMIT), 1);
        assert_eq!(outcome.sink.count("scroll_depth"), 3);
        assert_eq!(outcome.completed_embeds, vec!["salesmap".to_string()]);

        let submit = outcome.sink.named(FORM_SUBMIT).next().unwrap();
        assert_eq!(submit.get("detection_method").unwrap(), "postmessage");
    }

    #[test]
    fn test_backwards_trace_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"at_ms": 50, "signal": {{"kind": "frame_load", "embed": "a"}}}}"#).unwrap();
        writeln!(file, r#"{{"at_ms": 10, "signal": {{"kind": "frame_load", "embed": "a"}}}}"#).unwrap();

        let err = load_trace(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }
}
