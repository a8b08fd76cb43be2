//! 📊 progress.rs: "Are we there yet?" asked about bulk calls instead of road trips.
//!
//! 🚀 A progress bar for the ingest run plus a comfy-table summary at the end.
//! Watching it will not make the cluster faster. We've tried.

use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS if you should probably go call your mom.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📊 Tracks documents submitted, items failed and batches sent during one ingest run.
pub(crate) struct IngestProgress {
    destination: String,
    total_docs: u64,
    submitted_docs: u64,
    failed_items: u64,
    batches: u64,
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl std::fmt::Debug for IngestProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("IngestProgress")
            .field("destination", &self.destination)
            .field("total_docs", &self.total_docs)
            .field("submitted_docs", &self.submitted_docs)
            .field("failed_items", &self.failed_items)
            .field("batches", &self.batches)
            .finish()
    }
}

impl IngestProgress {
    pub(crate) fn new(destination: String, total_docs: u64) -> Self {
        let progress_bar = ProgressBar::new(total_docs);
        let style = ProgressStyle::default_bar()
            .template("{msg}\n| [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        progress_bar.set_style(style);
        Self {
            destination,
            total_docs,
            submitted_docs: 0,
            failed_items: 0,
            batches: 0,
            progress_bar,
            start_time: Instant::now(),
        }
    }

    /// 🔄 Record one answered bulk call.
    pub(crate) fn update(&mut self, docs: u64, failed: u64) {
        self.batches += 1;
        self.submitted_docs += docs;
        self.failed_items += failed;
        self.progress_bar.set_position(self.submitted_docs);
        self.progress_bar.set_message(format!(
            "destination: {} | batches: {} | failed: {}",
            self.destination,
            format_number(self.batches),
            format_number(self.failed_items)
        ));
    }

    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    pub(crate) fn failed_items(&self) -> u64 {
        self.failed_items
    }

    /// 🍽️ The end-of-run receipt.
    pub(crate) fn summary(&self) -> Table {
        let elapsed = self.start_time.elapsed();
        let docs_per_sec = if elapsed.as_secs_f64() > 0.0 {
            self.submitted_docs as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        let rows = [
            ("destination", self.destination.clone()),
            ("batches", format_number(self.batches)),
            (
                "documents",
                format!(
                    "{} / {}",
                    format_number(self.submitted_docs),
                    format_number(self.total_docs)
                ),
            ),
            ("failed items", format_number(self.failed_items)),
            ("docs/s", format_number(docs_per_sec as u64)),
            ("elapsed", format_duration(elapsed)),
        ];
        for (label, value) in rows {
            table.add_row(vec![
                Cell::new(label).set_alignment(CellAlignment::Right),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }
}
