use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use orderly_core::EventSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI event sink drawing an indicatif bar per phase.
///
/// - Planning: one tick per file, cache hits shown in the message
/// - Execution: one tick per plan item
///
/// Safety blocks are printed above the bar as they happen.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
    cache_hits: AtomicU64,
    bytes_saved: AtomicU64,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            cache_hits: AtomicU64::new(0),
            bytes_saved: AtomicU64::new(0),
        }
    }

    pub fn start(&self, label: &str) {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::with_template(&format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} {{msg}}",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_chars(TICK_CHARS);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    pub fn finish(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn bytes_saved(&self) -> u64 {
        self.bytes_saved.load(Ordering::Relaxed)
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn advance(&self, done: usize, total: usize) {
        self.with_bar(|pb| {
            if pb.length() != Some(total as u64) {
                pb.set_length(total as u64);
            }
            pb.set_position(done as u64);
        });
    }
}

impl EventSink for CliReporter {
    fn on_cache_hit(&self, _path: &str) {
        let hits = self.cache_hits.fetch_add(1, Ordering::Relaxed) + 1;
        self.with_bar(|pb| pb.set_message(format!("({} cached)", hits)));
    }

    fn on_bytes_saved(&self, bytes_read: u64, file_size: u64) {
        self.bytes_saved
            .fetch_add(file_size.saturating_sub(bytes_read), Ordering::Relaxed);
    }

    fn on_safety_block(&self, path: &str, reason: &str) {
        let line = format!("  {} {}: {}", "✗".red(), path, reason);
        self.with_bar(|pb| pb.println(&line));
    }

    fn on_file_planned(&self, files_done: usize, total_files: usize) {
        self.advance(files_done, total_files);
    }

    fn on_item_executed(&self, items_done: usize, total_items: usize) {
        self.advance(items_done, total_items);
    }
}
