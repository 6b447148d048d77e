//! Terminal output for the interactive loop

use crate::runtime::OutputSink;
use crate::schema::FunctionDescriptor;
use crate::state_machine::Notice;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// Writes assistant text and notices to stdout. Notices always start on a
/// fresh line, even when they interrupt streamed text.
#[derive(Default)]
pub struct ConsoleSink {
    mid_line: AtomicBool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// End a partially written line, if any
    pub fn finish_line(&self) {
        if self.mid_line.swap(false, Ordering::Relaxed) {
            println!();
        }
    }

    fn line(&self, text: &str) {
        self.finish_line();
        println!("{text}");
    }
}

impl OutputSink for ConsoleSink {
    fn text(&self, text: &str) {
        let mut out = io::stdout().lock();
        // Best effort; a closed stdout ends the session at the next prompt
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
        self.mid_line.store(!text.ends_with('\n'), Ordering::Relaxed);
    }

    fn notice(&self, notice: &Notice) {
        self.line(&notice.to_string());
    }

    fn failure(&self, message: &str) {
        self.line(&format!("Error: {message}"));
    }
}

/// Listing printed by the `functions` command
pub fn describe_functions(descriptors: &[FunctionDescriptor]) -> String {
    let mut listing = String::from("Available functions:\n");
    for descriptor in descriptors {
        listing.push_str(&format!("  - {}: {}\n", descriptor.name, descriptor.description));
        let parameters = &descriptor.parameters;
        if !parameters.properties.is_empty() {
            let names: Vec<&str> = parameters.properties.keys().map(String::as_str).collect();
            listing.push_str(&format!("    Parameters: {}\n", names.join(", ")));
        }
        if !parameters.required.is_empty() {
            listing.push_str(&format!("    Required: {}\n", parameters.required.join(", ")));
        }
    }
    listing
}
