//! Text rendering of a selection state.

use std::fmt::Write;

use super::state::{Phase, SelectionState};

const SENDING: &str = "Sending files...";
const SENT: &str = "Files sent\nPress q to quit.\n";
const HEADER: &str = "These are your options\n";
const FOOTER: &str = "\nPress q to quit.\nPress r to receive selected files.\n";

/// Render the view for a state.
pub fn render(state: &SelectionState) -> String {
    match state.phase() {
        Phase::Sending => SENDING.to_string(),
        Phase::Sent => SENT.to_string(),
        Phase::Browsing => {
            let mut out = String::from(HEADER);
            for (index, name) in state.choices().iter().enumerate() {
                let cursor = if index == state.cursor() { '>' } else { ' ' };
                let checked = if state.is_selected(index) { 'x' } else { ' ' };
                // Writing into a String cannot fail.
                let _ = writeln!(out, "{} [{}] {}", cursor, checked, name);
            }
            out.push_str(FOOTER);
            out
        }
    }
}
