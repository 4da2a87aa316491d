use std::fmt::Write as _;

use client_core::{SyncMode, TaskEntry, TaskList};

const HEADER: &str = "Task tracker";

pub fn render(list: &TaskList, mode: SyncMode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{HEADER} ({mode})");

    if !list.is_loaded() {
        out.push_str("  loading…\n");
    } else if list.is_empty() {
        out.push_str("  no tasks\n");
    } else {
        let width = list
            .entries()
            .iter()
            .map(|e| id_label(e).chars().count())
            .max()
            .unwrap_or(0);
        for entry in list.entries() {
            let _ = writeln!(out, "  {}", render_entry(entry, width));
        }
    }

    if let Some(notice) = list.notice() {
        let _ = writeln!(out, "  ! {notice}");
    }
    out
}

fn render_entry(entry: &TaskEntry, width: usize) -> String {
    let mark = if entry.completed { 'x' } else { ' ' };
    let busy = if entry.is_in_flight() { '~' } else { ' ' };
    format!(
        "[{mark}]{busy}{:>width$}  {}",
        id_label(entry),
        entry.title,
        width = width
    )
}

fn id_label(entry: &TaskEntry) -> String {
    match entry.task_id() {
        Some(id) => id.to_string(),
        None => "…".to_string(),
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
