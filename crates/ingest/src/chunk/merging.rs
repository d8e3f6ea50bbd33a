//! Greedy merging of sub-units into overlapping chunks.

use super::Span;
use std::collections::VecDeque;

/// Merge consecutive sub-units into chunks of at most `chunk_size` chars.
///
/// When a chunk is closed, the next one starts with the closed chunk's
/// trailing sub-units totalling at least `chunk_overlap` chars, minus any
/// that must go to make room for the incoming sub-unit. A sub-unit larger
/// than `chunk_size` becomes a chunk of its own.
pub(super) fn merge_units(units: &[Span], chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<Span> = VecDeque::new();
    let mut total = 0usize;

    for unit in units {
        if !window.is_empty() && total + unit.chars > chunk_size {
            chunks.push(window_span(&window, total));

            while let Some(front) = window.front() {
                let overlap_kept = total - front.chars >= chunk_overlap;
                let no_room = total + unit.chars > chunk_size;
                if !(overlap_kept || no_room) {
                    break;
                }
                total -= front.chars;
                window.pop_front();
            }
        }

        window.push_back(*unit);
        total += unit.chars;
    }

    if !window.is_empty() {
        chunks.push(window_span(&window, total));
    }

    chunks
}

fn window_span(window: &VecDeque<Span>, chars: usize) -> Span {
    // Callers only pass non-empty windows.
    let start = window.front().map_or(0, |s| s.start);
    let end = window.back().map_or(start, |s| s.end);
    Span { start, end, chars }
}
