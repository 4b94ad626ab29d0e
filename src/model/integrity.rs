//! Structural edits over the part catalog. Death/alternate references are
//! positional, so inserting, deleting or swapping parts must re-index every
//! reference across the whole catalog; each operation finishes all of its
//! bookkeeping before returning and has no fallible step in between, so a
//! caller can never observe a half-updated catalog.

use std::collections::{BTreeSet, HashMap};
use log::trace;

use crate::model::parts::Tilepart;

/// Restores `set_id == position` and recounts `ter_id` within each terrain.
fn renumber(parts: &mut [Tilepart]) {
    let mut per_terrain: HashMap<usize, usize> = HashMap::new();
    for (set_id, part) in parts.iter_mut().enumerate() {
        part.set_id = set_id;
        let counter = per_terrain.entry(part.terrain).or_insert(0);
        part.ter_id = *counter;
        *counter += 1;
    }
}

/// Splices `inserted` in at `at`. References of pre-existing parts at or
/// after the insertion point shift up with their targets; a shifted value
/// that would leave the catalog drops to none instead. The inserted parts
/// carry whatever references their caller gave them, already in post-insert
/// positions.
pub fn insert_parts(parts: &mut Vec<Tilepart>, at: usize, inserted: Vec<Tilepart>) {
    let count = inserted.len();
    if count == 0 {
        return;
    }
    let at = at.min(parts.len());
    let new_len = parts.len() + count;
    trace!("insert_parts {count} at {at}");

    for part in parts.iter_mut() {
        for reference in [&mut part.dead_ref, &mut part.alt_ref] {
            if let Some(v) = *reference {
                if v >= at {
                    let shifted = v + count;
                    *reference = if shifted >= new_len { None } else { Some(shifted) };
                }
            }
        }
    }

    parts.splice(at..at, inserted);
    renumber(parts);
}

/// Removes the parts at `indices`. References to a removed part go to none
/// first; every surviving reference then slides down by the number of
/// removed slots strictly below it, so it keeps resolving to the same
/// logical part.
pub fn delete_parts(parts: &mut Vec<Tilepart>, indices: &BTreeSet<usize>) {
    if indices.is_empty() {
        return;
    }
    trace!("delete_parts {indices:?}");

    for part in parts.iter_mut() {
        for reference in [&mut part.dead_ref, &mut part.alt_ref] {
            match *reference {
                Some(v) if indices.contains(&v) => *reference = None,
                Some(v) => {
                    let below = indices.range(..v).count();
                    *reference = Some(v - below);
                }
                None => {}
            }
        }
    }

    for &index in indices.iter().rev() {
        if index < parts.len() {
            parts.remove(index);
        }
    }
    renumber(parts);
}

/// Exchanges two catalog positions; references follow the parts they named.
pub fn swap_parts(parts: &mut [Tilepart], a: usize, b: usize) {
    if a == b || a >= parts.len() || b >= parts.len() {
        return;
    }
    trace!("swap_parts {a} <-> {b}");

    parts.swap(a, b);
    for part in parts.iter_mut() {
        for reference in [&mut part.dead_ref, &mut part.alt_ref] {
            match *reference {
                Some(v) if v == a => *reference = Some(b),
                Some(v) if v == b => *reference = Some(a),
                _ => {}
            }
        }
    }
    renumber(parts);
}
