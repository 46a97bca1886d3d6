//! Process-wide word interner.
//!
//! Every word shown during a session is interned once when the session's
//! trial list is built. The renderer keys its text pixmaps by the returned id
//! so a word is rasterized at most once per process.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::RwLock;
pub use string_cache::DefaultAtom as Atom;

#[derive(Default)]
struct Interner {
    ids: HashMap<Atom, usize>,
    words: Vec<Atom>,
}

lazy_static! {
    static ref WORDS: RwLock<Interner> = RwLock::new(Interner::default());
}

/// Intern a word and return its id. Interning the same text twice yields the
/// same id.
pub fn intern_word(s: &str) -> usize {
    let atom = Atom::from(s);
    if let Some(id) = read().ids.get(&atom) {
        return *id;
    }
    let mut w = WORDS.write().unwrap_or_else(|e| e.into_inner());
    // another thread may have won the race between the read and write locks
    if let Some(id) = w.ids.get(&atom) {
        return *id;
    }
    let id = w.words.len();
    w.words.push(atom.clone());
    w.ids.insert(atom, id);
    id
}

pub fn word(id: usize) -> Option<Atom> {
    read().words.get(id).cloned()
}

fn read() -> std::sync::RwLockReadGuard<'static, Interner> {
    WORDS.read().unwrap_or_else(|e| e.into_inner())
}
