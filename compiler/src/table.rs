use crate::object::{Gc, Obj};
use crate::value::Value;

const MAX_LOAD: f64 = 0.75;

/// An entry with `key == None` and `value == Value::Bool(true)` is a
/// tombstone (a deleted slot probing must still pass through); `key ==
/// None` with `value == Value::Nil` is a true empty slot.
#[derive(Clone, Copy)]
struct Entry {
    key: Option<Gc>,
    value: Value,
}

impl Entry {
    fn empty() -> Self {
        Self { key: None, value: Value::Nil }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Bool(true))
    }
}

/// Open-addressed, linear-probed hash table keyed by interned string
/// identity. Used both for the VM's globals/instance-field tables (real
/// key → value maps) and, with values unused, as the string-interning set.
pub struct Table {
    entries: Vec<Entry>,
    count: usize,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Self { entries: Vec::new(), count: 0 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn key_hash(key: Gc) -> u32 {
        // SAFETY: table keys are always live String objects; the table
        // never outlives the heap that owns them.
        unsafe { Obj::as_string(key).hash }
    }

    /// Linear probe starting at `hash % capacity`, stopping at the first
    /// true-empty slot (a miss) or matching key, remembering the first
    /// tombstone seen so insert can reuse it.
    fn find_slot(entries: &[Entry], capacity: usize, key: Gc, hash: u32) -> usize {
        let mut index = hash as usize % capacity;
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &entries[index];
            match entry.key {
                None if !entry.is_tombstone() => {
                    return tombstone.unwrap_or(index);
                }
                None => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Some(k) if k == key => return index,
                Some(_) => {}
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self) {
        let new_capacity = if self.entries.is_empty() { 8 } else { self.entries.len() * 2 };
        let mut new_entries = vec![Entry::empty(); new_capacity];
        let mut new_count = 0;

        for entry in &self.entries {
            if let Some(key) = entry.key {
                let hash = Self::key_hash(key);
                let index = Self::find_slot(&new_entries, new_capacity, key, hash);
                new_entries[index] = Entry { key: Some(key), value: entry.value };
                new_count += 1;
            }
        }

        self.entries = new_entries;
        self.count = new_count;
    }

    /// Returns `true` if `key` was newly inserted (not an overwrite).
    pub fn set(&mut self, key: Gc, value: Value) -> bool {
        if self.entries.is_empty()
            || (self.count + 1) as f64 > self.entries.len() as f64 * MAX_LOAD
        {
            self.grow();
        }

        let hash = Self::key_hash(key);
        let index = Self::find_slot(&self.entries, self.entries.len(), key, hash);
        let is_new = self.entries[index].key.is_none();
        if is_new && !self.entries[index].is_tombstone() {
            self.count += 1;
        }
        self.entries[index] = Entry { key: Some(key), value };
        is_new
    }

    pub fn get(&self, key: Gc) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let hash = Self::key_hash(key);
        let index = Self::find_slot(&self.entries, self.entries.len(), key, hash);
        self.entries[index].key.map(|_| self.entries[index].value)
    }

    pub fn contains(&self, key: Gc) -> bool {
        self.get(key).is_some()
    }

    pub fn delete(&mut self, key: Gc) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let hash = Self::key_hash(key);
        let index = Self::find_slot(&self.entries, self.entries.len(), key, hash);
        if self.entries[index].key.is_none() {
            return false;
        }
        self.entries[index] = Entry { key: None, value: Value::Bool(true) };
        true
    }

    /// The sole interning entry point: looks a string up by raw bytes and
    /// precomputed hash rather than by an already-allocated `Gc` key, since
    /// at intern time no object has been allocated yet.
    pub fn find_string(&self, bytes: &[u8], hash: u32) -> Option<Gc> {
        if self.entries.is_empty() {
            return None;
        }
        let capacity = self.entries.len();
        let mut index = hash as usize % capacity;
        loop {
            let entry = &self.entries[index];
            match entry.key {
                None if !entry.is_tombstone() => return None,
                Some(key) => {
                    // SAFETY: interning-table keys are always live Strings.
                    let s = unsafe { Obj::as_string(key) };
                    if s.hash == hash && s.chars.as_bytes() == bytes {
                        return Some(key);
                    }
                }
                None => {}
            }
            index = (index + 1) % capacity;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Gc, Value)> + '_ {
        self.entries.iter().filter_map(|e| e.key.map(|k| (k, e.value)))
    }

    /// Weak sweep: drop every entry whose key object did not survive the
    /// last mark phase. Must run after trace, before the free pass, per the
    /// tracing-GC invariant that freed keys are never read.
    ///
    /// `count` is left untouched: it tracks keys plus tombstones, not live
    /// keys alone, so that `set`'s growth check always has a true-empty slot
    /// to find.
    pub fn remove_unmarked_keys(&mut self) {
        for entry in self.entries.iter_mut() {
            if let Some(key) = entry.key {
                // SAFETY: sweep runs with all surviving marks intact; `key`
                // is still a valid pointer (not yet freed) at this point.
                let marked = unsafe { key.as_ref().marked.get() };
                if !marked {
                    *entry = Entry { key: None, value: Value::Bool(true) };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    #[test]
    fn remove_unmarked_keys_turns_entry_into_a_tombstone_without_touching_count() {
        let mut heap = Heap::new();
        let mut table = Table::new();
        let key = heap.intern("stale");
        table.set(key, Value::Nil);
        let count_before = table.len();

        // SAFETY: `key` is a live object we just allocated and own for the
        // duration of this test.
        unsafe { key.as_ref().marked.set(false) };
        table.remove_unmarked_keys();

        assert_eq!(table.len(), count_before, "tombstones still count towards load factor");
        assert!(!table.contains(key));
    }

    #[test]
    fn growth_still_fires_after_churn_leaves_the_table_full_of_tombstones() {
        let mut heap = Heap::new();
        let mut table = Table::new();

        // Fill past the load factor purely with entries that immediately
        // become tombstones, the way GC string-churn does. If `count` were
        // decremented on weak-sweep, this loop would never trigger growth
        // and `find_string` could spin forever probing a tombstone-only
        // table with no true-empty slot.
        for i in 0..64 {
            let key = heap.intern(&format!("churn-{i}"));
            table.set(key, Value::Nil);
            unsafe { key.as_ref().marked.set(false) };
            table.remove_unmarked_keys();
        }

        let live = heap.intern("still-here");
        assert!(table.set(live, Value::Bool(true)));
        assert!(table.get(live) == Some(Value::Bool(true)));
    }
}
