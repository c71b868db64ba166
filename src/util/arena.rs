//! Generational arena backing the job table.
//!
//! Job records live in a `Vec` of slots. Removed slots go on a free list and
//! bump their generation, so a stale [`ArenaIndex`] held by a completed job's
//! handle can never alias a newer record that reused the slot.

use core::fmt;
use core::hash::{Hash, Hasher};

/// An index into an [`Arena`] with a generation counter for ABA safety.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArenaIndex {
    index: u32,
    generation: u32,
}

impl ArenaIndex {
    /// Creates a new arena index (primarily for testing).
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the raw slot number.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation counter.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ArenaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaIndex({}:{})", self.index, self.generation)
    }
}

impl Hash for ArenaIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let packed = (u64::from(self.index) << 32) | u64::from(self.generation);
        state.write_u64(packed);
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { value: T, generation: u32 },
    Vacant { next_free: Option<u32>, generation: u32 },
}

/// A slot arena with generation-checked indices.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates a new empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Returns the number of occupied slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no slot is occupied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a value built from its own final index.
    ///
    /// Records embed their id, so the closure receives the index before the
    /// value is stored.
    pub fn insert_with<F>(&mut self, f: F) -> ArenaIndex
    where
        F: FnOnce(ArenaIndex) -> T,
    {
        self.len += 1;

        if let Some(free) = self.free_head {
            let slot = &mut self.slots[free as usize];
            let (next_free, generation) = match slot {
                Slot::Vacant {
                    next_free,
                    generation,
                } => (*next_free, *generation),
                Slot::Occupied { .. } => unreachable!("free list pointed to occupied slot"),
            };
            self.free_head = next_free;
            let idx = ArenaIndex::new(free, generation);
            *slot = Slot::Occupied {
                value: f(idx),
                generation,
            };
            idx
        } else {
            let index = u32::try_from(self.slots.len()).expect("job arena overflow");
            let idx = ArenaIndex::new(index, 0);
            self.slots.push(Slot::Occupied {
                value: f(idx),
                generation: 0,
            });
            idx
        }
    }

    /// Inserts a value and returns its index.
    pub fn insert(&mut self, value: T) -> ArenaIndex {
        self.insert_with(|_| value)
    }

    /// Removes and returns the value at `index`, if it is still live.
    pub fn remove(&mut self, index: ArenaIndex) -> Option<T> {
        let slot = self.slots.get_mut(index.index as usize)?;
        let generation = match slot {
            Slot::Occupied { generation, .. } if *generation == index.generation => *generation,
            _ => return None,
        };
        let old = core::mem::replace(
            slot,
            Slot::Vacant {
                next_free: self.free_head,
                generation: generation.wrapping_add(1),
            },
        );
        self.free_head = Some(index.index);
        self.len -= 1;
        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Returns a reference to the live value at `index`.
    #[must_use]
    pub fn get(&self, index: ArenaIndex) -> Option<&T> {
        match self.slots.get(index.index as usize)? {
            Slot::Occupied { value, generation } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Returns a mutable reference to the live value at `index`.
    pub fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut T> {
        match self.slots.get_mut(index.index as usize)? {
            Slot::Occupied { value, generation } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Returns true if `index` points at a live value.
    #[must_use]
    pub fn contains(&self, index: ArenaIndex) -> bool {
        self.get(index).is_some()
    }

    /// Iterates over live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaIndex, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Slot::Occupied { value, generation } => {
                    Some((ArenaIndex::new(i as u32, *generation), value))
                }
                Slot::Vacant { .. } => None,
            })
    }
}
