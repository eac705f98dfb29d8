use crate::journey::Journey;

pub trait Dominates {
    fn dominates(&self, other: &Self) -> bool;
}

/// Where `execute` writes the journeys it finds.
pub trait JourneySink {
    fn clear(&mut self);

    fn add(&mut self, journey: Journey) -> bool;
}

/// A set of mutually non-dominated items.
#[derive(Clone, Debug)]
pub struct ParetoSet<T> {
    items: Vec<T>,
}

impl<T> Default for ParetoSet<T> {
    fn default() -> Self { Self::new() }
}

impl<T> ParetoSet<T> {
    pub const fn new() -> Self {
        ParetoSet { items: Vec::new() }
    }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, T> { self.items.iter() }

    pub fn as_slice(&self) -> &[T] { &self.items }

    pub fn into_vec(self) -> Vec<T> { self.items }

    pub fn clear(&mut self) { self.items.clear(); }
}

impl<T: Dominates> ParetoSet<T> {
    // Adds an item to the set, discarding dominated items.
    // Returns true if the item was added <=> the set was modified.
    pub fn add(&mut self, new_item: T) -> bool {
        // Remove dominated items.
        let num_items = self.items.len();
        self.items.retain(|item| !new_item.dominates(item));

        // Check if the new item is dominated by any existing item.
        if self.items.iter().any(|item| item.dominates(&new_item)) {
            // If this item is dominated by any existing item, it won't have dominated any existing items.
            debug_assert!(self.items.len() == num_items);
            return false;
        }

        self.items.push(new_item);
        true
    }

    pub fn merge(&mut self, other: ParetoSet<T>) -> bool {
        let mut updated = false;
        for item in other.items {
            updated |= self.add(item);
        }
        updated
    }
}

impl<T> IntoIterator for ParetoSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter { self.items.into_iter() }
}

impl<'a, T> IntoIterator for &'a ParetoSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter { self.items.iter() }
}

impl JourneySink for ParetoSet<Journey> {
    fn clear(&mut self) { ParetoSet::clear(self) }

    fn add(&mut self, journey: Journey) -> bool { ParetoSet::add(self, journey) }
}

/// Keeps every journey it is given.
impl JourneySink for Vec<Journey> {
    fn clear(&mut self) { Vec::clear(self) }

    fn add(&mut self, journey: Journey) -> bool {
        self.push(journey);
        true
    }
}
