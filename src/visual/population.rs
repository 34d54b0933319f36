/// Arena of entities. Slots are never reordered: growth
/// appends, shrinking truncates from the end, and recycling overwrites a slot
/// in place.
#[derive(Debug, Clone, Default)]
pub struct Population<T> {
    slots: Vec<T>,
}

impl<T> Population<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.slots.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.slots
    }

    /// Grows with `make` or truncates to exactly `n` slots.
    pub fn set_len_with(&mut self, n: usize, mut make: impl FnMut() -> T) {
        if n <= self.slots.len() {
            self.slots.truncate(n);
            return;
        }
        self.slots.reserve(n - self.slots.len());
        while self.slots.len() < n {
            self.slots.push(make());
        }
    }

    /// Drops every slot and refills with `n` fresh entities.
    pub fn reseed(&mut self, n: usize, make: impl FnMut() -> T) {
        self.slots.clear();
        self.set_len_with(n, make);
    }
}
