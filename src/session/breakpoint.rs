use crate::memory::Address;

/// Code addresses at which `g` stops, in insertion order.
#[derive(Debug, Default)]
pub struct Breakpoints(Vec<Address>);

impl Breakpoints {
    pub fn contains(&self, address: Address) -> bool {
        self.0.contains(&address)
    }

    /// Returns `false` if a breakpoint already exists at `address`.
    pub fn insert(&mut self, address: Address) -> bool {
        if self.contains(address) {
            return false;
        }
        self.0.push(address);
        true
    }

    /// Returns whether a breakpoint was found at `address`.
    pub fn remove(&mut self, address: Address) -> bool {
        let initial_len = self.0.len();
        self.0.retain(|breakpoint| *breakpoint != address);
        initial_len != self.0.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Breakpoints {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let mut breakpoints = Breakpoints::default();
        let address = Address::new(0, 0x104);
        assert!(breakpoints.insert(address));
        assert!(!breakpoints.insert(address));
        assert!(breakpoints.insert(Address::new(1, 0x104)));
        assert_eq!(breakpoints.len(), 2);
        assert!(breakpoints.contains(address));
        assert!(breakpoints.remove(address));
        assert!(!breakpoints.remove(address));
        assert!(!breakpoints.contains(address));
        assert_eq!(breakpoints.iter().count(), 1);
    }
}
