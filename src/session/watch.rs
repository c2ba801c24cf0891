use std::fmt;

use super::command::Name;
use crate::registers::RegisterFile;

/// Names whose value is reported whenever an instruction changes it.
#[derive(Debug, Default)]
pub struct Watches(Vec<(Name, u16)>);

/// A watched value which changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Change {
    pub name: Name,
    pub old: u16,
    pub new: u16,
}

pub fn value(name: Name, regs: &RegisterFile) -> u16 {
    match name {
        Name::Register(register) => regs.get(register),
        Name::Byte(register) => regs.get_byte(register) as u16,
        Name::Flag(flag) => regs.get_flag(flag) as u16,
    }
}

impl Watches {
    /// Returns `false` if `name` is already watched.
    pub fn insert(&mut self, name: Name, regs: &RegisterFile) -> bool {
        if self.0.iter().any(|(watched, _)| *watched == name) {
            return false;
        }
        self.0.push((name, value(name, regs)));
        true
    }

    pub fn remove(&mut self, name: Name) -> bool {
        let initial_len = self.0.len();
        self.0.retain(|(watched, _)| *watched != name);
        initial_len != self.0.len()
    }

    /// Every watched value which differs from the last check.
    pub fn check(&mut self, regs: &RegisterFile) -> Vec<Change> {
        let mut changes = Vec::new();
        for (name, last) in &mut self.0 {
            let new = value(*name, regs);
            if new != *last {
                changes.push(Change {
                    name: *name,
                    old: *last,
                    new,
                });
                *last = new;
            }
        }
        changes
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Name::Register(_) => write!(f, "{}: {:04X} -> {:04X}", self.name, self.old, self.new),
            Name::Byte(_) => write!(f, "{}: {:02X} -> {:02X}", self.name, self.old, self.new),
            Name::Flag(_) => write!(f, "{}: {} -> {}", self.name, self.old, self.new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{ByteRegister, Flag, Register};

    #[test]
    fn reports_each_change_once() {
        let mut regs = RegisterFile::new();
        let mut watches = Watches::default();
        assert!(watches.insert(Name::Register(Register::Ax), &regs));
        assert!(!watches.insert(Name::Register(Register::Ax), &regs));
        assert!(watches.insert(Name::Byte(ByteRegister::Ah), &regs));
        assert!(watches.insert(Name::Flag(Flag::Zero), &regs));

        regs.set_byte(ByteRegister::Al, 0x05);
        let changes = watches.check(&regs);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].to_string(), "AX: 0000 -> 0005");
        assert!(watches.check(&regs).is_empty());

        regs.set(Register::Ax, 0x1205);
        regs.set_flag(Flag::Zero, true);
        let changes: Vec<String> = watches.check(&regs).iter().map(|c| c.to_string()).collect();
        assert_eq!(changes, ["AX: 0005 -> 1205", "AH: 00 -> 12", "ZF: 0 -> 1"]);

        assert!(watches.remove(Name::Flag(Flag::Zero)));
        assert!(!watches.remove(Name::Flag(Flag::Zero)));
    }
}
