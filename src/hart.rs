use core::fmt;

use crate::consts::CONTEXT_PER_HART;

/// Dense, zero-based hart index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HartId(usize);

impl HartId {
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl From<usize> for HartId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Display for HartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hart{}", self.0)
    }
}

/// Reads `mhartid`. Only meaningful in M-mode.
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
pub fn current() -> HartId {
    HartId(riscv::register::mhartid::read())
}

/// PLIC contexts owned by one hart.
///
/// `None` marks a privilege mode the hart has no context for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextMapping {
    pub machine: Option<usize>,
    pub supervisor: Option<usize>,
}

impl ContextMapping {
    /// Even context is M-mode, the following odd one is S-mode.
    pub const fn for_hart(hart: HartId) -> Self {
        let m = hart.0 * CONTEXT_PER_HART;
        Self {
            machine: Some(m),
            supervisor: Some(m + 1),
        }
    }

    /// Builds a mapping from signed ids, where a negative id means
    /// "not applicable".
    pub fn from_raw(machine: isize, supervisor: isize) -> Self {
        Self {
            machine: usize::try_from(machine).ok(),
            supervisor: usize::try_from(supervisor).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::MAX_HARTS;

    #[test]
    fn context_pairs_are_disjoint_across_harts() {
        let mut seen = [false; MAX_HARTS * CONTEXT_PER_HART];
        for id in 0..MAX_HARTS {
            let map = ContextMapping::for_hart(HartId::new(id));
            let (m, s) = (map.machine.unwrap(), map.supervisor.unwrap());
            assert_eq!((m, s), (2 * id, 2 * id + 1));
            assert!(!seen[m] && !seen[s]);
            seen[m] = true;
            seen[s] = true;
        }
        assert!(seen.iter().all(|&hit| hit));
    }

    #[test]
    fn negative_raw_ids_become_absent() {
        let map = ContextMapping::from_raw(-1, 5);
        assert_eq!(map.machine, None);
        assert_eq!(map.supervisor, Some(5));
        assert_eq!(
            ContextMapping::from_raw(2, 3),
            ContextMapping::for_hart(HartId::new(1))
        );
    }
}
