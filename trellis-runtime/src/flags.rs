use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Flags threaded through activation and deactivation.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LifecycleFlags(u8);

impl LifecycleFlags {
    pub const NONE: Self = Self(0);
    pub const FROM_BIND: Self = Self(1);
    pub const FROM_UNBIND: Self = Self(1 << 1);
    /// Dispose the initiator once it is unbound.
    pub const DISPOSE: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LifecycleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LifecycleFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for LifecycleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::FROM_BIND, "from_bind"),
            (Self::FROM_UNBIND, "from_unbind"),
            (Self::DISPOSE, "dispose"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag) && flag.0 != 0)
        .map(|(_, name)| *name)
        .collect();
        write!(f, "LifecycleFlags({})", names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_and_test() {
        let f = LifecycleFlags::FROM_BIND | LifecycleFlags::DISPOSE;
        assert!(f.contains(LifecycleFlags::DISPOSE));
        assert!(!f.contains(LifecycleFlags::FROM_UNBIND));
        assert_eq!(format!("{f:?}"), "LifecycleFlags(from_bind|dispose)");
    }
}
