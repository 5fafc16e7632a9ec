use bitflags::bitflags;

bitflags! {
    /// Options recognized by the registration ABI.
    ///
    /// The bit values (0, 1, 2, 4, 8) are fixed rather than left to
    /// `bitflags`'s default assignment: this crate has no cross-language
    /// caller today, but keeping the literal values costs nothing and
    /// documents the mapping for anyone who later links against it from C.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegisterFlags: u32 {
        /// Acquire a reference on the newest node. This is the default
        /// behavior when no other bit is set.
        const USE_INCR = 0;
        /// Release the caller's reference, freeing the node iff its
        /// refcount hits zero and it is not the current head.
        const USE_DECR = 1;
        /// Decrement but never unmap — the caller will release the mapped
        /// region itself (e.g. on shutdown).
        const MUNMAP_SKIP = 2;
        /// Advise the implementation that a caller-owned mutex is already
        /// held across this call; it must not re-enter its own lock.
        const MUTEX_LOCK_HOLD = 4;
        /// Companion to `MUTEX_LOCK_HOLD`, naming the paired release.
        const MUTEX_UNLOCK_HOLD = 8;
    }
}

impl Default for RegisterFlags {
    fn default() -> Self {
        RegisterFlags::USE_INCR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_values_are_fixed_across_the_abi() {
        assert_eq!(RegisterFlags::USE_INCR.bits(), 0);
        assert_eq!(RegisterFlags::USE_DECR.bits(), 1);
        assert_eq!(RegisterFlags::MUNMAP_SKIP.bits(), 2);
        assert_eq!(RegisterFlags::MUTEX_LOCK_HOLD.bits(), 4);
        assert_eq!(RegisterFlags::MUTEX_UNLOCK_HOLD.bits(), 8);
    }
}
