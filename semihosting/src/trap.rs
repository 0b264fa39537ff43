//! The single primitive everything else is built on.

use crate::types::Syscall;

/// Transfers control to the debug host and returns its 32-bit answer.
///
/// On Arm targets this is `bkpt 0xAB` with the operation number in r0 and the
/// parameter in r1; the host leaves the result in r0. The trap blocks until
/// the host resumes the core and cannot be cancelled.
pub trait Trap {
    /// Issues one semihosting call.
    ///
    /// # Safety
    ///
    /// `param` must be what `op` expects: an immediate value, or the address of
    /// a parameter block with the layout and length `op` requires. Any memory
    /// the block points at must stay valid (and writable where the host writes
    /// back) until the call returns.
    unsafe fn syscall(&self, op: Syscall, param: usize) -> i32;
}

impl<T: Trap + ?Sized> Trap for &T {
    unsafe fn syscall(&self, op: Syscall, param: usize) -> i32 {
        // SAFETY: forwarded unchanged; the caller upholds the contract.
        unsafe { (**self).syscall(op, param) }
    }
}
