//! Emulation of the instructions covered by User-Mode Instruction Prevention.
//!
//! UMIP is an x86 feature that makes `sgdt`, `sidt`, `sldt`, `smsw`, and
//! `str` fault with #GP when executed from user space (CPL > 0). Host
//! kernels emulate some of these after trapping the fault (Linux ≥ 5.4
//! covers `sgdt`/`sidt`/`smsw`); the rest reach the process as a synchronous
//! fault. This crate is the fault handler's fallback: it decodes the
//! faulting instruction from the captured [`state::CpuContext`], writes the
//! architecturally expected dummy value to the destination register or
//! memory, and advances the instruction pointer so the thread can resume as
//! if the instruction had executed.
//!
//! The crate never owns CPU state or memory. The caller supplies the
//! register snapshot and a [`mem::VirtualMemory`] implementation whose reads
//! and writes report failure as values rather than faulting again; see
//! [`emulate::UmipEmulator::try_emulate`] for the three-outcome contract.

pub mod emulate;
mod features;
pub mod mem;
pub mod state;

pub use emulate::{EmulateResult, UmipEmulator};
pub use features::EmulatorConfig;
pub use mem::{VirtualMemory, WriteRejected};
pub use state::CpuContext;
