//! Scoped fault protection around compiled-function calls.
//!
//! Compiled code traps in two ways: hardware faults (an out-of-bounds
//! access hitting unmapped memory raises SIGSEGV/SIGBUS, integer division
//! faults raise SIGFPE) and instrumented trap sites calling [`raise`]. Both
//! leave the protected region through sigsetjmp/siglongjmp and surface as a
//! status code from [`protect`], so the executor sees exactly the contract
//! it needs: "protect this region, deliver a status on exit".
//!
//! Regions nest: a compiled function may call a host import that re-enters
//! more compiled code. Each region pushes its own recovery buffer; a fault
//! always unwinds to the innermost one.
//!
//! # Safety
//!
//! - The signal handler is async-signal-safe: it reads thread-local data
//!   and calls siglongjmp, both permitted by POSIX.
//! - siglongjmp skips Rust destructors between sigsetjmp and the fault.
//!   Protected regions therefore hold no resources beyond the argument and
//!   result buffers owned by the caller, which outlive the jump.
//! - Faults with no active region are chained to the previous handler.

use std::cell::UnsafeCell;
use std::sync::Once;

use crate::error::Trap;

/// Alternate signal stack size (bytes). 64 KB is generous.
const ALT_STACK_SIZE: usize = 64 * 1024;

/// `si_code` value for integer overflow on SIGFPE. The `libc` crate does
/// not expose `FPE_INTOVF` on this target; the value matches the glibc
/// `bits/siginfo-consts.h` / kernel `asm-generic/siginfo.h` definition.
const FPE_INTOVF: libc::c_int = 2;

/// Fixed-size buffer for sigjmp_buf. 256 bytes covers all platforms.
const JMP_BUF_SIZE: usize = 256;

unsafe extern "C" {
    #[cfg_attr(target_os = "linux", link_name = "__sigsetjmp")]
    fn sigsetjmp(buf: *mut u8, save_signals: libc::c_int) -> libc::c_int;
    fn siglongjmp(buf: *mut u8, val: libc::c_int) -> !;
}

/// sigjmp_buf wants pointer alignment; over-align to be safe everywhere.
#[repr(align(16))]
struct JmpBuf([u8; JMP_BUF_SIZE]);

impl JmpBuf {
    fn new() -> Box<Self> {
        Box::new(JmpBuf([0u8; JMP_BUF_SIZE]))
    }
}

/// Thread-local recovery state: one buffer per nested protected region.
/// Buffers are boxed so their addresses survive Vec reallocation.
struct FaultContext {
    regions: Vec<Box<JmpBuf>>,
}

impl FaultContext {
    const fn new() -> Self {
        FaultContext {
            regions: Vec::new(),
        }
    }
}

// UnsafeCell because the signal handler needs access without RefCell
// (which is not async-signal-safe).
thread_local! {
    static FAULT_CTX: UnsafeCell<FaultContext> = const { UnsafeCell::new(FaultContext::new()) };
}

/// Previous handlers, saved for chaining. Indexed by [`slot_of`].
static mut PREV_HANDLERS: [libc::sigaction; 3] = unsafe { std::mem::zeroed() };

static INSTALL_ONCE: Once = Once::new();

fn slot_of(sig: libc::c_int) -> usize {
    match sig {
        libc::SIGSEGV => 0,
        libc::SIGBUS => 1,
        _ => 2, // SIGFPE
    }
}

// Status codes carried through siglongjmp. Zero is reserved: sigsetjmp
// returns it on the initial, non-fault path.
fn code_of(trap: Trap) -> libc::c_int {
    match trap {
        Trap::CostLimitExceeded => 1,
        Trap::ExecutionFailed => 2,
        Trap::Terminated => 3,
        Trap::MemoryOutOfBounds => 4,
        Trap::DivideByZero => 5,
        Trap::IntegerOverflow => 6,
        Trap::InvalidConversion => 7,
        Trap::Unreachable => 8,
        Trap::CallIndirectTypeMismatch => 9,
        Trap::UninitializedElement => 10,
        Trap::InstanceNotFound => 11,
    }
}

fn trap_of(code: libc::c_int) -> Trap {
    match code {
        1 => Trap::CostLimitExceeded,
        2 => Trap::ExecutionFailed,
        3 => Trap::Terminated,
        5 => Trap::DivideByZero,
        6 => Trap::IntegerOverflow,
        7 => Trap::InvalidConversion,
        8 => Trap::Unreachable,
        9 => Trap::CallIndirectTypeMismatch,
        10 => Trap::UninitializedElement,
        11 => Trap::InstanceNotFound,
        _ => Trap::MemoryOutOfBounds,
    }
}

/// Install the fault signal handlers. Idempotent.
fn init() {
    INSTALL_ONCE.call_once(|| unsafe { install_handlers() });
}

unsafe fn install_handlers() {
    unsafe {
        // Alternate signal stack so the handler can run even when the
        // faulting code has exhausted its own stack.
        let alt_stack = libc::mmap(
            std::ptr::null_mut(),
            ALT_STACK_SIZE,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            -1,
            0,
        );
        assert_ne!(alt_stack, libc::MAP_FAILED, "alt stack mmap failed");

        let ss = libc::stack_t {
            ss_sp: alt_stack,
            ss_flags: 0,
            ss_size: ALT_STACK_SIZE,
        };
        let ret = libc::sigaltstack(&ss, std::ptr::null_mut());
        assert_eq!(ret, 0, "sigaltstack failed");

        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = fault_handler as *const () as usize;
        sa.sa_flags = libc::SA_SIGINFO | libc::SA_ONSTACK;
        libc::sigemptyset(&mut sa.sa_mask);

        for sig in [libc::SIGSEGV, libc::SIGBUS, libc::SIGFPE] {
            let prev = std::ptr::addr_of_mut!(PREV_HANDLERS[slot_of(sig)]);
            let ret = libc::sigaction(sig, &sa, prev);
            assert_eq!(ret, 0, "sigaction failed for signal {sig}");
        }
    }
}

/// Map a fault signal to the trap it mirrors.
fn trap_for_signal(sig: libc::c_int, info: *mut libc::siginfo_t) -> Trap {
    if sig == libc::SIGFPE {
        let code = unsafe { (*info).si_code };
        if code == FPE_INTOVF {
            Trap::IntegerOverflow
        } else {
            Trap::DivideByZero
        }
    } else {
        Trap::MemoryOutOfBounds
    }
}

/// SIGSEGV/SIGBUS/SIGFPE handler. Inside a protected region the fault
/// becomes a status code delivered at the innermost recovery point;
/// otherwise the previous handler is chained.
unsafe extern "C" fn fault_handler(
    sig: libc::c_int,
    info: *mut libc::siginfo_t,
    ucontext: *mut libc::c_void,
) {
    FAULT_CTX.with(|cell| {
        let ctx = unsafe { &mut *cell.get() };
        match ctx.regions.last_mut() {
            Some(buf) => {
                let trap = trap_for_signal(sig, info);
                unsafe { siglongjmp(buf.0.as_mut_ptr(), code_of(trap)) };
            }
            None => unsafe { chain_to_previous(sig, info, ucontext) },
        }
    });
}

/// Re-deliver a fault that hit outside any protected region to whatever
/// disposition was installed before ours.
///
/// The saved `sa_sigaction` slot is a union: the `SIG_IGN`/`SIG_DFL`
/// sentinels, a plain one-argument handler, or (with `SA_SIGINFO`) a
/// three-argument one. Sentinels are settled first; only a non-sentinel
/// value is ever treated as code.
unsafe fn chain_to_previous(
    sig: libc::c_int,
    info: *mut libc::siginfo_t,
    ucontext: *mut libc::c_void,
) {
    let prev = unsafe { std::ptr::addr_of!(PREV_HANDLERS[slot_of(sig)]).read() };
    let action = prev.sa_sigaction;

    if action == libc::SIG_IGN {
        return;
    }
    if action == libc::SIG_DFL {
        // Reinstate the default disposition and let the kernel take it
        // from here (for these signals: terminate).
        unsafe {
            libc::signal(sig, libc::SIG_DFL);
            libc::raise(sig);
        }
        return;
    }

    unsafe {
        if prev.sa_flags & libc::SA_SIGINFO != 0 {
            let handler: unsafe extern "C" fn(
                libc::c_int,
                *mut libc::siginfo_t,
                *mut libc::c_void,
            ) = std::mem::transmute(action);
            handler(sig, info, ucontext);
        } else {
            let handler: unsafe extern "C" fn(libc::c_int) = std::mem::transmute(action);
            handler(sig);
        }
    }
}

/// Run `f` under fault protection, yielding the region's exit status.
///
/// On a clean return the status is `Ok`. If `f` faults, through a mapped
/// signal or through [`raise`], the region unwinds here and the status
/// carries the mirrored trap.
pub(crate) fn protect<F: FnOnce()>(f: F) -> Result<(), Trap> {
    init();

    let buf: *mut u8 = FAULT_CTX.with(|cell| {
        let ctx = unsafe { &mut *cell.get() };
        ctx.regions.push(JmpBuf::new());
        ctx.regions.last_mut().unwrap().0.as_mut_ptr()
    });

    // The recovery point must live in this frame: protect() has not
    // returned while `f` runs, so the jump target stays valid.
    let code = unsafe { sigsetjmp(buf, 1) };
    if code != 0 {
        pop_region();
        return Err(trap_of(code));
    }

    f();

    pop_region();
    Ok(())
}

fn pop_region() {
    FAULT_CTX.with(|cell| {
        let ctx = unsafe { &mut *cell.get() };
        ctx.regions.pop();
    });
}

/// Raise a trap from compiled code, unwinding to the innermost protected
/// region. Instrumented trap sites and cooperative termination use this
/// instead of faulting the hardware.
///
/// # Panics
///
/// Panics when called outside a protected region.
pub fn raise(trap: Trap) -> ! {
    let buf: *mut u8 = FAULT_CTX.with(|cell| {
        let ctx = unsafe { &mut *cell.get() };
        match ctx.regions.last_mut() {
            Some(buf) => buf.0.as_mut_ptr(),
            None => panic!("fault raised outside a protected region"),
        }
    });
    unsafe { siglongjmp(buf, code_of(trap)) }
}
