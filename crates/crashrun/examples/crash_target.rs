//! Target program for trying out `crashrun run`
//!
//! ```text
//! cargo build --example crash_target
//! crashrun run target/debug/examples/crash_target segv
//! ```
//!
//! Modes:
//! - `segv`: raise SIGSEGV from a few frames deep (launcher exits 2)
//! - `abort`: call `std::process::abort` (launcher exits 2)
//! - `threads`: start two sleeping workers, then raise SIGSEGV (three threads in the backtrace)
//! - `exit N`: exit with code N (launcher exits N)
//! - no mode: print a line and exit 0

use std::hint::black_box;
use std::thread;
use std::time::Duration;

use nix::sys::signal::{raise, Signal};

fn main()
{
    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_default();

    match mode.as_str() {
        "segv" => outer(Signal::SIGSEGV),
        "abort" => std::process::abort(),
        "threads" => {
            for id in 0..2 {
                thread::spawn(move || worker(id));
            }
            thread::sleep(Duration::from_millis(100));
            outer(Signal::SIGSEGV);
        }
        "exit" => {
            let code = args.next().and_then(|code| code.parse().ok()).unwrap_or(0);
            std::process::exit(code);
        }
        _ => println!("crash_target: nothing to do"),
    }
}

#[inline(never)]
fn outer(signal: Signal)
{
    black_box(middle(signal));
}

#[inline(never)]
fn middle(signal: Signal) -> u32
{
    fault(signal);
    black_box(1)
}

#[inline(never)]
fn fault(signal: Signal)
{
    raise(signal).expect("failed to raise signal");
}

#[inline(never)]
fn worker(id: u32)
{
    loop {
        black_box(id);
        thread::sleep(Duration::from_secs(1));
    }
}
