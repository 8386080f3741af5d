//! Fuzz target for the timer channel
//!
//! Interleaves sends, drains and source teardown against a small channel.
//!
//! # Invariants
//!
//! - Sends never block and never panic
//! - Delivered slots come out in send order
//! - A destroyed source drops every later send

#![no_main]

use std::collections::VecDeque;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lifeline_core::{Looper, TimerChannel};

#[derive(Debug, Clone, Arbitrary)]
enum TimerOp {
    Send(u8),
    Receive,
    Recreate,
}

fuzz_target!(|input: (u8, Vec<TimerOp>)| {
    let (capacity, ops) = input;
    let capacity = usize::from(capacity % 16) + 1;

    let mut looper = Looper::new();
    let mut timers = TimerChannel::new(capacity);
    let Ok(()) = timers.create_timer_source(&mut looper) else {
        panic!("fresh channel refused creation");
    };
    let Some(mut sender) = timers.sender() else {
        panic!("active channel has no sender");
    };
    let mut model = VecDeque::new();

    for op in ops {
        match op {
            TimerOp::Send(slot) => {
                let delivered = sender.send_timer_index(slot);
                assert_eq!(delivered, model.len() < capacity);
                if delivered {
                    model.push_back(slot);
                }
            }
            TimerOp::Receive => assert_eq!(timers.receive_timer_index(), model.pop_front()),
            TimerOp::Recreate => {
                timers.destroy_timer_source(&mut looper);
                assert!(!sender.send_timer_index(0));
                assert!(timers.create_timer_source(&mut looper).is_ok());
                let Some(fresh) = timers.sender() else {
                    panic!("recreated channel has no sender");
                };
                sender = fresh;
                model.clear();
            }
        }
    }
});
