//! Property-based tests for the channels and the lifecycle register.
//!
//! These tests verify critical invariants:
//! - Commands arrive in write order, whatever the sequence
//! - Timer sends never block; overflow is dropped, the rest stays FIFO
//! - Destroy is terminal and `destroy_requested` never clears

#![allow(clippy::expect_used)]

use lifeline_core::{
    ActivityState, Command, Lifecycle, Looper, LooperId, Poll, TimerChannel, command_channel,
};
use proptest::prelude::*;

fn command_strategy() -> impl Strategy<Value = Command> {
    prop::sample::select(Command::ALL.to_vec())
}

proptest! {
    /// INVARIANT: the reader sees exactly the written sequence.
    #[test]
    fn prop_commands_arrive_in_write_order(
        commands in prop::collection::vec(command_strategy(), 0..64)
    ) {
        let (writer, reader) = command_channel(64);
        for command in &commands {
            writer.write(*command).expect("reader alive");
        }
        drop(writer);

        let mut received = Vec::new();
        while let Ok(command) = reader.read() {
            received.push(command);
        }
        prop_assert_eq!(received, commands);
    }

    /// INVARIANT: every code below 16 decodes back to itself; nothing else
    /// decodes.
    #[test]
    fn prop_command_codes_are_closed(code in any::<u8>()) {
        match Command::try_from(code) {
            Ok(command) => prop_assert_eq!(command.code(), code),
            Err(_) => prop_assert!(usize::from(code) >= Command::ALL.len()),
        }
    }

    /// INVARIANT: n sends into capacity c deliver the first min(n, c) slots
    /// in order and drop the rest.
    #[test]
    fn prop_timer_channel_is_lossy_fifo(
        slots in prop::collection::vec(any::<u8>(), 0..64),
        capacity in 1usize..32,
    ) {
        let mut looper = Looper::new();
        let mut timers = TimerChannel::new(capacity);
        timers.create_timer_source(&mut looper).expect("first creation");
        let sender = timers.sender().expect("active");

        let delivered = slots.iter().filter(|slot| sender.send_timer_index(**slot)).count();
        prop_assert_eq!(delivered, slots.len().min(capacity));

        let mut received = Vec::new();
        while let Some(slot) = timers.receive_timer_index() {
            received.push(slot);
        }
        prop_assert_eq!(&received[..], &slots[..delivered]);
    }

    /// INVARIANT: once `Destroy` is applied the state is `Destroyed` forever
    /// and `destroy_requested` stays set.
    #[test]
    fn prop_destroy_is_terminal(commands in prop::collection::vec(command_strategy(), 0..48)) {
        let mut lifecycle = Lifecycle::new();
        let mut destroyed = false;

        for command in commands {
            lifecycle.transition(command);
            lifecycle.settle(command);
            destroyed |= command == Command::Destroy;

            prop_assert_eq!(lifecycle.is_destroy_requested(), destroyed);
            if destroyed {
                prop_assert_eq!(lifecycle.state(), ActivityState::Destroyed);
            } else {
                prop_assert_ne!(lifecycle.state(), ActivityState::Destroyed);
            }
        }
    }
}

#[test]
fn pending_timer_slot_makes_the_looper_ready() {
    let mut looper = Looper::new();
    let mut timers = TimerChannel::new(4);
    timers.create_timer_source(&mut looper).expect("first creation");

    assert!(timers.sender().expect("active").send_timer_index(2));
    assert_eq!(looper.poll_once(None), Poll::Ready(LooperId::TIMER));
    assert_eq!(timers.receive_timer_index(), Some(2));
}
