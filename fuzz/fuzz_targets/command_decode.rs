//! Fuzz target for command decoding
//!
//! Feeds arbitrary bytes through `Command::try_from` as if they had been
//! read off the command pipe.
//!
//! # Invariants
//!
//! - Decoding never panics
//! - A decoded command re-encodes to the same byte
//! - Unknown bytes are reported with the offending byte
//! - Only `WindowTerm` and `SaveState` require a hand-off

#![no_main]

use libfuzzer_sys::fuzz_target;
use lifeline_core::{BridgeError, Command};

fuzz_target!(|data: &[u8]| {
    for &byte in data {
        match Command::try_from(byte) {
            Ok(command) => {
                assert_eq!(command.code(), byte);
                assert!(!command.to_string().is_empty());
                let handoff = matches!(command, Command::WindowTerm | Command::SaveState);
                assert_eq!(command.requires_handoff(), handoff);
            }
            Err(BridgeError::UnknownCommand(unknown)) => {
                assert_eq!(unknown, byte);
                assert!(usize::from(byte) >= Command::ALL.len());
            }
            Err(other) => panic!("unexpected decode error: {other}"),
        }
    }
});
