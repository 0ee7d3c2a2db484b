// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    io::Write,
    sync::atomic::{AtomicBool, Ordering},
};

use env_logger::Builder;

pub fn init() {
    lazy_static! {
        static ref INITIALISED: AtomicBool = AtomicBool::new(false);
    }

    // Only need to call this once
    if !INITIALISED.swap(true, Ordering::Relaxed) {
        // This is env_logger::init() but taking logging values from RUST_OPCUA_PUBSUB_LOG instead
        // of RUST_LOG. env_logger/RUST_LOG is used by cargo and other rust tools so console fills
        // with garbage from other processes when we're only interested in our own garbage!
        let mut builder = Builder::from_env("RUST_OPCUA_PUBSUB_LOG");
        builder.format(|f, record| {
            let now = chrono::Utc::now();
            let time_fmt = now.format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(
                f,
                "{} - {} - {} - {}",
                time_fmt,
                record.level(),
                record.target(),
                record.args()
            )
        });
        builder.init();
        info!("Console logging is enabled");
    }
}
