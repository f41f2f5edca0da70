//! Xert-to-Home-Assistant polling service.
//!
//! Polls the Xert API on independent per-domain timers, fingerprints each
//! payload, and forwards changed data as webhook events to a Home Assistant
//! hub. See the crate modules for the individual pieces: [`config`] for
//! environment settings, [`detect`] for change detection, [`webhook`] for
//! delivery and [`poller`] for the scheduling loops.

pub mod config;
pub mod detect;
pub mod error;
pub mod poller;
pub mod webhook;
