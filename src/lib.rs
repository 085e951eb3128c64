//! Ratelimiter - In-process admission control
//!
//! This crate bounds the rate at which callers may proceed with an operation.
//! Two interchangeable strategies sit behind the [`RateLimiter`] capability:
//! a wall-clock aligned fixed-window counter and a token bucket refilled by an
//! owned background task. `allow()` never rejects, it only delays.
//!
//! [`RateLimiter`]: ratelimit::RateLimiter

pub mod config;
pub mod error;
pub mod ratelimit;
