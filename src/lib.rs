//! Gatehouse - Distributed Rate Limiting and Account Lockout
//!
//! This crate implements the abuse-protection subsystem of an API service:
//! a fixed-window request rate limiter and an account lockout manager for
//! repeated authentication failures. All durable state lives in a shared
//! counter store (Redis in production), so the subsystem is stateless
//! in-process and works correctly across multiple service instances.

pub mod config;
pub mod error;
pub mod intercept;
pub mod lockout;
pub mod ratelimit;
pub mod store;
