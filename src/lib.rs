// Copyright 2026 Folio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Folio library — a terminal reader for web-novel chapters that fetches
//! through a rotating list of CORS-style relays and caches everything it
//! reads.
//!
//! This library crate exposes the core modules for integration testing.

pub mod audit;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod progress;
pub mod state;
pub mod text;
