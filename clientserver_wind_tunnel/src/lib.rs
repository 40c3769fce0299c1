// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Criterion benchmarks for `clientserver_stream` and `clientserver_interpreter`.
//!
//! The benchmarks live in `benches/`; run them with `cargo bench -p clientserver_wind_tunnel`.
