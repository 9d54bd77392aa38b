// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer for the demo host: config location and the scripted bridge
// session.

pub mod data_dir;
pub mod session;
