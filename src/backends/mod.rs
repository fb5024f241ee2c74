// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstractions for camera hardware

pub mod camera;
