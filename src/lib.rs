// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Lowering of ANGLE_shader_pixel_local_storage for fragment shaders, on a tree IR.  Pixel local
// storage is rewritten either to storage images or to framebuffer fetch, depending on what the
// backend supports.

pub mod builder;
pub mod compile;
pub mod debug;
pub mod emulator;
pub mod error;
pub mod instruction;
pub mod ir;
pub mod transform;
pub mod traverser;
pub mod util;
pub mod validator;

pub use error::*;
