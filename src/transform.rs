// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
pub mod monomorphize_unsupported_functions;
pub mod rewrite_pixel_local_storage;
