// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// The compile process: options handed in by the driver, and the IR transformations they select.

use crate::ir::*;
use crate::*;
use log::debug;

// How ANGLE_shader_pixel_local_storage is implemented by the backend.  Matching
// ShPixelLocalStorageType.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum PixelLocalStorageType {
    NotSupported,
    ImageStoreR32PackedFormats,
    ImageStoreNativeFormats,
    FramebufferFetch,
}

// The mechanism used to order fragment shader invocations accessing pixel local storage through
// images.  Matching ShFragmentSynchronizationType.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum FragmentSynchronizationType {
    NotSupported,
    FragmentShaderInterlockNV_GL,
    FragmentShaderOrderingINTEL_GL,
    FragmentShaderInterlockARB_GL,
    RasterizerOrderViews_D3D,
    RasterOrderGroups_Metal,
}

impl FragmentSynchronizationType {
    // Whether the hardware orders accesses to resources marked as rasterizer-ordered, so no
    // explicit critical section is needed.
    pub fn is_hardware_ordered(&self) -> bool {
        matches!(
            self,
            FragmentSynchronizationType::RasterizerOrderViews_D3D
                | FragmentSynchronizationType::RasterOrderGroups_Metal
        )
    }
}

#[derive(Copy, Clone, Debug)]
pub struct PixelLocalStorageOptions {
    pub type_: PixelLocalStorageType,
    pub fragment_sync: FragmentSynchronizationType,
}

impl Default for PixelLocalStorageOptions {
    fn default() -> Self {
        PixelLocalStorageOptions {
            type_: PixelLocalStorageType::NotSupported,
            fragment_sync: FragmentSynchronizationType::NotSupported,
        }
    }
}

// Flags controlling the compilation.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    // The version of the input shader
    pub shader_version: i32,
    // How pixel local storage is lowered.
    pub pls: PixelLocalStorageOptions,
    // Workaround for drivers that produce bad results from packUnorm4x8 with non-highp inputs.
    pub pass_highp_to_pack_unorm_snorm_built_ins: bool,
    // Whether the IR is validated after the transformations.
    pub validate_ast: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            shader_version: 310,
            pls: PixelLocalStorageOptions::default(),
            pass_highp_to_pack_unorm_snorm_built_ins: false,
            validate_ast: true,
        }
    }
}

// The parts of ShBuiltInResources that the transformations use.
#[derive(Clone, Debug)]
pub struct Resources {
    pub max_combined_draw_buffers_and_pixel_local_storage_planes: u32,
}

impl Default for Resources {
    fn default() -> Self {
        Resources { max_combined_draw_buffers_and_pixel_local_storage_planes: 8 }
    }
}

// Whether the shader declares any pixel local storage plane.
fn uses_pixel_local_storage(ir: &IR) -> bool {
    ir.root.statements.iter().any(|statement| {
        statement.get_declared_variable().is_some_and(|id| util::is_pixel_local(&ir.meta, id))
    })
}

pub fn compile(ir: &mut IR, options: &CompileOptions, resources: &Resources) -> Result<(), Error> {
    if ir.meta.get_shader_type() == ShaderType::Fragment && uses_pixel_local_storage(ir) {
        debug!(
            "Lowering pixel local storage: {:?}, synchronization: {:?}",
            options.pls.type_, options.pls.fragment_sync
        );
        let transform_options = transform::rewrite_pixel_local_storage::Options {
            shader_version: options.shader_version,
            pls: options.pls,
            max_combined_draw_buffers_and_pixel_local_storage_planes: resources
                .max_combined_draw_buffers_and_pixel_local_storage_planes,
            pass_highp_to_pack_unorm_snorm_built_ins: options
                .pass_highp_to_pack_unorm_snorm_built_ins,
        };
        // Note: validation is part of the transformation.
        return transform::rewrite_pixel_local_storage::run(ir, &transform_options);
    }

    // http://anglebug.com/42265954: The ESSL spec has a bug with images as function arguments.
    // The recommended workaround is to inline functions that accept image arguments.
    if options.shader_version >= 310 {
        let transform_options = transform::monomorphize_unsupported_functions::Options {
            image: true,
            pixel_local_storage: false,
        };
        transform::monomorphize_unsupported_functions::run(ir, &transform_options)?;
    }

    if options.validate_ast {
        validator::validate(ir, &validator::Options { allow_pixel_local_storage: false })?;
    }
    Ok(())
}
