// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Pixel local storage implemented with storage images.  Every plane is replaced with an image2D at
// the same binding, and loads and stores become imageLoad and imageStore at the fragment's pixel
// coordinate.  If the backend only supports r32* storage image formats, the 4x8 formats are packed
// into a single 32-bit channel.

use super::backing_store::BackingStoreMap;
use super::Options;
use crate::compile::{FragmentSynchronizationType, PixelLocalStorageType};
use crate::ir::*;
use crate::traverser::transformer::Transformer;
use crate::*;
use log::debug;

#[cfg_attr(debug_assertions, derive(Debug))]
struct PlaneImage {
    image: VariableId,
    // The format of the plane and of the image that replaces it.  They differ if the plane is
    // packed.
    plane_format: ImageInternalFormat,
    image_format: ImageInternalFormat,
    image_basic_type: ImageBasicType,
}

impl PlaneImage {
    fn is_packed(&self) -> bool {
        self.plane_format != self.image_format
    }
}

pub struct ImageStrategy {
    shader_version: i32,
    needs_r32_packing: bool,
    fragment_sync: FragmentSynchronizationType,
    pass_highp_to_pack_unorm_snorm_built_ins: bool,
    images: BackingStoreMap<PlaneImage>,
    // Stores the shader invocation's pixel coordinate as `ivec2(floor(gl_FragCoord.xy))`.
    global_pixel_coord: Option<VariableId>,
}

// The format and basic type of the image that replaces a plane of the given format.
fn get_image_format(
    format: ImageInternalFormat,
    needs_r32_packing: bool,
) -> (ImageInternalFormat, ImageBasicType) {
    match (format, needs_r32_packing) {
        (ImageInternalFormat::RGBA8, false) => (format, ImageBasicType::Float),
        (ImageInternalFormat::RGBA8, true) => (ImageInternalFormat::R32UI, ImageBasicType::Uint),
        (ImageInternalFormat::RGBA8I, false) => (format, ImageBasicType::Int),
        (ImageInternalFormat::RGBA8I, true) => (ImageInternalFormat::R32I, ImageBasicType::Int),
        (ImageInternalFormat::RGBA8UI, false) => (format, ImageBasicType::Uint),
        (ImageInternalFormat::RGBA8UI, true) => (ImageInternalFormat::R32UI, ImageBasicType::Uint),
        (ImageInternalFormat::R32F, _) => (format, ImageBasicType::Float),
        (ImageInternalFormat::R32I, _) => (format, ImageBasicType::Int),
        (ImageInternalFormat::R32UI, _) => (format, ImageBasicType::Uint),
    }
}

impl ImageStrategy {
    pub fn new(options: &Options) -> ImageStrategy {
        ImageStrategy {
            shader_version: options.shader_version,
            needs_r32_packing: options.pls.type_
                == PixelLocalStorageType::ImageStoreR32PackedFormats,
            fragment_sync: options.pls.fragment_sync,
            pass_highp_to_pack_unorm_snorm_built_ins: options
                .pass_highp_to_pack_unorm_snorm_built_ins,
            images: BackingStoreMap::new(),
            global_pixel_coord: None,
        }
    }

    pub fn global_pixel_coord(&self) -> Option<VariableId> {
        self.global_pixel_coord
    }

    fn get_global_pixel_coord(&self) -> VariableId {
        self.global_pixel_coord.unwrap_or_else(|| {
            panic!("Internal error: Pixel local storage is accessed before it is declared")
        })
    }

    // The pixel coordinate is declared as soon as a plane is seen, right before it.  It is
    // initialized at the beginning of main().
    fn ensure_global_pixel_coord_declared(
        &mut self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
    ) {
        if self.global_pixel_coord.is_some() {
            return;
        }
        let coord = ir_meta.declare_temp_variable(
            "pixelCoord",
            TYPE_ID_IVEC2,
            Precision::High,
            VariableScope::Global,
        );
        let declaration = instruction::declaration(ir_meta, coord, None);
        transformer.insert_statement_in_parent_block(declaration);
        self.global_pixel_coord = Some(coord);
    }

    // Replace the plane's declaration with an image2D:
    //
    //     layout(binding=N, rgba8) uniform pixelLocalANGLE pls;
    //
    // Into:
    //
    //     layout(binding=N, r32ui) coherent restrict highp uniform uimage2D pls;
    //
    pub fn declare(
        &mut self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        declaration: NodeId,
        pls: VariableId,
    ) {
        self.ensure_global_pixel_coord_declared(ir_meta, transformer);

        let binding = util::get_binding(ir_meta, pls);
        let plane_format = util::get_image_internal_format(ir_meta, pls);
        let (image_format, image_basic_type) =
            get_image_format(plane_format, self.needs_r32_packing);

        let plane = ir_meta.get_variable(pls);
        let name = plane.name;
        // Packed data needs all 32 bits.
        let is_packed = plane_format != image_format;
        let precision = if is_packed { Precision::High } else { plane.precision };

        // TODO(http://anglebug.com/40096838): If the plane is never loaded, the image could be
        // declared writeonly.  That needs a walk over the tree before the declarations are
        // replaced.
        let mut decorations = Decorations::new(vec![
            Decoration::Uniform,
            Decoration::Binding(binding),
            Decoration::ImageInternalFormat(image_format),
            Decoration::Coherent,
            Decoration::Restrict,
        ]);
        if self.fragment_sync.is_hardware_ordered() {
            decorations.add(Decoration::RasterOrdered);
        }

        let type_id = ir_meta
            .get_image_type_id(image_basic_type, ImageType::new_storage(ImageDimension::D2));
        let image = ir_meta.declare_variable(
            name,
            type_id,
            precision,
            decorations,
            None,
            VariableScope::Global,
        );

        debug!(
            "Pixel local storage binding {binding} ({}) is replaced with a {} image",
            plane_format.name(),
            image_format.name()
        );
        let plane_image = PlaneImage { image, plane_format, image_format, image_basic_type };
        self.images.insert_new(binding, plane_image);

        let replacement = instruction::declaration(ir_meta, image, None);
        transformer.queue_statement_replacement(declaration, replacement);
    }

    // Replace pixelLocalLoadANGLE(pls) with imageLoad(pls, pixelCoord), unpacked if necessary.
    pub fn load(&self, ir_meta: &mut IRMeta, pls: VariableId) -> Expression {
        let plane = self.images.find(util::get_binding(ir_meta, pls));
        let image = instruction::symbol(ir_meta, plane.image);
        let coord = instruction::symbol(ir_meta, self.get_global_pixel_coord());
        let data = instruction::built_in(
            ir_meta,
            BuiltInOpCode::ImageLoad,
            vec![image, coord],
            self.shader_version,
        );
        self.unpack_if_necessary(ir_meta, plane, data)
    }

    fn unpack_if_necessary(
        &self,
        ir_meta: &mut IRMeta,
        plane: &PlaneImage,
        data: Expression,
    ) -> Expression {
        if !plane.is_packed() {
            return data;
        }

        match plane.plane_format {
            ImageInternalFormat::RGBA8 => {
                // Unpack and normalize r,g,b,a from a single 32-bit unsigned int:
                //
                //     unpackUnorm4x8(data.x)
                //
                let packed = instruction::swizzle(ir_meta, data, &[0]);
                instruction::built_in(
                    ir_meta,
                    BuiltInOpCode::UnpackUnorm4x8,
                    vec![packed],
                    self.shader_version,
                )
            }
            ImageInternalFormat::RGBA8I | ImageInternalFormat::RGBA8UI => {
                // Unpack r,g,b,a from a single (signed or unsigned) 32-bit int.  Shift left, then
                // right, to preserve the sign for ints.  highp integers are exactly 32-bit, two's
                // complement.
                //
                //     data.xxxx << uvec4(24, 16, 8, 0) >> 24u
                //
                let broadcast = instruction::swizzle(ir_meta, data, &[0, 0, 0, 0]);
                let shifts = [24, 16, 8, 0]
                    .into_iter()
                    .map(|shift| instruction::uint(ir_meta, shift))
                    .collect();
                let shifts = instruction::construct(ir_meta, TYPE_ID_UVEC4, shifts);
                let shifted =
                    instruction::binary(ir_meta, BinaryOpCode::BitShiftLeft, broadcast, shifts);
                let byte_shift = instruction::uint(ir_meta, 24);
                instruction::binary(ir_meta, BinaryOpCode::BitShiftRight, shifted, byte_shift)
            }
            _ => panic!("Internal error: Unexpected packed pixel local storage format"),
        }
    }

    // Replace pixelLocalStoreANGLE(pls, value) with:
    //
    //     memoryBarrierImage();
    //     imageStore(pls, pixelCoord, value);
    //     memoryBarrierImage();
    //
    // with value clamped and packed as necessary.  The barriers make dependent stores and loads
    // in a single invocation coherent; "coherent" alone only guarantees that the stores are
    // visible to other invocations using similarly declared variables.
    pub fn store(
        &self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        store: NodeId,
        pls: VariableId,
        value: VariableId,
    ) {
        let plane = self.images.find(util::get_binding(ir_meta, pls));
        let data = self.clamp_and_pack_if_necessary(ir_meta, transformer, plane, value);

        let before = instruction::built_in_statement(
            ir_meta,
            BuiltInOpCode::MemoryBarrierImage,
            vec![],
            self.shader_version,
        );
        let after = instruction::built_in_statement(
            ir_meta,
            BuiltInOpCode::MemoryBarrierImage,
            vec![],
            self.shader_version,
        );
        transformer.insert_statements_in_parent_block(vec![before], vec![after]);

        let image = instruction::symbol(ir_meta, plane.image);
        let coord = instruction::symbol(ir_meta, self.get_global_pixel_coord());
        let image_store = instruction::built_in(
            ir_meta,
            BuiltInOpCode::ImageStore,
            vec![image, coord, data],
            self.shader_version,
        );
        transformer.queue_expression_replacement(store, image_store);
    }

    fn clamp_and_pack_if_necessary(
        &self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        plane: &PlaneImage,
        value: VariableId,
    ) -> Expression {
        // http://anglebug.com/42265993: Storing to integer formats with values larger than can be
        // represented is specified differently on different APIs.  Clamp integer formats here to
        // make it uniform and more GL-like.
        let clamped = match plane.plane_format {
            ImageInternalFormat::RGBA8I => {
                // value = clamp(value, -128, 127)
                let operand = instruction::symbol(ir_meta, value);
                let min = instruction::int(ir_meta, -128);
                let max = instruction::int(ir_meta, 127);
                Some(instruction::built_in(
                    ir_meta,
                    BuiltInOpCode::Clamp,
                    vec![operand, min, max],
                    self.shader_version,
                ))
            }
            ImageInternalFormat::RGBA8UI => {
                // value = min(value, 255u)
                let operand = instruction::symbol(ir_meta, value);
                let max = instruction::uint(ir_meta, 255);
                Some(instruction::built_in(
                    ir_meta,
                    BuiltInOpCode::Min,
                    vec![operand, max],
                    self.shader_version,
                ))
            }
            _ => None,
        };
        if let Some(clamped) = clamped {
            let lhs = instruction::symbol(ir_meta, value);
            let assignment = instruction::assign_statement(ir_meta, lhs, clamped);
            transformer.insert_statement_in_parent_block(assignment);
        }

        let result = instruction::symbol(ir_meta, value);
        if !plane.is_packed() {
            return result;
        }

        let packed = match plane.plane_format {
            ImageInternalFormat::RGBA8 => {
                let mut result = result;
                if self.pass_highp_to_pack_unorm_snorm_built_ins {
                    // http://anglebug.com/42265995: packUnorm4x8 doesn't work on Pixel 4 when
                    // passed a mediump vec4.  Use an intermediate highp vec4.
                    let highp = ir_meta.declare_temp_variable(
                        "packHighp",
                        TYPE_ID_VEC4,
                        Precision::High,
                        VariableScope::Local,
                    );
                    let declaration = instruction::declaration(ir_meta, highp, Some(result));
                    transformer.insert_statement_in_parent_block(declaration);
                    result = instruction::symbol(ir_meta, highp);
                }

                // Denormalize and pack r,g,b,a into a single 32-bit unsigned int:
                //
                //     packUnorm4x8(value)
                //
                instruction::built_in(
                    ir_meta,
                    BuiltInOpCode::PackUnorm4x8,
                    vec![result],
                    self.shader_version,
                )
            }
            ImageInternalFormat::RGBA8I | ImageInternalFormat::RGBA8UI => {
                if plane.plane_format == ImageInternalFormat::RGBA8I {
                    // Mask off extra sign bits beyond 8:
                    //
                    //     value &= 0xff
                    //
                    let lhs = instruction::symbol(ir_meta, value);
                    let mask = instruction::int(ir_meta, 0xff);
                    let masked =
                        instruction::compound_assign(ir_meta, BinaryOpCode::BitwiseAnd, lhs, mask);
                    let statement = instruction::expression_statement(ir_meta, masked);
                    transformer.insert_statement_in_parent_block(statement);
                }

                // Pack r,g,b,a into a single 32-bit (signed or unsigned) int:
                //
                //     value.x | (value.y << 8u) | (value.z << 16u) | (value.w << 24u)
                //
                let mut packed = instruction::swizzle(ir_meta, result, &[0]);
                for component in 1..4 {
                    let operand = instruction::symbol(ir_meta, value);
                    let channel = instruction::swizzle(ir_meta, operand, &[component]);
                    let shift = instruction::uint(ir_meta, component * 8);
                    let shifted =
                        instruction::binary(ir_meta, BinaryOpCode::BitShiftLeft, channel, shift);
                    packed = instruction::binary(ir_meta, BinaryOpCode::BitwiseOr, packed, shifted);
                }
                packed
            }
            _ => panic!("Internal error: Unexpected packed pixel local storage format"),
        };

        // Convert the packed data to a {u,i}vec4 for imageStore.
        let type_id = ir_meta.get_vector_type_id(plane.image_basic_type.get_basic_type(), 4);
        instruction::construct(ir_meta, type_id, vec![packed])
    }

    // Delimit the beginning of a per-pixel critical section, if supported.  This makes pixel local
    // storage coherent.  Rasterizer ordered images need no explicit synchronization calls.
    pub fn setup_code(&self, ir_meta: &mut IRMeta) -> Vec<Statement> {
        // With images, early_fragment_tests ensure that depth/stencil can also block stores to
        // pixel local storage.
        ir_meta.set_early_fragment_tests(true);

        let begin = match self.fragment_sync {
            FragmentSynchronizationType::NotSupported
            | FragmentSynchronizationType::RasterizerOrderViews_D3D
            | FragmentSynchronizationType::RasterOrderGroups_Metal => None,
            FragmentSynchronizationType::FragmentShaderInterlockNV_GL => {
                Some(BuiltInOpCode::BeginInvocationInterlockNV)
            }
            FragmentSynchronizationType::FragmentShaderOrderingINTEL_GL => {
                Some(BuiltInOpCode::BeginFragmentShaderOrderingINTEL)
            }
            FragmentSynchronizationType::FragmentShaderInterlockARB_GL => {
                Some(BuiltInOpCode::BeginInvocationInterlockARB)
            }
        };
        begin
            .map(|op| instruction::built_in_statement(ir_meta, op, vec![], self.shader_version))
            .into_iter()
            .collect()
    }

    // Delimit the end of the critical section, if required.
    pub fn finalize_code(&self, ir_meta: &mut IRMeta) -> Vec<Statement> {
        let end = match self.fragment_sync {
            FragmentSynchronizationType::NotSupported
            | FragmentSynchronizationType::RasterizerOrderViews_D3D
            | FragmentSynchronizationType::RasterOrderGroups_Metal
            // GL_INTEL_fragment_shader_ordering doesn't have an "end()" call.
            | FragmentSynchronizationType::FragmentShaderOrderingINTEL_GL => None,
            FragmentSynchronizationType::FragmentShaderInterlockNV_GL => {
                Some(BuiltInOpCode::EndInvocationInterlockNV)
            }
            FragmentSynchronizationType::FragmentShaderInterlockARB_GL => {
                Some(BuiltInOpCode::EndInvocationInterlockARB)
            }
        };
        end.map(|op| instruction::built_in_statement(ir_meta, op, vec![], self.shader_version))
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_remaps_4x8_formats_only() {
        assert!(
            get_image_format(ImageInternalFormat::RGBA8, true)
                == (ImageInternalFormat::R32UI, ImageBasicType::Uint)
        );
        assert!(
            get_image_format(ImageInternalFormat::RGBA8I, true)
                == (ImageInternalFormat::R32I, ImageBasicType::Int)
        );
        assert!(
            get_image_format(ImageInternalFormat::RGBA8UI, true)
                == (ImageInternalFormat::R32UI, ImageBasicType::Uint)
        );
        assert!(
            get_image_format(ImageInternalFormat::R32F, true)
                == (ImageInternalFormat::R32F, ImageBasicType::Float)
        );
        assert!(
            get_image_format(ImageInternalFormat::RGBA8, false)
                == (ImageInternalFormat::RGBA8, ImageBasicType::Float)
        );
        assert!(
            get_image_format(ImageInternalFormat::RGBA8I, false)
                == (ImageInternalFormat::RGBA8I, ImageBasicType::Int)
        );
    }
}
