// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Helpers shared by the pixel local storage tests.

#![allow(dead_code)]

use pls_lowering::builder::Builder;
use pls_lowering::compile::{
    FragmentSynchronizationType, PixelLocalStorageOptions, PixelLocalStorageType,
};
use pls_lowering::ir::*;
use pls_lowering::transform::rewrite_pixel_local_storage::{self, Options};
use pls_lowering::*;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn options(
    type_: PixelLocalStorageType,
    fragment_sync: FragmentSynchronizationType,
) -> Options {
    Options {
        shader_version: 310,
        pls: PixelLocalStorageOptions { type_, fragment_sync },
        max_combined_draw_buffers_and_pixel_local_storage_planes: 8,
        pass_highp_to_pack_unorm_snorm_built_ins: false,
    }
}

pub fn lower(
    ir: &mut IR,
    type_: PixelLocalStorageType,
    fragment_sync: FragmentSynchronizationType,
) {
    rewrite_pixel_local_storage::run(ir, &options(type_, fragment_sync)).unwrap();
}

pub fn fragment_builder() -> Builder {
    Builder::new(ShaderType::Fragment, 310)
}

pub fn begin_main(builder: &mut Builder) {
    let main_id = builder.new_function("main", vec![], TYPE_ID_VOID);
    builder.begin_function(main_id);
}

// The basic type a plane of the given format is declared with.
pub fn plane_basic_type(format: ImageInternalFormat) -> ImageBasicType {
    match format {
        ImageInternalFormat::RGBA8 | ImageInternalFormat::R32F => ImageBasicType::Float,
        ImageInternalFormat::RGBA8I | ImageInternalFormat::R32I => ImageBasicType::Int,
        ImageInternalFormat::RGBA8UI | ImageInternalFormat::R32UI => ImageBasicType::Uint,
    }
}

pub fn declare_plane(
    builder: &mut Builder,
    name: &'static str,
    format: ImageInternalFormat,
    binding: u32,
) -> VariableId {
    builder.declare_pixel_local_storage(
        name,
        plane_basic_type(format),
        format,
        binding,
        Precision::High,
    )
}

// `out <type> color;` at location 0.
pub fn declare_color(builder: &mut Builder, type_id: TypeId) -> VariableId {
    builder.declare_interface_variable(
        "color",
        type_id,
        Precision::High,
        Decorations::new(vec![Decoration::Output, Decoration::Location(0)]),
    )
}

// layout(binding=0, <format>) uniform pixelLocalANGLE pls;
// out <type> color;
// void main()
// {
//     pixelLocalStoreANGLE(pls, <value>);
//     color = pixelLocalLoadANGLE(pls);
// }
pub fn store_then_load_shader<F>(
    format: ImageInternalFormat,
    color_type_id: TypeId,
    value: F,
) -> IR
where
    F: FnOnce(&mut Builder) -> Expression,
{
    let mut builder = fragment_builder();
    let pls = declare_plane(&mut builder, "pls", format, 0);
    let color = declare_color(&mut builder, color_type_id);
    begin_main(&mut builder);
    let value = value(&mut builder);
    let store = builder.pixel_local_store(pls, value);
    builder.add_expression_statement(store);
    let load = builder.pixel_local_load(pls);
    let assignment = builder.assign(color, load);
    builder.add_expression_statement(assignment);
    builder.end_function();
    builder.finish()
}

// The lines of main(), trimmed.
pub fn main_lines(ir: &IR) -> Vec<String> {
    let text = debug::to_string(ir);
    let start = text.find("void main()").unwrap();
    text[start..].lines().map(|line| line.trim().to_string()).collect()
}

// The index of the first line that contains `pattern`.
pub fn line_index(lines: &[String], pattern: &str) -> usize {
    lines
        .iter()
        .position(|line| line.contains(pattern))
        .unwrap_or_else(|| panic!("no line contains {pattern:?} in {lines:#?}"))
}

pub fn assert_no_pixel_local_storage(ir: &IR) {
    let text = debug::to_string(ir);
    assert!(!text.contains("pixelLocal"), "{text}");
    validator::validate(ir, &validator::Options { allow_pixel_local_storage: false }).unwrap();
}
