// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Pixel local storage lowered to framebuffer fetch.

mod common;

use common::*;
use pls_lowering::compile::{FragmentSynchronizationType, PixelLocalStorageType};
use pls_lowering::emulator::{uvec4, vec4, Emulator};
use pls_lowering::ir::*;
use pls_lowering::transform::rewrite_pixel_local_storage;
use pls_lowering::*;

const PIXEL: (i32, i32) = (0, 3);

fn lower_with_framebuffer_fetch(ir: &mut IR) {
    lower(ir, PixelLocalStorageType::FramebufferFetch, FragmentSynchronizationType::NotSupported);
}

// The location of the attachment declared with the given name.
fn attachment_location(text: &str, name: &str) -> u32 {
    let suffix = format!(" inout vec4 {name};");
    let line = text
        .lines()
        .find(|line| line.ends_with(&suffix))
        .unwrap_or_else(|| panic!("{name} is not an attachment in {text}"));
    let start = line.find("location=").unwrap() + "location=".len();
    let end = start + line[start..].find(|c: char| !c.is_ascii_digit()).unwrap();
    line[start..end].parse().unwrap()
}

#[test]
fn planes_are_assigned_locations_from_the_back() {
    init_logging();
    let mut builder = fragment_builder();
    let planes = [
        declare_plane(&mut builder, "p0", ImageInternalFormat::RGBA8, 0),
        declare_plane(&mut builder, "p1", ImageInternalFormat::R32F, 1),
        declare_plane(&mut builder, "p2", ImageInternalFormat::RGBA8, 2),
    ];
    begin_main(&mut builder);
    for pls in planes {
        let load = builder.pixel_local_load(pls);
        let store = builder.pixel_local_store(pls, load);
        builder.add_expression_statement(store);
    }
    builder.end_function();
    let mut ir = builder.finish();

    lower_with_framebuffer_fetch(&mut ir);
    assert_no_pixel_local_storage(&ir);

    let text = debug::to_string(&ir);
    assert!(!text.contains("early_fragment_tests"));
    let locations = ["p0", "p1", "p2"].map(|name| attachment_location(&text, name));
    assert_eq!(locations, [7, 6, 5]);
    assert!(text.contains("layout(location=7, noncoherent) highp inout vec4 p0;"));
    // The access variable has as many components as the format.
    assert!(text.contains("highp float plsAccess_"));
}

#[test]
fn coherent_framebuffer_fetch_is_not_marked_noncoherent() {
    init_logging();
    let mut ir = store_then_load_shader(ImageInternalFormat::RGBA8, TYPE_ID_VEC4, |builder| {
        builder.vec4(0.0, 0.0, 0.0, 0.0)
    });
    lower(
        &mut ir,
        PixelLocalStorageType::FramebufferFetch,
        FragmentSynchronizationType::FragmentShaderInterlockNV_GL,
    );

    let text = debug::to_string(&ir);
    assert!(text.contains("layout(location=7) highp inout vec4 pls;"));
    assert!(!text.contains("InvocationInterlock"));
}

// layout(binding=0, rgba8ui) uniform upixelLocalANGLE a;
// layout(binding=1, r32ui) uniform upixelLocalANGLE b;
// void main() { pixelLocalStoreANGLE(a, pixelLocalLoadANGLE(a) + 1u); }
#[test]
fn every_attachment_is_preloaded_and_written_back() {
    init_logging();
    let mut builder = fragment_builder();
    let a = declare_plane(&mut builder, "a", ImageInternalFormat::RGBA8UI, 0);
    declare_plane(&mut builder, "b", ImageInternalFormat::R32UI, 1);
    begin_main(&mut builder);
    let load = builder.pixel_local_load(a);
    let one = builder.uint(1);
    let value = builder.binary(BinaryOpCode::Add, load, one);
    let store = builder.pixel_local_store(a, value);
    builder.add_expression_statement(store);
    builder.end_function();
    let mut ir = builder.finish();

    lower_with_framebuffer_fetch(&mut ir);

    // Setup and finalization happen in binding order.
    let lines = main_lines(&ir);
    assert!(lines[2].starts_with("plsAccess_") && lines[2].ends_with("= a;"));
    assert!(lines[3].starts_with("plsAccess_") && lines[3].ends_with("= b.x;"));
    let closing = lines.len() - 1;
    assert!(lines[closing - 2].starts_with("a = plsAccess_"));
    assert!(lines[closing - 1].starts_with("b.x = plsAccess_"));

    let mut emulator = Emulator::new(&ir, PIXEL);
    emulator.set_attachment(7, uvec4(1, 2, 3, 4));
    emulator.set_attachment(6, uvec4(9, 8, 7, 6));
    emulator.run().unwrap();
    assert_eq!(emulator.attachment(7), Some(&uvec4(2, 3, 4, 5)));
    assert_eq!(emulator.attachment(6), Some(&uvec4(9, 8, 7, 6)));
}

#[test]
fn single_channel_loads_are_expanded() {
    init_logging();
    let mut builder = fragment_builder();
    let a = declare_plane(&mut builder, "a", ImageInternalFormat::RGBA8UI, 0);
    let b = declare_plane(&mut builder, "b", ImageInternalFormat::R32UI, 1);
    begin_main(&mut builder);
    let load = builder.pixel_local_load(b);
    let store = builder.pixel_local_store(a, load);
    builder.add_expression_statement(store);
    builder.end_function();
    let mut ir = builder.finish();

    lower_with_framebuffer_fetch(&mut ir);
    assert!(debug::to_string(&ir).contains("= uvec4(plsAccess_"));

    let mut emulator = Emulator::new(&ir, PIXEL);
    emulator.set_attachment(6, uvec4(42, 8, 7, 6));
    emulator.run().unwrap();
    assert_eq!(emulator.attachment(7), Some(&uvec4(42, 0, 0, 1)));
}

// out vec4 color;
// layout(binding=0, rgba8) uniform pixelLocalANGLE pls;
// void main() { color = vec4(0.5); pixelLocalStoreANGLE(pls, vec4(1.0)); }
#[test]
fn outputs_without_location_move_to_location_zero() {
    init_logging();
    let mut builder = fragment_builder();
    let color = builder.declare_interface_variable(
        "color",
        TYPE_ID_VEC4,
        Precision::High,
        Decorations::new(vec![Decoration::Output]),
    );
    let pls = declare_plane(&mut builder, "pls", ImageInternalFormat::RGBA8, 0);
    begin_main(&mut builder);
    let value = builder.vec4(0.5, 0.5, 0.5, 0.5);
    let assignment = builder.assign(color, value);
    builder.add_expression_statement(assignment);
    let value = builder.vec4(1.0, 1.0, 1.0, 1.0);
    let store = builder.pixel_local_store(pls, value);
    builder.add_expression_statement(store);
    builder.end_function();
    let mut ir = builder.finish();

    lower_with_framebuffer_fetch(&mut ir);
    assert_no_pixel_local_storage(&ir);

    let text = debug::to_string(&ir);
    assert!(text.contains("layout(location=0) highp out vec4 color;"));
    assert_eq!(text.matches("out vec4 color;").count(), 1);

    let mut emulator = Emulator::new(&ir, PIXEL);
    emulator.set_attachment(7, vec4(0.0, 0.0, 0.0, 0.0));
    emulator.run().unwrap();
    assert_eq!(emulator.attachment(0), Some(&vec4(0.5, 0.5, 0.5, 0.5)));
    assert_eq!(emulator.attachment(7), Some(&vec4(1.0, 1.0, 1.0, 1.0)));
}

#[test]
fn outputs_with_location_are_kept() {
    init_logging();
    let mut ir = store_then_load_shader(ImageInternalFormat::RGBA8, TYPE_ID_VEC4, |builder| {
        builder.vec4(0.25, 0.25, 0.25, 0.25)
    });
    let before = ir.meta.all_variables().len();
    lower_with_framebuffer_fetch(&mut ir);

    let text = debug::to_string(&ir);
    assert!(text.contains("layout(location=0) highp out vec4 color;"));
    // The attachment, its access variable and the hoisted store value.
    assert_eq!(ir.meta.all_variables().len(), before + 3);

    // Values are not quantized while they are held in the access variable.
    let mut emulator = Emulator::new(&ir, PIXEL);
    emulator.run().unwrap();
    assert_eq!(emulator.attachment(0), Some(&vec4(0.25, 0.25, 0.25, 0.25)));
}

#[test]
#[should_panic(expected = "out of range")]
fn binding_beyond_the_attachment_limit_is_a_defect() {
    let mut builder = fragment_builder();
    declare_plane(&mut builder, "pls", ImageInternalFormat::RGBA8, 8);
    begin_main(&mut builder);
    builder.end_function();
    let mut ir = builder.finish();

    let options =
        options(PixelLocalStorageType::FramebufferFetch, FragmentSynchronizationType::NotSupported);
    let _ = rewrite_pixel_local_storage::run(&mut ir, &options);
}
