// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Pixel local storage lowered to storage images, checked by inspecting the generated code and by
// running it for a single pixel.

mod common;

use common::*;
use pls_lowering::builder::Builder;
use pls_lowering::compile::{
    self, CompileOptions, FragmentSynchronizationType, PixelLocalStorageOptions,
    PixelLocalStorageType, Resources,
};
use pls_lowering::emulator::{ivec4, uvec4, vec4, Emulator};
use pls_lowering::ir::*;
use pls_lowering::transform::rewrite_pixel_local_storage;
use pls_lowering::*;

const PIXEL: (i32, i32) = (5, 9);

const IMAGE_TYPES: [PixelLocalStorageType; 2] = [
    PixelLocalStorageType::ImageStoreR32PackedFormats,
    PixelLocalStorageType::ImageStoreNativeFormats,
];

#[test]
fn every_plane_becomes_an_image_at_its_binding() {
    init_logging();
    let mut builder = fragment_builder();
    let float_plane = declare_plane(&mut builder, "f", ImageInternalFormat::RGBA8, 2);
    let int_plane = declare_plane(&mut builder, "i", ImageInternalFormat::RGBA8I, 0);
    let single_plane = declare_plane(&mut builder, "s", ImageInternalFormat::R32F, 1);
    begin_main(&mut builder);
    for pls in [float_plane, int_plane, single_plane] {
        let load = builder.pixel_local_load(pls);
        let store = builder.pixel_local_store(pls, load);
        builder.add_expression_statement(store);
    }
    builder.end_function();
    let mut ir = builder.finish();

    lower(
        &mut ir,
        PixelLocalStorageType::ImageStoreR32PackedFormats,
        FragmentSynchronizationType::FragmentShaderInterlockARB_GL,
    );

    assert_no_pixel_local_storage(&ir);
    let text = debug::to_string(&ir);
    assert!(text.starts_with("layout(early_fragment_tests) in;"));
    assert!(text.contains("layout(binding=2, r32ui) coherent restrict highp uniform uimage2D f;"));
    assert!(text.contains("layout(binding=0, r32i) coherent restrict highp uniform iimage2D i;"));
    assert!(text.contains("layout(binding=1, r32f) coherent restrict highp uniform image2D s;"));
    // A single pixel coordinate is shared by all planes.
    assert_eq!(text.matches("highp ivec2 pixelCoord_").count(), 1);
}

#[test]
fn native_formats_are_kept() {
    init_logging();
    let mut ir = store_then_load_shader(ImageInternalFormat::RGBA8I, TYPE_ID_IVEC4, |builder| {
        builder.ivec4(1, 2, 3, 4)
    });
    lower(
        &mut ir,
        PixelLocalStorageType::ImageStoreNativeFormats,
        FragmentSynchronizationType::NotSupported,
    );

    let text = debug::to_string(&ir);
    let declaration = "layout(binding=0, rgba8i) coherent restrict highp uniform iimage2D pls;";
    assert!(text.contains(declaration));
    assert!(!text.contains("<< uvec4("));
}

#[test]
fn rgba8_round_trips_through_the_image() {
    init_logging();
    for type_ in IMAGE_TYPES {
        let mut ir = store_then_load_shader(ImageInternalFormat::RGBA8, TYPE_ID_VEC4, |builder| {
            builder.vec4(0.25, 0.5, 0.75, 1.0)
        });
        lower(&mut ir, type_, FragmentSynchronizationType::FragmentShaderInterlockNV_GL);

        let mut emulator = Emulator::new(&ir, PIXEL);
        emulator.run().unwrap();

        let expected = vec4(64.0 / 255.0, 128.0 / 255.0, 191.0 / 255.0, 1.0);
        assert_eq!(emulator.attachment(0), Some(&expected), "{type_:?}");

        let texel = emulator.image_texel(0, PIXEL).unwrap();
        if type_ == PixelLocalStorageType::ImageStoreR32PackedFormats {
            let packed = 64 | 128 << 8 | 191 << 16 | 255 << 24;
            assert_eq!(texel, &uvec4(packed, 0, 0, 1));
        } else {
            assert_eq!(texel, &expected);
        }
    }
}

#[test]
fn rgba8i_stores_are_clamped() {
    init_logging();
    for type_ in IMAGE_TYPES {
        let mut ir = store_then_load_shader(ImageInternalFormat::RGBA8I, TYPE_ID_IVEC4, |builder| {
            builder.ivec4(200, -200, 5, -5)
        });
        lower(&mut ir, type_, FragmentSynchronizationType::FragmentShaderInterlockNV_GL);

        let mut emulator = Emulator::new(&ir, PIXEL);
        emulator.run().unwrap();
        assert_eq!(emulator.attachment(0), Some(&ivec4(127, -128, 5, -5)), "{type_:?}");
    }
}

#[test]
fn rgba8ui_stores_are_clamped() {
    init_logging();
    for type_ in IMAGE_TYPES {
        let mut ir = store_then_load_shader(ImageInternalFormat::RGBA8UI, TYPE_ID_UVEC4, |builder| {
            builder.uvec4(300, 255, 0, 1000)
        });
        lower(&mut ir, type_, FragmentSynchronizationType::FragmentShaderInterlockNV_GL);

        let mut emulator = Emulator::new(&ir, PIXEL);
        emulator.run().unwrap();
        assert_eq!(emulator.attachment(0), Some(&uvec4(255, 255, 0, 255)), "{type_:?}");
    }
}

// layout(binding=0, rgba8ui) uniform upixelLocalANGLE a;
// layout(binding=1, rgba8ui) uniform upixelLocalANGLE b;
// void main() { pixelLocalStoreANGLE(a, pixelLocalLoadANGLE(b) + 1u); }
#[test]
fn load_in_store_value_happens_before_the_store() {
    init_logging();
    let mut builder = fragment_builder();
    let a = declare_plane(&mut builder, "a", ImageInternalFormat::RGBA8UI, 0);
    let b = declare_plane(&mut builder, "b", ImageInternalFormat::RGBA8UI, 1);
    begin_main(&mut builder);
    let load = builder.pixel_local_load(b);
    let one = builder.uint(1);
    let value = builder.binary(BinaryOpCode::Add, load, one);
    let store = builder.pixel_local_store(a, value);
    builder.add_expression_statement(store);
    builder.end_function();
    let mut ir = builder.finish();

    lower(
        &mut ir,
        PixelLocalStorageType::ImageStoreNativeFormats,
        FragmentSynchronizationType::NotSupported,
    );

    let lines = main_lines(&ir);
    let load = line_index(&lines, "imageLoad(b, pixelCoord_");
    let clamp = line_index(&lines, "min(plsValue_");
    let barrier = line_index(&lines, "memoryBarrierImage();");
    let store = line_index(&lines, "imageStore(a, pixelCoord_");
    assert!(lines[load].contains("highp uvec4 plsValue_"));
    assert!(load < clamp && clamp < barrier && barrier < store);
    assert_eq!(lines[store + 1], "memoryBarrierImage();");

    let mut emulator = Emulator::new(&ir, PIXEL);
    emulator.set_image_texel(1, PIXEL, uvec4(10, 20, 30, 255));
    emulator.run().unwrap();
    assert_eq!(emulator.image_texel(0, PIXEL), Some(&uvec4(11, 21, 31, 255)));
    assert_eq!(emulator.image_texel(1, PIXEL), Some(&uvec4(10, 20, 30, 255)));
}

#[test]
fn critical_section_matches_the_synchronization_type() {
    init_logging();
    let cases = [
        (
            FragmentSynchronizationType::FragmentShaderInterlockNV_GL,
            Some("beginInvocationInterlockNV();"),
            Some("endInvocationInterlockNV();"),
        ),
        (
            FragmentSynchronizationType::FragmentShaderOrderingINTEL_GL,
            Some("beginFragmentShaderOrderingINTEL();"),
            None,
        ),
        (
            FragmentSynchronizationType::FragmentShaderInterlockARB_GL,
            Some("beginInvocationInterlockARB();"),
            Some("endInvocationInterlockARB();"),
        ),
        (FragmentSynchronizationType::RasterizerOrderViews_D3D, None, None),
        (FragmentSynchronizationType::RasterOrderGroups_Metal, None, None),
        (FragmentSynchronizationType::NotSupported, None, None),
    ];

    for (fragment_sync, begin, end) in cases {
        let mut ir = store_then_load_shader(ImageInternalFormat::RGBA8, TYPE_ID_VEC4, |builder| {
            builder.vec4(0.0, 0.0, 0.0, 0.0)
        });
        lower(&mut ir, PixelLocalStorageType::ImageStoreNativeFormats, fragment_sync);

        let lines = main_lines(&ir);
        // void main(), {, the pixel coordinate, then the beginning of the critical section.
        let after_setup = match begin {
            Some(begin) => {
                assert_eq!(lines[3], begin, "{fragment_sync:?}");
                4
            }
            None => 3,
        };
        assert!(lines[after_setup].contains("plsValue_"), "{fragment_sync:?}");

        let closing = lines.len() - 1;
        assert_eq!(lines[closing], "}");
        match end {
            Some(end) => assert_eq!(lines[closing - 1], end, "{fragment_sync:?}"),
            None => assert!(!lines[closing - 1].contains("Interlock"), "{fragment_sync:?}"),
        }

        let text = debug::to_string(&ir);
        assert_eq!(
            text.contains("layout(binding=0, rgba8, raster_ordered)"),
            fragment_sync.is_hardware_ordered(),
            "{fragment_sync:?}"
        );
    }
}

#[test]
fn highp_copy_is_packed_when_requested() {
    init_logging();
    for workaround in [false, true] {
        let mut builder = fragment_builder();
        let pls = builder.declare_pixel_local_storage(
            "pls",
            ImageBasicType::Float,
            ImageInternalFormat::RGBA8,
            0,
            Precision::Medium,
        );
        begin_main(&mut builder);
        let value = builder.vec4(1.0, 0.0, 1.0, 0.0);
        let store = builder.pixel_local_store(pls, value);
        builder.add_expression_statement(store);
        builder.end_function();
        let mut ir = builder.finish();

        let mut options = options(
            PixelLocalStorageType::ImageStoreR32PackedFormats,
            FragmentSynchronizationType::NotSupported,
        );
        options.pass_highp_to_pack_unorm_snorm_built_ins = workaround;
        rewrite_pixel_local_storage::run(&mut ir, &options).unwrap();

        let text = debug::to_string(&ir);
        assert!(text.contains("mediump vec4 plsValue_"));
        assert_eq!(text.contains("highp vec4 packHighp_"), workaround);
        assert_eq!(text.contains("packUnorm4x8(packHighp_"), workaround);
        assert_eq!(text.contains("packUnorm4x8(plsValue_"), !workaround);

        let mut emulator = Emulator::new(&ir, PIXEL);
        emulator.run().unwrap();
        assert_eq!(emulator.image_texel(0, PIXEL), Some(&uvec4(0x00ff00ff, 0, 0, 1)));
    }
}

// void bump(pixelLocalANGLE p) { pixelLocalStoreANGLE(p, pixelLocalLoadANGLE(p) + 0.25); }
// void main() { bump(pls); bump(pls); }
#[test]
fn planes_passed_to_functions_are_lowered() {
    init_logging();
    let mut builder = fragment_builder();
    let pls = declare_plane(&mut builder, "pls", ImageInternalFormat::RGBA8, 0);
    let pls_type = builder.meta().get_variable(pls).type_id;
    let bump = builder.new_function(
        "bump",
        vec![("p", pls_type, Precision::High, FunctionParamDirection::Input)],
        TYPE_ID_VOID,
    );
    let p = builder.param(bump, 0);
    builder.begin_function(bump);
    let load = builder.pixel_local_load(p);
    let quarter = builder.float(0.25);
    let value = builder.binary(BinaryOpCode::Add, load, quarter);
    let store = builder.pixel_local_store(p, value);
    builder.add_expression_statement(store);
    builder.end_function();
    begin_main(&mut builder);
    for _ in 0..2 {
        let arg = builder.variable(pls);
        let call = builder.call(bump, vec![arg]);
        builder.add_expression_statement(call);
    }
    builder.end_function();
    let mut ir = builder.finish();

    lower(
        &mut ir,
        PixelLocalStorageType::ImageStoreNativeFormats,
        FragmentSynchronizationType::FragmentShaderInterlockNV_GL,
    );
    assert_no_pixel_local_storage(&ir);

    let mut emulator = Emulator::new(&ir, PIXEL);
    emulator.run().unwrap();
    let expected = vec4(128.0 / 255.0, 128.0 / 255.0, 128.0 / 255.0, 128.0 / 255.0);
    assert_eq!(emulator.image_texel(0, PIXEL), Some(&expected));
}

#[test]
fn texels_of_other_pixels_are_untouched() {
    init_logging();
    let mut ir = store_then_load_shader(ImageInternalFormat::RGBA8UI, TYPE_ID_UVEC4, |builder| {
        builder.uvec4(1, 2, 3, 4)
    });
    lower(
        &mut ir,
        PixelLocalStorageType::ImageStoreR32PackedFormats,
        FragmentSynchronizationType::NotSupported,
    );

    let neighbor = (PIXEL.0 + 1, PIXEL.1);
    let mut emulator = Emulator::new(&ir, PIXEL);
    emulator.set_image_texel(0, neighbor, uvec4(7, 0, 0, 1));
    emulator.run().unwrap();
    assert_eq!(emulator.image_texel(0, neighbor), Some(&uvec4(7, 0, 0, 1)));
    assert_eq!(emulator.image_texel(0, PIXEL), Some(&uvec4(0x04030201, 0, 0, 1)));
}

#[test]
fn compile_lowers_shaders_with_planes_only() {
    init_logging();
    let options = CompileOptions {
        pls: PixelLocalStorageOptions {
            type_: PixelLocalStorageType::ImageStoreNativeFormats,
            fragment_sync: FragmentSynchronizationType::FragmentShaderInterlockNV_GL,
        },
        ..CompileOptions::default()
    };

    let mut ir = store_then_load_shader(ImageInternalFormat::R32UI, TYPE_ID_UVEC4, |builder| {
        builder.uvec4(9, 0, 0, 0)
    });
    compile::compile(&mut ir, &options, &Resources::default()).unwrap();
    assert_no_pixel_local_storage(&ir);
    let mut emulator = Emulator::new(&ir, PIXEL);
    emulator.run().unwrap();
    assert_eq!(emulator.attachment(0), Some(&uvec4(9, 0, 0, 1)));

    let mut builder = fragment_builder();
    let color = declare_color(&mut builder, TYPE_ID_VEC4);
    begin_main(&mut builder);
    let value = builder.vec4(0.5, 0.5, 0.5, 1.0);
    let assignment = builder.assign(color, value);
    builder.add_expression_statement(assignment);
    builder.end_function();
    let mut ir = builder.finish();
    let before = debug::to_string(&ir);
    compile::compile(&mut ir, &options, &Resources::default()).unwrap();
    assert_eq!(debug::to_string(&ir), before);

    // Only fragment shaders can declare planes; other stages pass through.
    let mut builder = Builder::new(ShaderType::Vertex, 310);
    begin_main(&mut builder);
    builder.end_function();
    let mut ir = builder.finish();
    let before = debug::to_string(&ir);
    compile::compile(&mut ir, &options, &Resources::default()).unwrap();
    assert_eq!(debug::to_string(&ir), before);
}
