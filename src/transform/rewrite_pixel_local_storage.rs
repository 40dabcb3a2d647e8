// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Implement ANGLE_shader_pixel_local_storage on top of the strategy specified in the options;
// using storage images or framebuffer fetch.
//
// The traversal is common to both strategies: it finds the plane declarations and the
// pixelLocalLoadANGLE and pixelLocalStoreANGLE calls, and lets the strategy replace them.  The
// value of a store is first hoisted into a temporary, so that in
// `pixelLocalStoreANGLE(pls, pixelLocalLoadANGLE(pls2))`, the load happens _before_ any barrier or
// clamping the strategy adds for the store.

pub mod backing_store;
mod framebuffer_fetch;
mod image;

use crate::compile::{PixelLocalStorageOptions, PixelLocalStorageType};
use crate::ir::*;
use crate::traverser::transformer::{Transformer, Traverser};
use crate::traverser::{STOP, VISIT_CHILDREN, VisitAfter};
use crate::*;
use framebuffer_fetch::FramebufferFetchStrategy;
use image::ImageStrategy;
use log::debug;
use rustc_hash::FxHashMap;

pub struct Options {
    // The version of the shader, which determines the built-ins that can be generated.
    pub shader_version: i32,
    pub pls: PixelLocalStorageOptions,
    // Attachment locations are assigned backwards from this limit, if emulated with framebuffer
    // fetch.
    pub max_combined_draw_buffers_and_pixel_local_storage_planes: u32,
    // Driver bug workaround for packUnorm4x8 when given mediump input.
    pub pass_highp_to_pack_unorm_snorm_built_ins: bool,
}

enum Strategy {
    Image(ImageStrategy),
    FramebufferFetch(FramebufferFetchStrategy),
}

impl Strategy {
    fn new(options: &Options) -> Strategy {
        match options.pls.type_ {
            PixelLocalStorageType::ImageStoreR32PackedFormats
            | PixelLocalStorageType::ImageStoreNativeFormats => {
                Strategy::Image(ImageStrategy::new(options))
            }
            PixelLocalStorageType::FramebufferFetch => {
                Strategy::FramebufferFetch(FramebufferFetchStrategy::new(options))
            }
            PixelLocalStorageType::NotSupported => {
                panic!("Internal error: Pixel local storage is not supported by the backend")
            }
        }
    }

    fn declare(
        &mut self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        declaration: NodeId,
        pls: VariableId,
    ) {
        match self {
            Strategy::Image(images) => images.declare(ir_meta, transformer, declaration, pls),
            Strategy::FramebufferFetch(attachments) => {
                attachments.declare(ir_meta, transformer, declaration, pls)
            }
        }
    }

    // Declarations of anything other than planes.
    fn visit_declaration(
        &mut self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        declaration: NodeId,
        id: VariableId,
    ) -> VisitAfter {
        match self {
            Strategy::Image(_) => VISIT_CHILDREN,
            Strategy::FramebufferFetch(attachments) => {
                attachments.visit_declaration(ir_meta, transformer, declaration, id)
            }
        }
    }

    fn visit_symbol(
        &self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        symbol: NodeId,
        id: VariableId,
    ) {
        if let Strategy::FramebufferFetch(attachments) = self {
            attachments.visit_symbol(ir_meta, transformer, symbol, id);
        }
    }

    fn load(&self, ir_meta: &mut IRMeta, pls: VariableId) -> Expression {
        match self {
            Strategy::Image(images) => images.load(ir_meta, pls),
            Strategy::FramebufferFetch(attachments) => attachments.load(ir_meta, pls),
        }
    }

    fn store(
        &self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        store: NodeId,
        pls: VariableId,
        value: VariableId,
    ) {
        match self {
            Strategy::Image(images) => images.store(ir_meta, transformer, store, pls, value),
            Strategy::FramebufferFetch(attachments) => {
                attachments.store(ir_meta, transformer, store, pls, value)
            }
        }
    }

    // Code that needs to run before any pixel local storage access.
    fn setup_code(&self, ir_meta: &mut IRMeta) -> Vec<Statement> {
        match self {
            Strategy::Image(images) => images.setup_code(ir_meta),
            Strategy::FramebufferFetch(attachments) => attachments.setup_code(ir_meta),
        }
    }

    // Code that needs to run after all pixel local storage accesses.
    fn finalize_code(&self, ir_meta: &mut IRMeta) -> Vec<Statement> {
        match self {
            Strategy::Image(images) => images.finalize_code(ir_meta),
            Strategy::FramebufferFetch(attachments) => attachments.finalize_code(ir_meta),
        }
    }

    fn global_pixel_coord(&self) -> Option<VariableId> {
        match self {
            Strategy::Image(images) => images.global_pixel_coord(),
            Strategy::FramebufferFetch(_) => None,
        }
    }
}

struct RewriteTraverser<'a> {
    ir_meta: &'a mut IRMeta,
    strategy: Strategy,
}

fn get_plane(args: &[Expression]) -> VariableId {
    args.first().and_then(|arg| arg.get_symbol()).unwrap_or_else(|| {
        panic!("Internal error: Pixel local storage is accessed through an expression")
    })
}

impl RewriteTraverser<'_> {
    // Hoist the value of a store into a temp:
    //
    //     vec4 value = <value>;
    //
    // pixelLocalStoreANGLE returns void, so it's safe to evaluate its argument first even if the
    // store is short circuited.  Loads in the value are rewritten as part of the hoisted
    // declaration.
    fn hoist_store_value(
        &mut self,
        transformer: &mut Transformer,
        pls: VariableId,
        value: &Expression,
    ) -> VariableId {
        let precision = self.ir_meta.get_variable(pls).precision;
        let basic_type = util::get_image_basic_type(self.ir_meta, pls).get_basic_type();
        let type_id = self.ir_meta.get_vector_type_id(basic_type, 4);
        let temp = self.ir_meta.declare_temp_variable(
            "plsValue",
            type_id,
            precision,
            VariableScope::Local,
        );

        let value = util::duplicate_expression(self.ir_meta, value, &FxHashMap::default());
        let declaration = instruction::declaration(self.ir_meta, temp, Some(value));
        traverser::transformer::traverse_statement(self, transformer, &declaration);
        transformer.insert_statement_in_parent_block(declaration);
        temp
    }
}

impl Traverser for RewriteTraverser<'_> {
    fn visit_statement(
        &mut self,
        transformer: &mut Transformer,
        statement: &Statement,
    ) -> VisitAfter {
        let &StatementOp::Declaration(id, _) = &statement.op else {
            return VISIT_CHILDREN;
        };

        if util::is_pixel_local_array(self.ir_meta, id) {
            panic!("Internal error: Pixel local storage declared as an array");
        }
        if !util::is_pixel_local(self.ir_meta, id) {
            let node_id = statement.node_id;
            return self.strategy.visit_declaration(self.ir_meta, transformer, node_id, id);
        }

        // Function parameters are never visited here, and opaque types can otherwise only be
        // uniforms.
        if !self.ir_meta.get_variable(id).decorations.has(Decoration::Uniform) {
            panic!("Internal error: Pixel local storage declared without uniform");
        }

        self.strategy.declare(self.ir_meta, transformer, statement.node_id, id);
        STOP
    }

    fn visit_expression(
        &mut self,
        transformer: &mut Transformer,
        expression: &Expression,
    ) -> VisitAfter {
        match &expression.op {
            &ExpressionOp::Symbol(id) => {
                self.strategy.visit_symbol(self.ir_meta, transformer, expression.node_id, id);
                VISIT_CHILDREN
            }
            ExpressionOp::BuiltIn(BuiltInOpCode::PixelLocalLoadANGLE, args) => {
                let pls = get_plane(args);
                let replacement = self.strategy.load(self.ir_meta, pls);
                transformer.queue_expression_replacement(expression.node_id, replacement);
                // No need to recurse since this node is being dropped.
                STOP
            }
            ExpressionOp::BuiltIn(BuiltInOpCode::PixelLocalStoreANGLE, args) => {
                let pls = get_plane(args);
                let value = args.get(1).unwrap_or_else(|| {
                    panic!("Internal error: pixelLocalStoreANGLE without a value")
                });
                let value = self.hoist_store_value(transformer, pls, value);
                self.strategy.store(self.ir_meta, transformer, expression.node_id, pls, value);
                STOP
            }
            _ => VISIT_CHILDREN,
        }
    }
}

// Initialize the global pixel coord at the beginning of main():
//
//     pixelCoord = ivec2(floor(gl_FragCoord.xy));
//
fn init_global_pixel_coord(
    ir_meta: &mut IRMeta,
    coord: VariableId,
    shader_version: i32,
) -> Statement {
    let frag_coord = ir_meta.get_or_declare_built_in_variable(BuiltIn::FragCoord);
    let frag_coord = instruction::symbol(ir_meta, frag_coord);
    let xy = instruction::swizzle(ir_meta, frag_coord, &[0, 1]);
    let floored = instruction::built_in(ir_meta, BuiltInOpCode::Floor, vec![xy], shader_version);
    let value = instruction::construct(ir_meta, TYPE_ID_IVEC2, vec![floored]);
    let lhs = instruction::symbol(ir_meta, coord);
    instruction::assign_statement(ir_meta, lhs, value)
}

pub fn run(ir: &mut IR, options: &Options) -> Result<(), Error> {
    // If any functions take planes as arguments, monomorphize the functions by removing said
    // parameters and making the pixel local storage calls with the global uniform from the call
    // site instead.  This is necessary because function arguments don't carry the binding or
    // format layout qualifiers.
    transform::monomorphize_unsupported_functions::run(
        ir,
        &transform::monomorphize_unsupported_functions::Options {
            image: false,
            pixel_local_storage: true,
        },
    )?;

    debug!("Rewriting pixel local storage with {:?}", options.pls.type_);
    let mut transformer = Transformer::new();
    let strategy = {
        let mut rewriter =
            RewriteTraverser { ir_meta: &mut ir.meta, strategy: Strategy::new(options) };
        traverser::transformer::traverse_block(&mut rewriter, &mut transformer, &ir.root);
        rewriter.strategy
    };
    transformer.update_tree(&mut ir.root)?;

    // Inject the code that needs to run before and after all pixel local storage operations.
    //
    // TODO(http://anglebug.com/40096838): Inject these in a tight critical section, instead of
    // just locking the entire main() function:
    //
    //   - Monomorphize all pixel local storage calls into main().
    //   - Insert begin/end calls around the first/last calls (and outside of flow control).
    let setup = strategy.setup_code(&mut ir.meta);
    let finalize = strategy.finalize_code(&mut ir.meta);
    // The pixel coordinate is initialized before setup, which may use it.
    let coord_init = strategy
        .global_pixel_coord()
        .map(|coord| init_global_pixel_coord(&mut ir.meta, coord, options.shader_version));

    let main_body = ir.get_main_body_mut();
    main_body.insert_statements(0, setup);
    let end = main_body.statements.len();
    main_body.insert_statements(end, finalize);
    main_body.insert_statements(0, coord_init.into_iter().collect());

    validator::validate(ir, &validator::Options { allow_pixel_local_storage: false })?;
    Ok(())
}
