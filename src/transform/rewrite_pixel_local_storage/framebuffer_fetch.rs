// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Pixel local storage implemented with framebuffer fetch.  Every plane is replaced with an `inout`
// fragment output (the attachment), and a global that holds the plane's value while the shader
// runs.  The attachments are read once at the beginning of main() and written once at the end.

use super::backing_store::BackingStoreMap;
use super::Options;
use crate::compile::FragmentSynchronizationType;
use crate::ir::*;
use crate::traverser::transformer::Transformer;
use crate::traverser::{STOP, VISIT_CHILDREN, VisitAfter};
use crate::*;
use log::debug;
use rustc_hash::FxHashMap;

#[cfg_attr(debug_assertions, derive(Debug))]
struct Attachment {
    // The `inout` variable, always with 4 components.
    fragment_var: VariableId,
    // The variable that is accessed in place of the plane, with as many components as the
    // plane's format.
    access_var: VariableId,
}

pub struct FramebufferFetchStrategy {
    max_combined_draw_buffers_and_pixel_local_storage_planes: u32,
    fragment_sync: FragmentSynchronizationType,
    attachments: BackingStoreMap<Attachment>,
    // Outputs that were declared without a location, and their replacement with location 0.
    rewritten_outputs: FxHashMap<VariableId, VariableId>,
}

fn get_component_count(ir_meta: &IRMeta, id: VariableId) -> u32 {
    ir_meta.get_type(ir_meta.get_variable(id).type_id).get_total_component_count()
}

// Swizzles a variable down to the same number of components as the access variable.
fn swizzle_to_access_var(
    ir_meta: &mut IRMeta,
    id: VariableId,
    access_var: VariableId,
) -> Expression {
    let size = get_component_count(ir_meta, id);
    let access_size = get_component_count(ir_meta, access_var);
    let symbol = instruction::symbol(ir_meta, id);
    if size == access_size {
        return symbol;
    }
    debug_assert!(size > access_size);
    instruction::swizzle(ir_meta, symbol, &[0, 1, 2, 3][..access_size as usize])
}

// Expands the access variable to 4 components, regardless of the size of the plane's format:
//
//     vec4(access, 0, 0, 1)
//
fn expand_access_var(ir_meta: &mut IRMeta, access_var: VariableId) -> Expression {
    let symbol = instruction::symbol(ir_meta, access_var);
    if get_component_count(ir_meta, access_var) != 1 {
        return symbol;
    }

    let basic_type = ir_meta.get_basic_type(ir_meta.get_variable(access_var).type_id);
    let (zero, one) = match basic_type {
        BasicType::Float => (ConstantValue::Float(0.0), ConstantValue::Float(1.0)),
        BasicType::Int => (ConstantValue::Int(0), ConstantValue::Int(1)),
        BasicType::Uint => (ConstantValue::Uint(0), ConstantValue::Uint(1)),
        _ => panic!("Internal error: Unexpected pixel local storage type"),
    };
    let args = vec![
        symbol,
        instruction::constant(ir_meta, zero),
        instruction::constant(ir_meta, zero),
        instruction::constant(ir_meta, one),
    ];
    let type_id = ir_meta.get_vector_type_id(basic_type, 4);
    instruction::construct(ir_meta, type_id, args)
}

impl FramebufferFetchStrategy {
    pub fn new(options: &Options) -> FramebufferFetchStrategy {
        FramebufferFetchStrategy {
            max_combined_draw_buffers_and_pixel_local_storage_planes: options
                .max_combined_draw_buffers_and_pixel_local_storage_planes,
            fragment_sync: options.pls.fragment_sync,
            attachments: BackingStoreMap::new(),
            rewritten_outputs: FxHashMap::default(),
        }
    }

    // Replace the plane's declaration with an attachment:
    //
    //     layout(binding=N, rgba8) uniform pixelLocalANGLE pls;
    //
    // Into:
    //
    //     layout(location=MAX-N-1) inout vec4 pls;
    //     vec4 access;
    //
    pub fn declare(
        &mut self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        declaration: NodeId,
        pls: VariableId,
    ) {
        let binding = util::get_binding(ir_meta, pls);
        let format = util::get_image_internal_format(ir_meta, pls);
        let basic_type = util::get_image_basic_type(ir_meta, pls).get_basic_type();
        let plane = ir_meta.get_variable(pls);
        let (name, precision) = (plane.name, plane.precision);

        let access_type_id =
            ir_meta.get_scalar_or_vector_type_id(basic_type, format.component_count());
        let access_var = ir_meta.declare_temp_variable(
            "plsAccess",
            access_type_id,
            precision,
            VariableScope::Global,
        );

        // Planes are bound in reverse order from the rear, so they don't collide with the draw
        // buffers.
        let location = self
            .max_combined_draw_buffers_and_pixel_local_storage_planes
            .checked_sub(binding + 1)
            .unwrap_or_else(|| {
                panic!("Internal error: Pixel local storage binding {binding} is out of range")
            });
        let mut decorations =
            Decorations::new(vec![Decoration::InputOutput, Decoration::Location(location)]);
        if self.fragment_sync == FragmentSynchronizationType::NotSupported {
            // EXT_shader_framebuffer_fetch_non_coherent requires the "noncoherent" qualifier.
            decorations.add(Decoration::NonCoherent);
        }

        // Some drivers want fragment outputs to be 4-component vectors, and fail to compile
        // "inout uint".  The Metal translator also saturates color outputs to 4 components.
        let fragment_type_id = ir_meta.get_vector_type_id(basic_type, 4);
        let fragment_var = ir_meta.declare_variable(
            name,
            fragment_type_id,
            precision,
            decorations,
            None,
            VariableScope::Global,
        );

        debug!("Pixel local storage binding {binding} is replaced with attachment {location}");
        self.attachments.insert_new(binding, Attachment { fragment_var, access_var });

        let fragment_declaration = instruction::declaration(ir_meta, fragment_var, None);
        transformer.insert_statement_in_parent_block(fragment_declaration);
        let access_declaration = instruction::declaration(ir_meta, access_var, None);
        transformer.queue_statement_replacement(declaration, access_declaration);
    }

    // Since new outputs are introduced, all outputs are now required to declare a location.
    // Outputs that previously had a valid, unspecified location are rewritten to declare
    // location 0 explicitly.
    pub fn visit_declaration(
        &mut self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        declaration: NodeId,
        id: VariableId,
    ) -> VisitAfter {
        let variable = ir_meta.get_variable(id);
        if !variable.is_fragment_output() || variable.decorations.get_location().is_some() {
            return VISIT_CHILDREN;
        }

        let mut relocated = variable.clone();
        relocated.decorations.add(Decoration::Location(0));
        debug!("Output {} is assigned location 0", relocated.name.name);
        let relocated_id = ir_meta.add_variable(relocated);
        self.rewritten_outputs.insert(id, relocated_id);

        let replacement = instruction::declaration(ir_meta, relocated_id, None);
        transformer.queue_statement_replacement(declaration, replacement);
        STOP
    }

    pub fn visit_symbol(
        &self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        symbol: NodeId,
        id: VariableId,
    ) {
        if let Some(&relocated_id) = self.rewritten_outputs.get(&id) {
            let replacement = instruction::symbol(ir_meta, relocated_id);
            transformer.queue_expression_replacement(symbol, replacement);
        }
    }

    // Read the access variable.
    pub fn load(&self, ir_meta: &mut IRMeta, pls: VariableId) -> Expression {
        let attachment = self.attachments.find(util::get_binding(ir_meta, pls));
        expand_access_var(ir_meta, attachment.access_var)
    }

    // Set the access variable:
    //
    //     access = value.x
    //
    pub fn store(
        &self,
        ir_meta: &mut IRMeta,
        transformer: &mut Transformer,
        store: NodeId,
        pls: VariableId,
        value: VariableId,
    ) {
        let attachment = self.attachments.find(util::get_binding(ir_meta, pls));
        let lhs = instruction::symbol(ir_meta, attachment.access_var);
        let rhs = swizzle_to_access_var(ir_meta, value, attachment.access_var);
        let assignment = instruction::assign(ir_meta, lhs, rhs);
        transformer.queue_expression_replacement(store, assignment);
    }

    // It's unclear from EXT_shader_framebuffer_fetch whether inout fragment variables become
    // undefined if not explicitly written, but when this compiles to subpass loads in Vulkan, it's
    // definitely undefined behavior if they are not written.  To make sure every attachment gets
    // written, they are all read before pixel local storage operations, then all written back
    // after:
    //
    //     access = pls.x
    //
    pub fn setup_code(&self, ir_meta: &mut IRMeta) -> Vec<Statement> {
        self.attachments
            .binding_ordered()
            .map(|(_, attachment)| {
                let lhs = instruction::symbol(ir_meta, attachment.access_var);
                let rhs =
                    swizzle_to_access_var(ir_meta, attachment.fragment_var, attachment.access_var);
                instruction::assign_statement(ir_meta, lhs, rhs)
            })
            .collect()
    }

    //     pls.x = access
    //
    pub fn finalize_code(&self, ir_meta: &mut IRMeta) -> Vec<Statement> {
        self.attachments
            .binding_ordered()
            .map(|(_, attachment)| {
                let lhs =
                    swizzle_to_access_var(ir_meta, attachment.fragment_var, attachment.access_var);
                let rhs = instruction::symbol(ir_meta, attachment.access_var);
                instruction::assign_statement(ir_meta, lhs, rhs)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_access_is_expanded_and_swizzled() {
        let mut ir_meta = IRMeta::new(ShaderType::Fragment);
        let mut declare = |name, type_id| {
            ir_meta.declare_temp_variable(name, type_id, Precision::High, VariableScope::Global)
        };
        let access = declare("a", TYPE_ID_UINT);
        let fragment = declare("f", TYPE_ID_UVEC4);

        let expanded = expand_access_var(&mut ir_meta, access);
        assert_eq!(
            debug::expression_str(&ir_meta, &expanded),
            format!("uvec4(a_{}, 0u, 0u, 1u)", access.id)
        );

        let swizzled = swizzle_to_access_var(&mut ir_meta, fragment, access);
        assert_eq!(debug::expression_str(&ir_meta, &swizzled), format!("f_{}.x", fragment.id));
    }

    #[test]
    fn vector_access_is_used_as_is() {
        let mut ir_meta = IRMeta::new(ShaderType::Fragment);
        let scope = VariableScope::Global;
        let mut declare =
            |name| ir_meta.declare_temp_variable(name, TYPE_ID_IVEC4, Precision::High, scope);
        let access = declare("a");
        let fragment = declare("f");

        let expanded = expand_access_var(&mut ir_meta, access);
        assert!(expanded.get_symbol() == Some(access));
        let swizzled = swizzle_to_access_var(&mut ir_meta, fragment, access);
        assert!(swizzled.get_symbol() == Some(fragment));
    }
}
