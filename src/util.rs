// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Miscellaneous utility functions

use crate::ir::*;
use rustc_hash::FxHashMap;

// Whether the variable is a pixel local storage plane.
pub fn is_pixel_local(ir_meta: &IRMeta, id: VariableId) -> bool {
    ir_meta.get_type(ir_meta.get_variable(id).type_id).is_pixel_local()
}

// Whether the variable is an array of pixel local storage planes, which the extension forbids.
pub fn is_pixel_local_array(ir_meta: &IRMeta, id: VariableId) -> bool {
    let type_id = ir_meta.get_variable(id).type_id;
    ir_meta.get_type(type_id).is_array()
        && ir_meta.get_type(ir_meta.get_array_base_type_id(type_id)).is_pixel_local()
}

// The internal format of a pixel local storage plane (or storage image).  Every such variable is
// declared with one.
pub fn get_image_internal_format(ir_meta: &IRMeta, id: VariableId) -> ImageInternalFormat {
    ir_meta
        .get_variable(id)
        .decorations
        .get_image_internal_format()
        .unwrap_or_else(|| panic!("Internal error: Image declared without internal format"))
}

pub fn get_binding(ir_meta: &IRMeta, id: VariableId) -> u32 {
    ir_meta
        .get_variable(id)
        .decorations
        .get_binding()
        .unwrap_or_else(|| panic!("Internal error: Image declared without binding"))
}

pub fn get_image_basic_type(ir_meta: &IRMeta, id: VariableId) -> ImageBasicType {
    ir_meta.get_type(ir_meta.get_variable(id).type_id).get_image_type().0
}

// The type of the value an expression evaluates to.
pub fn get_expression_type(ir_meta: &IRMeta, expression: &Expression) -> TypeId {
    match &expression.op {
        &ExpressionOp::Symbol(id) => ir_meta.get_variable(id).type_id,
        ExpressionOp::Constant(value) => value.get_type_id(),
        ExpressionOp::Swizzle(operand, components) => {
            let scalar_type_id = ir_meta.get_scalar_type(get_expression_type(ir_meta, operand));
            if components.len() == 1 {
                scalar_type_id
            } else {
                ir_meta.get_vector_type_id_from_element_id(scalar_type_id, components.len() as u32)
            }
        }
        ExpressionOp::Unary(_, operand) => get_expression_type(ir_meta, operand),
        ExpressionOp::Binary(op, lhs, rhs) => {
            if op.is_comparison() || op.is_logical() {
                TYPE_ID_BOOL
            } else if op.is_shift() {
                get_expression_type(ir_meta, lhs)
            } else {
                // Arithmetic and bitwise operations between a scalar and a vector produce a vector.
                let lhs_type_id = get_expression_type(ir_meta, lhs);
                if ir_meta.get_type(lhs_type_id).is_vector() {
                    lhs_type_id
                } else {
                    get_expression_type(ir_meta, rhs)
                }
            }
        }
        ExpressionOp::Assign(lhs, _) | ExpressionOp::CompoundAssign(_, lhs, _) => {
            get_expression_type(ir_meta, lhs)
        }
        &ExpressionOp::Construct(type_id, _) => type_id,
        &ExpressionOp::Call(function_id, _) => ir_meta.get_function(function_id).return_type_id,
        ExpressionOp::BuiltIn(op, args) => get_built_in_result_type(ir_meta, *op, args),
        ExpressionOp::Ternary(_, true_expression, _) => {
            get_expression_type(ir_meta, true_expression)
        }
    }
}

fn get_built_in_result_type(ir_meta: &IRMeta, op: BuiltInOpCode, args: &[Expression]) -> TypeId {
    match op {
        BuiltInOpCode::PixelLocalLoadANGLE | BuiltInOpCode::ImageLoad => {
            let image_type_id = get_expression_type(ir_meta, &args[0]);
            let (basic_type, _) = ir_meta.get_type(image_type_id).get_image_type();
            ir_meta.get_vector_type_id(basic_type.get_basic_type(), 4)
        }
        BuiltInOpCode::Clamp | BuiltInOpCode::Min | BuiltInOpCode::Max | BuiltInOpCode::Floor => {
            get_expression_type(ir_meta, &args[0])
        }
        BuiltInOpCode::PackUnorm4x8 => TYPE_ID_UINT,
        BuiltInOpCode::UnpackUnorm4x8 => TYPE_ID_VEC4,
        BuiltInOpCode::PixelLocalStoreANGLE
        | BuiltInOpCode::ImageStore
        | BuiltInOpCode::MemoryBarrierImage
        | BuiltInOpCode::BeginInvocationInterlockNV
        | BuiltInOpCode::EndInvocationInterlockNV
        | BuiltInOpCode::BeginFragmentShaderOrderingINTEL
        | BuiltInOpCode::BeginInvocationInterlockARB
        | BuiltInOpCode::EndInvocationInterlockARB => TYPE_ID_VOID,
    }
}

// Deep copies of the tree.  Every node of the copy gets a fresh id.  Symbols found in
// `variable_map` are replaced with their mapping.  Local variables declared in the duplicated
// statements are duplicated too, and added to `variable_map` so that references to them in the
// copy use the new variables.
pub fn duplicate_expression(
    ir_meta: &mut IRMeta,
    expression: &Expression,
    variable_map: &FxHashMap<VariableId, VariableId>,
) -> Expression {
    let mut dup =
        |operand: &Expression| Box::new(duplicate_expression(ir_meta, operand, variable_map));

    let op = match &expression.op {
        ExpressionOp::Symbol(id) => ExpressionOp::Symbol(*variable_map.get(id).unwrap_or(id)),
        &ExpressionOp::Constant(value) => ExpressionOp::Constant(value),
        ExpressionOp::Swizzle(operand, components) => {
            ExpressionOp::Swizzle(dup(operand), components.clone())
        }
        &ExpressionOp::Unary(op, ref operand) => ExpressionOp::Unary(op, dup(operand)),
        &ExpressionOp::Binary(op, ref lhs, ref rhs) => {
            let lhs = dup(lhs);
            ExpressionOp::Binary(op, lhs, dup(rhs))
        }
        ExpressionOp::Assign(lhs, rhs) => {
            let lhs = dup(lhs);
            ExpressionOp::Assign(lhs, dup(rhs))
        }
        &ExpressionOp::CompoundAssign(op, ref lhs, ref rhs) => {
            let lhs = dup(lhs);
            ExpressionOp::CompoundAssign(op, lhs, dup(rhs))
        }
        &ExpressionOp::Construct(type_id, ref args) => {
            ExpressionOp::Construct(type_id, args.iter().map(|arg| *dup(arg)).collect())
        }
        &ExpressionOp::Call(function_id, ref args) => {
            ExpressionOp::Call(function_id, args.iter().map(|arg| *dup(arg)).collect())
        }
        &ExpressionOp::BuiltIn(op, ref args) => {
            ExpressionOp::BuiltIn(op, args.iter().map(|arg| *dup(arg)).collect())
        }
        ExpressionOp::Ternary(condition, true_expression, false_expression) => {
            let condition = dup(condition);
            let true_expression = dup(true_expression);
            ExpressionOp::Ternary(condition, true_expression, dup(false_expression))
        }
    };

    Expression::new(ir_meta.new_node_id(), op)
}

pub fn duplicate_statement(
    ir_meta: &mut IRMeta,
    statement: &Statement,
    variable_map: &mut FxHashMap<VariableId, VariableId>,
) -> Statement {
    let op = match &statement.op {
        &StatementOp::Declaration(id, ref initializer) => {
            let initializer = initializer
                .as_ref()
                .map(|expression| duplicate_expression(ir_meta, expression, variable_map));
            let variable = ir_meta.get_variable(id).clone();
            let new_id = ir_meta.add_variable(variable);
            variable_map.insert(id, new_id);
            StatementOp::Declaration(new_id, initializer)
        }
        StatementOp::Expression(expression) => {
            StatementOp::Expression(duplicate_expression(ir_meta, expression, variable_map))
        }
        StatementOp::Block(block) => {
            StatementOp::Block(duplicate_block(ir_meta, block, variable_map))
        }
        StatementOp::If(condition, true_block, false_block) => StatementOp::If(
            duplicate_expression(ir_meta, condition, variable_map),
            duplicate_block(ir_meta, true_block, variable_map),
            false_block.as_ref().map(|block| duplicate_block(ir_meta, block, variable_map)),
        ),
        StatementOp::Loop(loop_desc) => {
            let init = loop_desc
                .init
                .as_ref()
                .map(|init| Box::new(duplicate_statement(ir_meta, init, variable_map)));
            let condition = loop_desc
                .condition
                .as_ref()
                .map(|condition| duplicate_expression(ir_meta, condition, variable_map));
            let step = loop_desc
                .step
                .as_ref()
                .map(|step| duplicate_expression(ir_meta, step, variable_map));
            let body = duplicate_block(ir_meta, &loop_desc.body, variable_map);
            StatementOp::Loop(Loop { kind: loop_desc.kind, init, condition, step, body })
        }
        StatementOp::Return(value) => StatementOp::Return(
            value.as_ref().map(|value| duplicate_expression(ir_meta, value, variable_map)),
        ),
        StatementOp::Discard => StatementOp::Discard,
        StatementOp::Break => StatementOp::Break,
        StatementOp::Continue => StatementOp::Continue,
        StatementOp::FunctionDefinition(..) => {
            panic!("Internal error: Function definitions cannot be nested")
        }
    };

    Statement::new(ir_meta.new_node_id(), op)
}

pub fn duplicate_block(
    ir_meta: &mut IRMeta,
    block: &Block,
    variable_map: &mut FxHashMap<VariableId, VariableId>,
) -> Block {
    Block {
        statements: block
            .statements
            .iter()
            .map(|statement| duplicate_statement(ir_meta, statement, variable_map))
            .collect(),
    }
}

// Index of the statement in the root block that defines the function.
pub fn find_function_definition(root: &Block, id: FunctionId) -> Option<usize> {
    root.statements.iter().position(|statement| {
        matches!(statement.op, StatementOp::FunctionDefinition(function_id, _) if function_id == id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction;

    #[test]
    fn expression_types() {
        let mut ir_meta = IRMeta::new(ShaderType::Fragment);
        let scope = VariableScope::Local;
        let v = ir_meta.declare_temp_variable("v", TYPE_ID_UVEC4, Precision::High, scope);

        let symbol = instruction::symbol(&mut ir_meta, v);
        let yx = instruction::swizzle(&mut ir_meta, symbol, &[1, 0]);
        assert!(get_expression_type(&ir_meta, &yx) == TYPE_ID_UVEC2);

        let symbol = instruction::symbol(&mut ir_meta, v);
        let shift = instruction::uint(&mut ir_meta, 8);
        let shifted = instruction::binary(&mut ir_meta, BinaryOpCode::BitShiftLeft, symbol, shift);
        assert!(get_expression_type(&ir_meta, &shifted) == TYPE_ID_UVEC4);

        let scalar = instruction::uint(&mut ir_meta, 255);
        let symbol = instruction::symbol(&mut ir_meta, v);
        let masked = instruction::binary(&mut ir_meta, BinaryOpCode::BitwiseAnd, scalar, symbol);
        assert!(get_expression_type(&ir_meta, &masked) == TYPE_ID_UVEC4);

        let symbol = instruction::symbol(&mut ir_meta, v);
        let unpacked =
            instruction::built_in(&mut ir_meta, BuiltInOpCode::UnpackUnorm4x8, vec![symbol], 310);
        assert!(get_expression_type(&ir_meta, &unpacked) == TYPE_ID_VEC4);
    }

    #[test]
    fn duplicate_renumbers_nodes_and_remaps_variables() {
        let mut ir_meta = IRMeta::new(ShaderType::Fragment);
        let mut declare = |name, scope| {
            ir_meta.declare_temp_variable(name, TYPE_ID_INT, Precision::High, scope)
        };
        let param = declare("p", VariableScope::FunctionParam);
        let global = declare("g", VariableScope::Global);
        let local = declare("l", VariableScope::Local);

        let init = instruction::symbol(&mut ir_meta, param);
        let declaration = instruction::declaration(&mut ir_meta, local, Some(init));
        let lhs = instruction::symbol(&mut ir_meta, local);
        let rhs = instruction::int(&mut ir_meta, 1);
        let assignment = instruction::assign_statement(&mut ir_meta, lhs, rhs);
        let block = Block { statements: vec![declaration, assignment] };

        let mut variable_map = FxHashMap::default();
        variable_map.insert(param, global);
        let copy = duplicate_block(&mut ir_meta, &block, &mut variable_map);

        let new_local = variable_map[&local];
        assert!(new_local != local);
        assert!(copy.statements[0].node_id != block.statements[0].node_id);
        match &copy.statements[0].op {
            StatementOp::Declaration(id, Some(init)) => {
                assert!(*id == new_local);
                assert!(init.get_symbol() == Some(global));
            }
            _ => panic!("expected a declaration"),
        }
        match &copy.statements[1].op {
            StatementOp::Expression(Expression { op: ExpressionOp::Assign(lhs, _), .. }) => {
                assert!(lhs.get_symbol() == Some(new_local));
            }
            _ => panic!("expected an assignment"),
        }
    }
}
