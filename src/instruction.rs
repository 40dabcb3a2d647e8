// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Helper functions to create expressions and statements given parameters.  Every node is given a
// fresh node id from the IR meta, so transformations never construct nodes by hand.

use crate::ir::*;
use smallvec::SmallVec;

pub fn symbol(ir_meta: &mut IRMeta, id: VariableId) -> Expression {
    Expression::new(ir_meta.new_node_id(), ExpressionOp::Symbol(id))
}

pub fn constant(ir_meta: &mut IRMeta, value: ConstantValue) -> Expression {
    Expression::new(ir_meta.new_node_id(), ExpressionOp::Constant(value))
}
pub fn float(ir_meta: &mut IRMeta, value: f32) -> Expression {
    constant(ir_meta, ConstantValue::Float(value))
}
pub fn int(ir_meta: &mut IRMeta, value: i32) -> Expression {
    constant(ir_meta, ConstantValue::Int(value))
}
pub fn uint(ir_meta: &mut IRMeta, value: u32) -> Expression {
    constant(ir_meta, ConstantValue::Uint(value))
}
pub fn boolean(ir_meta: &mut IRMeta, value: bool) -> Expression {
    constant(ir_meta, ConstantValue::Bool(value))
}

pub fn swizzle(ir_meta: &mut IRMeta, operand: Expression, components: &[u32]) -> Expression {
    debug_assert!(!components.is_empty() && components.len() <= 4);
    debug_assert!(components.iter().all(|&component| component < 4));
    Expression::new(
        ir_meta.new_node_id(),
        ExpressionOp::Swizzle(Box::new(operand), SmallVec::from_slice(components)),
    )
}

pub fn unary(ir_meta: &mut IRMeta, op: UnaryOpCode, operand: Expression) -> Expression {
    Expression::new(ir_meta.new_node_id(), ExpressionOp::Unary(op, Box::new(operand)))
}

pub fn binary(
    ir_meta: &mut IRMeta,
    op: BinaryOpCode,
    lhs: Expression,
    rhs: Expression,
) -> Expression {
    Expression::new(ir_meta.new_node_id(), ExpressionOp::Binary(op, Box::new(lhs), Box::new(rhs)))
}

pub fn assign(ir_meta: &mut IRMeta, lhs: Expression, rhs: Expression) -> Expression {
    Expression::new(ir_meta.new_node_id(), ExpressionOp::Assign(Box::new(lhs), Box::new(rhs)))
}

pub fn compound_assign(
    ir_meta: &mut IRMeta,
    op: BinaryOpCode,
    lhs: Expression,
    rhs: Expression,
) -> Expression {
    debug_assert!(!op.is_comparison() && !op.is_logical());
    Expression::new(
        ir_meta.new_node_id(),
        ExpressionOp::CompoundAssign(op, Box::new(lhs), Box::new(rhs)),
    )
}

pub fn construct(ir_meta: &mut IRMeta, type_id: TypeId, args: Vec<Expression>) -> Expression {
    debug_assert!(!args.is_empty());
    Expression::new(ir_meta.new_node_id(), ExpressionOp::Construct(type_id, args))
}

pub fn call(ir_meta: &mut IRMeta, function_id: FunctionId, args: Vec<Expression>) -> Expression {
    debug_assert!(ir_meta.get_function(function_id).params.len() == args.len());
    Expression::new(ir_meta.new_node_id(), ExpressionOp::Call(function_id, args))
}

// Creates a call to a built-in function.  The built-in must be available in the given shader
// version; generating an unavailable built-in is a bug in the caller.
pub fn built_in(
    ir_meta: &mut IRMeta,
    op: BuiltInOpCode,
    args: Vec<Expression>,
    shader_version: i32,
) -> Expression {
    if shader_version < op.min_shader_version() {
        panic!(
            "Internal error: {} is not available in shader version {}",
            op.name(),
            shader_version
        );
    }
    Expression::new(ir_meta.new_node_id(), ExpressionOp::BuiltIn(op, args))
}

pub fn ternary(
    ir_meta: &mut IRMeta,
    condition: Expression,
    true_expression: Expression,
    false_expression: Expression,
) -> Expression {
    Expression::new(
        ir_meta.new_node_id(),
        ExpressionOp::Ternary(
            Box::new(condition),
            Box::new(true_expression),
            Box::new(false_expression),
        ),
    )
}

// Statements:

pub fn declaration(
    ir_meta: &mut IRMeta,
    id: VariableId,
    initializer: Option<Expression>,
) -> Statement {
    Statement::new(ir_meta.new_node_id(), StatementOp::Declaration(id, initializer))
}

pub fn expression_statement(ir_meta: &mut IRMeta, expression: Expression) -> Statement {
    Statement::new(ir_meta.new_node_id(), StatementOp::Expression(expression))
}

// Shorthand for the common `lhs = rhs;` statement.
pub fn assign_statement(ir_meta: &mut IRMeta, lhs: Expression, rhs: Expression) -> Statement {
    let assignment = assign(ir_meta, lhs, rhs);
    expression_statement(ir_meta, assignment)
}

// Shorthand for a statement that only calls a built-in, such as memoryBarrierImage().
pub fn built_in_statement(
    ir_meta: &mut IRMeta,
    op: BuiltInOpCode,
    args: Vec<Expression>,
    shader_version: i32,
) -> Statement {
    let call = built_in(ir_meta, op, args, shader_version);
    expression_statement(ir_meta, call)
}

pub fn block_statement(ir_meta: &mut IRMeta, block: Block) -> Statement {
    Statement::new(ir_meta.new_node_id(), StatementOp::Block(block))
}

pub fn if_statement(
    ir_meta: &mut IRMeta,
    condition: Expression,
    true_block: Block,
    false_block: Option<Block>,
) -> Statement {
    Statement::new(ir_meta.new_node_id(), StatementOp::If(condition, true_block, false_block))
}

pub fn loop_statement(ir_meta: &mut IRMeta, loop_desc: Loop) -> Statement {
    debug_assert!(
        loop_desc.kind == LoopKind::For || (loop_desc.init.is_none() && loop_desc.step.is_none())
    );
    Statement::new(ir_meta.new_node_id(), StatementOp::Loop(loop_desc))
}

pub fn return_statement(ir_meta: &mut IRMeta, value: Option<Expression>) -> Statement {
    Statement::new(ir_meta.new_node_id(), StatementOp::Return(value))
}

pub fn branch_statement(ir_meta: &mut IRMeta, op: StatementOp) -> Statement {
    debug_assert!(matches!(op, StatementOp::Discard | StatementOp::Break | StatementOp::Continue));
    Statement::new(ir_meta.new_node_id(), op)
}

pub fn function_definition(ir_meta: &mut IRMeta, id: FunctionId, body: Block) -> Statement {
    Statement::new(ir_meta.new_node_id(), StatementOp::FunctionDefinition(id, body))
}
