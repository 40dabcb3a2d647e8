// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// The IR builder turns a stream of calls, as made by a parser front end, into an IR.  It is not
// meant to be used by transformations, as they can generate IR more efficiently with the helpers
// in `instruction`.

use crate::ir::*;
use crate::*;

// What an open block turns into once it is closed.
#[cfg_attr(debug_assertions, derive(Debug))]
enum OpenBlockKind {
    FunctionBody(FunctionId),
    IfTrue(Expression),
    // The true block is kept until the false block is closed as well.
    IfFalse(Expression, Block),
    LoopBody(LoopKind, Option<Box<Statement>>, Option<Expression>, Option<Expression>),
    Nested,
}

#[cfg_attr(debug_assertions, derive(Debug))]
struct OpenBlock {
    kind: OpenBlockKind,
    block: Block,
}

// A function parameter as declared in the source: name, type, precision and direction.
pub type ParamDesc = (&'static str, TypeId, Precision, FunctionParamDirection);

#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Builder {
    ir: IR,
    shader_version: i32,
    // The stack of blocks being built, innermost last.  The bottom of the stack is always the
    // body of the function being defined; global declarations go directly to the root.
    open_blocks: Vec<OpenBlock>,
}

impl Builder {
    pub fn new(shader_type: ShaderType, shader_version: i32) -> Builder {
        Builder { ir: IR::new(shader_type), shader_version, open_blocks: Vec::new() }
    }

    pub fn meta(&mut self) -> &mut IRMeta {
        &mut self.ir.meta
    }

    pub fn shader_version(&self) -> i32 {
        self.shader_version
    }

    // Take the built IR.  Every function and control flow block must have been closed.
    pub fn finish(self) -> IR {
        if !self.open_blocks.is_empty() {
            panic!("Internal error: IR is finished while blocks are still open");
        }
        self.ir
    }

    fn current_block(&mut self) -> &mut Block {
        match self.open_blocks.last_mut() {
            Some(open_block) => &mut open_block.block,
            None => &mut self.ir.root,
        }
    }

    fn push_block(&mut self, kind: OpenBlockKind) {
        self.open_blocks.push(OpenBlock { kind, block: Block::new() });
    }

    fn pop_block(&mut self) -> OpenBlock {
        self.open_blocks
            .pop()
            .unwrap_or_else(|| panic!("Internal error: Closing a block that was never opened"))
    }

    pub fn add_statement(&mut self, statement: Statement) {
        if self.open_blocks.is_empty()
            && !matches!(
                statement.op,
                StatementOp::Declaration(..) | StatementOp::FunctionDefinition(..)
            )
        {
            panic!("Internal error: Only declarations are allowed in global scope");
        }
        self.current_block().add_statement(statement);
    }

    pub fn add_expression_statement(&mut self, expression: Expression) {
        let statement = instruction::expression_statement(&mut self.ir.meta, expression);
        self.add_statement(statement);
    }

    // Declarations:

    // A shader interface variable (input, output, uniform), declared in global scope with its
    // name preserved.
    pub fn declare_interface_variable(
        &mut self,
        name: &'static str,
        type_id: TypeId,
        precision: Precision,
        decorations: Decorations,
    ) -> VariableId {
        let id = self.ir.meta.declare_variable(
            Name::new_interface(name),
            type_id,
            precision,
            decorations,
            None,
            VariableScope::Global,
        );
        let declaration = instruction::declaration(&mut self.ir.meta, id, None);
        self.ir.root.add_statement(declaration);
        id
    }

    // `layout(binding=N, format) uniform [i|u]pixelLocalANGLE name;`
    pub fn declare_pixel_local_storage(
        &mut self,
        name: &'static str,
        basic_type: ImageBasicType,
        format: ImageInternalFormat,
        binding: u32,
        precision: Precision,
    ) -> VariableId {
        let type_id = self
            .ir
            .meta
            .get_image_type_id(basic_type, ImageType::new_storage(ImageDimension::PixelLocal));
        self.declare_interface_variable(
            name,
            type_id,
            precision,
            Decorations::new(vec![
                Decoration::Uniform,
                Decoration::Binding(binding),
                Decoration::ImageInternalFormat(format),
            ]),
        )
    }

    // `layout(binding=N, format) uniform [i|u]image2D name;`
    pub fn declare_image(
        &mut self,
        name: &'static str,
        basic_type: ImageBasicType,
        format: ImageInternalFormat,
        binding: u32,
        precision: Precision,
    ) -> VariableId {
        let type_id =
            self.ir.meta.get_image_type_id(basic_type, ImageType::new_storage(ImageDimension::D2));
        self.declare_interface_variable(
            name,
            type_id,
            precision,
            Decorations::new(vec![
                Decoration::Uniform,
                Decoration::Binding(binding),
                Decoration::ImageInternalFormat(format),
            ]),
        )
    }

    // A global that is not part of the interface, such as `vec4 color;` outside main().
    pub fn declare_global_variable(
        &mut self,
        name: &'static str,
        type_id: TypeId,
        precision: Precision,
        initializer: Option<Expression>,
    ) -> VariableId {
        let id =
            self.ir.meta.declare_temp_variable(name, type_id, precision, VariableScope::Global);
        let declaration = instruction::declaration(&mut self.ir.meta, id, initializer);
        self.ir.root.add_statement(declaration);
        id
    }

    // A local variable declared in the current block.
    pub fn declare_temp_variable(
        &mut self,
        name: &'static str,
        type_id: TypeId,
        precision: Precision,
        initializer: Option<Expression>,
    ) -> VariableId {
        let id = self.new_local_variable(name, type_id, precision);
        let declaration = instruction::declaration(&mut self.ir.meta, id, initializer);
        self.add_statement(declaration);
        id
    }

    // A local variable that is declared by the caller, for example in the init statement of a
    // `for` loop.
    pub fn new_local_variable(
        &mut self,
        name: &'static str,
        type_id: TypeId,
        precision: Precision,
    ) -> VariableId {
        self.ir.meta.declare_temp_variable(name, type_id, precision, VariableScope::Local)
    }

    pub fn declaration(&mut self, id: VariableId, initializer: Option<Expression>) -> Statement {
        instruction::declaration(&mut self.ir.meta, id, initializer)
    }

    // Functions:

    pub fn new_function(
        &mut self,
        name: &'static str,
        params: Vec<ParamDesc>,
        return_type_id: TypeId,
    ) -> FunctionId {
        let params = params
            .into_iter()
            .map(|(param_name, type_id, precision, direction)| {
                let variable_id = self.ir.meta.declare_temp_variable(
                    param_name,
                    type_id,
                    precision,
                    VariableScope::FunctionParam,
                );
                FunctionParam::new(variable_id, direction)
            })
            .collect();
        let return_precision = if return_type_id == TYPE_ID_VOID {
            Precision::NotApplicable
        } else {
            Precision::High
        };

        let function = Function::new(name, params, return_type_id, return_precision);
        let id = self.ir.meta.add_function(function);
        if name == "main" {
            self.ir.meta.set_main_function_id(id);
        }
        id
    }

    // The variable of the function's `index`th parameter.
    pub fn param(&self, function_id: FunctionId, index: usize) -> VariableId {
        self.ir.meta.get_function(function_id).params[index].variable_id
    }

    pub fn begin_function(&mut self, id: FunctionId) {
        if !self.open_blocks.is_empty() {
            panic!("Internal error: Function definitions cannot be nested");
        }
        self.push_block(OpenBlockKind::FunctionBody(id));
    }

    pub fn end_function(&mut self) {
        let OpenBlock { kind, block } = self.pop_block();
        let OpenBlockKind::FunctionBody(id) = kind else {
            panic!("Internal error: Function ended while a control flow block is open");
        };
        let definition = instruction::function_definition(&mut self.ir.meta, id, block);
        self.ir.root.add_statement(definition);
    }

    // Control flow:

    pub fn begin_block(&mut self) {
        self.push_block(OpenBlockKind::Nested);
    }

    pub fn end_block(&mut self) {
        let OpenBlock { kind, block } = self.pop_block();
        debug_assert!(matches!(kind, OpenBlockKind::Nested));
        let statement = instruction::block_statement(&mut self.ir.meta, block);
        self.add_statement(statement);
    }

    pub fn begin_if(&mut self, condition: Expression) {
        self.push_block(OpenBlockKind::IfTrue(condition));
    }

    pub fn begin_else(&mut self) {
        let OpenBlock { kind, block } = self.pop_block();
        let OpenBlockKind::IfTrue(condition) = kind else {
            panic!("Internal error: else without if");
        };
        self.push_block(OpenBlockKind::IfFalse(condition, block));
    }

    pub fn end_if(&mut self) {
        let OpenBlock { kind, block } = self.pop_block();
        let (condition, true_block, false_block) = match kind {
            OpenBlockKind::IfTrue(condition) => (condition, block, None),
            OpenBlockKind::IfFalse(condition, true_block) => (condition, true_block, Some(block)),
            _ => panic!("Internal error: end of if without if"),
        };
        let statement =
            instruction::if_statement(&mut self.ir.meta, condition, true_block, false_block);
        self.add_statement(statement);
    }

    // `for (init; condition; step)`.  The init statement is typically a declaration created with
    // `new_local_variable` and `declaration`.
    pub fn begin_for(
        &mut self,
        init: Option<Statement>,
        condition: Option<Expression>,
        step: Option<Expression>,
    ) {
        let init = init.map(Box::new);
        self.push_block(OpenBlockKind::LoopBody(LoopKind::For, init, condition, step));
    }

    pub fn begin_while(&mut self, condition: Expression) {
        self.push_block(OpenBlockKind::LoopBody(LoopKind::While, None, Some(condition), None));
    }

    // The condition of a do-while loop is given upfront, it is only placed after the body.
    pub fn begin_do_while(&mut self, condition: Expression) {
        self.push_block(OpenBlockKind::LoopBody(LoopKind::DoWhile, None, Some(condition), None));
    }

    pub fn end_loop(&mut self) {
        let OpenBlock { kind, block } = self.pop_block();
        let OpenBlockKind::LoopBody(kind, init, condition, step) = kind else {
            panic!("Internal error: end of loop without loop");
        };
        let statement = instruction::loop_statement(
            &mut self.ir.meta,
            Loop { kind, init, condition, step, body: block },
        );
        self.add_statement(statement);
    }

    pub fn branch_return(&mut self, value: Option<Expression>) {
        let statement = instruction::return_statement(&mut self.ir.meta, value);
        self.add_statement(statement);
    }

    pub fn branch_discard(&mut self) {
        let statement = instruction::branch_statement(&mut self.ir.meta, StatementOp::Discard);
        self.add_statement(statement);
    }

    pub fn branch_break(&mut self) {
        let statement = instruction::branch_statement(&mut self.ir.meta, StatementOp::Break);
        self.add_statement(statement);
    }

    pub fn branch_continue(&mut self) {
        let statement = instruction::branch_statement(&mut self.ir.meta, StatementOp::Continue);
        self.add_statement(statement);
    }

    // Expressions:

    pub fn variable(&mut self, id: VariableId) -> Expression {
        instruction::symbol(&mut self.ir.meta, id)
    }

    pub fn frag_coord(&mut self) -> Expression {
        let id = self.ir.meta.get_or_declare_built_in_variable(BuiltIn::FragCoord);
        instruction::symbol(&mut self.ir.meta, id)
    }

    pub fn float(&mut self, value: f32) -> Expression {
        instruction::float(&mut self.ir.meta, value)
    }
    pub fn int(&mut self, value: i32) -> Expression {
        instruction::int(&mut self.ir.meta, value)
    }
    pub fn uint(&mut self, value: u32) -> Expression {
        instruction::uint(&mut self.ir.meta, value)
    }
    pub fn boolean(&mut self, value: bool) -> Expression {
        instruction::boolean(&mut self.ir.meta, value)
    }

    pub fn swizzle(&mut self, operand: Expression, components: &[u32]) -> Expression {
        instruction::swizzle(&mut self.ir.meta, operand, components)
    }

    pub fn construct(&mut self, type_id: TypeId, args: Vec<Expression>) -> Expression {
        instruction::construct(&mut self.ir.meta, type_id, args)
    }

    // Shorthands for the common vec4 constructors.
    pub fn vec4(&mut self, x: f32, y: f32, z: f32, w: f32) -> Expression {
        let args = vec![self.float(x), self.float(y), self.float(z), self.float(w)];
        self.construct(TYPE_ID_VEC4, args)
    }
    pub fn ivec4(&mut self, x: i32, y: i32, z: i32, w: i32) -> Expression {
        let args = vec![self.int(x), self.int(y), self.int(z), self.int(w)];
        self.construct(TYPE_ID_IVEC4, args)
    }
    pub fn uvec4(&mut self, x: u32, y: u32, z: u32, w: u32) -> Expression {
        let args = vec![self.uint(x), self.uint(y), self.uint(z), self.uint(w)];
        self.construct(TYPE_ID_UVEC4, args)
    }

    pub fn unary(&mut self, op: UnaryOpCode, operand: Expression) -> Expression {
        instruction::unary(&mut self.ir.meta, op, operand)
    }

    pub fn binary(&mut self, op: BinaryOpCode, lhs: Expression, rhs: Expression) -> Expression {
        instruction::binary(&mut self.ir.meta, op, lhs, rhs)
    }

    pub fn ternary(
        &mut self,
        condition: Expression,
        true_expression: Expression,
        false_expression: Expression,
    ) -> Expression {
        instruction::ternary(&mut self.ir.meta, condition, true_expression, false_expression)
    }

    // `variable = value`
    pub fn assign(&mut self, id: VariableId, value: Expression) -> Expression {
        let lhs = self.variable(id);
        instruction::assign(&mut self.ir.meta, lhs, value)
    }

    // `lhs = value`, for l-values other than a plain variable, such as `v.x`.
    pub fn assign_to(&mut self, lhs: Expression, value: Expression) -> Expression {
        instruction::assign(&mut self.ir.meta, lhs, value)
    }

    pub fn compound_assign(
        &mut self,
        op: BinaryOpCode,
        id: VariableId,
        value: Expression,
    ) -> Expression {
        let lhs = self.variable(id);
        instruction::compound_assign(&mut self.ir.meta, op, lhs, value)
    }

    pub fn call(&mut self, function_id: FunctionId, args: Vec<Expression>) -> Expression {
        instruction::call(&mut self.ir.meta, function_id, args)
    }

    pub fn built_in(&mut self, op: BuiltInOpCode, args: Vec<Expression>) -> Expression {
        instruction::built_in(&mut self.ir.meta, op, args, self.shader_version)
    }

    // `pixelLocalLoadANGLE(pls)`
    pub fn pixel_local_load(&mut self, pls: VariableId) -> Expression {
        let pls = self.variable(pls);
        self.built_in(BuiltInOpCode::PixelLocalLoadANGLE, vec![pls])
    }

    // `pixelLocalStoreANGLE(pls, value)`
    pub fn pixel_local_store(&mut self, pls: VariableId, value: Expression) -> Expression {
        let pls = self.variable(pls);
        self.built_in(BuiltInOpCode::PixelLocalStoreANGLE, vec![pls, value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_flow_nests() {
        let mut builder = Builder::new(ShaderType::Fragment, 310);
        let main_id = builder.new_function("main", vec![], TYPE_ID_VOID);
        builder.begin_function(main_id);
        let condition = builder.boolean(true);
        builder.begin_if(condition);
        let x = builder.declare_temp_variable("x", TYPE_ID_INT, Precision::High, None);
        builder.begin_else();
        let condition = builder.boolean(false);
        builder.begin_while(condition);
        builder.branch_break();
        builder.end_loop();
        builder.end_if();
        builder.branch_return(None);
        builder.end_function();
        let ir = builder.finish();

        assert!(ir.meta.get_main_function_id() == Some(main_id));
        assert!(ir.meta.get_variable(x).scope == VariableScope::Local);
        let body = ir.get_function_body(main_id).unwrap();
        assert_eq!(body.statements.len(), 2);
        match &body.statements[0].op {
            StatementOp::If(_, true_block, Some(false_block)) => {
                assert!(true_block.statements[0].get_declared_variable() == Some(x));
                assert!(matches!(false_block.statements[0].op, StatementOp::Loop(_)));
            }
            _ => panic!("expected an if/else"),
        }
        assert!(body.is_terminated());
    }

    #[test]
    fn function_params_are_declared() {
        let mut builder = Builder::new(ShaderType::Fragment, 310);
        let function_id = builder.new_function(
            "f",
            vec![
                ("a", TYPE_ID_VEC4, Precision::Medium, FunctionParamDirection::Input),
                ("b", TYPE_ID_INT, Precision::High, FunctionParamDirection::InputOutput),
            ],
            TYPE_ID_FLOAT,
        );
        let b = builder.param(function_id, 1);
        let ir = builder.finish();

        let function = ir.meta.get_function(function_id);
        assert_eq!(function.params.len(), 2);
        assert!(function.params[1].direction == FunctionParamDirection::InputOutput);
        assert!(ir.meta.get_variable(b).scope == VariableScope::FunctionParam);
        assert!(ir.meta.get_main_function_id().is_none());
    }

    #[test]
    #[should_panic(expected = "Internal error")]
    fn unclosed_function_is_a_defect() {
        let mut builder = Builder::new(ShaderType::Fragment, 310);
        let main_id = builder.new_function("main", vec![], TYPE_ID_VOID);
        builder.begin_function(main_id);
        builder.finish();
    }

    #[test]
    fn unorm_packing_is_available_in_essl_300() {
        let mut builder = Builder::new(ShaderType::Fragment, 300);
        let value = builder.vec4(0.0, 0.25, 0.5, 1.0);
        let packed = builder.built_in(BuiltInOpCode::PackUnorm4x8, vec![value]);
        let unpacked = builder.built_in(BuiltInOpCode::UnpackUnorm4x8, vec![packed]);
        assert!(matches!(unpacked.op, ExpressionOp::BuiltIn(BuiltInOpCode::UnpackUnorm4x8, _)));
    }

    #[test]
    #[should_panic(expected = "memoryBarrierImage is not available in shader version 300")]
    fn image_built_ins_need_essl_310() {
        let mut builder = Builder::new(ShaderType::Fragment, 300);
        builder.built_in(BuiltInOpCode::MemoryBarrierImage, vec![]);
    }
}
