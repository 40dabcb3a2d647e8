// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// A helper to validate the rules of IR.  This is useful particularly to be run after
// transformations, to ensure they generate valid IR.  Validated:
//
//   - Every id is present in the respective table, and node ids are unique.
//   - Every accessed variable is declared in an accessible block (or is a built-in), and no
//     variable is declared twice.
//   - Functions are defined before they are called, and called with the right number of
//     arguments.
//   - Initializers, assignments and returned values match the type they are assigned to.
//   - If and loop conditions are bool.
//   - Image built-ins are given images, pixel local storage built-ins are given planes.
//   - Fragment outputs have unique locations.
//   - Optionally, that no pixel local storage is left in the shader.

use crate::ir::*;
use crate::*;
use log::error;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

pub struct Options {
    // Pixel local storage is only valid until it's lowered.
    pub allow_pixel_local_storage: bool,
}

pub fn validate(ir: &IR, options: &Options) -> Result<(), ValidationError> {
    let mut validator = Validator::new(ir, options);
    validator.validate();

    if validator.errors.is_empty() { Ok(()) } else { Err(validator.on_error()) }
}

struct Validator<'a> {
    ir: &'a IR,
    options: &'a Options,
    errors: Vec<String>,

    max_type_count: u32,
    max_variable_count: u32,
    max_function_count: u32,
    max_node_count: u32,

    node_ids: FxHashSet<NodeId>,
    // Every variable ever declared, to catch duplicate declarations.
    declared_variables: FxHashSet<VariableId>,
    // The variables visible from the current block, innermost scope last.
    scopes: Vec<Vec<VariableId>>,
    defined_functions: FxHashSet<FunctionId>,
    current_function: Option<FunctionId>,
    output_locations: FxHashMap<u32, VariableId>,
}

impl<'a> Validator<'a> {
    fn new(ir: &'a IR, options: &'a Options) -> Validator<'a> {
        Validator {
            ir,
            options,
            errors: Vec::new(),
            max_type_count: ir.meta.all_types().len() as u32,
            max_variable_count: ir.meta.all_variables().len() as u32,
            max_function_count: ir.meta.all_functions().len() as u32,
            max_node_count: ir.meta.node_id_count(),
            node_ids: FxHashSet::default(),
            declared_variables: FxHashSet::default(),
            scopes: vec![Vec::new()],
            defined_functions: FxHashSet::default(),
            current_function: None,
            output_locations: FxHashMap::default(),
        }
    }

    fn validate(&mut self) {
        let ir = self.ir;
        match ir.meta.get_main_function_id() {
            None => self.error(format_args!("main() is not declared")),
            Some(main_id) if ir.get_function_body(main_id).is_none() => {
                self.error(format_args!("main() is not defined"))
            }
            _ => {}
        }

        for (variable_index, variable) in ir.meta.all_variables().iter().enumerate() {
            if variable.type_id.id >= self.max_type_count {
                self.error(format_args!(
                    "Variable {variable_index} has invalid type id {}",
                    variable.type_id.id
                ));
            }
        }

        for statement in &ir.root.statements {
            self.validate_node_id(statement.node_id);
            match &statement.op {
                &StatementOp::Declaration(id, ref initializer) => {
                    self.validate_declaration(id, initializer.as_ref(), VariableScope::Global)
                }
                &StatementOp::FunctionDefinition(id, ref body) => {
                    self.validate_function_definition(id, body)
                }
                _ => self.error(format_args!(
                    "Only declarations and function definitions are allowed in global scope"
                )),
            }
        }
    }

    fn validate_node_id(&mut self, node_id: NodeId) {
        if node_id.id >= self.max_node_count {
            self.error(format_args!("Node id {} was never allocated", node_id.id));
        }
        if !self.node_ids.insert(node_id) {
            self.error(format_args!("Node id {} is found multiple times", node_id.id));
        }
    }

    fn validate_variable_id(&mut self, id: VariableId) -> bool {
        if id.id >= self.max_variable_count {
            self.error(format_args!("Invalid variable id {}", id.id));
            return false;
        }
        true
    }

    fn is_visible(&self, id: VariableId) -> bool {
        let ir = self.ir;
        ir.meta.get_variable(id).built_in.is_some()
            || self.scopes.iter().any(|scope| scope.contains(&id))
    }

    fn declare(&mut self, id: VariableId) {
        let ir = self.ir;
        if !self.declared_variables.insert(id) {
            self.error(format_args!(
                "Variable {} ({}) is declared multiple times",
                id.id,
                ir.meta.get_variable(id).name.name
            ));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(id);
        }
    }

    fn validate_declaration(
        &mut self,
        id: VariableId,
        initializer: Option<&Expression>,
        expected_scope: VariableScope,
    ) {
        let ir = self.ir;
        if !self.validate_variable_id(id) {
            return;
        }
        let variable = ir.meta.get_variable(id);

        // The initializer cannot reference the variable being declared.
        if let Some(initializer) = initializer {
            self.validate_expression(initializer);
            let initializer_type_id = util::get_expression_type(&ir.meta, initializer);
            if initializer_type_id != variable.type_id {
                self.error(format_args!(
                    "Initializer of {} has type {}, expected {}",
                    variable.name.name, initializer_type_id.id, variable.type_id.id
                ));
            }
        }

        if variable.scope != expected_scope {
            self.error(format_args!(
                "Variable {} is declared in the wrong scope",
                variable.name.name
            ));
        }

        if variable.built_in.is_some() {
            self.error(format_args!("Built-in {} is declared", variable.name.name));
        }

        let base_type = ir.meta.get_type(ir.meta.get_array_base_type_id(variable.type_id));
        if base_type.is_pixel_local() {
            if !self.options.allow_pixel_local_storage {
                self.error(format_args!(
                    "Pixel local storage {} is left in the shader",
                    variable.name.name
                ));
            }
            if !variable.decorations.has(Decoration::Uniform)
                || variable.decorations.get_binding().is_none()
                || variable.decorations.get_image_internal_format().is_none()
            {
                self.error(format_args!(
                    "Pixel local storage {} is missing uniform, binding or format",
                    variable.name.name
                ));
            }
        }

        if variable.is_fragment_output() {
            if let Some(location) = variable.decorations.get_location() {
                if let Some(other) = self.output_locations.insert(location, id) {
                    self.error(format_args!(
                        "Outputs {} and {} share location {location}",
                        ir.meta.get_variable(other).name.name,
                        variable.name.name
                    ));
                }
            }
        }

        self.declare(id);
    }

    fn validate_function_definition(&mut self, id: FunctionId, body: &Block) {
        let ir = self.ir;
        if id.id >= self.max_function_count {
            self.error(format_args!("Invalid function id {}", id.id));
            return;
        }
        if self.defined_functions.contains(&id) {
            self.error(format_args!(
                "Function {} is defined multiple times",
                ir.meta.get_function(id).name.name
            ));
        }

        self.current_function = Some(id);
        self.scopes.push(Vec::new());
        for param in &ir.meta.get_function(id).params {
            if self.validate_variable_id(param.variable_id) {
                self.declare(param.variable_id);
            }
        }
        self.validate_block(body);
        self.scopes.pop();
        self.current_function = None;

        // Defined after the body is validated, so recursion is caught.
        self.defined_functions.insert(id);
    }

    fn validate_block(&mut self, block: &Block) {
        self.scopes.push(Vec::new());
        block.statements.iter().for_each(|statement| self.validate_statement(statement));
        self.scopes.pop();
    }

    fn validate_condition(&mut self, condition: &Expression) {
        let ir = self.ir;
        self.validate_expression(condition);
        if util::get_expression_type(&ir.meta, condition) != TYPE_ID_BOOL {
            self.error(format_args!("Condition is not a bool"));
        }
    }

    fn validate_statement(&mut self, statement: &Statement) {
        let ir = self.ir;
        self.validate_node_id(statement.node_id);

        match &statement.op {
            &StatementOp::Declaration(id, ref initializer) => {
                self.validate_declaration(id, initializer.as_ref(), VariableScope::Local)
            }
            StatementOp::Expression(expression) => self.validate_expression(expression),
            StatementOp::Block(block) => self.validate_block(block),
            StatementOp::If(condition, true_block, false_block) => {
                self.validate_condition(condition);
                self.validate_block(true_block);
                if let Some(block) = false_block {
                    self.validate_block(block);
                }
            }
            StatementOp::Loop(loop_desc) => {
                // Variables declared in the init statement are only visible inside the loop.
                self.scopes.push(Vec::new());
                if let Some(init) = &loop_desc.init {
                    self.validate_statement(init);
                }
                if let Some(condition) = &loop_desc.condition {
                    self.validate_condition(condition);
                }
                if let Some(step) = &loop_desc.step {
                    self.validate_expression(step);
                }
                self.validate_block(&loop_desc.body);
                self.scopes.pop();
            }
            StatementOp::Return(value) => {
                let expected_type_id = self
                    .current_function
                    .map(|id| ir.meta.get_function(id).return_type_id)
                    .unwrap_or(TYPE_ID_VOID);
                let value_type_id = match value {
                    Some(value) => {
                        self.validate_expression(value);
                        util::get_expression_type(&ir.meta, value)
                    }
                    None => TYPE_ID_VOID,
                };
                if value_type_id != expected_type_id {
                    self.error(format_args!("Returned value does not match the return type"));
                }
            }
            StatementOp::Discard | StatementOp::Break | StatementOp::Continue => {}
            StatementOp::FunctionDefinition(..) => {
                self.error(format_args!("Function definitions cannot be nested"))
            }
        }
    }

    fn validate_expression(&mut self, expression: &Expression) {
        self.validate_node_id(expression.node_id);
        expression.operands().into_iter().for_each(|operand| self.validate_expression(operand));

        let ir = self.ir;
        let ir_meta = &ir.meta;
        match &expression.op {
            &ExpressionOp::Symbol(id) => {
                if self.validate_variable_id(id) && !self.is_visible(id) {
                    self.error(format_args!(
                        "Variable {} ({}) is used without being declared",
                        id.id,
                        ir_meta.get_variable(id).name.name
                    ));
                }
            }
            ExpressionOp::Swizzle(operand, components) => {
                let operand_type_id = util::get_expression_type(ir_meta, operand);
                let size = ir_meta.get_type(operand_type_id).get_total_component_count();
                if components.iter().any(|&component| component >= size) {
                    self.error(format_args!("Swizzle selects out-of-range components"));
                }
            }
            ExpressionOp::Assign(lhs, rhs) => {
                let lhs_type_id = util::get_expression_type(ir_meta, lhs);
                let rhs_type_id = util::get_expression_type(ir_meta, rhs);
                if lhs_type_id != rhs_type_id {
                    self.error(format_args!(
                        "Assignment of type {} to type {}",
                        rhs_type_id.id, lhs_type_id.id
                    ));
                }
            }
            ExpressionOp::CompoundAssign(op, lhs, rhs) => {
                let lhs_type_id = util::get_expression_type(ir_meta, lhs);
                let rhs_type_id = util::get_expression_type(ir_meta, rhs);
                let rhs_is_matching_scalar =
                    ir_meta.get_scalar_type(lhs_type_id) == ir_meta.get_scalar_type(rhs_type_id)
                        && ir_meta.get_type(rhs_type_id).is_scalar();
                if !op.is_shift() && lhs_type_id != rhs_type_id && !rhs_is_matching_scalar {
                    self.error(format_args!(
                        "Compound assignment of type {} to type {}",
                        rhs_type_id.id, lhs_type_id.id
                    ));
                }
            }
            &ExpressionOp::Construct(type_id, _) => {
                if type_id.id >= self.max_type_count {
                    self.error(format_args!("Invalid constructor type id {}", type_id.id));
                }
            }
            &ExpressionOp::Call(function_id, ref args) => {
                if function_id.id >= self.max_function_count {
                    self.error(format_args!("Invalid function id {}", function_id.id));
                } else if !self.defined_functions.contains(&function_id) {
                    self.error(format_args!(
                        "Function {} is called before being defined",
                        ir_meta.get_function(function_id).name.name
                    ));
                } else if ir_meta.get_function(function_id).params.len() != args.len() {
                    self.error(format_args!(
                        "Function {} is called with the wrong number of arguments",
                        ir_meta.get_function(function_id).name.name
                    ));
                }
            }
            &ExpressionOp::BuiltIn(op, ref args) => self.validate_built_in(op, args),
            _ => {}
        }
    }

    fn validate_built_in(&mut self, op: BuiltInOpCode, args: &[Expression]) {
        let ir = self.ir;
        let ir_meta = &ir.meta;

        if op.is_pixel_local_storage() {
            if !self.options.allow_pixel_local_storage {
                self.error(format_args!("{} is left in the shader", op.name()));
            }
            let is_plane = args
                .first()
                .and_then(|arg| arg.get_symbol())
                .is_some_and(|id| util::is_pixel_local(ir_meta, id));
            if !is_plane {
                self.error(format_args!("{} is not given a pixel local storage plane", op.name()));
            }
        }

        if op.is_image() {
            let is_image = args.first().is_some_and(|arg| {
                let image_type = ir_meta.get_type(util::get_expression_type(ir_meta, arg));
                image_type.is_image() && !image_type.is_pixel_local()
            });
            if !is_image {
                self.error(format_args!("{} is not given an image", op.name()));
            }
        }

        let expected_arg_count = match op {
            BuiltInOpCode::PixelLocalLoadANGLE
            | BuiltInOpCode::Floor
            | BuiltInOpCode::PackUnorm4x8
            | BuiltInOpCode::UnpackUnorm4x8 => 1,
            BuiltInOpCode::PixelLocalStoreANGLE
            | BuiltInOpCode::ImageLoad
            | BuiltInOpCode::Min
            | BuiltInOpCode::Max => 2,
            BuiltInOpCode::ImageStore | BuiltInOpCode::Clamp => 3,
            BuiltInOpCode::MemoryBarrierImage
            | BuiltInOpCode::BeginInvocationInterlockNV
            | BuiltInOpCode::EndInvocationInterlockNV
            | BuiltInOpCode::BeginFragmentShaderOrderingINTEL
            | BuiltInOpCode::BeginInvocationInterlockARB
            | BuiltInOpCode::EndInvocationInterlockARB => 0,
        };
        if args.len() != expected_arg_count {
            self.error(format_args!(
                "{} takes {expected_arg_count} arguments, given {}",
                op.name(),
                args.len()
            ));
        }
    }

    fn error(&mut self, validation_error_msg: fmt::Arguments) {
        self.errors.push(validation_error_msg.to_string());
    }

    fn on_error(&mut self) -> ValidationError {
        let message = std::mem::take(&mut self.errors).join("\n");
        error!("Invalid ANGLE IR! {}", message);
        debug::dump(self.ir);
        ValidationError::new(message)
    }
}
