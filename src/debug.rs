// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Debug utilities.  Notably, the IR can be printed as GLSL-like text for inspection, and dumped to
// the log.

use crate::ir::*;
use log::debug;
use std::fmt::Write;

const INDENT: &str = "    ";

fn precision_str(precision: Precision) -> &'static str {
    match precision {
        Precision::NotApplicable => "",
        Precision::Low => "lowp",
        Precision::Medium => "mediump",
        Precision::High => "highp",
    }
}

fn shader_type_str(shader_type: ShaderType) -> &'static str {
    match shader_type {
        ShaderType::Vertex => "Vertex Shader",
        ShaderType::Fragment => "Fragment Shader",
    }
}

fn basic_type_str(basic: BasicType) -> &'static str {
    match basic {
        BasicType::Void => "void",
        BasicType::Float => "float",
        BasicType::Int => "int",
        BasicType::Uint => "uint",
        BasicType::Bool => "bool",
    }
}

fn image_type_str(basic_type: ImageBasicType, image_type: &ImageType) -> String {
    let prefix = match basic_type {
        ImageBasicType::Float => "",
        ImageBasicType::Int => "i",
        ImageBasicType::Uint => "u",
    };
    let mut base_name = if image_type.is_sampled { "sampler" } else { "image" };
    let suffix = match image_type.dimension {
        ImageDimension::D2 => "2D",
        ImageDimension::PixelLocal => {
            base_name = "pixelLocalANGLE";
            ""
        }
    };
    let multisample_suffix = if image_type.is_ms { "MS" } else { "" };
    let array_suffix = if image_type.is_array { "Array" } else { "" };
    let shadow_suffix = if image_type.is_shadow { "Shadow" } else { "" };
    format!("{prefix}{base_name}{suffix}{multisample_suffix}{array_suffix}{shadow_suffix}")
}

fn type_str(ir_meta: &IRMeta, type_id: TypeId) -> String {
    match ir_meta.get_type(type_id) {
        &Type::Scalar(basic_type) => basic_type_str(basic_type).to_string(),
        &Type::Vector(element_type_id, count) => {
            let prefix = match ir_meta.get_type(element_type_id).get_scalar_basic_type() {
                BasicType::Int => "i",
                BasicType::Uint => "u",
                BasicType::Bool => "b",
                _ => "",
            };
            format!("{prefix}vec{count}")
        }
        Type::Image(basic_type, image_type) => image_type_str(*basic_type, image_type),
        &Type::Array(element_type_id, count) => {
            format!("{}[{count}]", type_str(ir_meta, element_type_id))
        }
    }
}

// Names that are not expected to be output exactly are disambiguated with an `_N` suffix.
fn name_str(name: &Name, id: u32) -> String {
    match name.source {
        NameSource::Temporary => format!("{}_{id}", name.name),
        NameSource::ShaderInterface | NameSource::Internal => name.name.to_string(),
    }
}

fn variable_name_str(ir_meta: &IRMeta, id: VariableId) -> String {
    name_str(&ir_meta.get_variable(id).name, id.id)
}

fn function_name_str(ir_meta: &IRMeta, id: FunctionId) -> String {
    name_str(&ir_meta.get_function(id).name, id.id)
}

// The qualifiers that go in layout(...).
fn layout_qualifier_str(decoration: Decoration) -> Option<String> {
    match decoration {
        Decoration::Location(n) => Some(format!("location={n}")),
        Decoration::Binding(n) => Some(format!("binding={n}")),
        Decoration::ImageInternalFormat(format) => Some(format.name().to_string()),
        Decoration::NonCoherent => Some("noncoherent".to_string()),
        Decoration::RasterOrdered => Some("raster_ordered".to_string()),
        _ => None,
    }
}

fn memory_qualifier_str(decoration: Decoration) -> Option<&'static str> {
    match decoration {
        Decoration::Coherent => Some("coherent"),
        Decoration::Restrict => Some("restrict"),
        _ => None,
    }
}

fn storage_qualifier_str(decorations: &Decorations) -> Option<&'static str> {
    if decorations.has(Decoration::Uniform) {
        Some("uniform")
    } else if decorations.has(Decoration::InputOutput) {
        Some("inout")
    } else if decorations.has(Decoration::Output) {
        Some("out")
    } else if decorations.has(Decoration::Input) {
        Some("in")
    } else {
        None
    }
}

// For example `layout(binding=0, r32ui) coherent restrict highp uniform uimage2D name`.
fn variable_declaration_str(ir_meta: &IRMeta, id: VariableId) -> String {
    let variable = ir_meta.get_variable(id);
    let decorations = &variable.decorations.decorations;
    let mut qualifiers = Vec::new();

    let layout = decorations
        .iter()
        .filter_map(|&decoration| layout_qualifier_str(decoration))
        .collect::<Vec<_>>();
    if !layout.is_empty() {
        qualifiers.push(format!("layout({})", layout.join(", ")));
    }
    qualifiers.extend(
        decorations
            .iter()
            .filter_map(|&decoration| memory_qualifier_str(decoration))
            .map(str::to_string),
    );
    let precision = precision_str(variable.precision);
    if !precision.is_empty() {
        qualifiers.push(precision.to_string());
    }
    if let Some(storage) = storage_qualifier_str(&variable.decorations) {
        qualifiers.push(storage.to_string());
    }
    qualifiers.push(type_str(ir_meta, variable.type_id));
    qualifiers.push(variable_name_str(ir_meta, id));
    qualifiers.join(" ")
}

fn unary_opcode_str(op: UnaryOpCode) -> &'static str {
    match op {
        UnaryOpCode::Negate => "-",
        UnaryOpCode::LogicalNot => "!",
        UnaryOpCode::BitwiseNot => "~",
    }
}

fn binary_opcode_str(op: BinaryOpCode) -> &'static str {
    match op {
        BinaryOpCode::Add => "+",
        BinaryOpCode::Sub => "-",
        BinaryOpCode::Mul => "*",
        BinaryOpCode::Div => "/",
        BinaryOpCode::IMod => "%",
        BinaryOpCode::Equal => "==",
        BinaryOpCode::NotEqual => "!=",
        BinaryOpCode::LessThan => "<",
        BinaryOpCode::GreaterThan => ">",
        BinaryOpCode::LessThanEqual => "<=",
        BinaryOpCode::GreaterThanEqual => ">=",
        BinaryOpCode::LogicalAnd => "&&",
        BinaryOpCode::LogicalOr => "||",
        BinaryOpCode::LogicalXor => "^^",
        BinaryOpCode::BitShiftLeft => "<<",
        BinaryOpCode::BitShiftRight => ">>",
        BinaryOpCode::BitwiseOr => "|",
        BinaryOpCode::BitwiseXor => "^",
        BinaryOpCode::BitwiseAnd => "&",
    }
}

fn constant_str(value: ConstantValue) -> String {
    match value {
        ConstantValue::Float(f) => format!("{f:?}"),
        ConstantValue::Int(i) => i.to_string(),
        ConstantValue::Uint(u) => format!("{u}u"),
        ConstantValue::Bool(b) => b.to_string(),
    }
}

fn swizzle_str(components: &Swizzle) -> String {
    components.iter().map(|&component| ['x', 'y', 'z', 'w'][component as usize]).collect()
}

fn args_str(ir_meta: &IRMeta, args: &[Expression]) -> String {
    args.iter().map(|arg| expression_str(ir_meta, arg)).collect::<Vec<_>>().join(", ")
}

// Binary expressions are fully parenthesized, so precedence never needs to be considered.
pub fn expression_str(ir_meta: &IRMeta, expression: &Expression) -> String {
    match &expression.op {
        &ExpressionOp::Symbol(id) => variable_name_str(ir_meta, id),
        &ExpressionOp::Constant(value) => constant_str(value),
        ExpressionOp::Swizzle(operand, components) => {
            format!("{}.{}", expression_str(ir_meta, operand), swizzle_str(components))
        }
        &ExpressionOp::Unary(op, ref operand) => {
            format!("{}({})", unary_opcode_str(op), expression_str(ir_meta, operand))
        }
        &ExpressionOp::Binary(op, ref lhs, ref rhs) => format!(
            "({} {} {})",
            expression_str(ir_meta, lhs),
            binary_opcode_str(op),
            expression_str(ir_meta, rhs)
        ),
        ExpressionOp::Assign(lhs, rhs) => {
            format!("{} = {}", expression_str(ir_meta, lhs), expression_str(ir_meta, rhs))
        }
        &ExpressionOp::CompoundAssign(op, ref lhs, ref rhs) => format!(
            "{} {}= {}",
            expression_str(ir_meta, lhs),
            binary_opcode_str(op),
            expression_str(ir_meta, rhs)
        ),
        &ExpressionOp::Construct(type_id, ref args) => {
            format!("{}({})", type_str(ir_meta, type_id), args_str(ir_meta, args))
        }
        &ExpressionOp::Call(function_id, ref args) => {
            format!("{}({})", function_name_str(ir_meta, function_id), args_str(ir_meta, args))
        }
        &ExpressionOp::BuiltIn(op, ref args) => {
            format!("{}({})", op.name(), args_str(ir_meta, args))
        }
        ExpressionOp::Ternary(condition, true_expression, false_expression) => format!(
            "({} ? {} : {})",
            expression_str(ir_meta, condition),
            expression_str(ir_meta, true_expression),
            expression_str(ir_meta, false_expression)
        ),
    }
}

fn append_line(result: &mut String, line: &str, indent: usize) {
    result.push_str(&INDENT.repeat(indent));
    result.push_str(line);
    result.push('\n');
}

fn declaration_str(ir_meta: &IRMeta, id: VariableId, initializer: Option<&Expression>) -> String {
    let declaration = variable_declaration_str(ir_meta, id);
    match initializer {
        Some(initializer) => format!("{declaration} = {}", expression_str(ir_meta, initializer)),
        None => declaration,
    }
}

// A statement as it appears in the header of a for loop, without the `;`.
fn simple_statement_str(ir_meta: &IRMeta, statement: &Statement) -> String {
    match &statement.op {
        &StatementOp::Declaration(id, ref initializer) => {
            declaration_str(ir_meta, id, initializer.as_ref())
        }
        StatementOp::Expression(expression) => expression_str(ir_meta, expression),
        _ => panic!("Internal error: Unexpected statement in for loop header"),
    }
}

fn append_block(result: &mut String, ir_meta: &IRMeta, block: &Block, indent: usize) {
    append_line(result, "{", indent);
    block
        .statements
        .iter()
        .for_each(|statement| append_statement(result, ir_meta, statement, indent + 1));
    append_line(result, "}", indent);
}

fn function_prototype_str(ir_meta: &IRMeta, id: FunctionId) -> String {
    let function = ir_meta.get_function(id);
    let params = function
        .params
        .iter()
        .map(|param| {
            let direction = match param.direction {
                FunctionParamDirection::Input => "in",
                FunctionParamDirection::Output => "out",
                FunctionParamDirection::InputOutput => "inout",
            };
            format!("{direction} {}", variable_declaration_str(ir_meta, param.variable_id))
        })
        .collect::<Vec<_>>()
        .join(", ");
    let precision = precision_str(function.return_precision);
    let return_type = type_str(ir_meta, function.return_type_id);
    let return_type =
        if precision.is_empty() { return_type } else { format!("{precision} {return_type}") };
    format!("{return_type} {}({params})", function_name_str(ir_meta, id))
}

fn append_statement(result: &mut String, ir_meta: &IRMeta, statement: &Statement, indent: usize) {
    match &statement.op {
        StatementOp::Declaration(..) | StatementOp::Expression(_) => {
            append_line(result, &(simple_statement_str(ir_meta, statement) + ";"), indent)
        }
        StatementOp::Block(block) => append_block(result, ir_meta, block, indent),
        StatementOp::If(condition, true_block, false_block) => {
            append_line(result, &format!("if ({})", expression_str(ir_meta, condition)), indent);
            append_block(result, ir_meta, true_block, indent);
            if let Some(false_block) = false_block {
                append_line(result, "else", indent);
                append_block(result, ir_meta, false_block, indent);
            }
        }
        StatementOp::Loop(loop_desc) => {
            let condition = loop_desc
                .condition
                .as_ref()
                .map(|condition| expression_str(ir_meta, condition))
                .unwrap_or_default();
            match loop_desc.kind {
                LoopKind::For => {
                    let init = loop_desc
                        .init
                        .as_ref()
                        .map(|init| simple_statement_str(ir_meta, init))
                        .unwrap_or_default();
                    let step = loop_desc
                        .step
                        .as_ref()
                        .map(|step| expression_str(ir_meta, step))
                        .unwrap_or_default();
                    append_line(result, &format!("for ({init}; {condition}; {step})"), indent);
                    append_block(result, ir_meta, &loop_desc.body, indent);
                }
                LoopKind::While => {
                    append_line(result, &format!("while ({condition})"), indent);
                    append_block(result, ir_meta, &loop_desc.body, indent);
                }
                LoopKind::DoWhile => {
                    append_line(result, "do", indent);
                    append_block(result, ir_meta, &loop_desc.body, indent);
                    append_line(result, &format!("while ({condition});"), indent);
                }
            }
        }
        StatementOp::Return(value) => {
            let line = match value {
                Some(value) => format!("return {};", expression_str(ir_meta, value)),
                None => "return;".to_string(),
            };
            append_line(result, &line, indent);
        }
        StatementOp::Discard => append_line(result, "discard;", indent),
        StatementOp::Break => append_line(result, "break;", indent),
        StatementOp::Continue => append_line(result, "continue;", indent),
        &StatementOp::FunctionDefinition(id, ref body) => {
            append_line(result, &function_prototype_str(ir_meta, id), indent);
            append_block(result, ir_meta, body, indent);
        }
    }
}

// Print the shader as GLSL-like text.
pub fn to_string(ir: &IR) -> String {
    let mut result = String::new();
    if ir.meta.get_shader_type() == ShaderType::Fragment && ir.meta.get_early_fragment_tests() {
        append_line(&mut result, "layout(early_fragment_tests) in;", 0);
    }
    ir.root
        .statements
        .iter()
        .for_each(|statement| append_statement(&mut result, &ir.meta, statement, 0));
    result
}

fn dump_types(ir_meta: &IRMeta, result: &mut String) {
    result.push_str("\nTypes:\n");
    ir_meta.all_types().iter().enumerate().for_each(|(id, _)| {
        let _ = writeln!(result, "  t{id}: {}", type_str(ir_meta, TypeId { id: id as u32 }));
    });
}

fn dump_variables(ir_meta: &IRMeta, result: &mut String) {
    result.push_str("\nVariables:\n");
    ir_meta.all_variables().iter().enumerate().for_each(|(id, variable)| {
        let built_in = variable
            .built_in
            .map(|built_in| format!(" <{}>", built_in.name()))
            .unwrap_or_default();
        let _ = writeln!(
            result,
            "  v{id} (t{}): {}{built_in}",
            variable.type_id.id,
            variable_declaration_str(ir_meta, VariableId { id: id as u32 })
        );
    });
}

// Dump the IR for debug purposes.
pub fn dump(ir: &IR) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    let mut result = shader_type_str(ir.meta.get_shader_type()).to_string();
    result.push('\n');
    dump_types(&ir.meta, &mut result);
    dump_variables(&ir.meta, &mut result);
    result.push_str("\nShader:\n");
    result.push_str(&to_string(ir));

    debug!("{result}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    #[test]
    fn prints_declarations_and_statements() {
        let mut builder = Builder::new(ShaderType::Fragment, 310);
        builder.declare_pixel_local_storage(
            "pls",
            ImageBasicType::Uint,
            ImageInternalFormat::RGBA8UI,
            2,
            Precision::Medium,
        );
        builder.declare_interface_variable(
            "color",
            TYPE_ID_VEC4,
            Precision::Medium,
            Decorations::new(vec![Decoration::Output, Decoration::Location(0)]),
        );
        let main_id = builder.new_function("main", vec![], TYPE_ID_VOID);
        builder.begin_function(main_id);
        let value = builder.uint(3);
        let x = builder.declare_temp_variable("x", TYPE_ID_UINT, Precision::High, Some(value));
        let lhs = builder.variable(x);
        let rhs = builder.uint(8);
        let condition = builder.binary(BinaryOpCode::LessThan, lhs, rhs);
        builder.begin_if(condition);
        builder.branch_discard();
        builder.end_if();
        builder.end_function();
        let ir = builder.finish();

        let text = to_string(&ir);
        assert!(text.contains("layout(binding=2, rgba8ui) mediump uniform upixelLocalANGLE pls;"));
        assert!(text.contains("layout(location=0) mediump out vec4 color;"));
        assert!(text.contains("void main()"));
        assert!(text.contains(&format!("highp uint x_{} = 3u;", x.id)));
        assert!(text.contains(&format!("if ((x_{} < 8u))", x.id)));
        assert!(text.contains("discard;"));
    }
}
