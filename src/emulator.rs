// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Executes a shader for a single fragment.  This is used to verify the numeric behavior of the
// code generated by transformations, such as the packing of pixel local storage data, without a
// GPU.
//
// All values are 32-bit regardless of precision.  Integer arithmetic wraps around.  Storage images
// hold texels per pixel coordinate, converted to the image's format when stored.  Fragment outputs
// are preloaded from (if `inout`) and written back to the attachment at their location.
//
// Pixel local storage itself is not emulated; only lowered shaders can run.

use crate::ir::*;
use crate::*;
use log::trace;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

const MAX_LOOP_ITERATIONS: u32 = 1 << 16;

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Scalar {
    Float(f32),
    Int(i32),
    Uint(u32),
    Bool(bool),
}

// A scalar or vector value.  Scalars have a single component, void has none.
pub type Value = SmallVec<[Scalar; 4]>;

pub fn vec4(x: f32, y: f32, z: f32, w: f32) -> Value {
    SmallVec::from_slice(&[Scalar::Float(x), Scalar::Float(y), Scalar::Float(z), Scalar::Float(w)])
}
pub fn ivec4(x: i32, y: i32, z: i32, w: i32) -> Value {
    SmallVec::from_slice(&[Scalar::Int(x), Scalar::Int(y), Scalar::Int(z), Scalar::Int(w)])
}
pub fn uvec4(x: u32, y: u32, z: u32, w: u32) -> Value {
    SmallVec::from_slice(&[Scalar::Uint(x), Scalar::Uint(y), Scalar::Uint(z), Scalar::Uint(w)])
}

impl Scalar {
    fn zero(basic_type: BasicType) -> Result<Scalar, EmulationError> {
        match basic_type {
            BasicType::Float => Ok(Scalar::Float(0.0)),
            BasicType::Int => Ok(Scalar::Int(0)),
            BasicType::Uint => Ok(Scalar::Uint(0)),
            BasicType::Bool => Ok(Scalar::Bool(false)),
            BasicType::Void => Err(EmulationError::Unsupported("void values")),
        }
    }

    pub fn as_f32(self) -> f32 {
        match self {
            Scalar::Float(f) => f,
            Scalar::Int(i) => i as f32,
            Scalar::Uint(u) => u as f32,
            Scalar::Bool(b) => b as u32 as f32,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Scalar::Float(f) => f as i32,
            Scalar::Int(i) => i,
            Scalar::Uint(u) => u as i32,
            Scalar::Bool(b) => b as i32,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Scalar::Float(f) => f as u32,
            Scalar::Int(i) => i as u32,
            Scalar::Uint(u) => u,
            Scalar::Bool(b) => b as u32,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Scalar::Float(f) => f != 0.0,
            Scalar::Int(i) => i != 0,
            Scalar::Uint(u) => u != 0,
            Scalar::Bool(b) => b,
        }
    }

    // Constructor conversion, such as `uint(i)`.
    fn convert(self, basic_type: BasicType) -> Result<Scalar, EmulationError> {
        match basic_type {
            BasicType::Float => Ok(Scalar::Float(self.as_f32())),
            BasicType::Int => Ok(Scalar::Int(self.as_i32())),
            BasicType::Uint => Ok(Scalar::Uint(self.as_u32())),
            BasicType::Bool => Ok(Scalar::Bool(self.as_bool())),
            BasicType::Void => Err(EmulationError::Unsupported("void values")),
        }
    }
}

impl From<ConstantValue> for Scalar {
    fn from(value: ConstantValue) -> Scalar {
        match value {
            ConstantValue::Float(f) => Scalar::Float(f),
            ConstantValue::Int(i) => Scalar::Int(i),
            ConstantValue::Uint(u) => Scalar::Uint(u),
            ConstantValue::Bool(b) => Scalar::Bool(b),
        }
    }
}

fn scalar_type_and_size(
    ir_meta: &IRMeta,
    type_id: TypeId,
) -> Result<(BasicType, u32), EmulationError> {
    match ir_meta.get_type(type_id) {
        &Type::Scalar(basic_type) => Ok((basic_type, 1)),
        &Type::Vector(element_type_id, count) => {
            Ok((ir_meta.get_type(element_type_id).get_scalar_basic_type(), count))
        }
        Type::Image(..) => Err(EmulationError::Unsupported("image values")),
        Type::Array(..) => Err(EmulationError::Unsupported("arrays")),
    }
}

fn zero_value(ir_meta: &IRMeta, type_id: TypeId) -> Result<Value, EmulationError> {
    let (basic_type, size) = scalar_type_and_size(ir_meta, type_id)?;
    let zero = Scalar::zero(basic_type)?;
    Ok(SmallVec::from_elem(zero, size as usize))
}

// Applies `op` per component.  A scalar operand is applied to every component of the other.
fn component_wise<Op>(lhs: &Value, rhs: &Value, op: Op) -> Result<Value, EmulationError>
where
    Op: Fn(Scalar, Scalar) -> Result<Scalar, EmulationError>,
{
    let size = lhs.len().max(rhs.len());
    if (lhs.len() != size && lhs.len() != 1) || (rhs.len() != size && rhs.len() != 1) {
        return Err(EmulationError::TypeMismatch("operands have different sizes"));
    }
    let component = |value: &Value, index: usize| value[if value.len() == 1 { 0 } else { index }];
    (0..size).map(|index| op(component(lhs, index), component(rhs, index))).collect()
}

fn map_components<Op>(value: &Value, op: Op) -> Value
where
    Op: Fn(Scalar) -> Scalar,
{
    value.iter().map(|&component| op(component)).collect()
}

fn shift_amount(amount: Scalar) -> Result<u32, EmulationError> {
    match amount {
        Scalar::Int(i) => Ok(i as u32),
        Scalar::Uint(u) => Ok(u),
        _ => Err(EmulationError::TypeMismatch("shift amount is not an integer")),
    }
}

fn binary_scalar(op: BinaryOpCode, lhs: Scalar, rhs: Scalar) -> Result<Scalar, EmulationError> {
    use Scalar::*;
    let result = match (op, lhs, rhs) {
        (BinaryOpCode::Add, Float(a), Float(b)) => Float(a + b),
        (BinaryOpCode::Add, Int(a), Int(b)) => Int(a.wrapping_add(b)),
        (BinaryOpCode::Add, Uint(a), Uint(b)) => Uint(a.wrapping_add(b)),
        (BinaryOpCode::Sub, Float(a), Float(b)) => Float(a - b),
        (BinaryOpCode::Sub, Int(a), Int(b)) => Int(a.wrapping_sub(b)),
        (BinaryOpCode::Sub, Uint(a), Uint(b)) => Uint(a.wrapping_sub(b)),
        (BinaryOpCode::Mul, Float(a), Float(b)) => Float(a * b),
        (BinaryOpCode::Mul, Int(a), Int(b)) => Int(a.wrapping_mul(b)),
        (BinaryOpCode::Mul, Uint(a), Uint(b)) => Uint(a.wrapping_mul(b)),
        (BinaryOpCode::Div, Float(a), Float(b)) => Float(a / b),
        (BinaryOpCode::Div | BinaryOpCode::IMod, Int(_), Int(0))
        | (BinaryOpCode::Div | BinaryOpCode::IMod, Uint(_), Uint(0)) => {
            return Err(EmulationError::DivisionByZero);
        }
        (BinaryOpCode::Div, Int(a), Int(b)) => Int(a.wrapping_div(b)),
        (BinaryOpCode::Div, Uint(a), Uint(b)) => Uint(a / b),
        (BinaryOpCode::IMod, Int(a), Int(b)) => Int(a.wrapping_rem(b)),
        (BinaryOpCode::IMod, Uint(a), Uint(b)) => Uint(a % b),
        // Right shifts of signed integers are arithmetic.
        (BinaryOpCode::BitShiftLeft, Int(a), amount) => Int(a.wrapping_shl(shift_amount(amount)?)),
        (BinaryOpCode::BitShiftLeft, Uint(a), amount) => {
            Uint(a.wrapping_shl(shift_amount(amount)?))
        }
        (BinaryOpCode::BitShiftRight, Int(a), amount) => {
            Int(a.wrapping_shr(shift_amount(amount)?))
        }
        (BinaryOpCode::BitShiftRight, Uint(a), amount) => {
            Uint(a.wrapping_shr(shift_amount(amount)?))
        }
        (BinaryOpCode::BitwiseAnd, Int(a), Int(b)) => Int(a & b),
        (BinaryOpCode::BitwiseAnd, Uint(a), Uint(b)) => Uint(a & b),
        (BinaryOpCode::BitwiseOr, Int(a), Int(b)) => Int(a | b),
        (BinaryOpCode::BitwiseOr, Uint(a), Uint(b)) => Uint(a | b),
        (BinaryOpCode::BitwiseXor, Int(a), Int(b)) => Int(a ^ b),
        (BinaryOpCode::BitwiseXor, Uint(a), Uint(b)) => Uint(a ^ b),
        (BinaryOpCode::LogicalXor, Bool(a), Bool(b)) => Bool(a ^ b),
        _ => return Err(EmulationError::TypeMismatch("operands of a binary operator")),
    };
    Ok(result)
}

fn compare(op: BinaryOpCode, lhs: &Value, rhs: &Value) -> Result<bool, EmulationError> {
    if op == BinaryOpCode::Equal || op == BinaryOpCode::NotEqual {
        return Ok((lhs == rhs) == (op == BinaryOpCode::Equal));
    }
    let ordering = match (lhs.as_slice(), rhs.as_slice()) {
        (&[Scalar::Float(a)], &[Scalar::Float(b)]) => a.partial_cmp(&b),
        (&[Scalar::Int(a)], &[Scalar::Int(b)]) => Some(a.cmp(&b)),
        (&[Scalar::Uint(a)], &[Scalar::Uint(b)]) => Some(a.cmp(&b)),
        _ => return Err(EmulationError::TypeMismatch("operands of a comparison")),
    };
    // Comparisons with NaN are false.
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        BinaryOpCode::LessThan => ordering.is_lt(),
        BinaryOpCode::GreaterThan => ordering.is_gt(),
        BinaryOpCode::LessThanEqual => ordering.is_le(),
        _ => ordering.is_ge(),
    })
}

fn unorm8(value: f32) -> u32 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u32
}

// The texel as it is stored in an image of the given format.
fn convert_to_format(format: ImageInternalFormat, texel: &Value) -> Result<Value, EmulationError> {
    if texel.len() != 4 {
        return Err(EmulationError::TypeMismatch("imageStore data is not a 4-component vector"));
    }
    let converted = match format {
        ImageInternalFormat::RGBA8 => {
            map_components(texel, |c| Scalar::Float(unorm8(c.as_f32()) as f32 / 255.0))
        }
        // Out of range values wrap around, as most hardware does.
        ImageInternalFormat::RGBA8I => {
            map_components(texel, |c| Scalar::Int(c.as_i32() as i8 as i32))
        }
        ImageInternalFormat::RGBA8UI => {
            map_components(texel, |c| Scalar::Uint(c.as_u32() as u8 as u32))
        }
        ImageInternalFormat::R32F => vec4(texel[0].as_f32(), 0.0, 0.0, 1.0),
        ImageInternalFormat::R32I => ivec4(texel[0].as_i32(), 0, 0, 1),
        ImageInternalFormat::R32UI => uvec4(texel[0].as_u32(), 0, 0, 1),
    };
    Ok(converted)
}

// What happens after a statement is executed.
enum Flow {
    Next,
    Break,
    Continue,
    Return(Value),
    Discard,
}

pub struct Emulator<'a> {
    ir: &'a IR,
    frag_coord: Value,
    variables: FxHashMap<VariableId, Value>,
    // Per binding, the texels of each storage image by pixel coordinate.
    images: FxHashMap<u32, FxHashMap<(i32, i32), Value>>,
    // Fragment outputs by location.
    attachments: FxHashMap<u32, Value>,
    discarded: bool,
}

impl<'a> Emulator<'a> {
    // Emulates the fragment at the center of the given pixel.
    pub fn new(ir: &'a IR, pixel: (i32, i32)) -> Emulator<'a> {
        Emulator {
            ir,
            frag_coord: vec4(pixel.0 as f32 + 0.5, pixel.1 as f32 + 0.5, 0.5, 1.0),
            variables: FxHashMap::default(),
            images: FxHashMap::default(),
            attachments: FxHashMap::default(),
            discarded: false,
        }
    }

    pub fn set_image_texel(&mut self, binding: u32, coord: (i32, i32), texel: Value) {
        self.images.entry(binding).or_default().insert(coord, texel);
    }
    pub fn image_texel(&self, binding: u32, coord: (i32, i32)) -> Option<&Value> {
        self.images.get(&binding).and_then(|texels| texels.get(&coord))
    }

    pub fn set_attachment(&mut self, location: u32, value: Value) {
        self.attachments.insert(location, value);
    }
    pub fn attachment(&self, location: u32) -> Option<&Value> {
        self.attachments.get(&location)
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    // Run main() once.  The images and attachments persist, so running again emulates another
    // fragment covering the same pixel.
    pub fn run(&mut self) -> Result<(), EmulationError> {
        let ir = self.ir;
        self.variables.clear();
        self.discarded = false;

        let mut outputs = Vec::new();
        for statement in &ir.root.statements {
            let &StatementOp::Declaration(id, ref initializer) = &statement.op else {
                continue;
            };
            let variable = ir.meta.get_variable(id);
            if ir.meta.get_type(variable.type_id).is_image() {
                continue;
            }
            let location = variable.decorations.get_location().unwrap_or(0);
            let value = if variable.decorations.has(Decoration::InputOutput) {
                match self.attachments.get(&location) {
                    Some(value) => value.clone(),
                    None => zero_value(&ir.meta, variable.type_id)?,
                }
            } else {
                match initializer {
                    Some(initializer) => self.evaluate(initializer)?,
                    None => zero_value(&ir.meta, variable.type_id)?,
                }
            };
            if variable.is_fragment_output() {
                outputs.push((id, location));
            }
            self.variables.insert(id, value);
        }

        let main_id = ir
            .meta
            .get_main_function_id()
            .ok_or(EmulationError::UndefinedFunction("main"))?;
        let body = ir.get_function_body(main_id).ok_or(EmulationError::UndefinedFunction("main"))?;
        if let Flow::Discard = self.execute_block(body)? {
            trace!("Fragment is discarded");
            return Ok(());
        }

        for (id, location) in outputs {
            if let Some(value) = self.variables.get(&id) {
                self.attachments.insert(location, value.clone());
            }
        }
        let frag_color = self.variables.iter().find(|(id, _)| {
            ir.meta.get_variable(**id).built_in == Some(BuiltIn::FragColor)
        });
        if let Some((_, value)) = frag_color {
            self.attachments.insert(0, value.clone());
        }
        Ok(())
    }

    fn read_variable(&self, id: VariableId) -> Result<Value, EmulationError> {
        if let Some(value) = self.variables.get(&id) {
            return Ok(value.clone());
        }
        let variable = self.ir.meta.get_variable(id);
        match variable.built_in {
            Some(BuiltIn::FragCoord) => Ok(self.frag_coord.clone()),
            _ => Err(EmulationError::UndefinedVariable(variable.name.name)),
        }
    }

    // Assign to an l-value: a variable or a swizzle of an l-value.
    fn write(&mut self, lhs: &Expression, value: Value) -> Result<(), EmulationError> {
        match &lhs.op {
            &ExpressionOp::Symbol(id) => {
                self.variables.insert(id, value);
                Ok(())
            }
            ExpressionOp::Swizzle(operand, components) => {
                if components.len() != value.len() {
                    return Err(EmulationError::TypeMismatch("swizzled assignment"));
                }
                let mut current = self.evaluate(operand)?;
                for (&component, &scalar) in components.iter().zip(value.iter()) {
                    let slot = current
                        .get_mut(component as usize)
                        .ok_or(EmulationError::TypeMismatch("swizzled assignment"))?;
                    *slot = scalar;
                }
                self.write(operand, current)
            }
            _ => Err(EmulationError::Unsupported("assignment to a non l-value")),
        }
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, EmulationError> {
        let ir = self.ir;
        match &expression.op {
            &ExpressionOp::Symbol(id) => self.read_variable(id),
            &ExpressionOp::Constant(value) => Ok(SmallVec::from_elem(value.into(), 1)),
            ExpressionOp::Swizzle(operand, components) => {
                let value = self.evaluate(operand)?;
                components
                    .iter()
                    .map(|&component| {
                        value
                            .get(component as usize)
                            .copied()
                            .ok_or(EmulationError::TypeMismatch("swizzle out of range"))
                    })
                    .collect()
            }
            &ExpressionOp::Unary(op, ref operand) => {
                let value = self.evaluate(operand)?;
                value
                    .iter()
                    .map(|&component| match (op, component) {
                        (UnaryOpCode::Negate, Scalar::Float(f)) => Ok(Scalar::Float(-f)),
                        (UnaryOpCode::Negate, Scalar::Int(i)) => Ok(Scalar::Int(i.wrapping_neg())),
                        (UnaryOpCode::Negate, Scalar::Uint(u)) => {
                            Ok(Scalar::Uint(u.wrapping_neg()))
                        }
                        (UnaryOpCode::LogicalNot, Scalar::Bool(b)) => Ok(Scalar::Bool(!b)),
                        (UnaryOpCode::BitwiseNot, Scalar::Int(i)) => Ok(Scalar::Int(!i)),
                        (UnaryOpCode::BitwiseNot, Scalar::Uint(u)) => Ok(Scalar::Uint(!u)),
                        _ => Err(EmulationError::TypeMismatch("operand of a unary operator")),
                    })
                    .collect()
            }
            &ExpressionOp::Binary(op, ref lhs, ref rhs) => {
                let lhs = self.evaluate(lhs)?;
                // && and || short circuit.
                if op == BinaryOpCode::LogicalAnd || op == BinaryOpCode::LogicalOr {
                    let short_circuit = lhs[..] == [Scalar::Bool(op == BinaryOpCode::LogicalOr)];
                    return if short_circuit { Ok(lhs) } else { self.evaluate(rhs) };
                }
                let rhs = self.evaluate(rhs)?;
                if op.is_comparison() {
                    let result = compare(op, &lhs, &rhs)?;
                    return Ok(SmallVec::from_elem(Scalar::Bool(result), 1));
                }
                component_wise(&lhs, &rhs, |a, b| binary_scalar(op, a, b))
            }
            ExpressionOp::Assign(lhs, rhs) => {
                let value = self.evaluate(rhs)?;
                self.write(lhs, value.clone())?;
                Ok(value)
            }
            &ExpressionOp::CompoundAssign(op, ref lhs, ref rhs) => {
                let current = self.evaluate(lhs)?;
                let operand = self.evaluate(rhs)?;
                let value = component_wise(&current, &operand, |a, b| binary_scalar(op, a, b))?;
                self.write(lhs, value.clone())?;
                Ok(value)
            }
            &ExpressionOp::Construct(type_id, ref args) => {
                let (basic_type, size) = scalar_type_and_size(&ir.meta, type_id)?;
                let mut components = Value::new();
                for arg in args {
                    components.extend(self.evaluate(arg)?);
                }
                if components.len() == 1 {
                    components = SmallVec::from_elem(components[0], size as usize);
                }
                if components.len() < size as usize {
                    return Err(EmulationError::TypeMismatch("too few constructor arguments"));
                }
                components
                    .iter()
                    .take(size as usize)
                    .map(|component| component.convert(basic_type))
                    .collect()
            }
            &ExpressionOp::Call(function_id, ref args) => self.call(function_id, args),
            &ExpressionOp::BuiltIn(op, ref args) => self.built_in(op, args),
            ExpressionOp::Ternary(condition, true_expression, false_expression) => {
                let condition = self.evaluate_condition(condition)?;
                self.evaluate(if condition { true_expression } else { false_expression })
            }
        }
    }

    fn evaluate_condition(&mut self, condition: &Expression) -> Result<bool, EmulationError> {
        match self.evaluate(condition)?.as_slice() {
            &[Scalar::Bool(value)] => Ok(value),
            _ => Err(EmulationError::TypeMismatch("condition is not a bool")),
        }
    }

    fn call(
        &mut self,
        function_id: FunctionId,
        args: &[Expression],
    ) -> Result<Value, EmulationError> {
        let ir = self.ir;
        let function = ir.meta.get_function(function_id);
        let body = ir
            .get_function_body(function_id)
            .ok_or(EmulationError::UndefinedFunction(function.name.name))?;

        // Arguments are evaluated before any parameter is bound.
        let mut values = Vec::with_capacity(args.len());
        for (param, arg) in function.params.iter().zip(args) {
            let value = match param.direction {
                FunctionParamDirection::Output => {
                    zero_value(&ir.meta, ir.meta.get_variable(param.variable_id).type_id)?
                }
                _ => self.evaluate(arg)?,
            };
            values.push(value);
        }
        for (param, value) in function.params.iter().zip(values) {
            self.variables.insert(param.variable_id, value);
        }

        let result = match self.execute_block(body)? {
            Flow::Return(value) => value,
            _ => Value::new(),
        };
        if self.discarded {
            return Ok(result);
        }

        for (param, arg) in function.params.iter().zip(args) {
            if param.direction != FunctionParamDirection::Input {
                let value = self.read_variable(param.variable_id)?;
                self.write(arg, value)?;
            }
        }
        Ok(result)
    }

    fn image_binding_and_format(
        &self,
        image: &Expression,
    ) -> Result<(u32, ImageInternalFormat), EmulationError> {
        let ir = self.ir;
        let id = image.get_symbol().ok_or(EmulationError::Unsupported("image expressions"))?;
        let variable = ir.meta.get_variable(id);
        match (variable.decorations.get_binding(), variable.decorations.get_image_internal_format())
        {
            (Some(binding), Some(format)) => Ok((binding, format)),
            _ => Err(EmulationError::Unsupported("images without binding or format")),
        }
    }

    fn image_coord(&mut self, coord: &Expression) -> Result<(i32, i32), EmulationError> {
        match self.evaluate(coord)?.as_slice() {
            &[Scalar::Int(x), Scalar::Int(y)] => Ok((x, y)),
            _ => Err(EmulationError::TypeMismatch("image coordinate is not an ivec2")),
        }
    }

    fn built_in(
        &mut self,
        op: BuiltInOpCode,
        args: &[Expression],
    ) -> Result<Value, EmulationError> {
        let arg_count = match op {
            BuiltInOpCode::ImageLoad | BuiltInOpCode::Min | BuiltInOpCode::Max => 2,
            BuiltInOpCode::ImageStore | BuiltInOpCode::Clamp => 3,
            BuiltInOpCode::Floor | BuiltInOpCode::PackUnorm4x8 | BuiltInOpCode::UnpackUnorm4x8 => 1,
            _ => 0,
        };
        if args.len() < arg_count {
            return Err(EmulationError::TypeMismatch("too few built-in arguments"));
        }

        let min = |a: Scalar, b: Scalar| match (a, b) {
            (Scalar::Float(a), Scalar::Float(b)) => Ok(Scalar::Float(a.min(b))),
            (Scalar::Int(a), Scalar::Int(b)) => Ok(Scalar::Int(a.min(b))),
            (Scalar::Uint(a), Scalar::Uint(b)) => Ok(Scalar::Uint(a.min(b))),
            _ => Err(EmulationError::TypeMismatch("operands of min")),
        };
        let max = |a: Scalar, b: Scalar| match (a, b) {
            (Scalar::Float(a), Scalar::Float(b)) => Ok(Scalar::Float(a.max(b))),
            (Scalar::Int(a), Scalar::Int(b)) => Ok(Scalar::Int(a.max(b))),
            (Scalar::Uint(a), Scalar::Uint(b)) => Ok(Scalar::Uint(a.max(b))),
            _ => Err(EmulationError::TypeMismatch("operands of max")),
        };

        match op {
            BuiltInOpCode::PixelLocalLoadANGLE | BuiltInOpCode::PixelLocalStoreANGLE => {
                Err(EmulationError::UnsupportedBuiltIn(op.name()))
            }
            BuiltInOpCode::ImageLoad => {
                let (binding, format) = self.image_binding_and_format(&args[0])?;
                let coord = self.image_coord(&args[1])?;
                match self.image_texel(binding, coord) {
                    Some(texel) => Ok(texel.clone()),
                    None => convert_to_format(format, &uvec4(0, 0, 0, 0)),
                }
            }
            BuiltInOpCode::ImageStore => {
                let (binding, format) = self.image_binding_and_format(&args[0])?;
                let coord = self.image_coord(&args[1])?;
                let data = self.evaluate(&args[2])?;
                let texel = convert_to_format(format, &data)?;
                self.set_image_texel(binding, coord, texel);
                Ok(Value::new())
            }
            // A single fragment is emulated at a time, so synchronization has no effect.
            BuiltInOpCode::MemoryBarrierImage
            | BuiltInOpCode::BeginInvocationInterlockNV
            | BuiltInOpCode::EndInvocationInterlockNV
            | BuiltInOpCode::BeginFragmentShaderOrderingINTEL
            | BuiltInOpCode::BeginInvocationInterlockARB
            | BuiltInOpCode::EndInvocationInterlockARB => Ok(Value::new()),
            BuiltInOpCode::Clamp => {
                let value = self.evaluate(&args[0])?;
                let low = self.evaluate(&args[1])?;
                let high = self.evaluate(&args[2])?;
                let clamped_low = component_wise(&value, &low, max)?;
                component_wise(&clamped_low, &high, min)
            }
            BuiltInOpCode::Min => {
                let lhs = self.evaluate(&args[0])?;
                let rhs = self.evaluate(&args[1])?;
                component_wise(&lhs, &rhs, min)
            }
            BuiltInOpCode::Max => {
                let lhs = self.evaluate(&args[0])?;
                let rhs = self.evaluate(&args[1])?;
                component_wise(&lhs, &rhs, max)
            }
            BuiltInOpCode::Floor => {
                let value = self.evaluate(&args[0])?;
                Ok(map_components(&value, |c| Scalar::Float(c.as_f32().floor())))
            }
            BuiltInOpCode::PackUnorm4x8 => {
                let value = self.evaluate(&args[0])?;
                if value.len() != 4 {
                    return Err(EmulationError::TypeMismatch("packUnorm4x8 takes a vec4"));
                }
                let packed = value
                    .iter()
                    .enumerate()
                    .fold(0, |packed, (index, c)| packed | unorm8(c.as_f32()) << (index * 8));
                Ok(SmallVec::from_elem(Scalar::Uint(packed), 1))
            }
            BuiltInOpCode::UnpackUnorm4x8 => {
                let packed = match self.evaluate(&args[0])?.as_slice() {
                    &[Scalar::Uint(packed)] => packed,
                    _ => return Err(EmulationError::TypeMismatch("unpackUnorm4x8 takes a uint")),
                };
                let channel = |index: u32| ((packed >> (index * 8)) & 0xff) as f32 / 255.0;
                Ok(vec4(channel(0), channel(1), channel(2), channel(3)))
            }
        }
    }

    fn execute_block(&mut self, block: &Block) -> Result<Flow, EmulationError> {
        for statement in &block.statements {
            let flow = self.execute_statement(statement)?;
            if self.discarded {
                return Ok(Flow::Discard);
            }
            if !matches!(flow, Flow::Next) {
                return Ok(flow);
            }
        }
        Ok(Flow::Next)
    }

    fn execute_statement(&mut self, statement: &Statement) -> Result<Flow, EmulationError> {
        let ir = self.ir;
        match &statement.op {
            &StatementOp::Declaration(id, ref initializer) => {
                let value = match initializer {
                    Some(initializer) => self.evaluate(initializer)?,
                    None => zero_value(&ir.meta, ir.meta.get_variable(id).type_id)?,
                };
                self.variables.insert(id, value);
                Ok(Flow::Next)
            }
            StatementOp::Expression(expression) => {
                self.evaluate(expression)?;
                Ok(Flow::Next)
            }
            StatementOp::Block(block) => self.execute_block(block),
            StatementOp::If(condition, true_block, false_block) => {
                if self.evaluate_condition(condition)? {
                    self.execute_block(true_block)
                } else if let Some(false_block) = false_block {
                    self.execute_block(false_block)
                } else {
                    Ok(Flow::Next)
                }
            }
            StatementOp::Loop(loop_desc) => self.execute_loop(loop_desc),
            StatementOp::Return(value) => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::new(),
                };
                Ok(Flow::Return(value))
            }
            StatementOp::Discard => {
                self.discarded = true;
                Ok(Flow::Discard)
            }
            StatementOp::Break => Ok(Flow::Break),
            StatementOp::Continue => Ok(Flow::Continue),
            StatementOp::FunctionDefinition(..) => {
                Err(EmulationError::Unsupported("nested function definitions"))
            }
        }
    }

    fn execute_loop(&mut self, loop_desc: &Loop) -> Result<Flow, EmulationError> {
        if let Some(init) = &loop_desc.init {
            self.execute_statement(init)?;
        }

        let mut iterations = 0;
        loop {
            let check_condition = loop_desc.kind != LoopKind::DoWhile || iterations > 0;
            if check_condition {
                if let Some(condition) = &loop_desc.condition {
                    if !self.evaluate_condition(condition)? {
                        return Ok(Flow::Next);
                    }
                }
            }

            iterations += 1;
            if iterations > MAX_LOOP_ITERATIONS {
                return Err(EmulationError::IterationLimit(MAX_LOOP_ITERATIONS));
            }

            match self.execute_block(&loop_desc.body)? {
                Flow::Next | Flow::Continue => {}
                Flow::Break => return Ok(Flow::Next),
                flow @ (Flow::Return(_) | Flow::Discard) => return Ok(flow),
            }

            if let Some(step) = &loop_desc.step {
                self.evaluate(step)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    #[test]
    fn integer_arithmetic_wraps_and_shifts_keep_sign() {
        let mut builder = Builder::new(ShaderType::Fragment, 310);
        let result = builder.declare_interface_variable(
            "result",
            TYPE_ID_IVEC4,
            Precision::High,
            Decorations::new(vec![Decoration::Output, Decoration::Location(0)]),
        );
        let main_id = builder.new_function("main", vec![], TYPE_ID_VOID);
        builder.begin_function(main_id);
        // result = ivec4(-8 >> 1u, 0x7fffffff + 1, 200 << 24u >> 24u, 7 % 3);
        let lhs = builder.int(-8);
        let rhs = builder.uint(1);
        let x = builder.binary(BinaryOpCode::BitShiftRight, lhs, rhs);
        let lhs = builder.int(i32::MAX);
        let rhs = builder.int(1);
        let y = builder.binary(BinaryOpCode::Add, lhs, rhs);
        let lhs = builder.int(200);
        let rhs = builder.uint(24);
        let shifted = builder.binary(BinaryOpCode::BitShiftLeft, lhs, rhs);
        let rhs = builder.uint(24);
        let z = builder.binary(BinaryOpCode::BitShiftRight, shifted, rhs);
        let lhs = builder.int(7);
        let rhs = builder.int(3);
        let w = builder.binary(BinaryOpCode::IMod, lhs, rhs);
        let value = builder.construct(TYPE_ID_IVEC4, vec![x, y, z, w]);
        let assignment = builder.assign(result, value);
        builder.add_expression_statement(assignment);
        builder.end_function();
        let ir = builder.finish();

        let mut emulator = Emulator::new(&ir, (0, 0));
        emulator.run().unwrap();
        assert_eq!(emulator.attachment(0), Some(&ivec4(-4, i32::MIN, -56, 1)));
    }

    #[test]
    fn loops_and_swizzled_assignment() {
        let mut builder = Builder::new(ShaderType::Fragment, 310);
        let color = builder.declare_interface_variable(
            "color",
            TYPE_ID_VEC4,
            Precision::High,
            Decorations::new(vec![Decoration::Output]),
        );
        let main_id = builder.new_function("main", vec![], TYPE_ID_VOID);
        builder.begin_function(main_id);
        // for (int i = 0; i < 3; i += 1) { color.y = color.y + 0.5; }
        let i = builder.new_local_variable("i", TYPE_ID_INT, Precision::High);
        let zero = builder.int(0);
        let init = builder.declaration(i, Some(zero));
        let lhs = builder.variable(i);
        let three = builder.int(3);
        let condition = builder.binary(BinaryOpCode::LessThan, lhs, three);
        let one = builder.int(1);
        let step = builder.compound_assign(BinaryOpCode::Add, i, one);
        builder.begin_for(Some(init), Some(condition), Some(step));
        let current = builder.variable(color);
        let current_y = builder.swizzle(current, &[1]);
        let half = builder.float(0.5);
        let sum = builder.binary(BinaryOpCode::Add, current_y, half);
        let target = builder.variable(color);
        let target_y = builder.swizzle(target, &[1]);
        let assignment = builder.assign_to(target_y, sum);
        builder.add_expression_statement(assignment);
        builder.end_loop();
        builder.end_function();
        let ir = builder.finish();

        let mut emulator = Emulator::new(&ir, (3, 4));
        emulator.run().unwrap();
        assert_eq!(emulator.attachment(0), Some(&vec4(0.0, 1.5, 0.0, 0.0)));
    }

    #[test]
    fn image_formats_quantize_and_wrap() {
        let texel = vec4(0.5, -1.0, 2.0, 0.2);
        let stored = convert_to_format(ImageInternalFormat::RGBA8, &texel).unwrap();
        assert_eq!(stored, vec4(128.0 / 255.0, 0.0, 1.0, 51.0 / 255.0));

        let stored =
            convert_to_format(ImageInternalFormat::RGBA8I, &ivec4(200, -200, 5, -1)).unwrap();
        assert_eq!(stored, ivec4(-56, 56, 5, -1));

        let stored = convert_to_format(ImageInternalFormat::R32UI, &uvec4(7, 8, 9, 10)).unwrap();
        assert_eq!(stored, uvec4(7, 0, 0, 1));
    }

    #[test]
    fn pixel_local_storage_cannot_be_emulated() {
        let mut builder = Builder::new(ShaderType::Fragment, 310);
        let pls = builder.declare_pixel_local_storage(
            "pls",
            ImageBasicType::Float,
            ImageInternalFormat::RGBA8,
            0,
            Precision::High,
        );
        let main_id = builder.new_function("main", vec![], TYPE_ID_VOID);
        builder.begin_function(main_id);
        let load = builder.pixel_local_load(pls);
        builder.add_expression_statement(load);
        builder.end_function();
        let ir = builder.finish();

        let error = Emulator::new(&ir, (0, 0)).run().unwrap_err();
        assert!(matches!(error, EmulationError::UnsupportedBuiltIn("pixelLocalLoadANGLE")));
    }
}
