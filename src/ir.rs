// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// The IR itself, consisting of a tree of statements and expressions, and the tables of types,
// variables and functions that the tree refers to.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

// Strong types for ids that refer to variables, types, functions and tree nodes.  They are used to
// look information up in different tables.
#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct VariableId {
    pub id: u32,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct FunctionId {
    pub id: u32,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct TypeId {
    pub id: u32,
}

// Every statement and expression in the tree has a unique node id.  Transformations refer to nodes
// by id when queuing replacements, because the nodes themselves are borrowed while the tree is
// being traversed.
#[derive(Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct NodeId {
    pub id: u32,
}

// Fixed enums for faster type lookup
// Note: if more types are added here or the values are changed, adjust MAX_PREDEFINED_TYPE_ID.
pub const TYPE_ID_VOID: TypeId = TypeId { id: 0 };
pub const TYPE_ID_FLOAT: TypeId = TypeId { id: 1 };
pub const TYPE_ID_INT: TypeId = TypeId { id: 2 };
pub const TYPE_ID_UINT: TypeId = TypeId { id: 3 };
pub const TYPE_ID_BOOL: TypeId = TypeId { id: 4 };
// Note: vector type ids must be consecutive
pub const TYPE_ID_VEC2: TypeId = TypeId { id: 5 };
pub const TYPE_ID_VEC3: TypeId = TypeId { id: 6 };
pub const TYPE_ID_VEC4: TypeId = TypeId { id: 7 };
pub const TYPE_ID_IVEC2: TypeId = TypeId { id: 8 };
pub const TYPE_ID_IVEC3: TypeId = TypeId { id: 9 };
pub const TYPE_ID_IVEC4: TypeId = TypeId { id: 10 };
pub const TYPE_ID_UVEC2: TypeId = TypeId { id: 11 };
pub const TYPE_ID_UVEC3: TypeId = TypeId { id: 12 };
pub const TYPE_ID_UVEC4: TypeId = TypeId { id: 13 };
pub const TYPE_ID_BVEC2: TypeId = TypeId { id: 14 };
pub const TYPE_ID_BVEC3: TypeId = TypeId { id: 15 };
pub const TYPE_ID_BVEC4: TypeId = TypeId { id: 16 };
const MAX_PREDEFINED_TYPE_ID: u32 = TYPE_ID_BVEC4.id;

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum UnaryOpCode {
    Negate,
    LogicalNot,
    BitwiseNot,
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum BinaryOpCode {
    Add,
    Sub,
    Mul,
    Div,
    IMod,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    BitShiftLeft,
    BitShiftRight,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
}

impl BinaryOpCode {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOpCode::Equal
                | BinaryOpCode::NotEqual
                | BinaryOpCode::LessThan
                | BinaryOpCode::GreaterThan
                | BinaryOpCode::LessThanEqual
                | BinaryOpCode::GreaterThanEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            BinaryOpCode::LogicalAnd | BinaryOpCode::LogicalOr | BinaryOpCode::LogicalXor
        )
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOpCode::BitShiftLeft | BinaryOpCode::BitShiftRight)
    }
}

// Built-in functions that are relevant to pixel local storage and its lowering.
#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum BuiltInOpCode {
    // ANGLE_shader_pixel_local_storage, which is what's being lowered.
    PixelLocalLoadANGLE,
    PixelLocalStoreANGLE,
    // Storage images
    ImageLoad,
    ImageStore,
    MemoryBarrierImage,
    // Common functions
    Clamp,
    Min,
    Max,
    Floor,
    PackUnorm4x8,
    UnpackUnorm4x8,
    // Fragment synchronization
    BeginInvocationInterlockNV,
    EndInvocationInterlockNV,
    BeginFragmentShaderOrderingINTEL,
    BeginInvocationInterlockARB,
    EndInvocationInterlockARB,
}

impl BuiltInOpCode {
    // The name of the built-in as it appears in GLSL.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltInOpCode::PixelLocalLoadANGLE => "pixelLocalLoadANGLE",
            BuiltInOpCode::PixelLocalStoreANGLE => "pixelLocalStoreANGLE",
            BuiltInOpCode::ImageLoad => "imageLoad",
            BuiltInOpCode::ImageStore => "imageStore",
            BuiltInOpCode::MemoryBarrierImage => "memoryBarrierImage",
            BuiltInOpCode::Clamp => "clamp",
            BuiltInOpCode::Min => "min",
            BuiltInOpCode::Max => "max",
            BuiltInOpCode::Floor => "floor",
            BuiltInOpCode::PackUnorm4x8 => "packUnorm4x8",
            BuiltInOpCode::UnpackUnorm4x8 => "unpackUnorm4x8",
            BuiltInOpCode::BeginInvocationInterlockNV => "beginInvocationInterlockNV",
            BuiltInOpCode::EndInvocationInterlockNV => "endInvocationInterlockNV",
            BuiltInOpCode::BeginFragmentShaderOrderingINTEL => "beginFragmentShaderOrderingINTEL",
            BuiltInOpCode::BeginInvocationInterlockARB => "beginInvocationInterlockARB",
            BuiltInOpCode::EndInvocationInterlockARB => "endInvocationInterlockARB",
        }
    }

    // The first ESSL version that exposes the built-in.  The synchronization built-ins are only
    // ever generated by ANGLE, and are available to the backends that need them regardless of
    // version, as long as storage images are.
    pub fn min_shader_version(&self) -> i32 {
        match self {
            BuiltInOpCode::Clamp
            | BuiltInOpCode::Min
            | BuiltInOpCode::Max
            | BuiltInOpCode::Floor => 100,
            BuiltInOpCode::PixelLocalLoadANGLE
            | BuiltInOpCode::PixelLocalStoreANGLE
            | BuiltInOpCode::PackUnorm4x8
            | BuiltInOpCode::UnpackUnorm4x8 => 300,
            BuiltInOpCode::ImageLoad
            | BuiltInOpCode::ImageStore
            | BuiltInOpCode::MemoryBarrierImage
            | BuiltInOpCode::BeginInvocationInterlockNV
            | BuiltInOpCode::EndInvocationInterlockNV
            | BuiltInOpCode::BeginFragmentShaderOrderingINTEL
            | BuiltInOpCode::BeginInvocationInterlockARB
            | BuiltInOpCode::EndInvocationInterlockARB => 310,
        }
    }

    pub fn is_pixel_local_storage(&self) -> bool {
        matches!(self, BuiltInOpCode::PixelLocalLoadANGLE | BuiltInOpCode::PixelLocalStoreANGLE)
    }

    pub fn is_image(&self) -> bool {
        matches!(self, BuiltInOpCode::ImageLoad | BuiltInOpCode::ImageStore)
    }
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ConstantValue {
    Float(f32),
    Int(i32),
    Uint(u32),
    Bool(bool),
}

impl ConstantValue {
    pub fn get_type_id(&self) -> TypeId {
        match self {
            ConstantValue::Float(_) => TYPE_ID_FLOAT,
            ConstantValue::Int(_) => TYPE_ID_INT,
            ConstantValue::Uint(_) => TYPE_ID_UINT,
            ConstantValue::Bool(_) => TYPE_ID_BOOL,
        }
    }
}

// Vector component selection.  Components are 0 to 3 for x, y, z and w.
pub type Swizzle = SmallVec<[u32; 4]>;

#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ExpressionOp {
    Symbol(VariableId),
    Constant(ConstantValue),
    Swizzle(Box<Expression>, Swizzle),
    Unary(UnaryOpCode, Box<Expression>),
    Binary(BinaryOpCode, Box<Expression>, Box<Expression>),
    Assign(Box<Expression>, Box<Expression>),
    // x op= y
    CompoundAssign(BinaryOpCode, Box<Expression>, Box<Expression>),
    Construct(TypeId, Vec<Expression>),
    Call(FunctionId, Vec<Expression>),
    BuiltIn(BuiltInOpCode, Vec<Expression>),
    Ternary(Box<Expression>, Box<Expression>, Box<Expression>),
}

#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Expression {
    pub node_id: NodeId,
    pub op: ExpressionOp,
}

impl Expression {
    pub fn new(node_id: NodeId, op: ExpressionOp) -> Expression {
        Expression { node_id, op }
    }

    pub fn get_symbol(&self) -> Option<VariableId> {
        match self.op {
            ExpressionOp::Symbol(id) => Some(id),
            _ => None,
        }
    }

    // The direct sub-expressions, in evaluation order.
    pub fn operands(&self) -> Vec<&Expression> {
        match &self.op {
            ExpressionOp::Symbol(_) | ExpressionOp::Constant(_) => Vec::new(),
            ExpressionOp::Swizzle(operand, _) | ExpressionOp::Unary(_, operand) => {
                vec![operand.as_ref()]
            }
            ExpressionOp::Binary(_, lhs, rhs)
            | ExpressionOp::Assign(lhs, rhs)
            | ExpressionOp::CompoundAssign(_, lhs, rhs) => vec![lhs.as_ref(), rhs.as_ref()],
            ExpressionOp::Construct(_, args)
            | ExpressionOp::Call(_, args)
            | ExpressionOp::BuiltIn(_, args) => args.iter().collect(),
            ExpressionOp::Ternary(condition, true_expr, false_expr) => {
                vec![condition.as_ref(), true_expr.as_ref(), false_expr.as_ref()]
            }
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Expression> {
        match &mut self.op {
            ExpressionOp::Symbol(_) | ExpressionOp::Constant(_) => Vec::new(),
            ExpressionOp::Swizzle(operand, _) | ExpressionOp::Unary(_, operand) => {
                vec![operand.as_mut()]
            }
            ExpressionOp::Binary(_, lhs, rhs)
            | ExpressionOp::Assign(lhs, rhs)
            | ExpressionOp::CompoundAssign(_, lhs, rhs) => vec![lhs.as_mut(), rhs.as_mut()],
            ExpressionOp::Construct(_, args)
            | ExpressionOp::Call(_, args)
            | ExpressionOp::BuiltIn(_, args) => args.iter_mut().collect(),
            ExpressionOp::Ternary(condition, true_expr, false_expr) => {
                vec![condition.as_mut(), true_expr.as_mut(), false_expr.as_mut()]
            }
        }
    }
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum LoopKind {
    For,
    While,
    DoWhile,
}

#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Loop {
    pub kind: LoopKind,
    // Only for `for` loops.
    pub init: Option<Box<Statement>>,
    pub condition: Option<Expression>,
    // Only for `for` loops.
    pub step: Option<Expression>,
    pub body: Block,
}

#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum StatementOp {
    // Declaration of a variable, with an optional initializer.  Global declarations are found in
    // the root block, local declarations in function bodies.
    Declaration(VariableId, Option<Expression>),
    Expression(Expression),
    Block(Block),
    If(Expression, Block, Option<Block>),
    Loop(Loop),
    Return(Option<Expression>),
    Discard,
    Break,
    Continue,
    // Only found in the root block.
    FunctionDefinition(FunctionId, Block),
}

#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Statement {
    pub node_id: NodeId,
    pub op: StatementOp,
}

impl Statement {
    pub fn new(node_id: NodeId, op: StatementOp) -> Statement {
        Statement { node_id, op }
    }

    pub fn get_declared_variable(&self) -> Option<VariableId> {
        match self.op {
            StatementOp::Declaration(id, _) => Some(id),
            _ => None,
        }
    }

    pub fn get_function_definition(&self) -> Option<(FunctionId, &Block)> {
        match &self.op {
            StatementOp::FunctionDefinition(id, body) => Some((*id, body)),
            _ => None,
        }
    }
}

#[derive(Clone, Default)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new() -> Block {
        Block { statements: Vec::new() }
    }

    pub fn add_statement(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn insert_statements(&mut self, position: usize, statements: Vec<Statement>) {
        self.statements.splice(position..position, statements);
    }

    // Whether the block ends in a branch, after which any statement is dead code.
    pub fn is_terminated(&self) -> bool {
        matches!(
            self.statements.last().map(|statement| &statement.op),
            Some(
                StatementOp::Return(_)
                    | StatementOp::Discard
                    | StatementOp::Break
                    | StatementOp::Continue
            )
        )
    }
}

// Where a name came from.  This affects how it is output.
#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum NameSource {
    // A name in the shader itself, which corresponds to an interface variable (input, output,
    // uniform etc).  The backend may rely on this name being output as is.
    ShaderInterface,
    // A name that must be output exactly, because it's an ANGLE-internal name or `main`.
    Internal,
    // A name that can freely be changed because it's internal to the shader.
    Temporary,
}

// A name associated with a variable or function.
#[derive(Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Name {
    // Either a slice into the shader source or a static name.  Either way, it lives for the
    // duration of the compilation.
    pub name: &'static str,
    pub source: NameSource,
}

impl Name {
    // Create a temp name.  Duplicate names are allowed, and will be made distinguishable if
    // generating text.
    pub fn new_temp(name: &'static str) -> Name {
        Name { name, source: NameSource::Temporary }
    }
    // A name that must be preserved in some predictable form in the output.
    pub fn new_interface(name: &'static str) -> Name {
        Name { name, source: NameSource::ShaderInterface }
    }
    // A name that must be preserved exactly in the output, for example `main`.
    pub fn new_exact(name: &'static str) -> Name {
        Name { name, source: NameSource::Internal }
    }
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum VariableScope {
    Global,
    Local,
    FunctionParam,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum BuiltIn {
    // The BuiltIn enum value X corresponds to gl_X in GLSL.
    FragCoord,
    FragColor,
}

impl BuiltIn {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltIn::FragCoord => "gl_FragCoord",
            BuiltIn::FragColor => "gl_FragColor",
        }
    }
}

// Information surrounding a variable.
#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Variable {
    pub name: Name,
    pub type_id: TypeId,
    pub precision: Precision,
    pub decorations: Decorations,
    pub built_in: Option<BuiltIn>,
    pub scope: VariableScope,
}

impl Variable {
    pub fn new(
        name: Name,
        type_id: TypeId,
        precision: Precision,
        decorations: Decorations,
        built_in: Option<BuiltIn>,
        scope: VariableScope,
    ) -> Variable {
        Variable { name, type_id, precision, decorations, built_in, scope }
    }

    pub fn is_fragment_output(&self) -> bool {
        self.decorations.has(Decoration::Output) || self.decorations.has(Decoration::InputOutput)
    }
}

// Whether a function parameter is `in`, `out` or `inout`.
#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum FunctionParamDirection {
    Input,
    Output,
    InputOutput,
}

#[derive(Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct FunctionParam {
    pub variable_id: VariableId,
    pub direction: FunctionParamDirection,
}

impl FunctionParam {
    pub fn new(variable_id: VariableId, direction: FunctionParamDirection) -> FunctionParam {
        FunctionParam { variable_id, direction }
    }
}

// A function is defined by its name, parameters and return type.  The body is found in the
// `FunctionDefinition` statement in the root block.
#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Function {
    pub name: Name,
    pub params: Vec<FunctionParam>,
    pub return_type_id: TypeId,
    pub return_precision: Precision,
}

impl Function {
    pub fn new(
        name: &'static str,
        params: Vec<FunctionParam>,
        return_type_id: TypeId,
        return_precision: Precision,
    ) -> Function {
        Function {
            // Keep the exact name for main() only
            name: if name == "main" { Name::new_exact(name) } else { Name::new_temp(name) },
            params,
            return_type_id,
            return_precision,
        }
    }
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ShaderType {
    Vertex,
    Fragment,
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum Precision {
    NotApplicable,
    Low,
    Medium,
    High,
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ImageInternalFormat {
    RGBA8,
    RGBA8I,
    RGBA8UI,
    R32F,
    R32I,
    R32UI,
}

impl ImageInternalFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ImageInternalFormat::RGBA8 => "rgba8",
            ImageInternalFormat::RGBA8I => "rgba8i",
            ImageInternalFormat::RGBA8UI => "rgba8ui",
            ImageInternalFormat::R32F => "r32f",
            ImageInternalFormat::R32I => "r32i",
            ImageInternalFormat::R32UI => "r32ui",
        }
    }

    // Number of meaningful components in the format.
    pub fn component_count(&self) -> u32 {
        match self {
            ImageInternalFormat::RGBA8
            | ImageInternalFormat::RGBA8I
            | ImageInternalFormat::RGBA8UI => 4,
            ImageInternalFormat::R32F | ImageInternalFormat::R32I | ImageInternalFormat::R32UI => {
                1
            }
        }
    }
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum Decoration {
    // Corresponding to GLSL qualifiers with the same name
    Coherent,
    Restrict,
    Uniform,
    // Used with EXT_shader_framebuffer_fetch_non_coherent
    NonCoherent,
    // Indicates that a variable (excluding built-ins) is an input to the shader
    Input,
    // Indicates that a variable (excluding built-ins) is an output of the shader
    Output,
    // Indicates that a variable (excluding built-ins) is both an input to and output of the
    // shader, used in EXT_shader_framebuffer_fetch.
    InputOutput,
    // The location qualifier of an input or output
    Location(u32),
    // The binding qualifier
    Binding(u32),
    // Internal format declared on storage images and pixel local storage
    ImageInternalFormat(ImageInternalFormat),
    // Used internally to implement ANGLE_pixel_local_storage, indicates a D3D 11.3 Rasterizer
    // Order View (ROV) or a Metal raster order group.
    RasterOrdered,
}

// A set of decorations that only affect variables.  They are placed in a vector that's expected to
// always be very short.
#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Decorations {
    pub decorations: Vec<Decoration>,
}

impl Decorations {
    pub fn new_none() -> Decorations {
        Decorations { decorations: Vec::new() }
    }
    pub fn new(decorations: Vec<Decoration>) -> Decorations {
        Decorations { decorations }
    }

    pub fn add(&mut self, decoration: Decoration) {
        if !self.has(decoration) {
            self.decorations.push(decoration);
        }
    }

    pub fn has(&self, query: Decoration) -> bool {
        self.decorations.iter().any(|&decoration| decoration == query)
    }

    pub fn get_binding(&self) -> Option<u32> {
        self.decorations.iter().find_map(|decoration| match decoration {
            &Decoration::Binding(binding) => Some(binding),
            _ => None,
        })
    }

    pub fn get_location(&self) -> Option<u32> {
        self.decorations.iter().find_map(|decoration| match decoration {
            &Decoration::Location(location) => Some(location),
            _ => None,
        })
    }

    pub fn get_image_internal_format(&self) -> Option<ImageInternalFormat> {
        self.decorations.iter().find_map(|decoration| match decoration {
            &Decoration::ImageInternalFormat(format) => Some(format),
            _ => None,
        })
    }
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum BasicType {
    Void,
    Float,
    Int,
    Uint,
    Bool,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ImageBasicType {
    Float,
    Int,
    Uint,
}

impl ImageBasicType {
    pub fn get_basic_type(&self) -> BasicType {
        match self {
            ImageBasicType::Float => BasicType::Float,
            ImageBasicType::Int => BasicType::Int,
            ImageBasicType::Uint => BasicType::Uint,
        }
    }
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ImageDimension {
    // Note: D2 is 2D, but works around identifier starting with number
    D2,
    // For ANGLE_shader_pixel_local_storage
    PixelLocal,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ImageType {
    pub dimension: ImageDimension,
    pub is_sampled: bool,
    pub is_array: bool,
    pub is_ms: bool,
    pub is_shadow: bool,
}

impl ImageType {
    // A non-sampled, non-array, single-sampled image of the given dimension, as used by storage
    // images and pixel local storage.
    pub fn new_storage(dimension: ImageDimension) -> ImageType {
        ImageType { dimension, is_sampled: false, is_array: false, is_ms: false, is_shadow: false }
    }
}

// The type of an expression.  Types can be recursive, for example a vector or array of another
// type.
#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum Type {
    // Representing Void, Float, Int, Uint and Bool
    Scalar(BasicType),
    // Representing images, samplers and pixel local storage planes
    Image(ImageBasicType, ImageType),
    // A vector of other Scalar types
    Vector(TypeId, u32),
    // An array of other types
    Array(TypeId, u32),
}

impl Type {
    pub fn new_void() -> Type {
        Type::Scalar(BasicType::Void)
    }
    pub fn new_scalar(basic_type: BasicType) -> Type {
        Type::Scalar(basic_type)
    }
    pub fn new_image(basic_type: ImageBasicType, image_type: ImageType) -> Type {
        Type::Image(basic_type, image_type)
    }
    pub fn new_vector(type_id: TypeId, count: u32) -> Type {
        Type::Vector(type_id, count)
    }
    pub fn new_array(type_id: TypeId, count: u32) -> Type {
        Type::Array(type_id, count)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Type::Vector(..))
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Type::Image(..))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    pub fn is_pixel_local(&self) -> bool {
        matches!(
            self,
            Type::Image(_, image_type) if image_type.dimension == ImageDimension::PixelLocal
        )
    }

    pub fn get_scalar_basic_type(&self) -> BasicType {
        match self {
            &Type::Scalar(basic_type) => basic_type,
            _ => panic!("Internal error: Expected scalar type"),
        }
    }

    pub fn get_vector_size(&self) -> Option<u32> {
        match self {
            &Type::Vector(_, count) => Some(count),
            _ => None,
        }
    }

    pub fn get_element_type_id(&self) -> Option<TypeId> {
        match self {
            &Type::Vector(element_id, _) => Some(element_id),
            &Type::Array(element_id, _) => Some(element_id),
            _ => None,
        }
    }

    pub fn get_image_type(&self) -> (ImageBasicType, &ImageType) {
        match self {
            Type::Image(basic_type, image_type) => (*basic_type, image_type),
            _ => panic!("Internal error: Expected image type"),
        }
    }

    // The number of components of a scalar or vector.
    pub fn get_total_component_count(&self) -> u32 {
        self.get_vector_size().unwrap_or(1)
    }
}

// The tables the tree refers to, and global data that affects the shader.
//
// Transformations traverse the tree and mutate it.  The tables may be accessed and modified during
// these transformations too.  Keeping them separate from the tree (in `IR`) allows both the `.root`
// and `.meta` to be borrowed independently.
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct IRMeta {
    types: Vec<Type>,
    variables: Vec<Variable>,
    functions: Vec<Function>,

    // Built-in variables are not declared in the tree.  They are created on first reference.
    built_in_variables: FxHashMap<BuiltIn, VariableId>,

    // Id of main().
    main_function_id: Option<FunctionId>,

    // Maps to look up the id of existing types.  This ensures that the type ids are unique and
    // there are no duplicate types.
    image_type_map: FxHashMap<(ImageBasicType, ImageType), TypeId>,
    array_type_map: FxHashMap<(TypeId, u32), TypeId>,

    // Counter for node ids, so every node in the tree is uniquely identified.
    next_node_id: u32,

    // Data that globally affects the shader:
    shader_type: ShaderType,

    // Affecting fragment shaders:
    early_fragment_tests: bool,
}

impl IRMeta {
    pub fn new(shader_type: ShaderType) -> IRMeta {
        let types = vec![
            // Corresponding to TYPE_ID_VOID
            Type::new_void(),
            // Corresponding to TYPE_ID_FLOAT
            Type::new_scalar(BasicType::Float),
            // Corresponding to TYPE_ID_INT
            Type::new_scalar(BasicType::Int),
            // Corresponding to TYPE_ID_UINT
            Type::new_scalar(BasicType::Uint),
            // Corresponding to TYPE_ID_BOOL
            Type::new_scalar(BasicType::Bool),
            // Corresponding to TYPE_ID_VEC2
            Type::new_vector(TYPE_ID_FLOAT, 2),
            // Corresponding to TYPE_ID_VEC3
            Type::new_vector(TYPE_ID_FLOAT, 3),
            // Corresponding to TYPE_ID_VEC4
            Type::new_vector(TYPE_ID_FLOAT, 4),
            // Corresponding to TYPE_ID_IVEC2
            Type::new_vector(TYPE_ID_INT, 2),
            // Corresponding to TYPE_ID_IVEC3
            Type::new_vector(TYPE_ID_INT, 3),
            // Corresponding to TYPE_ID_IVEC4
            Type::new_vector(TYPE_ID_INT, 4),
            // Corresponding to TYPE_ID_UVEC2
            Type::new_vector(TYPE_ID_UINT, 2),
            // Corresponding to TYPE_ID_UVEC3
            Type::new_vector(TYPE_ID_UINT, 3),
            // Corresponding to TYPE_ID_UVEC4
            Type::new_vector(TYPE_ID_UINT, 4),
            // Corresponding to TYPE_ID_BVEC2
            Type::new_vector(TYPE_ID_BOOL, 2),
            // Corresponding to TYPE_ID_BVEC3
            Type::new_vector(TYPE_ID_BOOL, 3),
            // Corresponding to TYPE_ID_BVEC4
            Type::new_vector(TYPE_ID_BOOL, 4),
        ];
        debug_assert!(types.len() as u32 == MAX_PREDEFINED_TYPE_ID + 1);

        IRMeta {
            types,
            variables: Vec::with_capacity(100),
            functions: Vec::with_capacity(20),
            built_in_variables: FxHashMap::default(),
            main_function_id: None,
            image_type_map: FxHashMap::default(),
            array_type_map: FxHashMap::default(),
            next_node_id: 0,
            shader_type,
            early_fragment_tests: false,
        }
    }

    pub fn all_types(&self) -> &Vec<Type> {
        &self.types
    }
    pub fn all_variables(&self) -> &Vec<Variable> {
        &self.variables
    }
    pub fn all_functions(&self) -> &Vec<Function> {
        &self.functions
    }

    pub fn get_main_function_id(&self) -> Option<FunctionId> {
        self.main_function_id
    }
    pub fn set_main_function_id(&mut self, main_id: FunctionId) {
        debug_assert!(self.main_function_id.is_none());
        self.main_function_id = Some(main_id);
    }

    pub fn get_shader_type(&self) -> ShaderType {
        self.shader_type
    }
    pub fn get_early_fragment_tests(&self) -> bool {
        self.early_fragment_tests
    }
    pub fn set_early_fragment_tests(&mut self, value: bool) {
        self.early_fragment_tests = value;
    }

    pub fn new_node_id(&mut self) -> NodeId {
        let id = NodeId { id: self.next_node_id };
        self.next_node_id += 1;
        id
    }
    // Upper bound (exclusive) of all node ids allocated so far.
    pub fn node_id_count(&self) -> u32 {
        self.next_node_id
    }

    fn add_item_and_get_id<T>(items: &mut Vec<T>, new_item: T) -> u32 {
        let item_id = items.len() as u32;
        items.push(new_item);
        item_id
    }

    fn add_type_and_get_id(types: &mut Vec<Type>, type_desc: Type) -> TypeId {
        TypeId { id: Self::add_item_and_get_id(types, type_desc) }
    }

    // Returns a predefined type id, see TYPE_ID_* constants.
    pub fn get_basic_type_id(&self, basic_type: BasicType) -> TypeId {
        match basic_type {
            BasicType::Void => TYPE_ID_VOID,
            BasicType::Float => TYPE_ID_FLOAT,
            BasicType::Int => TYPE_ID_INT,
            BasicType::Uint => TYPE_ID_UINT,
            BasicType::Bool => TYPE_ID_BOOL,
        }
    }

    // Returns a predefined type id for vectors, see TYPE_ID_* constants.
    pub fn get_vector_type_id(&self, basic_type: BasicType, vector_size: u32) -> TypeId {
        debug_assert!((2..=4).contains(&vector_size));

        let offset = vector_size - 2;

        match basic_type {
            BasicType::Float => TypeId { id: TYPE_ID_VEC2.id + offset },
            BasicType::Int => TypeId { id: TYPE_ID_IVEC2.id + offset },
            BasicType::Uint => TypeId { id: TYPE_ID_UVEC2.id + offset },
            BasicType::Bool => TypeId { id: TYPE_ID_BVEC2.id + offset },
            _ => panic!("Internal error: Not a vector-able type"),
        }
    }

    // Returns the scalar type id if the size is 1, or the vector type id otherwise.
    pub fn get_scalar_or_vector_type_id(&self, basic_type: BasicType, size: u32) -> TypeId {
        if size == 1 {
            self.get_basic_type_id(basic_type)
        } else {
            self.get_vector_type_id(basic_type, size)
        }
    }

    // Returns a vectors type id based on the given element.
    pub fn get_vector_type_id_from_element_id(
        &self,
        element_type_id: TypeId,
        vector_size: u32,
    ) -> TypeId {
        match element_type_id {
            TYPE_ID_FLOAT => self.get_vector_type_id(BasicType::Float, vector_size),
            TYPE_ID_INT => self.get_vector_type_id(BasicType::Int, vector_size),
            TYPE_ID_UINT => self.get_vector_type_id(BasicType::Uint, vector_size),
            TYPE_ID_BOOL => self.get_vector_type_id(BasicType::Bool, vector_size),
            _ => panic!("Internal error: Not a vector-able type"),
        }
    }

    pub fn get_image_type_id(
        &mut self,
        basic_type: ImageBasicType,
        image_type: ImageType,
    ) -> TypeId {
        // Look up the image type; if one doesn't exist, create it.
        *self.image_type_map.entry((basic_type, image_type)).or_insert_with(|| {
            Self::add_type_and_get_id(&mut self.types, Type::new_image(basic_type, image_type))
        })
    }

    pub fn get_array_type_id(&mut self, element_type_id: TypeId, array_size: u32) -> TypeId {
        // Look up the array type; if one doesn't exist, create it.
        *self.array_type_map.entry((element_type_id, array_size)).or_insert_with(|| {
            Self::add_type_and_get_id(&mut self.types, Type::new_array(element_type_id, array_size))
        })
    }

    // Strips every array dimension off the type.
    pub fn get_array_base_type_id(&self, mut type_id: TypeId) -> TypeId {
        while let &Type::Array(element_type_id, _) = self.get_type(type_id) {
            type_id = element_type_id;
        }
        type_id
    }

    // Given a vector or scalar type id, retrieves the scalar type of their components.
    pub fn get_scalar_type(&self, type_id: TypeId) -> TypeId {
        self.get_type(type_id).get_element_type_id().unwrap_or(type_id)
    }

    pub fn get_basic_type(&self, type_id: TypeId) -> BasicType {
        self.get_type(self.get_scalar_type(type_id)).get_scalar_basic_type()
    }

    pub fn add_variable(&mut self, variable: Variable) -> VariableId {
        VariableId { id: Self::add_item_and_get_id(&mut self.variables, variable) }
    }
    pub fn declare_variable(
        &mut self,
        name: Name,
        type_id: TypeId,
        precision: Precision,
        decorations: Decorations,
        built_in: Option<BuiltIn>,
        scope: VariableScope,
    ) -> VariableId {
        debug_assert!((type_id.id as usize) < self.types.len());
        self.add_variable(Variable::new(name, type_id, precision, decorations, built_in, scope))
    }
    pub fn declare_temp_variable(
        &mut self,
        name: &'static str,
        type_id: TypeId,
        precision: Precision,
        scope: VariableScope,
    ) -> VariableId {
        self.declare_variable(
            Name::new_temp(name),
            type_id,
            precision,
            Decorations::new_none(),
            None,
            scope,
        )
    }

    // Built-ins are declared on first use, and are never declared in the tree.
    pub fn get_or_declare_built_in_variable(&mut self, built_in: BuiltIn) -> VariableId {
        if let Some(&id) = self.built_in_variables.get(&built_in) {
            return id;
        }

        let (type_id, decorations) = match built_in {
            BuiltIn::FragCoord => (TYPE_ID_VEC4, Decorations::new(vec![Decoration::Input])),
            BuiltIn::FragColor => (TYPE_ID_VEC4, Decorations::new(vec![Decoration::Output])),
        };
        let id = self.declare_variable(
            Name::new_exact(built_in.name()),
            type_id,
            Precision::High,
            decorations,
            Some(built_in),
            VariableScope::Global,
        );
        self.built_in_variables.insert(built_in, id);
        id
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        FunctionId { id: IRMeta::add_item_and_get_id(&mut self.functions, function) }
    }

    pub fn get_type(&self, type_id: TypeId) -> &Type {
        &self.types[type_id.id as usize]
    }
    pub fn get_variable(&self, variable_id: VariableId) -> &Variable {
        &self.variables[variable_id.id as usize]
    }
    pub fn get_variable_mut(&mut self, variable_id: VariableId) -> &mut Variable {
        &mut self.variables[variable_id.id as usize]
    }
    pub fn get_function(&self, function_id: FunctionId) -> &Function {
        &self.functions[function_id.id as usize]
    }
    pub fn get_function_mut(&mut self, function_id: FunctionId) -> &mut Function {
        &mut self.functions[function_id.id as usize]
    }
}

#[cfg_attr(debug_assertions, derive(Debug))]
pub struct IR {
    pub meta: IRMeta,
    // The global scope of the shader: global declarations and function definitions, in program
    // order.
    //
    // This is separate from IRMeta so that can be mutated while the tree is traversed.
    pub root: Block,
}

impl IR {
    pub fn new(shader_type: ShaderType) -> IR {
        IR { meta: IRMeta::new(shader_type), root: Block::new() }
    }

    pub fn get_function_body(&self, id: FunctionId) -> Option<&Block> {
        self.root.statements.iter().find_map(|statement| match &statement.op {
            StatementOp::FunctionDefinition(function_id, body) if *function_id == id => {
                Some(body)
            }
            _ => None,
        })
    }

    pub fn get_function_body_mut(&mut self, id: FunctionId) -> Option<&mut Block> {
        self.root.statements.iter_mut().find_map(|statement| match &mut statement.op {
            StatementOp::FunctionDefinition(function_id, body) if *function_id == id => {
                Some(body)
            }
            _ => None,
        })
    }

    // The body of main().  Every shader that reaches the transformations has a main().
    pub fn get_main_body_mut(&mut self) -> &mut Block {
        let main_id = self
            .meta
            .get_main_function_id()
            .unwrap_or_else(|| panic!("Internal error: main() is not declared"));
        self.get_function_body_mut(main_id)
            .unwrap_or_else(|| panic!("Internal error: main() is not defined"))
    }
}
