// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Errors that transformations propagate to the caller.  Internal invariant violations are not
// errors; they panic with "Internal error: ...".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("function monomorphization failed: {0}")]
    Monomorphization(#[from] MonomorphizationError),
    #[error("tree update failed: {0}")]
    TreeUpdate(#[from] TreeUpdateError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum MonomorphizationError {
    #[error("argument {argument} of a call to {function} is not a global uniform")]
    NonUniformArgument { function: &'static str, argument: usize },
}

// Queued replacements or insertions whose target nodes were not found in the tree.
#[derive(Debug, Error)]
#[error("{} queued mutation(s) target nodes not found in the tree: {node_ids:?}", .node_ids.len())]
pub struct TreeUpdateError {
    pub node_ids: Vec<u32>,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: String) -> ValidationError {
        ValidationError { message }
    }
}

// Failures to emulate a shader.  These are caused by shaders that use features the emulator does
// not implement, or that are invalid at runtime.
#[derive(Debug, Error)]
pub enum EmulationError {
    #[error("{0} cannot be emulated")]
    UnsupportedBuiltIn(&'static str),
    #[error("emulation of {0} is not supported")]
    Unsupported(&'static str),
    #[error("type mismatch: {0}")]
    TypeMismatch(&'static str),
    #[error("variable {0} is read before it is declared")]
    UndefinedVariable(&'static str),
    #[error("function {0} is not defined")]
    UndefinedFunction(&'static str),
    #[error("integer division by zero")]
    DivisionByZero,
    #[error("loop did not terminate after {0} iterations")]
    IterationLimit(u32),
}
