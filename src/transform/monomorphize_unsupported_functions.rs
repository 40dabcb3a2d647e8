// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Monomorphize functions that are called with parameters that are incompatible with the target
// language, or cause complications for future transformations:
//
// - Pixel local storage planes, which are lowered to a different variable per binding and so
//   cannot stay function parameters.
// - Storage images; the ESSL spec has a bug with images as function arguments, as the layout
//   qualifiers needed for the image are impossible to specify.
//
// This transformation duplicates such functions, removes the unsupported parameters and makes the
// duplicate reference the uniforms passed by the caller directly.  Afterwards, only globals
// reference values of these types.
use crate::ir::*;
use crate::*;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

pub struct Options {
    // Which kind of arguments are unsupported:
    pub image: bool,
    pub pixel_local_storage: bool,
}

// A function parameter that is removed, and the global uniform that replaces it.
type RemovedParams = Vec<(usize, VariableId)>;

// The functions that are reachable from main() and how far they are processed.  This outlives the
// processing of any single function.
#[derive(Default)]
struct Queue {
    // Which functions to process next
    to_process: VecDeque<FunctionId>,
    // Which functions have already been processed
    processed: FxHashSet<FunctionId>,
    // Which functions are still alive at the end of the transformation; if all calls to a function
    // are monomorphized, the function can be deleted.
    is_live: FxHashSet<FunctionId>,
    // The monomorphized version of each function per set of removed parameters, so a function
    // that's called multiple times with the same uniforms is only duplicated once.
    monomorphized: FxHashMap<(FunctionId, RemovedParams), FunctionId>,
}

impl Queue {
    // Called when a call to this function is made.  It adds the function to the queue to be
    // processed later, and also marks it as live (i.e. reachable from main()).
    fn add_to_process(&mut self, id: FunctionId) {
        if self.is_live.insert(id) {
            self.to_process.push_back(id);
        }
    }
}

// Rewrites the calls in one function body.
struct CallRewriter<'a> {
    ir_meta: &'a mut IRMeta,
    // The global block, used to find the bodies of the functions to duplicate.  The body being
    // rewritten is taken out of it.
    root: &'a Block,
    options: &'a Options,
    queue: &'a mut Queue,
    // New function definitions, to be placed right after the definition of the function they
    // duplicate.
    new_definitions: Vec<(FunctionId, Statement)>,
    error: Option<MonomorphizationError>,
}

pub fn run(ir: &mut IR, options: &Options) -> Result<(), MonomorphizationError> {
    let mut queue = Queue::default();

    // Start from main() and monomorphize any function that it calls with unsupported arguments.
    // Then visit every function that main() calls, including newly monomorphized functions, and
    // recursively perform this operation.
    let main_id = ir
        .meta
        .get_main_function_id()
        .unwrap_or_else(|| panic!("Internal error: main() is not declared"));
    queue.add_to_process(main_id);

    while let Some(id) = queue.to_process.pop_front() {
        if !queue.processed.insert(id) {
            continue;
        }
        let Some(index) = util::find_function_definition(&ir.root, id) else {
            continue;
        };

        let mut body = std::mem::take(function_body_mut(&mut ir.root, index));
        let (new_definitions, error) = {
            let mut rewriter = CallRewriter {
                ir_meta: &mut ir.meta,
                root: &ir.root,
                options,
                queue: &mut queue,
                new_definitions: Vec::new(),
                error: None,
            };
            traverser::visitor::for_each_expression_mut(&mut rewriter, &mut body, &rewrite_call);
            (rewriter.new_definitions, rewriter.error)
        };
        *function_body_mut(&mut ir.root, index) = body;

        if let Some(error) = error {
            return Err(error);
        }
        add_monomorphized_functions(&mut ir.root, new_definitions);
    }

    // Eliminate functions that are replaced by monomorphized versions everywhere.
    let meta = &ir.meta;
    ir.root.statements.retain(|statement| match statement.op {
        StatementOp::FunctionDefinition(id, _) => {
            let is_dead = !queue.is_live.contains(&id) && has_unsupported_params(meta, id, options);
            if is_dead {
                let name = meta.get_function(id).name.name;
                debug!("Removing {name}, which is replaced everywhere");
            }
            !is_dead
        }
        _ => true,
    });

    Ok(())
}

fn function_body_mut(root: &mut Block, index: usize) -> &mut Block {
    match &mut root.statements[index].op {
        StatementOp::FunctionDefinition(_, body) => body,
        _ => panic!("Internal error: Expected a function definition"),
    }
}

fn is_unsupported_type(ir_meta: &IRMeta, type_id: TypeId, options: &Options) -> bool {
    let type_info = ir_meta.get_type(type_id);
    if !type_info.is_image() {
        return false;
    }
    let (_, image_type) = type_info.get_image_type();
    if type_info.is_pixel_local() {
        options.pixel_local_storage
    } else {
        options.image && !image_type.is_sampled
    }
}

fn has_unsupported_params(ir_meta: &IRMeta, id: FunctionId, options: &Options) -> bool {
    ir_meta.get_function(id).params.iter().any(|param| {
        is_unsupported_type(ir_meta, ir_meta.get_variable(param.variable_id).type_id, options)
    })
}

// Unsupported arguments must be the uniforms themselves, so the monomorphized function can refer
// to them directly.
fn get_removed_params(
    ir_meta: &IRMeta,
    function_id: FunctionId,
    args: &[Expression],
    options: &Options,
) -> Result<RemovedParams, MonomorphizationError> {
    let mut removed = Vec::new();
    for (index, arg) in args.iter().enumerate() {
        if !is_unsupported_type(ir_meta, util::get_expression_type(ir_meta, arg), options) {
            continue;
        }
        match arg.get_symbol() {
            Some(id) if ir_meta.get_variable(id).scope == VariableScope::Global => {
                removed.push((index, id))
            }
            _ => {
                return Err(MonomorphizationError::NonUniformArgument {
                    function: ir_meta.get_function(function_id).name.name,
                    argument: index,
                });
            }
        }
    }
    Ok(removed)
}

fn rewrite_call(rewriter: &mut CallRewriter, expression: &mut Expression) {
    if rewriter.error.is_some() {
        return;
    }
    let ExpressionOp::Call(function_id, args) = &mut expression.op else {
        return;
    };

    let removed = match get_removed_params(rewriter.ir_meta, *function_id, args, rewriter.options)
    {
        Ok(removed) => removed,
        Err(error) => {
            rewriter.error = Some(error);
            return;
        }
    };
    if removed.is_empty() {
        rewriter.queue.add_to_process(*function_id);
        return;
    }

    let new_function_id = rewriter.get_or_monomorphize(*function_id, removed.clone());

    let mut index = 0;
    args.retain(|_| {
        let keep = !removed.iter().any(|&(removed_index, _)| removed_index == index);
        index += 1;
        keep
    });
    *function_id = new_function_id;
}

impl CallRewriter<'_> {
    fn get_or_monomorphize(
        &mut self,
        function_id: FunctionId,
        removed: RemovedParams,
    ) -> FunctionId {
        let key = (function_id, removed);
        if let Some(&id) = self.queue.monomorphized.get(&key) {
            return id;
        }

        let new_function_id = self.monomorphize(function_id, &key.1);
        self.queue.monomorphized.insert(key, new_function_id);
        self.queue.add_to_process(new_function_id);
        new_function_id
    }

    // Duplicate the function, replacing the removed parameters with the corresponding globals.
    fn monomorphize(
        &mut self,
        function_id: FunctionId,
        removed: &[(usize, VariableId)],
    ) -> FunctionId {
        let original = self.ir_meta.get_function(function_id).clone();

        let mut variable_map = FxHashMap::default();
        let mut params = Vec::new();
        for (index, param) in original.params.iter().enumerate() {
            match removed.iter().find(|&&(removed_index, _)| removed_index == index) {
                Some(&(_, global)) => {
                    variable_map.insert(param.variable_id, global);
                }
                None => {
                    let variable = self.ir_meta.get_variable(param.variable_id).clone();
                    let new_param = self.ir_meta.add_variable(variable);
                    variable_map.insert(param.variable_id, new_param);
                    params.push(FunctionParam::new(new_param, param.direction));
                }
            }
        }

        let new_function_id = self.ir_meta.add_function(Function { params, ..original });

        let original_body = util::find_function_definition(self.root, function_id)
            .and_then(|index| self.root.statements[index].get_function_definition())
            .map(|(_, body)| body)
            .unwrap_or_else(|| panic!("Internal error: Called function is not defined"));
        let body = util::duplicate_block(self.ir_meta, original_body, &mut variable_map);

        debug!(
            "Monomorphized {} (f{}) into f{}, removing {} parameter(s)",
            original.name.name,
            function_id.id,
            new_function_id.id,
            removed.len()
        );

        let definition = instruction::function_definition(self.ir_meta, new_function_id, body);
        self.new_definitions.push((function_id, definition));
        new_function_id
    }
}

// Place each new function right after the one it duplicates, so it's still defined before it's
// called.
fn add_monomorphized_functions(root: &mut Block, new_definitions: Vec<(FunctionId, Statement)>) {
    for (original_id, definition) in new_definitions {
        let index = util::find_function_definition(root, original_id)
            .unwrap_or_else(|| panic!("Internal error: Monomorphized function is not defined"));
        root.insert_statements(index + 1, vec![definition]);
    }
}
