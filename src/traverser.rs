// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Traverser utilities for the IR.  Fundamentally, there are two types of traversers:
//
// - A visitor does a read-only traversal of the IR, calling closures for every statement and
//   expression.
// - A transformer walks the tree with a `Traverser` and queues changes to it in a `Transformer`.
//   Nodes are never mutated while they are being walked; instead, replacements and insertions are
//   keyed by node id and applied by `Transformer::update_tree` once the traversal is done.

use crate::ir::*;
use crate::*;
use rustc_hash::FxHashMap;

#[derive(PartialEq, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum VisitAfter {
    Children,
    Nothing,
}

pub const VISIT_CHILDREN: VisitAfter = VisitAfter::Children;
pub const STOP: VisitAfter = VisitAfter::Nothing;

pub mod visitor {
    use super::*;

    // Pre-order visit of every statement and expression in the block.  If a visit returns `STOP`,
    // the children of that node are not visited.
    pub fn visit_block<State, StatementVisit, ExpressionVisit>(
        state: &mut State,
        block: &Block,
        statement_visit: &StatementVisit,
        expression_visit: &ExpressionVisit,
    ) where
        StatementVisit: Fn(&mut State, &Statement) -> VisitAfter,
        ExpressionVisit: Fn(&mut State, &Expression) -> VisitAfter,
    {
        block.statements.iter().for_each(|statement| {
            visit_statement(state, statement, statement_visit, expression_visit)
        });
    }

    pub fn visit_statement<State, StatementVisit, ExpressionVisit>(
        state: &mut State,
        statement: &Statement,
        statement_visit: &StatementVisit,
        expression_visit: &ExpressionVisit,
    ) where
        StatementVisit: Fn(&mut State, &Statement) -> VisitAfter,
        ExpressionVisit: Fn(&mut State, &Expression) -> VisitAfter,
    {
        if statement_visit(state, statement) == STOP {
            return;
        }

        match &statement.op {
            StatementOp::Declaration(_, initializer) => {
                initializer.as_ref().inspect(|expression| {
                    visit_expression(state, expression, expression_visit)
                });
            }
            StatementOp::Expression(expression) => {
                visit_expression(state, expression, expression_visit)
            }
            StatementOp::Block(block) | StatementOp::FunctionDefinition(_, block) => {
                visit_block(state, block, statement_visit, expression_visit)
            }
            StatementOp::If(condition, true_block, false_block) => {
                visit_expression(state, condition, expression_visit);
                visit_block(state, true_block, statement_visit, expression_visit);
                false_block.as_ref().inspect(|block| {
                    visit_block(state, block, statement_visit, expression_visit)
                });
            }
            StatementOp::Loop(loop_desc) => {
                loop_desc.init.as_ref().inspect(|init| {
                    visit_statement(state, init, statement_visit, expression_visit)
                });
                loop_desc.condition.as_ref().inspect(|condition| {
                    visit_expression(state, condition, expression_visit)
                });
                loop_desc
                    .step
                    .as_ref()
                    .inspect(|step| visit_expression(state, step, expression_visit));
                visit_block(state, &loop_desc.body, statement_visit, expression_visit);
            }
            StatementOp::Return(value) => {
                value.as_ref().inspect(|value| visit_expression(state, value, expression_visit));
            }
            StatementOp::Discard | StatementOp::Break | StatementOp::Continue => {}
        }
    }

    pub fn visit_expression<State, ExpressionVisit>(
        state: &mut State,
        expression: &Expression,
        expression_visit: &ExpressionVisit,
    ) where
        ExpressionVisit: Fn(&mut State, &Expression) -> VisitAfter,
    {
        if expression_visit(state, expression) == STOP {
            return;
        }
        expression
            .operands()
            .into_iter()
            .for_each(|operand| visit_expression(state, operand, expression_visit));
    }

    // Convenience wrapper that only looks at expressions.
    pub fn for_each_expression<State, ExpressionVisit>(
        state: &mut State,
        block: &Block,
        expression_visit: &ExpressionVisit,
    ) where
        ExpressionVisit: Fn(&mut State, &Expression) -> VisitAfter,
    {
        visit_block(state, block, &|_, _| VISIT_CHILDREN, expression_visit);
    }

    // Post-order mutable walk over every expression in the block, used by transformations that
    // make local, id-preserving changes (such as replacing symbols or call targets).
    pub fn for_each_expression_mut<State, Transform>(
        state: &mut State,
        block: &mut Block,
        transform: &Transform,
    ) where
        Transform: Fn(&mut State, &mut Expression),
    {
        fn expression_mut<State, Transform>(
            state: &mut State,
            expression: &mut Expression,
            transform: &Transform,
        ) where
            Transform: Fn(&mut State, &mut Expression),
        {
            expression
                .operands_mut()
                .into_iter()
                .for_each(|operand| expression_mut(state, operand, transform));
            transform(state, expression);
        }

        fn statement_mut<State, Transform>(
            state: &mut State,
            statement: &mut Statement,
            transform: &Transform,
        ) where
            Transform: Fn(&mut State, &mut Expression),
        {
            match &mut statement.op {
                StatementOp::Declaration(_, initializer) => {
                    if let Some(expression) = initializer {
                        expression_mut(state, expression, transform);
                    }
                }
                StatementOp::Expression(expression) => expression_mut(state, expression, transform),
                StatementOp::Block(block) | StatementOp::FunctionDefinition(_, block) => {
                    for_each_expression_mut(state, block, transform)
                }
                StatementOp::If(condition, true_block, false_block) => {
                    expression_mut(state, condition, transform);
                    for_each_expression_mut(state, true_block, transform);
                    if let Some(block) = false_block {
                        for_each_expression_mut(state, block, transform);
                    }
                }
                StatementOp::Loop(loop_desc) => {
                    if let Some(init) = &mut loop_desc.init {
                        statement_mut(state, init, transform);
                    }
                    if let Some(condition) = &mut loop_desc.condition {
                        expression_mut(state, condition, transform);
                    }
                    if let Some(step) = &mut loop_desc.step {
                        expression_mut(state, step, transform);
                    }
                    for_each_expression_mut(state, &mut loop_desc.body, transform);
                }
                StatementOp::Return(value) => {
                    if let Some(value) = value {
                        expression_mut(state, value, transform);
                    }
                }
                StatementOp::Discard | StatementOp::Break | StatementOp::Continue => {}
            }
        }

        block
            .statements
            .iter_mut()
            .for_each(|statement| statement_mut(state, statement, transform));
    }
}

pub mod transformer {
    use super::*;

    // The hooks of a transforming traversal.  Both are called in pre-order; returning `STOP`
    // prevents the traversal from visiting the children of the node.  Changes to the tree are
    // queued in the `Transformer`.
    pub trait Traverser {
        fn visit_statement(
            &mut self,
            _transformer: &mut Transformer,
            _statement: &Statement,
        ) -> VisitAfter {
            VISIT_CHILDREN
        }
        fn visit_expression(
            &mut self,
            _transformer: &mut Transformer,
            _expression: &Expression,
        ) -> VisitAfter {
            VISIT_CHILDREN
        }
    }

    // What a node is replaced with.
    #[cfg_attr(debug_assertions, derive(Debug))]
    pub enum Replacement {
        Expression(Expression),
        Statement(Statement),
        // Only applicable to statements.
        Remove,
    }

    #[derive(Default)]
    struct Insertion {
        before: Vec<Statement>,
        after: Vec<Statement>,
    }

    // The queue of changes made during a traversal.
    #[derive(Default)]
    pub struct Transformer {
        // The ids of the statements that are direct children of a block, from the outermost to the
        // statement currently being traversed.  Statement insertions are placed around the last
        // one.
        parent_statements: Vec<NodeId>,
        replacements: FxHashMap<NodeId, Replacement>,
        insertions: FxHashMap<NodeId, Insertion>,
    }

    impl Transformer {
        pub fn new() -> Transformer {
            Transformer::default()
        }

        pub fn queue_replacement(&mut self, node_id: NodeId, replacement: Replacement) {
            if self.replacements.insert(node_id, replacement).is_some() {
                panic!("Internal error: Node {} is replaced twice", node_id.id);
            }
        }
        pub fn queue_expression_replacement(&mut self, node_id: NodeId, expression: Expression) {
            self.queue_replacement(node_id, Replacement::Expression(expression));
        }
        pub fn queue_statement_replacement(&mut self, node_id: NodeId, statement: Statement) {
            self.queue_replacement(node_id, Replacement::Statement(statement));
        }
        pub fn queue_removal(&mut self, node_id: NodeId) {
            self.queue_replacement(node_id, Replacement::Remove);
        }

        // Insert statements right before and after the block-level statement currently being
        // traversed.  Successive calls append to the previously inserted statements, so the
        // order of insertions is retained.
        pub fn insert_statements_in_parent_block(
            &mut self,
            before: Vec<Statement>,
            after: Vec<Statement>,
        ) {
            let &parent = self.parent_statements.last().unwrap_or_else(|| {
                panic!("Internal error: Statement insertion outside of a block")
            });
            let insertion = self.insertions.entry(parent).or_default();
            insertion.before.extend(before);
            insertion.after.extend(after);
        }
        pub fn insert_statement_in_parent_block(&mut self, statement: Statement) {
            self.insert_statements_in_parent_block(vec![statement], vec![]);
        }

        pub fn is_empty(&self) -> bool {
            self.replacements.is_empty() && self.insertions.is_empty()
        }

        // Apply every queued change to the tree, in document order.  Inserted statements are
        // themselves subject to the queued changes, so changes queued while traversing a
        // statement that is not yet in the tree apply too.  Fails if any queued change targets a
        // node that is not in the tree.
        pub fn update_tree(mut self, root: &mut Block) -> Result<(), TreeUpdateError> {
            self.update_block(root);

            if self.is_empty() {
                return Ok(());
            }

            let mut node_ids = self
                .replacements
                .keys()
                .chain(self.insertions.keys())
                .map(|node_id| node_id.id)
                .collect::<Vec<_>>();
            node_ids.sort_unstable();
            Err(TreeUpdateError { node_ids })
        }

        fn update_block(&mut self, block: &mut Block) {
            let statements = std::mem::take(&mut block.statements);
            statements
                .into_iter()
                .for_each(|statement| self.update_statement(statement, &mut block.statements));
        }

        fn update_statement(&mut self, statement: Statement, output: &mut Vec<Statement>) {
            let Insertion { before, after } =
                self.insertions.remove(&statement.node_id).unwrap_or_default();

            before.into_iter().for_each(|inserted| self.update_statement(inserted, output));

            if let Some(statement) = self.replace_statement(statement) {
                output.push(statement);
            }

            after.into_iter().for_each(|inserted| self.update_statement(inserted, output));
        }

        // Replaces the statement (if queued), then updates the children of whatever takes its
        // place.
        fn replace_statement(&mut self, statement: Statement) -> Option<Statement> {
            let mut statement = match self.replacements.remove(&statement.node_id) {
                None => statement,
                Some(Replacement::Statement(replacement)) => replacement,
                Some(Replacement::Remove) => return None,
                Some(Replacement::Expression(_)) => {
                    panic!("Internal error: Statement replaced with an expression")
                }
            };

            match &mut statement.op {
                StatementOp::Declaration(_, initializer) => {
                    if let Some(expression) = initializer {
                        self.update_expression(expression);
                    }
                }
                StatementOp::Expression(expression) => self.update_expression(expression),
                StatementOp::Block(block) | StatementOp::FunctionDefinition(_, block) => {
                    self.update_block(block)
                }
                StatementOp::If(condition, true_block, false_block) => {
                    self.update_expression(condition);
                    self.update_block(true_block);
                    if let Some(block) = false_block {
                        self.update_block(block);
                    }
                }
                StatementOp::Loop(loop_desc) => {
                    if let Some(init) = loop_desc.init.take() {
                        loop_desc.init = self.replace_statement(*init).map(Box::new);
                    }
                    if let Some(condition) = &mut loop_desc.condition {
                        self.update_expression(condition);
                    }
                    if let Some(step) = &mut loop_desc.step {
                        self.update_expression(step);
                    }
                    self.update_block(&mut loop_desc.body);
                }
                StatementOp::Return(value) => {
                    if let Some(value) = value {
                        self.update_expression(value);
                    }
                }
                StatementOp::Discard | StatementOp::Break | StatementOp::Continue => {}
            }

            Some(statement)
        }

        fn update_expression(&mut self, expression: &mut Expression) {
            match self.replacements.remove(&expression.node_id) {
                None => {}
                Some(Replacement::Expression(replacement)) => *expression = replacement,
                Some(_) => panic!("Internal error: Expression replaced with a statement"),
            }

            expression
                .operands_mut()
                .into_iter()
                .for_each(|operand| self.update_expression(operand));
        }
    }

    pub fn traverse_block<T: Traverser>(
        traverser: &mut T,
        transformer: &mut Transformer,
        block: &Block,
    ) {
        block
            .statements
            .iter()
            .for_each(|statement| traverse_statement(traverser, transformer, statement));
    }

    // Traverse a statement that is (or is about to be) a direct child of a block.  Statements
    // inserted in the parent block while traversing it are placed around it.
    pub fn traverse_statement<T: Traverser>(
        traverser: &mut T,
        transformer: &mut Transformer,
        statement: &Statement,
    ) {
        transformer.parent_statements.push(statement.node_id);
        traverse_statement_and_children(traverser, transformer, statement);
        transformer.parent_statements.pop();
    }

    fn traverse_statement_and_children<T: Traverser>(
        traverser: &mut T,
        transformer: &mut Transformer,
        statement: &Statement,
    ) {
        if traverser.visit_statement(transformer, statement) == STOP {
            return;
        }

        match &statement.op {
            StatementOp::Declaration(_, initializer) => {
                if let Some(expression) = initializer {
                    traverse_expression(traverser, transformer, expression);
                }
            }
            StatementOp::Expression(expression) => {
                traverse_expression(traverser, transformer, expression)
            }
            StatementOp::Block(block) | StatementOp::FunctionDefinition(_, block) => {
                traverse_block(traverser, transformer, block)
            }
            StatementOp::If(condition, true_block, false_block) => {
                traverse_expression(traverser, transformer, condition);
                traverse_block(traverser, transformer, true_block);
                if let Some(block) = false_block {
                    traverse_block(traverser, transformer, block);
                }
            }
            StatementOp::Loop(loop_desc) => {
                // The init statement is not in a block; anything inserted while traversing it is
                // placed around the loop itself.
                if let Some(init) = &loop_desc.init {
                    traverse_statement_and_children(traverser, transformer, init);
                }
                if let Some(condition) = &loop_desc.condition {
                    traverse_expression(traverser, transformer, condition);
                }
                if let Some(step) = &loop_desc.step {
                    traverse_expression(traverser, transformer, step);
                }
                traverse_block(traverser, transformer, &loop_desc.body);
            }
            StatementOp::Return(value) => {
                if let Some(value) = value {
                    traverse_expression(traverser, transformer, value);
                }
            }
            StatementOp::Discard | StatementOp::Break | StatementOp::Continue => {}
        }
    }

    pub fn traverse_expression<T: Traverser>(
        traverser: &mut T,
        transformer: &mut Transformer,
        expression: &Expression,
    ) {
        if traverser.visit_expression(transformer, expression) == STOP {
            return;
        }
        expression
            .operands()
            .into_iter()
            .for_each(|operand| traverse_expression(traverser, transformer, operand));
    }
}

#[cfg(test)]
mod tests {
    use super::transformer::*;
    use super::*;

    fn new_main() -> IR {
        let mut ir = IR::new(ShaderType::Fragment);
        let main = Function::new("main", vec![], TYPE_ID_VOID, Precision::NotApplicable);
        let main_id = ir.meta.add_function(main);
        ir.meta.set_main_function_id(main_id);
        let definition = instruction::function_definition(&mut ir.meta, main_id, Block::new());
        ir.root.add_statement(definition);
        ir
    }

    fn add_to_main(ir: &mut IR, statement: Statement) {
        ir.get_main_body_mut().add_statement(statement);
    }

    fn declare_local(ir: &mut IR, name: &'static str, value: i32) -> VariableId {
        let id =
            ir.meta.declare_temp_variable(name, TYPE_ID_INT, Precision::High, VariableScope::Local);
        let initializer = instruction::int(&mut ir.meta, value);
        let declaration = instruction::declaration(&mut ir.meta, id, Some(initializer));
        add_to_main(ir, declaration);
        id
    }

    fn main_body(ir: &IR) -> &Block {
        ir.get_function_body(ir.meta.get_main_function_id().unwrap()).unwrap()
    }

    fn declared_constants(block: &Block) -> Vec<i32> {
        block
            .statements
            .iter()
            .filter_map(|statement| match &statement.op {
                StatementOp::Declaration(
                    _,
                    Some(Expression { op: ExpressionOp::Constant(ConstantValue::Int(value)), .. }),
                ) => Some(*value),
                _ => None,
            })
            .collect()
    }

    // Inserts a declaration before and after every local declaration initialized with 1.
    struct InsertAround<'a> {
        ir_meta: &'a mut IRMeta,
    }

    impl Traverser for InsertAround<'_> {
        fn visit_statement(
            &mut self,
            transformer: &mut Transformer,
            statement: &Statement,
        ) -> VisitAfter {
            if let StatementOp::Declaration(_, Some(initializer)) = &statement.op {
                if matches!(initializer.op, ExpressionOp::Constant(ConstantValue::Int(1))) {
                    let mut make = |value| {
                        let id = self.ir_meta.declare_temp_variable(
                            "t",
                            TYPE_ID_INT,
                            Precision::High,
                            VariableScope::Local,
                        );
                        let initializer = instruction::int(self.ir_meta, value);
                        instruction::declaration(self.ir_meta, id, Some(initializer))
                    };
                    let before = vec![make(10), make(11)];
                    let after = vec![make(12)];
                    transformer.insert_statements_in_parent_block(before, after);
                    let before = vec![make(13)];
                    transformer.insert_statements_in_parent_block(before, vec![]);
                }
            }
            VISIT_CHILDREN
        }
    }

    #[test]
    fn insertions_keep_requested_order() {
        let mut ir = new_main();
        declare_local(&mut ir, "a", 0);
        declare_local(&mut ir, "b", 1);
        declare_local(&mut ir, "c", 2);

        let mut transformer = Transformer::new();
        let IR { meta, root } = &mut ir;
        traverse_block(&mut InsertAround { ir_meta: meta }, &mut transformer, root);
        transformer.update_tree(root).unwrap();

        assert_eq!(declared_constants(main_body(&ir)), vec![0, 10, 11, 13, 1, 12, 2]);
    }

    // Replaces every int constant 5 with 6, and removes declarations initialized with 7.
    struct ReplaceConstants;

    impl Traverser for ReplaceConstants {
        fn visit_statement(
            &mut self,
            transformer: &mut Transformer,
            statement: &Statement,
        ) -> VisitAfter {
            if let StatementOp::Declaration(_, Some(initializer)) = &statement.op {
                if matches!(initializer.op, ExpressionOp::Constant(ConstantValue::Int(7))) {
                    transformer.queue_removal(statement.node_id);
                    return STOP;
                }
            }
            VISIT_CHILDREN
        }
        fn visit_expression(
            &mut self,
            transformer: &mut Transformer,
            expression: &Expression,
        ) -> VisitAfter {
            if matches!(expression.op, ExpressionOp::Constant(ConstantValue::Int(5))) {
                let six = ExpressionOp::Constant(ConstantValue::Int(6));
                let replacement = Expression::new(expression.node_id, six);
                transformer.queue_expression_replacement(expression.node_id, replacement);
            }
            VISIT_CHILDREN
        }
    }

    #[test]
    fn replacements_and_removals_are_deferred() {
        let mut ir = new_main();
        declare_local(&mut ir, "a", 5);
        declare_local(&mut ir, "b", 7);
        declare_local(&mut ir, "c", 5);

        let mut transformer = Transformer::new();
        let IR { root, .. } = &mut ir;
        traverse_block(&mut ReplaceConstants, &mut transformer, root);
        assert!(!transformer.is_empty());
        transformer.update_tree(root).unwrap();

        assert_eq!(declared_constants(main_body(&ir)), vec![6, 6]);
    }

    #[test]
    fn stale_replacement_fails_the_update() {
        let mut ir = new_main();
        declare_local(&mut ir, "a", 0);

        let mut transformer = Transformer::new();
        let orphan = ir.meta.new_node_id();
        let replacement = instruction::int(&mut ir.meta, 1);
        transformer.queue_expression_replacement(orphan, replacement);

        let error = transformer.update_tree(&mut ir.root).unwrap_err();
        assert_eq!(error.node_ids, vec![orphan.id]);
    }

    #[test]
    fn visitor_respects_stop() {
        let mut ir = new_main();
        declare_local(&mut ir, "a", 3);
        let lhs = instruction::int(&mut ir.meta, 4);
        let rhs = instruction::int(&mut ir.meta, 5);
        let sum = instruction::binary(&mut ir.meta, BinaryOpCode::Add, lhs, rhs);
        let statement = instruction::expression_statement(&mut ir.meta, sum);
        add_to_main(&mut ir, statement);

        let mut constants = Vec::new();
        visitor::for_each_expression(&mut constants, &ir.root, &|constants, expression| {
            match expression.op {
                ExpressionOp::Constant(ConstantValue::Int(value)) => constants.push(value),
                // Don't look inside additions.
                ExpressionOp::Binary(..) => return STOP,
                _ => {}
            }
            VISIT_CHILDREN
        });
        assert_eq!(constants, vec![3]);
    }
}
