use super::*;

/// Calls `f` on every expression in `block`, outer expressions first.
pub fn walk_block(block: &Block, f: &mut impl FnMut(&Expression)) {
    for statement in &block.statements {
        walk_statement(statement, f);
    }
}

pub fn walk_statement(statement: &Statement, f: &mut impl FnMut(&Expression)) {
    match &statement.kind {
        StatementKind::Block(block) => walk_block(block, f),
        StatementKind::VariableDeclaration { initial_value, .. } => {
            if let Some(value) = initial_value {
                walk_expression(value, f);
            }
        }
        StatementKind::Expression(expr) => walk_expression(expr, f),
        StatementKind::If {
            condition,
            true_body,
            false_body,
        } => {
            walk_expression(condition, f);
            walk_statement(true_body, f);
            if let Some(body) = false_body {
                walk_statement(body, f);
            }
        }
        StatementKind::While {
            condition, body, ..
        } => {
            walk_expression(condition, f);
            walk_statement(body, f);
        }
        StatementKind::For {
            init,
            condition,
            update,
            body,
        } => {
            if let Some(init) = init {
                walk_statement(init, f);
            }
            if let Some(condition) = condition {
                walk_expression(condition, f);
            }
            if let Some(update) = update {
                walk_expression(update, f);
            }
            walk_statement(body, f);
        }
        StatementKind::Return(Some(expr)) => walk_expression(expr, f),
        StatementKind::Return(None)
        | StatementKind::Continue
        | StatementKind::Break
        | StatementKind::Throw
        | StatementKind::Placeholder
        | StatementKind::InlineAssembly => {}
    }
}

pub fn walk_expression(expr: &Expression, f: &mut impl FnMut(&Expression)) {
    f(expr);
    match &expr.kind {
        ExpressionKind::Unary { operand, .. } => walk_expression(operand, f),
        ExpressionKind::Binary { left, right, .. }
        | ExpressionKind::Assignment { left, right, .. } => {
            walk_expression(left, f);
            walk_expression(right, f);
        }
        ExpressionKind::Conditional {
            condition,
            true_expr,
            false_expr,
        } => {
            walk_expression(condition, f);
            walk_expression(true_expr, f);
            walk_expression(false_expr, f);
        }
        ExpressionKind::Tuple(items) => {
            for item in items.iter().flatten() {
                walk_expression(item, f);
            }
        }
        ExpressionKind::FunctionCall {
            callee,
            arguments,
            options,
            ..
        } => {
            walk_expression(callee, f);
            for arg in arguments {
                walk_expression(arg, f);
            }
            for option in [&options.value, &options.gas].into_iter().flatten() {
                walk_expression(option, f);
            }
        }
        ExpressionKind::MemberAccess { expression, .. } => walk_expression(expression, f),
        ExpressionKind::IndexAccess { base, index } => {
            walk_expression(base, f);
            if let Some(index) = index {
                walk_expression(index, f);
            }
        }
        ExpressionKind::Literal(_)
        | ExpressionKind::Identifier { .. }
        | ExpressionKind::New(_)
        | ExpressionKind::TypeExpression => {}
    }
}
