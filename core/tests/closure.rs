use stagehand_core::ast::{AstNode, AstNodeKind, WdlType, parse_document_text};
use stagehand_core::ir::env::{CallEnv, closure, update_closure};
use stagehand_core::ir::model::{CVar, LinkedVar, SArg};

/// Parse a bare expression by wrapping it in a probe declaration.
fn parse_expr(text: &str) -> AstNode {
    let doc = parse_document_text(
        "probe.wdl",
        &format!("workflow w {{ Int probe = {} }}", text),
    )
    .expect("failed to parse probe expression");
    let AstNodeKind::Document { items, .. } = &doc.kind else {
        panic!("no document");
    };
    let AstNodeKind::Workflow { body, .. } = &items[0].kind else {
        panic!("no workflow");
    };
    let AstNodeKind::Declaration { expr, .. } = &body[0].kind else {
        panic!("no declaration");
    };
    expr.as_ref().expect("probe declaration has no expression").as_ref().clone()
}

fn linked(name: &str, ty: WdlType) -> LinkedVar {
    let cvar = CVar::new(name, ty);
    LinkedVar {
        sarg: SArg::WorkflowInput(cvar.clone()),
        cvar,
    }
}

fn env_of(names: &[&str]) -> CallEnv {
    let mut env = CallEnv::new();
    for name in names {
        env = env.bind(name, linked(name, WdlType::Int));
    }
    env
}

#[test]
fn closure_is_minimal_subset_of_environment() {
    let env = env_of(&["a", "b", "c"]);
    let clo = closure(&env, &parse_expr("a + 1"));
    assert_eq!(clo.len(), 1);
    assert!(clo.contains("a"));
    assert!(!clo.contains("b"));
}

#[test]
fn every_referenced_env_name_appears() {
    let env = env_of(&["a", "b", "c"]);
    let clo = closure(&env, &parse_expr("(a * b) + c"));
    assert_eq!(clo.len(), 3);
    for name in ["a", "b", "c"] {
        assert!(clo.contains(name), "missing {}", name);
    }
}

#[test]
fn unresolved_identifiers_are_ignored() {
    // Block-internal names are indistinguishable from free variables at
    // this level; they must not be an error.
    let env = env_of(&["a"]);
    let clo = closure(&env, &parse_expr("a + mystery"));
    assert_eq!(clo.len(), 1);
    assert!(clo.contains("a"));
}

#[test]
fn dotted_reference_resolves_via_exact_match() {
    let env = env_of(&["Add.result"]);
    let clo = closure(&env, &parse_expr("Add.result + 10"));
    assert_eq!(clo.len(), 1);
    assert!(clo.contains("Add.result"));
}

#[test]
fn dotted_reference_falls_back_to_shorter_prefixes() {
    // `stats.summary.mean` with only `stats` bound matches the root, so an
    // object-shaped stage output can be referenced piecewise.
    let env = env_of(&["stats"]);
    let clo = closure(&env, &parse_expr("stats.summary.mean"));
    assert_eq!(clo.len(), 1);
    assert!(clo.contains("stats"));
}

#[test]
fn update_closure_is_idempotent() {
    let env = env_of(&["a", "b"]);
    let expr = parse_expr("a + b");
    let once = closure(&env, &expr);
    let twice = update_closure(once.clone(), &env, &expr);
    assert_eq!(once.len(), twice.len());
}

#[test]
fn update_closure_accumulates_across_expressions() {
    let env = env_of(&["a", "b"]);
    let first = closure(&env, &parse_expr("a"));
    let both = update_closure(first, &env, &parse_expr("b"));
    assert_eq!(both.len(), 2);
    assert!(both.contains("a"));
    assert!(both.contains("b"));
}
