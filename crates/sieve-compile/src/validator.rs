//! The validator (§4.5): walks the AST once, resolving commands/tests
//! against the known built-ins, registering required extensions, and
//! enforcing placement rules. Validation errors are additive — the whole
//! tree is still walked after the first error, so a script with five
//! unrelated mistakes gets five diagnostics in one pass.

use sieve_core::diag::Diagnostics;
use sieve_core::registry::{is_known_extension, Registry, DEPRECATED_ALIAS_PAIRS};
use sieve_syntax::ast::{Ast, NodeId, NodeKind};

use crate::objects::{command_spec, is_core_test, test_requires_extension};

pub struct ValidatorOptions {
    /// `true` when validating a script reached via `include` (§4.5:
    /// "`return` only within an included script").
    pub in_included_script: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            in_included_script: false,
        }
    }
}

/// Validate `ast` against `registry`, reporting diagnostics into `diag`.
/// Returns `true` iff no error-or-worse diagnostic was emitted.
pub fn validate(
    ast: &Ast,
    registry: &mut Registry,
    filename: &str,
    diag: &mut Diagnostics,
    opts: &ValidatorOptions,
) -> bool {
    let mut past_require_section = false;
    let mut seen_if_chain = false;

    for &root in &ast.roots {
        validate_top_level_command(
            ast,
            root,
            registry,
            filename,
            diag,
            opts,
            &mut past_require_section,
            &mut seen_if_chain,
        );
    }
    check_deprecated_alias_conflicts(registry, filename, diag);
    diag.ok()
}

fn check_deprecated_alias_conflicts(registry: &Registry, filename: &str, diag: &mut Diagnostics) {
    for (a, b) in DEPRECATED_ALIAS_PAIRS {
        if registry.is_required(a) && registry.is_required(b) {
            diag.error(
                filename,
                0,
                format!("conflicting extension aliases {a:?} and {b:?} both required"),
            );
        }
    }
}

fn validate_top_level_command(
    ast: &Ast,
    id: NodeId,
    registry: &mut Registry,
    filename: &str,
    diag: &mut Diagnostics,
    opts: &ValidatorOptions,
    past_require_section: &mut bool,
    seen_if_chain: &mut bool,
) {
    let node = ast.get(id);
    let line = node.line;
    let NodeKind::Command {
        identifier,
        arguments,
        tests,
        block,
    } = &node.kind
    else {
        return;
    };

    if identifier == "require" {
        if *past_require_section {
            diag.error(filename, line, "require must appear before any other command");
        }
        validate_require(ast, arguments, registry, filename, diag);
        return;
    }
    *past_require_section = true;

    match identifier.as_str() {
        "elsif" | "else" => {
            if !*seen_if_chain {
                diag.error(filename, line, "elsif/else must follow if/elsif");
            }
        }
        _ => {}
    }
    *seen_if_chain = matches!(identifier.as_str(), "if" | "elsif");

    validate_command(ast, id, registry, filename, diag, opts);

    for &test in tests {
        validate_test(ast, test, registry, filename, diag);
    }

    if let Some(children) = block {
        let mut nested_if_chain = false;
        let mut nested_past_require = true;
        for &child in children {
            validate_top_level_command(
                ast,
                child,
                registry,
                filename,
                diag,
                opts,
                &mut nested_past_require,
                &mut nested_if_chain,
            );
        }
    }
}

fn validate_require(
    ast: &Ast,
    arguments: &[NodeId],
    registry: &mut Registry,
    filename: &str,
    diag: &mut Diagnostics,
) {
    for &arg in arguments {
        let items: Vec<NodeId> = match &ast.get(arg).kind {
            NodeKind::StringList(items) => items.clone(),
            NodeKind::String(_) => vec![arg],
            _ => continue,
        };
        for item in items {
            let NodeKind::String(name) = &ast.get(item).kind else {
                continue;
            };
            let line = ast.get(item).line;
            if !is_known_extension(name) {
                diag.error(filename, line, format!("unknown extension {name:?} in require list"));
                continue;
            }
            registry.require(name);
        }
    }
}

fn validate_command(
    ast: &Ast,
    id: NodeId,
    registry: &Registry,
    filename: &str,
    diag: &mut Diagnostics,
    opts: &ValidatorOptions,
) {
    let node = ast.get(id);
    let line = node.line;
    let NodeKind::Command {
        identifier, block, ..
    } = &node.kind
    else {
        return;
    };

    if identifier == "return" && !opts.in_included_script {
        diag.error(filename, line, "return is only valid within an included script");
    }

    let Some(spec) = command_spec(identifier) else {
        diag.error(filename, line, format!("unknown command {identifier:?}"));
        return;
    };

    if let Some(ext) = spec.requires_extension {
        if !registry.is_required(ext) {
            diag.error(
                filename,
                line,
                format!("command {identifier:?} requires 'require [\"{ext}\"]'"),
            );
        }
    }

    let has_block = block.is_some();
    if has_block && !spec.block_allowed {
        diag.error(filename, line, format!("{identifier} does not take a block"));
    }
    if !has_block && spec.block_required {
        diag.error(filename, line, format!("{identifier} requires a block"));
    }
}

fn validate_test(
    ast: &Ast,
    id: NodeId,
    registry: &mut Registry,
    filename: &str,
    diag: &mut Diagnostics,
) {
    let node = ast.get(id);
    let line = node.line;
    let NodeKind::Test {
        identifier, tests, ..
    } = &node.kind
    else {
        return;
    };

    match identifier.as_str() {
        "not" => {
            if let Some(&sub) = tests.first() {
                validate_test(ast, sub, registry, filename, diag);
            }
        }
        "anyof" | "allof" => {
            for &sub in tests {
                validate_test(ast, sub, registry, filename, diag);
            }
        }
        _ => {
            if !is_core_test(identifier) {
                diag.error(filename, line, format!("unknown test {identifier:?}"));
                return;
            }
            if let Some(ext) = test_requires_extension(identifier) {
                if !registry.is_required(ext) {
                    diag.error(
                        filename,
                        line,
                        format!("test {identifier:?} requires 'require [\"{ext}\"]'"),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_core::instance::Instance;
    use sieve_syntax::parse_script;
    use std::rc::Rc;

    fn validate_src(src: &str, opts: ValidatorOptions) -> (bool, u32) {
        let sink = Rc::new(sieve_core::diag::MemorySink::default());
        let mut diag = Diagnostics::new(sink, 0);
        let ast = parse_script(src, "t.sieve", &mut diag);
        let mut instance = Instance::new("u", "/home/u");
        let ok = validate(&ast, instance.registry_mut(), "t.sieve", &mut diag, &opts);
        (ok, diag.error_count())
    }

    #[test]
    fn scenario_a_validates_cleanly() {
        let (ok, errs) = validate_src(
            r#"require ["fileinto", "imap4flags"];
               if header :contains "Subject" "sale" {
                   addflag "\\Seen";
                   fileinto "Junk";
                   stop;
               }"#,
            ValidatorOptions::default(),
        );
        assert!(ok, "errors: {errs}");
    }

    #[test]
    fn require_after_other_command_is_an_error() {
        let (ok, errs) = validate_src(r#"keep; require ["fileinto"];"#, ValidatorOptions::default());
        assert!(!ok);
        assert!(errs >= 1);
    }

    #[test]
    fn fileinto_without_require_is_an_error() {
        let (ok, _) = validate_src(r#"fileinto "Junk";"#, ValidatorOptions::default());
        assert!(!ok);
    }

    #[test]
    fn return_outside_include_is_an_error() {
        let (ok, _) = validate_src("return;", ValidatorOptions::default());
        assert!(!ok);
    }

    #[test]
    fn return_inside_include_is_ok() {
        let (ok, _) = validate_src(
            "return;",
            ValidatorOptions {
                in_included_script: true,
            },
        );
        assert!(ok);
    }

    #[test]
    fn conflicting_aliases_is_an_error() {
        let (ok, _) = validate_src(r#"require ["notify", "enotify"];"#, ValidatorOptions::default());
        assert!(!ok);
    }

    #[test]
    fn dangling_elsif_is_an_error() {
        let (ok, _) = validate_src(r#"elsif true { keep; }"#, ValidatorOptions::default());
        assert!(!ok);
    }
}
