//! Sandbox check for generated action scripts.
//!
//! The host runs action scripts with a fixed set of globals. A script that
//! references anything else fails at document runtime, where nobody is
//! watching, so the generator rejects it up front.

use oxc_allocator::Allocator;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::collections::HashSet;

lazy_static::lazy_static! {
    pub static ref SANDBOX_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        // Host primitives
        s.insert("getSelectedLayoutName");
        s.insert("getVariableValue");
        s.insert("setVariableValue");
        s.insert("studio");

        // Language builtins
        s.insert("Object");
        s.insert("Array");
        s.insert("String");
        s.insert("JSON");
        s.insert("undefined");
        s
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptCheck {
    pub syntax_errors: Vec<String>,
    /// Free identifiers outside the sandbox surface, first occurrence order.
    pub unknown_identifiers: Vec<String>,
}

impl ScriptCheck {
    pub fn is_clean(&self) -> bool {
        self.syntax_errors.is_empty() && self.unknown_identifiers.is_empty()
    }

    pub fn into_messages(self) -> Vec<String> {
        let mut messages = self.syntax_errors;
        messages.extend(
            self.unknown_identifiers
                .into_iter()
                .map(|ident| format!("Unknown identifier '{}'.", ident)),
        );
        messages
    }
}

/// Parse `source` and report syntax errors and free identifiers that are
/// neither bound in the script nor provided by the sandbox.
pub fn check_script(source: &str) -> ScriptCheck {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::default()).parse();

    if !ret.errors.is_empty() {
        return ScriptCheck {
            syntax_errors: ret.errors.iter().map(|e| format!("{:?}", e)).collect(),
            unknown_identifiers: vec![],
        };
    }

    let mut collector = ScopeAwareCollector {
        references: vec![],
        bindings: HashSet::new(),
    };
    collector.visit_program(&ret.program);

    let mut seen = HashSet::new();
    let unknown_identifiers = collector
        .references
        .into_iter()
        .filter(|ident| {
            !collector.bindings.contains(ident) && !SANDBOX_GLOBALS.contains(ident.as_str())
        })
        .filter(|ident| seen.insert(ident.clone()))
        .collect();

    ScriptCheck {
        syntax_errors: vec![],
        unknown_identifiers,
    }
}

struct ScopeAwareCollector {
    references: Vec<String>,
    bindings: HashSet<String>,
}

impl<'a> Visit<'a> for ScopeAwareCollector {
    fn visit_identifier_reference(&mut self, ident: &oxc_ast::ast::IdentifierReference<'a>) {
        self.references.push(ident.name.to_string());
    }

    fn visit_binding_identifier(&mut self, ident: &oxc_ast::ast::BindingIdentifier<'a>) {
        self.bindings.insert(ident.name.to_string());
    }
}
