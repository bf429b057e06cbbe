//! Extraction of imported module names from Python source.
//!
//! The source is dedented and parsed into a Python AST. Any parse error makes
//! the whole file count as having no imports, so scratch files in an app
//! directory never block an export.

use log::debug;
use rustpython_parser::{Parse, ast};
use std::collections::BTreeSet;

/// Top-level module names imported by `source`.
///
/// `import numpy as np; import scipy.stats` gives `{"numpy", "scipy"}`.
/// Relative imports without a module (`from . import x`) contribute nothing.
/// Returns an empty set if the source can't be parsed as Python.
pub fn find_imports(source: &str) -> BTreeSet<String> {
    let source = textwrap::dedent(source);
    match ast::Suite::parse(&source, "<app>") {
        Ok(suite) => {
            let mut imports = BTreeSet::new();
            collect_imports(&suite, &mut imports);
            imports
        }
        Err(err) => {
            debug!("Not scanning source for imports: {}", err);
            BTreeSet::new()
        }
    }
}

fn top_level(module: &str) -> String {
    module.split('.').next().unwrap_or(module).to_string()
}

/// Walk `body` and every nested block, collecting imported modules.
fn collect_imports(body: &[ast::Stmt], imports: &mut BTreeSet<String>) {
    for stmt in body {
        match stmt {
            ast::Stmt::Import(ast::StmtImport { names, .. }) => {
                imports.extend(names.iter().map(|alias| top_level(alias.name.as_str())));
            }
            ast::Stmt::ImportFrom(ast::StmtImportFrom { module, .. }) => {
                if let Some(module) = module {
                    imports.insert(top_level(module.as_str()));
                }
            }
            ast::Stmt::FunctionDef(ast::StmtFunctionDef { body, .. })
            | ast::Stmt::AsyncFunctionDef(ast::StmtAsyncFunctionDef { body, .. })
            | ast::Stmt::ClassDef(ast::StmtClassDef { body, .. })
            | ast::Stmt::With(ast::StmtWith { body, .. })
            | ast::Stmt::AsyncWith(ast::StmtAsyncWith { body, .. }) => {
                collect_imports(body, imports);
            }
            ast::Stmt::For(ast::StmtFor { body, orelse, .. })
            | ast::Stmt::AsyncFor(ast::StmtAsyncFor { body, orelse, .. })
            | ast::Stmt::While(ast::StmtWhile { body, orelse, .. })
            | ast::Stmt::If(ast::StmtIf { body, orelse, .. }) => {
                collect_imports(body, imports);
                collect_imports(orelse, imports);
            }
            ast::Stmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            })
            | ast::Stmt::TryStar(ast::StmtTryStar {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            }) => {
                collect_imports(body, imports);
                for handler in handlers {
                    let ast::ExceptHandler::ExceptHandler(handler) = handler;
                    collect_imports(&handler.body, imports);
                }
                collect_imports(orelse, imports);
                collect_imports(finalbody, imports);
            }
            ast::Stmt::Match(ast::StmtMatch { cases, .. }) => {
                for case in cases {
                    collect_imports(&case.body, imports);
                }
            }
            _ => {}
        }
    }
}
