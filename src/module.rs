// ABOUTME: Module loading, caching, and circular-import detection for `import` statements

use crate::ast::Stmt;
use crate::error::RuntimeError;
use crate::value::{ModuleRecord, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Collapses `.` and `..` components lexically, without touching the
/// filesystem, so that `a/../b.flow` and `b.flow` share one cache entry.
fn normalize_lexically(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), None | Some(Component::ParentDir)) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub struct ModuleLoader {
    cache: RefCell<HashMap<PathBuf, Rc<ModuleRecord>>>,
    import_stack: RefCell<Vec<PathBuf>>,
    base_dir: PathBuf,
}

impl ModuleLoader {
    pub fn new(base_dir: PathBuf) -> Self {
        ModuleLoader {
            cache: RefCell::new(HashMap::new()),
            import_stack: RefCell::new(Vec::new()),
            base_dir,
        }
    }

    /// Resolves an import path relative to the directory of the
    /// currently-loading file (the top of `import_stack`), or `base_dir`
    /// when nothing is currently loading (the root script's own imports).
    /// Rejects absolute paths and auto-appends `.flow` when the path
    /// carries no extension.
    pub fn resolve_path(&self, raw_path: &str, line: u32) -> Result<PathBuf, RuntimeError> {
        if Path::new(raw_path).is_absolute() {
            return Err(RuntimeError::ModuleError {
                message: format!("import path '{}' must be relative, not absolute", raw_path),
                line,
            });
        }
        let dir = self
            .import_stack
            .borrow()
            .last()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.base_dir.clone());
        let mut path = dir.join(raw_path);
        if path.extension().is_none() {
            path.set_extension("flow");
        }
        Ok(normalize_lexically(&path))
    }

    /// Loads and caches the module at `path`, evaluating it via `evaluate_module`
    /// (supplied by the caller to avoid a circular dependency on `interpreter.rs`).
    /// Returns the cached record on repeat imports instead of re-executing.
    pub fn load(
        &self,
        path: &Path,
        line: u32,
        evaluate_module: impl FnOnce(&str, &Path) -> Result<(Option<String>, Vec<Stmt>, HashMap<String, Value>), RuntimeError>,
    ) -> Result<Rc<ModuleRecord>, RuntimeError> {
        let canonical = path.to_path_buf();

        if let Some(cached) = self.cache.borrow().get(&canonical) {
            return Ok(cached.clone());
        }

        if self.import_stack.borrow().contains(&canonical) {
            let mut chain: Vec<String> = self
                .import_stack
                .borrow()
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(canonical.display().to_string());
            return Err(RuntimeError::ModuleError {
                message: format!("circular import detected: {}", chain.join(" -> ")),
                line,
            });
        }

        let source = std::fs::read_to_string(&canonical).map_err(|e| RuntimeError::ModuleError {
            message: format!("cannot read module '{}': {}", canonical.display(), e),
            line,
        })?;

        self.import_stack.borrow_mut().push(canonical.clone());
        let result = evaluate_module(&source, &canonical);
        self.import_stack.borrow_mut().pop();

        let (library_name, _statements, exports) = result?;

        let expected_stem = canonical
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let library_name = library_name.ok_or_else(|| RuntimeError::ModuleError {
            message: format!(
                "module '{}' must declare 'library \"{}\"' before it can be imported",
                canonical.display(),
                expected_stem
            ),
            line,
        })?;
        if library_name != expected_stem {
            return Err(RuntimeError::ModuleError {
                message: format!(
                    "library name '{}' does not match file name '{}'",
                    library_name, expected_stem
                ),
                line,
            });
        }

        let record = Rc::new(ModuleRecord {
            library_name,
            path: canonical.clone(),
            exports: RefCell::new(exports.into_iter().collect()),
        });

        self.cache.borrow_mut().insert(canonical, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_path_rejects_absolute_paths() {
        let loader = ModuleLoader::new(PathBuf::from("/scripts"));
        assert!(loader.resolve_path("/etc/passwd", 1).is_err());
    }

    #[test]
    fn resolve_path_appends_flow_extension() {
        let loader = ModuleLoader::new(PathBuf::from("/scripts"));
        let resolved = loader.resolve_path("helpers", 1).unwrap();
        assert_eq!(resolved, PathBuf::from("/scripts/helpers.flow"));
    }

    #[test]
    fn load_rejects_circular_import() {
        let loader = ModuleLoader::new(PathBuf::from("."));
        let path = PathBuf::from("a.flow");
        loader.import_stack.borrow_mut().push(path.clone());
        let result = loader.load(&path, 1, |_, _| Ok((None, vec![], HashMap::new())));
        assert!(result.is_err());
    }

    #[test]
    fn circular_import_error_lists_the_full_chain() {
        let loader = ModuleLoader::new(PathBuf::from("."));
        loader.import_stack.borrow_mut().push(PathBuf::from("a.flow"));
        loader.import_stack.borrow_mut().push(PathBuf::from("b.flow"));
        let result = loader.load(&PathBuf::from("a.flow"), 1, |_, _| Ok((None, vec![], HashMap::new())));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("a.flow -> b.flow -> a.flow"));
    }
}
