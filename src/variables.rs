//! The variable pool: which variables are visible at the generation point,
//! which of them are phis, and which phis are currently open for merges.
//!
//! Visibility is lexical. Every nested body opens a scope and closes it on
//! completion, dropping the variables defined inside it. Function variables
//! are added to the enclosing scope once their body is closed.

use rustc_hash::FxHashSet;

use crate::error::{GenError, GenResult};
use crate::program::Variable;

#[derive(Debug, Clone)]
pub struct VariablePool {
    scopes: Vec<Vec<Variable>>,
    phis: FxHashSet<Variable>,
    sealed: FxHashSet<Variable>,
}

impl Default for VariablePool {
    fn default() -> Self {
        Self::new()
    }
}

impl VariablePool {
    pub fn new() -> Self {
        Self {
            scopes: vec![Vec::new()],
            phis: FxHashSet::default(),
            sealed: FxHashSet::default(),
        }
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Close the innermost scope. The top-level scope can never be closed.
    pub fn close_scope(&mut self) -> GenResult<()> {
        if self.scopes.len() <= 1 {
            return Err(GenError::ScopeUnderflow);
        }
        if let Some(scope) = self.scopes.pop() {
            for var in scope {
                self.phis.remove(&var);
                self.sealed.remove(&var);
            }
        }
        Ok(())
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn add(&mut self, var: Variable) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(var);
        }
    }

    pub fn add_phi(&mut self, var: Variable) {
        self.add(var);
        self.phis.insert(var);
    }

    /// Visible variables, outermost scope first, in definition order.
    pub fn visible(&self) -> impl Iterator<Item = Variable> + '_ {
        self.scopes.iter().flatten().copied()
    }

    pub fn contains(&self, var: Variable) -> bool {
        self.visible().any(|v| v == var)
    }

    pub fn len(&self) -> usize {
        self.scopes.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.iter().all(Vec::is_empty)
    }

    pub fn is_phi(&self, var: Variable) -> bool {
        self.phis.contains(&var)
    }

    /// Protect a phi from reassignment while its construct is open.
    pub fn seal(&mut self, phi: Variable) {
        self.sealed.insert(phi);
    }

    pub fn unseal(&mut self, phi: Variable) {
        self.sealed.remove(&phi);
    }

    pub fn is_sealed(&self, phi: Variable) -> bool {
        self.sealed.contains(&phi)
    }

    /// Visible phis that are open for reassignment.
    pub fn open_phis(&self) -> Vec<Variable> {
        self.visible()
            .filter(|v| self.phis.contains(v) && !self.sealed.contains(v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Program;

    #[test]
    fn closed_scope_hides_its_variables() {
        let mut program = Program::new();
        let outer = program.new_variable();
        let inner = program.new_variable();

        let mut pool = VariablePool::new();
        pool.add(outer);
        pool.open_scope();
        pool.add(inner);
        assert!(pool.contains(inner));
        assert_eq!(pool.len(), 2);

        pool.close_scope().unwrap();
        assert!(pool.contains(outer));
        assert!(!pool.contains(inner));
    }

    #[test]
    fn top_level_scope_cannot_close() {
        let mut pool = VariablePool::new();
        assert_eq!(pool.close_scope(), Err(GenError::ScopeUnderflow));
    }

    #[test]
    fn sealed_phis_are_not_open() {
        let mut program = Program::new();
        let a = program.new_variable();
        let b = program.new_variable();
        let plain = program.new_variable();

        let mut pool = VariablePool::new();
        pool.add_phi(a);
        pool.add_phi(b);
        pool.add(plain);
        assert_eq!(pool.open_phis(), vec![a, b]);

        pool.seal(a);
        assert_eq!(pool.open_phis(), vec![b]);
        assert!(pool.is_phi(a));

        pool.unseal(a);
        assert_eq!(pool.open_phis(), vec![a, b]);
    }

    #[test]
    fn phi_defined_in_closed_scope_is_forgotten() {
        let mut program = Program::new();
        let phi = program.new_variable();
        let mut pool = VariablePool::new();
        pool.open_scope();
        pool.add_phi(phi);
        pool.close_scope().unwrap();
        assert!(!pool.is_phi(phi));
        assert!(pool.open_phis().is_empty());
        assert!(pool.is_empty());
    }
}
