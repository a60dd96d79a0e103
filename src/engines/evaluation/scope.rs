use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::types::Value;

/// Evaluation context: variable bindings, temporaries pushed by iterators,
/// a private random stream and an interrupt flag.
///
/// A scope is owned by one thread at a time. Expression trees are shared;
/// scopes are not.
pub struct Scope {
    variables: HashMap<String, Value>,
    frames: Vec<HashMap<String, Value>>,
    rng: StdRng,
    interrupted: Arc<AtomicBool>,
}

impl Scope {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            variables: HashMap::new(),
            frames: Vec::new(),
            rng,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.iter_mut().rev().find(|f| f.contains_key(name)) {
            frame.insert(name.to_string(), value);
            return;
        }
        self.variables.insert(name.to_string(), value);
    }

    /// Temporaries shadow variables, innermost frame first.
    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.variables.get(name))
    }

    pub fn get_var_mut(&mut self, name: &str) -> Option<&mut Value> {
        if let Some(index) = self.frames.iter().rposition(|f| f.contains_key(name)) {
            return self.frames[index].get_mut(name);
        }
        self.variables.get_mut(name)
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.get_var(name).is_some()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Binds a temporary in the innermost frame, opening one if needed.
    pub fn set_temp(&mut self, name: &str, value: Value) {
        if self.frames.is_empty() {
            self.frames.push(HashMap::new());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    pub fn get_temp(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Shares the interrupt flag with another owner, such as an exploration run.
    pub fn share_interrupt(&mut self, flag: Arc<AtomicBool>) {
        self.interrupted = flag;
    }

    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_temporaries_shadow_variables() {
        let mut scope = Scope::with_seed(1);
        scope.set_var("each", Value::Int(1));
        scope.push_frame();
        scope.set_temp("each", Value::Int(2));
        assert_eq!(scope.get_var("each"), Some(&Value::Int(2)));
        scope.pop_frame();
        assert_eq!(scope.get_var("each"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_set_var_updates_the_binding_in_place() {
        let mut scope = Scope::with_seed(1);
        scope.push_frame();
        scope.set_temp("x", Value::Int(1));
        scope.set_var("x", Value::Int(5));
        assert_eq!(scope.get_temp("x"), Some(&Value::Int(5)));
        scope.pop_frame();
        assert!(!scope.has_var("x"));
    }

    #[test]
    fn test_same_seed_gives_same_stream() {
        let mut a = Scope::with_seed(7);
        let mut b = Scope::with_seed(7);
        let xa: u32 = a.rng().gen();
        let xb: u32 = b.rng().gen();
        assert_eq!(xa, xb);
    }

    #[test]
    fn test_interrupt_is_visible_through_handle() {
        let scope = Scope::with_seed(1);
        let handle = scope.interrupt_handle();
        assert!(!scope.interrupted());
        handle.store(true, Ordering::SeqCst);
        assert!(scope.interrupted());
    }
}
