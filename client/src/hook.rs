//! Mutation middleware.
//!
//! A `Hook` wraps a `Mutator` and returns a new one. The chain of a mutation
//! is built by wrapping the terminal apply step in the registered hooks,
//! last registration innermost, so the first registered hook runs its
//! pre-logic first and its post-logic last. A hook that returns without
//! calling `next` aborts the mutation: neither the terminal step nor any
//! inner hook runs.

use crate::{Outcome, Result};
use entgraph_core::Context;
use entgraph_mutation::{Mutation, MutationError, Op};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// One step of the mutation pipeline.
pub trait Mutator: Send + Sync {
    fn mutate(&self, ctx: &Context, m: &mut Mutation) -> Result<Outcome>;
}

/// Adapts a function into a `Mutator`.
pub struct MutateFn<F>(pub F);

impl<F> Mutator for MutateFn<F>
where
    F: Fn(&Context, &mut Mutation) -> Result<Outcome> + Send + Sync,
{
    fn mutate(&self, ctx: &Context, m: &mut Mutation) -> Result<Outcome> {
        (self.0)(ctx, m)
    }
}

pub fn mutate_fn<F>(f: F) -> Arc<dyn Mutator>
where
    F: Fn(&Context, &mut Mutation) -> Result<Outcome> + Send + Sync + 'static,
{
    Arc::new(MutateFn(f))
}

/// Middleware around a mutator.
pub type Hook = Arc<dyn Fn(Arc<dyn Mutator>) -> Arc<dyn Mutator> + Send + Sync>;

/// Build a hook from a function of `(next, ctx, mutation)`.
pub fn hook_fn<F>(f: F) -> Hook
where
    F: Fn(&dyn Mutator, &Context, &mut Mutation) -> Result<Outcome> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |next: Arc<dyn Mutator>| {
        let f = Arc::clone(&f);
        mutate_fn(move |ctx, m| f(next.as_ref(), ctx, m))
    })
}

/// Wrap `terminal` in `hooks`, the first hook outermost.
pub fn with_hooks(terminal: Arc<dyn Mutator>, hooks: &[Hook]) -> Arc<dyn Mutator> {
    hooks.iter().rev().fold(terminal, |next, hook| hook(next))
}

/// Predicate deciding whether a conditional hook runs.
pub type Condition = Arc<dyn Fn(&Context, &Mutation) -> bool + Send + Sync>;

/// True when the mutation's op is one of `ops`.
pub fn has_op(ops: Op) -> Condition {
    Arc::new(move |_: &Context, m: &Mutation| m.op().is(ops))
}

/// True when every named field has a new value.
pub fn has_fields(fields: &[&str]) -> Condition {
    let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    Arc::new(move |_: &Context, m: &Mutation| fields.iter().all(|f| m.field(f).is_some()))
}

/// True when every named field is cleared.
pub fn has_cleared_fields(fields: &[&str]) -> Condition {
    let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    Arc::new(move |_: &Context, m: &Mutation| fields.iter().all(|f| m.field_cleared(f)))
}

pub fn not(cond: Condition) -> Condition {
    Arc::new(move |ctx: &Context, m: &Mutation| !cond(ctx, m))
}

pub fn and(conds: Vec<Condition>) -> Condition {
    Arc::new(move |ctx: &Context, m: &Mutation| conds.iter().all(|c| c(ctx, m)))
}

pub fn or(conds: Vec<Condition>) -> Condition {
    Arc::new(move |ctx: &Context, m: &Mutation| conds.iter().any(|c| c(ctx, m)))
}

/// Run `hook` only when `cond` holds; otherwise skip straight to `next`.
pub fn if_(hook: Hook, cond: Condition) -> Hook {
    Arc::new(move |next: Arc<dyn Mutator>| {
        let hooked = hook(Arc::clone(&next));
        let cond = Arc::clone(&cond);
        mutate_fn(move |ctx, m| {
            if cond(ctx, m) {
                hooked.mutate(ctx, m)
            } else {
                next.mutate(ctx, m)
            }
        })
    })
}

/// Run `hook` only for the given ops.
pub fn on(hook: Hook, ops: Op) -> Hook {
    if_(hook, has_op(ops))
}

/// Run `hook` for every op except the given ones.
pub fn unless(hook: Hook, ops: Op) -> Hook {
    if_(hook, not(has_op(ops)))
}

/// Run `hook` only for mutations of one entity type.
pub fn for_type(type_name: impl Into<String>, hook: Hook) -> Hook {
    let type_name = type_name.into();
    if_(hook, Arc::new(move |_: &Context, m: &Mutation| m.type_name() == type_name))
}

/// A hook that fails every mutation it sees with `err`.
pub fn fixed_error(err: MutationError) -> Hook {
    Arc::new(move |_next: Arc<dyn Mutator>| {
        let err = err.clone();
        mutate_fn(move |_, _| Err(err.clone().into()))
    })
}

/// Reject the given ops.
pub fn reject(ops: Op) -> Hook {
    Arc::new(move |next: Arc<dyn Mutator>| {
        mutate_fn(move |ctx, m| {
            if m.op().is(ops) {
                return Err(MutationError::op_not_allowed(m.op(), "operation is not allowed").into());
            }
            next.mutate(ctx, m)
        })
    })
}

/// Hooks registered on a client, each global or bound to one type.
#[derive(Clone, Default)]
pub(crate) struct Registry {
    hooks: Arc<RwLock<Vec<(Option<String>, Hook)>>>,
}

impl Registry {
    pub(crate) fn register(&self, type_name: Option<String>, hook: Hook) {
        self.hooks.write().push((type_name, hook));
    }

    /// The chain of a mutation of `type_name` ending in `terminal`.
    pub(crate) fn chain(&self, type_name: &str, terminal: Arc<dyn Mutator>) -> Arc<dyn Mutator> {
        let hooks: Vec<Hook> = self
            .hooks
            .read()
            .iter()
            .filter(|(t, _)| t.as_deref().map_or(true, |t| t == type_name))
            .map(|(_, h)| Arc::clone(h))
            .collect();
        with_hooks(terminal, &hooks)
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.read().len()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("hooks", &self.len()).finish()
    }
}
